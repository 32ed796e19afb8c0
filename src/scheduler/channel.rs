//! Per-channel upload scheduling
//!
//! One [`ChannelScheduler`] owns the scheduling logic for a single channel:
//! it plans batches of pending artifacts into legal time slots, spawns the
//! asynchronous publish-and-archive tasks, appends the publication ledger and
//! re-plans the batch tail when the remote side reports quota exhaustion.
//!
//! All cross-task coordination goes through the shared [`SchedulerState`]:
//! claims guarantee each artifact at most one in-flight publish attempt, and
//! the per-channel next-allowed-time entry guards against planning a batch on
//! top of one already in flight.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::error::{SchedulerError, SchedulerResult};
use super::planner::SlotPlanner;
use super::policy::UploadPolicy;
use super::state::{ClaimGuard, SchedulerState};
use crate::ledger::{Ledger, LedgerEntry};
use crate::models::{Artifact, Channel};
use crate::publish::{MediaPublisher, PublishRequest};
use crate::utils::retry::{with_retry, RetryConfig};

/// Scheduler for one channel
///
/// Stateless across invocations except through the shared state passed in;
/// safe to drive from a periodic coordinator trigger. Cloning is cheap (the
/// shared state and publisher are behind `Arc`) and gives every spawned
/// publish task its own handle.
#[derive(Clone)]
pub struct ChannelScheduler {
    channel: Channel,
    policy: UploadPolicy,
    planner: SlotPlanner,
    ledger: Ledger,
    state: Arc<SchedulerState>,
    publisher: Arc<dyn MediaPublisher>,
}

impl ChannelScheduler {
    /// Create a scheduler for one channel
    pub fn new(
        channel: Channel,
        policy: UploadPolicy,
        state: Arc<SchedulerState>,
        publisher: Arc<dyn MediaPublisher>,
    ) -> Self {
        Self {
            planner: SlotPlanner::new(&policy),
            ledger: Ledger::new(&channel.ledger_path),
            channel,
            policy,
            state,
            publisher,
        }
    }

    /// The channel this scheduler drives
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Create the channel's directory layout
    ///
    /// Must succeed before the first scheduling pass; later absence of the
    /// directories is not expected and surfaces as pass failures.
    pub async fn init(&self) -> SchedulerResult<()> {
        self.channel
            .ensure_layout()
            .await
            .map_err(|e| SchedulerError::channel_setup(&self.channel.name, e.to_string()))
    }

    /// List pending artifacts in deterministic file-name order
    ///
    /// The ordering is stable across runs so that re-plans reproduce the
    /// original batch order.
    pub async fn list_pending(&self) -> SchedulerResult<Vec<Artifact>> {
        let mut entries = tokio::fs::read_dir(&self.channel.pending_dir)
            .await
            .map_err(|e| SchedulerError::io_error("list_pending", e.to_string()))?;

        let mut artifacts = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SchedulerError::io_error("list_pending", e.to_string()))?
        {
            let path = entry.path();
            let matches_extension = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext == self.policy.artifact_extension);
            if !matches_extension {
                continue;
            }
            if let Some(artifact) = Artifact::from_path(path) {
                artifacts.push(artifact);
            }
        }

        artifacts.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(artifacts)
    }

    /// Number of pending artifacts
    pub async fn pending_count(&self) -> SchedulerResult<usize> {
        Ok(self.list_pending().await?.len())
    }

    /// Plan one batch of publish tasks
    ///
    /// Claims each unowned pending artifact, assigns it a slot spaced
    /// `min_spacing` after the previous one, and spawns its publish task.
    /// No-op when the queue is empty or when the channel already has a batch
    /// planned in the future (coarse guard: only the first slot of the
    /// previous batch is inspected). Returns the number of tasks scheduled.
    pub async fn plan_batch(&self) -> SchedulerResult<usize> {
        let artifacts = self.list_pending().await?;
        if artifacts.is_empty() {
            tracing::debug!("No pending artifacts for channel '{}'", self.channel.name);
            return Ok(0);
        }

        let now = Utc::now();
        if let Some(existing) = self.state.peek_next_time(&self.channel.name) {
            if existing > now {
                tracing::info!(
                    "Batch for channel '{}' already planned at {}, skipping",
                    self.channel.name,
                    existing
                );
                return Ok(0);
            }
        }

        // a malformed ledger tail aborts the whole pass
        let tail = self.ledger.last_entry().await?;
        let first = self.planner.first_slot(tail.as_ref(), now);

        let mut scheduled = 0;
        for (index, artifact) in artifacts.into_iter().enumerate() {
            let Some(guard) = self.state.try_claim(&artifact.id) else {
                tracing::info!(
                    "Already in flight, skipping: {} ({})",
                    artifact.file_name,
                    self.channel.name
                );
                continue;
            };

            let slot = self.planner.slot_for(first, index);
            if index == 0 {
                self.state.set_next_time(&self.channel.name, slot);
            }

            tracing::info!(
                "Scheduled {} at {} ({})",
                artifact.file_name,
                slot,
                self.channel.name
            );
            self.spawn_publish_task(artifact, slot, guard);
            scheduled += 1;
        }

        Ok(scheduled)
    }

    /// Publish every pending artifact immediately, sequentially
    ///
    /// Bypasses slot planning entirely; used by the `flush` command.
    pub async fn flush_all(&self) -> SchedulerResult<usize> {
        let artifacts = self.list_pending().await?;
        let mut flushed = 0;

        for artifact in artifacts {
            let Some(guard) = self.state.try_claim(&artifact.id) else {
                continue;
            };
            self.publish_and_archive(artifact, Utc::now(), guard).await;
            flushed += 1;
        }

        Ok(flushed)
    }

    fn spawn_publish_task(&self, artifact: Artifact, slot: DateTime<Utc>, guard: ClaimGuard) {
        let scheduler = self.clone();
        tokio::spawn(async move {
            // a slot already in the past fires immediately
            if let Ok(delay) = (slot - Utc::now()).to_std() {
                tokio::time::sleep(delay).await;
            }
            scheduler.publish_and_archive(artifact, slot, guard).await;
        });
    }

    /// Body of one publish task
    ///
    /// The claim guard is held for the whole attempt and dropped on every
    /// exit path, so the artifact always returns to an unowned state.
    async fn publish_and_archive(
        &self,
        artifact: Artifact,
        planned: DateTime<Utc>,
        guard: ClaimGuard,
    ) {
        let _claim = guard;

        let request = PublishRequest {
            path: artifact.path.clone(),
            title: artifact.title(),
            description: String::new(),
            visibility: crate::models::Visibility::default(),
            credentials: self.channel.credentials.clone(),
        };

        tracing::info!("Uploading {} ({})", artifact.file_name, self.channel.name);

        match self.publisher.publish(&request).await {
            Ok(()) => {
                if let Err(e) = self.finish_success(&artifact, planned).await {
                    tracing::error!(
                        "Post-publish bookkeeping failed for {} ({}): {}",
                        artifact.file_name,
                        self.channel.name,
                        e
                    );
                }
            }
            Err(e) if e.is_quota_exhausted() => {
                tracing::warn!(
                    "Quota exhausted on {} ({}), re-planning batch tail",
                    artifact.file_name,
                    self.channel.name
                );
                self.replan_batch_tail(&artifact).await;
            }
            Err(e) => {
                // left pending; the next coordinator pass rediscovers it
                tracing::error!(
                    "Publish failed for {} ({}): {}",
                    artifact.file_name,
                    self.channel.name,
                    e
                );
            }
        }
    }

    /// Archive, record in the ledger, and roll the next-allowed-time forward
    async fn finish_success(&self, artifact: &Artifact, planned: DateTime<Utc>) -> SchedulerResult<()> {
        self.archive_artifact(artifact).await?;

        self.ledger
            .append(&LedgerEntry::new(planned, artifact.file_name.clone()))
            .await?;

        tracing::info!(
            "Uploaded and archived {} ({})",
            artifact.file_name,
            self.channel.name
        );

        if self.pending_count().await? > 0 {
            self.state
                .set_next_time(&self.channel.name, planned + self.policy.min_spacing());
        } else {
            self.state.clear_next_time(&self.channel.name);
        }

        Ok(())
    }

    /// Move the artifact from staging to archive
    ///
    /// The move can fail transiently while another process still holds the
    /// file, so it is retried with a short fixed delay.
    async fn archive_artifact(&self, artifact: &Artifact) -> SchedulerResult<()> {
        let dest = artifact.archive_path(&self.channel.archive_dir);
        let retry = RetryConfig::fixed(
            self.policy.archive_move_attempts,
            self.policy.archive_move_delay(),
        );

        with_retry(&retry, || async {
            tokio::fs::rename(&artifact.path, &dest)
                .await
                .map_err(anyhow::Error::from)
        })
        .await
        .map_err(|e| SchedulerError::io_error("archive_move", e.to_string()))
    }

    /// Re-plan the unprocessed batch tail after quota exhaustion
    ///
    /// Re-lists the staging directory (state may have changed since the
    /// original plan), then shifts every artifact from the failed one onward
    /// to start `quota_backoff` from now, preserving the relative spacing.
    /// Artifacts before the failed index are untouched. Claims are taken
    /// unconditionally here: the failing attempt still holds the failed
    /// artifact's claim while this runs, and its release on task exit drops
    /// that membership again (see `SchedulerState::claim_unchecked`).
    async fn replan_batch_tail(&self, failed: &Artifact) {
        let listed = match self.list_pending().await {
            Ok(listed) => listed,
            Err(e) => {
                tracing::error!(
                    "Re-plan aborted for channel '{}': {}",
                    self.channel.name,
                    e
                );
                return;
            }
        };

        let Some(failed_index) = listed.iter().position(|a| a.id == failed.id) else {
            // already archived or removed by a race; nothing to shift
            tracing::debug!(
                "Failed artifact {} no longer pending ({}), re-plan dropped",
                failed.file_name,
                self.channel.name
            );
            return;
        };

        let base = Utc::now() + self.policy.quota_backoff();

        for (offset, artifact) in listed.into_iter().skip(failed_index).enumerate() {
            let slot = base + self.policy.min_spacing() * offset as i32;
            let guard = self.state.claim_unchecked(&artifact.id);

            if offset == 0 {
                self.state.set_next_time(&self.channel.name, slot);
            }

            tracing::info!(
                "Re-planned {} for {} ({})",
                artifact.file_name,
                slot,
                self.channel.name
            );
            self.spawn_publish_task(artifact, slot, guard);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Credentials;
    use crate::publish::PublishError;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;

    /// Publisher recording calls, optionally failing selected file names
    #[derive(Default)]
    struct RecordingPublisher {
        published: Mutex<Vec<String>>,
        quota_on: Mutex<Vec<String>>,
        fail_on: Mutex<Vec<String>>,
    }

    impl RecordingPublisher {
        fn quota_on(self, name: &str) -> Self {
            self.quota_on.lock().unwrap().push(name.to_string());
            self
        }

        fn fail_on(self, name: &str) -> Self {
            self.fail_on.lock().unwrap().push(name.to_string());
            self
        }

        fn published(&self) -> Vec<String> {
            self.published.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MediaPublisher for RecordingPublisher {
        async fn publish(&self, request: &PublishRequest) -> Result<(), PublishError> {
            let name = request
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if self.quota_on.lock().unwrap().contains(&name) {
                return Err(PublishError::QuotaExceeded);
            }
            if self.fail_on.lock().unwrap().contains(&name) {
                return Err(PublishError::transport("simulated outage"));
            }
            self.published.lock().unwrap().push(name);
            Ok(())
        }
    }

    async fn setup(
        publisher: Arc<dyn MediaPublisher>,
    ) -> (tempfile::TempDir, Arc<SchedulerState>, Arc<ChannelScheduler>) {
        let root = tempfile::tempdir().unwrap();
        let channel = Channel::new(root.path(), "test_channel", Credentials::default());
        let state = Arc::new(SchedulerState::new());
        let scheduler = Arc::new(ChannelScheduler::new(
            channel,
            UploadPolicy::default(),
            Arc::clone(&state),
            publisher,
        ));
        scheduler.init().await.unwrap();
        (root, state, scheduler)
    }

    async fn stage(scheduler: &ChannelScheduler, name: &str) {
        tokio::fs::write(scheduler.channel().pending_dir.join(name), b"media")
            .await
            .unwrap();
    }

    async fn wait_until<F: Fn() -> bool>(condition: F) {
        for _ in 0..500 {
            if condition() {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("condition not reached within timeout");
    }

    fn pending_id(scheduler: &ChannelScheduler, name: &str) -> crate::models::ArtifactId {
        crate::models::ArtifactId::from_path(&scheduler.channel().pending_dir.join(name))
    }

    #[tokio::test]
    async fn test_list_pending_sorted_and_filtered() {
        let (_root, _state, scheduler) = setup(Arc::new(RecordingPublisher::default())).await;
        stage(&scheduler, "b_clip.mp4").await;
        stage(&scheduler, "a_clip.mp4").await;
        stage(&scheduler, "notes.txt").await;

        let pending = scheduler.list_pending().await.unwrap();
        let names: Vec<_> = pending.iter().map(|a| a.file_name.as_str()).collect();
        assert_eq!(names, vec!["a_clip.mp4", "b_clip.mp4"]);
    }

    #[tokio::test]
    async fn test_plan_batch_empty_queue_is_noop() {
        let (_root, state, scheduler) = setup(Arc::new(RecordingPublisher::default())).await;

        assert_eq!(scheduler.plan_batch().await.unwrap(), 0);
        assert_eq!(state.peek_next_time("test_channel"), None);
    }

    #[tokio::test]
    async fn test_plan_batch_skips_when_batch_already_planned() {
        let (_root, state, scheduler) = setup(Arc::new(RecordingPublisher::default())).await;
        stage(&scheduler, "clip.mp4").await;

        let future = Utc::now() + chrono::Duration::hours(2);
        state.set_next_time("test_channel", future);

        assert_eq!(scheduler.plan_batch().await.unwrap(), 0);
        assert_eq!(state.claim_count(), 0);
        // guard left untouched
        assert_eq!(state.peek_next_time("test_channel"), Some(future));
    }

    /// Publisher whose calls never complete, freezing tasks mid-publish
    struct StalledPublisher;

    #[async_trait]
    impl MediaPublisher for StalledPublisher {
        async fn publish(&self, _request: &PublishRequest) -> Result<(), PublishError> {
            futures::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_plan_batch_claims_all_and_sets_next_time() {
        let (_root, state, scheduler) = setup(Arc::new(StalledPublisher)).await;
        stage(&scheduler, "a.mp4").await;
        stage(&scheduler, "b.mp4").await;
        stage(&scheduler, "c.mp4").await;

        let before = Utc::now();
        assert_eq!(scheduler.plan_batch().await.unwrap(), 3);

        // first slot is "now" for an empty ledger
        let next = state.peek_next_time("test_channel").unwrap();
        assert!(next >= before && next <= Utc::now());

        // every artifact claimed exactly once; a second pass schedules nothing
        assert_eq!(state.claim_count(), 3);
        state.clear_next_time("test_channel");
        assert_eq!(scheduler.plan_batch().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_immediate_publish_archives_and_appends_ledger() {
        let publisher = Arc::new(RecordingPublisher::default());
        let (_root, state, scheduler) = setup(Arc::clone(&publisher) as _).await;
        stage(&scheduler, "first_clip.mp4").await;

        scheduler.plan_batch().await.unwrap();

        let archived = scheduler.channel().archive_dir.join("first_clip.mp4");
        wait_until(|| archived.exists()).await;

        assert_eq!(publisher.published(), vec!["first_clip.mp4"]);
        let tail = Ledger::new(&scheduler.channel().ledger_path)
            .last_entry()
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tail.artifact, "first_clip.mp4");

        // nothing pending anymore: claim released, next time cleared
        wait_until(|| state.claim_count() == 0).await;
        wait_until(|| state.peek_next_time("test_channel").is_none()).await;
    }

    #[tokio::test]
    async fn test_transport_failure_leaves_artifact_pending() {
        let publisher = Arc::new(RecordingPublisher::default().fail_on("broken.mp4"));
        let (_root, state, scheduler) = setup(Arc::clone(&publisher) as _).await;
        stage(&scheduler, "broken.mp4").await;

        scheduler.plan_batch().await.unwrap();

        // claim must be released on failure, artifact stays in staging
        wait_until(|| state.claim_count() == 0).await;
        assert!(scheduler.channel().pending_dir.join("broken.mp4").exists());
        assert!(publisher.published().is_empty());
        assert_eq!(
            Ledger::new(&scheduler.channel().ledger_path)
                .last_entry()
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_quota_failure_replans_tail_only() {
        let publisher = Arc::new(RecordingPublisher::default().quota_on("b.mp4"));
        let (_root, state, scheduler) = setup(Arc::clone(&publisher) as _).await;
        for name in ["a.mp4", "b.mp4", "c.mp4", "d.mp4"] {
            stage(&scheduler, name).await;
        }

        let failed = Artifact::from_path(scheduler.channel().pending_dir.join("b.mp4")).unwrap();
        let before = Utc::now();
        scheduler.replan_batch_tail(&failed).await;

        // next-allowed-time pushed one day out
        let next = state.peek_next_time("test_channel").unwrap();
        assert!(next >= before + chrono::Duration::hours(24));
        assert!(next <= Utc::now() + chrono::Duration::hours(24));

        // the tail (b, c, d) is claimed; a is untouched
        assert!(!state.is_claimed(&pending_id(&scheduler, "a.mp4")));
        for name in ["b.mp4", "c.mp4", "d.mp4"] {
            assert!(state.is_claimed(&pending_id(&scheduler, name)), "{name}");
        }
    }

    #[tokio::test]
    async fn test_replan_aborts_when_failed_artifact_is_gone() {
        let (_root, state, scheduler) = setup(Arc::new(RecordingPublisher::default())).await;
        stage(&scheduler, "a.mp4").await;

        let ghost = Artifact::from_path(scheduler.channel().pending_dir.join("gone.mp4")).unwrap();
        scheduler.replan_batch_tail(&ghost).await;

        assert_eq!(state.claim_count(), 0);
        assert_eq!(state.peek_next_time("test_channel"), None);
    }

    #[tokio::test]
    async fn test_malformed_ledger_aborts_pass() {
        let (_root, state, scheduler) = setup(Arc::new(RecordingPublisher::default())).await;
        stage(&scheduler, "clip.mp4").await;
        tokio::fs::write(&scheduler.channel().ledger_path, "corrupted tail\n")
            .await
            .unwrap();

        assert!(scheduler.plan_batch().await.is_err());
        assert_eq!(state.claim_count(), 0);
    }

    #[tokio::test]
    async fn test_flush_all_publishes_everything_now() {
        let publisher = Arc::new(RecordingPublisher::default());
        let (_root, state, scheduler) = setup(Arc::clone(&publisher) as _).await;
        stage(&scheduler, "a.mp4").await;
        stage(&scheduler, "b.mp4").await;

        assert_eq!(scheduler.flush_all().await.unwrap(), 2);
        assert_eq!(publisher.published(), vec!["a.mp4", "b.mp4"]);
        assert_eq!(scheduler.pending_count().await.unwrap(), 0);
        assert_eq!(state.claim_count(), 0);
    }
}
