//! Coordinator loop: periodic per-channel scheduling passes and status reporting
//!
//! The coordinator is the only initiator of work. For every channel it runs a
//! fixed-period pass that tops up the pending queue when it runs low and then
//! plans a batch; a per-channel atomic guard drops (never queues) a trigger
//! that fires while the previous pass is still running. A separate
//! low-frequency loop reads the shared state purely for human-facing status
//! lines and never mutates scheduling state.

use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::channel::ChannelScheduler;
use super::policy::UploadPolicy;
use super::state::SchedulerState;
use crate::content::ContentGenerator;

/// Guard ensuring at most one scheduling pass per channel at a time
///
/// Overlapping triggers are skipped entirely, not delayed to the next tick.
/// The guard covers only the coordinator trigger; publish tasks spawned by a
/// pass keep running after the pass finishes.
#[derive(Debug, Clone, Default)]
pub struct PassGuard {
    busy: Arc<AtomicBool>,
}

impl PassGuard {
    /// Create an idle guard
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to begin a pass; `None` while a previous pass still runs
    pub fn try_begin(&self) -> Option<PassToken> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
            .then(|| PassToken {
                busy: Arc::clone(&self.busy),
            })
    }
}

/// Token marking a pass in progress; releases the guard when dropped
#[derive(Debug)]
pub struct PassToken {
    busy: Arc<AtomicBool>,
}

impl Drop for PassToken {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// Drives scheduling passes and status reporting for all channels
///
/// Cloning is cheap; every spawned loop owns its own handle.
#[derive(Clone)]
pub struct Coordinator {
    policy: UploadPolicy,
    state: Arc<SchedulerState>,
    schedulers: Vec<Arc<ChannelScheduler>>,
    generator: Arc<dyn ContentGenerator>,
    next_check_secs: Arc<AtomicI64>,
}

impl Coordinator {
    /// Create a coordinator over the given channel schedulers
    pub fn new(
        policy: UploadPolicy,
        state: Arc<SchedulerState>,
        schedulers: Vec<Arc<ChannelScheduler>>,
        generator: Arc<dyn ContentGenerator>,
    ) -> Self {
        let next_check_secs = Arc::new(AtomicI64::new(policy.check_interval_secs as i64));
        Self {
            policy,
            state,
            schedulers,
            generator,
            next_check_secs,
        }
    }

    /// Spawn the per-channel pass loops and the status reporter
    ///
    /// Returns the task handles; the loops run until the handles are aborted
    /// or the runtime shuts down.
    pub fn start(&self) -> Vec<JoinHandle<()>> {
        let mut handles: Vec<_> = self
            .schedulers
            .iter()
            .map(|scheduler| self.spawn_channel_loop(Arc::clone(scheduler)))
            .collect();
        handles.push(self.spawn_reporter());
        tracing::info!(
            "Coordinator started: {} channel(s), pass every {}s",
            self.schedulers.len(),
            self.policy.check_interval_secs
        );
        handles
    }

    fn spawn_channel_loop(&self, scheduler: Arc<ChannelScheduler>) -> JoinHandle<()> {
        let coordinator = self.clone();
        let guard = PassGuard::new();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(coordinator.policy.check_interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let Some(token) = guard.try_begin() else {
                    tracing::info!(
                        "Still processing {}, skipping pass",
                        scheduler.channel().name
                    );
                    continue;
                };

                // run the pass on its own task so slow passes are skipped,
                // not serialized behind the ticker
                let coordinator = coordinator.clone();
                let scheduler = Arc::clone(&scheduler);
                tokio::spawn(async move {
                    let _pass = token;
                    coordinator.run_pass(&scheduler).await;
                });
            }
        })
    }

    /// One scheduling pass for one channel: top-up check, then batch planning
    ///
    /// Failures are logged and isolated; one channel's broken pass never
    /// stops the other channels' ticks.
    pub async fn run_pass(&self, scheduler: &ChannelScheduler) {
        let channel = scheduler.channel().name.clone();

        match scheduler.pending_count().await {
            Ok(count) if count < self.policy.low_water_mark => {
                tracing::info!(
                    "Only {} pending for {}, requesting {} more",
                    count,
                    channel,
                    self.policy.topup_count
                );
                // generation must not block scheduling
                let generator = Arc::clone(&self.generator);
                let topup_channel = channel.clone();
                let topup_count = self.policy.topup_count;
                tokio::spawn(async move {
                    if let Err(e) = generator.generate(&topup_channel, topup_count).await {
                        tracing::error!(
                            "Content generation failed for {}: {}",
                            topup_channel,
                            e
                        );
                    }
                });
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!("Failed to count pending artifacts for {}: {}", channel, e);
            }
        }

        tracing::debug!("Checking for new artifacts in {}", channel);
        if let Err(e) = scheduler.plan_batch().await {
            tracing::error!("Scheduling pass failed for {}: {}", channel, e);
        }

        self.next_check_secs
            .store(self.policy.check_interval_secs as i64, Ordering::Relaxed);
    }

    fn spawn_reporter(&self) -> JoinHandle<()> {
        let coordinator = self.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(coordinator.policy.report_interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                coordinator.report_status().await;
            }
        })
    }

    /// Log one human-facing status line per channel
    ///
    /// Purely observational: reads the shared maps and staging directories,
    /// tolerates absent entries at any time, mutates nothing in the
    /// scheduling state.
    pub async fn report_status(&self) {
        let remaining = self
            .next_check_secs
            .fetch_sub(self.policy.report_interval_secs as i64, Ordering::Relaxed);
        if remaining > 0 {
            tracing::info!("Time until next check: {} min", remaining / 60);
        } else {
            self.next_check_secs.store(0, Ordering::Relaxed);
        }

        let claimed = self.state.claimed_snapshot();

        for scheduler in &self.schedulers {
            let channel = &scheduler.channel().name;

            let pending = match scheduler.list_pending().await {
                Ok(pending) => pending,
                Err(e) => {
                    tracing::warn!("Status check failed for {}: {}", channel, e);
                    continue;
                }
            };

            let next_in_flight = pending.iter().find(|a| claimed.contains(&a.id));
            let next_time = self.state.peek_next_time(channel);

            match (next_in_flight, next_time) {
                (Some(artifact), time) => {
                    let at = time.unwrap_or_else(Utc::now);
                    let minutes = (at - Utc::now()).num_minutes().max(0);
                    tracing::info!(
                        "[{}] Next upload in {} min at {}: {}",
                        channel,
                        minutes,
                        at,
                        artifact.file_name
                    );
                }
                (None, Some(at)) => {
                    let minutes = (at - Utc::now()).num_minutes().max(0);
                    tracing::info!(
                        "[{}] Upload slot in {} min at {} (artifact not yet assigned)",
                        channel,
                        minutes,
                        at
                    );
                }
                (None, None) => {
                    tracing::debug!("[{}] No upload planned", channel);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_guard_excludes_overlap() {
        let guard = PassGuard::new();

        let token = guard.try_begin().expect("idle guard grants a token");
        assert!(guard.try_begin().is_none());

        drop(token);
        assert!(guard.try_begin().is_some());
    }

    #[test]
    fn test_pass_guard_clones_share_the_flag() {
        let guard = PassGuard::new();
        let remote = guard.clone();

        let _token = guard.try_begin().unwrap();
        assert!(remote.try_begin().is_none());
    }

    #[test]
    fn test_pass_guard_independent_instances() {
        let one = PassGuard::new();
        let two = PassGuard::new();

        let _token = one.try_begin().unwrap();
        assert!(two.try_begin().is_some());
    }
}
