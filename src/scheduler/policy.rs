//! Upload policy: the tunable constants of the scheduling engine

use serde::{Deserialize, Serialize};
use std::time::Duration as StdDuration;

use super::error::{SchedulerError, SchedulerResult};

/// Scheduling policy for all channels
///
/// The defaults mirror the reference policy: publish at most once every five
/// hours per channel, push a quota-rejected batch tail one day out, check for
/// new work every fifteen minutes and report status every minute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadPolicy {
    /// Minimum spacing between publications on one channel, in minutes
    pub min_spacing_minutes: u64,

    /// How far to push the batch tail after quota exhaustion, in minutes
    pub quota_backoff_minutes: u64,

    /// Coordinator pass period per channel, in seconds
    pub check_interval_secs: u64,

    /// Status reporter period, in seconds
    pub report_interval_secs: u64,

    /// Pending-queue size below which content generation is triggered
    pub low_water_mark: usize,

    /// Number of artifacts requested per top-up
    pub topup_count: usize,

    /// Total attempts for the post-publish archive move
    pub archive_move_attempts: u32,

    /// Fixed delay between archive move attempts, in milliseconds
    pub archive_move_delay_ms: u64,

    /// File extension identifying publishable artifacts (without the dot)
    pub artifact_extension: String,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            min_spacing_minutes: 5 * 60,
            quota_backoff_minutes: 24 * 60,
            check_interval_secs: 15 * 60,
            report_interval_secs: 60,
            low_water_mark: 5,
            topup_count: 3,
            archive_move_attempts: 5,
            archive_move_delay_ms: 200,
            artifact_extension: "mp4".to_string(),
        }
    }
}

impl UploadPolicy {
    /// Create a new policy builder
    pub fn builder() -> UploadPolicyBuilder {
        UploadPolicyBuilder::default()
    }

    /// Validate the policy
    pub fn validate(&self) -> SchedulerResult<()> {
        if self.min_spacing_minutes == 0 {
            return Err(SchedulerError::invalid_policy(
                "min_spacing_minutes",
                "must be greater than zero",
            ));
        }
        if self.quota_backoff_minutes == 0 {
            return Err(SchedulerError::invalid_policy(
                "quota_backoff_minutes",
                "must be greater than zero",
            ));
        }
        if self.check_interval_secs == 0 {
            return Err(SchedulerError::invalid_policy(
                "check_interval_secs",
                "must be greater than zero",
            ));
        }
        if self.report_interval_secs == 0 {
            return Err(SchedulerError::invalid_policy(
                "report_interval_secs",
                "must be greater than zero",
            ));
        }
        if self.archive_move_attempts == 0 {
            return Err(SchedulerError::invalid_policy(
                "archive_move_attempts",
                "must be at least 1",
            ));
        }
        if self.artifact_extension.is_empty() || self.artifact_extension.starts_with('.') {
            return Err(SchedulerError::invalid_policy(
                "artifact_extension",
                format!(
                    "expected an extension without the dot, got '{}'",
                    self.artifact_extension
                ),
            ));
        }
        Ok(())
    }

    /// Minimum spacing between publications
    pub fn min_spacing(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.min_spacing_minutes as i64)
    }

    /// Backoff applied to the batch tail after quota exhaustion
    pub fn quota_backoff(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.quota_backoff_minutes as i64)
    }

    /// Coordinator pass period
    pub fn check_interval(&self) -> StdDuration {
        StdDuration::from_secs(self.check_interval_secs)
    }

    /// Status reporter period
    pub fn report_interval(&self) -> StdDuration {
        StdDuration::from_secs(self.report_interval_secs)
    }

    /// Delay between archive move attempts
    pub fn archive_move_delay(&self) -> StdDuration {
        StdDuration::from_millis(self.archive_move_delay_ms)
    }
}

/// Builder for UploadPolicy
#[derive(Debug, Default)]
pub struct UploadPolicyBuilder {
    min_spacing_minutes: Option<u64>,
    quota_backoff_minutes: Option<u64>,
    check_interval_secs: Option<u64>,
    report_interval_secs: Option<u64>,
    low_water_mark: Option<usize>,
    topup_count: Option<usize>,
    archive_move_attempts: Option<u32>,
    archive_move_delay_ms: Option<u64>,
    artifact_extension: Option<String>,
}

impl UploadPolicyBuilder {
    /// Set minimum spacing in minutes
    pub fn min_spacing_minutes(mut self, minutes: u64) -> Self {
        self.min_spacing_minutes = Some(minutes);
        self
    }

    /// Set quota backoff in minutes
    pub fn quota_backoff_minutes(mut self, minutes: u64) -> Self {
        self.quota_backoff_minutes = Some(minutes);
        self
    }

    /// Set coordinator pass period in seconds
    pub fn check_interval_secs(mut self, secs: u64) -> Self {
        self.check_interval_secs = Some(secs);
        self
    }

    /// Set status reporter period in seconds
    pub fn report_interval_secs(mut self, secs: u64) -> Self {
        self.report_interval_secs = Some(secs);
        self
    }

    /// Set the pending-queue low-water mark
    pub fn low_water_mark(mut self, count: usize) -> Self {
        self.low_water_mark = Some(count);
        self
    }

    /// Set the per-top-up artifact count
    pub fn topup_count(mut self, count: usize) -> Self {
        self.topup_count = Some(count);
        self
    }

    /// Set total archive move attempts
    pub fn archive_move_attempts(mut self, attempts: u32) -> Self {
        self.archive_move_attempts = Some(attempts);
        self
    }

    /// Set the delay between archive move attempts in milliseconds
    pub fn archive_move_delay_ms(mut self, ms: u64) -> Self {
        self.archive_move_delay_ms = Some(ms);
        self
    }

    /// Set the publishable artifact extension
    pub fn artifact_extension(mut self, ext: impl Into<String>) -> Self {
        self.artifact_extension = Some(ext.into());
        self
    }

    /// Build and validate the policy
    pub fn build(self) -> SchedulerResult<UploadPolicy> {
        let defaults = UploadPolicy::default();
        let policy = UploadPolicy {
            min_spacing_minutes: self.min_spacing_minutes.unwrap_or(defaults.min_spacing_minutes),
            quota_backoff_minutes: self
                .quota_backoff_minutes
                .unwrap_or(defaults.quota_backoff_minutes),
            check_interval_secs: self.check_interval_secs.unwrap_or(defaults.check_interval_secs),
            report_interval_secs: self
                .report_interval_secs
                .unwrap_or(defaults.report_interval_secs),
            low_water_mark: self.low_water_mark.unwrap_or(defaults.low_water_mark),
            topup_count: self.topup_count.unwrap_or(defaults.topup_count),
            archive_move_attempts: self
                .archive_move_attempts
                .unwrap_or(defaults.archive_move_attempts),
            archive_move_delay_ms: self
                .archive_move_delay_ms
                .unwrap_or(defaults.archive_move_delay_ms),
            artifact_extension: self.artifact_extension.unwrap_or(defaults.artifact_extension),
        };
        policy.validate()?;
        Ok(policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_defaults() {
        let policy = UploadPolicy::default();

        assert_eq!(policy.min_spacing(), chrono::Duration::hours(5));
        assert_eq!(policy.quota_backoff(), chrono::Duration::hours(24));
        assert_eq!(policy.check_interval(), StdDuration::from_secs(900));
        assert_eq!(policy.report_interval(), StdDuration::from_secs(60));
        assert_eq!(policy.low_water_mark, 5);
        assert_eq!(policy.topup_count, 3);
        assert_eq!(policy.archive_move_attempts, 5);
        assert_eq!(policy.archive_move_delay(), StdDuration::from_millis(200));
        assert_eq!(policy.artifact_extension, "mp4");
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_policy_builder() {
        let policy = UploadPolicy::builder()
            .min_spacing_minutes(60)
            .quota_backoff_minutes(120)
            .artifact_extension("mov")
            .build()
            .unwrap();

        assert_eq!(policy.min_spacing(), chrono::Duration::hours(1));
        assert_eq!(policy.quota_backoff(), chrono::Duration::hours(2));
        assert_eq!(policy.artifact_extension, "mov");
        // untouched fields keep their defaults
        assert_eq!(policy.low_water_mark, 5);
    }

    #[test]
    fn test_policy_validate_rejects_zero_spacing() {
        let policy = UploadPolicy {
            min_spacing_minutes: 0,
            ..Default::default()
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_policy_validate_rejects_dotted_extension() {
        let policy = UploadPolicy {
            artifact_extension: ".mp4".to_string(),
            ..Default::default()
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_policy_builder_rejects_invalid() {
        assert!(UploadPolicy::builder().archive_move_attempts(0).build().is_err());
    }
}
