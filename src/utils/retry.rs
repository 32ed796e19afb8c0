//! Bounded retry for transient operations
//!
//! The main consumer is the post-publish archive move, which can fail while
//! another process still holds the file and succeeds moments later.

use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// How often and how fast an operation is retried
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    pub attempts: u32,

    /// Delay before the first retry
    pub delay: Duration,

    /// Factor applied to the delay after every retry (1.0 keeps it fixed)
    pub multiplier: f64,

    /// Upper bound on the per-retry delay
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 4,
            delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// Fixed-delay profile: `attempts` tries, `delay` apart
    pub fn fixed(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts,
            delay,
            multiplier: 1.0,
            max_delay: delay,
        }
    }

    /// Exponential profile starting at `delay`, doubling per retry
    pub fn backoff(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts,
            delay,
            ..Default::default()
        }
    }

    /// Delay to sleep before retry number `retry` (1-based)
    fn delay_before(&self, retry: u32) -> Duration {
        let scaled = self.delay.as_millis() as f64 * self.multiplier.powi(retry as i32 - 1);
        Duration::from_millis(scaled as u64).min(self.max_delay)
    }
}

/// Run an operation up to `config.attempts` times
///
/// Returns the first success, or the last error once every attempt has been
/// spent. A zero-attempt config fails without running the operation.
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, operation: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error = None;

    for attempt in 1..=config.attempts {
        if attempt > 1 {
            let delay = config.delay_before(attempt - 1);
            debug!(attempt, delay_ms = delay.as_millis(), "Retrying after delay");
            tokio::time::sleep(delay).await;
        }

        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                warn!(
                    attempt,
                    attempts = config.attempts,
                    error = %e,
                    "Attempt failed"
                );
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| anyhow::anyhow!("no attempts configured")))
}
