//! Content-generation boundary
//!
//! When a channel's pending queue runs low the coordinator asks an external
//! rendering pipeline for more artifacts. The call is fire-and-forget:
//! generation failures are logged and never propagated into the scheduling
//! path, and new artifacts simply appear in the staging directory.

use anyhow::Result;
use async_trait::async_trait;

/// External content-generation contract
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Request `count` new artifacts for `channel`
    async fn generate(&self, channel: &str, count: usize) -> Result<()>;
}

/// Generator that only logs the request
///
/// Used when the rendering pipeline runs out of process and is triggered by
/// other means.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopGenerator;

#[async_trait]
impl ContentGenerator for NoopGenerator {
    async fn generate(&self, channel: &str, count: usize) -> Result<()> {
        tracing::info!(channel = %channel, count = count, "content generation requested (noop)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_generator() {
        assert!(NoopGenerator.generate("channel_1", 3).await.is_ok());
    }
}
