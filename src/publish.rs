//! Publish interface boundary
//!
//! The remote publish call (authentication, metadata upload, media transfer)
//! is an external collaborator. This module defines the contract the
//! scheduling engine depends on: a [`MediaPublisher`] whose error type makes
//! quota exhaustion distinguishable from every other failure, since that is
//! the sole branch point driving batch re-planning.

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

use crate::models::{Credentials, Visibility};

/// Errors surfaced by a publish backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// The platform's daily upload quota is exhausted; further publishes will
    /// be rejected until the quota resets
    #[error("upload quota exhausted")]
    QuotaExceeded,

    /// The platform rejected this specific artifact (metadata, policy)
    #[error("publish rejected: {reason}")]
    Rejected { reason: String },

    /// Transport-level failure (network, authentication exchange)
    #[error("publish transport failure: {reason}")]
    Transport { reason: String },
}

impl PublishError {
    /// Create a rejection error
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    /// Create a transport error
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }

    /// Whether this failure means the daily quota is exhausted
    ///
    /// Quota exhaustion triggers a batch re-plan; every other failure leaves
    /// the artifact pending for rediscovery on the next coordinator pass.
    pub fn is_quota_exhausted(&self) -> bool {
        matches!(self, Self::QuotaExceeded)
    }
}

/// Inputs of one publish call
#[derive(Debug, Clone)]
pub struct PublishRequest {
    /// Path of the media file to publish
    pub path: PathBuf,

    /// Title shown on the platform
    pub title: String,

    /// Description shown on the platform
    pub description: String,

    /// Requested visibility
    pub visibility: Visibility,

    /// Account credentials, passed through opaquely
    pub credentials: Credentials,
}

/// Remote publish backend contract
#[async_trait]
pub trait MediaPublisher: Send + Sync {
    /// Publish one artifact
    ///
    /// The call may block its worker for as long as the remote transfer
    /// takes; the scheduler runs it on its own task.
    async fn publish(&self, request: &PublishRequest) -> Result<(), PublishError>;
}

/// Publisher that logs the request and reports success
///
/// Stands in for the real remote uploader in dry runs and local development.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunPublisher;

#[async_trait]
impl MediaPublisher for DryRunPublisher {
    async fn publish(&self, request: &PublishRequest) -> Result<(), PublishError> {
        tracing::info!(
            path = %request.path.display(),
            title = %request.title,
            visibility = %request.visibility,
            account = %request.credentials.account_email,
            "dry-run publish"
        );
        Ok(())
    }
}
