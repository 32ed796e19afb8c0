//! upcast - rate-limited media upload scheduler
//!
//! Coordinates recurring publication of pre-rendered media artifacts across
//! multiple independent channels, honoring a platform-imposed minimum spacing
//! between publications and recovering from unpredictable daily-quota
//! exhaustion by re-planning the remaining batch one day out.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`models`] - Core data structures (channels, artifacts, credentials)
//! - [`ledger`] - Append-only per-channel publication history
//! - [`scheduler`] - Slot planning, claims, publish tasks and coordination
//! - [`publish`] - Remote publish interface boundary
//! - [`content`] - Content-generation trigger boundary
//! - [`utils`] - Common utilities and helpers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use upcast::config::Config;
//! use upcast::content::NoopGenerator;
//! use upcast::publish::DryRunPublisher;
//! use upcast::scheduler::{ChannelScheduler, Coordinator, SchedulerState};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     config.validate()?;
//!
//!     let state = Arc::new(SchedulerState::new());
//!     let publisher = Arc::new(DryRunPublisher);
//!
//!     let mut schedulers = Vec::new();
//!     for channel in config.channel_models() {
//!         let scheduler = Arc::new(ChannelScheduler::new(
//!             channel,
//!             config.policy.clone(),
//!             Arc::clone(&state),
//!             publisher.clone(),
//!         ));
//!         scheduler.init().await?;
//!         schedulers.push(scheduler);
//!     }
//!
//!     let coordinator = Coordinator::new(
//!         config.policy.clone(),
//!         state,
//!         schedulers,
//!         Arc::new(NoopGenerator),
//!     );
//!     let _handles = coordinator.start();
//!     tokio::signal::ctrl_c().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod content;
pub mod error;
pub mod ledger;
pub mod models;
pub mod publish;
pub mod scheduler;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::content::{ContentGenerator, NoopGenerator};
    pub use crate::error::{Error, ErrorCategory, Result};
    pub use crate::ledger::{Ledger, LedgerEntry};
    pub use crate::models::{Artifact, ArtifactId, Channel, Credentials, Visibility};
    pub use crate::publish::{DryRunPublisher, MediaPublisher, PublishError, PublishRequest};
    pub use crate::scheduler::{ChannelScheduler, Coordinator, SchedulerState, UploadPolicy};
}

// Direct re-exports for convenience
pub use models::{Artifact, ArtifactId, Channel, Credentials};
