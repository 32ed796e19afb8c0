//! Upload scheduling engine
//!
//! This module decides *when* each pending artifact may be published, tracks
//! in-flight work so nothing is published twice, derives the next legal
//! publish time from each channel's durable publication ledger, and re-plans
//! a whole batch when the remote platform rejects a publish with quota
//! exhaustion.
//!
//! # Overview
//!
//! Each channel's staging directory is scanned on a fixed period. Pending
//! artifacts are planned into arithmetic time slots (`first + i * spacing`)
//! derived from the ledger tail, claimed in a process-wide claim set, and
//! published by asynchronous tasks that archive the file and append the
//! ledger on success. Quota exhaustion shifts the unprocessed batch tail one
//! day out while artifacts already published stay untouched.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      Coordinator Loop                        │
//! │   per-channel tick (15 min)          status tick (1 min)     │
//! │        │                                   │                 │
//! │        ▼                                   ▼                 │
//! │  ┌───────────────┐   reads only   ┌────────────────┐         │
//! │  │ ChannelSched. │───────────────▶│ SchedulerState │         │
//! │  │  plan_batch   │  claims/times  │ claims + times │         │
//! │  └──────┬────────┘                └────────────────┘         │
//! │         │ spawns                                             │
//! │         ▼                                                    │
//! │  publish task ──▶ publisher ──▶ archive + ledger append      │
//! │         │ quota exhausted                                    │
//! │         └──▶ re-plan batch tail (now + 24h)                  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`planner`] - pure slot arithmetic from the ledger tail
//! - [`state`] - shared claim set and next-allowed-time map
//! - [`channel`] - per-channel batch planning, publish tasks, quota re-plan
//! - [`coordinator`] - periodic triggers, top-up and status reporting
//! - [`policy`] - tunable scheduling constants
//! - [`error`] - scheduler error types

pub mod channel;
pub mod coordinator;
pub mod error;
pub mod planner;
pub mod policy;
pub mod state;

// Re-export main types
pub use channel::ChannelScheduler;
pub use coordinator::{Coordinator, PassGuard, PassToken};
pub use error::{SchedulerError, SchedulerResult};
pub use planner::SlotPlanner;
pub use policy::{UploadPolicy, UploadPolicyBuilder};
pub use state::{ClaimGuard, SchedulerState};
