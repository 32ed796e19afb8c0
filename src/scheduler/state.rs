//! Shared scheduling state: the claim set and next-allowed-time map
//!
//! One [`SchedulerState`] is shared by every channel scheduler and the status
//! reporter. It exposes only single-key, atomic operations (insert-if-absent,
//! unconditional remove, put, take), so no critical section ever spans more
//! than one of them and no broader lock is needed.
//!
//! Claims are represented as [`ClaimGuard`] values: dropping the guard removes
//! the claim, so release is guaranteed on every exit path of a publish task
//! without relying on manual cleanup calls.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use crate::models::ArtifactId;

type ClaimSet = Arc<Mutex<HashSet<ArtifactId>>>;

/// Process-wide shared scheduling state
///
/// - the **claim set** holds the identifier of every artifact currently owned
///   by exactly one publish attempt; membership is the sole upload-in-progress
///   signal
/// - the **next-allowed-time map** holds, per channel, the earliest instant at
///   which the next batch may start; absence means no batch is planned
#[derive(Debug, Default)]
pub struct SchedulerState {
    claims: ClaimSet,
    next_allowed: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl SchedulerState {
    /// Create empty shared state
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim an artifact for publishing (insert-if-absent)
    ///
    /// Returns `None` when the artifact is already owned by another attempt.
    /// The returned guard releases the claim when dropped.
    pub fn try_claim(&self, id: &ArtifactId) -> Option<ClaimGuard> {
        let inserted = self
            .claims
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone());
        inserted.then(|| ClaimGuard {
            claims: Arc::clone(&self.claims),
            id: id.clone(),
        })
    }

    /// Claim an artifact unconditionally
    ///
    /// Used by the quota re-planner, which takes over identifiers that may
    /// still be held by the failing attempt. When two guards exist for the
    /// same identifier the first drop removes the membership; the second drop
    /// is a no-op.
    pub fn claim_unchecked(&self, id: &ArtifactId) -> ClaimGuard {
        self.claims
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone());
        ClaimGuard {
            claims: Arc::clone(&self.claims),
            id: id.clone(),
        }
    }

    /// Check whether an artifact is currently claimed
    pub fn is_claimed(&self, id: &ArtifactId) -> bool {
        self.claims
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(id)
    }

    /// Number of artifacts currently claimed across all channels
    pub fn claim_count(&self) -> usize {
        self.claims
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Read-only snapshot of the claim set, for status reporting
    pub fn claimed_snapshot(&self) -> HashSet<ArtifactId> {
        self.claims
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Record the earliest instant the channel's next batch may start
    pub fn set_next_time(&self, channel: &str, at: DateTime<Utc>) {
        self.next_allowed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(channel.to_string(), at);
    }

    /// Clear the channel's next-allowed-time (no batch planned)
    pub fn clear_next_time(&self, channel: &str) {
        self.next_allowed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(channel);
    }

    /// Read the channel's next-allowed-time, if a batch is planned
    pub fn peek_next_time(&self, channel: &str) -> Option<DateTime<Utc>> {
        self.next_allowed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(channel)
            .copied()
    }
}

/// Exclusive, temporary ownership of one artifact's publish attempt
///
/// Holds its own handle to the claim set, so dropping the guard removes the
/// claim unconditionally even after the owning task has moved it elsewhere.
#[derive(Debug)]
pub struct ClaimGuard {
    claims: ClaimSet,
    id: ArtifactId,
}

impl ClaimGuard {
    /// The claimed artifact's identifier
    pub fn id(&self) -> &ArtifactId {
        &self.id
    }
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        self.claims
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}
