//! Time-slot planning
//!
//! Pure slot arithmetic: given the ledger tail and the current time, compute
//! the legal publish instant for each artifact of a batch. Slots are strictly
//! arithmetic with no jitter or load-based adjustment, so re-plans are
//! reproducible.

use chrono::{DateTime, Utc};

use super::policy::UploadPolicy;
use crate::ledger::LedgerEntry;

/// Computes legal publish slots for batches on one channel
#[derive(Debug, Clone)]
pub struct SlotPlanner {
    min_spacing: chrono::Duration,
}

impl SlotPlanner {
    /// Create a planner from an upload policy
    pub fn new(policy: &UploadPolicy) -> Self {
        Self {
            min_spacing: policy.min_spacing(),
        }
    }

    /// Earliest legal instant for the first artifact of a new batch
    ///
    /// An empty ledger places the first slot at `now`; otherwise the slot is
    /// `last publish + minimum spacing`, clamped forward to `now`.
    pub fn first_slot(&self, ledger_tail: Option<&LedgerEntry>, now: DateTime<Utc>) -> DateTime<Utc> {
        match ledger_tail {
            None => now,
            Some(tail) => {
                let next_allowed = tail.published_at + self.min_spacing;
                if next_allowed > now {
                    next_allowed
                } else {
                    now
                }
            }
        }
    }

    /// Slot for the `index`-th artifact of a batch starting at `first`
    pub fn slot_for(&self, first: DateTime<Utc>, index: usize) -> DateTime<Utc> {
        first + self.min_spacing * index as i32
    }
}
