//! # Synchronization
//!
//! A sync run has two halves:
//!
//! 1. [`diff::compute_sync_operations`] compares the full local set with the
//!    full remote set and returns typed [`SyncOperation`]s. Pure, no I/O.
//! 2. [`executor::execute`] applies them in three concurrent passes:
//!    - **local**: cache-only operations against the primary store
//!    - **remote**: server calls, each yielding a local cleanup applied once
//!      every call has returned
//!    - **backup**: the local operations that touch personal layouts,
//!      mirrored into the backup store
//!
//! Runs are safe to repeat. A failed run leaves completed work in place and the
//! next run picks up from there; a run with no intervening changes on either
//! side computes no operations.
//!
//! ## Conflicts
//!
//! Uploads of changed baselines are optimistic: they carry the server
//! timestamp last seen. A rejected upload re-fetches the server copy and adopts
//! it as the new baseline. The local data that lost the race is kept as the
//! working copy so nothing the user wrote is thrown away.

use std::ops::AddAssign;

pub mod diff;
pub mod executor;

pub use diff::{compute_sync_operations, SyncOperation};

/// What a sync run did, per operation kind.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub added_to_cache: usize,
    pub baselines_updated: usize,
    pub marked_deleted: usize,
    pub deleted_local: usize,
    pub uploaded_new: usize,
    pub uploaded_updated: usize,
    pub deleted_remote: usize,
    /// Uploads the server rejected as stale.
    pub conflicts: usize,
    /// Personal-layout changes written to the backup store.
    pub backed_up: usize,
}

impl SyncReport {
    /// Operations applied to the primary cache or the server.
    pub fn total(&self) -> usize {
        self.added_to_cache
            + self.baselines_updated
            + self.marked_deleted
            + self.deleted_local
            + self.uploaded_new
            + self.uploaded_updated
            + self.deleted_remote
            + self.conflicts
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

impl AddAssign for SyncReport {
    fn add_assign(&mut self, other: Self) {
        self.added_to_cache += other.added_to_cache;
        self.baselines_updated += other.baselines_updated;
        self.marked_deleted += other.marked_deleted;
        self.deleted_local += other.deleted_local;
        self.uploaded_new += other.uploaded_new;
        self.uploaded_updated += other.uploaded_updated;
        self.deleted_remote += other.deleted_remote;
        self.conflicts += other.conflicts;
        self.backed_up += other.backed_up;
    }
}
