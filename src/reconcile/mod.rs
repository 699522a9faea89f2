// Copyright (c) 2025 - Cowboy AI, Inc.
//! Store Reconciliation
//!
//! Two one-way protocols move inventory between stores:
//!
//! - **Pull-merge** ([`copy_updated_nodes`]): compares *resolved* machines by
//!   `last_updated` and copies whatever is missing or stale in the sink, then
//!   deletes sink machines the source no longer has. Last write wins.
//! - **Push-merge** ([`update_from_inventory_store`]): copies raw records
//!   wholesale in dependency order. Nothing is deleted.
//!
//! # Pull-merge
//!
//! ```text
//! source.resolve_all()      sink.resolve_all()
//!         │                        │
//!         └──────► compare ◄───────┘
//!                    │
//!   absent in sink or sink older ──► sink.write_resolved()
//!   sink newer or equal          ──► unchanged
//!   absent in source             ──► sink.remove_machine()
//! ```
//!
//! Timestamps are compared at whole-second granularity, matching what the
//! slowest backing store can represent.
//!
//! Neither protocol is transactional. Every write is an idempotent
//! overwrite, so a run that fails midway is repaired by running it again.

pub mod pull;
pub mod push;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use pull::copy_updated_nodes;
pub use push::update_from_inventory_store;

/// Outcome of one reconciliation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Correlates the run's log lines
    pub run_id: Uuid,
    /// Records (pull: machines, push: raw records) written to the sink
    pub written: usize,
    /// Machines removed from the sink
    pub deleted: usize,
    /// Machines already current in the sink
    pub unchanged: usize,
    /// Source machines that failed composition and were left alone
    pub skipped: usize,
}

impl SyncReport {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::now_v7(),
            written: 0,
            deleted: 0,
            unchanged: 0,
            skipped: 0,
        }
    }

    /// True when the run changed nothing in the sink
    pub fn is_noop(&self) -> bool {
        self.written == 0 && self.deleted == 0
    }
}

impl Default for SyncReport {
    fn default() -> Self {
        Self::new()
    }
}
