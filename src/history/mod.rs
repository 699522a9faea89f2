// Copyright (c) 2025 - Cowboy AI, Inc.
//! Commit-History Timestamp Resolution
//!
//! Inventory records edited in a version-controlled repository carry no
//! trustworthy modification time of their own: the tree only stores content.
//! This module walks the commit history and derives, for every path, the
//! authored time of the newest commit that changed it.
//!
//! # Walk
//!
//! ```text
//! tip ──► c3 ──► c2 ──► c1 (root)
//!   diff(c3, tip)  diff(c2, c3)  diff(c1, c2)  diff(∅, c1)
//! ```
//!
//! Each diff compares a commit's tree against the newer tree seen just
//! before it; changed paths are stamped with the newer commit's authored
//! time. A path keeps the first time recorded for it unless a strictly later
//! one turns up. Paths untouched since the root commit get the root's time.
//!
//! Any commit or tree lookup failure aborts the walk.

pub mod memory;

use chrono::{DateTime, Utc};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

use crate::domain::Timestamped;

pub use memory::MemoryHistory;

/// Commit identifier (hash)
pub type CommitId = String;

/// Tree identifier (hash)
pub type TreeId = String;

/// History walk errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HistoryError {
    #[error("Reference not found: {0}")]
    ReferenceNotFound(String),

    #[error("Commit not found: {0}")]
    CommitNotFound(CommitId),

    #[error("Tree not found: {0}")]
    TreeNotFound(TreeId),

    #[error("History source error: {0}")]
    Source(String),
}

/// A commit as seen by the resolver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub id: CommitId,
    pub tree: TreeId,
    pub parents: Vec<CommitId>,
    pub authored_at: DateTime<Utc>,
}

/// Flattened tree: path → blob id
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Tree {
    pub id: TreeId,
    pub entries: BTreeMap<String, String>,
}

impl Tree {
    /// Paths whose blob differs between `older` (or the empty tree) and `self`
    pub fn changed_since(&self, older: Option<&Tree>) -> Vec<String> {
        let empty = BTreeMap::new();
        let before = older.map(|t| &t.entries).unwrap_or(&empty);

        let mut changed: Vec<String> = self
            .entries
            .iter()
            .filter(|(path, blob)| before.get(*path) != Some(*blob))
            .map(|(path, _)| path.clone())
            .collect();

        changed.extend(
            before
                .keys()
                .filter(|path| !self.entries.contains_key(*path))
                .cloned(),
        );

        changed.sort();
        changed
    }
}

/// Read-only access to a commit graph
pub trait HistorySource {
    /// Commit the branch head points at
    fn head(&self) -> Result<CommitId, HistoryError>;

    fn commit(&self, id: &str) -> Result<Commit, HistoryError>;

    fn tree(&self, id: &str) -> Result<Tree, HistoryError>;

    /// Paths that differ between `older` (or the empty tree) and `newer`
    fn diff(&self, older: Option<&Tree>, newer: &Tree) -> Result<Vec<String>, HistoryError> {
        Ok(newer.changed_since(older))
    }

    /// Commits reachable from `head`, newest first
    fn log(&self, head: &str) -> Result<Vec<CommitId>, HistoryError>;
}

/// Path → last effective change time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimestampMap(BTreeMap<String, DateTime<Utc>>);

impl TimestampMap {
    pub fn get(&self, path: &str) -> Option<DateTime<Utc>> {
        self.0.get(path).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &DateTime<Utc>)> {
        self.0.iter()
    }

    /// Write the resolved time for `path` into `record`
    ///
    /// Returns false, leaving the record untouched, when the path is unknown.
    pub fn stamp<T: Timestamped>(&self, path: &str, record: &mut T) -> bool {
        match self.get(path) {
            Some(at) => {
                record.set_last_updated(at);
                true
            }
            None => false,
        }
    }

    fn record(&mut self, path: String, at: DateTime<Utc>) {
        match self.0.entry(path) {
            Entry::Vacant(slot) => {
                slot.insert(at);
            }
            Entry::Occupied(mut slot) => {
                if at > *slot.get() {
                    slot.insert(at);
                }
            }
        }
    }
}

/// Derive per-path modification times from the history behind the head
pub fn resolve_timestamps<H>(source: &H) -> Result<TimestampMap, HistoryError>
where
    H: HistorySource + ?Sized,
{
    let head = source.head()?;
    let commits = source.log(&head)?;
    debug!(head = %head, commits = commits.len(), "Resolving path timestamps");

    let mut times = TimestampMap::default();
    let mut newer: Option<(Tree, DateTime<Utc>)> = None;

    for id in commits {
        let commit = source.commit(&id)?;
        let tree = source.tree(&commit.tree)?;

        if let Some((newer_tree, newer_time)) = &newer {
            for path in source.diff(Some(&tree), newer_tree)? {
                times.record(path, *newer_time);
            }
        }

        newer = Some((tree, commit.authored_at));
    }

    if let Some((root_tree, root_time)) = newer {
        for path in source.diff(None, &root_tree)? {
            times.record(path, root_time);
        }
    }

    debug!(paths = times.len(), "Resolved path timestamps");
    Ok(times)
}
