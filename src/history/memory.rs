// Copyright (c) 2025 - Cowboy AI, Inc.
//! In-memory commit graph
//!
//! A linear history built commit by commit. Serves as the fixture source for
//! timestamp resolution and for stamping records loaded outside a real
//! repository.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};

use super::{Commit, CommitId, HistoryError, HistorySource, Tree};

#[derive(Debug, Clone, Default)]
pub struct MemoryHistory {
    commits: HashMap<CommitId, Commit>,
    trees: HashMap<String, Tree>,
    head: Option<CommitId>,
    sequence: u64,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a commit on top of the head
    ///
    /// `changes` maps a path to its new blob, or `None` to delete it.
    pub fn append(
        &mut self,
        authored_at: DateTime<Utc>,
        changes: &[(&str, Option<&str>)],
    ) -> CommitId {
        self.sequence += 1;

        let mut entries: BTreeMap<String, String> = self
            .head
            .as_ref()
            .and_then(|head| self.commits.get(head))
            .and_then(|commit| self.trees.get(&commit.tree))
            .map(|tree| tree.entries.clone())
            .unwrap_or_default();

        for (path, blob) in changes {
            match blob {
                Some(blob) => {
                    entries.insert(path.to_string(), blob.to_string());
                }
                None => {
                    entries.remove(*path);
                }
            }
        }

        let tree_id = format!("tree-{}", self.sequence);
        let commit_id = format!("commit-{}", self.sequence);

        self.trees.insert(
            tree_id.clone(),
            Tree {
                id: tree_id.clone(),
                entries,
            },
        );
        self.commits.insert(
            commit_id.clone(),
            Commit {
                id: commit_id.clone(),
                tree: tree_id,
                parents: self.head.iter().cloned().collect(),
                authored_at,
            },
        );
        self.head = Some(commit_id.clone());

        commit_id
    }

    /// Drop a commit's tree, making later lookups fail
    pub fn forget_tree(&mut self, commit: &str) {
        if let Some(tree) = self.commits.get(commit).map(|c| c.tree.clone()) {
            self.trees.remove(&tree);
        }
    }
}

impl HistorySource for MemoryHistory {
    fn head(&self) -> Result<CommitId, HistoryError> {
        self.head
            .clone()
            .ok_or_else(|| HistoryError::ReferenceNotFound("HEAD".to_string()))
    }

    fn commit(&self, id: &str) -> Result<Commit, HistoryError> {
        self.commits
            .get(id)
            .cloned()
            .ok_or_else(|| HistoryError::CommitNotFound(id.to_string()))
    }

    fn tree(&self, id: &str) -> Result<Tree, HistoryError> {
        self.trees
            .get(id)
            .cloned()
            .ok_or_else(|| HistoryError::TreeNotFound(id.to_string()))
    }

    fn log(&self, head: &str) -> Result<Vec<CommitId>, HistoryError> {
        let mut order = Vec::new();
        let mut cursor = Some(head.to_string());

        while let Some(id) = cursor {
            let commit = self.commit(&id)?;
            cursor = commit.parents.first().cloned();
            order.push(id);
        }

        Ok(order)
    }
}
