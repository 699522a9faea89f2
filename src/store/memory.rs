// Copyright (c) 2025 - Cowboy AI, Inc.
//! In-memory key-value backend
//!
//! Used as the fixture store in tests and as a scratch store for a single
//! reconciliation pass. Conditional writes are checked under one lock, so
//! concurrent `create` calls on the same key have exactly one winner.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

use super::{KvBackend, KvError, KvResult, Versioned};

#[derive(Debug, Default)]
struct Tables {
    tables: HashMap<String, BTreeMap<String, Versioned>>,
    revision: u64,
}

impl Tables {
    fn next_revision(&mut self) -> u64 {
        self.revision += 1;
        self.revision
    }
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: RwLock<Tables>,
    failing: RwLock<HashSet<String>>,
    writes: AtomicU64,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful mutations since creation
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every later mutation of `table` fail with a backend error
    pub async fn fail_writes_to(&self, table: impl Into<String>) {
        self.failing.write().await.insert(table.into());
    }

    /// Number of live keys in a table
    pub async fn len(&self, table: &str) -> usize {
        self.state
            .read()
            .await
            .tables
            .get(table)
            .map_or(0, BTreeMap::len)
    }

    async fn check_writable(&self, table: &str) -> KvResult<()> {
        if self.failing.read().await.contains(table) {
            return Err(KvError::Backend(format!("table {table} is unavailable")));
        }
        Ok(())
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl KvBackend for MemoryBackend {
    async fn scan(&self, table: &str) -> KvResult<Vec<(String, Versioned)>> {
        let state = self.state.read().await;
        Ok(state
            .tables
            .get(table)
            .map(|entries| {
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get(&self, table: &str, key: &str) -> KvResult<Option<Versioned>> {
        let state = self.state.read().await;
        Ok(state.tables.get(table).and_then(|t| t.get(key)).cloned())
    }

    async fn put(&self, table: &str, key: &str, value: Vec<u8>) -> KvResult<u64> {
        self.check_writable(table).await?;
        let mut state = self.state.write().await;
        let revision = state.next_revision();
        state
            .tables
            .entry(table.to_string())
            .or_default()
            .insert(key.to_string(), Versioned { value, revision });
        self.record_write();
        Ok(revision)
    }

    async fn create(&self, table: &str, key: &str, value: Vec<u8>) -> KvResult<u64> {
        self.check_writable(table).await?;
        let mut state = self.state.write().await;
        let exists = state
            .tables
            .get(table)
            .is_some_and(|t| t.contains_key(key));
        if exists {
            return Err(KvError::Conflict(format!("key {key} already exists")));
        }

        let revision = state.next_revision();
        state
            .tables
            .entry(table.to_string())
            .or_default()
            .insert(key.to_string(), Versioned { value, revision });
        self.record_write();
        Ok(revision)
    }

    async fn update(
        &self,
        table: &str,
        key: &str,
        value: Vec<u8>,
        revision: u64,
    ) -> KvResult<u64> {
        self.check_writable(table).await?;
        let mut state = self.state.write().await;
        let current = state
            .tables
            .get(table)
            .and_then(|t| t.get(key))
            .map(|v| v.revision);

        match current {
            Some(current) if current == revision => {
                let next = state.next_revision();
                state
                    .tables
                    .entry(table.to_string())
                    .or_default()
                    .insert(key.to_string(), Versioned { value, revision: next });
                self.record_write();
                Ok(next)
            }
            Some(current) => Err(KvError::Conflict(format!(
                "key {key} is at revision {current}, expected {revision}"
            ))),
            None => Err(KvError::Conflict(format!("key {key} does not exist"))),
        }
    }

    async fn delete(&self, table: &str, key: &str) -> KvResult<()> {
        self.check_writable(table).await?;
        let mut state = self.state.write().await;
        let removed = state
            .tables
            .get_mut(table)
            .and_then(|t| t.remove(key))
            .is_some();
        if removed {
            self.record_write();
        }
        Ok(())
    }
}
