// Copyright (c) 2025 - Cowboy AI, Inc.
//! Record Store Abstraction
//!
//! Every backing store (the version-controlled source of truth once loaded,
//! the queryable NATS cache, the in-memory fixture) is reached through the
//! same minimal key-value contract, [`KvBackend`]. [`InventoryStore`] layers
//! typed access on top of it for any [`Keyed`] record.
//!
//! # Architecture
//!
//! ```text
//! InventoryStore::get::<Machine>("m-1")
//!        │  TableMap: RecordKind::Machine → "inventory_machine"
//!        ▼
//! KvBackend::get("inventory_machine", "m-1") → bytes + revision
//!        │  serde_json
//!        ▼
//!     Machine
//! ```
//!
//! # Decoding Policy
//!
//! - Full-collection scans skip records that fail to decode and log them
//! - Single-record reads fail hard with [`InventoryError::CorruptRecord`]

pub mod memory;
pub mod nats;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::compose::{compose, CompositionError, InventorySnapshot, ResolvedMachine};
use crate::domain::{
    InventoryId, Keyed, MacAddress, Machine, Network, NodeMacIndexEntry, RecordKind, System,
    Timestamped,
};
use crate::errors::{InventoryError, InventoryResult};

pub use memory::MemoryBackend;
pub use nats::{NatsKvBackend, NatsKvConfig};

/// A stored value together with its revision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned {
    pub value: Vec<u8>,
    pub revision: u64,
}

/// Backend-level failures, before record context is attached
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KvError {
    /// Conditional write precondition failed
    #[error("conditional check failed: {0}")]
    Conflict(String),

    /// Backend unreachable or rejected the operation
    #[error("backend error: {0}")]
    Backend(String),
}

/// Result type for backend operations
pub type KvResult<T> = Result<T, KvError>;

/// Minimal key-value contract every backing store implements
///
/// Keys are unique within a table. Revisions increase on every write to a
/// key and are what conditional updates compare against.
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// All live entries of a table
    async fn scan(&self, table: &str) -> KvResult<Vec<(String, Versioned)>>;

    async fn get(&self, table: &str, key: &str) -> KvResult<Option<Versioned>>;

    /// Unconditional upsert
    async fn put(&self, table: &str, key: &str, value: Vec<u8>) -> KvResult<u64>;

    /// Write only if the key is absent
    async fn create(&self, table: &str, key: &str, value: Vec<u8>) -> KvResult<u64>;

    /// Write only if the key still has `revision`
    async fn update(&self, table: &str, key: &str, value: Vec<u8>, revision: u64)
        -> KvResult<u64>;

    /// Remove a key; removing an absent key succeeds
    async fn delete(&self, table: &str, key: &str) -> KvResult<()>;
}

/// Explicit mapping from record kind to backing collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMap {
    tables: BTreeMap<RecordKind, String>,
}

impl TableMap {
    /// One table per kind, named `<prefix>_<kind>`
    pub fn with_prefix(prefix: &str) -> Self {
        let tables = RecordKind::ALL
            .iter()
            .map(|kind| (*kind, format!("{}_{}", prefix, kind.as_str())))
            .collect();
        Self { tables }
    }

    /// Override the collection for one kind
    pub fn with_table(mut self, kind: RecordKind, table: impl Into<String>) -> Self {
        self.tables.insert(kind, table.into());
        self
    }

    pub fn table(&self, kind: RecordKind) -> InventoryResult<&str> {
        self.tables
            .get(&kind)
            .map(String::as_str)
            .ok_or_else(|| InventoryError::Configuration(format!("no table configured for {kind}")))
    }
}

impl Default for TableMap {
    fn default() -> Self {
        Self::with_prefix("inventory")
    }
}

/// Machines composed from one store
#[derive(Debug, Clone, Default)]
pub struct ResolvedBatch {
    pub machines: Vec<ResolvedMachine>,
    /// Identities present as raw records that failed composition
    pub invalid: Vec<(InventoryId, CompositionError)>,
}

/// Typed inventory access over a [`KvBackend`]
#[derive(Clone)]
pub struct InventoryStore {
    name: String,
    backend: Arc<dyn KvBackend>,
    tables: TableMap,
}

impl std::fmt::Debug for InventoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InventoryStore")
            .field("name", &self.name)
            .field("tables", &self.tables)
            .finish()
    }
}

impl InventoryStore {
    pub fn new(name: impl Into<String>, backend: Arc<dyn KvBackend>, tables: TableMap) -> Self {
        Self {
            name: name.into(),
            backend,
            tables,
        }
    }

    /// Store over a fresh [`MemoryBackend`] with default tables
    pub fn in_memory(name: impl Into<String>) -> Self {
        Self::new(name, Arc::new(MemoryBackend::new()), TableMap::default())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn backend(&self) -> &Arc<dyn KvBackend> {
        &self.backend
    }

    pub fn tables(&self) -> &TableMap {
        &self.tables
    }

    /// Every decodable record of a kind; corrupt entries are skipped
    pub async fn fetch_all<T: Keyed>(&self) -> InventoryResult<Vec<T>> {
        let table = self.tables.table(T::KIND)?;
        let entries = self
            .backend
            .scan(table)
            .await
            .map_err(|e| self.backend_error(T::KIND, table, e))?;

        let mut records = Vec::with_capacity(entries.len());
        for (key, entry) in entries {
            match serde_json::from_slice::<T>(&entry.value) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(
                        store = %self.name,
                        kind = %T::KIND,
                        key = %key,
                        error = %e,
                        "Skipping corrupt record"
                    );
                }
            }
        }

        debug!(store = %self.name, kind = %T::KIND, count = records.len(), "Fetched records");
        Ok(records)
    }

    /// One record; absent → `NotFound`, undecodable → `CorruptRecord`
    pub async fn get<T: Keyed>(&self, key: &str) -> InventoryResult<T> {
        self.get_versioned::<T>(key).await.map(|(record, _)| record)
    }

    /// One record with its revision, for conditional updates
    pub async fn get_versioned<T: Keyed>(&self, key: &str) -> InventoryResult<(T, u64)> {
        match self.find_versioned::<T>(key).await? {
            Some(found) => Ok(found),
            None => Err(InventoryError::NotFound {
                kind: T::KIND,
                key: key.to_string(),
            }),
        }
    }

    /// Like [`get`](Self::get) but absence is not an error
    pub async fn find<T: Keyed>(&self, key: &str) -> InventoryResult<Option<T>> {
        Ok(self.find_versioned::<T>(key).await?.map(|(record, _)| record))
    }

    async fn find_versioned<T: Keyed>(&self, key: &str) -> InventoryResult<Option<(T, u64)>> {
        let table = self.tables.table(T::KIND)?;
        let entry = self
            .backend
            .get(table, key)
            .await
            .map_err(|e| self.backend_error(T::KIND, key, e))?;

        match entry {
            Some(entry) => {
                let record = serde_json::from_slice::<T>(&entry.value).map_err(|e| {
                    InventoryError::CorruptRecord {
                        kind: T::KIND,
                        key: key.to_string(),
                        reason: e.to_string(),
                    }
                })?;
                Ok(Some((record, entry.revision)))
            }
            None => Ok(None),
        }
    }

    pub async fn exists<T: Keyed>(&self, key: &str) -> InventoryResult<bool> {
        let table = self.tables.table(T::KIND)?;
        let entry = self
            .backend
            .get(table, key)
            .await
            .map_err(|e| self.backend_error(T::KIND, key, e))?;
        Ok(entry.is_some())
    }

    /// Insert a record whose key must not exist yet
    pub async fn create<T: Keyed>(&self, record: &T) -> InventoryResult<u64> {
        let (table, key, value) = self.encode(record)?;
        self.backend
            .create(table, &key, value)
            .await
            .map_err(|e| self.backend_error(T::KIND, &key, e))
    }

    /// Replace a record that must already exist
    pub async fn update<T: Keyed>(&self, record: &T) -> InventoryResult<u64> {
        let key = record.key();
        let (_, revision) = self.get_versioned_raw(T::KIND, &key).await?;
        self.update_if_revision(record, revision).await
    }

    /// Replace a record only if it is still at `revision`
    pub async fn update_if_revision<T: Keyed>(
        &self,
        record: &T,
        revision: u64,
    ) -> InventoryResult<u64> {
        let (table, key, value) = self.encode(record)?;
        self.backend
            .update(table, &key, value, revision)
            .await
            .map_err(|e| self.backend_error(T::KIND, &key, e))
    }

    /// Create-or-replace
    pub async fn put<T: Keyed>(&self, record: &T) -> InventoryResult<u64> {
        let (table, key, value) = self.encode(record)?;
        self.backend
            .put(table, &key, value)
            .await
            .map_err(|e| self.backend_error(T::KIND, &key, e))
    }

    pub async fn delete<T: Keyed>(&self, key: &str) -> InventoryResult<()> {
        let table = self.tables.table(T::KIND)?;
        self.backend
            .delete(table, key)
            .await
            .map_err(|e| self.backend_error(T::KIND, key, e))
    }

    /// Machine owning `mac`, via the secondary index
    pub async fn machine_by_mac(&self, mac: &MacAddress) -> InventoryResult<Machine> {
        let entry: NodeMacIndexEntry = self.get(&mac.to_string()).await?;
        self.get(entry.inventory_id.as_str()).await
    }

    /// Compose one machine from this store's records
    pub async fn resolve(&self, id: &InventoryId) -> InventoryResult<ResolvedMachine> {
        let machine: Machine = self.get(id.as_str()).await?;
        let snapshot = InventorySnapshot::for_machine(self, &machine).await?;
        Ok(compose(&machine, &snapshot)?)
    }

    /// Compose every machine in this store
    ///
    /// Machines failing composition are reported in
    /// [`ResolvedBatch::invalid`] and do not abort the batch.
    pub async fn resolve_all(&self) -> InventoryResult<ResolvedBatch> {
        let snapshot = InventorySnapshot::load(self).await?;
        let machines: Vec<Machine> = self.fetch_all().await?;

        let mut batch = ResolvedBatch::default();
        for machine in &machines {
            match compose(machine, &snapshot) {
                Ok(resolved) => batch.machines.push(resolved),
                Err(e) => {
                    warn!(
                        store = %self.name,
                        inventory_id = %machine.inventory_id,
                        error = %e,
                        "Machine failed composition"
                    );
                    batch.invalid.push((machine.inventory_id.clone(), e));
                }
            }
        }

        Ok(batch)
    }

    /// Write a resolved machine as its raw records
    ///
    /// System and networks are written before the machine and its MAC
    /// index entries so the store recomposes to the same timestamp. Shared
    /// records already held at the same second or later are left alone, since
    /// other machines in this store compose against them too.
    pub async fn write_resolved(&self, resolved: &ResolvedMachine) -> InventoryResult<()> {
        self.put_if_newer::<System>(&resolved.system).await?;
        for iface in resolved.interfaces.values() {
            self.put_if_newer::<Network>(&iface.network).await?;
        }
        self.write_machine(&resolved.machine).await
    }

    /// Write a machine and refresh its MAC index entries
    ///
    /// Entries for MACs the stored copy had but `machine` no longer carries
    /// are removed, unless another machine has claimed them since.
    pub async fn write_machine(&self, machine: &Machine) -> InventoryResult<()> {
        let previous = self.stored_macs(&machine.inventory_id).await?;
        let current = machine.macs();
        self.drop_index_entries(&machine.inventory_id, previous.difference(&current))
            .await?;

        self.put(machine).await?;
        for entry in machine.mac_index_entries() {
            self.put(&entry).await?;
        }
        Ok(())
    }

    /// Delete a machine together with the index entries pointing at it
    pub async fn remove_machine(&self, id: &InventoryId) -> InventoryResult<()> {
        let macs = self.stored_macs(id).await?;
        self.drop_index_entries(id, macs.iter()).await?;
        self.delete::<Machine>(id.as_str()).await
    }

    async fn put_if_newer<T: Keyed + Timestamped>(&self, record: &T) -> InventoryResult<bool> {
        let current = self.find::<T>(&record.key()).await?;
        if let Some(current) = current {
            if current.last_updated().timestamp() >= record.last_updated().timestamp() {
                debug!(
                    store = %self.name,
                    kind = %T::KIND,
                    key = %record.key(),
                    "Keeping newer shared record"
                );
                return Ok(false);
            }
        }
        self.put(record).await?;
        Ok(true)
    }

    /// MACs of the stored copy of a machine; empty when absent or corrupt
    async fn stored_macs(&self, id: &InventoryId) -> InventoryResult<BTreeSet<MacAddress>> {
        match self.find::<Machine>(id.as_str()).await {
            Ok(machine) => Ok(machine.map(|m| m.macs()).unwrap_or_default()),
            Err(InventoryError::CorruptRecord { reason, .. }) => {
                warn!(
                    store = %self.name,
                    inventory_id = %id,
                    error = %reason,
                    "Stored machine unreadable, leaving its index entries"
                );
                Ok(BTreeSet::new())
            }
            Err(e) => Err(e),
        }
    }

    async fn drop_index_entries<'a>(
        &self,
        id: &InventoryId,
        macs: impl Iterator<Item = &'a MacAddress>,
    ) -> InventoryResult<()> {
        for mac in macs {
            let key = mac.to_string();
            let owned = self
                .find::<NodeMacIndexEntry>(&key)
                .await?
                .is_some_and(|entry| &entry.inventory_id == id);
            if owned {
                self.delete::<NodeMacIndexEntry>(&key).await?;
            }
        }
        Ok(())
    }

    async fn get_versioned_raw(&self, kind: RecordKind, key: &str) -> InventoryResult<(Vec<u8>, u64)> {
        let table = self.tables.table(kind)?;
        let entry = self
            .backend
            .get(table, key)
            .await
            .map_err(|e| self.backend_error(kind, key, e))?;

        entry
            .map(|v| (v.value, v.revision))
            .ok_or_else(|| InventoryError::NotFound {
                kind,
                key: key.to_string(),
            })
    }

    fn encode<T: Keyed>(&self, record: &T) -> InventoryResult<(&str, String, Vec<u8>)> {
        let table = self.tables.table(T::KIND)?;
        let value = serde_json::to_vec(record)?;
        Ok((table, record.key(), value))
    }

    fn backend_error(&self, kind: RecordKind, key: &str, err: KvError) -> InventoryError {
        match err {
            KvError::Conflict(reason) => InventoryError::Conflict {
                kind,
                key: key.to_string(),
                reason,
            },
            KvError::Backend(reason) => {
                InventoryError::Store(format!("{}: {kind} {key}: {reason}", self.name))
            }
        }
    }
}
