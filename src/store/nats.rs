// Copyright (c) 2025 - Cowboy AI, Inc.
//! NATS JetStream Key-Value Backend
//!
//! The queryable cache: one JetStream KV bucket per table. Bucket revisions
//! back the conditional writes, so `create` and `update` keep their
//! compare-and-swap semantics across processes. A create is an update
//! against the key's last sequence: 0 when the key was never written, or
//! the tombstone's revision after a delete.
//!
//! KV keys are restricted to `[-/_=.a-zA-Z0-9]`; inventory keys (MACs,
//! CIDRs) are therefore stored hex-encoded.
//!
//! # Example
//!
//! ```rust,no_run
//! use cim_inventory::store::{InventoryStore, NatsKvBackend, NatsKvConfig, TableMap};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = NatsKvBackend::connect(&NatsKvConfig::default()).await?;
//!     let cache = InventoryStore::new("cache", Arc::new(backend), TableMap::default());
//!     let batch = cache.resolve_all().await?;
//!     println!("{} machines", batch.machines.len());
//!     Ok(())
//! }
//! ```

use async_nats::jetstream::{self, kv};
use async_nats::ConnectOptions;
use async_trait::async_trait;
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Display;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{KvBackend, KvError, KvResult, Versioned};
use crate::errors::{InventoryError, InventoryResult};

/// Configuration for the NATS KV backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NatsKvConfig {
    /// NATS server URLs
    pub servers: Vec<String>,

    /// Client name
    pub name: String,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Revisions kept per key
    #[serde(default = "default_history")]
    pub history: i64,
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_history() -> i64 {
    1
}

impl Default for NatsKvConfig {
    fn default() -> Self {
        Self {
            servers: vec!["nats://localhost:4222".to_string()],
            name: "cim-inventory".to_string(),
            connect_timeout_secs: default_connect_timeout(),
            history: default_history(),
        }
    }
}

/// JetStream KV-backed [`KvBackend`]
pub struct NatsKvBackend {
    jetstream: jetstream::Context,
    buckets: Mutex<HashMap<String, kv::Store>>,
    history: i64,
}

impl NatsKvBackend {
    /// Connect to NATS with the given configuration
    pub async fn connect(config: &NatsKvConfig) -> InventoryResult<Self> {
        let options = ConnectOptions::new()
            .name(&config.name)
            .connection_timeout(Duration::from_secs(config.connect_timeout_secs));

        let client = async_nats::connect_with_options(config.servers.join(","), options)
            .await
            .map_err(|e| InventoryError::Store(format!("NATS connection error: {e}")))?;

        info!("Connected to NATS at {:?}", config.servers);
        Ok(Self::new(client, config.history))
    }

    /// Wrap an existing client
    pub fn new(client: async_nats::Client, history: i64) -> Self {
        Self {
            jetstream: jetstream::new(client),
            buckets: Mutex::new(HashMap::new()),
            history,
        }
    }

    async fn bucket(&self, table: &str) -> KvResult<kv::Store> {
        let mut buckets = self.buckets.lock().await;
        if let Some(store) = buckets.get(table) {
            return Ok(store.clone());
        }

        let store = self
            .jetstream
            .create_key_value(kv::Config {
                bucket: table.to_string(),
                history: self.history,
                ..Default::default()
            })
            .await
            .map_err(backend_err)?;

        debug!(bucket = %table, "Opened KV bucket");
        buckets.insert(table.to_string(), store.clone());
        Ok(store)
    }

    async fn live_entry(store: &kv::Store, key: &str) -> KvResult<Option<Versioned>> {
        let entry = store.entry(encode_key(key)).await.map_err(backend_err)?;
        Ok(entry
            .filter(|e| matches!(e.operation, kv::Operation::Put))
            .map(|e| Versioned {
                value: e.value.to_vec(),
                revision: e.revision,
            }))
    }
}

#[async_trait]
impl KvBackend for NatsKvBackend {
    async fn scan(&self, table: &str) -> KvResult<Vec<(String, Versioned)>> {
        let store = self.bucket(table).await?;
        let keys: Vec<String> = store
            .keys()
            .await
            .map_err(backend_err)?
            .try_collect()
            .await
            .map_err(backend_err)?;

        let mut entries = Vec::with_capacity(keys.len());
        for encoded in keys {
            let Some(key) = decode_key(&encoded) else {
                debug!(bucket = %table, key = %encoded, "Ignoring foreign key");
                continue;
            };
            if let Some(entry) = Self::live_entry(&store, &key).await? {
                entries.push((key, entry));
            }
        }

        Ok(entries)
    }

    async fn get(&self, table: &str, key: &str) -> KvResult<Option<Versioned>> {
        let store = self.bucket(table).await?;
        Self::live_entry(&store, key).await
    }

    async fn put(&self, table: &str, key: &str, value: Vec<u8>) -> KvResult<u64> {
        let store = self.bucket(table).await?;
        store
            .put(encode_key(key), value.into())
            .await
            .map_err(backend_err)
    }

    async fn create(&self, table: &str, key: &str, value: Vec<u8>) -> KvResult<u64> {
        let store = self.bucket(table).await?;
        let last = store
            .entry(encode_key(key))
            .await
            .map_err(backend_err)?
            .map(|e| (e.operation, e.revision));
        let expected = create_revision(key, last)?;

        // Expected subject sequence 0 means "no message for this key yet".
        match store.update(encode_key(key), value.into(), expected).await {
            Ok(next) => Ok(next),
            Err(e) => {
                let current = Self::live_entry(&store, key).await?;
                Err(classify_update_failure(key, expected, current, e))
            }
        }
    }

    async fn update(
        &self,
        table: &str,
        key: &str,
        value: Vec<u8>,
        revision: u64,
    ) -> KvResult<u64> {
        let store = self.bucket(table).await?;
        match store.update(encode_key(key), value.into(), revision).await {
            Ok(next) => Ok(next),
            Err(e) => {
                // The server reports a sequence mismatch as a generic error;
                // re-read to tell a lost race from an outage.
                let current = Self::live_entry(&store, key).await?;
                match current {
                    None => Err(KvError::Conflict(format!("key {key} does not exist"))),
                    current => Err(classify_update_failure(key, revision, current, e)),
                }
            }
        }
    }

    async fn delete(&self, table: &str, key: &str) -> KvResult<()> {
        let store = self.bucket(table).await?;
        store.delete(encode_key(key)).await.map_err(backend_err)
    }
}

fn backend_err<E: Display>(err: E) -> KvError {
    KvError::Backend(err.to_string())
}

/// Revision a create must expect, given the key's last operation
///
/// An absent key expects 0. A deleted or purged key expects its tombstone's
/// revision so released keys can be created again.
fn create_revision(key: &str, last: Option<(kv::Operation, u64)>) -> KvResult<u64> {
    match last {
        None => Ok(0),
        Some((kv::Operation::Put, _)) => {
            Err(KvError::Conflict(format!("key {key} already exists")))
        }
        Some((kv::Operation::Delete | kv::Operation::Purge, revision)) => Ok(revision),
    }
}

/// Map a failed conditional write, given what the key holds afterwards
fn classify_update_failure<E: Display>(
    key: &str,
    expected: u64,
    current: Option<Versioned>,
    err: E,
) -> KvError {
    match current {
        Some(current) if current.revision == expected => backend_err(err),
        Some(current) if expected == 0 => KvError::Conflict(format!(
            "key {key} already exists at revision {}",
            current.revision
        )),
        Some(current) => KvError::Conflict(format!(
            "key {key} is at revision {}, expected {expected}",
            current.revision
        )),
        None => backend_err(err),
    }
}

fn encode_key(key: &str) -> String {
    hex::encode(key)
}

fn decode_key(encoded: &str) -> Option<String> {
    hex::decode(encoded)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
}
