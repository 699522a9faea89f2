// Copyright (c) 2025 - Cowboy AI, Inc.
//! Inventory configuration
//!
//! Everything a caller needs to wire stores and allocators together, passed
//! explicitly into constructors. Loaded from serde sources or the
//! environment:
//!
//! | Variable                        | Default                 |
//! |---------------------------------|-------------------------|
//! | `NATS_URL`                      | `nats://localhost:4222` |
//! | `INVENTORY_CLIENT_NAME`         | `cim-inventory`         |
//! | `INVENTORY_TABLE_PREFIX`        | `inventory`             |
//! | `INVENTORY_KV_HISTORY`          | `1`                     |
//! | `INVENTORY_MAX_ATTEMPTS`        | `16`                    |
//! | `INVENTORY_RETRY_BASE_DELAY_MS` | `10`                    |
//! | `INVENTORY_RETRY_JITTER_MS`     | `50`                    |
//!
//! `NATS_URL` may list several servers separated by commas.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

use crate::allocation::RetryPolicy;
use crate::errors::{InventoryError, InventoryResult};
use crate::store::{InventoryStore, NatsKvBackend, NatsKvConfig, TableMap};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InventoryConfig {
    #[serde(default)]
    pub tables: TableMap,
    #[serde(default)]
    pub nats: NatsKvConfig,
    #[serde(default)]
    pub allocation: RetryPolicy,
}

impl InventoryConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> InventoryResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key lookup, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> InventoryResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(urls) = lookup("NATS_URL") {
            config.nats.servers = urls
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
            if config.nats.servers.is_empty() {
                return Err(InventoryError::Configuration(
                    "NATS_URL lists no servers".to_string(),
                ));
            }
        }
        if let Some(name) = lookup("INVENTORY_CLIENT_NAME") {
            config.nats.name = name;
        }
        if let Some(prefix) = lookup("INVENTORY_TABLE_PREFIX") {
            config.tables = TableMap::with_prefix(&prefix);
        }
        if let Some(history) = parsed(&lookup, "INVENTORY_KV_HISTORY")? {
            config.nats.history = history;
        }
        if let Some(attempts) = parsed(&lookup, "INVENTORY_MAX_ATTEMPTS")? {
            config.allocation.max_attempts = attempts;
        }
        if let Some(delay) = parsed(&lookup, "INVENTORY_RETRY_BASE_DELAY_MS")? {
            config.allocation.base_delay_ms = delay;
        }
        if let Some(jitter) = parsed(&lookup, "INVENTORY_RETRY_JITTER_MS")? {
            config.allocation.max_jitter_ms = jitter;
        }

        Ok(config)
    }

    /// Connect to NATS and open the cache store
    pub async fn connect_cache(&self, name: &str) -> InventoryResult<InventoryStore> {
        let backend = NatsKvBackend::connect(&self.nats).await?;
        Ok(InventoryStore::new(name, Arc::new(backend), self.tables.clone()))
    }
}

fn parsed<F, T>(lookup: &F, key: &str) -> InventoryResult<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| InventoryError::Configuration(format!("{key}={raw:?}: {e}")))
        })
        .transpose()
}
