// Copyright (c) 2025 - Cowboy AI, Inc.
//! Record identity and collection dispatch
//!
//! Every persisted entity implements [`Keyed`], which names its
//! [`RecordKind`] and natural key. Stores map a kind to a collection through
//! an explicit [`TableMap`](crate::store::TableMap) built from configuration.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Free-form metadata attached to inventory records
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Persisted entity kinds, one logical collection each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Machine,
    Network,
    System,
    Reservation,
    MacIndex,
}

impl RecordKind {
    /// All kinds, in push-merge dependency order
    pub const ALL: [RecordKind; 5] = [
        RecordKind::System,
        RecordKind::Network,
        RecordKind::Machine,
        RecordKind::MacIndex,
        RecordKind::Reservation,
    ];

    /// Stable short name used for collection names and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Machine => "machine",
            RecordKind::Network => "network",
            RecordKind::System => "system",
            RecordKind::Reservation => "reservation",
            RecordKind::MacIndex => "mac_index",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An entity stored under a natural identity string
pub trait Keyed: Serialize + DeserializeOwned + Send + Sync {
    /// Collection this entity lives in
    const KIND: RecordKind;

    /// Natural identity
    fn key(&self) -> String;
}

/// An entity carrying a last-modified timestamp
pub trait Timestamped {
    fn last_updated(&self) -> DateTime<Utc>;

    fn set_last_updated(&mut self, at: DateTime<Utc>);
}
