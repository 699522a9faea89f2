// Copyright (c) 2025 - Cowboy AI, Inc.
//! Machine Record
//!
//! A physical machine as maintained by the upstream editor. The identity is
//! immutable; every other field is replaced wholesale on update.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::net::IpAddr;

use super::network::MacAddress;
use super::record::{Keyed, Metadata, RecordKind, Timestamped};

/// Inventory identity of a machine
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InventoryId(String);

impl InventoryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InventoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InventoryId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Physical placement of a machine
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Location {
    pub building: String,
    pub room: String,
    /// Rack identifier, base-36; the last four characters are significant
    pub rack: String,
    /// Lowest rack unit the chassis occupies
    pub bottom_u: u8,
    /// Slot within a multi-node chassis, one hex digit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_index: Option<String>,
}

/// Interface descriptor for one logical network
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NetworkInterface {
    #[serde(default)]
    pub mac: Vec<MacAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<IpAddr>,
}

/// Raw machine record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Machine {
    pub inventory_id: InventoryId,
    pub location: Location,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
    /// Logical network name → interface descriptor
    #[serde(default)]
    pub network_interfaces: BTreeMap<String, NetworkInterface>,
    pub role: String,
    pub system: String,
    pub environment: String,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
    pub last_updated: DateTime<Utc>,
}

impl Machine {
    /// Every MAC across all interfaces, deduplicated
    pub fn macs(&self) -> BTreeSet<MacAddress> {
        self.network_interfaces
            .values()
            .flat_map(|iface| iface.mac.iter().copied())
            .collect()
    }

    /// MAC index entries for this machine, stamped with its timestamp
    pub fn mac_index_entries(&self) -> Vec<NodeMacIndexEntry> {
        self.macs()
            .into_iter()
            .map(|mac| NodeMacIndexEntry {
                mac,
                inventory_id: self.inventory_id.clone(),
                last_updated: self.last_updated,
            })
            .collect()
    }
}

impl Keyed for Machine {
    const KIND: RecordKind = RecordKind::Machine;

    fn key(&self) -> String {
        self.inventory_id.to_string()
    }
}

impl Timestamped for Machine {
    fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    fn set_last_updated(&mut self, at: DateTime<Utc>) {
        self.last_updated = at;
    }
}

/// Secondary index: MAC → machine identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMacIndexEntry {
    pub mac: MacAddress,
    pub inventory_id: InventoryId,
    pub last_updated: DateTime<Utc>,
}

impl Keyed for NodeMacIndexEntry {
    const KIND: RecordKind = RecordKind::MacIndex;

    fn key(&self) -> String {
        self.mac.to_string()
    }
}
