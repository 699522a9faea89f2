// Copyright (c) 2025 - Cowboy AI, Inc.
//! Test Fixtures for cim-inventory
//!
//! Deterministic inventory records shared by the integration suites.
//!
//! # Design Principles
//! - All timestamps derive from one fixed instant (no `Utc::now()`)
//! - One system (`compute`) with a `prod` environment mapping two logical
//!   networks onto physical ones
//! - Machines differ only in identity, MAC, slot and timestamp

#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;

use cim_inventory::domain::{
    AllocationMethod, Environment, InventoryId, IpAddressWithCidr, Location, MacAddress, Machine,
    Metadata, Mtu, Network, NetworkInterface, Subnet, System,
};
use cim_inventory::store::{InventoryStore, MemoryBackend, TableMap};

// Fixed test timestamp (2026-01-19T12:00:00Z)
pub const FIXED_TIMESTAMP: &str = "2026-01-19T12:00:00Z";

pub const SYSTEM_NAME: &str = "compute";
pub const ENVIRONMENT: &str = "prod";
pub const ROLE: &str = "hypervisor";

pub const MGMT_NETWORK: &str = "dc1-mgmt";
pub const DATA_NETWORK: &str = "dc1-data";

pub const MGMT_CIDR: &str = "2001:db8:0:1::/64";
pub const DATA_CIDR: &str = "10.20.0.0/24";

pub const RACK: &str = "xr20";

/// Parse the fixed timestamp
pub fn fixed_timestamp() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(FIXED_TIMESTAMP)
        .expect("Invalid timestamp in test fixture")
        .with_timezone(&Utc)
}

/// Fixed timestamp shifted by whole seconds
pub fn at(offset_secs: i64) -> DateTime<Utc> {
    fixed_timestamp() + Duration::seconds(offset_secs)
}

/// Locally administered MAC ending in `n`
pub fn mac(n: u8) -> MacAddress {
    MacAddress::from_octets([0x02, 0x00, 0x5e, 0x00, 0x01, n])
}

pub fn cidr(s: &str) -> IpAddressWithCidr {
    IpAddressWithCidr::new(s).expect("Invalid CIDR in test fixture")
}

pub fn system_fixture() -> System {
    let mut prod = Environment::default();
    prod.networks.insert("mgmt".to_string(), MGMT_NETWORK.to_string());
    prod.networks.insert("data".to_string(), DATA_NETWORK.to_string());

    System {
        name: SYSTEM_NAME.to_string(),
        short_name: None,
        roles: [ROLE, "storage"].iter().map(|r| r.to_string()).collect(),
        environments: [(ENVIRONMENT.to_string(), prod)].into_iter().collect(),
        metadata: Metadata::new(),
        last_updated: fixed_timestamp(),
    }
}

pub fn mgmt_network() -> Network {
    Network {
        name: MGMT_NETWORK.to_string(),
        mtu: Mtu::default(),
        subnets: vec![Subnet {
            name: "mgmt-v6".to_string(),
            cidr: cidr(MGMT_CIDR),
            gateway: Some("2001:db8:0:1::1".parse().expect("gateway")),
            dns: vec!["2001:db8:0:1::53".parse().expect("dns")],
            allocation: AllocationMethod::StaticInventory,
        }],
        domain: Some("mgmt.dc1.example.com".to_string()),
        metadata: Metadata::new(),
        last_updated: fixed_timestamp(),
    }
}

pub fn data_network() -> Network {
    Network {
        name: DATA_NETWORK.to_string(),
        mtu: Mtu::new(9000).expect("jumbo MTU"),
        subnets: vec![Subnet {
            name: "data-v4".to_string(),
            cidr: cidr(DATA_CIDR),
            gateway: Some("10.20.0.1".parse().expect("gateway")),
            dns: vec![],
            allocation: AllocationMethod::Dynamic,
        }],
        domain: None,
        metadata: Metadata::new(),
        last_updated: fixed_timestamp(),
    }
}

/// Machine `id` in slot U`n` of [`RACK`], with one MAC on the mgmt network
pub fn machine_fixture(id: &str, n: u8, last_updated: DateTime<Utc>) -> Machine {
    Machine {
        inventory_id: InventoryId::new(id),
        location: Location {
            building: "dc1".to_string(),
            room: "hall-a".to_string(),
            rack: RACK.to_string(),
            bottom_u: n,
            sub_index: None,
        },
        tags: BTreeSet::new(),
        network_interfaces: [(
            "mgmt".to_string(),
            NetworkInterface {
                mac: vec![mac(n)],
                ip: None,
            },
        )]
        .into_iter()
        .collect(),
        role: ROLE.to_string(),
        system: SYSTEM_NAME.to_string(),
        environment: ENVIRONMENT.to_string(),
        metadata: Metadata::new(),
        last_updated,
    }
}

/// Store over a memory backend the test keeps a handle to
pub fn memory_store(name: &str) -> (InventoryStore, Arc<MemoryBackend>) {
    let backend = Arc::new(MemoryBackend::new());
    let store = InventoryStore::new(name, backend.clone(), TableMap::default());
    (store, backend)
}

/// Write the shared system and networks plus `machines`
pub async fn seed(store: &InventoryStore, machines: &[Machine]) {
    store.put(&system_fixture()).await.expect("seed system");
    store.put(&mgmt_network()).await.expect("seed mgmt network");
    store.put(&data_network()).await.expect("seed data network");
    for machine in machines {
        store.write_machine(machine).await.expect("seed machine");
    }
}

/// Identities of every machine record in `store`
pub async fn machine_ids(store: &InventoryStore) -> BTreeSet<String> {
    store
        .fetch_all::<Machine>()
        .await
        .expect("fetch machines")
        .into_iter()
        .map(|m| m.inventory_id.to_string())
        .collect()
}
