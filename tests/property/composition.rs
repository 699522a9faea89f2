// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for Composition
//!
//! A resolved machine is exactly as fresh as its freshest component, and a
//! role its system does not define never yields a partial result.

use chrono::{DateTime, Utc};
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

use cim_inventory::compose::{compose, CompositionError, InventorySnapshot};
use cim_inventory::domain::{
    Environment, InventoryId, Location, MacAddress, Machine, Metadata, Mtu, Network,
    NetworkInterface, System,
};

fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_768_824_000 + secs, 0).expect("timestamp in range")
}

fn network(name: &str, secs: i64) -> Network {
    Network {
        name: name.to_string(),
        mtu: Mtu::default(),
        subnets: vec![],
        domain: None,
        metadata: Metadata::new(),
        last_updated: at(secs),
    }
}

/// One system mapping `logical-i` to `net-i` for each network offset
fn inventory(
    machine_secs: i64,
    system_secs: i64,
    network_secs: &[i64],
    role: &str,
) -> (Machine, InventorySnapshot) {
    let mut env = Environment::default();
    let mut interfaces = BTreeMap::new();
    let mut networks = Vec::new();

    for (i, secs) in network_secs.iter().enumerate() {
        env.networks.insert(format!("logical-{i}"), format!("net-{i}"));
        interfaces.insert(
            format!("logical-{i}"),
            NetworkInterface {
                mac: vec![MacAddress::from_octets([0x02, 0, 0, 0, 0, i as u8])],
                ip: None,
            },
        );
        networks.push(network(&format!("net-{i}"), *secs));
    }

    let system = System {
        name: "compute".to_string(),
        short_name: None,
        roles: ["hypervisor".to_string()].into_iter().collect(),
        environments: [("prod".to_string(), env)].into_iter().collect(),
        metadata: Metadata::new(),
        last_updated: at(system_secs),
    };

    let machine = Machine {
        inventory_id: InventoryId::new("m-1"),
        location: Location::default(),
        tags: BTreeSet::new(),
        network_interfaces: interfaces,
        role: role.to_string(),
        system: "compute".to_string(),
        environment: "prod".to_string(),
        metadata: Metadata::new(),
        last_updated: at(machine_secs),
    };

    (
        machine,
        InventorySnapshot::from_records(vec![system], networks, vec![]),
    )
}

proptest! {
    #[test]
    fn prop_last_updated_is_component_max(
        machine_secs in -100_000i64..100_000,
        system_secs in -100_000i64..100_000,
        network_secs in prop::collection::vec(-100_000i64..100_000, 0..6),
    ) {
        let (machine, snapshot) = inventory(machine_secs, system_secs, &network_secs, "hypervisor");
        let resolved = compose(&machine, &snapshot).unwrap();

        let expected = network_secs
            .iter()
            .copied()
            .chain([machine_secs, system_secs])
            .max()
            .unwrap();
        prop_assert_eq!(resolved.last_updated, at(expected));
        prop_assert_eq!(resolved.interfaces.len(), network_secs.len());
    }

    #[test]
    fn prop_undefined_role_always_fails(
        role in "[a-z]{1,12}".prop_filter("defined role", |r| r != "hypervisor"),
        network_secs in prop::collection::vec(0i64..1_000, 0..4),
    ) {
        let (machine, snapshot) = inventory(0, 0, &network_secs, &role);
        let result = compose(&machine, &snapshot);
        prop_assert!(
            matches!(result, Err(CompositionError::InvalidRole { .. })),
            "expected InvalidRole, got {:?}",
            result
        );
    }
}
