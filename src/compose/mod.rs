// Copyright (c) 2025 - Cowboy AI, Inc.
//! Machine Composition
//!
//! Joins a raw [`Machine`] with its [`System`], [`Environment`], [`Network`]s
//! and [`IpReservation`](crate::domain::IpReservation)s into a [`ResolvedMachine`].
//!
//! # Resolution Order
//!
//! ```text
//! machine.system ──► System ──► role ∈ roles ──► Environment
//!                                                    │
//!      for each logical interface ◄──────────────────┘
//!        logical name ──► physical Network ──► subnet config per reservation
//! ```
//!
//! Composition fails closed: any unresolved reference is an error and no
//! partial [`ResolvedMachine`] is produced.
//!
//! A resolved machine is as fresh as its freshest component:
//! `last_updated = max(machine, system, every resolved network)`. Pull-merge
//! relies on this to treat a machine as stale when only its system or one of
//! its networks changed.

pub mod snapshot;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;
use thiserror::Error;

use crate::domain::{
    Environment, InventoryId, IpAddressWithCidr, Machine, Network, NetworkInterface, System,
};

pub use snapshot::{InventoryLookup, InventorySnapshot};

/// Referential-integrity failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompositionError {
    #[error("System not found: {0}")]
    SystemNotFound(String),

    #[error("Role {role} is not defined by system {system}")]
    InvalidRole { role: String, system: String },

    #[error("Environment {environment} not found in system {system}")]
    EnvironmentNotFound { environment: String, system: String },

    #[error("Network not found: {0}")]
    NetworkNotFound(String),

    #[error("Environment {environment} has no network mapped to logical name {logical}")]
    LogicalNameNotFound { logical: String, environment: String },
}

/// Layer-3 configuration of one address on an interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceAddress {
    pub subnet: String,
    pub ip: IpAddressWithCidr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<IpAddr>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dns: Vec<IpAddr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

/// One logical interface with its resolved network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedInterface {
    pub interface: NetworkInterface,
    pub network: Network,
    #[serde(default)]
    pub addresses: Vec<InterfaceAddress>,
}

/// Fully resolved, read-only view of a machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedMachine {
    pub machine: Machine,
    pub system: System,
    pub environment: Environment,
    pub role: String,
    /// Logical network name → resolved interface
    pub interfaces: BTreeMap<String, ResolvedInterface>,
    /// Every address reserved by any of the machine's MACs
    pub ips: Vec<IpAddressWithCidr>,
    pub last_updated: DateTime<Utc>,
}

impl ResolvedMachine {
    pub fn inventory_id(&self) -> &InventoryId {
        &self.machine.inventory_id
    }
}

/// Compose a machine against a lookup
pub fn compose<L>(machine: &Machine, lookup: &L) -> Result<ResolvedMachine, CompositionError>
where
    L: InventoryLookup + ?Sized,
{
    let system = lookup
        .system(&machine.system)
        .ok_or_else(|| CompositionError::SystemNotFound(machine.system.clone()))?;

    if !system.has_role(&machine.role) {
        return Err(CompositionError::InvalidRole {
            role: machine.role.clone(),
            system: system.id().to_string(),
        });
    }

    let environment = system.environment(&machine.environment).ok_or_else(|| {
        CompositionError::EnvironmentNotFound {
            environment: machine.environment.clone(),
            system: system.id().to_string(),
        }
    })?;

    let mut last_updated = machine.last_updated.max(system.last_updated);
    let mut interfaces = BTreeMap::new();
    let mut ips = BTreeSet::new();

    for (logical, iface) in &machine.network_interfaces {
        let physical = environment.physical_network(logical).ok_or_else(|| {
            CompositionError::LogicalNameNotFound {
                logical: logical.clone(),
                environment: machine.environment.clone(),
            }
        })?;

        let network = lookup
            .network(physical)
            .ok_or_else(|| CompositionError::NetworkNotFound(physical.to_string()))?;
        last_updated = last_updated.max(network.last_updated);

        let mut addresses = Vec::new();
        for mac in &iface.mac {
            for reservation in lookup.reservations_by_mac(mac) {
                ips.insert(reservation.ip.clone());
                push_unique(&mut addresses, address_config(network, &reservation.ip));
            }
        }

        if let Some(static_ip) = iface.ip {
            push_unique(&mut addresses, static_address_config(network, static_ip));
        }

        interfaces.insert(
            logical.clone(),
            ResolvedInterface {
                interface: iface.clone(),
                network: network.clone(),
                addresses,
            },
        );
    }

    Ok(ResolvedMachine {
        machine: machine.clone(),
        system: system.clone(),
        environment: environment.clone(),
        role: machine.role.clone(),
        interfaces,
        ips: ips.into_iter().collect(),
        last_updated,
    })
}

fn push_unique(addresses: &mut Vec<InterfaceAddress>, address: Option<InterfaceAddress>) {
    if let Some(address) = address {
        if !addresses.contains(&address) {
            addresses.push(address);
        }
    }
}

/// Static interface IPs carry no prefix; borrow the containing subnet's
fn static_address_config(network: &Network, ip: IpAddr) -> Option<InterfaceAddress> {
    let subnet = network.subnet_for(&ip)?;
    let cidr = IpAddressWithCidr::from_parts(ip, subnet.cidr.prefix_length()).ok()?;
    address_config(network, &cidr)
}

fn address_config(network: &Network, ip: &IpAddressWithCidr) -> Option<InterfaceAddress> {
    let subnet = network.subnet_for(&ip.address())?;
    Some(InterfaceAddress {
        subnet: subnet.name.clone(),
        ip: ip.clone(),
        gateway: subnet.gateway,
        dns: subnet.dns.clone(),
        domain: network.domain.clone(),
    })
}
