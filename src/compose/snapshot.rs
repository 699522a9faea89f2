// Copyright (c) 2025 - Cowboy AI, Inc.
//! Per-call read cache for composition
//!
//! Composition itself is synchronous. The async store is read once up front
//! into an [`InventorySnapshot`], which is dropped when the call returns.

use std::collections::HashMap;
use tracing::debug;

use crate::domain::{IpReservation, MacAddress, Machine, Network, System};
use crate::errors::InventoryResult;
use crate::store::InventoryStore;

/// Read access the composer needs
pub trait InventoryLookup {
    /// System by identity (short name, else name)
    fn system(&self, id: &str) -> Option<&System>;

    /// Network by name
    fn network(&self, name: &str) -> Option<&Network>;

    /// Every reservation held by `mac`
    fn reservations_by_mac(&self, mac: &MacAddress) -> Vec<&IpReservation>;
}

/// In-memory lookup over a set of records
#[derive(Debug, Clone, Default)]
pub struct InventorySnapshot {
    systems: HashMap<String, System>,
    networks: HashMap<String, Network>,
    reservations: HashMap<MacAddress, Vec<IpReservation>>,
}

impl InventorySnapshot {
    pub fn from_records(
        systems: Vec<System>,
        networks: Vec<Network>,
        reservations: Vec<IpReservation>,
    ) -> Self {
        let mut snapshot = Self::default();
        for system in systems {
            snapshot.insert_system(system);
        }
        for network in networks {
            snapshot.insert_network(network);
        }
        for reservation in reservations {
            snapshot.insert_reservation(reservation);
        }
        snapshot
    }

    /// Every system, network and reservation in `store`
    pub async fn load(store: &InventoryStore) -> InventoryResult<Self> {
        let systems = store.fetch_all::<System>().await?;
        let networks = store.fetch_all::<Network>().await?;
        let reservations = store.fetch_all::<IpReservation>().await?;

        debug!(
            store = %store.name(),
            systems = systems.len(),
            networks = networks.len(),
            reservations = reservations.len(),
            "Loaded inventory snapshot"
        );

        Ok(Self::from_records(systems, networks, reservations))
    }

    /// Only the records `machine` references
    ///
    /// Missing references are left out rather than reported here; the
    /// composer turns them into the matching [`CompositionError`].
    ///
    /// [`CompositionError`]: super::CompositionError
    pub async fn for_machine(store: &InventoryStore, machine: &Machine) -> InventoryResult<Self> {
        let mut snapshot = Self::default();

        let Some(system) = store.find::<System>(&machine.system).await? else {
            return Ok(snapshot);
        };

        if let Some(environment) = system.environment(&machine.environment) {
            for logical in machine.network_interfaces.keys() {
                let Some(physical) = environment.physical_network(logical) else {
                    continue;
                };
                if snapshot.networks.contains_key(physical) {
                    continue;
                }
                if let Some(network) = store.find::<Network>(physical).await? {
                    snapshot.insert_network(network);
                }
            }
        }
        snapshot.insert_system(system);

        let macs = machine.macs();
        if !macs.is_empty() {
            for reservation in store.fetch_all::<IpReservation>().await? {
                if macs.contains(&reservation.mac) {
                    snapshot.insert_reservation(reservation);
                }
            }
        }

        Ok(snapshot)
    }

    fn insert_system(&mut self, system: System) {
        self.systems.insert(system.id().to_string(), system);
    }

    fn insert_network(&mut self, network: Network) {
        self.networks.insert(network.name.clone(), network);
    }

    fn insert_reservation(&mut self, reservation: IpReservation) {
        self.reservations
            .entry(reservation.mac)
            .or_default()
            .push(reservation);
    }
}

impl InventoryLookup for InventorySnapshot {
    fn system(&self, id: &str) -> Option<&System> {
        self.systems.get(id)
    }

    fn network(&self, name: &str) -> Option<&Network> {
        self.networks.get(name)
    }

    fn reservations_by_mac(&self, mac: &MacAddress) -> Vec<&IpReservation> {
        self.reservations
            .get(mac)
            .map(|held| held.iter().collect())
            .unwrap_or_default()
    }
}
