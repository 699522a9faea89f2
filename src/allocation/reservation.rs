// Copyright (c) 2025 - Cowboy AI, Inc.
//! Reservation Store
//!
//! Conflict-safe address claims on top of an [`InventoryStore`]. Every
//! reservation lives under its (subnet-prefix, IP) key, and the two
//! conditional writes are the only concurrency control in the crate:
//!
//! - **create**: succeeds only while the key is absent
//! - **update**: succeeds only while the stored MAC is the caller's and the
//!   entry is unchanged since it was read
//!
//! # Dynamic Allocation
//!
//! ```text
//! attempt 1..=max(max_attempts, 1):
//!     candidate ← random host in subnet
//!     create(candidate) ── Ok ────────► done
//!                       ── Conflict ──► sleep(base + jitter), retry
//!                       ── other ─────► abort
//! bound reached ──► AllocationError::Exhausted
//! ```

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::location::allocate_for_location;
use super::AllocationError;
use crate::domain::{
    reservation_key, AllocationMethod, IpAddressWithCidr, IpReservation, Keyed, MacAddress,
    Machine, Subnet,
};
use crate::errors::{InventoryError, InventoryResult};
use crate::store::InventoryStore;

/// Bounds for the dynamic allocation loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Candidates tried before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Fixed pause between attempts, in milliseconds
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Upper bound of the random extra pause, in milliseconds
    #[serde(default = "default_max_jitter_ms")]
    pub max_jitter_ms: u64,
}

fn default_max_attempts() -> u32 {
    16
}

fn default_base_delay_ms() -> u64 {
    10
}

fn default_max_jitter_ms() -> u64 {
    50
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_jitter_ms: default_max_jitter_ms(),
        }
    }
}

impl RetryPolicy {
    /// No pause between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay_ms: 0,
            max_jitter_ms: 0,
        }
    }

    /// Candidates actually tried; a zero bound still tries once
    pub fn attempt_limit(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Pause before the next attempt: base plus uniform jitter
    pub fn delay(&self) -> Duration {
        let jitter = if self.max_jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=self.max_jitter_ms)
        };
        Duration::from_millis(self.base_delay_ms.saturating_add(jitter))
    }
}

/// Random host address inside `subnet`
///
/// Never the network address; for IPv4 never the broadcast address either.
pub fn random_candidate(subnet: &IpAddressWithCidr) -> Result<IpAddressWithCidr, AllocationError> {
    let prefix = subnet.effective_prefix();
    let mut rng = rand::thread_rng();

    let address = match subnet.network_address() {
        IpAddr::V4(network) => {
            let host_bits = 32 - u32::from(prefix);
            if host_bits < 2 {
                return Err(AllocationError::SubnetTooSmall(subnet.as_cidr()));
            }
            let broadcast = (1u64 << host_bits) - 1;
            let host = rng.gen_range(1..broadcast) as u32;
            IpAddr::V4(Ipv4Addr::from(u32::from(network) | host))
        }
        IpAddr::V6(network) => {
            let host_bits = 128 - u32::from(prefix);
            if host_bits == 0 {
                return Err(AllocationError::SubnetTooSmall(subnet.as_cidr()));
            }
            let last = u128::MAX >> (128 - host_bits);
            let host = rng.gen_range(1..=last);
            IpAddr::V6(Ipv6Addr::from(u128::from(network) | host))
        }
    };

    IpAddressWithCidr::from_parts(address, Some(prefix))
        .map_err(|_| AllocationError::SubnetTooSmall(subnet.as_cidr()))
}

/// Reservation operations over an [`InventoryStore`]
#[derive(Debug, Clone)]
pub struct ReservationStore {
    store: InventoryStore,
}

impl ReservationStore {
    pub fn new(store: InventoryStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &InventoryStore {
        &self.store
    }

    /// Claim an address; `Conflict` when the key is already held
    pub async fn create_reservation(&self, reservation: &IpReservation) -> InventoryResult<u64> {
        let revision = self.store.create(reservation).await?;
        debug!(
            key = %reservation.key(),
            mac = %reservation.mac,
            revision,
            "Reservation created"
        );
        Ok(revision)
    }

    /// Replace a reservation the caller's MAC already holds
    ///
    /// `NotFound` when nothing is reserved under the key. `Conflict` when
    /// another MAC holds it or it changed between read and write.
    pub async fn update_reservation(&self, reservation: &IpReservation) -> InventoryResult<u64> {
        let key = reservation.key();
        let (current, revision) = self.store.get_versioned::<IpReservation>(&key).await?;

        if current.mac != reservation.mac {
            return Err(held_by_other(&key, &current.mac));
        }

        self.store.update_if_revision(reservation, revision).await
    }

    /// Drop a reservation held by `mac`
    pub async fn release_reservation(
        &self,
        ip: &IpAddressWithCidr,
        mac: &MacAddress,
    ) -> InventoryResult<()> {
        let key = reservation_key(ip, &ip.address());
        let current: IpReservation = self.store.get(&key).await?;

        if current.mac != *mac {
            return Err(held_by_other(&key, &current.mac));
        }

        self.store.delete::<IpReservation>(&key).await?;
        debug!(key = %key, mac = %mac, "Reservation released");
        Ok(())
    }

    /// Every reservation held by `mac`
    pub async fn reservations_by_mac(&self, mac: &MacAddress) -> InventoryResult<Vec<IpReservation>> {
        let all: Vec<IpReservation> = self.store.fetch_all().await?;
        Ok(all.into_iter().filter(|r| r.mac == *mac).collect())
    }

    /// Claim a random free address in `subnet` for `mac`
    pub async fn allocate_dynamic(
        &self,
        subnet: &IpAddressWithCidr,
        mac: MacAddress,
        policy: &RetryPolicy,
    ) -> InventoryResult<IpReservation> {
        let limit = policy.attempt_limit();
        let mut attempts = 0;

        while attempts < limit {
            attempts += 1;
            let reservation = IpReservation::new(mac, random_candidate(subnet)?);

            match self.create_reservation(&reservation).await {
                Ok(_) => {
                    info!(
                        subnet = %subnet,
                        ip = %reservation.ip,
                        mac = %mac,
                        attempts,
                        "Dynamic address allocated"
                    );
                    return Ok(reservation);
                }
                Err(e) if e.is_conflict() => {
                    debug!(ip = %reservation.ip, attempt = attempts, "Candidate already reserved");
                    if attempts < limit {
                        tokio::time::sleep(policy.delay()).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        warn!(subnet = %subnet, mac = %mac, attempts, "Dynamic allocation exhausted");
        Err(AllocationError::Exhausted { attempts }.into())
    }

    /// Reserve the location-derived address of `machine` in `subnet`
    ///
    /// Re-reserving an address the same MAC already holds returns the
    /// existing reservation.
    pub async fn reserve_location_address(
        &self,
        subnet: &Subnet,
        machine: &Machine,
        mac: MacAddress,
    ) -> InventoryResult<IpReservation> {
        if subnet.allocation != AllocationMethod::StaticInventory {
            return Err(AllocationError::NotStaticInventory(subnet.name.clone()).into());
        }
        if !machine.macs().contains(&mac) {
            return Err(AllocationError::ForeignMac {
                mac: mac.to_string(),
                inventory_id: machine.inventory_id.to_string(),
            }
            .into());
        }

        let ip = allocate_for_location(&subnet.cidr, &machine.location)?;
        let reservation =
            IpReservation::new(mac, ip).with_host_info(machine.inventory_id.to_string());

        match self.create_reservation(&reservation).await {
            Ok(_) => Ok(reservation),
            Err(e) if e.is_conflict() => {
                let existing: IpReservation = self.store.get(&reservation.key()).await?;
                if existing.mac == mac {
                    Ok(existing)
                } else {
                    Err(e)
                }
            }
            Err(e) => Err(e),
        }
    }
}

fn held_by_other(key: &str, holder: &MacAddress) -> InventoryError {
    InventoryError::Conflict {
        kind: IpReservation::KIND,
        key: key.to_string(),
        reason: format!("reserved by {holder}"),
    }
}
