// Copyright (c) 2025 - Cowboy AI, Inc.
//! Address Allocation
//!
//! Two ways to hand out addresses:
//!
//! - **Deterministic** ([`location`]): an IPv6 address derived from a
//!   machine's physical coordinates. Two machines in different slots can
//!   never collide, so no coordination is needed.
//! - **Dynamic** ([`reservation`]): a random candidate claimed through a
//!   conditional create in the [`ReservationStore`], retried under a
//!   [`RetryPolicy`].
//!
//! # Location Word
//!
//! ```text
//!  31                    10 9      4 3    0
//! ┌────────────────────────┬────────┬──────┐
//! │ rack (base-36, 22 bit) │ U (6)  │ sub  │
//! └────────────────────────┴────────┴──────┘
//! ```

pub mod location;
pub mod reservation;

use thiserror::Error;

pub use location::{
    allocate_deterministic_ip, allocate_for_location, allocate_range, location_word, LocationRange,
};
pub use reservation::{ReservationStore, RetryPolicy};

/// Allocation failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AllocationError {
    /// Location-based allocation is defined for IPv6 only
    #[error("Allocation not implemented for {0}")]
    NotImplemented(String),

    #[error("Invalid rack identifier: {0:?}")]
    InvalidRack(String),

    #[error("Invalid sub-chassis index: {0:?}")]
    InvalidSubIndex(String),

    #[error("Bottom rack unit {0} does not fit in 6 bits")]
    BottomUnitOutOfRange(u8),

    #[error("Prefix /{0} leaves no room for a 32-bit location word")]
    PrefixTooLong(u8),

    /// Subnet has no assignable host addresses
    #[error("Subnet {0} has no assignable addresses")]
    SubnetTooSmall(String),

    /// Location addresses are only handed out on static-inventory subnets
    #[error("Subnet {0} does not use static inventory allocation")]
    NotStaticInventory(String),

    #[error("MAC {mac} does not belong to machine {inventory_id}")]
    ForeignMac { mac: String, inventory_id: String },

    /// Every candidate lost its race
    #[error("Allocation exhausted after {attempts} attempts")]
    Exhausted { attempts: u32 },
}

impl AllocationError {
    /// Input problems, as opposed to losing to concurrent allocators
    pub fn is_validation(&self) -> bool {
        !matches!(self, AllocationError::Exhausted { .. })
    }
}
