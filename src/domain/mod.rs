// Copyright (c) 2025 - Cowboy AI, Inc.
//! Inventory Domain Models
//!
//! Normalized inventory records and the value objects they are built from.
//!
//! # Value Objects with Invariants
//!
//! - [`IpAddressWithCidr`] - IPv4/IPv6 with CIDR notation
//! - [`MacAddress`] - 48-bit MAC address validation
//! - [`Mtu`] - Maximum Transmission Unit (68-9000 bytes)
//!
//! # Records
//!
//! - [`Machine`] - physical machine, keyed by [`InventoryId`]
//! - [`Network`] / [`Subnet`] - physical networks
//! - [`System`] / [`Environment`] - system profiles
//! - [`IpReservation`] - address leases, keyed by (subnet-prefix, IP)
//! - [`NodeMacIndexEntry`] - MAC → machine secondary index
//!
//! Every record implements [`Keyed`]; records with a last-modified time
//! implement [`Timestamped`].

pub mod machine;
pub mod network;
pub mod record;
pub mod reservation;
pub mod system;

pub use machine::{InventoryId, Location, Machine, NetworkInterface, NodeMacIndexEntry};
pub use network::{
    AllocationMethod, IpAddressWithCidr, MacAddress, Mtu, Network, NetworkError, Subnet,
};
pub use record::{Keyed, Metadata, RecordKind, Timestamped};
pub use reservation::{reservation_key, IpReservation};
pub use system::{Environment, System};
