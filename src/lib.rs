// Copyright (c) 2025 - Cowboy AI, Inc.
//! Inventory composition and reconciliation for the Composable Information Machine
//!
//! Normalized inventory records (machines, networks, system profiles, IP
//! reservations) are joined into resolved machines, kept in sync across
//! backing stores by last-write-wins reconciliation, and addressed through a
//! location-derived IPv6 allocator with conflict-safe reservations.
//!
//! # Data Flow
//!
//! ```text
//! commit history ──► history::resolve_timestamps ──► raw records
//!                                                        │
//!                                           compose::compose
//!                                                        ▼
//!                                              ResolvedMachine
//!                                                        │
//!            reconcile::{copy_updated_nodes, update_from_inventory_store}
//!                                                        ▼
//!                                     store::InventoryStore (KvBackend)
//!
//! allocation::{allocate_deterministic_ip, ReservationStore} ──► reservations
//! ```

pub mod allocation;
pub mod compose;
pub mod config;
pub mod domain;
pub mod errors;
pub mod history;
pub mod reconcile;
pub mod store;

// Re-export commonly used types
pub use allocation::{
    allocate_deterministic_ip, allocate_range, AllocationError, ReservationStore, RetryPolicy,
};
pub use compose::{compose, CompositionError, InventorySnapshot, ResolvedMachine};
pub use config::InventoryConfig;
pub use errors::{ErrorCategory, InventoryError, InventoryResult};
pub use history::{resolve_timestamps, HistorySource, TimestampMap};
pub use reconcile::{copy_updated_nodes, update_from_inventory_store, SyncReport};
pub use store::{InventoryStore, KvBackend, MemoryBackend, NatsKvBackend, TableMap};
