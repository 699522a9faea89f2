// Copyright (c) 2025 - Cowboy AI, Inc.
//! Error types for inventory operations
//!
//! Module-level errors ([`CompositionError`], [`AllocationError`],
//! [`HistoryError`], [`NetworkError`]) convert into [`InventoryError`], which
//! carries the coarse [`ErrorCategory`] transport layers map to status codes.

use thiserror::Error;

use crate::allocation::AllocationError;
use crate::compose::CompositionError;
use crate::domain::{NetworkError, RecordKind};
use crate::history::HistoryError;

/// Coarse error taxonomy exposed to collaborators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Requested identity is absent
    NotFound,
    /// Referential integrity or input validation failure
    Validation,
    /// A conditional write lost a race
    Conflict,
    /// A stored record could not be decoded
    CorruptRecord,
    /// Backing store or history source failure
    Upstream,
}

/// Errors that can occur in inventory operations
#[derive(Debug, Error)]
pub enum InventoryError {
    /// Record absent from a store
    #[error("{kind} not found: {key}")]
    NotFound { kind: RecordKind, key: String },

    /// Composition referential-integrity failure
    #[error("Composition failed: {0}")]
    Composition(#[from] CompositionError),

    /// Malformed input value
    #[error("Invalid value: {0}")]
    Network(#[from] NetworkError),

    /// Address allocation failure
    #[error("Allocation failed: {0}")]
    Allocation(#[from] AllocationError),

    /// Conditional write precondition failed
    #[error("Conflict on {kind} {key}: {reason}")]
    Conflict {
        kind: RecordKind,
        key: String,
        reason: String,
    },

    /// Stored record failed to decode
    #[error("Corrupt {kind} record {key}: {reason}")]
    CorruptRecord {
        kind: RecordKind,
        key: String,
        reason: String,
    },

    /// History walk failure
    #[error("History error: {0}")]
    History(#[from] HistoryError),

    /// Backing store unreachable or failed
    #[error("Store error: {0}")]
    Store(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl InventoryError {
    /// Category used by transport layers to pick a status code
    pub fn category(&self) -> ErrorCategory {
        match self {
            InventoryError::NotFound { .. } => ErrorCategory::NotFound,
            InventoryError::Composition(_) | InventoryError::Network(_) => {
                ErrorCategory::Validation
            }
            InventoryError::Allocation(err) if err.is_validation() => ErrorCategory::Validation,
            InventoryError::Allocation(_) => ErrorCategory::Conflict,
            InventoryError::Conflict { .. } => ErrorCategory::Conflict,
            InventoryError::CorruptRecord { .. } => ErrorCategory::CorruptRecord,
            InventoryError::History(_)
            | InventoryError::Store(_)
            | InventoryError::Serialization(_)
            | InventoryError::Configuration(_) => ErrorCategory::Upstream,
        }
    }

    /// True when a conditional write lost its race
    pub fn is_conflict(&self) -> bool {
        matches!(self, InventoryError::Conflict { .. })
    }

    /// True when the requested record does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, InventoryError::NotFound { .. })
    }
}

/// Result type for inventory operations
pub type InventoryResult<T> = Result<T, InventoryError>;

impl From<serde_json::Error> for InventoryError {
    fn from(err: serde_json::Error) -> Self {
        InventoryError::Serialization(err.to_string())
    }
}

impl From<async_nats::Error> for InventoryError {
    fn from(err: async_nats::Error) -> Self {
        InventoryError::Store(err.to_string())
    }
}
