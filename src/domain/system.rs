// Copyright (c) 2025 - Cowboy AI, Inc.
//! System Profile Records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::record::{Keyed, Metadata, RecordKind, Timestamped};

/// Deployment environment inside a [`System`]
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Environment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boot_url: Option<String>,
    /// Logical network name → physical network name
    #[serde(default)]
    pub networks: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
}

impl Environment {
    /// Physical network behind a logical name
    pub fn physical_network(&self, logical: &str) -> Option<&str> {
        self.networks.get(logical).map(String::as_str)
    }
}

/// System profile: valid roles and environments for a class of machines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct System {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,
    #[serde(default)]
    pub roles: BTreeSet<String>,
    #[serde(default)]
    pub environments: BTreeMap<String, Environment>,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
    pub last_updated: DateTime<Utc>,
}

impl System {
    /// Identity: the short name when present, otherwise the name
    pub fn id(&self) -> &str {
        self.short_name.as_deref().unwrap_or(&self.name)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    pub fn environment(&self, name: &str) -> Option<&Environment> {
        self.environments.get(name)
    }
}

impl Keyed for System {
    const KIND: RecordKind = RecordKind::System;

    fn key(&self) -> String {
        self.id().to_string()
    }
}

impl Timestamped for System {
    fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    fn set_last_updated(&mut self, at: DateTime<Utc>) {
        self.last_updated = at;
    }
}
