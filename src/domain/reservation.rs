// Copyright (c) 2025 - Cowboy AI, Inc.
//! IP Reservation Record
//!
//! A reservation is keyed by its (subnet-prefix, IP) pair. At most one
//! reservation exists per key; a MAC may hold reservations in many subnets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use super::network::{IpAddressWithCidr, MacAddress};
use super::record::{Keyed, RecordKind};

/// Lease of one address to one MAC
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpReservation {
    pub mac: MacAddress,
    /// Allocated address with the prefix length of its subnet
    pub ip: IpAddressWithCidr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_info: Option<String>,
}

impl IpReservation {
    pub fn new(mac: MacAddress, ip: IpAddressWithCidr) -> Self {
        Self {
            mac,
            ip,
            start: None,
            end: None,
            host_info: None,
        }
    }

    pub fn with_host_info(mut self, info: impl Into<String>) -> Self {
        self.host_info = Some(info.into());
        self
    }

    pub fn with_window(mut self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    /// Containing subnet prefix
    pub fn subnet(&self) -> IpAddressWithCidr {
        self.ip.network()
    }

    pub fn address(&self) -> IpAddr {
        self.ip.address()
    }

    /// Whether `at` falls inside the validity window (open ends are unbounded)
    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        self.start.map_or(true, |start| start <= at) && self.end.map_or(true, |end| at < end)
    }
}

/// Storage key for a (subnet-prefix, IP) pair
pub fn reservation_key(subnet: &IpAddressWithCidr, ip: &IpAddr) -> String {
    format!("{}|{}", subnet.network().as_cidr(), ip)
}

impl Keyed for IpReservation {
    const KIND: RecordKind = RecordKind::Reservation;

    fn key(&self) -> String {
        reservation_key(&self.subnet(), &self.address())
    }
}
