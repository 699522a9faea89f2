// Copyright (c) 2025 - Cowboy AI, Inc.
//! Network Records and Value Objects with Validation Invariants

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;
use thiserror::Error;

use super::record::{Keyed, Metadata, RecordKind, Timestamped};

/// Network validation error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Invalid IP address format: {0}")]
    InvalidIpAddress(String),

    #[error("Invalid CIDR notation: {0}")]
    InvalidCidr(String),

    #[error("Invalid prefix length: {0} (must be 0-32 for IPv4, 0-128 for IPv6)")]
    InvalidPrefixLength(u8),

    #[error("Invalid MAC address format: {0}")]
    InvalidMacAddress(String),

    #[error("Invalid MTU: {0} (must be 68-9000)")]
    InvalidMtu(u32),
}

/// IP Address with CIDR notation value object
///
/// Used both for subnet prefixes (`2001:db8::/64`) and for allocated
/// address/prefix pairs (`2001:db8::1/64`). Serialized as its CIDR string.
///
/// # Examples
///
/// ```rust
/// use cim_inventory::domain::IpAddressWithCidr;
///
/// let ip = IpAddressWithCidr::new("192.168.1.10/24").unwrap();
/// assert_eq!(ip.address().to_string(), "192.168.1.10");
/// assert_eq!(ip.prefix_length(), Some(24));
/// assert_eq!(ip.network().as_cidr(), "192.168.1.0/24");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IpAddressWithCidr {
    address: IpAddr,
    prefix_length: Option<u8>,
}

impl IpAddressWithCidr {
    /// Create a new IP address with optional CIDR notation
    pub fn new(cidr: impl AsRef<str>) -> Result<Self, NetworkError> {
        let cidr = cidr.as_ref();

        if let Some((addr_str, prefix_str)) = cidr.split_once('/') {
            let address = IpAddr::from_str(addr_str)
                .map_err(|_| NetworkError::InvalidIpAddress(addr_str.to_string()))?;

            let prefix_length = prefix_str
                .parse::<u8>()
                .map_err(|_| NetworkError::InvalidCidr(cidr.to_string()))?;

            Self::from_parts(address, Some(prefix_length))
        } else {
            let address = IpAddr::from_str(cidr)
                .map_err(|_| NetworkError::InvalidIpAddress(cidr.to_string()))?;

            Ok(Self {
                address,
                prefix_length: None,
            })
        }
    }

    /// Create from separate address and prefix
    pub fn from_parts(address: IpAddr, prefix_length: Option<u8>) -> Result<Self, NetworkError> {
        if let Some(prefix) = prefix_length {
            if prefix > max_prefix(&address) {
                return Err(NetworkError::InvalidPrefixLength(prefix));
            }
        }

        Ok(Self {
            address,
            prefix_length,
        })
    }

    /// Get the IP address
    pub fn address(&self) -> IpAddr {
        self.address
    }

    /// Get the prefix length
    pub fn prefix_length(&self) -> Option<u8> {
        self.prefix_length
    }

    /// Prefix length, treating a bare address as a host route
    pub fn effective_prefix(&self) -> u8 {
        self.prefix_length
            .unwrap_or_else(|| max_prefix(&self.address))
    }

    /// Check if this is an IPv4 address
    pub fn is_ipv4(&self) -> bool {
        matches!(self.address, IpAddr::V4(_))
    }

    /// Check if this is an IPv6 address
    pub fn is_ipv6(&self) -> bool {
        matches!(self.address, IpAddr::V6(_))
    }

    /// Address with all host bits cleared
    pub fn network_address(&self) -> IpAddr {
        let prefix = self.effective_prefix();
        match self.address {
            IpAddr::V4(v4) => IpAddr::V4(Ipv4Addr::from(u32::from(v4) & v4_mask(prefix))),
            IpAddr::V6(v6) => IpAddr::V6(Ipv6Addr::from(u128::from(v6) & v6_mask(prefix))),
        }
    }

    /// The containing prefix (`2001:db8::1/64` → `2001:db8::/64`)
    pub fn network(&self) -> Self {
        Self {
            address: self.network_address(),
            prefix_length: Some(self.effective_prefix()),
        }
    }

    /// Check whether `ip` falls inside this prefix
    pub fn contains(&self, ip: &IpAddr) -> bool {
        let prefix = self.effective_prefix();
        match (self.address, ip) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                let mask = v4_mask(prefix);
                u32::from(net) & mask == u32::from(*ip) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                let mask = v6_mask(prefix);
                u128::from(net) & mask == u128::from(*ip) & mask
            }
            _ => false,
        }
    }

    /// Get as CIDR notation string
    pub fn as_cidr(&self) -> String {
        if let Some(prefix) = self.prefix_length {
            format!("{}/{}", self.address, prefix)
        } else {
            self.address.to_string()
        }
    }
}

fn max_prefix(address: &IpAddr) -> u8 {
    match address {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

pub(crate) fn v4_mask(prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix))
    }
}

pub(crate) fn v6_mask(prefix: u8) -> u128 {
    if prefix == 0 {
        0
    } else {
        u128::MAX << (128 - u32::from(prefix))
    }
}

impl fmt::Display for IpAddressWithCidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_cidr())
    }
}

impl FromStr for IpAddressWithCidr {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for IpAddressWithCidr {
    type Error = NetworkError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<IpAddressWithCidr> for String {
    fn from(value: IpAddressWithCidr) -> Self {
        value.as_cidr()
    }
}

/// MAC Address value object
///
/// Invariants:
/// - Valid MAC address format (6 octets)
/// - Canonical representation (lowercase, colon-separated)
///
/// # Examples
///
/// ```rust
/// use cim_inventory::domain::MacAddress;
///
/// let mac = MacAddress::new("00-11-22-AA-BB-CC").unwrap();
/// assert_eq!(mac.as_str(), "00:11:22:aa:bb:cc");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    /// Create a new MAC address with validation
    pub fn new(mac: impl AsRef<str>) -> Result<Self, NetworkError> {
        let mac = mac.as_ref();
        let mac_clean = mac.replace([':', '-', '.'], "");

        // Invariant: Must be exactly 12 hex digits (6 octets)
        if mac_clean.len() != 12 || !mac_clean.is_ascii() {
            return Err(NetworkError::InvalidMacAddress(mac.to_string()));
        }

        let mut octets = [0u8; 6];
        for (i, chunk) in mac_clean.as_bytes().chunks(2).enumerate() {
            let hex_str = std::str::from_utf8(chunk)
                .map_err(|_| NetworkError::InvalidMacAddress(mac.to_string()))?;
            octets[i] = u8::from_str_radix(hex_str, 16)
                .map_err(|_| NetworkError::InvalidMacAddress(mac.to_string()))?;
        }

        Ok(Self(octets))
    }

    /// Create from raw octets
    pub fn from_octets(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// Get the octets
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Get as canonical string (lowercase, colon-separated)
    pub fn as_str(&self) -> String {
        format!(
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MacAddress {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for MacAddress {
    type Error = NetworkError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MacAddress> for String {
    fn from(value: MacAddress) -> Self {
        value.as_str()
    }
}

/// MTU (Maximum Transmission Unit) value object
///
/// Invariants:
/// - Valid MTU range (68-9000 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Mtu(u32);

impl Mtu {
    /// Minimum MTU (IPv4 minimum)
    pub const MIN: u32 = 68;

    /// Maximum MTU (jumbo frames)
    pub const MAX: u32 = 9000;

    /// Standard Ethernet MTU
    pub const STANDARD_ETHERNET: u32 = 1500;

    /// Create a new MTU with validation
    pub fn new(size: u32) -> Result<Self, NetworkError> {
        if !(Self::MIN..=Self::MAX).contains(&size) {
            return Err(NetworkError::InvalidMtu(size));
        }

        Ok(Self(size))
    }

    /// Get the MTU value
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Check if this is a jumbo frame MTU (>1500)
    pub fn is_jumbo(&self) -> bool {
        self.0 > Self::STANDARD_ETHERNET
    }
}

impl Default for Mtu {
    fn default() -> Self {
        Self(Self::STANDARD_ETHERNET)
    }
}

impl fmt::Display for Mtu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u32> for Mtu {
    type Error = NetworkError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Mtu> for u32 {
    fn from(value: Mtu) -> Self {
        value.0
    }
}

/// How addresses inside a subnet are handed out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationMethod {
    /// Derived from the machine's physical location
    StaticInventory,
    /// Randomly chosen and claimed through the reservation store
    #[default]
    Dynamic,
}

/// A subnet within a [`Network`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subnet {
    pub name: String,
    pub cidr: IpAddressWithCidr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<IpAddr>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dns: Vec<IpAddr>,
    #[serde(default)]
    pub allocation: AllocationMethod,
}

impl Subnet {
    /// Check whether `ip` belongs to this subnet
    pub fn contains(&self, ip: &IpAddr) -> bool {
        self.cidr.contains(ip)
    }
}

/// Physical network record, identified by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub name: String,
    #[serde(default)]
    pub mtu: Mtu,
    #[serde(default)]
    pub subnets: Vec<Subnet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
    pub last_updated: DateTime<Utc>,
}

impl Network {
    /// First subnet containing `ip`
    pub fn subnet_for(&self, ip: &IpAddr) -> Option<&Subnet> {
        self.subnets.iter().find(|subnet| subnet.contains(ip))
    }

    /// Subnet by name
    pub fn subnet(&self, name: &str) -> Option<&Subnet> {
        self.subnets.iter().find(|subnet| subnet.name == name)
    }
}

impl Keyed for Network {
    const KIND: RecordKind = RecordKind::Network;

    fn key(&self) -> String {
        self.name.clone()
    }
}

impl Timestamped for Network {
    fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    fn set_last_updated(&mut self, at: DateTime<Utc>) {
        self.last_updated = at;
    }
}
