// Copyright (c) 2025 - Cowboy AI, Inc.
//! Location-derived IPv6 addressing
//!
//! The 32-bit location word is spliced in directly after the subnet prefix.
//! For a host address the word's top bit is set and the final bit of the
//! address is set, giving `…::1`. For the slot's delegated range the marker
//! is left clear and the trailing bits span all-zeros to all-ones.
//!
//! ```
//! use cim_inventory::allocation::allocate_deterministic_ip;
//! use cim_inventory::domain::IpAddressWithCidr;
//!
//! let subnet = IpAddressWithCidr::new("2001:db8::/64").unwrap();
//! let ip = allocate_deterministic_ip(&subnet, "xr20", 31, Some("a")).unwrap();
//! assert_eq!(ip.as_cidr(), "2001:db8::e01c:e1fa:0:1/64");
//! ```

use std::net::{IpAddr, Ipv6Addr};

use super::AllocationError;
use crate::domain::{IpAddressWithCidr, Location};

const RACK_DIGITS: usize = 4;
const MAX_BOTTOM_U: u8 = 0x3f;
const HOST_MARKER: u32 = 0x8000_0000;
const WORD_BITS: u8 = 32;

/// Pack rack, bottom unit and sub-index into a location word
pub fn location_word(
    rack: &str,
    bottom_u: u8,
    sub_index: Option<&str>,
) -> Result<u32, AllocationError> {
    let rack_bits = parse_rack(rack)?;

    if bottom_u > MAX_BOTTOM_U {
        return Err(AllocationError::BottomUnitOutOfRange(bottom_u));
    }

    let sub = parse_sub_index(sub_index)?;

    Ok(rack_bits << 10 | u32::from(bottom_u) << 4 | sub)
}

/// Host address for a physical slot inside `subnet`
///
/// The result carries the subnet's prefix length so it can be reserved
/// directly.
pub fn allocate_deterministic_ip(
    subnet: &IpAddressWithCidr,
    rack: &str,
    bottom_u: u8,
    sub_index: Option<&str>,
) -> Result<IpAddressWithCidr, AllocationError> {
    let (base, prefix) = v6_base(subnet)?;
    let word = location_word(rack, bottom_u, sub_index)? | HOST_MARKER;
    let address = base | splice(word, prefix) | 1;

    IpAddressWithCidr::from_parts(IpAddr::V6(Ipv6Addr::from(address)), Some(prefix))
        .map_err(|_| AllocationError::PrefixTooLong(prefix))
}

/// Same as [`allocate_deterministic_ip`] but reading the slot from a [`Location`]
pub fn allocate_for_location(
    subnet: &IpAddressWithCidr,
    location: &Location,
) -> Result<IpAddressWithCidr, AllocationError> {
    allocate_deterministic_ip(
        subnet,
        &location.rack,
        location.bottom_u,
        location.sub_index.as_deref(),
    )
}

/// Delegated range for one physical slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationRange {
    pub start: Ipv6Addr,
    pub end: Ipv6Addr,
    pub prefix_length: u8,
}

impl LocationRange {
    pub fn as_cidr(&self) -> String {
        format!("{}/{}", self.start, self.prefix_length)
    }

    pub fn contains(&self, ip: &Ipv6Addr) -> bool {
        (self.start..=self.end).contains(ip)
    }
}

/// Range `[start, end]` delegated to a physical slot
pub fn allocate_range(
    subnet: &IpAddressWithCidr,
    rack: &str,
    bottom_u: u8,
    sub_index: Option<&str>,
) -> Result<LocationRange, AllocationError> {
    let (base, prefix) = v6_base(subnet)?;
    let word = location_word(rack, bottom_u, sub_index)?;
    let start = base | splice(word, prefix);
    let trailing = 128 - u32::from(prefix) - u32::from(WORD_BITS);
    let end = start | low_ones(trailing);

    Ok(LocationRange {
        start: Ipv6Addr::from(start),
        end: Ipv6Addr::from(end),
        prefix_length: prefix + WORD_BITS,
    })
}

fn v6_base(subnet: &IpAddressWithCidr) -> Result<(u128, u8), AllocationError> {
    let IpAddr::V6(network) = subnet.network_address() else {
        return Err(AllocationError::NotImplemented(subnet.as_cidr()));
    };

    let prefix = subnet.effective_prefix();
    // The word plus the trailing host bit must fit behind the prefix.
    if u32::from(prefix) + u32::from(WORD_BITS) >= 128 {
        return Err(AllocationError::PrefixTooLong(prefix));
    }

    Ok((u128::from(network), prefix))
}

fn splice(word: u32, prefix: u8) -> u128 {
    u128::from(word) << (128 - u32::from(prefix) - u32::from(WORD_BITS))
}

fn low_ones(bits: u32) -> u128 {
    if bits == 0 {
        0
    } else {
        u128::MAX >> (128 - bits)
    }
}

fn parse_rack(rack: &str) -> Result<u32, AllocationError> {
    let chars: Vec<char> = rack.chars().collect();
    if chars.is_empty() {
        return Err(AllocationError::InvalidRack(rack.to_string()));
    }

    chars[chars.len().saturating_sub(RACK_DIGITS)..]
        .iter()
        .try_fold(0u32, |acc, c| {
            c.to_digit(36)
                .map(|digit| acc * 36 + digit)
                .ok_or_else(|| AllocationError::InvalidRack(rack.to_string()))
        })
}

fn parse_sub_index(sub_index: Option<&str>) -> Result<u32, AllocationError> {
    match sub_index.map(str::trim) {
        None | Some("") => Ok(0),
        Some(s) => u32::from_str_radix(s, 16)
            .ok()
            .filter(|n| *n <= 0xf)
            .ok_or_else(|| AllocationError::InvalidSubIndex(s.to_string())),
    }
}
