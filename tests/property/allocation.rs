// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for Location Addressing
//!
//! Distinct physical slots must never share an address or overlap in their
//! delegated ranges, and every derived address must stay inside its subnet.

use cim_inventory::allocation::{allocate_deterministic_ip, allocate_range, location_word};
use cim_inventory::domain::IpAddressWithCidr;
use proptest::prelude::*;
use std::net::{IpAddr, Ipv6Addr};

// ============================================================================
// Strategies
// ============================================================================

/// Racks with 1 to 4 significant base-36 digits
fn rack() -> impl Strategy<Value = String> {
    "[0-9a-z]{1,4}"
}

fn slot() -> impl Strategy<Value = (String, u8, Option<String>)> {
    (
        rack(),
        0u8..=63,
        prop::option::of("[0-9a-f]"),
    )
}

/// IPv6 subnets with room for a location word
fn v6_subnet() -> impl Strategy<Value = IpAddressWithCidr> {
    (any::<u128>(), 8u8..=95).prop_map(|(bits, prefix)| {
        IpAddressWithCidr::from_parts(IpAddr::V6(Ipv6Addr::from(bits)), Some(prefix))
            .expect("prefix within range")
            .network()
    })
}

fn canonical_rack(rack: &str) -> u32 {
    rack.chars()
        .fold(0, |acc, c| acc * 36 + c.to_digit(36).expect("base-36 digit"))
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_word_fields_decode((rack, u, sub) in slot()) {
        let word = location_word(&rack, u, sub.as_deref()).unwrap();

        prop_assert_eq!(word >> 10, canonical_rack(&rack));
        prop_assert_eq!((word >> 4) & 0x3f, u32::from(u));
        let expected_sub = sub
            .as_deref()
            .map(|s| u32::from_str_radix(s, 16).unwrap())
            .unwrap_or(0);
        prop_assert_eq!(word & 0xf, expected_sub);
        prop_assert_eq!(word & 0x8000_0000, 0);
    }

    #[test]
    fn prop_address_inside_subnet(subnet in v6_subnet(), (rack, u, sub) in slot()) {
        let ip = allocate_deterministic_ip(&subnet, &rack, u, sub.as_deref()).unwrap();

        prop_assert!(subnet.contains(&ip.address()));
        prop_assert_eq!(ip.prefix_length(), subnet.prefix_length());
        prop_assert_ne!(ip.address(), subnet.address());
    }

    #[test]
    fn prop_address_is_deterministic(subnet in v6_subnet(), (rack, u, sub) in slot()) {
        let a = allocate_deterministic_ip(&subnet, &rack, u, sub.as_deref()).unwrap();
        let b = allocate_deterministic_ip(&subnet, &rack, u, sub.as_deref()).unwrap();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn prop_distinct_slots_never_collide(
        subnet in v6_subnet(),
        a in slot(),
        b in slot(),
    ) {
        let word_a = location_word(&a.0, a.1, a.2.as_deref()).unwrap();
        let word_b = location_word(&b.0, b.1, b.2.as_deref()).unwrap();
        prop_assume!(word_a != word_b);

        let ip_a = allocate_deterministic_ip(&subnet, &a.0, a.1, a.2.as_deref()).unwrap();
        let ip_b = allocate_deterministic_ip(&subnet, &b.0, b.1, b.2.as_deref()).unwrap();
        prop_assert_ne!(ip_a.address(), ip_b.address());

        let range_a = allocate_range(&subnet, &a.0, a.1, a.2.as_deref()).unwrap();
        let range_b = allocate_range(&subnet, &b.0, b.1, b.2.as_deref()).unwrap();
        prop_assert!(range_a.end < range_b.start || range_b.end < range_a.start);
    }

    #[test]
    fn prop_range_is_aligned_delegation(subnet in v6_subnet(), (rack, u, sub) in slot()) {
        let range = allocate_range(&subnet, &rack, u, sub.as_deref()).unwrap();
        let prefix = subnet.effective_prefix();

        prop_assert_eq!(range.prefix_length, prefix + 32);
        prop_assert!(range.start <= range.end);

        let span = u128::from(range.end) - u128::from(range.start);
        let host_bits = 128 - u32::from(range.prefix_length);
        let expected_span = if host_bits == 0 { 0 } else { u128::MAX >> (128 - host_bits) };
        prop_assert_eq!(span, expected_span);
        prop_assert!(subnet.contains(&IpAddr::V6(range.start)));
        prop_assert!(subnet.contains(&IpAddr::V6(range.end)));
    }
}
