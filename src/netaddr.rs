//! Address and prefix primitives consumed by the filter.
//!
//! This crate treats prefix containment and the multicast/link-local
//! predicates as an external collaborator's interface; this
//! module is the concrete, minimal stand-in so the crate compiles and its
//! properties are testable standalone. Prefix parsing is delegated to
//! `ipnet`; containment is computed directly via bitmasking over the
//! address's integer representation rather than through any single
//! `ipnet` method, so this module does not depend on the exact shape of
//! that crate's `Contains` API.

use std::net::{Ipv4Addr, Ipv6Addr};

pub use ipnet::{Ipv4Net, Ipv6Net};

use crate::error::ConfigError;

/// Parses a user-facing IPv4 CIDR literal, e.g. `"10.0.0.0/8"`.
pub fn parse_prefix_v4(s: &str) -> Result<Ipv4Net, ConfigError> {
    s.parse::<Ipv4Net>()
        .map_err(|e| ConfigError::InvalidPrefix(s.to_string(), e.to_string()))
}

/// Parses a user-facing IPv6 CIDR literal, e.g. `"fd7a::/48"`.
pub fn parse_prefix_v6(s: &str) -> Result<Ipv6Net, ConfigError> {
    s.parse::<Ipv6Net>()
        .map_err(|e| ConfigError::InvalidPrefix(s.to_string(), e.to_string()))
}

/// Longest-match containment for an IPv4 prefix, computed by masking both
/// sides rather than relying on any particular `ipnet` method shape.
pub fn contains_v4(net: &Ipv4Net, addr: Ipv4Addr) -> bool {
    let bits = net.prefix_len();
    let mask: u32 = mask32(bits);
    (u32::from(addr) & mask) == (u32::from(net.addr()) & mask)
}

/// Longest-match containment for an IPv6 prefix.
pub fn contains_v6(net: &Ipv6Net, addr: Ipv6Addr) -> bool {
    let bits = net.prefix_len();
    let mask: u128 = mask128(bits);
    (u128::from(addr) & mask) == (u128::from(net.addr()) & mask)
}

fn mask32(bits: u8) -> u32 {
    if bits == 0 {
        0
    } else {
        u32::MAX << (32 - bits as u32)
    }
}

fn mask128(bits: u8) -> u128 {
    if bits == 0 {
        0
    } else {
        u128::MAX << (128 - bits as u32)
    }
}

/// IPv4 predicates not covered (or not covered with the right semantics)
/// by `std::net::Ipv4Addr`.
pub trait Ipv4AddrExt {
    /// True for `169.254.0.0/16`, excluding `169.254.255.255`, which some
    /// legitimate protocols (e.g. WPAD discovery) still address directly.
    /// This is the "most" link-local unicast variant pre-check needs.
    fn is_most_link_local_unicast(&self) -> bool;
}

impl Ipv4AddrExt for Ipv4Addr {
    fn is_most_link_local_unicast(&self) -> bool {
        const LINK_LOCAL_BROADCAST: Ipv4Addr = Ipv4Addr::new(169, 254, 255, 255);
        self.is_link_local() && *self != LINK_LOCAL_BROADCAST
    }
}

/// IPv6 predicates not covered by `std::net::Ipv6Addr`.
pub trait Ipv6AddrExt {
    /// True for `fe80::/10`.
    fn is_link_local_unicast(&self) -> bool;
}

impl Ipv6AddrExt for Ipv6Addr {
    fn is_link_local_unicast(&self) -> bool {
        (self.segments()[0] & 0xffc0) == 0xfe80
    }
}
