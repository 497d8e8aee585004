//! IPv4 conversions for validator network records.
//!
//! Validator records store the IPv4 address as a big-endian packed `u32`.

use std::net::Ipv4Addr;

/// An IPv4 address packed big-endian into a `u32`.
pub type Ipv4Int = u32;

/// Pack an IPv4 address.
pub fn ipv4_to_int(ip: Ipv4Addr) -> Ipv4Int {
    u32::from(ip)
}

/// Unpack an IPv4 address.
pub fn ipv4_from_int(ip: Ipv4Int) -> Ipv4Addr {
    Ipv4Addr::from(ip)
}
