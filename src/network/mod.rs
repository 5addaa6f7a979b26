//! Network module - IPv4/CIDR arithmetic and DNS fallback resolution

pub mod cidr;
pub mod dns;

pub use cidr::{
    IpRange, ParsedCidr, block_size, capacity, cidrs_overlap, int_to_ip,
    ip_to_int, overlaps, parse_cidr, prefix_mask,
};
pub use dns::{HostResolver, SystemResolver, forward_lookup, is_usable_ipv4, resolve_hosts};
