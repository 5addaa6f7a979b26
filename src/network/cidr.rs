//! IPv4 and CIDR arithmetic
//!
//! Pure functions over 32-bit integers. Addresses are handled in network byte
//! order (most significant octet first) so that integer comparison matches
//! address ordering.

use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

use crate::error::{IpamError, IpamResult};

/// A parsed `a.b.c.d/len` block.
///
/// `network` is the address exactly as written; it is NOT guaranteed to have
/// its host bits cleared. Use [`ParsedCidr::canonical`] when that matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedCidr {
    pub network: u32,
    pub mask: u8,
    pub size: u64,
}

/// Inclusive integer interval covered by a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpRange {
    pub start: u32,
    pub end: u32,
}

/// Parses a dotted quad into a u32.
pub fn ip_to_int(ip: &str) -> IpamResult<u32> {
    let parts: Vec<&str> = ip.trim().split('.').collect();
    if parts.len() != 4 {
        return Err(IpamError::invalid_address(ip, "expected four octets"));
    }

    let mut value: u32 = 0;
    for part in parts {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(IpamError::invalid_address(
                ip,
                format!("octet '{}' is not an integer", part),
            ));
        }
        let octet: u32 = part
            .parse()
            .map_err(|_| IpamError::invalid_address(ip, format!("octet '{}' out of range", part)))?;
        if octet > 255 {
            return Err(IpamError::invalid_address(
                ip,
                format!("octet {} exceeds 255", octet),
            ));
        }
        value = (value << 8) | octet;
    }

    Ok(value)
}

pub fn int_to_ip(n: u32) -> String {
    Ipv4Addr::from(n).to_string()
}

/// Parses `a.b.c.d/len`. Fails with `InvalidCidr` for any malformed part.
pub fn parse_cidr(cidr: &str) -> IpamResult<ParsedCidr> {
    let (ip_part, mask_part) = cidr
        .trim()
        .split_once('/')
        .ok_or_else(|| IpamError::invalid_cidr(cidr, "missing '/' prefix length"))?;

    if mask_part.is_empty() || !mask_part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(IpamError::invalid_cidr(
            cidr,
            format!("prefix length '{}' is not an integer", mask_part),
        ));
    }
    let mask: u8 = mask_part
        .parse()
        .ok()
        .filter(|m| *m <= 32)
        .ok_or_else(|| {
            IpamError::invalid_cidr(cidr, format!("prefix length {} not in 0..=32", mask_part))
        })?;

    let network = ip_to_int(ip_part).map_err(|e| IpamError::invalid_cidr(cidr, e.to_string()))?;

    Ok(ParsedCidr {
        network,
        mask,
        size: block_size(mask),
    })
}

/// Number of addresses in a block of the given prefix length.
pub fn block_size(mask: u8) -> u64 {
    1u64 << (32 - u32::from(mask.min(32)))
}

/// Usable host count. /31 and /32 reserve nothing; everything else loses
/// the network and broadcast addresses.
pub fn capacity(mask: u8) -> u64 {
    let size = block_size(mask);
    if mask >= 31 {
        size
    } else {
        size.saturating_sub(2)
    }
}

pub fn prefix_mask(mask: u8) -> u32 {
    if mask == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(mask.min(32)))
    }
}

impl ParsedCidr {
    /// Inclusive range starting at the written address.
    pub fn range(&self) -> IpRange {
        let end = u64::from(self.network) + self.size - 1;
        IpRange {
            start: self.network,
            end: end.min(u64::from(u32::MAX)) as u32,
        }
    }

    /// Same block with host bits cleared.
    pub fn canonical(&self) -> ParsedCidr {
        let network = Ipv4Network::new(Ipv4Addr::from(self.network), self.mask)
            .map(|net| u32::from(net.network()))
            .unwrap_or(self.network & prefix_mask(self.mask));
        ParsedCidr {
            network,
            mask: self.mask,
            size: self.size,
        }
    }

    pub fn is_canonical(&self) -> bool {
        self.network & !prefix_mask(self.mask) == 0
    }

    pub fn contains(&self, ip: u32) -> bool {
        self.range().contains(ip)
    }

    /// True for the first and last address of blocks that reserve them.
    pub fn is_network_or_broadcast(&self, ip: u32) -> bool {
        if self.mask >= 31 {
            return false;
        }
        let range = self.canonical().range();
        ip == range.start || ip == range.end
    }
}

impl fmt::Display for ParsedCidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", int_to_ip(self.network), self.mask)
    }
}

impl IpRange {
    pub fn contains(&self, ip: u32) -> bool {
        self.start <= ip && ip <= self.end
    }
}

/// True iff the two inclusive ranges intersect.
pub fn overlaps(a: IpRange, b: IpRange) -> bool {
    !(a.end < b.start || b.end < a.start)
}

/// String-level convenience for `overlaps` on two CIDRs.
pub fn cidrs_overlap(a: &str, b: &str) -> IpamResult<bool> {
    Ok(overlaps(parse_cidr(a)?.range(), parse_cidr(b)?.range()))
}

#[cfg(test)]
#[path = "cidr_tests.rs"]
mod cidr_tests;
