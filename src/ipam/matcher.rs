//! Maps a discovered IPv4 address to the registered subnet that owns it

use crate::database::Subnet;
use crate::network::cidr::{self, IpRange};

#[derive(Debug, Clone)]
struct SubnetRange {
    subnet: Subnet,
    range: IpRange,
    mask: u8,
}

/// Pre-parsed subnet ranges for one company.
///
/// When registered subnets overlap, the most specific block (longest prefix)
/// wins; equal prefixes fall back to the order the subnets were given in.
#[derive(Debug, Clone, Default)]
pub struct RangeMatcher {
    ranges: Vec<SubnetRange>,
}

impl RangeMatcher {
    /// Subnets whose CIDR does not parse are skipped with a warning.
    pub fn new(subnets: Vec<Subnet>) -> Self {
        let mut ranges: Vec<SubnetRange> = subnets
            .into_iter()
            .filter_map(|subnet| match cidr::parse_cidr(&subnet.cidr) {
                Ok(parsed) => Some(SubnetRange {
                    range: parsed.canonical().range(),
                    mask: parsed.mask,
                    subnet,
                }),
                Err(e) => {
                    crate::log_warn!(
                        "Subnet {} excluded from matching: {}",
                        subnet.id,
                        e
                    );
                    None
                }
            })
            .collect();

        // Stable sort keeps list order among equal prefixes.
        ranges.sort_by(|a, b| b.mask.cmp(&a.mask));
        Self { ranges }
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// The owning subnet of `ip`, or `None` if no range contains it or `ip`
    /// is not a valid dotted quad.
    pub fn match_ip(&self, ip: &str) -> Option<&Subnet> {
        let value = cidr::ip_to_int(ip).ok()?;
        self.match_int(value)
    }

    pub fn match_int(&self, ip: u32) -> Option<&Subnet> {
        self.ranges
            .iter()
            .find(|entry| entry.range.contains(ip))
            .map(|entry| &entry.subnet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subnet(id: i64, cidr: &str) -> Subnet {
        Subnet {
            id,
            company_id: 1,
            site_id: None,
            vlan_id: None,
            vrf_id: None,
            name: format!("s{}", id),
            cidr: cidr.to_string(),
            description: None,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn matches_containing_subnet() {
        let matcher = RangeMatcher::new(vec![subnet(1, "10.0.0.0/24"), subnet(2, "10.0.1.0/24")]);
        assert_eq!(matcher.match_ip("10.0.1.77").map(|s| s.id), Some(2));
        assert_eq!(matcher.match_ip("10.0.0.0").map(|s| s.id), Some(1));
        assert!(matcher.match_ip("192.168.0.1").is_none());
        assert!(matcher.match_ip("not-an-ip").is_none());
    }

    #[test]
    fn most_specific_wins_regardless_of_order() {
        let wide_first = RangeMatcher::new(vec![subnet(1, "10.0.0.0/16"), subnet(2, "10.0.5.0/24")]);
        let narrow_first =
            RangeMatcher::new(vec![subnet(2, "10.0.5.0/24"), subnet(1, "10.0.0.0/16")]);

        assert_eq!(wide_first.match_ip("10.0.5.9").map(|s| s.id), Some(2));
        assert_eq!(narrow_first.match_ip("10.0.5.9").map(|s| s.id), Some(2));
        assert_eq!(wide_first.match_ip("10.0.9.9").map(|s| s.id), Some(1));
    }

    #[test]
    fn equal_prefixes_keep_list_order() {
        let matcher = RangeMatcher::new(vec![subnet(4, "10.0.0.0/24"), subnet(3, "10.0.0.0/24")]);
        assert_eq!(matcher.match_ip("10.0.0.1").map(|s| s.id), Some(4));
    }

    #[test]
    fn unparsable_subnets_are_skipped() {
        let matcher = RangeMatcher::new(vec![subnet(1, "garbage"), subnet(2, "10.0.0.0/8")]);
        assert_eq!(matcher.len(), 1);
        assert_eq!(matcher.match_ip("10.1.1.1").map(|s| s.id), Some(2));
    }
}
