//! Configuration for the IPAM core
//!
//! Defaults live here as constants. [`IpamSettings`] is built once at the
//! application edge and handed to every component constructor.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Expected host count for a VLAN with no explicit expectation
pub const DEFAULT_EXPECTED_HOSTS: u64 = 254;

/// Planner headroom on top of the expected host count, in percent
pub const PLANNER_HEADROOM_PCT: u64 = 20;

/// Network + broadcast
pub const PLANNER_RESERVED_ADDRESSES: u64 = 2;

/// Per-host DNS fallback lookup timeout
pub const DNS_TIMEOUT: Duration = Duration::from_millis(1500);

/// Concurrent DNS fallback lookups
pub const DNS_WORKERS: usize = 8;

/// Timeout for a single inventory fetch
pub const INVENTORY_TIMEOUT: Duration = Duration::from_secs(15);

/// Upper bound for an entire reconciliation pass
pub const RECONCILE_PASS_TIMEOUT: Duration = Duration::from_secs(120);

/// How many unmatched hosts a reconcile report keeps for diagnostics
pub const UNMATCHED_SAMPLE_SIZE: usize = 50;

/// Runtime settings for registries, planner and reconciler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IpamSettings {
    pub default_expected_hosts: u64,
    pub headroom_pct: u64,
    pub dns_timeout_ms: u64,
    pub dns_workers: usize,
    pub inventory_timeout_ms: u64,
    pub reconcile_timeout_ms: u64,
    pub unmatched_sample_size: usize,
    /// Reject address upserts outside the parent subnet's range.
    pub enforce_address_containment: bool,
    /// Reject subnet creates that overlap a sibling in the same company/site/VRF.
    pub reject_overlapping_subnets: bool,
    pub db_path: Option<PathBuf>,
}

impl Default for IpamSettings {
    fn default() -> Self {
        Self {
            default_expected_hosts: DEFAULT_EXPECTED_HOSTS,
            headroom_pct: PLANNER_HEADROOM_PCT,
            dns_timeout_ms: DNS_TIMEOUT.as_millis() as u64,
            dns_workers: DNS_WORKERS,
            inventory_timeout_ms: INVENTORY_TIMEOUT.as_millis() as u64,
            reconcile_timeout_ms: RECONCILE_PASS_TIMEOUT.as_millis() as u64,
            unmatched_sample_size: UNMATCHED_SAMPLE_SIZE,
            enforce_address_containment: true,
            reject_overlapping_subnets: false,
            db_path: None,
        }
    }
}

impl IpamSettings {
    /// Reads `IPAM_*` overrides on top of the defaults. Only the application
    /// edge calls this.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            default_expected_hosts: env_parse_u64(
                "IPAM_DEFAULT_EXPECTED_HOSTS",
                defaults.default_expected_hosts,
                0,
                1 << 31,
            ),
            headroom_pct: env_parse_u64("IPAM_HEADROOM_PCT", defaults.headroom_pct, 0, 500),
            dns_timeout_ms: env_parse_u64("IPAM_DNS_TIMEOUT_MS", defaults.dns_timeout_ms, 100, 10_000),
            dns_workers: env_parse_usize("IPAM_DNS_WORKERS", defaults.dns_workers, 1, 64),
            inventory_timeout_ms: env_parse_u64(
                "IPAM_INVENTORY_TIMEOUT_MS",
                defaults.inventory_timeout_ms,
                1_000,
                60_000,
            ),
            reconcile_timeout_ms: env_parse_u64(
                "IPAM_RECONCILE_TIMEOUT_MS",
                defaults.reconcile_timeout_ms,
                1_000,
                3_600_000,
            ),
            unmatched_sample_size: env_parse_usize(
                "IPAM_UNMATCHED_SAMPLE_SIZE",
                defaults.unmatched_sample_size,
                0,
                10_000,
            ),
            enforce_address_containment: env_parse_bool(
                "IPAM_ENFORCE_ADDRESS_CONTAINMENT",
                defaults.enforce_address_containment,
            ),
            reject_overlapping_subnets: env_parse_bool(
                "IPAM_REJECT_OVERLAPPING_SUBNETS",
                defaults.reject_overlapping_subnets,
            ),
            db_path: env_var("IPAM_DB_PATH").map(PathBuf::from),
        }
    }

    pub fn dns_timeout(&self) -> Duration {
        Duration::from_millis(self.dns_timeout_ms)
    }

    pub fn inventory_timeout(&self) -> Duration {
        Duration::from_millis(self.inventory_timeout_ms)
    }

    pub fn reconcile_timeout(&self) -> Duration {
        Duration::from_millis(self.reconcile_timeout_ms)
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse_u64(name: &str, default: u64, min: u64, max: u64) -> u64 {
    match env_var(name).and_then(|v| v.parse::<u64>().ok()) {
        Some(v) => v.clamp(min, max),
        None => default,
    }
}

fn env_parse_usize(name: &str, default: usize, min: usize, max: usize) -> usize {
    match env_var(name).and_then(|v| v.parse::<usize>().ok()) {
        Some(v) => v.clamp(min, max),
        None => default,
    }
}

fn env_parse_bool(name: &str, default: bool) -> bool {
    match env_var(name) {
        Some(value) => {
            let normalized = value.to_ascii_lowercase();
            match normalized.as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => default,
            }
        }
        None => default,
    }
}
