//! Request and response types for the IPAM boundary

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::database::{AddressStatus, Subnet};

/// Input for creating a subnet (everything but the id)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct NewSubnet {
    pub company_id: i64,
    #[serde(default)]
    pub site_id: Option<i64>,
    #[serde(default)]
    pub vlan_id: Option<i64>,
    #[serde(default)]
    pub vrf_id: Option<i64>,
    pub name: String,
    pub cidr: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Partial update; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SubnetPatch {
    #[serde(default)]
    pub site_id: Option<i64>,
    #[serde(default)]
    pub vlan_id: Option<i64>,
    #[serde(default)]
    pub vrf_id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub cidr: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Filters for listing subnets. Unset fields do not filter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SubnetFilter {
    pub company_id: i64,
    #[serde(default)]
    pub site_id: Option<i64>,
    #[serde(default)]
    pub vlan_id: Option<i64>,
    #[serde(default)]
    pub vrf_id: Option<i64>,
}

impl SubnetFilter {
    pub fn company(company_id: i64) -> Self {
        Self {
            company_id,
            ..Self::default()
        }
    }

    pub fn site(company_id: i64, site_id: i64) -> Self {
        Self {
            company_id,
            site_id: Some(site_id),
            ..Self::default()
        }
    }
}

/// Input for an idempotent address upsert keyed by `(subnet_id, address)`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct UpsertAddress {
    pub subnet_id: i64,
    pub address: String,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub status: AddressStatus,
    #[serde(default)]
    pub assigned_to: Option<String>,
}

impl UpsertAddress {
    pub fn assigned(subnet_id: i64, address: &str, hostname: Option<&str>) -> Self {
        Self {
            subnet_id,
            address: address.to_string(),
            hostname: hostname.map(str::to_string),
            status: AddressStatus::Assigned,
            assigned_to: None,
        }
    }
}

/// Planner input. VLANs missing from `expectations` use the configured default.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PlanRequest {
    pub site_id: i64,
    pub base_cidr: String,
    #[serde(default)]
    pub expectations: HashMap<i64, u64>,
}

/// Per-VLAN sizing derived for one planning call; never stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AllocationRequest {
    pub vlan_id: i64,
    pub vlan_number: u16,
    pub vlan_name: String,
    pub expected_hosts: u64,
    pub mask: u8,
    pub capacity: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SuggestionReason {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "conflict with existing subnet")]
    ConflictWithExisting,
    #[serde(rename = "no space")]
    NoSpace,
}

impl std::fmt::Display for SuggestionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SuggestionReason::Ok => write!(f, "OK"),
            SuggestionReason::ConflictWithExisting => write!(f, "conflict with existing subnet"),
            SuggestionReason::NoSpace => write!(f, "no space"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlanSuggestion {
    pub vlan_id: i64,
    pub vlan_number: u16,
    pub vlan_name: String,
    pub suggested_cidr: Option<String>,
    pub capacity: u64,
    pub conflict: bool,
    pub reason: SuggestionReason,
}

impl PlanSuggestion {
    /// Whether an apply step should create this suggestion.
    pub fn is_applicable(&self) -> bool {
        self.suggested_cidr.is_some() && !self.conflict
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AllocationPlan {
    pub site_id: i64,
    /// Canonicalized base block
    pub base: String,
    pub suggestions: Vec<PlanSuggestion>,
}

/// A suggestion that apply did not turn into a subnet
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SkippedSuggestion {
    pub vlan_id: i64,
    pub suggested_cidr: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApplyReport {
    pub created: Vec<Subnet>,
    pub skipped: Vec<SkippedSuggestion>,
}

/// One interface of a discovered host, as normalized by the inventory source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct HostInterface {
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub dns: String,
    /// Whether the inventory prefers the IP over the DNS name for this interface
    #[serde(default)]
    pub useip: bool,
}

/// A host record from an external inventory system
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct DiscoveredHost {
    pub name: String,
    #[serde(default)]
    pub interfaces: Vec<HostInterface>,
    #[serde(default)]
    pub groups: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnmatchedHost {
    pub host: String,
    pub ip: String,
}

/// Counters for one reconciliation pass
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ReconcileReport {
    pub hosts_seen: usize,
    pub matched: usize,
    pub unmatched: usize,
    pub missing_ip: usize,
    pub dns_resolved: usize,
    pub errors: usize,
    pub cancelled: bool,
    pub timed_out: bool,
    pub unmatched_sample: Vec<UnmatchedHost>,
}
