//! Database models
//!
//! Structs for persisted IPAM records with serialization support

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Subnet record from database
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Subnet {
    pub id: i64,
    pub company_id: i64,
    pub site_id: Option<i64>,
    pub vlan_id: Option<i64>,
    pub vrf_id: Option<i64>,
    pub name: String,
    pub cidr: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Subnet joined with its address count
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubnetUsage {
    #[serde(flatten)]
    pub subnet: Subnet,
    pub usage_count: i64,
    /// Usable host capacity; 0 when the stored CIDR cannot be parsed
    pub capacity: u64,
    /// `usage_count / capacity`, 0.0 for zero capacity
    pub occupancy: f64,
}

/// Address record from database
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Address {
    pub subnet_id: i64,
    pub address: String,
    pub hostname: Option<String>,
    pub status: AddressStatus,
    pub assigned_to: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Address assignment status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AddressStatus {
    #[default]
    Assigned,
    Reserved,
}

impl std::fmt::Display for AddressStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddressStatus::Assigned => write!(f, "ASSIGNED"),
            AddressStatus::Reserved => write!(f, "RESERVED"),
        }
    }
}

impl std::str::FromStr for AddressStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ASSIGNED" => Ok(AddressStatus::Assigned),
            "RESERVED" => Ok(AddressStatus::Reserved),
            _ => Err(format!("Unknown address status: {}", s)),
        }
    }
}

/// Site record from database
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Site {
    pub id: i64,
    pub company_id: i64,
    pub name: String,
}

/// VLAN record from database
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Vlan {
    pub id: i64,
    pub site_id: i64,
    pub number: u16,
    pub name: String,
}

/// VRF record from database
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Vrf {
    pub id: i64,
    pub company_id: i64,
    pub name: String,
}
