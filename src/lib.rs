//! ipam-core: IPv4 address management
//!
//! - CIDR arithmetic over 32-bit integers
//! - Subnet and address registries backed by SQLite
//! - VLAN allocation planning inside a base block
//! - Longest-prefix matching of addresses to subnets
//! - Reconciliation of inventory hosts into the address registry

pub mod app;
pub mod cli;
pub mod config;
pub mod database;
pub mod discovery;
pub mod error;
pub mod ipam;
pub mod logging;
pub mod models;
pub mod network;

pub use app::{
    AppCommandResult, AppContext, AppEvent, EventHook, OutputHook, PlanOutcome,
    execute_command_typed, execute_command_with_context, run, run_with_context, run_with_ctrl_c,
};
pub use cli::{CliCommand, parse_cli_args};
pub use config::IpamSettings;
pub use database::{Address, AddressStatus, Database, Site, Subnet, SubnetUsage, Vlan, Vrf};
pub use discovery::{HostSource, HttpHostSource, JsonFileHostSource, StaticHostSource};
pub use error::{ErrorKind, IpamError, IpamResult, Outcome};
pub use ipam::{
    AddressRegistry, AllocationPlanner, RangeMatcher, Reconciler, SiteDirectory, SubnetRegistry,
};
pub use models::*;
pub use network::{HostResolver, ParsedCidr};

// Re-export logging macros for use across crate
pub use crate::logging::macros;
