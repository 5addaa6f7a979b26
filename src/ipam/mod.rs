//! IPAM services over the SQLite store
//!
//! Each service is a cheap clone holding the shared [`Database`](crate::database::Database)
//! handle and the resolved settings.

pub mod addresses;
pub mod matcher;
pub mod planner;
pub mod reconcile;
pub mod sites;
pub mod subnets;

pub use addresses::AddressRegistry;
pub use matcher::RangeMatcher;
pub use planner::{AllocationPlanner, build_requests, pack, prefix_for_hosts, suggested_subnet_name};
pub use reconcile::{Reconciler, pick_interface_ip};
pub use sites::SiteDirectory;
pub use subnets::SubnetRegistry;
