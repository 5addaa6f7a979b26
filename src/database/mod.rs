//! Database module for IPAM bookkeeping
//!
//! Provides SQLite storage for:
//! - Sites, VLANs and VRFs
//! - Subnets
//! - Address assignments

pub mod connection;
pub mod models;
pub mod queries;
pub mod schema;

pub use connection::Database;
pub use models::*;
