//! Database schema definitions
//!
//! Creates and manages the SQLite tables

use rusqlite::Connection;

use crate::error::IpamResult;

/// Create all database tables
pub fn create_tables(conn: &Connection) -> IpamResult<()> {
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;

        -- Sites: physical or logical locations owned by a company
        CREATE TABLE IF NOT EXISTS sites (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            company_id INTEGER NOT NULL,
            name TEXT NOT NULL
        );

        -- VRFs: routing-table partitions a subnet may be scoped to
        CREATE TABLE IF NOT EXISTS vrfs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            company_id INTEGER NOT NULL,
            name TEXT NOT NULL
        );

        -- VLANs: per-site segments the planner sizes blocks for
        CREATE TABLE IF NOT EXISTS vlans (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            site_id INTEGER NOT NULL,
            number INTEGER NOT NULL,
            name TEXT NOT NULL,
            FOREIGN KEY (site_id) REFERENCES sites(id) ON DELETE CASCADE
        );

        -- Subnets: registered CIDR blocks
        CREATE TABLE IF NOT EXISTS subnets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            company_id INTEGER NOT NULL,
            site_id INTEGER,
            vlan_id INTEGER,
            vrf_id INTEGER,
            name TEXT NOT NULL,
            cidr TEXT NOT NULL,
            description TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(company_id, name),
            FOREIGN KEY (site_id) REFERENCES sites(id) ON DELETE SET NULL,
            FOREIGN KEY (vlan_id) REFERENCES vlans(id) ON DELETE SET NULL,
            FOREIGN KEY (vrf_id) REFERENCES vrfs(id) ON DELETE SET NULL
        );

        -- Addresses: assignments inside a subnet, one row per (subnet, ip)
        CREATE TABLE IF NOT EXISTS addresses (
            subnet_id INTEGER NOT NULL,
            address TEXT NOT NULL,
            hostname TEXT,
            status TEXT NOT NULL DEFAULT 'ASSIGNED',
            assigned_to TEXT,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (subnet_id, address),
            FOREIGN KEY (subnet_id) REFERENCES subnets(id)
        );

        CREATE INDEX IF NOT EXISTS idx_sites_company ON sites(company_id);
        CREATE INDEX IF NOT EXISTS idx_vlans_site ON vlans(site_id);
        CREATE INDEX IF NOT EXISTS idx_subnets_company_site ON subnets(company_id, site_id);
        CREATE INDEX IF NOT EXISTS idx_subnets_vlan ON subnets(vlan_id);
        CREATE INDEX IF NOT EXISTS idx_subnets_vrf ON subnets(vrf_id);
        "#,
    )?;

    Ok(())
}
