//! Database query functions
//!
//! Raw SQL for sites, VLANs, VRFs, subnets and addresses. Validation happens
//! in the registries; these functions assume well-formed input.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::models::*;
use crate::error::IpamResult;
use crate::models::{NewSubnet, SubnetFilter, SubnetPatch, UpsertAddress};

const SUBNET_COLUMNS: &str =
    "id, company_id, site_id, vlan_id, vrf_id, name, cidr, description, created_at";

const ADDRESS_COLUMNS: &str = "subnet_id, address, hostname, status, assigned_to, updated_at";

// ====== Sites / VLANs / VRFs ======

pub fn insert_site(conn: &Connection, company_id: i64, name: &str) -> IpamResult<Site> {
    conn.execute(
        "INSERT INTO sites (company_id, name) VALUES (?1, ?2)",
        params![company_id, name],
    )?;
    Ok(Site {
        id: conn.last_insert_rowid(),
        company_id,
        name: name.to_string(),
    })
}

pub fn get_site(conn: &Connection, id: i64) -> IpamResult<Option<Site>> {
    let site = conn
        .query_row(
            "SELECT id, company_id, name FROM sites WHERE id = ?1",
            params![id],
            |row| {
                Ok(Site {
                    id: row.get(0)?,
                    company_id: row.get(1)?,
                    name: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(site)
}

pub fn insert_vlan(conn: &Connection, site_id: i64, number: u16, name: &str) -> IpamResult<Vlan> {
    conn.execute(
        "INSERT INTO vlans (site_id, number, name) VALUES (?1, ?2, ?3)",
        params![site_id, number, name],
    )?;
    Ok(Vlan {
        id: conn.last_insert_rowid(),
        site_id,
        number,
        name: name.to_string(),
    })
}

/// VLANs of a site ordered by VLAN number
pub fn list_vlans_for_site(conn: &Connection, site_id: i64) -> IpamResult<Vec<Vlan>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT id, site_id, number, name
        FROM vlans
        WHERE site_id = ?1
        ORDER BY number ASC, id ASC
        "#,
    )?;

    let vlans = stmt
        .query_map(params![site_id], |row| {
            Ok(Vlan {
                id: row.get(0)?,
                site_id: row.get(1)?,
                number: row.get(2)?,
                name: row.get(3)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(vlans)
}

pub fn insert_vrf(conn: &Connection, company_id: i64, name: &str) -> IpamResult<Vrf> {
    conn.execute(
        "INSERT INTO vrfs (company_id, name) VALUES (?1, ?2)",
        params![company_id, name],
    )?;
    Ok(Vrf {
        id: conn.last_insert_rowid(),
        company_id,
        name: name.to_string(),
    })
}

// ====== Subnets ======

/// Insert a subnet. `subnet.cidr` must already be validated.
pub fn insert_subnet(conn: &Connection, subnet: &NewSubnet) -> IpamResult<Subnet> {
    conn.execute(
        r#"
        INSERT INTO subnets (company_id, site_id, vlan_id, vrf_id, name, cidr, description)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
        params![
            subnet.company_id,
            subnet.site_id,
            subnet.vlan_id,
            subnet.vrf_id,
            subnet.name,
            subnet.cidr,
            subnet.description,
        ],
    )?;

    let id = conn.last_insert_rowid();
    get_subnet(conn, id)?.ok_or_else(|| crate::error::IpamError::not_found("subnet", id))
}

pub fn get_subnet(conn: &Connection, id: i64) -> IpamResult<Option<Subnet>> {
    let subnet = conn
        .query_row(
            &format!("SELECT {} FROM subnets WHERE id = ?1", SUBNET_COLUMNS),
            params![id],
            subnet_from_row,
        )
        .optional()?;
    Ok(subnet)
}

/// List subnets for a company; `None` filters are ignored
pub fn list_subnets(conn: &Connection, filter: &SubnetFilter) -> IpamResult<Vec<Subnet>> {
    let mut stmt = conn.prepare(&format!(
        r#"
        SELECT {}
        FROM subnets
        WHERE company_id = ?1
          AND (?2 IS NULL OR site_id = ?2)
          AND (?3 IS NULL OR vlan_id = ?3)
          AND (?4 IS NULL OR vrf_id = ?4)
        ORDER BY id ASC
        "#,
        SUBNET_COLUMNS
    ))?;

    let subnets = stmt
        .query_map(
            params![
                filter.company_id,
                filter.site_id,
                filter.vlan_id,
                filter.vrf_id
            ],
            subnet_from_row,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(subnets)
}

/// All subnets attached to a site regardless of company
pub fn list_subnets_for_site(conn: &Connection, site_id: i64) -> IpamResult<Vec<Subnet>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM subnets WHERE site_id = ?1 ORDER BY id ASC",
        SUBNET_COLUMNS
    ))?;

    let subnets = stmt
        .query_map(params![site_id], subnet_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(subnets)
}

/// Apply a partial update. Returns the number of rows touched.
pub fn update_subnet(conn: &Connection, id: i64, patch: &SubnetPatch) -> IpamResult<usize> {
    let updated = conn.execute(
        r#"
        UPDATE subnets SET
            site_id = COALESCE(?2, site_id),
            vlan_id = COALESCE(?3, vlan_id),
            vrf_id = COALESCE(?4, vrf_id),
            name = COALESCE(?5, name),
            cidr = COALESCE(?6, cidr),
            description = COALESCE(?7, description)
        WHERE id = ?1
        "#,
        params![
            id,
            patch.site_id,
            patch.vlan_id,
            patch.vrf_id,
            patch.name,
            patch.cidr,
            patch.description,
        ],
    )?;
    Ok(updated)
}

pub fn delete_addresses_for_subnet(conn: &Connection, subnet_id: i64) -> IpamResult<usize> {
    let deleted = conn.execute(
        "DELETE FROM addresses WHERE subnet_id = ?1",
        params![subnet_id],
    )?;
    Ok(deleted)
}

pub fn delete_subnet(conn: &Connection, id: i64) -> IpamResult<usize> {
    let deleted = conn.execute("DELETE FROM subnets WHERE id = ?1", params![id])?;
    Ok(deleted)
}

/// Subnets joined with their address count (zero when no addresses exist)
pub fn subnet_usage(
    conn: &Connection,
    company_id: i64,
    site_id: Option<i64>,
) -> IpamResult<Vec<(Subnet, i64)>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT s.id, s.company_id, s.site_id, s.vlan_id, s.vrf_id, s.name, s.cidr,
               s.description, s.created_at, COALESCE(u.usage_count, 0)
        FROM subnets s
        LEFT JOIN (
            SELECT subnet_id, COUNT(*) AS usage_count
            FROM addresses
            GROUP BY subnet_id
        ) u ON u.subnet_id = s.id
        WHERE s.company_id = ?1
          AND (?2 IS NULL OR s.site_id = ?2)
        ORDER BY s.id ASC
        "#,
    )?;

    let rows = stmt
        .query_map(params![company_id, site_id], |row| {
            Ok((subnet_from_row(row)?, row.get::<_, i64>(9)?))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}

// ====== Addresses ======

/// Insert or update the `(subnet_id, address)` row
pub fn upsert_address(conn: &Connection, address: &UpsertAddress) -> IpamResult<Address> {
    conn.execute(
        r#"
        INSERT INTO addresses (subnet_id, address, hostname, status, assigned_to)
        VALUES (?1, ?2, ?3, ?4, ?5)
        ON CONFLICT(subnet_id, address) DO UPDATE SET
            hostname = excluded.hostname,
            status = excluded.status,
            assigned_to = excluded.assigned_to,
            updated_at = datetime('now')
        "#,
        params![
            address.subnet_id,
            address.address,
            address.hostname,
            address.status.to_string(),
            address.assigned_to,
        ],
    )?;

    get_address(conn, address.subnet_id, &address.address)?.ok_or_else(|| {
        crate::error::IpamError::not_found(
            "address",
            format!("{}@{}", address.address, address.subnet_id),
        )
    })
}

pub fn get_address(conn: &Connection, subnet_id: i64, address: &str) -> IpamResult<Option<Address>> {
    let row = conn
        .query_row(
            &format!(
                "SELECT {} FROM addresses WHERE subnet_id = ?1 AND address = ?2",
                ADDRESS_COLUMNS
            ),
            params![subnet_id, address],
            address_from_row,
        )
        .optional()?;
    Ok(row)
}

/// Addresses of a subnet in storage order; callers sort as needed
pub fn list_addresses(conn: &Connection, subnet_id: i64) -> IpamResult<Vec<Address>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM addresses WHERE subnet_id = ?1 ORDER BY address ASC",
        ADDRESS_COLUMNS
    ))?;

    let addresses = stmt
        .query_map(params![subnet_id], address_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(addresses)
}

pub fn delete_address(conn: &Connection, subnet_id: i64, address: &str) -> IpamResult<usize> {
    let deleted = conn.execute(
        "DELETE FROM addresses WHERE subnet_id = ?1 AND address = ?2",
        params![subnet_id, address],
    )?;
    Ok(deleted)
}

// ====== Row mapping ======

fn subnet_from_row(row: &Row<'_>) -> rusqlite::Result<Subnet> {
    Ok(Subnet {
        id: row.get(0)?,
        company_id: row.get(1)?,
        site_id: row.get(2)?,
        vlan_id: row.get(3)?,
        vrf_id: row.get(4)?,
        name: row.get(5)?,
        cidr: row.get(6)?,
        description: row.get(7)?,
        created_at: parse_datetime_column(row.get::<_, String>(8)?, 8)?,
    })
}

fn address_from_row(row: &Row<'_>) -> rusqlite::Result<Address> {
    Ok(Address {
        subnet_id: row.get(0)?,
        address: row.get(1)?,
        hostname: row.get(2)?,
        status: parse_status_or_default(&row.get::<_, String>(3)?),
        assigned_to: row.get(4)?,
        updated_at: parse_datetime_column(row.get::<_, String>(5)?, 5)?,
    })
}

fn parse_datetime_column(s: String, column: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_str(&format!("{} +0000", s), "%Y-%m-%d %H:%M:%S %z")
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn parse_status_or_default(s: &str) -> AddressStatus {
    match s.parse() {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!("Unknown address status in database: {}", s);
            AddressStatus::Assigned
        }
    }
}
