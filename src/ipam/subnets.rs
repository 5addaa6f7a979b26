//! Subnet registry: validated CRUD and usage statistics over subnet records

use rusqlite::Connection;

use crate::config::IpamSettings;
use crate::database::{Database, Subnet, SubnetUsage, queries};
use crate::error::{IpamError, IpamResult};
use crate::models::{NewSubnet, SubnetFilter, SubnetPatch};
use crate::network::cidr::{self, ParsedCidr};

#[derive(Clone)]
pub struct SubnetRegistry {
    db: Database,
    settings: IpamSettings,
}

impl SubnetRegistry {
    pub fn new(db: Database, settings: IpamSettings) -> Self {
        Self { db, settings }
    }

    pub fn create(&self, subnet: NewSubnet) -> IpamResult<Subnet> {
        let subnet = validate_new_subnet(subnet)?;
        let parsed = cidr::parse_cidr(&subnet.cidr)?;

        let created = self.db.transaction("create_subnet", |conn| {
            if self.settings.reject_overlapping_subnets {
                let scope = OverlapScope {
                    company_id: subnet.company_id,
                    site_id: subnet.site_id,
                    vrf_id: subnet.vrf_id,
                    exclude_id: None,
                };
                ensure_no_overlap(conn, &scope, &parsed)?;
            }
            queries::insert_subnet(conn, &subnet)
        })?;

        crate::log_debug!(
            "Created subnet {} ({}) for company {}",
            created.id,
            created.cidr,
            created.company_id
        );
        Ok(created)
    }

    pub fn list(&self, filter: &SubnetFilter) -> IpamResult<Vec<Subnet>> {
        let conn = self.db.lock()?;
        queries::list_subnets(&conn, filter)
    }

    pub fn get(&self, id: i64) -> IpamResult<Subnet> {
        let conn = self.db.lock()?;
        queries::get_subnet(&conn, id)?.ok_or_else(|| IpamError::not_found("subnet", id))
    }

    pub fn update(&self, id: i64, mut patch: SubnetPatch) -> IpamResult<Subnet> {
        if let Some(raw) = patch.cidr.take() {
            patch.cidr = Some(normalize_cidr(&raw)?);
        }
        if let Some(name) = patch.name.take() {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(IpamError::InvalidInput("subnet name must not be empty".to_string()));
            }
            patch.name = Some(name);
        }

        let updated = self.db.transaction("update_subnet", |conn| {
            let current =
                queries::get_subnet(conn, id)?.ok_or_else(|| IpamError::not_found("subnet", id))?;
            let moved = patch.cidr.is_some() || patch.site_id.is_some() || patch.vrf_id.is_some();
            if moved {
                let new_cidr = patch.cidr.as_deref().unwrap_or(&current.cidr);
                let parsed = cidr::parse_cidr(new_cidr)?;

                if patch.cidr.is_some() && self.settings.enforce_address_containment {
                    if let Some(stray) = queries::list_addresses(conn, id)?
                        .iter()
                        .find(|a| cidr::ip_to_int(&a.address).is_ok_and(|ip| !parsed.contains(ip)))
                    {
                        return Err(IpamError::Conflict(format!(
                            "{} would leave address {} outside subnet '{}'",
                            new_cidr, stray.address, current.name
                        )));
                    }
                }

                if self.settings.reject_overlapping_subnets {
                    let scope = OverlapScope {
                        company_id: current.company_id,
                        site_id: patch.site_id.or(current.site_id),
                        vrf_id: patch.vrf_id.or(current.vrf_id),
                        exclude_id: Some(id),
                    };
                    ensure_no_overlap(conn, &scope, &parsed)?;
                }
            }

            queries::update_subnet(conn, id, &patch)?;
            queries::get_subnet(conn, id)?.ok_or_else(|| IpamError::not_found("subnet", id))
        })?;

        crate::log_debug!("Updated subnet {} ({})", updated.id, updated.cidr);
        Ok(updated)
    }

    /// Deletes the subnet and all of its addresses in one transaction.
    /// Returns the number of addresses removed with it.
    pub fn delete(&self, id: i64) -> IpamResult<usize> {
        let removed = self.db.transaction("delete_subnet", |conn| {
            if queries::get_subnet(conn, id)?.is_none() {
                return Err(IpamError::not_found("subnet", id));
            }
            let addresses = queries::delete_addresses_for_subnet(conn, id)?;
            queries::delete_subnet(conn, id)?;
            Ok(addresses)
        })?;

        crate::log_debug!("Deleted subnet {} with {} addresses", id, removed);
        Ok(removed)
    }

    /// Subnets with their address counts, capacity and occupancy.
    pub fn stats_with_usage(
        &self,
        company_id: i64,
        site_id: Option<i64>,
    ) -> IpamResult<Vec<SubnetUsage>> {
        let rows = {
            let conn = self.db.lock()?;
            queries::subnet_usage(&conn, company_id, site_id)?
        };

        Ok(rows
            .into_iter()
            .map(|(subnet, usage_count)| {
                let capacity = match cidr::parse_cidr(&subnet.cidr) {
                    Ok(parsed) => cidr::capacity(parsed.mask),
                    Err(e) => {
                        crate::log_warn!("Subnet {} has unparsable CIDR: {}", subnet.id, e);
                        0
                    }
                };
                let occupancy = if capacity == 0 {
                    0.0
                } else {
                    usage_count as f64 / capacity as f64
                };
                SubnetUsage {
                    subnet,
                    usage_count,
                    capacity,
                    occupancy,
                }
            })
            .collect())
    }
}

fn validate_new_subnet(mut subnet: NewSubnet) -> IpamResult<NewSubnet> {
    subnet.name = subnet.name.trim().to_string();
    if subnet.name.is_empty() {
        return Err(IpamError::InvalidInput("subnet name must not be empty".to_string()));
    }
    subnet.cidr = normalize_cidr(&subnet.cidr)?;
    Ok(subnet)
}

/// Validates a CIDR and returns its canonical text (host bits cleared).
fn normalize_cidr(raw: &str) -> IpamResult<String> {
    let parsed = cidr::parse_cidr(raw)?;
    let canonical = parsed.canonical();
    if !parsed.is_canonical() {
        crate::log_warn!(
            "CIDR {} has host bits set; storing canonical {}",
            raw.trim(),
            canonical
        );
    }
    Ok(canonical.to_string())
}

/// Where a subnet would live, for the sibling overlap check
struct OverlapScope {
    company_id: i64,
    site_id: Option<i64>,
    vrf_id: Option<i64>,
    exclude_id: Option<i64>,
}

fn ensure_no_overlap(conn: &Connection, scope: &OverlapScope, candidate: &ParsedCidr) -> IpamResult<()> {
    let siblings = queries::list_subnets(
        conn,
        &SubnetFilter {
            company_id: scope.company_id,
            site_id: scope.site_id,
            vlan_id: None,
            vrf_id: None,
        },
    )?;
    match siblings
        .iter()
        .filter(|s| Some(s.id) != scope.exclude_id)
        .filter(|s| s.site_id == scope.site_id && s.vrf_id == scope.vrf_id)
        .find(|s| overlaps_stored(candidate, s))
    {
        Some(existing) => Err(IpamError::Conflict(format!(
            "{} overlaps existing subnet '{}' ({})",
            candidate, existing.name, existing.cidr
        ))),
        None => Ok(()),
    }
}

fn overlaps_stored(candidate: &ParsedCidr, existing: &Subnet) -> bool {
    match cidr::parse_cidr(&existing.cidr) {
        Ok(parsed) => cidr::overlaps(candidate.range(), parsed.range()),
        Err(_) => false,
    }
}
