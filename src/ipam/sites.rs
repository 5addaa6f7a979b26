//! Site, VLAN and VRF lookups the planner depends on

use crate::database::{Database, Site, Vlan, Vrf, queries};
use crate::error::{IpamError, IpamResult};

#[derive(Clone)]
pub struct SiteDirectory {
    db: Database,
}

impl SiteDirectory {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn create_site(&self, company_id: i64, name: &str) -> IpamResult<Site> {
        let name = non_empty(name, "site name")?;
        let conn = self.db.lock()?;
        queries::insert_site(&conn, company_id, name)
    }

    /// Fails with `InvalidSite` when the site does not exist.
    pub fn get_site(&self, id: i64) -> IpamResult<Site> {
        let conn = self.db.lock()?;
        queries::get_site(&conn, id)?.ok_or(IpamError::InvalidSite(id))
    }

    pub fn create_vlan(&self, site_id: i64, number: u16, name: &str) -> IpamResult<Vlan> {
        if !(1..=4094).contains(&number) {
            return Err(IpamError::InvalidInput(format!(
                "VLAN number {} not in 1..=4094",
                number
            )));
        }
        let name = non_empty(name, "VLAN name")?;
        let conn = self.db.lock()?;
        if queries::get_site(&conn, site_id)?.is_none() {
            return Err(IpamError::InvalidSite(site_id));
        }
        queries::insert_vlan(&conn, site_id, number, name)
    }

    pub fn list_vlans(&self, site_id: i64) -> IpamResult<Vec<Vlan>> {
        let conn = self.db.lock()?;
        queries::list_vlans_for_site(&conn, site_id)
    }

    pub fn create_vrf(&self, company_id: i64, name: &str) -> IpamResult<Vrf> {
        let name = non_empty(name, "VRF name")?;
        let conn = self.db.lock()?;
        queries::insert_vrf(&conn, company_id, name)
    }
}

fn non_empty<'a>(value: &'a str, what: &str) -> IpamResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(IpamError::InvalidInput(format!("{} must not be empty", what)));
    }
    Ok(trimmed)
}
