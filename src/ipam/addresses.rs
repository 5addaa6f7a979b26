//! Address registry: assignments keyed by `(subnet_id, address)`

use crate::config::IpamSettings;
use crate::database::{Address, Database, queries};
use crate::error::{IpamError, IpamResult};
use crate::models::UpsertAddress;
use crate::network::cidr;

#[derive(Clone)]
pub struct AddressRegistry {
    db: Database,
    settings: IpamSettings,
}

impl AddressRegistry {
    pub fn new(db: Database, settings: IpamSettings) -> Self {
        Self { db, settings }
    }

    /// Creates or updates the row for `(subnet_id, address)`.
    ///
    /// The address text is stored in canonical dotted-quad form. With
    /// `enforce_address_containment` on, addresses outside the subnet's range
    /// are rejected.
    pub fn upsert(&self, mut request: UpsertAddress) -> IpamResult<Address> {
        let ip = cidr::ip_to_int(&request.address)?;
        request.address = cidr::int_to_ip(ip);
        request.hostname = request
            .hostname
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty());

        let conn = self.db.lock()?;
        let subnet = queries::get_subnet(&conn, request.subnet_id)?
            .ok_or_else(|| IpamError::not_found("subnet", request.subnet_id))?;

        let parsed = cidr::parse_cidr(&subnet.cidr)?;
        if self.settings.enforce_address_containment && !parsed.canonical().contains(ip) {
            return Err(IpamError::invalid_address(
                &request.address,
                format!("outside subnet {} ({})", subnet.name, subnet.cidr),
            ));
        }
        if parsed.is_network_or_broadcast(ip) {
            crate::log_warn!(
                "{} is the network or broadcast address of {}",
                request.address,
                subnet.cidr
            );
        }

        let address = queries::upsert_address(&conn, &request)?;
        crate::log_debug!(
            "Upserted {} in subnet {} as {}",
            address.address,
            address.subnet_id,
            address.status
        );
        Ok(address)
    }

    /// Addresses of a subnet in numeric IP order.
    pub fn list(&self, subnet_id: i64) -> IpamResult<Vec<Address>> {
        let mut addresses = {
            let conn = self.db.lock()?;
            queries::list_addresses(&conn, subnet_id)?
        };
        // Rows that do not parse sort after every valid address.
        addresses.sort_by_key(|a| {
            cidr::ip_to_int(&a.address)
                .map(u64::from)
                .unwrap_or(u64::MAX)
        });
        Ok(addresses)
    }

    pub fn delete(&self, subnet_id: i64, address: &str) -> IpamResult<()> {
        let key = cidr::int_to_ip(cidr::ip_to_int(address)?);

        let conn = self.db.lock()?;
        if queries::delete_address(&conn, subnet_id, &key)? == 0 {
            return Err(IpamError::not_found(
                "address",
                format!("{} in subnet {}", key, subnet_id),
            ));
        }
        Ok(())
    }
}
