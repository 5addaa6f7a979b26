//! Reconciliation of externally discovered hosts against registered subnets
//!
//! One pass: fetch hosts from a [`HostSource`], pick an address per host
//! (falling back to DNS for hosts without one), match it to its owning
//! subnet and upsert an `ASSIGNED` address row. Per-host failures are
//! counted, never fatal.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::time::Instant;

use crate::config::IpamSettings;
use crate::database::Database;
use crate::discovery::HostSource;
use crate::error::{IpamError, IpamResult};
use crate::ipam::{AddressRegistry, RangeMatcher, SubnetRegistry};
use crate::models::{DiscoveredHost, ReconcileReport, SubnetFilter, UnmatchedHost, UpsertAddress};
use crate::network::dns::{self, HostResolver, SystemResolver};

pub struct Reconciler {
    subnets: SubnetRegistry,
    addresses: AddressRegistry,
    settings: IpamSettings,
    resolver: Arc<dyn HostResolver>,
}

/// Address choice for one host before matching
#[derive(Debug, Clone, PartialEq, Eq)]
enum HostAddress {
    Interface(Ipv4Addr),
    NeedsDns(String),
}

/// Usable interface address for a host.
///
/// Interfaces flagged `useip` are preferred. Empty, unparsable, loopback,
/// link-local and unspecified addresses are skipped.
pub fn pick_interface_ip(host: &DiscoveredHost) -> Option<Ipv4Addr> {
    let usable = |raw: &str| {
        raw.trim()
            .parse::<Ipv4Addr>()
            .ok()
            .filter(|ip| dns::is_usable_ipv4(*ip))
    };

    host.interfaces
        .iter()
        .filter(|iface| iface.useip)
        .find_map(|iface| usable(&iface.ip))
        .or_else(|| host.interfaces.iter().find_map(|iface| usable(&iface.ip)))
}

/// Name to resolve when no interface address is usable: the first
/// interface DNS name, else the host name.
fn dns_candidate(host: &DiscoveredHost) -> String {
    host.interfaces
        .iter()
        .map(|iface| iface.dns.trim())
        .find(|dns| !dns.is_empty())
        .unwrap_or(host.name.trim())
        .to_string()
}

fn classify(host: &DiscoveredHost) -> HostAddress {
    match pick_interface_ip(host) {
        Some(ip) => HostAddress::Interface(ip),
        None => HostAddress::NeedsDns(dns_candidate(host)),
    }
}

impl Reconciler {
    pub fn new(db: Database, settings: IpamSettings) -> Self {
        Self {
            subnets: SubnetRegistry::new(db.clone(), settings.clone()),
            addresses: AddressRegistry::new(db, settings.clone()),
            settings,
            resolver: Arc::new(SystemResolver),
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn HostResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Runs one reconciliation pass for `company_id`.
    ///
    /// Only a failed inventory fetch (or a storage failure loading subnets)
    /// fails the pass; everything after that is counted in the report.
    pub async fn run(
        &self,
        source: &dyn HostSource,
        company_id: i64,
        group_filter: Option<&str>,
        cancel: &AtomicBool,
    ) -> IpamResult<ReconcileReport> {
        let deadline = Instant::now() + self.settings.reconcile_timeout();

        let hosts = match tokio::time::timeout(
            self.settings.inventory_timeout(),
            source.fetch_hosts(group_filter),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(IpamError::ExternalFailure(format!(
                    "{} inventory fetch timed out after {:?}",
                    source.source_id(),
                    self.settings.inventory_timeout()
                )));
            }
        };

        let matcher = RangeMatcher::new(self.subnets.list(&SubnetFilter::company(company_id))?);
        crate::log_stderr!(
            "Reconciling {} hosts from {} against {} subnets of company {}",
            hosts.len(),
            source.source_id(),
            matcher.len(),
            company_id
        );

        let mut report = ReconcileReport {
            hosts_seen: hosts.len(),
            ..ReconcileReport::default()
        };

        let classified: Vec<(&DiscoveredHost, HostAddress)> =
            hosts.iter().map(|h| (h, classify(h))).collect();

        let dns_names: Vec<String> = classified
            .iter()
            .filter_map(|(_, addr)| match addr {
                HostAddress::NeedsDns(name) if !name.is_empty() => Some(name.clone()),
                _ => None,
            })
            .collect();

        let resolved: HashMap<String, Ipv4Addr> = dns::resolve_hosts(
            Arc::clone(&self.resolver),
            &dns_names,
            self.settings.dns_workers,
            self.settings.dns_timeout(),
            deadline,
            cancel,
        )
        .await;
        report.dns_resolved = resolved.len();

        for (host, addr) in classified {
            if cancel.load(Ordering::Relaxed) {
                crate::log_warn!("Reconciliation cancelled after {} hosts", report.matched + report.unmatched);
                report.cancelled = true;
                break;
            }
            if Instant::now() >= deadline {
                crate::log_warn!("Reconciliation pass deadline reached; stopping early");
                report.timed_out = true;
                break;
            }

            let ip = match addr {
                HostAddress::Interface(ip) => ip,
                HostAddress::NeedsDns(name) => match resolved.get(&name) {
                    Some(ip) => *ip,
                    None => {
                        crate::log_debug!("No usable address for host {}", host.name);
                        report.missing_ip += 1;
                        continue;
                    }
                },
            };

            let ip_text = ip.to_string();
            let Some(subnet) = matcher.match_int(u32::from(ip)) else {
                report.unmatched += 1;
                if report.unmatched_sample.len() < self.settings.unmatched_sample_size {
                    report.unmatched_sample.push(UnmatchedHost {
                        host: host.name.clone(),
                        ip: ip_text,
                    });
                }
                continue;
            };

            let hostname = Some(host.name.as_str()).filter(|n| !n.trim().is_empty());
            match self
                .addresses
                .upsert(UpsertAddress::assigned(subnet.id, &ip_text, hostname))
            {
                Ok(_) => report.matched += 1,
                Err(e) => {
                    crate::log_warn!("Upsert of {} ({}) failed: {}", ip_text, host.name, e);
                    report.errors += 1;
                }
            }
        }

        crate::log_stderr!(
            "Reconcile complete: {} matched, {} unmatched, {} missing IP, {} errors",
            report.matched,
            report.unmatched,
            report.missing_ip,
            report.errors
        );

        Ok(report)
    }
}
