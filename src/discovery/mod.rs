//! Discovery sources feeding the reconciliation pass
//!
//! A source returns normalized host records; how it talks to the upstream
//! inventory system is its own business.

mod http;

pub use http::HttpHostSource;

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use crate::error::{IpamError, IpamResult};
use crate::models::DiscoveredHost;

pub type HostFuture<'a> = Pin<Box<dyn Future<Output = IpamResult<Vec<DiscoveredHost>>> + Send + 'a>>;

pub trait HostSource: Send + Sync {
    fn source_id(&self) -> &str;

    /// Fetch hosts, optionally narrowed to a host group by name.
    fn fetch_hosts<'a>(&'a self, group_filter: Option<&'a str>) -> HostFuture<'a>;
}

/// Hosts read from a JSON file holding `[{name, interfaces, groups}]`.
#[derive(Debug, Clone)]
pub struct JsonFileHostSource {
    path: PathBuf,
}

impl JsonFileHostSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl HostSource for JsonFileHostSource {
    fn source_id(&self) -> &str {
        "json-file"
    }

    fn fetch_hosts<'a>(&'a self, group_filter: Option<&'a str>) -> HostFuture<'a> {
        Box::pin(async move {
            let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
                IpamError::ExternalFailure(format!(
                    "Failed to read host list {}: {}",
                    self.path.display(),
                    e
                ))
            })?;
            let hosts = parse_host_list(&raw)?;
            Ok(filter_by_group(hosts, group_filter))
        })
    }
}

/// Fixed host list, mostly useful for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct StaticHostSource {
    hosts: Vec<DiscoveredHost>,
}

impl StaticHostSource {
    pub fn new(hosts: Vec<DiscoveredHost>) -> Self {
        Self { hosts }
    }
}

impl HostSource for StaticHostSource {
    fn source_id(&self) -> &str {
        "static"
    }

    fn fetch_hosts<'a>(&'a self, group_filter: Option<&'a str>) -> HostFuture<'a> {
        Box::pin(async move { Ok(filter_by_group(self.hosts.clone(), group_filter)) })
    }
}

/// Picks a source from a CLI-style locator: `http(s)://...` or a file path.
pub fn source_from_locator(locator: &str) -> IpamResult<Box<dyn HostSource>> {
    if locator.starts_with("http://") || locator.starts_with("https://") {
        Ok(Box::new(HttpHostSource::new(locator.to_string())?))
    } else {
        Ok(Box::new(JsonFileHostSource::new(PathBuf::from(locator))))
    }
}

pub(crate) fn parse_host_list(raw: &str) -> IpamResult<Vec<DiscoveredHost>> {
    serde_json::from_str(raw)
        .map_err(|e| IpamError::ExternalFailure(format!("Malformed host list: {}", e)))
}

/// Case-insensitive exact match on group name; no filter keeps everything.
pub(crate) fn filter_by_group(
    hosts: Vec<DiscoveredHost>,
    group_filter: Option<&str>,
) -> Vec<DiscoveredHost> {
    match group_filter.map(str::trim).filter(|g| !g.is_empty()) {
        Some(group) => hosts
            .into_iter()
            .filter(|h| h.groups.iter().any(|g| g.eq_ignore_ascii_case(group)))
            .collect(),
        None => hosts,
    }
}
