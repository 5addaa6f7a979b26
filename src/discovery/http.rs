use reqwest::Client;

use super::{HostFuture, HostSource, filter_by_group, parse_host_list};
use crate::error::{IpamError, IpamResult};

/// Fetches a normalized host list over HTTP GET.
///
/// The group filter is forwarded as `?group=<name>` and also applied locally,
/// so endpoints that ignore the parameter still behave.
#[derive(Debug, Clone)]
pub struct HttpHostSource {
    endpoint: String,
    client: Client,
}

impl HttpHostSource {
    pub fn new(endpoint: String) -> IpamResult<Self> {
        let client = Client::builder()
            .user_agent(concat!("ipam-core/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| IpamError::ExternalFailure(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { endpoint, client })
    }
}

impl HostSource for HttpHostSource {
    fn source_id(&self) -> &str {
        "http"
    }

    fn fetch_hosts<'a>(&'a self, group_filter: Option<&'a str>) -> HostFuture<'a> {
        Box::pin(async move {
            let mut request = self.client.get(&self.endpoint);
            if let Some(group) = group_filter.filter(|g| !g.trim().is_empty()) {
                request = request.query(&[("group", group)]);
            }

            let response = request.send().await.map_err(|e| {
                IpamError::ExternalFailure(format!("Inventory request to {} failed: {}", self.endpoint, e))
            })?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(IpamError::ExternalFailure(format!(
                    "Inventory request failed with {}: {}",
                    status, body
                )));
            }

            let body = response.text().await.map_err(|e| {
                IpamError::ExternalFailure(format!("Failed to read inventory response: {}", e))
            })?;
            let hosts = parse_host_list(&body)?;
            Ok(filter_by_group(hosts, group_filter))
        })
    }
}
