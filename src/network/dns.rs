//! DNS fallback for hosts that report no usable interface address
//!
//! Lookups run on blocking threads behind a semaphore, each under its own
//! timeout, and the whole batch under one deadline. A failed or slow lookup
//! only drops that host.

use dns_lookup::lookup_host;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::sync::Semaphore;
use tokio::time::Instant;

/// Blocking name -> IPv4 resolution.
pub trait HostResolver: Send + Sync + 'static {
    fn resolve(&self, name: &str) -> Option<Ipv4Addr>;
}

/// Resolver backed by the system's getaddrinfo
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl HostResolver for SystemResolver {
    fn resolve(&self, name: &str) -> Option<Ipv4Addr> {
        forward_lookup(name)
    }
}

/// Whether an address can identify a host on a registered subnet.
pub fn is_usable_ipv4(ip: Ipv4Addr) -> bool {
    !(ip.is_loopback() || ip.is_link_local() || ip.is_unspecified() || ip.is_broadcast())
}

/// First usable IPv4 address `name` resolves to
pub fn forward_lookup(name: &str) -> Option<Ipv4Addr> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    match lookup_host(name) {
        Ok(addrs) => addrs.into_iter().find_map(|addr| match addr {
            IpAddr::V4(v4) if is_usable_ipv4(v4) => Some(v4),
            _ => None,
        }),
        Err(e) => {
            tracing::debug!("DNS lookup for {} failed: {}", name, e);
            None
        }
    }
}

/// How often the join loop re-checks the cancel flag while lookups run.
const CANCEL_POLL: Duration = Duration::from_millis(50);

/// Resolve many names with at most `workers` lookups in flight.
///
/// A worker permit is held by the blocking thread itself, so a lookup that
/// outlives its timeout still occupies its slot until getaddrinfo returns.
/// Names that fail, time out, or are still pending at `deadline` or when
/// `cancel` is raised are absent from the result.
pub async fn resolve_hosts(
    resolver: Arc<dyn HostResolver>,
    names: &[String],
    workers: usize,
    lookup_timeout: Duration,
    deadline: Instant,
    cancel: &AtomicBool,
) -> HashMap<String, Ipv4Addr> {
    if names.is_empty() {
        return HashMap::new();
    }

    crate::log_stderr!(
        "DNS fallback for {} hosts ({} workers)...",
        names.len(),
        workers
    );

    let semaphore = Arc::new(Semaphore::new(workers.max(1)));
    let results = Arc::new(Mutex::new(HashMap::new()));

    let mut handles = Vec::new();

    for name in names {
        let semaphore = Arc::clone(&semaphore);
        let results = Arc::clone(&results);
        let resolver = Arc::clone(&resolver);
        let name = name.clone();

        let handle = tokio::spawn(async move {
            let permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    crate::log_warn!("DNS semaphore acquire failed for {}: {}", name, e);
                    return;
                }
            };

            let lookup_name = name.clone();
            let lookup_result = tokio::time::timeout(
                lookup_timeout,
                tokio::task::spawn_blocking(move || {
                    let _permit = permit;
                    resolver.resolve(&lookup_name)
                }),
            )
            .await;

            match lookup_result {
                Ok(Ok(Some(ip))) => {
                    results.lock().await.insert(name, ip);
                }
                Ok(Ok(None)) => {}
                Ok(Err(e)) => crate::log_warn!("DNS worker join failed for {}: {}", name, e),
                Err(_) => crate::log_debug!("DNS lookup for {} timed out", name),
            }
        });

        handles.push(handle);
    }

    let mut stopped = false;
    'join: for mut handle in handles {
        if stopped {
            handle.abort();
            continue;
        }
        loop {
            if cancel.load(Ordering::Relaxed) {
                crate::log_warn!("DNS fallback cancelled; abandoning pending lookups");
                handle.abort();
                stopped = true;
                continue 'join;
            }
            let wake = (Instant::now() + CANCEL_POLL).min(deadline);
            match tokio::time::timeout_at(wake, &mut handle).await {
                Ok(Ok(())) => break,
                Ok(Err(e)) => {
                    if !e.is_cancelled() {
                        crate::log_warn!("DNS task failed: {}", e);
                    }
                    break;
                }
                Err(_) if Instant::now() >= deadline => {
                    crate::log_warn!("DNS fallback deadline reached; abandoning pending lookups");
                    handle.abort();
                    stopped = true;
                    break;
                }
                Err(_) => {}
            }
        }
    }

    let res = results.lock().await.clone();
    crate::log_stderr!("DNS fallback complete: {} of {} resolved", res.len(), names.len());
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct StaticResolver(HashMap<&'static str, Ipv4Addr>);

    impl HostResolver for StaticResolver {
        fn resolve(&self, name: &str) -> Option<Ipv4Addr> {
            if name == "slow" {
                std::thread::sleep(Duration::from_millis(300));
            }
            self.0.get(name).copied()
        }
    }

    #[test]
    fn test_usable_ipv4_filter() {
        assert!(is_usable_ipv4(Ipv4Addr::new(10, 0, 0, 1)));
        assert!(!is_usable_ipv4(Ipv4Addr::new(127, 0, 0, 1)));
        assert!(!is_usable_ipv4(Ipv4Addr::new(169, 254, 3, 4)));
        assert!(!is_usable_ipv4(Ipv4Addr::UNSPECIFIED));
    }

    #[test]
    fn test_forward_lookup_empty_name() {
        assert_eq!(forward_lookup("  "), None);
    }

    #[tokio::test]
    async fn resolves_known_names_and_drops_failures() {
        let resolver = Arc::new(StaticResolver(HashMap::from([
            ("db01", Ipv4Addr::new(10, 0, 0, 7)),
            ("web01", Ipv4Addr::new(10, 0, 0, 8)),
        ])));
        let names = vec!["db01".to_string(), "web01".to_string(), "ghost".to_string()];

        let resolved = resolve_hosts(
            resolver,
            &names,
            2,
            Duration::from_secs(1),
            Instant::now() + Duration::from_secs(5),
            &AtomicBool::new(false),
        )
        .await;

        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved["db01"], Ipv4Addr::new(10, 0, 0, 7));
        assert!(!resolved.contains_key("ghost"));
    }

    #[tokio::test]
    async fn per_lookup_timeout_drops_slow_host() {
        let resolver = Arc::new(StaticResolver(HashMap::from([
            ("slow", Ipv4Addr::new(10, 0, 0, 9)),
            ("fast", Ipv4Addr::new(10, 0, 0, 10)),
        ])));
        let names = vec!["slow".to_string(), "fast".to_string()];

        let resolved = resolve_hosts(
            resolver,
            &names,
            4,
            Duration::from_millis(50),
            Instant::now() + Duration::from_secs(5),
            &AtomicBool::new(false),
        )
        .await;

        assert!(resolved.contains_key("fast"));
        assert!(!resolved.contains_key("slow"));
    }

    struct CountingResolver {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        delay: Duration,
    }

    impl HostResolver for CountingResolver {
        fn resolve(&self, _name: &str) -> Option<Ipv4Addr> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            None
        }
    }

    #[tokio::test]
    async fn timed_out_lookups_keep_their_worker_slot() {
        let resolver = Arc::new(CountingResolver {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            delay: Duration::from_millis(80),
        });
        let names: Vec<String> = (0..8).map(|i| format!("host{}", i)).collect();

        let resolved = resolve_hosts(
            resolver.clone(),
            &names,
            2,
            Duration::from_millis(10),
            Instant::now() + Duration::from_secs(10),
            &AtomicBool::new(false),
        )
        .await;

        assert!(resolved.is_empty());
        let peak = resolver.peak.load(Ordering::SeqCst);
        assert!(peak >= 1);
        assert!(peak <= 2, "{} lookups ran at once with 2 workers", peak);
    }

    #[tokio::test]
    async fn cancel_abandons_pending_lookups() {
        let resolver = Arc::new(StaticResolver(HashMap::from([(
            "slow",
            Ipv4Addr::new(10, 0, 0, 9),
        )])));
        let names = vec!["slow".to_string()];
        let cancel = AtomicBool::new(true);

        let started = std::time::Instant::now();
        let resolved = resolve_hosts(
            resolver,
            &names,
            1,
            Duration::from_secs(5),
            Instant::now() + Duration::from_secs(30),
            &cancel,
        )
        .await;

        assert!(resolved.is_empty());
        assert!(started.elapsed() < Duration::from_millis(250));
    }

    #[tokio::test]
    async fn deadline_keeps_lookups_already_resolved() {
        let resolver = Arc::new(StaticResolver(HashMap::from([
            ("slow", Ipv4Addr::new(10, 0, 0, 9)),
            ("fast", Ipv4Addr::new(10, 0, 0, 10)),
        ])));
        let names = vec!["slow".to_string(), "fast".to_string()];

        let resolved = resolve_hosts(
            resolver,
            &names,
            2,
            Duration::from_secs(5),
            Instant::now() + Duration::from_millis(100),
            &AtomicBool::new(false),
        )
        .await;

        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved["fast"], Ipv4Addr::new(10, 0, 0, 10));
    }
}
