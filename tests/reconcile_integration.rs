use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use ipam_core::discovery::{HostFuture, HostSource, StaticHostSource};
use ipam_core::{
    AddressRegistry, Database, DiscoveredHost, ErrorKind, HostInterface, HostResolver,
    IpamError, IpamSettings, NewSubnet, Reconciler, Subnet, SubnetRegistry,
};

struct FakeResolver(HashMap<&'static str, Ipv4Addr>);

impl HostResolver for FakeResolver {
    fn resolve(&self, name: &str) -> Option<Ipv4Addr> {
        self.0.get(name).copied()
    }
}

/// Resolves `fast.corp.example` at once and sleeps before answering anything else.
struct SlowResolver {
    delay: Duration,
    raise_on_call: Option<Arc<AtomicBool>>,
}

impl HostResolver for SlowResolver {
    fn resolve(&self, name: &str) -> Option<Ipv4Addr> {
        if name == "fast.corp.example" {
            return Some(Ipv4Addr::new(10, 0, 0, 20));
        }
        if let Some(flag) = &self.raise_on_call {
            flag.store(true, Ordering::SeqCst);
        }
        std::thread::sleep(self.delay);
        Some(Ipv4Addr::new(10, 0, 0, 21))
    }
}

struct FailingSource;

impl HostSource for FailingSource {
    fn source_id(&self) -> &str {
        "failing"
    }

    fn fetch_hosts<'a>(&'a self, _group_filter: Option<&'a str>) -> HostFuture<'a> {
        Box::pin(async { Err(IpamError::ExternalFailure("upstream returned 503".to_string())) })
    }
}

struct SlowSource;

impl HostSource for SlowSource {
    fn source_id(&self) -> &str {
        "slow"
    }

    fn fetch_hosts<'a>(&'a self, _group_filter: Option<&'a str>) -> HostFuture<'a> {
        Box::pin(async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Vec::new())
        })
    }
}

fn host(name: &str, ip: &str, dns: &str, groups: &[&str]) -> DiscoveredHost {
    DiscoveredHost {
        name: name.to_string(),
        interfaces: vec![HostInterface {
            ip: ip.to_string(),
            dns: dns.to_string(),
            useip: true,
        }],
        groups: groups.iter().map(|g| g.to_string()).collect(),
    }
}

fn create_subnet(registry: &SubnetRegistry, name: &str, cidr: &str) -> Subnet {
    registry
        .create(NewSubnet {
            company_id: 1,
            name: name.to_string(),
            cidr: cidr.to_string(),
            ..NewSubnet::default()
        })
        .expect("subnet should be created")
}

fn setup(settings: IpamSettings) -> (Database, Subnet, Reconciler) {
    let db = Database::in_memory().expect("in-memory database should open");
    let subnets = SubnetRegistry::new(db.clone(), settings.clone());
    create_subnet(&subnets, "campus", "10.0.0.0/16");
    let servers = create_subnet(&subnets, "servers", "10.0.0.0/24");

    let resolver = Arc::new(FakeResolver(HashMap::from([(
        "db01.corp.example",
        Ipv4Addr::new(10, 0, 0, 9),
    )])));
    let reconciler = Reconciler::new(db.clone(), settings).with_resolver(resolver);
    (db, servers, reconciler)
}

#[tokio::test]
async fn reconcile_matches_resolves_and_samples_unmatched() {
    let (db, servers, reconciler) = setup(IpamSettings::default());
    let source = StaticHostSource::new(vec![
        host("web01", "10.0.0.5", "", &[]),
        host("edge01", "172.16.0.1", "", &[]),
        host("db01", "127.0.0.1", "db01.corp.example", &[]),
        host("ghost", "", "", &[]),
    ]);

    let report = reconciler
        .run(&source, 1, None, &AtomicBool::new(false))
        .await
        .expect("pass should succeed");

    assert_eq!(report.hosts_seen, 4);
    assert_eq!(report.matched, 2);
    assert_eq!(report.unmatched, 1);
    assert_eq!(report.missing_ip, 1);
    assert_eq!(report.dns_resolved, 1);
    assert_eq!(report.errors, 0);
    assert!(!report.cancelled);
    assert_eq!(report.unmatched_sample.len(), 1);
    assert_eq!(report.unmatched_sample[0].host, "edge01");
    assert_eq!(report.unmatched_sample[0].ip, "172.16.0.1");

    // Longest prefix wins: both hosts land in the /24, not the /16.
    let addresses = AddressRegistry::new(db, IpamSettings::default())
        .list(servers.id)
        .unwrap();
    let rows: Vec<_> = addresses
        .iter()
        .map(|a| (a.address.as_str(), a.hostname.as_deref()))
        .collect();
    assert_eq!(
        rows,
        vec![("10.0.0.5", Some("web01")), ("10.0.0.9", Some("db01"))]
    );
}

#[tokio::test]
async fn reconcile_is_idempotent() {
    let (db, servers, reconciler) = setup(IpamSettings::default());
    let source = StaticHostSource::new(vec![host("web01", "10.0.0.5", "", &[])]);
    let cancel = AtomicBool::new(false);

    reconciler.run(&source, 1, None, &cancel).await.unwrap();
    let second = reconciler.run(&source, 1, None, &cancel).await.unwrap();

    assert_eq!(second.matched, 1);
    let addresses = AddressRegistry::new(db, IpamSettings::default())
        .list(servers.id)
        .unwrap();
    assert_eq!(addresses.len(), 1);
}

#[tokio::test]
async fn reconcile_applies_group_filter() {
    let (_db, _servers, reconciler) = setup(IpamSettings::default());
    let source = StaticHostSource::new(vec![
        host("web01", "10.0.0.5", "", &["Linux servers"]),
        host("sw01", "10.0.0.6", "", &["Switches"]),
    ]);

    let report = reconciler
        .run(&source, 1, Some("linux servers"), &AtomicBool::new(false))
        .await
        .unwrap();

    assert_eq!(report.hosts_seen, 1);
    assert_eq!(report.matched, 1);
}

#[tokio::test]
async fn reconcile_caps_unmatched_sample() {
    let settings = IpamSettings {
        unmatched_sample_size: 2,
        ..IpamSettings::default()
    };
    let (_db, _servers, reconciler) = setup(settings);
    let hosts = (1..=5)
        .map(|i| host(&format!("far{}", i), &format!("192.0.2.{}", i), "", &[]))
        .collect();

    let report = reconciler
        .run(&StaticHostSource::new(hosts), 1, None, &AtomicBool::new(false))
        .await
        .unwrap();

    assert_eq!(report.unmatched, 5);
    assert_eq!(report.unmatched_sample.len(), 2);
    assert_eq!(report.unmatched_sample[0].host, "far1");
}

#[tokio::test]
async fn reconcile_stops_when_cancelled() {
    let (_db, _servers, reconciler) = setup(IpamSettings::default());
    let source = StaticHostSource::new(vec![host("web01", "10.0.0.5", "", &[])]);

    let report = reconciler
        .run(&source, 1, None, &AtomicBool::new(true))
        .await
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.matched, 0);
    assert_eq!(report.hosts_seen, 1);
}

#[tokio::test]
async fn inventory_failure_fails_only_the_pass() {
    let (_db, _servers, reconciler) = setup(IpamSettings::default());

    let err = reconciler
        .run(&FailingSource, 1, None, &AtomicBool::new(false))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExternalFailure);

    // The reconciler is still usable afterwards.
    let source = StaticHostSource::new(vec![host("web01", "10.0.0.5", "", &[])]);
    let report = reconciler
        .run(&source, 1, None, &AtomicBool::new(false))
        .await
        .unwrap();
    assert_eq!(report.matched, 1);
}

#[tokio::test]
async fn inventory_timeout_is_external_failure() {
    let settings = IpamSettings {
        inventory_timeout_ms: 50,
        ..IpamSettings::default()
    };
    let (_db, _servers, reconciler) = setup(settings);

    let err = reconciler
        .run(&SlowSource, 1, None, &AtomicBool::new(false))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExternalFailure);
    assert!(err.to_string().contains("timed out"));
}

fn dns_only_hosts() -> StaticHostSource {
    StaticHostSource::new(vec![
        host("fast", "", "fast.corp.example", &[]),
        host("slow", "", "slow.corp.example", &[]),
    ])
}

#[tokio::test]
async fn pass_deadline_stops_early_and_keeps_resolved_names() {
    let settings = IpamSettings {
        reconcile_timeout_ms: 150,
        dns_timeout_ms: 5_000,
        ..IpamSettings::default()
    };
    let db = Database::in_memory().unwrap();
    create_subnet(&SubnetRegistry::new(db.clone(), settings.clone()), "servers", "10.0.0.0/24");
    let reconciler = Reconciler::new(db, settings).with_resolver(Arc::new(SlowResolver {
        delay: Duration::from_millis(600),
        raise_on_call: None,
    }));

    let report = reconciler
        .run(&dns_only_hosts(), 1, None, &AtomicBool::new(false))
        .await
        .expect("a timed-out pass still reports");

    assert!(report.timed_out);
    assert!(!report.cancelled);
    assert_eq!(report.hosts_seen, 2);
    assert_eq!(report.dns_resolved, 1);
}

#[tokio::test]
async fn cancel_during_dns_fallback_returns_promptly() {
    let settings = IpamSettings {
        reconcile_timeout_ms: 60_000,
        dns_timeout_ms: 5_000,
        ..IpamSettings::default()
    };
    let db = Database::in_memory().unwrap();
    create_subnet(&SubnetRegistry::new(db.clone(), settings.clone()), "servers", "10.0.0.0/24");
    let cancel = Arc::new(AtomicBool::new(false));
    let reconciler = Reconciler::new(db, settings).with_resolver(Arc::new(SlowResolver {
        delay: Duration::from_millis(1_500),
        raise_on_call: Some(Arc::clone(&cancel)),
    }));

    let started = Instant::now();
    let report = reconciler
        .run(&dns_only_hosts(), 1, None, &cancel)
        .await
        .expect("a cancelled pass still reports");

    assert!(report.cancelled);
    assert_eq!(report.matched, 0);
    assert!(started.elapsed() < Duration::from_millis(1_000));
}
