//! End-to-end scenarios driving [`Manager::check`] with real production
//! controllers from the sibling matcher/analysis crates, not synthetic
//! stubs. One test per scenario, mirroring the documented request/response
//! shapes.

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use extauth_analysis::asn::AsnAnalysisController;
use extauth_analysis::reader::AsnReader;
use extauth_core::context::{Headers, RawCheckRequest};
use extauth_core::manager::CheckOutcome;
use extauth_core::policy::Policy;
use extauth_core::{AnalysisController, Manager, MatchController};
use extauth_matchers_db::controller::{DbMatchController, LookupKind};
use extauth_matchers_db::source::{DataSource, SourceError};
use extauth_matchers_list::list::{parse_asn_list, parse_ip_list};
use extauth_matchers_list::{AsnMatchController, IpMatchController};
use extauth_metrics::NoopInstrumentation;

fn request(ip: &str) -> RawCheckRequest {
    RawCheckRequest {
        headers: Headers::new(),
        authority: Some("example.com".into()),
        transport_source_address: Some(ip.to_string()),
    }
}

fn policy(expr: &str, known: &[&str]) -> Policy {
    let known: HashSet<String> = known.iter().map(|s| s.to_string()).collect();
    Policy::compile(expr, &known).unwrap()
}

/// A `DataSource` that always fails, for exercising the fail-open path
/// without a live Postgres/Redis.
struct FailingSource {
    calls: AtomicUsize,
}

#[async_trait]
impl DataSource for FailingSource {
    async fn contains(&self, _key: &str) -> Result<bool, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(SourceError::Connection("unreachable in test".to_string()))
    }
    async fn close(&self) -> Result<(), SourceError> {
        Ok(())
    }
    async fn health_check(&self) -> Result<(), SourceError> {
        Err(SourceError::Connection("unreachable in test".to_string()))
    }
    fn backend_name(&self) -> &str {
        "fake-failing"
    }
}

/// An in-memory `AsnReader` for the ASN-propagation scenario.
struct StaticAsnReader(HashMap<IpAddr, (u32, String)>);

impl AsnReader for StaticAsnReader {
    fn lookup(&self, ip: IpAddr) -> Option<(u32, String)> {
        self.0.get(&ip).cloned()
    }
}

/// Scenario 1: allow via a single IP list.
#[tokio::test]
async fn scenario_allow_via_ip_list() {
    let entries = parse_ip_list("10.0.0.0/8\n").unwrap();
    let corp = Arc::new(IpMatchController::new("corp", entries)) as Arc<dyn MatchController>;
    let manager = Manager::new(
        vec![],
        vec![corp],
        policy("corp", &["corp"]),
        Arc::new(NoopInstrumentation),
    );

    let outcome = manager.check(request("10.1.2.3")).await;
    assert!(matches!(outcome, CheckOutcome::Allow { .. }));
}

/// Scenario 2: deny via a negated list, with the exact documented body.
#[tokio::test]
async fn scenario_deny_via_negated_list() {
    let entries = parse_ip_list("203.0.113.0/24\n").unwrap();
    let bad = Arc::new(IpMatchController::new("bad", entries)) as Arc<dyn MatchController>;
    let manager = Manager::new(
        vec![],
        vec![bad],
        policy("!bad", &["bad"]),
        Arc::new(NoopInstrumentation),
    );

    let outcome = manager.check(request("203.0.113.5")).await;
    match outcome {
        CheckOutcome::Deny { http_status, reason, .. } => {
            assert_eq!(http_status, 403);
            assert_eq!(reason, "IP 203.0.113.5 matched CIDR 203.0.113.0/24");
        }
        CheckOutcome::Allow { .. } => panic!("expected deny"),
    }
}

/// Scenario 3: a database-backed deny list fails open when its backend is
/// unavailable, and the failure is recorded on the instrumentation seam.
#[tokio::test]
async fn scenario_database_fails_open() {
    struct RecordingInstrumentation {
        unavailable: AtomicUsize,
        lookups: std::sync::Mutex<Vec<(String, bool, bool)>>,
    }

    impl extauth_metrics::Instrumentation for RecordingInstrumentation {
        fn record_phase_duration(&self, _phase: extauth_metrics::Phase, _duration: std::time::Duration) {}
        fn inc_in_flight(&self) {}
        fn dec_in_flight(&self) {}
        fn record_decision(&self, _authority: &str, _allowed: bool, _duration: std::time::Duration) {}
        fn record_cache_hit(&self, _cache: &str) {}
        fn record_cache_miss(&self, _cache: &str) {}
        fn record_cache_size(&self, _cache: &str, _size: usize) {}
        fn record_database_unavailable(&self, _controller: &str) {
            self.unavailable.fetch_add(1, Ordering::SeqCst);
        }
        fn record_database_lookup(&self, controller: &str, matched: bool, success: bool) {
            self.lookups.lock().unwrap().push((controller.to_string(), matched, success));
        }
    }

    let instrumentation = Arc::new(RecordingInstrumentation {
        unavailable: AtomicUsize::new(0),
        lookups: std::sync::Mutex::new(Vec::new()),
    });
    let source = Arc::new(FailingSource { calls: AtomicUsize::new(0) });
    let scraper = Arc::new(DbMatchController::new(
        "scraper",
        LookupKind::Ip,
        source,
        None,
        false,
        instrumentation.clone(),
    )) as Arc<dyn MatchController>;
    let manager = Manager::new(
        vec![],
        vec![scraper],
        policy("!scraper", &["scraper"]),
        instrumentation.clone(),
    );

    let outcome = manager.check(request("198.51.100.7")).await;
    assert!(matches!(outcome, CheckOutcome::Allow { .. }));
    assert_eq!(instrumentation.unavailable.load(Ordering::SeqCst), 1);
    assert_eq!(
        instrumentation.lookups.lock().unwrap().as_slice(),
        &[("scraper".to_string(), false, false)]
    );
}

/// Scenario 4: combined allow-list and deny-list policy.
#[tokio::test]
async fn scenario_combined_allow_and_deny() {
    let build_manager = || {
        let corp = Arc::new(IpMatchController::new("corp", parse_ip_list("10.0.0.0/8\n").unwrap()))
            as Arc<dyn MatchController>;
        let bad = Arc::new(IpMatchController::new("bad", parse_ip_list("10.1.2.0/24\n").unwrap()))
            as Arc<dyn MatchController>;
        Manager::new(
            vec![],
            vec![corp, bad],
            policy("corp && !bad", &["corp", "bad"]),
            Arc::new(NoopInstrumentation),
        )
    };

    let allowed = build_manager().check(request("10.9.9.9")).await;
    assert!(matches!(allowed, CheckOutcome::Allow { .. }));

    let denied = build_manager().check(request("10.1.2.3")).await;
    match denied {
        CheckOutcome::Deny { http_status, .. } => assert_eq!(http_status, 403),
        CheckOutcome::Allow { .. } => panic!("expected deny for address in both corp and bad"),
    }
}

/// Scenario 5: a policy-bypass deployment still allows a request the
/// policy itself would have denied.
#[tokio::test]
async fn scenario_policy_bypass_allows_through() {
    let corp = Arc::new(IpMatchController::new("corp", parse_ip_list("10.0.0.0/8\n").unwrap()))
        as Arc<dyn MatchController>;
    let manager = Manager::new(
        vec![],
        vec![corp],
        policy("corp", &["corp"]),
        Arc::new(NoopInstrumentation),
    )
    .with_policy_bypass(true);

    // Outside 10.0.0.0/8, so `corp` evaluates false and the policy denies —
    // but the bypass flag should still let it through.
    let outcome = manager.check(request("203.0.113.9")).await;
    assert!(matches!(outcome, CheckOutcome::Allow { .. }));
}

/// Scenario 6: ASN analysis propagates upstream headers and feeds the
/// ASN match controller.
#[tokio::test]
async fn scenario_asn_propagation() {
    let mut known = HashMap::new();
    known.insert("8.8.8.8".parse().unwrap(), (15169u32, "Google LLC".to_string()));
    let reader = Arc::new(StaticAsnReader(known));
    let asn_analysis =
        Arc::new(AsnAnalysisController::new("asn", reader)) as Arc<dyn AnalysisController>;
    let cloud = Arc::new(AsnMatchController::new("cloud", parse_asn_list("AS15169\n").unwrap()))
        as Arc<dyn MatchController>;

    let manager = Manager::new(
        vec![asn_analysis],
        vec![cloud],
        policy("cloud", &["cloud"]),
        Arc::new(NoopInstrumentation),
    );

    let outcome = manager.check(request("8.8.8.8")).await;
    match outcome {
        CheckOutcome::Allow { upstream_headers } => {
            assert!(upstream_headers.contains(&("X-ASN-Number".to_string(), "15169".to_string())));
            assert!(upstream_headers.contains(&("X-ASN-Organization".to_string(), "Google LLC".to_string())));
        }
        CheckOutcome::Deny { .. } => panic!("expected allow"),
    }
}
