//! Instrumentation contract for the evaluation pipeline, and a
//! `prometheus`-backed implementation.
//!
//! The pipeline in `extauth-core` depends only on the [`Instrumentation`]
//! trait, never on `prometheus` directly, so a different backend can be
//! substituted without touching the request manager.

use std::sync::OnceLock;
use std::time::Duration;

use prometheus::{
    exponential_buckets, histogram_opts, opts, Encoder, HistogramVec, IntCounterVec, IntGauge,
    IntGaugeVec, Registry, TextEncoder,
};

/// The phases an in-flight check moves through, for per-phase timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Analysis,
    Match,
    Policy,
}

impl Phase {
    fn label(self) -> &'static str {
        match self {
            Phase::Analysis => "analysis",
            Phase::Match => "match",
            Phase::Policy => "policy",
        }
    }
}

/// Observability hooks the request manager calls at well-defined points.
/// None of these can fail or block meaningfully — a metrics backend that
/// can't record an observation should drop it, not slow down a request.
pub trait Instrumentation: Send + Sync {
    fn record_phase_duration(&self, phase: Phase, duration: Duration);
    fn inc_in_flight(&self);
    fn dec_in_flight(&self);
    /// Record a completed CheckRequest: whether it was allowed and how long
    /// the full pipeline took, labeled only by `{authority, decision}` —
    /// richer labels (e.g. the denying culprit) are deliberately not added.
    fn record_decision(&self, authority: &str, allowed: bool, duration: Duration);
    fn record_cache_hit(&self, cache: &str);
    fn record_cache_miss(&self, cache: &str);
    fn record_cache_size(&self, cache: &str, size: usize);
    fn record_database_unavailable(&self, controller: &str);
    fn record_database_lookup(&self, controller: &str, matched: bool, success: bool);
}

/// An [`Instrumentation`] that drops every observation. Used in tests and
/// anywhere metrics infrastructure isn't worth wiring up.
pub struct NoopInstrumentation;

impl Instrumentation for NoopInstrumentation {
    fn record_phase_duration(&self, _phase: Phase, _duration: Duration) {}
    fn inc_in_flight(&self) {}
    fn dec_in_flight(&self) {}
    fn record_decision(&self, _authority: &str, _allowed: bool, _duration: Duration) {}
    fn record_cache_hit(&self, _cache: &str) {}
    fn record_cache_miss(&self, _cache: &str) {}
    fn record_cache_size(&self, _cache: &str, _size: usize) {}
    fn record_database_unavailable(&self, _controller: &str) {}
    fn record_database_lookup(&self, _controller: &str, _matched: bool, _success: bool) {}
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

struct Metrics {
    registry: Registry,
    phase_duration_seconds: HistogramVec,
    request_duration_seconds: HistogramVec,
    requests_in_flight: IntGauge,
    decisions_total: IntCounterVec,
    cache_events_total: IntCounterVec,
    cache_size: IntGaugeVec,
    database_unavailable_total: IntCounterVec,
    database_lookups_total: IntCounterVec,
}

impl Metrics {
    fn new(namespace: Option<&str>) -> Self {
        let registry = Registry::new();
        let prefix = namespace.map(|s| format!("{s}_")).unwrap_or_default();

        let phase_duration_seconds = HistogramVec::new(
            histogram_opts!(
                format!("{prefix}extauth_phase_duration_seconds"),
                "Duration of a pipeline phase in seconds",
                exponential_buckets(0.0005, 2.0, 16).unwrap()
            ),
            &["phase"],
        )
        .expect("metric can be created");

        let request_duration_seconds = HistogramVec::new(
            histogram_opts!(
                format!("{prefix}extauth_request_duration_seconds"),
                "Duration of a full CheckRequest evaluation in seconds",
                exponential_buckets(0.0005, 2.0, 16).unwrap()
            ),
            &["authority", "decision"],
        )
        .expect("metric can be created");

        let requests_in_flight = IntGauge::new(
            format!("{prefix}extauth_requests_in_flight"),
            "Number of CheckRequests currently being evaluated",
        )
        .expect("metric can be created");

        let decisions_total = IntCounterVec::new(
            opts!(
                format!("{prefix}extauth_decisions_total"),
                "Total number of ALLOW/DENY decisions, labeled by authority and decision"
            ),
            &["authority", "decision"],
        )
        .expect("metric can be created");

        let cache_events_total = IntCounterVec::new(
            opts!(
                format!("{prefix}extauth_cache_events_total"),
                "Cache hit/miss events, labeled by cache name and event kind"
            ),
            &["cache", "event"],
        )
        .expect("metric can be created");

        let cache_size = IntGaugeVec::new(
            opts!(
                format!("{prefix}extauth_cache_size"),
                "Number of entries currently held in a match controller's cache"
            ),
            &["cache"],
        )
        .expect("metric can be created");

        let database_unavailable_total = IntCounterVec::new(
            opts!(
                format!("{prefix}extauth_database_unavailable_total"),
                "Number of times a database-backed match controller observed its backend unavailable"
            ),
            &["controller"],
        )
        .expect("metric can be created");

        let database_lookups_total = IntCounterVec::new(
            opts!(
                format!("{prefix}extauth_database_lookups_total"),
                "Database-backed match lookups, labeled by controller, match outcome, and success"
            ),
            &["controller", "matched", "success"],
        )
        .expect("metric can be created");

        registry
            .register(Box::new(phase_duration_seconds.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(request_duration_seconds.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(requests_in_flight.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(decisions_total.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(cache_events_total.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(cache_size.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(database_unavailable_total.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(database_lookups_total.clone()))
            .expect("metric can be registered");

        Self {
            registry,
            phase_duration_seconds,
            request_duration_seconds,
            requests_in_flight,
            decisions_total,
            cache_events_total,
            cache_size,
            database_unavailable_total,
            database_lookups_total,
        }
    }
}

/// Prometheus-backed [`Instrumentation`]. Only one instance's worth of
/// metrics exists process-wide; construct it once at startup.
pub struct PrometheusInstrumentation;

impl PrometheusInstrumentation {
    /// Initialize the global metrics registry. Calling this more than once
    /// is harmless; the first call wins.
    pub fn init(namespace: Option<&str>) -> Self {
        METRICS.get_or_init(|| Metrics::new(namespace));
        Self
    }

    fn metrics(&self) -> &'static Metrics {
        METRICS.get().expect("PrometheusInstrumentation::init was not called")
    }

    /// Render the registered metrics in Prometheus text exposition format,
    /// for the `/metrics` HTTP handler.
    pub fn encode(&self) -> String {
        let encoder = TextEncoder::new();
        let families = self.metrics().registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&families, &mut buffer)
            .expect("prometheus text encoding cannot fail for well-formed metric families");
        String::from_utf8(buffer).expect("prometheus TextEncoder always emits valid UTF-8")
    }
}

impl Instrumentation for PrometheusInstrumentation {
    fn record_phase_duration(&self, phase: Phase, duration: Duration) {
        self.metrics()
            .phase_duration_seconds
            .with_label_values(&[phase.label()])
            .observe(duration.as_secs_f64());
    }

    fn inc_in_flight(&self) {
        self.metrics().requests_in_flight.inc();
    }

    fn dec_in_flight(&self) {
        self.metrics().requests_in_flight.dec();
    }

    fn record_decision(&self, authority: &str, allowed: bool, duration: Duration) {
        let decision = if allowed { "allow" } else { "deny" };
        self.metrics()
            .decisions_total
            .with_label_values(&[authority, decision])
            .inc();
        self.metrics()
            .request_duration_seconds
            .with_label_values(&[authority, decision])
            .observe(duration.as_secs_f64());
    }

    fn record_cache_hit(&self, cache: &str) {
        self.metrics()
            .cache_events_total
            .with_label_values(&[cache, "hit"])
            .inc();
    }

    fn record_cache_miss(&self, cache: &str) {
        self.metrics()
            .cache_events_total
            .with_label_values(&[cache, "miss"])
            .inc();
    }

    fn record_cache_size(&self, cache: &str, size: usize) {
        self.metrics()
            .cache_size
            .with_label_values(&[cache])
            .set(size as i64);
    }

    fn record_database_unavailable(&self, controller: &str) {
        self.metrics()
            .database_unavailable_total
            .with_label_values(&[controller])
            .inc();
    }

    fn record_database_lookup(&self, controller: &str, matched: bool, success: bool) {
        self.metrics()
            .database_lookups_total
            .with_label_values(&[controller, bool_label(matched), bool_label(success)])
            .inc();
    }
}

fn bool_label(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}
