//! The database-backed match controller: resolves a lookup key (source IP
//! or ASN), consults an optional TTL cache, and falls through to the
//! configured [`DataSource`] on a miss.

use std::sync::Arc;

use async_trait::async_trait;
use extauth_core::context::RequestContext;
use extauth_core::error::{HealthError, MatchError};
use extauth_core::report::AnalysisReports;
use extauth_core::verdict::MatchVerdict;
use extauth_core::MatchController;
use extauth_metrics::Instrumentation;

use crate::cache::TtlCache;
use crate::source::DataSource;

const ASN_ANALYSIS_KIND: &str = "maxmind-asn";

/// Which attribute of the request this controller looks up in the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKind {
    Ip,
    Asn,
}

impl LookupKind {
    fn kind_str(self) -> &'static str {
        match self {
            LookupKind::Ip => "ip-match-db",
            LookupKind::Asn => "asn-match-db",
        }
    }
}

pub struct DbMatchController {
    name: String,
    lookup_kind: LookupKind,
    source: Arc<dyn DataSource>,
    cache: Option<TtlCache<String, bool>>,
    matches_on_failure: bool,
    instrumentation: Arc<dyn Instrumentation>,
}

impl DbMatchController {
    pub fn new(
        name: impl Into<String>,
        lookup_kind: LookupKind,
        source: Arc<dyn DataSource>,
        cache: Option<TtlCache<String, bool>>,
        matches_on_failure: bool,
        instrumentation: Arc<dyn Instrumentation>,
    ) -> Self {
        Self {
            name: name.into(),
            lookup_kind,
            source,
            cache,
            matches_on_failure,
            instrumentation,
        }
    }

    fn resolve_key(&self, ctx: &RequestContext, reports: &AnalysisReports) -> Result<String, MatchVerdict> {
        match self.lookup_kind {
            LookupKind::Ip => ctx.ip_address().map(|ip| ip.to_string()).ok_or_else(|| {
                MatchVerdict::new(&self.name, self.lookup_kind.kind_str(), self.matches_on_failure)
                    .with_description("unable to determine source IP address")
            }),
            LookupKind::Asn => reports
                .find_by_kind(ASN_ANALYSIS_KIND)
                .and_then(|r| r.data.as_ref())
                .and_then(|d| d.as_asn())
                .map(|(number, _org)| number.to_string())
                .ok_or_else(|| {
                    MatchVerdict::new(&self.name, self.lookup_kind.kind_str(), self.matches_on_failure)
                        .with_description("no ASN information available")
                }),
        }
    }

    fn cache_name(&self) -> String {
        format!("{}-db", self.name)
    }
}

#[async_trait]
impl MatchController for DbMatchController {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        self.lookup_kind.kind_str()
    }

    async fn r#match(
        &self,
        ctx: &RequestContext,
        reports: &AnalysisReports,
    ) -> Result<MatchVerdict, MatchError> {
        let key = match self.resolve_key(ctx, reports) {
            Ok(key) => key,
            Err(verdict) => return Ok(verdict),
        };

        if let Some(cache) = &self.cache {
            if let Some(matched) = cache.get(&key) {
                self.instrumentation.record_cache_hit(&self.cache_name());
                self.instrumentation.record_database_lookup(&self.name, matched, true);
                let description = describe(&key, matched, self.source.backend_name());
                return Ok(MatchVerdict::new(&self.name, self.kind(), matched).with_description(description));
            }
            self.instrumentation.record_cache_miss(&self.cache_name());
        }

        match self.source.contains(&key).await {
            Ok(matched) => {
                if let Some(cache) = &self.cache {
                    cache.insert(key.clone(), matched);
                    self.instrumentation.record_cache_size(&self.cache_name(), cache.len());
                }
                self.instrumentation.record_database_lookup(&self.name, matched, true);
                let description = describe(&key, matched, self.source.backend_name());
                Ok(MatchVerdict::new(&self.name, self.kind(), matched).with_description(description))
            }
            Err(err) => {
                self.instrumentation.record_database_unavailable(&self.name);
                self.instrumentation
                    .record_database_lookup(&self.name, self.matches_on_failure, false);
                tracing::warn!(controller = %self.name, error = %err, "database backend unavailable");
                Ok(MatchVerdict::new(&self.name, self.kind(), self.matches_on_failure)
                    .with_description(format!("database unavailable: {err}")))
            }
        }
    }

    async fn health_check(&self) -> Result<(), HealthError> {
        self.source.health_check().await.map_err(|err| HealthError::Unhealthy {
            controller: self.name.clone(),
            kind: self.kind().to_string(),
            reason: err.to_string(),
        })
    }
}

fn describe(key: &str, matched: bool, backend: &str) -> String {
    if matched {
        format!("{key} found in '{backend}'")
    } else {
        format!("{key} not found in '{backend}'")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use extauth_core::context::{Headers, RawCheckRequest};
    use extauth_metrics::NoopInstrumentation;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeSource {
        contains_calls: AtomicUsize,
        answer: Result<bool, ()>,
    }

    #[async_trait]
    impl DataSource for FakeSource {
        async fn contains(&self, _key: &str) -> Result<bool, crate::source::SourceError> {
            self.contains_calls.fetch_add(1, Ordering::SeqCst);
            self.answer
                .map_err(|_| crate::source::SourceError::Query("boom".to_string()))
        }
        async fn close(&self) -> Result<(), crate::source::SourceError> {
            Ok(())
        }
        async fn health_check(&self) -> Result<(), crate::source::SourceError> {
            Ok(())
        }
        fn backend_name(&self) -> &str {
            "fake"
        }
    }

    fn ctx_with_ip(ip: &str) -> RequestContext {
        RequestContext::new(RawCheckRequest {
            headers: Headers::new(),
            authority: Some("example.com".into()),
            transport_source_address: Some(ip.to_string()),
        })
    }

    #[tokio::test]
    async fn cache_hit_skips_the_backend() {
        let source = Arc::new(FakeSource { contains_calls: AtomicUsize::new(0), answer: Ok(true) });
        let cache = TtlCache::new(std::time::Duration::from_secs(60));
        let controller = DbMatchController::new(
            "blocklist-db",
            LookupKind::Ip,
            source.clone(),
            Some(cache),
            false,
            Arc::new(NoopInstrumentation),
        );
        let reports = AnalysisReports::new();
        let ctx = ctx_with_ip("203.0.113.5");

        let first = controller.r#match(&ctx, &reports).await.unwrap();
        assert!(first.is_match);
        let second = controller.r#match(&ctx, &reports).await.unwrap();
        assert!(second.is_match);
        assert_eq!(source.contains_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn backend_failure_uses_matches_on_failure() {
        let source = Arc::new(FakeSource { contains_calls: AtomicUsize::new(0), answer: Err(()) });
        let controller = DbMatchController::new(
            "blocklist-db",
            LookupKind::Ip,
            source,
            None,
            true,
            Arc::new(NoopInstrumentation),
        );
        let verdict = controller
            .r#match(&ctx_with_ip("203.0.113.5"), &AnalysisReports::new())
            .await
            .unwrap();
        assert!(verdict.is_match);
        assert!(verdict.description.starts_with("database unavailable"));
    }

    #[tokio::test]
    async fn invalid_ip_short_circuits_before_the_backend() {
        let source = Arc::new(FakeSource { contains_calls: AtomicUsize::new(0), answer: Ok(true) });
        let controller = DbMatchController::new(
            "blocklist-db",
            LookupKind::Ip,
            source.clone(),
            None,
            false,
            Arc::new(NoopInstrumentation),
        );
        let ctx = RequestContext::new(RawCheckRequest {
            headers: Headers::new(),
            authority: None,
            transport_source_address: Some("garbage".into()),
        });
        let verdict = controller.r#match(&ctx, &AnalysisReports::new()).await.unwrap();
        assert!(!verdict.is_match);
        assert_eq!(source.contains_calls.load(Ordering::SeqCst), 0);
    }
}
