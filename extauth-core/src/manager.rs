//! The request-evaluation pipeline: [`Manager::check`] and its outcome type.

use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinSet;

use extauth_metrics::{Instrumentation, Phase as MetricsPhase};

use crate::context::{RawCheckRequest, RequestContext};
use crate::controller::{AnalysisController, MatchController};
use crate::header::OrderedHeaders;
use crate::policy::Policy;
use crate::report::AnalysisReports;
use crate::verdict::{DenyCode, MatchVerdicts};

/// The result of evaluating one CheckRequest. Never a `Result` — every
/// failure mode a controller can hit is caught and folded into ALLOW/DENY
/// before it reaches this type.
#[derive(Debug, Clone)]
pub enum CheckOutcome {
    Allow {
        upstream_headers: Vec<(String, String)>,
    },
    Deny {
        http_status: u16,
        downstream_headers: Vec<(String, String)>,
        reason: String,
    },
}

pub struct Manager {
    analysis_controllers: Vec<Arc<dyn AnalysisController>>,
    match_controllers: Vec<Arc<dyn MatchController>>,
    policy: Policy,
    /// When set, a policy-denied request is still allowed through, after
    /// logging the denial at warn level with full culprit details. An
    /// operator escape hatch for rolling out a new policy without an
    /// outage if it turns out to be wrong.
    policy_bypass: bool,
    instrumentation: Arc<dyn Instrumentation>,
}

impl Manager {
    pub fn new(
        analysis_controllers: Vec<Arc<dyn AnalysisController>>,
        match_controllers: Vec<Arc<dyn MatchController>>,
        policy: Policy,
        instrumentation: Arc<dyn Instrumentation>,
    ) -> Self {
        Self {
            analysis_controllers,
            match_controllers,
            policy,
            policy_bypass: false,
            instrumentation,
        }
    }

    pub fn with_policy_bypass(mut self, bypass: bool) -> Self {
        self.policy_bypass = bypass;
        self
    }

    /// Run the full pipeline for one incoming request: analyze, match,
    /// evaluate the policy, and synthesize a response. Individual
    /// controller failures are caught and logged; they never abort the
    /// request, only drop that controller's contribution.
    pub async fn check(&self, raw: RawCheckRequest) -> CheckOutcome {
        self.instrumentation.inc_in_flight();
        let outcome = self.check_inner(raw).await;
        self.instrumentation.dec_in_flight();
        outcome
    }

    async fn check_inner(&self, raw: RawCheckRequest) -> CheckOutcome {
        let request_started = Instant::now();
        let ctx = RequestContext::new(raw);
        let span = tracing::info_span!("check", authority = %ctx.authority());
        let _enter = span.enter();

        let reports = self.run_analysis_phase(&ctx).await;
        let verdicts = self.run_match_phase(&ctx, &reports).await;

        let started = Instant::now();
        let (mut allowed, culprit) = self.policy.evaluate(&verdicts.as_bool_map());
        self.instrumentation
            .record_phase_duration(MetricsPhase::Policy, started.elapsed());

        if !allowed && self.policy_bypass {
            tracing::warn!(
                authority = %ctx.authority(),
                culprit = %culprit,
                description = verdicts.get(&culprit).map(|v| v.description.as_str()).unwrap_or_default(),
                "policy denied request but authorizationPolicyBypass is enabled; allowing through"
            );
            allowed = true;
        }

        self.instrumentation
            .record_decision(ctx.authority(), allowed, request_started.elapsed());

        if allowed {
            self.synthesize_allow(&reports, &verdicts)
        } else {
            self.synthesize_deny(&verdicts, &culprit)
        }
    }

    async fn run_analysis_phase(&self, ctx: &RequestContext) -> AnalysisReports {
        let started = Instant::now();
        let mut reports = AnalysisReports::new();
        let mut join_set: JoinSet<(String, _)> = JoinSet::new();

        for controller in &self.analysis_controllers {
            let controller = Arc::clone(controller);
            let ctx = ctx.clone();
            join_set.spawn(async move {
                let name = controller.name().to_string();
                let result = controller.analyze(&ctx).await;
                (name, result)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((name, Ok(Some(report)))) => reports.insert(report),
                Ok((name, Ok(None))) => {
                    tracing::debug!(controller = %name, "analysis controller produced no report");
                }
                Ok((name, Err(err))) => {
                    tracing::warn!(controller = %name, error = %err, "analysis controller failed");
                }
                Err(join_err) => {
                    tracing::error!(error = %join_err, "analysis controller task panicked");
                }
            }
        }

        self.instrumentation
            .record_phase_duration(MetricsPhase::Analysis, started.elapsed());
        reports
    }

    async fn run_match_phase(&self, ctx: &RequestContext, reports: &AnalysisReports) -> MatchVerdicts {
        let started = Instant::now();
        let mut verdicts = MatchVerdicts::new();
        let mut join_set: JoinSet<(String, String, _)> = JoinSet::new();

        for controller in &self.match_controllers {
            let controller = Arc::clone(controller);
            let ctx = ctx.clone();
            let reports = reports.clone();
            join_set.spawn(async move {
                let name = controller.name().to_string();
                let kind = controller.kind().to_string();
                let result = controller.r#match(&ctx, &reports).await;
                (name, kind, result)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((name, _kind, Ok(verdict))) => verdicts.insert(verdict),
                Ok((name, kind, Err(err))) => {
                    tracing::warn!(controller = %name, error = %err, "match controller failed, treating as non-match");
                    verdicts.insert(
                        crate::verdict::MatchVerdict::new(&name, &kind, false)
                            .with_description(format!("controller error: {err}")),
                    );
                }
                Err(join_err) => {
                    tracing::error!(error = %join_err, "match controller task panicked");
                }
            }
        }

        self.instrumentation
            .record_phase_duration(MetricsPhase::Match, started.elapsed());
        verdicts
    }

    fn synthesize_allow(&self, reports: &AnalysisReports, verdicts: &MatchVerdicts) -> CheckOutcome {
        let mut headers = OrderedHeaders::new();
        for report in reports.iter_sorted_by_name() {
            headers.extend_sorted(report.upstream_headers.iter());
        }
        for verdict in verdicts.iter_sorted_by_name() {
            headers.extend_sorted(verdict.allow_upstream_headers.iter());
        }
        CheckOutcome::Allow {
            upstream_headers: headers.into_vec(),
        }
    }

    fn synthesize_deny(&self, verdicts: &MatchVerdicts, culprit: &str) -> CheckOutcome {
        let Some(verdict) = verdicts.get(culprit) else {
            // Policy referenced a controller whose task panicked entirely
            // (no verdict was ever inserted). Deny closed rather than open.
            return CheckOutcome::Deny {
                http_status: DenyCode::PermissionDenied.http_status(),
                downstream_headers: Vec::new(),
                reason: format!("controller {culprit:?} produced no verdict"),
            };
        };
        let mut headers = OrderedHeaders::new();
        headers.extend_sorted(verdict.deny_downstream_headers.iter());
        CheckOutcome::Deny {
            http_status: verdict.deny_code.http_status(),
            downstream_headers: headers.into_vec(),
            reason: verdict.description.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use extauth_metrics::NoopInstrumentation;

    use super::*;
    use crate::context::Headers;
    use crate::error::{AnalysisError, HealthError, MatchError};
    use crate::report::{AnalysisData, AnalysisReport};
    use crate::verdict::MatchVerdict;

    struct StaticAnalysis {
        name: &'static str,
    }

    #[async_trait]
    impl AnalysisController for StaticAnalysis {
        fn name(&self) -> &str {
            self.name
        }
        fn kind(&self) -> &str {
            "static"
        }
        async fn analyze(&self, _ctx: &RequestContext) -> Result<Option<AnalysisReport>, AnalysisError> {
            Ok(Some(
                AnalysisReport::new(self.name, "static")
                    .with_data(AnalysisData::Asn { number: 64512, organization: "test".into() })
                    .with_header("x-asn", "64512"),
            ))
        }
        async fn health_check(&self) -> Result<(), HealthError> {
            Ok(())
        }
    }

    struct StaticMatch {
        name: &'static str,
        is_match: bool,
    }

    #[async_trait]
    impl MatchController for StaticMatch {
        fn name(&self) -> &str {
            self.name
        }
        fn kind(&self) -> &str {
            "static"
        }
        async fn r#match(
            &self,
            _ctx: &RequestContext,
            _reports: &AnalysisReports,
        ) -> Result<MatchVerdict, MatchError> {
            Ok(MatchVerdict::new(self.name, "static", self.is_match)
                .with_description("static verdict")
                .with_deny_header("x-denied-by", self.name))
        }
        async fn health_check(&self) -> Result<(), HealthError> {
            Ok(())
        }
    }

    fn raw_request() -> RawCheckRequest {
        RawCheckRequest {
            headers: Headers::new(),
            authority: Some("example.com".into()),
            transport_source_address: Some("203.0.113.5".into()),
        }
    }

    #[tokio::test]
    async fn allow_all_policy_merges_analysis_headers() {
        let manager = Manager::new(
            vec![Arc::new(StaticAnalysis { name: "asn" })],
            vec![],
            Policy::allow_all(),
            Arc::new(NoopInstrumentation),
        );
        let outcome = manager.check(raw_request()).await;
        match outcome {
            CheckOutcome::Allow { upstream_headers } => {
                assert_eq!(upstream_headers, vec![("x-asn".to_string(), "64512".to_string())]);
            }
            CheckOutcome::Deny { .. } => panic!("expected allow"),
        }
    }

    #[tokio::test]
    async fn deny_list_match_denies_with_its_headers() {
        let mut known = std::collections::HashSet::new();
        known.insert("blocklist".to_string());
        let policy = Policy::compile("!blocklist", &known).unwrap();
        let manager = Manager::new(
            vec![],
            vec![Arc::new(StaticMatch { name: "blocklist", is_match: true })],
            policy,
            Arc::new(NoopInstrumentation),
        );
        let outcome = manager.check(raw_request()).await;
        match outcome {
            CheckOutcome::Deny { http_status, downstream_headers, .. } => {
                assert_eq!(http_status, 403);
                assert_eq!(downstream_headers, vec![("x-denied-by".to_string(), "blocklist".to_string())]);
            }
            CheckOutcome::Allow { .. } => panic!("expected deny"),
        }
    }

    #[tokio::test]
    async fn allow_list_match_allows_through() {
        let mut known = std::collections::HashSet::new();
        known.insert("allowlist".to_string());
        let policy = Policy::compile("allowlist", &known).unwrap();
        let manager = Manager::new(
            vec![],
            vec![Arc::new(StaticMatch { name: "allowlist", is_match: true })],
            policy,
            Arc::new(NoopInstrumentation),
        );
        let outcome = manager.check(raw_request()).await;
        assert!(matches!(outcome, CheckOutcome::Allow { .. }));
    }
}
