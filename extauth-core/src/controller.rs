//! The two controller contracts every pluggable unit of work implements.

use async_trait::async_trait;

use crate::context::RequestContext;
use crate::error::{AnalysisError, HealthError, MatchError};
use crate::report::{AnalysisReport, AnalysisReports};
use crate::verdict::MatchVerdict;

/// Enriches a request with data derived from it. Never denies — a
/// controller that cannot enrich a request simply returns `Ok(None)` or a
/// caught [`AnalysisError`], and the overall check proceeds without it.
#[async_trait]
pub trait AnalysisController: Send + Sync {
    /// The name this instance was configured under (unique within a
    /// registry, used to key reports and log fields).
    fn name(&self) -> &str;

    /// The factory kind this instance was built from (e.g. `maxmind-asn`).
    fn kind(&self) -> &str;

    async fn analyze(&self, ctx: &RequestContext) -> Result<Option<AnalysisReport>, AnalysisError>;

    async fn health_check(&self) -> Result<(), HealthError>;
}

/// Produces a boolean verdict from a request and the analysis reports
/// gathered before it ran. Match controllers never enrich; their sole
/// output is a [`MatchVerdict`] consumed by the policy engine.
#[async_trait]
pub trait MatchController: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> &str;

    async fn r#match(
        &self,
        ctx: &RequestContext,
        reports: &AnalysisReports,
    ) -> Result<MatchVerdict, MatchError>;

    async fn health_check(&self) -> Result<(), HealthError>;
}
