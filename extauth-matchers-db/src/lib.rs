//! Database-backed match controllers: `ip-match-db` and `asn-match-db`,
//! checking a source IP or ASN against an external Redis or Postgres set.

pub mod cache;
pub mod config;
pub mod controller;
pub mod source;

use std::sync::Arc;

use extauth_core::error::BuildError;
use extauth_core::registry::MatchControllerFactory;
use extauth_core::MatchController;
use extauth_metrics::{Instrumentation, NoopInstrumentation};

use crate::cache::TtlCache;
use crate::config::{DatabaseSettings, MatchDatabaseSettings};
use crate::controller::{DbMatchController, LookupKind};
use crate::source::{DataSource, PostgresSource, RedisSource};

async fn build_source(
    settings: &MatchDatabaseSettings,
    name: &str,
    kind: &str,
) -> Result<Arc<dyn DataSource>, BuildError> {
    let timeout = settings.connection_timeout();
    let source: Arc<dyn DataSource> = match &settings.database {
        DatabaseSettings::Redis(redis_settings) => Arc::new(
            RedisSource::connect(redis_settings, timeout)
                .await
                .map_err(|e| BuildError::InitFailed {
                    name: name.to_string(),
                    kind: kind.to_string(),
                    source: Box::new(e),
                })?,
        ),
        DatabaseSettings::Postgres(postgres_settings) => Arc::new(
            PostgresSource::connect(postgres_settings, timeout)
                .await
                .map_err(|e| BuildError::InitFailed {
                    name: name.to_string(),
                    kind: kind.to_string(),
                    source: Box::new(e),
                })?,
        ),
    };
    Ok(source)
}

async fn build_controller(
    name: String,
    settings: serde_json::Value,
    kind: &'static str,
    lookup_kind: LookupKind,
    instrumentation: Arc<dyn Instrumentation>,
) -> Result<Arc<dyn MatchController>, BuildError> {
    let parsed: MatchDatabaseSettings =
        serde_json::from_value(settings).map_err(|source| BuildError::InvalidSettings {
            name: name.clone(),
            kind: kind.to_string(),
            source,
        })?;

    let source = build_source(&parsed, &name, kind).await?;
    let cache = parsed.cache_ttl().map(TtlCache::new);

    Ok(Arc::new(DbMatchController::new(
        name,
        lookup_kind,
        source,
        cache,
        parsed.matches_on_failure,
        instrumentation,
    )) as Arc<dyn MatchController>)
}

/// A [`MatchControllerFactory`] for the `ip-match-db` kind: checks the
/// request's source IP against an external Redis or Postgres set.
pub fn ip_match_db_factory(instrumentation: Arc<dyn Instrumentation>) -> Arc<dyn MatchControllerFactory> {
    Arc::new(move |name: String, settings: serde_json::Value| {
        let instrumentation = instrumentation.clone();
        async move { build_controller(name, settings, "ip-match-db", LookupKind::Ip, instrumentation).await }
    })
}

/// A [`MatchControllerFactory`] for the `asn-match-db` kind: checks the
/// request's ASN (from a `maxmind-asn` analysis report) against an external
/// Redis or Postgres set.
pub fn asn_match_db_factory(instrumentation: Arc<dyn Instrumentation>) -> Arc<dyn MatchControllerFactory> {
    Arc::new(move |name: String, settings: serde_json::Value| {
        let instrumentation = instrumentation.clone();
        async move { build_controller(name, settings, "asn-match-db", LookupKind::Asn, instrumentation).await }
    })
}

/// Convenience factories using [`NoopInstrumentation`], for tests and
/// callers that don't wire metrics.
pub fn ip_match_db_factory_noop() -> Arc<dyn MatchControllerFactory> {
    ip_match_db_factory(Arc::new(NoopInstrumentation))
}

pub fn asn_match_db_factory_noop() -> Arc<dyn MatchControllerFactory> {
    asn_match_db_factory(Arc::new(NoopInstrumentation))
}
