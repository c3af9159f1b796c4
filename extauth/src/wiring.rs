//! Populates the analysis/match controller registries and builds every
//! controller declared in configuration.

use std::collections::HashSet;
use std::sync::Arc;

use extauth_core::error::BuildError;
use extauth_core::registry::{AnalysisControllerRegistry, MatchControllerRegistry};
use extauth_core::{AnalysisController, MatchController};
use extauth_metrics::Instrumentation;

pub fn analysis_registry() -> AnalysisControllerRegistry {
    let mut registry = AnalysisControllerRegistry::new();
    registry.register("maxmind-asn", extauth_analysis::maxmind_asn_factory());
    registry.register("maxmind-geoip", extauth_analysis::maxmind_geoip_factory());
    registry.register("user-agent", extauth_analysis::user_agent_factory());
    registry
}

pub fn match_registry(instrumentation: Arc<dyn Instrumentation>) -> MatchControllerRegistry {
    let mut registry = MatchControllerRegistry::new();
    registry.register("ip-match", extauth_matchers_list::ip_match_factory());
    registry.register("asn-match", extauth_matchers_list::asn_match_factory());
    registry.register("ip-match-db", extauth_matchers_db::ip_match_db_factory(instrumentation.clone()));
    registry.register("asn-match-db", extauth_matchers_db::asn_match_db_factory(instrumentation));
    registry.register("geofence", extauth_geofence::geofence_factory());
    registry
}

pub struct BuiltControllers {
    pub analysis: Vec<Arc<dyn AnalysisController>>,
    pub matchers: Vec<Arc<dyn MatchController>>,
    pub match_names: HashSet<String>,
}

pub async fn build_controllers(
    config: &extauth_config::Config,
    instrumentation: Arc<dyn Instrumentation>,
) -> Result<BuiltControllers, BuildError> {
    let analysis_registry = analysis_registry();
    let match_registry = match_registry(instrumentation);

    let analysis = analysis_registry.build_all(&config.analysis_declarations()).await?;
    let matchers = match_registry.build_all(&config.match_declarations()).await?;
    let match_names = matchers.iter().map(|c| c.name().to_string()).collect();

    Ok(BuiltControllers { analysis, matchers, match_names })
}

#[cfg(test)]
mod tests {
    use super::*;
    use extauth_metrics::NoopInstrumentation;

    #[test]
    fn every_controller_kind_is_registered() {
        let analysis = analysis_registry();
        assert!(analysis.has("maxmind-asn"));
        assert!(analysis.has("maxmind-geoip"));
        assert!(analysis.has("user-agent"));

        let matchers = match_registry(Arc::new(NoopInstrumentation));
        assert!(matchers.has("ip-match"));
        assert!(matchers.has("asn-match"));
        assert!(matchers.has("ip-match-db"));
        assert!(matchers.has("asn-match-db"));
        assert!(matchers.has("geofence"));
    }

    #[tokio::test]
    async fn empty_config_builds_nothing() {
        let config = extauth_config::Config {
            analysis_controllers: Vec::new(),
            match_controllers: Vec::new(),
            authorization_policy: String::new(),
            authorization_policy_bypass: false,
        };
        let built = build_controllers(&config, Arc::new(NoopInstrumentation)).await.unwrap();
        assert!(built.analysis.is_empty());
        assert!(built.matchers.is_empty());
        assert!(built.match_names.is_empty());
    }

    #[tokio::test]
    async fn ip_match_controller_builds_from_inline_settings() {
        let config = extauth_config::Config {
            analysis_controllers: Vec::new(),
            match_controllers: vec![extauth_config::ControllerConfig {
                name: "corp".to_string(),
                kind: "ip-match".to_string(),
                enabled: true,
                settings: serde_json::json!({"inline": "10.0.0.0/8"}),
            }],
            authorization_policy: "corp".to_string(),
            authorization_policy_bypass: false,
        };
        let built = build_controllers(&config, Arc::new(NoopInstrumentation)).await.unwrap();
        assert_eq!(built.matchers.len(), 1);
        assert!(built.match_names.contains("corp"));
    }
}
