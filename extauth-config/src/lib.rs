//! Typed YAML configuration for the external authorization service:
//! controller declarations, the authorization policy expression, and the
//! policy-bypass flag (spec.md §6's "Configuration surface").

pub mod loader;
pub mod secrets;

use extauth_core::registry::ControllerDeclaration;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse YAML: {source}")]
    Parse {
        #[source]
        source: serde_yaml::Error,
    },
    #[error("unclosed placeholder in: {value:?}")]
    UnclosedPlaceholder { value: String },
    #[error("could not resolve secret reference {reference:?}: not set")]
    MissingSecret { reference: String },
    #[error("failed to read secret file {path:?}: {source}")]
    SecretFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// One controller declaration, shared shape for analysis and match
/// controllers per spec.md §6.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub settings: serde_json::Value,
}

fn default_enabled() -> bool {
    true
}

impl ControllerConfig {
    pub fn into_declaration(self) -> ControllerDeclaration {
        let mut declaration = ControllerDeclaration::new(self.name, self.kind, self.settings);
        if !self.enabled {
            declaration = declaration.disabled();
        }
        declaration
    }
}

/// The full configuration surface the core consumes.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub analysis_controllers: Vec<ControllerConfig>,
    #[serde(default)]
    pub match_controllers: Vec<ControllerConfig>,
    #[serde(default)]
    pub authorization_policy: String,
    #[serde(default)]
    pub authorization_policy_bypass: bool,
}

impl Config {
    pub fn analysis_declarations(&self) -> Vec<ControllerDeclaration> {
        self.analysis_controllers.iter().cloned().map(ControllerConfig::into_declaration).collect()
    }

    pub fn match_declarations(&self) -> Vec<ControllerDeclaration> {
        self.match_controllers.iter().cloned().map(ControllerConfig::into_declaration).collect()
    }
}
