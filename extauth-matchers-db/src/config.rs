//! Settings for a database-backed match controller: the data-source type,
//! its connection and TLS material, fail-mode, and optional TTL cache.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {var:?} is not set or empty")]
    MissingEnv { var: String },
    #[error("query must contain exactly one placeholder, `$1`, found: {query:?}")]
    InvalidQuery { query: String },
    #[error("PEM file {path:?} is empty")]
    EmptyPem { path: String },
    #[error("PEM file {path:?} does not look like a PEM-encoded {expected}")]
    MalformedPem { path: String, expected: String },
    #[error("failed to read file {path:?}: {source}")]
    UnreadableFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Read a named environment variable, erroring if it's missing or empty —
/// credentials are never embedded directly in configuration.
pub fn resolve_env_credential(var: &str) -> Result<String, ConfigError> {
    match std::env::var(var) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::MissingEnv { var: var.to_string() }),
    }
}

/// A parameterized relational query must bind the lookup key as exactly one
/// `$1` placeholder — validated here, at construction, rather than at query
/// time where a malformed query would only surface on the first request.
pub fn validate_single_placeholder_query(query: &str) -> Result<(), ConfigError> {
    let count = query.matches('$').count();
    if count != 1 || !query.contains("$1") {
        return Err(ConfigError::InvalidQuery { query: query.to_string() });
    }
    Ok(())
}

/// Minimal structural validation: the file is non-empty and its content
/// looks like a PEM block of the expected kind (`CERTIFICATE` or
/// `PRIVATE KEY`). Does not perform full ASN.1 parsing.
pub fn validate_pem_file(path: &str, expected_label: &str) -> Result<(), ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::UnreadableFile {
        path: path.to_string(),
        source,
    })?;
    if contents.trim().is_empty() {
        return Err(ConfigError::EmptyPem { path: path.to_string() });
    }
    let begin_marker = format!("-----BEGIN {expected_label}");
    if !contents.contains(&begin_marker) {
        return Err(ConfigError::MalformedPem {
            path: path.to_string(),
            expected: expected_label.to_string(),
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct TlsSettings {
    pub ca_cert_path: Option<String>,
    pub client_cert_path: Option<String>,
    pub client_key_path: Option<String>,
}

impl TlsSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(ca) = &self.ca_cert_path {
            validate_pem_file(ca, "CERTIFICATE")?;
        }
        if let Some(cert) = &self.client_cert_path {
            validate_pem_file(cert, "CERTIFICATE")?;
        }
        if let Some(key) = &self.client_key_path {
            validate_pem_file(key, "PRIVATE KEY")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionPoolSettings {
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
    pub max_idle_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisSettings {
    pub host: String,
    pub port: u16,
    pub key_prefix: String,
    pub password_env: Option<String>,
    #[serde(default)]
    pub tls: Option<TlsSettings>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostgresSettings {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user_env: String,
    pub password_env: String,
    pub query: String,
    #[serde(default)]
    pub pool: Option<ConnectionPoolSettings>,
    #[serde(default)]
    pub tls: Option<TlsSettings>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DatabaseSettings {
    Redis(RedisSettings),
    Postgres(PostgresSettings),
}

fn default_connection_timeout_ms() -> u64 {
    500
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchDatabaseSettings {
    #[serde(default)]
    pub matches_on_failure: bool,
    #[serde(default)]
    pub cache_ttl_seconds: Option<u64>,
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,
    pub database: DatabaseSettings,
}

impl MatchDatabaseSettings {
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache_ttl_seconds
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
    }
}
