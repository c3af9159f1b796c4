//! The `DataSource` capability set and its two backends.

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use thiserror::Error;

use crate::config::{resolve_env_credential, validate_single_placeholder_query, ConnectionPoolSettings, PostgresSettings, RedisSettings, TlsSettings};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("query failed: {0}")]
    Query(String),
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
}

/// A key-value or relational lookup backend. `contains` answers "is `key`
/// present in the external set", independent of which storage technology
/// backs it.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn contains(&self, key: &str) -> Result<bool, SourceError>;
    async fn close(&self) -> Result<(), SourceError>;
    async fn health_check(&self) -> Result<(), SourceError>;
    /// Name surfaced in verdict descriptions, e.g. `"redis"` or `"postgres"`.
    fn backend_name(&self) -> &str;
}

pub struct RedisSource {
    manager: redis::aio::ConnectionManager,
    key_prefix: String,
}

impl RedisSource {
    pub async fn connect(settings: &RedisSettings, connect_timeout: std::time::Duration) -> Result<Self, SourceError> {
        if let Some(tls) = &settings.tls {
            tls.validate()?;
        }
        let password = match &settings.password_env {
            Some(var) => Some(resolve_env_credential(var)?),
            None => None,
        };
        let scheme = if settings.tls.is_some() { "rediss" } else { "redis" };
        let url = match &password {
            Some(password) => format!("{scheme}://:{password}@{}:{}", settings.host, settings.port),
            None => format!("{scheme}://{}:{}", settings.host, settings.port),
        };
        let client = redis::Client::open(url).map_err(|e| SourceError::Connection(e.to_string()))?;
        let manager = tokio::time::timeout(connect_timeout, redis::aio::ConnectionManager::new(client))
            .await
            .map_err(|_| SourceError::Connection("connection timed out".to_string()))?
            .map_err(|e| SourceError::Connection(e.to_string()))?;
        Ok(Self {
            manager,
            key_prefix: settings.key_prefix.clone(),
        })
    }
}

#[async_trait]
impl DataSource for RedisSource {
    async fn contains(&self, key: &str) -> Result<bool, SourceError> {
        let full_key = format!("{}{}", self.key_prefix, key);
        let mut conn = self.manager.clone();
        let exists: bool = redis::cmd("EXISTS")
            .arg(&full_key)
            .query_async(&mut conn)
            .await
            .map_err(|e| SourceError::Query(e.to_string()))?;
        Ok(exists)
    }

    async fn close(&self) -> Result<(), SourceError> {
        Ok(())
    }

    async fn health_check(&self) -> Result<(), SourceError> {
        let mut conn = self.manager.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| SourceError::Query(e.to_string()))?;
        Ok(())
    }

    fn backend_name(&self) -> &str {
        "redis"
    }
}

pub struct PostgresSource {
    pool: sqlx::PgPool,
    query: String,
}

impl PostgresSource {
    pub async fn connect(settings: &PostgresSettings, connect_timeout: std::time::Duration) -> Result<Self, SourceError> {
        validate_single_placeholder_query(&settings.query)?;
        if let Some(tls) = &settings.tls {
            tls.validate()?;
        }

        let user = resolve_env_credential(&settings.user_env)?;
        let password = resolve_env_credential(&settings.password_env)?;

        let mut options = PgConnectOptions::new()
            .host(&settings.host)
            .port(settings.port)
            .database(&settings.database)
            .username(&user)
            .password(&password);

        options = apply_tls(options, settings.tls.as_ref());

        let pool_settings = settings.pool.clone().unwrap_or(ConnectionPoolSettings {
            max_connections: None,
            min_connections: None,
            max_idle_seconds: None,
        });
        let mut pool_options = PgPoolOptions::new().acquire_timeout(connect_timeout);
        if let Some(max) = pool_settings.max_connections {
            pool_options = pool_options.max_connections(max);
        }
        if let Some(min) = pool_settings.min_connections {
            pool_options = pool_options.min_connections(min);
        }
        if let Some(idle) = pool_settings.max_idle_seconds {
            pool_options = pool_options.idle_timeout(std::time::Duration::from_secs(idle));
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| SourceError::Connection(e.to_string()))?;

        Ok(Self {
            pool,
            query: settings.query.clone(),
        })
    }
}

fn apply_tls(mut options: PgConnectOptions, tls: Option<&TlsSettings>) -> PgConnectOptions {
    let Some(tls) = tls else {
        return options.ssl_mode(PgSslMode::Prefer);
    };
    options = options.ssl_mode(PgSslMode::VerifyFull);
    if let Some(ca) = &tls.ca_cert_path {
        options = options.ssl_root_cert(ca);
    }
    if let Some(cert) = &tls.client_cert_path {
        options = options.ssl_client_cert(cert);
    }
    if let Some(key) = &tls.client_key_path {
        options = options.ssl_client_key(key);
    }
    options
}

#[async_trait]
impl DataSource for PostgresSource {
    async fn contains(&self, key: &str) -> Result<bool, SourceError> {
        let row_count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM ({}) AS q", self.query))
            .bind(key)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| SourceError::Query(e.to_string()))?;
        Ok(row_count > 0)
    }

    async fn close(&self) -> Result<(), SourceError> {
        self.pool.close().await;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), SourceError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| SourceError::Query(e.to_string()))?;
        Ok(())
    }

    fn backend_name(&self) -> &str {
        "postgres"
    }
}
