//! Configuration management.
//!
//! Values are layered: serde defaults, then an optional `config/default` file,
//! then `config/{BACKOFFICE_ENV}`, then `BACKOFFICE__SECTION__KEY` environment
//! variables.

use serde::Deserialize;

use crate::error::{BackofficeError, Result};

const ENV_PREFIX: &str = "BACKOFFICE";

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Storage backend selection
    #[serde(default)]
    pub storage: StorageConfig,

    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthSettings,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    #[serde(default)]
    pub url: Option<String>,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Seconds to wait for a pooled connection
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Apply pending migrations at startup
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout_secs(),
            run_migrations: true,
        }
    }
}

/// Which storage engine backs the resource stores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process-local tables, lost on restart
    #[default]
    Memory,
    /// PostgreSQL through sqlx
    Postgres,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    /// Reject unauthenticated requests. When false every caller is a superuser.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// HMAC secret for session tokens
    #[serde(default)]
    pub jwt_secret: String,

    /// Expected `iss` claim
    #[serde(default = "default_issuer")]
    pub jwt_issuer: String,

    /// Lifetime of minted tokens
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,

    /// Cookie consulted when no Authorization header is present
    #[serde(default = "default_session_cookie")]
    pub session_cookie: String,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            jwt_secret: String::new(),
            jwt_issuer: default_issuer(),
            token_ttl_secs: default_token_ttl_secs(),
            session_cookie: default_session_cookie(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    /// Service name reported in traces
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// OpenTelemetry OTLP endpoint
    pub otlp_endpoint: Option<String>,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_true")]
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            otlp_endpoint: None,
            log_level: default_log_level(),
            json_logs: true,
        }
    }
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_max_connections() -> u32 { 20 }
fn default_min_connections() -> u32 { 2 }
fn default_connect_timeout_secs() -> u64 { 10 }
fn default_true() -> bool { true }
fn default_issuer() -> String { "backoffice".to_string() }
fn default_token_ttl_secs() -> u64 { 8 * 3600 }
fn default_session_cookie() -> String { "session".to_string() }
fn default_service_name() -> String { "backoffice-server".to_string() }
fn default_log_level() -> String { "info".to_string() }

impl Config {
    /// Load configuration from config files and the environment.
    pub fn load() -> Result<Self> {
        let env = std::env::var("BACKOFFICE_ENV").unwrap_or_else(|_| "development".to_string());
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from a specific file path.
    pub fn from_file(path: &str) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject combinations the server cannot start with.
    pub fn validate(&self) -> Result<()> {
        if self.storage.backend == StorageBackend::Postgres && self.database.url.is_none() {
            return Err(BackofficeError::configuration(
                "storage.backend is postgres but database.url is not set",
            ));
        }
        if self.auth.enabled && self.auth.jwt_secret.is_empty() {
            return Err(BackofficeError::configuration(
                "auth.enabled requires auth.jwt_secret",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert!(config.auth.enabled);
        assert_eq!(config.auth.session_cookie, "session");
    }

    #[test]
    fn test_default_requires_secret() {
        let err = Config::default().validate().unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::ConfigurationError);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 9090

[storage]
backend = "postgres"

[database]
url = "postgres://localhost/backoffice"

[auth]
jwt_secret = "s3cret"
"#
        )
        .unwrap();

        let config = Config::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.storage.backend, StorageBackend::Postgres);
        assert_eq!(config.database.url.as_deref(), Some("postgres://localhost/backoffice"));
        assert_eq!(config.database.max_connections, 20);
    }

    #[test]
    fn test_postgres_without_url_is_rejected() {
        let mut config = Config::default();
        config.auth.jwt_secret = "s3cret".into();
        config.storage.backend = StorageBackend::Postgres;
        assert!(config.validate().is_err());
    }
}
