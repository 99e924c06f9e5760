//! Caseflow configuration management
//!
//! Handles configuration from environment variables (optionally seeded from a
//! `.env` file) and TOML config files. Every setting has a development default
//! except the token signing secret, which must always be supplied.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable holding the JWT signing secret
pub const JWT_SECRET_ENV: &str = "JWT_SECRET_KEY";

/// Minimum accepted length of the signing secret in bytes (HS256 key size)
pub const MIN_SECRET_LEN: usize = 32;

/// Longest accepted token lifetime (10 years)
pub const MAX_TOKEN_LIFETIME_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Document store connection
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Token signing and lifetimes
    #[serde(default)]
    pub auth: AuthConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from the process environment
    ///
    /// A `.env` file in the working directory is loaded first if present;
    /// variables already set in the environment win.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    ///
    /// `from_env` delegates here; tests pass a map instead of touching the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        config.apply_overrides(&lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file, then apply environment overrides
    ///
    /// The signing secret may be left out of the file and supplied through
    /// `JWT_SECRET_KEY` instead.
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        let mut config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })?;

        dotenvy::dotenv().ok();
        config.apply_overrides(&|key: &str| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn apply_overrides<F>(&mut self, lookup: &F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server
        if let Some(host) = lookup("API_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("API_PORT") {
            self.server.port = parse_value("API_PORT", port)?;
        }
        if let Some(origins) = lookup("CORS_ORIGINS") {
            self.server.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // SurrealDB
        if let Some(url) = lookup("SURREALDB_URL") {
            self.database.surrealdb_url = url;
        }
        if let Some(user) = lookup("SURREALDB_USER") {
            self.database.surrealdb_user = user;
        }
        if let Some(pass) = lookup("SURREALDB_PASS") {
            self.database.surrealdb_pass = pass;
        }
        if let Some(ns) = lookup("SURREALDB_NAMESPACE") {
            self.database.surrealdb_namespace = ns;
        }
        if let Some(db) = lookup("SURREALDB_DATABASE") {
            self.database.surrealdb_database = db;
        }
        if let Some(secs) = lookup("DB_QUERY_TIMEOUT_SECS") {
            self.database.query_timeout_secs = parse_value("DB_QUERY_TIMEOUT_SECS", secs)?;
        }
        if let Some(attempts) = lookup("DB_CONNECT_ATTEMPTS") {
            self.database.connect_attempts = parse_value("DB_CONNECT_ATTEMPTS", attempts)?;
        }
        if let Some(secs) = lookup("REVOCATION_PRUNE_INTERVAL_SECS") {
            self.database.prune_interval_secs =
                parse_value("REVOCATION_PRUNE_INTERVAL_SECS", secs)?;
        }

        // Auth
        if let Some(secret) = lookup(JWT_SECRET_ENV) {
            self.auth.secret = secret;
        }
        if let Some(secs) = lookup("JWT_ACCESS_TOKEN_EXPIRES_SECS") {
            self.auth.access_token_expires_secs =
                parse_value("JWT_ACCESS_TOKEN_EXPIRES_SECS", secs)?;
        }
        if let Some(days) = lookup("JWT_REFRESH_TOKEN_EXPIRES_DAYS") {
            self.auth.refresh_token_expires_days =
                parse_value("JWT_REFRESH_TOKEN_EXPIRES_DAYS", days)?;
        }

        // Logging
        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = lookup("LOG_JSON") {
            self.logging.json_format = parse_value("LOG_JSON", json)?;
        }

        Ok(())
    }

    /// Reject configurations the server must not start with
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.auth.validate()?;

        if self.database.connect_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "DB_CONNECT_ATTEMPTS".to_string(),
                value: "0".to_string(),
            });
        }

        Ok(())
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value,
    })
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Allowed origins for CORS (empty means any origin)
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            cors_origins: vec![],
        }
    }
}

impl ServerConfig {
    /// Socket address string for the listener
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Document store connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SurrealDB endpoint (`ws://`, `wss://` or `mem://`)
    pub surrealdb_url: String,

    /// SurrealDB root username; empty connects without signing in
    pub surrealdb_user: String,

    /// SurrealDB password
    pub surrealdb_pass: String,

    /// SurrealDB namespace
    pub surrealdb_namespace: String,

    /// SurrealDB database name
    pub surrealdb_database: String,

    /// Upper bound for a single query, in seconds
    pub query_timeout_secs: u64,

    /// Connection attempts before giving up at startup
    pub connect_attempts: u32,

    /// Initial backoff between connection attempts, in milliseconds
    pub connect_backoff_ms: u64,

    /// How often expired revocation records are pruned, in seconds
    pub prune_interval_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            surrealdb_url: "ws://localhost:8000".to_string(),
            surrealdb_user: "root".to_string(),
            surrealdb_pass: "root".to_string(),
            surrealdb_namespace: "caseflow".to_string(),
            surrealdb_database: "legal_app".to_string(),
            query_timeout_secs: 5,
            connect_attempts: 5,
            connect_backoff_ms: 200,
            prune_interval_secs: 3600,
        }
    }
}

/// Token signing configuration
///
/// The default secret is empty and fails [`AuthConfig::validate`].
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret for HS256 signing
    pub secret: String,

    /// Access token lifetime in seconds (default: 1 hour)
    pub access_token_expires_secs: u64,

    /// Refresh token lifetime in days (default: 30 days)
    pub refresh_token_expires_days: u64,

    /// Token issuer identifier
    pub issuer: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            access_token_expires_secs: 3600,
            refresh_token_expires_days: 30,
            issuer: "caseflow-api".to_string(),
        }
    }
}

impl AuthConfig {
    /// Default lifetimes with the given secret
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            ..Default::default()
        }
    }

    /// Refresh token lifetime in seconds
    pub fn refresh_token_expires_secs(&self) -> u64 {
        self.refresh_token_expires_days.saturating_mul(24 * 60 * 60)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret.is_empty() {
            return Err(ConfigError::MissingRequired(JWT_SECRET_ENV.to_string()));
        }
        if self.secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::WeakSecret {
                min_len: MIN_SECRET_LEN,
            });
        }
        if self.access_token_expires_secs == 0 || self.refresh_token_expires_days == 0 {
            return Err(ConfigError::InvalidValue {
                key: "token lifetime".to_string(),
                value: "0".to_string(),
            });
        }
        if self.access_token_expires_secs > MAX_TOKEN_LIFETIME_SECS {
            return Err(ConfigError::InvalidValue {
                key: "JWT_ACCESS_TOKEN_EXPIRES_SECS".to_string(),
                value: self.access_token_expires_secs.to_string(),
            });
        }
        if self.refresh_token_expires_secs() > MAX_TOKEN_LIFETIME_SECS {
            return Err(ConfigError::InvalidValue {
                key: "JWT_REFRESH_TOKEN_EXPIRES_DAYS".to_string(),
                value: self.refresh_token_expires_days.to_string(),
            });
        }
        Ok(())
    }
}

// Keep the secret out of logs and panic messages.
impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret", &"<redacted>")
            .field("access_token_expires_secs", &self.access_token_expires_secs)
            .field("refresh_token_expires_days", &self.refresh_token_expires_days)
            .field("issuer", &self.issuer)
            .finish()
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("JWT secret must be at least {min_len} bytes")]
    WeakSecret { min_len: usize },
}
