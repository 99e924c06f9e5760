//! Caseflow Core - configuration and shared types
//!
//! This crate holds what every other Caseflow crate needs:
//! - Application configuration (environment, `.env`, TOML)
//! - The account role model shared by the store and the API

pub mod config;

pub use config::{
    AppConfig, AuthConfig, ConfigError, DatabaseConfig, LoggingConfig, ServerConfig,
};

use serde::{Deserialize, Serialize};

// ============================================================================
// Roles
// ============================================================================

/// Account role
///
/// A client reports cases, a lawyer takes them on. The role decides which
/// route group an account may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Client,
    Lawyer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Lawyer => "lawyer",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "client" => Ok(Self::Client),
            "lawyer" => Ok(Self::Lawyer),
            _ => Err(ConfigError::InvalidValue {
                key: "role".to_string(),
                value: s.to_string(),
            }),
        }
    }
}
