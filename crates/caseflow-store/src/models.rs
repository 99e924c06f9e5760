//! Document models for the authentication tables
//!
//! - `User`: an account in the `users` table
//! - `RevocationRecord`: an invalidated token in the `revoked_tokens` table

use caseflow_core::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User account
///
/// `id` is always the normalized record id (`users:key`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: String,

    /// Login email, unique across accounts
    pub email: String,

    pub name: String,

    pub roles: Vec<Role>,

    /// Argon2id PHC string. Never serialized into responses.
    #[serde(skip_serializing, default)]
    pub password_hash: String,

    pub created_at: DateTime<Utc>,
}

/// Account data for insertion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub roles: Vec<Role>,
    pub password_hash: String,
}

/// Revoked token entry
///
/// Keyed by `jti`. `expires_at` is the token's own `exp` claim so the record
/// can be pruned once the token would have expired anyway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RevocationRecord {
    pub jti: String,

    /// "access" or "refresh"
    pub token_type: String,

    /// Unix seconds
    pub expires_at: i64,

    pub revoked_at: DateTime<Utc>,
}

impl RevocationRecord {
    pub fn new(jti: impl Into<String>, token_type: impl Into<String>, expires_at: i64) -> Self {
        Self {
            jti: jti.into(),
            token_type: token_type.into(),
            expires_at,
            revoked_at: Utc::now(),
        }
    }

    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at < now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User {
            id: "users:abc".to_string(),
            email: "client@example.com".to_string(),
            name: "Client".to_string(),
            roles: vec![Role::Client],
            password_hash: "$argon2id$v=19$...".to_string(),
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["roles"][0], "client");
    }

    #[test]
    fn test_revocation_expiry() {
        let record = RevocationRecord::new("jti-1", "access", 1_000);
        assert!(record.is_expired(1_001));
        assert!(!record.is_expired(1_000));
    }
}
