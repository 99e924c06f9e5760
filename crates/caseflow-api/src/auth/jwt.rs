//! JWT token issuance, validation and revocation
//!
//! Tokens are HMAC-SHA256 signed. Every token carries a unique `jti`; logging
//! out writes that jti to the revocation list, and the auth middleware checks
//! the list on every authenticated request.

use caseflow_core::{AuthConfig, Role};
use caseflow_store::{RevocationRecord, RevocationStore, StoreError};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Token purpose, carried in the `type` claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// Token issuer
    pub iss: String,
    /// Subject - user record id
    pub sub: String,
    /// JWT ID - revocation key
    pub jti: String,
    /// Issued at (Unix epoch)
    pub iat: u64,
    /// Not before (Unix epoch)
    pub nbf: u64,
    /// Expiration (Unix epoch)
    pub exp: u64,
    #[serde(rename = "type")]
    pub kind: TokenKind,
    pub roles: Vec<Role>,
}

/// Access and refresh token issued together at login
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// JWT errors
///
/// Everything except `EncodingError` and `SystemTimeError` means the
/// presented token is not acceptable.
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Failed to encode JWT: {0}")]
    EncodingError(#[from] jsonwebtoken::errors::Error),

    #[error("Invalid token format")]
    InvalidToken,

    #[error("Token has expired")]
    ExpiredToken,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Expected {expected} token, got {found} token")]
    WrongTokenType { expected: TokenKind, found: TokenKind },

    #[error("System time error: {0}")]
    SystemTimeError(#[from] std::time::SystemTimeError),
}

/// Signs, validates and revokes tokens
///
/// Cheap to clone; the revocation store is shared.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    access_ttl_secs: u64,
    refresh_ttl_secs: u64,
    revocations: Arc<dyn RevocationStore>,
}

impl TokenService {
    pub fn new(config: &AuthConfig, revocations: Arc<dyn RevocationStore>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&config.issuer]);
        validation.validate_nbf = true;
        // Expired means expired; revocation records are pruned at `exp`
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            issuer: config.issuer.clone(),
            access_ttl_secs: config.access_token_expires_secs,
            refresh_ttl_secs: config.refresh_token_expires_secs(),
            revocations,
        }
    }

    /// Access token lifetime in seconds
    pub fn access_ttl_secs(&self) -> u64 {
        self.access_ttl_secs
    }

    /// Issue an access/refresh pair for `user_id`
    ///
    /// Each token gets its own jti. Nothing is persisted.
    pub fn issue(&self, user_id: &str, roles: &[Role]) -> Result<TokenPair, JwtError> {
        Ok(TokenPair {
            access_token: self.issue_access(user_id, roles)?,
            refresh_token: self.sign(user_id, roles, TokenKind::Refresh, self.refresh_ttl_secs)?,
        })
    }

    /// Issue a single access token (used by refresh)
    pub fn issue_access(&self, user_id: &str, roles: &[Role]) -> Result<String, JwtError> {
        self.sign(user_id, roles, TokenKind::Access, self.access_ttl_secs)
    }

    fn sign(
        &self,
        user_id: &str,
        roles: &[Role],
        kind: TokenKind,
        ttl_secs: u64,
    ) -> Result<String, JwtError> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();

        let claims = Claims {
            iss: self.issuer.clone(),
            sub: user_id.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now,
            nbf: now,
            exp: now.saturating_add(ttl_secs),
            kind,
            roles: roles.to_vec(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;
        Ok(token)
    }

    /// Verify signature, issuer and expiry and decode the claims
    pub fn validate(&self, token: &str) -> Result<Claims, JwtError> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(
            |e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::ExpiredToken,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => JwtError::InvalidSignature,
                _ => JwtError::InvalidToken,
            },
        )?;

        Ok(token_data.claims)
    }

    /// [`validate`](Self::validate), and require the given token type
    pub fn validate_kind(&self, token: &str, expected: TokenKind) -> Result<Claims, JwtError> {
        let claims = self.validate(token)?;
        if claims.kind != expected {
            return Err(JwtError::WrongTokenType {
                expected,
                found: claims.kind,
            });
        }
        Ok(claims)
    }

    /// True iff the jti is on the revocation list
    pub async fn is_revoked(&self, jti: &str) -> Result<bool, StoreError> {
        self.revocations.is_revoked(jti).await
    }

    /// Put the token on the revocation list until its own expiry
    pub async fn revoke(&self, claims: &Claims) -> Result<(), StoreError> {
        let record = RevocationRecord::new(
            claims.jti.clone(),
            claims.kind.as_str(),
            i64::try_from(claims.exp).unwrap_or(i64::MAX),
        );
        self.revocations.revoke(record).await?;

        debug!("Revoked {} token {}", claims.kind, claims.jti);
        Ok(())
    }
}
