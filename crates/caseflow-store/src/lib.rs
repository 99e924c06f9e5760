//! Caseflow Store - document store access layer
//!
//! Provides the persistence boundary for the authentication lifecycle:
//! - [`DocumentStore`]: SurrealDB connection with bounded retries and
//!   per-query timeouts
//! - [`normalize`]: record-id rewriting for documents leaving the store
//! - [`UserStore`] / [`RevocationStore`]: repository traits, implemented for
//!   SurrealDB and for the in-memory [`MemoryStore`]
//! - [`spawn_prune_job`]: periodic eviction of expired revocation records

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub mod memory;
pub mod models;
pub mod normalize;
pub mod prune;
pub mod retry;
pub mod surrealdb_store;

pub use memory::MemoryStore;
pub use models::{NewUser, RevocationRecord, User};
pub use normalize::{normalize, split_record_id};
pub use prune::{prune_once, spawn_prune_job};
pub use retry::RetryPolicy;
pub use surrealdb_store::DocumentStore;

/// Table holding user accounts
pub const USERS_TABLE: &str = "users";

/// Table holding revocation records, keyed by jti
pub const REVOKED_TOKENS_TABLE: &str = "revoked_tokens";

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Document store unavailable: {0}")]
    Unavailable(String),

    #[error("Document store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Email already exists")]
    DuplicateEmail,

    #[error("Record not found")]
    NotFound,

    #[error("Invalid record ID format: {0}")]
    InvalidRecordId(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// True when the store could not be reached, as opposed to a query that
    /// reached it and failed
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Timeout(_))
    }
}

impl From<surrealdb::Error> for StoreError {
    fn from(err: surrealdb::Error) -> Self {
        match err {
            surrealdb::Error::Api(e) => StoreError::Unavailable(e.to_string()),
            surrealdb::Error::Db(e) => StoreError::Query(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// User account persistence
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new account; fails with [`StoreError::DuplicateEmail`] if the
    /// email is taken
    async fn create_user(&self, user: NewUser) -> Result<User>;

    /// Look up an account by its login email
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Look up an account by its normalized record id (`users:key`)
    async fn find_by_id(&self, id: &str) -> Result<Option<User>>;
}

/// Revocation list persistence
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Record a revoked token. Revoking an already revoked jti succeeds.
    async fn revoke(&self, record: RevocationRecord) -> Result<()>;

    /// True iff a revocation record exists for `jti`
    async fn is_revoked(&self, jti: &str) -> Result<bool>;

    /// Delete records whose token expired before `now` (unix seconds).
    /// Returns the number of records removed.
    async fn prune_expired(&self, now: i64) -> Result<usize>;
}
