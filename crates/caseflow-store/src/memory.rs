//! In-memory store
//!
//! Backs local development runs (`--in-memory`) and the API tests. Same
//! contract as [`DocumentStore`](crate::DocumentStore), nothing survives a
//! restart.

use crate::models::{NewUser, RevocationRecord, User};
use crate::{Result, RevocationStore, StoreError, UserStore, USERS_TABLE};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory user and revocation store
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Users keyed by record id
    users: RwLock<HashMap<String, User>>,
    /// Revocation records keyed by jti
    revoked: RwLock<HashMap<String, RevocationRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of revocation records currently held
    pub async fn revoked_count(&self) -> usize {
        self.revoked.read().await.len()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        let mut users = self.users.write().await;

        if users.values().any(|u| u.email == user.email) {
            return Err(StoreError::DuplicateEmail);
        }

        let id = format!("{USERS_TABLE}:{}", Uuid::new_v4().simple());
        let created = User {
            id: id.clone(),
            email: user.email,
            name: user.name,
            roles: user.roles,
            password_hash: user.password_hash,
            created_at: Utc::now(),
        };
        users.insert(id, created.clone());

        Ok(created)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        Ok(self.users.read().await.get(id).cloned())
    }
}

#[async_trait]
impl RevocationStore for MemoryStore {
    async fn revoke(&self, record: RevocationRecord) -> Result<()> {
        self.revoked
            .write()
            .await
            .entry(record.jti.clone())
            .or_insert(record);
        Ok(())
    }

    async fn is_revoked(&self, jti: &str) -> Result<bool> {
        Ok(self.revoked.read().await.contains_key(jti))
    }

    async fn prune_expired(&self, now: i64) -> Result<usize> {
        let mut revoked = self.revoked.write().await;
        let before = revoked.len();
        revoked.retain(|_, record| !record.is_expired(now));
        Ok(before - revoked.len())
    }
}
