//! SurrealDB implementation of the document store
//!
//! Any engine URL works: `ws://`/`wss://` for a server, `mem://` for an
//! embedded database.
//!
//! Connects with bounded retries, bounds every call with the configured
//! query timeout, and normalizes record ids on everything it reads.

use crate::models::{NewUser, RevocationRecord, User};
use crate::normalize::{normalize, split_record_id};
use crate::retry::RetryPolicy;
use crate::{Result, RevocationStore, StoreError, UserStore, REVOKED_TOKENS_TABLE, USERS_TABLE};
use async_trait::async_trait;
use caseflow_core::DatabaseConfig;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::future::IntoFuture;
use std::time::Duration;
use surrealdb::engine::any::{self, Any};
use surrealdb::opt::auth::Root;
use surrealdb::Surreal;
use tokio::time;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Projection returning user rows with a string record id
const USER_FIELDS: &str =
    "type::string(id) AS id, email, name, roles, password_hash, created_at";

/// SurrealDB-backed store for users and revoked tokens
#[derive(Clone)]
pub struct DocumentStore {
    client: Surreal<Any>,
    query_timeout: Duration,
}

impl DocumentStore {
    /// Connect, authenticate and select the namespace and database
    ///
    /// Transient failures are retried per the configured policy. Fails with
    /// [`StoreError::Unavailable`] or [`StoreError::Timeout`] once the
    /// attempts are exhausted.
    #[instrument(skip(config), fields(url = %config.surrealdb_url))]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let query_timeout = Duration::from_secs(config.query_timeout_secs.max(1));
        let policy = RetryPolicy::from_config(config);

        let client = policy
            .run("SurrealDB connection", || open(config, query_timeout))
            .await?;

        let store = Self {
            client,
            query_timeout,
        };
        store.init_schema().await?;

        info!(
            "Connected to SurrealDB at {} ({}/{})",
            config.surrealdb_url, config.surrealdb_namespace, config.surrealdb_database
        );
        Ok(store)
    }

    /// Define tables and indexes (idempotent)
    pub async fn init_schema(&self) -> Result<()> {
        let response = timed(
            self.query_timeout,
            self.client.query(
                r#"
                DEFINE TABLE IF NOT EXISTS users SCHEMALESS;
                DEFINE INDEX IF NOT EXISTS idx_users_email ON TABLE users FIELDS email UNIQUE;
                DEFINE TABLE IF NOT EXISTS revoked_tokens SCHEMALESS;
                DEFINE INDEX IF NOT EXISTS idx_revoked_jti ON TABLE revoked_tokens FIELDS jti UNIQUE;
                DEFINE INDEX IF NOT EXISTS idx_revoked_expires ON TABLE revoked_tokens FIELDS expires_at;
            "#,
            ),
        )
        .await?;
        response.check()?;

        Ok(())
    }

    /// Run a user lookup and decode the first row
    async fn find_user(&self, query: String, bindings: Value) -> Result<Option<User>> {
        let mut response = timed(self.query_timeout, self.client.query(query).bind(bindings)).await?;
        let rows: Vec<Value> = response.take(0)?;

        rows.into_iter()
            .next()
            .map(|row| serde_json::from_value(normalize(row)).map_err(StoreError::from))
            .transpose()
    }
}

/// Open one connection attempt
///
/// A URL without a scheme is taken as a WebSocket address. An empty user
/// skips root signin.
async fn open(config: &DatabaseConfig, limit: Duration) -> Result<Surreal<Any>> {
    let url = if config.surrealdb_url.contains("://") {
        config.surrealdb_url.clone()
    } else {
        format!("ws://{}", config.surrealdb_url)
    };

    let client = timed(limit, any::connect(url)).await?;

    if !config.surrealdb_user.is_empty() {
        timed(
            limit,
            client.signin(Root {
                username: &config.surrealdb_user,
                password: &config.surrealdb_pass,
            }),
        )
        .await?;
    }

    timed(
        limit,
        client
            .use_ns(&config.surrealdb_namespace)
            .use_db(&config.surrealdb_database),
    )
    .await?;

    Ok(client)
}

/// Await a SurrealDB call, failing with [`StoreError::Timeout`] past `limit`
async fn timed<T, F>(limit: Duration, call: F) -> Result<T>
where
    F: IntoFuture<Output = std::result::Result<T, surrealdb::Error>>,
{
    match time::timeout(limit, call).await {
        Ok(result) => result.map_err(StoreError::from),
        Err(_) => Err(StoreError::Timeout(limit)),
    }
}

/// Unique index or record-id collision
fn is_conflict(err: &surrealdb::Error) -> bool {
    let msg = err.to_string();
    msg.contains("already contains") || msg.contains("already exists")
}

#[derive(Debug, Deserialize)]
struct JtiRow {
    #[allow(dead_code)]
    jti: String,
}

#[async_trait]
impl UserStore for DocumentStore {
    #[instrument(skip(self, user), fields(email = %user.email))]
    async fn create_user(&self, user: NewUser) -> Result<User> {
        let key = Uuid::new_v4().simple().to_string();
        let created_at = Utc::now();

        let response = timed(
            self.query_timeout,
            self.client
                .query("CREATE type::thing($tb, $key) CONTENT $doc RETURN NONE")
                .bind(("tb", USERS_TABLE))
                .bind(("key", key.clone()))
                .bind((
                    "doc",
                    json!({
                        "email": user.email,
                        "name": user.name,
                        "roles": user.roles,
                        "password_hash": user.password_hash,
                        "created_at": created_at,
                    }),
                )),
        )
        .await?;

        match response.check() {
            Ok(_) => {}
            Err(e) if is_conflict(&e) => return Err(StoreError::DuplicateEmail),
            Err(e) => return Err(e.into()),
        }

        debug!("Created user {}:{}", USERS_TABLE, key);

        Ok(User {
            id: format!("{USERS_TABLE}:{key}"),
            email: user.email,
            name: user.name,
            roles: user.roles,
            password_hash: user.password_hash,
            created_at,
        })
    }

    #[instrument(skip(self))]
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        self.find_user(
            format!("SELECT {USER_FIELDS} FROM users WHERE email = $email LIMIT 1"),
            json!({ "email": email }),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        let (table, key) = split_record_id(id)?;
        if table != USERS_TABLE {
            return Ok(None);
        }

        self.find_user(
            format!("SELECT {USER_FIELDS} FROM type::thing($tb, $key)"),
            json!({ "tb": table, "key": key }),
        )
        .await
    }
}

#[async_trait]
impl RevocationStore for DocumentStore {
    #[instrument(skip(self, record), fields(jti = %record.jti))]
    async fn revoke(&self, record: RevocationRecord) -> Result<()> {
        let jti = record.jti.clone();

        let response = timed(
            self.query_timeout,
            self.client
                .query("CREATE type::thing($tb, $jti) CONTENT $doc RETURN NONE")
                .bind(("tb", REVOKED_TOKENS_TABLE))
                .bind(("jti", jti.clone()))
                .bind(("doc", serde_json::to_value(&record)?)),
        )
        .await?;

        match response.check() {
            Ok(_) => debug!("Revoked token {}", jti),
            Err(e) if is_conflict(&e) => debug!("Token {} already revoked", jti),
            Err(e) => return Err(e.into()),
        }

        Ok(())
    }

    #[instrument(skip(self))]
    async fn is_revoked(&self, jti: &str) -> Result<bool> {
        let mut response = timed(
            self.query_timeout,
            self.client
                .query("SELECT jti FROM revoked_tokens WHERE jti = $jti LIMIT 1")
                .bind(("jti", jti.to_string())),
        )
        .await?;

        let rows: Vec<JtiRow> = response.take(0)?;
        Ok(!rows.is_empty())
    }

    #[instrument(skip(self))]
    async fn prune_expired(&self, now: i64) -> Result<usize> {
        let mut response = timed(
            self.query_timeout,
            self.client
                .query("DELETE revoked_tokens WHERE expires_at < $now RETURN BEFORE")
                .bind(("now", now)),
        )
        .await?;

        let removed: Vec<JtiRow> = response.take(0)?;
        Ok(removed.len())
    }
}
