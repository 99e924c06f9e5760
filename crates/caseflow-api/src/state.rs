//! Application state management

use crate::auth::{AuthService, PasswordConfig, TokenService};
use caseflow_core::AppConfig;
use caseflow_store::{MemoryStore, RevocationStore, UserStore};
use std::sync::Arc;
use std::time::Instant;

/// Application state shared across handlers and middleware
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Token issuance, validation and revocation
    pub tokens: TokenService,
    /// Registration, login, refresh and logout
    pub auth: AuthService,
    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        users: Arc<dyn UserStore>,
        revocations: Arc<dyn RevocationStore>,
    ) -> Self {
        let tokens = TokenService::new(&config.auth, revocations);
        let auth = AuthService::new(users, tokens.clone());

        Self {
            config,
            tokens,
            auth,
            start_time: Instant::now(),
        }
    }

    /// State backed by a fresh [`MemoryStore`]
    pub fn in_memory(config: AppConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::new(config, store.clone(), store)
    }

    /// Override the Argon2 cost parameters for new password digests
    pub fn with_password_config(mut self, password_config: PasswordConfig) -> Self {
        self.auth = self.auth.with_password_config(password_config);
        self
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
