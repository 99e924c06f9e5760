//! Authentication service layer
//!
//! Registration, login, token refresh, logout and identity lookup on top of
//! the user store and the token service.

use super::jwt::{Claims, TokenKind, TokenService};
use super::password::{
    hash_password_with_config, placeholder_digest, validate_password_strength, verify_password,
    PasswordConfig,
};
use crate::error::AppError;
use caseflow_core::Role;
use caseflow_store::{NewUser, User, UserStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task;
use tracing::{debug, instrument};
use validator::Validate;

/// Generic login failure; never tells which half was wrong
pub const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// User registration request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub password: String,

    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    /// "client" or "lawyer"
    pub role: String,
}

/// User login request
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Logout request; the body is optional
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
}

/// Public view of an account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserInfo {
    pub id: String,
    pub email: String,
    pub name: String,
    pub roles: Vec<Role>,
}

impl From<User> for UserInfo {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            roles: user.roles,
        }
    }
}

/// Login response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub user: UserInfo,
}

/// Freshly minted access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    tokens: TokenService,
    password_config: PasswordConfig,
    /// Verified against when the email is unknown
    placeholder_digest: String,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, tokens: TokenService) -> Self {
        let password_config = PasswordConfig::default();
        Self {
            users,
            tokens,
            placeholder_digest: placeholder_digest(&password_config),
            password_config,
        }
    }

    /// Override the Argon2 cost parameters used for new digests
    pub fn with_password_config(mut self, config: PasswordConfig) -> Self {
        self.placeholder_digest = placeholder_digest(&config);
        self.password_config = config;
        self
    }

    /// Register a new account
    ///
    /// Fails with `BadRequest` on invalid input and `Conflict` when the email
    /// is taken.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn register(&self, request: RegisterRequest) -> Result<UserInfo, AppError> {
        request.validate()?;

        validate_password_strength(&request.password)
            .map_err(|e| AppError::BadRequest(format!("Password validation failed: {e}")))?;

        let role: Role = request
            .role
            .parse()
            .map_err(|_| AppError::BadRequest("Role must be 'client' or 'lawyer'".to_string()))?;

        let email = request.email.trim().to_lowercase();
        if self.users.find_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let password = request.password;
        let config = self.password_config.clone();
        let password_hash =
            off_runtime(move || hash_password_with_config(&password, &config)).await??;

        let user = self
            .users
            .create_user(NewUser {
                email,
                name: request.name.trim().to_string(),
                roles: vec![role],
                password_hash,
            })
            .await?;

        debug!("Registered {}", user.id);
        Ok(UserInfo::from(user))
    }

    /// Check credentials and issue an access/refresh pair
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse, AppError> {
        let email = request.email.trim().to_lowercase();

        let user = self.users.find_by_email(&email).await?;

        // Unknown emails still pay for a full verification
        let digest = user
            .as_ref()
            .map_or_else(|| self.placeholder_digest.clone(), |u| u.password_hash.clone());
        let password = request.password;
        let verified = off_runtime(move || verify_password(&password, &digest)).await?;

        let user = match user {
            Some(user) if verified => user,
            _ => return Err(AppError::Unauthorized(INVALID_CREDENTIALS.to_string())),
        };

        let pair = self.tokens.issue(&user.id, &user.roles)?;

        Ok(AuthResponse {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.tokens.access_ttl_secs(),
            user: UserInfo::from(user),
        })
    }

    /// Mint a new access token from validated refresh-token claims
    ///
    /// Roles are re-read from the account so a deleted account cannot keep
    /// refreshing.
    #[instrument(skip(self, refresh), fields(user_id = %refresh.sub))]
    pub async fn refresh(&self, refresh: &Claims) -> Result<AccessTokenResponse, AppError> {
        let user = self
            .users
            .find_by_id(&refresh.sub)
            .await?
            .ok_or_else(|| AppError::Unauthorized("User no longer exists".to_string()))?;

        let access_token = self.tokens.issue_access(&user.id, &user.roles)?;

        Ok(AccessTokenResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.tokens.access_ttl_secs(),
        })
    }

    /// Revoke the presented access token, plus the refresh token if one is
    /// supplied and valid for the same user
    ///
    /// Returns whether a refresh token was revoked.
    #[instrument(skip(self, access, request), fields(user_id = %access.sub))]
    pub async fn logout(&self, access: &Claims, request: LogoutRequest) -> Result<bool, AppError> {
        self.tokens.revoke(access).await?;

        let Some(refresh_token) = request.refresh_token else {
            return Ok(false);
        };

        match self.tokens.validate_kind(&refresh_token, TokenKind::Refresh) {
            Ok(refresh) if refresh.sub == access.sub => {
                self.tokens.revoke(&refresh).await?;
                Ok(true)
            }
            Ok(_) => {
                debug!("Ignoring refresh token issued to another user");
                Ok(false)
            }
            Err(e) => {
                debug!("Ignoring unusable refresh token on logout: {}", e);
                Ok(false)
            }
        }
    }

    /// The caller's account
    pub async fn me(&self, user_id: &str) -> Result<UserInfo, AppError> {
        self.users
            .find_by_id(user_id)
            .await?
            .map(UserInfo::from)
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }
}

/// Run Argon2 work on the blocking pool
async fn off_runtime<T, F>(work: F) -> Result<T, AppError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    task::spawn_blocking(work)
        .await
        .map_err(|e| AppError::Internal(format!("Password task failed: {e}")))
}
