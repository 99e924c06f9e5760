//! Authentication middleware for protecting routes
//!
//! Extracts and validates the bearer token, consults the revocation list,
//! and on success adds the authenticated caller to request extensions.

use super::jwt::{Claims, JwtError, TokenKind};
use crate::audit::{audit_log, extract_ip_address, extract_user_agent, AuditEvent};
use crate::error::error_response;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use caseflow_core::Role;
use caseflow_store::StoreError;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, warn};

/// Body of every token validation failure other than expiry, revocation
/// and a missing header
pub const TOKEN_VALIDATION_FAILED: &str = "Token validation failed";

/// Authenticated caller extracted from a validated token
///
/// Handlers get it with `Extension<AuthenticatedUser>`.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// User record id (`users:key`)
    pub user_id: String,
    pub roles: Vec<Role>,
    /// Claims of the presented token, kept for revocation on logout
    pub claims: Claims,
}

impl AuthenticatedUser {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn jti(&self) -> &str {
        &self.claims.jti
    }
}

impl From<Claims> for AuthenticatedUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub.clone(),
            roles: claims.roles.clone(),
            claims,
        }
    }
}

/// Authentication middleware errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing Authorization header")]
    MissingAuthHeader,

    #[error("Invalid Authorization header format")]
    InvalidAuthHeader,

    #[error("Invalid token: {0}")]
    InvalidToken(#[from] JwtError),

    #[error("Token has been revoked")]
    TokenRevoked,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Revocation lookup failed: {0}")]
    StoreUnavailable(#[from] StoreError),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            AuthError::MissingAuthHeader => {
                error_response(StatusCode::UNAUTHORIZED, "Missing Authorization Header")
            }
            AuthError::InvalidToken(JwtError::ExpiredToken) => {
                error_response(StatusCode::UNAUTHORIZED, "Token has expired")
            }
            AuthError::TokenRevoked => {
                error_response(StatusCode::UNAUTHORIZED, "Token has been revoked")
            }
            AuthError::InsufficientPermissions => {
                error_response(StatusCode::FORBIDDEN, "Insufficient permissions")
            }
            AuthError::StoreUnavailable(e) => {
                error!("Revocation lookup failed: {}", e);
                error_response(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Service temporarily unavailable",
                )
            }
            // Cause stays in the server log
            other => {
                warn!("Token validation failed: {}", other);
                error_response(StatusCode::UNPROCESSABLE_ENTITY, TOKEN_VALIDATION_FAILED)
            }
        }
    }
}

/// Requires a valid, unrevoked access token
///
/// Installed with `middleware::from_fn_with_state` on every protected route.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    authenticate(&state, request, next, TokenKind::Access).await
}

/// Requires a valid, unrevoked refresh token (refresh endpoint only)
pub async fn refresh_token_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    authenticate(&state, request, next, TokenKind::Refresh).await
}

async fn authenticate(
    state: &AppState,
    mut request: Request<Body>,
    next: Next,
    kind: TokenKind,
) -> Result<Response, AuthError> {
    let ip_address = extract_ip_address(request.headers());
    let user_agent = extract_user_agent(request.headers());

    let token = bearer_token(&request)?;

    let claims = match state.tokens.validate_kind(token, kind) {
        Ok(c) => c,
        Err(e) => {
            audit_log(&AuditEvent::InvalidToken {
                reason: e.to_string(),
                ip_address,
                user_agent,
            });
            return Err(AuthError::InvalidToken(e));
        }
    };

    if state.tokens.is_revoked(&claims.jti).await? {
        audit_log(&AuditEvent::RevokedToken {
            user_id: claims.sub.clone(),
            jti: claims.jti.clone(),
            ip_address,
        });
        return Err(AuthError::TokenRevoked);
    }

    request.extensions_mut().insert(AuthenticatedUser::from(claims));

    Ok(next.run(request).await)
}

/// Token from `Authorization: Bearer <token>`
fn bearer_token(request: &Request<Body>) -> Result<&str, AuthError> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;

    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::InvalidAuthHeader)
}

/// Type alias for role middleware future
type RoleMiddlewareFuture =
    std::pin::Pin<Box<dyn std::future::Future<Output = Result<Response, AuthError>> + Send>>;

/// Middleware factory for the route-group role guard
///
/// Must run after [`auth_middleware`]:
///
/// ```ignore
/// Router::new()
///     .route("/profile", get(profile))
///     .route_layer(middleware::from_fn(require_role(Role::Lawyer)))
///     .route_layer(middleware::from_fn_with_state(state, auth_middleware));
/// ```
pub fn require_role(
    required_role: Role,
) -> impl Fn(Request<Body>, Next) -> RoleMiddlewareFuture + Clone {
    move |request: Request<Body>, next: Next| {
        Box::pin(async move {
            let user = request
                .extensions()
                .get::<AuthenticatedUser>()
                .ok_or(AuthError::MissingAuthHeader)?;

            if !user.has_role(required_role) {
                audit_log(&AuditEvent::AccessDenied {
                    user_id: user.user_id.clone(),
                    resource: request.uri().path().to_string(),
                    required_role,
                    ip_address: extract_ip_address(request.headers()),
                });

                return Err(AuthError::InsufficientPermissions);
            }

            Ok(next.run(request).await)
        })
    }
}
