//! Authentication API handlers
//!
//! Mounted under `/api/auth`. Register and login are public; refresh sits
//! behind the refresh-token middleware, logout and me behind the access-token
//! middleware.

use crate::audit::{audit_log, extract_ip_address, extract_user_agent, AuditEvent};
use crate::auth::{AuthenticatedUser, LoginRequest, LogoutRequest, RegisterRequest, UserInfo};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Registration response
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub msg: String,
    pub user: UserInfo,
}

/// Plain `{"msg": ...}` response
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub msg: String,
}

/// `{"data": ...}` envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct DataResponse<T> {
    pub data: T,
}

/// Register a new account
///
/// # Responses
///
/// * `201 Created` - Account created
/// * `400 Bad Request` - Invalid email, name, role or weak password
/// * `409 Conflict` - Email already registered
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload?;
    let email = request.email.clone();
    let ip_address = extract_ip_address(&headers);

    match state.auth.register(request).await {
        Ok(user) => {
            if let Some(&role) = user.roles.first() {
                audit_log(&AuditEvent::RegistrationSuccess {
                    user_id: user.id.clone(),
                    email: user.email.clone(),
                    role,
                    ip_address,
                });
            }

            Ok((
                StatusCode::CREATED,
                Json(RegisterResponse {
                    msg: "User registered successfully".to_string(),
                    user,
                }),
            ))
        }
        Err(e) => {
            audit_log(&AuditEvent::RegistrationFailure {
                email,
                reason: format!("{e:?}"),
                ip_address,
            });
            Err(e)
        }
    }
}

/// Login with email and password
///
/// # Responses
///
/// * `200 OK` - Access and refresh tokens plus the account
/// * `401 Unauthorized` - Invalid credentials
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload?;
    let email = request.email.clone();
    let ip_address = extract_ip_address(&headers);
    let user_agent = extract_user_agent(&headers);

    match state.auth.login(request).await {
        Ok(response) => {
            audit_log(&AuditEvent::LoginSuccess {
                user_id: response.user.id.clone(),
                email: response.user.email.clone(),
                ip_address,
                user_agent,
            });
            Ok(Json(response))
        }
        Err(e) => {
            audit_log(&AuditEvent::LoginFailure {
                email,
                reason: format!("{e:?}"),
                ip_address,
                user_agent,
            });
            Err(e)
        }
    }
}

/// Exchange a refresh token (in the `Authorization` header) for a new
/// access token
pub async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let response = state.auth.refresh(&user.claims).await?;

    audit_log(&AuditEvent::TokenRefresh {
        user_id: user.user_id,
        ip_address: extract_ip_address(&headers),
    });

    Ok(Json(DataResponse { data: response }))
}

/// Revoke the presented access token and, optionally, a refresh token
/// given in the body
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    headers: HeaderMap,
    payload: Option<Json<LogoutRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let request = payload.map(|Json(r)| r).unwrap_or_default();
    let refresh_revoked = state.auth.logout(&user.claims, request).await?;

    audit_log(&AuditEvent::Logout {
        user_id: user.user_id,
        refresh_revoked,
        ip_address: extract_ip_address(&headers),
    });

    Ok(Json(MessageResponse {
        msg: "Successfully logged out".to_string(),
    }))
}

/// Current account
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, AppError> {
    let user_info = state.auth.me(&user.user_id).await?;
    Ok(Json(user_info))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_envelope_shape() {
        let response = DataResponse {
            data: crate::auth::AccessTokenResponse {
                access_token: "token".to_string(),
                token_type: "Bearer".to_string(),
                expires_in: 3600,
            },
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["data"]["access_token"], "token");
        assert_eq!(json["data"]["expires_in"], 3600);
    }

    #[test]
    fn test_message_response_serialization() {
        let response = MessageResponse {
            msg: "Successfully logged out".to_string(),
        };

        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(json, r#"{"msg":"Successfully logged out"}"#);
    }
}
