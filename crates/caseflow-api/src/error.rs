//! API error handling
//!
//! Every error leaves the server as `{"msg": "..."}`, the shape the
//! frontend reads.

use crate::auth::jwt::JwtError;
use crate::auth::password::PasswordError;
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use caseflow_store::StoreError;
use serde::{Deserialize, Serialize};
use tracing::error;

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub msg: String,
}

impl ErrorBody {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}

/// Render `{"msg": ...}` with the given status
pub fn error_response(status: StatusCode, msg: impl Into<String>) -> Response {
    (status, Json(ErrorBody::new(msg))).into_response()
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    Conflict(String),
    /// Document store unreachable or timed out
    Unavailable(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::BadRequest(msg) => error_response(StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => error_response(StatusCode::UNAUTHORIZED, msg),
            AppError::NotFound(msg) => error_response(StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => error_response(StatusCode::CONFLICT, msg),
            AppError::Unavailable(detail) => {
                error!("Document store unavailable: {}", detail);
                error_response(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Service temporarily unavailable",
                )
            }
            AppError::Internal(detail) => {
                error!("Internal error: {}", detail);
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            e if e.is_unavailable() => AppError::Unavailable(e.to_string()),
            StoreError::DuplicateEmail => AppError::Conflict("Email already registered".to_string()),
            StoreError::NotFound => AppError::NotFound("User not found".to_string()),
            e => AppError::Internal(e.to_string()),
        }
    }
}

impl From<JwtError> for AppError {
    fn from(err: JwtError) -> Self {
        AppError::Internal(format!("Failed to issue token: {err}"))
    }
}

impl From<PasswordError> for AppError {
    fn from(err: PasswordError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(message) => message.to_string(),
                    None => format!("Invalid {field}"),
                })
            })
            .collect();
        messages.sort();

        AppError::BadRequest(messages.join("; "))
    }
}
