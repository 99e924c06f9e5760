//! Security audit logging for authentication events
//!
//! Every event is logged at INFO level on the "audit" target so it can be
//! filtered and routed separately from application logs. The full event is
//! attached as a JSON string for log aggregators.

use caseflow_core::Role;
use serde::Serialize;
use tracing::info;

/// Security audit events for authentication and authorization
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    /// Successful account registration
    RegistrationSuccess {
        user_id: String,
        email: String,
        role: Role,
        ip_address: Option<String>,
    },

    /// Rejected registration
    RegistrationFailure {
        email: String,
        reason: String,
        ip_address: Option<String>,
    },

    /// Successful login
    LoginSuccess {
        user_id: String,
        email: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Failed login attempt
    LoginFailure {
        email: String,
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Logout; `refresh_revoked` tells whether a refresh token went too
    Logout {
        user_id: String,
        refresh_revoked: bool,
        ip_address: Option<String>,
    },

    /// New access token minted from a refresh token
    TokenRefresh {
        user_id: String,
        ip_address: Option<String>,
    },

    /// Invalid or expired token presented
    InvalidToken {
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Revoked token presented
    RevokedToken {
        user_id: String,
        jti: String,
        ip_address: Option<String>,
    },

    /// Authenticated caller without the role a route group requires
    AccessDenied {
        user_id: String,
        resource: String,
        required_role: Role,
        ip_address: Option<String>,
    },
}

/// Log a security audit event with structured fields
pub fn audit_log(event: &AuditEvent) {
    let event_json = serde_json::to_string(event)
        .unwrap_or_else(|e| format!("{{\"error\":\"Failed to serialize audit event: {e}\"}}"));

    match event {
        AuditEvent::RegistrationSuccess {
            user_id,
            email,
            role,
            ip_address,
        } => {
            info!(
                target: "audit",
                event = %event_json,
                user_id = %user_id,
                email = %email,
                role = %role,
                ip_address = ?ip_address,
                "Registration successful"
            );
        }
        AuditEvent::RegistrationFailure {
            email,
            reason,
            ip_address,
        } => {
            info!(
                target: "audit",
                event = %event_json,
                email = %email,
                reason = %reason,
                ip_address = ?ip_address,
                "Registration failed"
            );
        }
        AuditEvent::LoginSuccess {
            user_id,
            email,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                event = %event_json,
                user_id = %user_id,
                email = %email,
                ip_address = ?ip_address,
                "Login successful"
            );
        }
        AuditEvent::LoginFailure {
            email,
            reason,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                event = %event_json,
                email = %email,
                reason = %reason,
                ip_address = ?ip_address,
                "Login failed"
            );
        }
        AuditEvent::Logout {
            user_id,
            refresh_revoked,
            ip_address,
        } => {
            info!(
                target: "audit",
                event = %event_json,
                user_id = %user_id,
                refresh_revoked = %refresh_revoked,
                ip_address = ?ip_address,
                "User logout"
            );
        }
        AuditEvent::TokenRefresh {
            user_id,
            ip_address,
        } => {
            info!(
                target: "audit",
                event = %event_json,
                user_id = %user_id,
                ip_address = ?ip_address,
                "Token refresh"
            );
        }
        AuditEvent::InvalidToken {
            reason, ip_address, ..
        } => {
            info!(
                target: "audit",
                event = %event_json,
                reason = %reason,
                ip_address = ?ip_address,
                "Invalid token"
            );
        }
        AuditEvent::RevokedToken {
            user_id,
            jti,
            ip_address,
        } => {
            info!(
                target: "audit",
                event = %event_json,
                user_id = %user_id,
                jti = %jti,
                ip_address = ?ip_address,
                "Revoked token used"
            );
        }
        AuditEvent::AccessDenied {
            user_id,
            resource,
            required_role,
            ip_address,
        } => {
            info!(
                target: "audit",
                event = %event_json,
                user_id = %user_id,
                resource = %resource,
                required_role = %required_role,
                ip_address = ?ip_address,
                "Access denied"
            );
        }
    }
}

/// Client IP from `X-Forwarded-For` (first hop) or `X-Real-IP`
pub fn extract_ip_address(headers: &axum::http::HeaderMap) -> Option<String> {
    if let Some(xff) = headers.get("x-forwarded-for") {
        if let Ok(xff_str) = xff.to_str() {
            if let Some(first_ip) = xff_str.split(',').next() {
                return Some(first_ip.trim().to_string());
            }
        }
    }

    headers
        .get("x-real-ip")
        .and_then(|ip| ip.to_str().ok())
        .map(|s| s.to_string())
}

pub fn extract_user_agent(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|ua| ua.to_str().ok())
        .map(|s| s.to_string())
}
