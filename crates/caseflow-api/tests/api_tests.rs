//! API integration tests
//!
//! Every test drives the full router with `oneshot` against the in-memory
//! store; no SurrealDB instance is needed.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use caseflow_api::auth::{Claims, PasswordConfig, TokenKind};
use caseflow_api::{create_router, state::AppState};
use caseflow_core::{AppConfig, AuthConfig, Role};
use caseflow_store::{prune_once, MemoryStore, RevocationRecord, RevocationStore, StoreError};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const SECRET: &str = "integration-test-secret-key-0123456789";

fn test_config() -> AppConfig {
    AppConfig {
        auth: AuthConfig::with_secret(SECRET),
        ..Default::default()
    }
}

fn test_state() -> Arc<AppState> {
    Arc::new(AppState::in_memory(test_config()).with_password_config(PasswordConfig::fast()))
}

fn test_app() -> (Router, Arc<AppState>) {
    let state = test_state();
    (create_router(state.clone()), state)
}

/// Helper to create a test request
fn json_request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");

    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    match body {
        Some(json_body) => builder
            .body(Body::from(serde_json::to_string(&json_body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };

    (status, json)
}

async fn register(app: &Router, email: &str, role: &str) -> (StatusCode, Value) {
    send(
        app,
        json_request(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({
                "email": email,
                "password": "password123",
                "name": "Test User",
                "role": role,
            })),
        ),
    )
    .await
}

/// Sign client access claims with the test secret
fn forge_access_token(jti: &str, iat: u64, exp: u64) -> (Claims, String) {
    let claims = Claims {
        iss: "caseflow-api".to_string(),
        sub: "users:u1".to_string(),
        jti: jti.to_string(),
        iat,
        nbf: iat,
        exp,
        kind: TokenKind::Access,
        roles: vec![Role::Client],
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap();

    (claims, token)
}

/// Register and log in; returns (access_token, refresh_token)
async fn login_as(app: &Router, email: &str, role: &str) -> (String, String) {
    let (status, _) = register(app, email, role).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        app,
        json_request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"email": email, "password": "password123"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    (
        body["access_token"].as_str().unwrap().to_string(),
        body["refresh_token"].as_str().unwrap().to_string(),
    )
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_check() {
    let (app, _) = test_app();

    let (status, body) = send(&app, json_request("GET", "/health", None, None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let (app, _) = test_app();

    let (status, body) = send(&app, json_request("GET", "/api/nowhere", None, None)).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"msg": "Not found"}));
}

// =============================================================================
// Registration and login
// =============================================================================

#[tokio::test]
async fn test_register_returns_user() {
    let (app, _) = test_app();

    let (status, body) = register(&app, "client@example.com", "client").await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["email"], "client@example.com");
    assert_eq!(body["user"]["roles"], json!(["client"]));
    assert!(body["user"]["id"].as_str().unwrap().starts_with("users:"));
    assert!(body["user"].get("password_hash").is_none());
}

#[tokio::test]
async fn test_register_duplicate_email() {
    let (app, _) = test_app();
    register(&app, "client@example.com", "client").await;

    let (status, body) = register(&app, "client@example.com", "lawyer").await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["msg"], "Email already registered");
}

#[tokio::test]
async fn test_register_validation_errors() {
    let (app, _) = test_app();

    let (status, _) = register(&app, "not-an-email", "client").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = register(&app, "judge@example.com", "judge").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let request = Request::builder()
        .method("POST")
        .uri("/api/auth/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["msg"].is_string());
}

#[tokio::test]
async fn test_login_response_shape() {
    let (app, _) = test_app();
    register(&app, "lawyer@example.com", "lawyer").await;

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"email": "lawyer@example.com", "password": "password123"})),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["expires_in"], 3600);
    assert!(body["access_token"].is_string());
    assert!(body["refresh_token"].is_string());
    assert_eq!(body["user"]["roles"], json!(["lawyer"]));
}

#[tokio::test]
async fn test_login_invalid_credentials() {
    let (app, _) = test_app();
    register(&app, "client@example.com", "client").await;

    for (email, password) in [
        ("client@example.com", "wrong-password1"),
        ("nobody@example.com", "password123"),
    ] {
        let (status, body) = send(
            &app,
            json_request(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({"email": email, "password": password})),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({"msg": "Invalid email or password"}));
    }
}

// =============================================================================
// Session lifecycle
// =============================================================================

#[tokio::test]
async fn test_login_me_logout_flow() {
    let (app, _) = test_app();
    let (access, _) = login_as(&app, "client@example.com", "client").await;

    let (status, body) = send(&app, json_request("GET", "/api/auth/me", Some(&access), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "client@example.com");

    let (status, body) = send(
        &app,
        json_request("POST", "/api/auth/logout", Some(&access), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"msg": "Successfully logged out"}));

    let (status, body) = send(&app, json_request("GET", "/api/auth/me", Some(&access), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({"msg": "Token has been revoked"}));
}

#[tokio::test]
async fn test_revoked_token_rejected() {
    let (app, state) = test_app();
    let pair = state.tokens.issue("users:u1", &[Role::Client]).unwrap();

    let claims = state.tokens.validate(&pair.access_token).unwrap();
    assert_eq!(claims.sub, "users:u1");
    state.tokens.revoke(&claims).await.unwrap();

    let (status, body) = send(
        &app,
        json_request("GET", "/api/client/profile", Some(&pair.access_token), None),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["msg"], "Token has been revoked");
}

#[tokio::test]
async fn test_revoked_token_stays_rejected_after_prune() {
    let store = Arc::new(MemoryStore::new());
    let state = Arc::new(
        AppState::new(test_config(), store.clone(), store.clone())
            .with_password_config(PasswordConfig::fast()),
    );
    let app = create_router(state.clone());
    let now = chrono::Utc::now().timestamp() as u64;

    // Expired a few seconds ago, so its revocation record is prunable
    let (stale_claims, stale) = forge_access_token("stale-jti", now - 600, now - 5);
    state.tokens.revoke(&stale_claims).await.unwrap();

    // Still live, so its record must survive the prune
    let live = state.tokens.issue_access("users:u1", &[Role::Client]).unwrap();
    let live_claims = state.tokens.validate(&live).unwrap();
    state.tokens.revoke(&live_claims).await.unwrap();

    let removed = prune_once(store.as_ref()).await.unwrap();
    assert_eq!(removed, 1);
    assert!(!state.tokens.is_revoked(&stale_claims.jti).await.unwrap());
    assert!(state.tokens.is_revoked(&live_claims.jti).await.unwrap());

    let (status, body) = send(
        &app,
        json_request("GET", "/api/client/profile", Some(&stale), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["msg"], "Token has expired");

    let (status, body) = send(
        &app,
        json_request("GET", "/api/client/profile", Some(&live), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["msg"], "Token has been revoked");
}

#[tokio::test]
async fn test_refresh_issues_new_access_token() {
    let (app, _) = test_app();
    let (_, refresh) = login_as(&app, "client@example.com", "client").await;

    let (status, body) = send(
        &app,
        json_request("POST", "/api/auth/refresh", Some(&refresh), Some(json!({}))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["token_type"], "Bearer");

    let new_access = body["data"]["access_token"].as_str().unwrap();
    let (status, _) = send(&app, json_request("GET", "/api/auth/me", Some(new_access), None)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_token_types_are_not_interchangeable() {
    let (app, _) = test_app();
    let (access, refresh) = login_as(&app, "client@example.com", "client").await;

    let (status, body) = send(
        &app,
        json_request("POST", "/api/auth/refresh", Some(&access), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body, json!({"msg": "Token validation failed"}));

    let (status, _) = send(&app, json_request("GET", "/api/auth/me", Some(&refresh), None)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_logout_revokes_supplied_refresh_token() {
    let (app, _) = test_app();
    let (access, refresh) = login_as(&app, "client@example.com", "client").await;

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/api/auth/logout",
            Some(&access),
            Some(json!({"refresh_token": refresh})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        json_request("POST", "/api/auth/refresh", Some(&refresh), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["msg"], "Token has been revoked");
}

// =============================================================================
// Token validation failures
// =============================================================================

#[tokio::test]
async fn test_missing_authorization_header() {
    let (app, _) = test_app();

    let (status, body) = send(&app, json_request("GET", "/api/auth/me", None, None)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({"msg": "Missing Authorization Header"}));
}

#[tokio::test]
async fn test_malformed_token() {
    let (app, _) = test_app();

    let (status, body) = send(
        &app,
        json_request("GET", "/api/auth/me", Some("not.a.jwt"), None),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body, json!({"msg": "Token validation failed"}));
}

#[tokio::test]
async fn test_bad_authorization_scheme() {
    let (app, _) = test_app();

    let request = Request::builder()
        .uri("/api/auth/me")
        .header(header::AUTHORIZATION, "Token abc")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["msg"], "Token validation failed");
}

#[tokio::test]
async fn test_token_signed_with_other_secret() {
    let (app, _) = test_app();
    let other = AppState::in_memory(AppConfig {
        auth: AuthConfig::with_secret("some-other-secret-key-0123456789abcdef"),
        ..Default::default()
    });
    let pair = other.tokens.issue("users:u1", &[Role::Client]).unwrap();

    let (status, body) = send(
        &app,
        json_request("GET", "/api/auth/me", Some(&pair.access_token), None),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["msg"], "Token validation failed");
}

#[tokio::test]
async fn test_expired_token() {
    let (app, _) = test_app();
    let now = chrono::Utc::now().timestamp() as u64;

    for seconds_ago in [3600, 5] {
        let (_, token) = forge_access_token("expired-jti", now - 7200, now - seconds_ago);

        let (status, body) =
            send(&app, json_request("GET", "/api/auth/me", Some(&token), None)).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({"msg": "Token has expired"}));
    }
}

// =============================================================================
// Route groups
// =============================================================================

#[tokio::test]
async fn test_role_guards() {
    let (app, _) = test_app();
    let (client, _) = login_as(&app, "client@example.com", "client").await;
    let (lawyer, _) = login_as(&app, "lawyer@example.com", "lawyer").await;

    let (status, body) = send(
        &app,
        json_request("GET", "/api/client/profile", Some(&client), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "client@example.com");

    let (status, body) = send(
        &app,
        json_request("GET", "/api/lawyer/profile", Some(&client), None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, json!({"msg": "Insufficient permissions"}));

    let (status, body) = send(
        &app,
        json_request("GET", "/api/lawyer/profile", Some(&lawyer), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["roles"], json!(["lawyer"]));

    let (status, _) = send(&app, json_request("GET", "/api/client/profile", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Store failures
// =============================================================================

/// Revocation store that is always unreachable
struct UnreachableStore;

#[async_trait]
impl RevocationStore for UnreachableStore {
    async fn revoke(&self, _record: RevocationRecord) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn is_revoked(&self, _jti: &str) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn prune_expired(&self, _now: i64) -> Result<usize, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }
}

#[tokio::test]
async fn test_revocation_store_unavailable() {
    let state = Arc::new(AppState::new(
        test_config(),
        Arc::new(MemoryStore::new()),
        Arc::new(UnreachableStore),
    ));
    let app = create_router(state.clone());
    let pair = state.tokens.issue("users:u1", &[Role::Client]).unwrap();

    let (status, body) = send(
        &app,
        json_request("GET", "/api/auth/me", Some(&pair.access_token), None),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, json!({"msg": "Service temporarily unavailable"}));
}
