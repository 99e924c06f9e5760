//! API route definitions

use crate::auth::{auth_middleware, refresh_token_middleware, require_role};
use crate::handlers::{auth, profile};
use crate::state::AppState;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use caseflow_core::Role;
use std::sync::Arc;

/// `/api/auth` route group
pub fn auth_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/register", post(auth::register_handler))
        .route("/login", post(auth::login_handler));

    // Refresh token in the Authorization header
    let refresh_routes = Router::new()
        .route("/refresh", post(auth::refresh_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            refresh_token_middleware,
        ));

    // Access token required
    let protected_routes = Router::new()
        .route("/logout", post(auth::logout_handler))
        .route("/me", get(auth::me_handler))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(refresh_routes)
        .merge(protected_routes)
}

/// Access-token protected group restricted to one role
///
/// The role guard is added first so it runs after authentication.
fn role_group(state: Arc<AppState>, role: Role) -> Router<Arc<AppState>> {
    Router::new()
        .route("/profile", get(profile::profile_handler))
        .route_layer(middleware::from_fn(require_role(role)))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// `/api/client` route group
pub fn client_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    role_group(state, Role::Client)
}

/// `/api/lawyer` route group
pub fn lawyer_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    role_group(state, Role::Lawyer)
}

/// All API route groups under their prefixes
pub fn api_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .nest("/api/auth", auth_routes(state.clone()))
        .nest("/api/client", client_routes(state.clone()))
        .nest("/api/lawyer", lawyer_routes(state))
}
