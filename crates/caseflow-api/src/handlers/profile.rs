//! Identity endpoint shared by the client and lawyer route groups

use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::state::AppState;
use axum::{extract::State, response::IntoResponse, Extension, Json};
use std::sync::Arc;

/// The caller's account, as seen by its route group
///
/// The role guard in front of the group has already checked the role.
pub async fn profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, AppError> {
    let user_info = state.auth.me(&user.user_id).await?;
    Ok(Json(user_info))
}
