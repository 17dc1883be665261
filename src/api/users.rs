//! User API endpoints
//!
//! - PATCH /api/user/update - Update the caller's profile
//! - GET /api/user/{id} - Get a user by id

use axum::{
    extract::{Path, State},
    routing::{get, patch},
    Router,
};

use crate::api::common::{ApiResponse, ApiResult};
use crate::api::middleware::{AppState, AuthenticatedUser, ValidatedJson};
use crate::models::{UpdateUserInput, User};

/// Build the user router (requires auth middleware)
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/update", patch(update_user))
        .route("/{id}", get(get_user))
}

async fn update_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ValidatedJson(body): ValidatedJson<UpdateUserInput>,
) -> ApiResult<User> {
    let updated = state.user_service.update(user.id(), body).await?;
    Ok(ApiResponse::new("User information updated successfully", updated))
}

async fn get_user(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<User> {
    let user = state.user_service.get_by_id(&id).await?;
    Ok(ApiResponse::new("User fetched successfully", user))
}
