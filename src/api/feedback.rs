//! Feedback API endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use crate::api::common::{ApiResponse, ApiResult, PaginationQuery};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, ValidatedJson};
use crate::models::{FeedbackInput, FeedbackWithUser};

/// Build the feedback router (requires auth middleware)
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_feedback).post(create_feedback))
        .route("/my-feedback", get(my_feedback))
        .route(
            "/{id}",
            get(get_feedback).put(update_feedback).delete(delete_feedback),
        )
}

async fn create_feedback(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ValidatedJson(body): ValidatedJson<FeedbackInput>,
) -> Result<(StatusCode, Json<ApiResponse<FeedbackWithUser>>), ApiError> {
    let feedback = state.feedback_service.create(user.id(), body).await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::new("Feedback created successfully", feedback),
    ))
}

async fn list_feedback(
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> ApiResult<Vec<FeedbackWithUser>> {
    let page = state.feedback_service.list(&query.params()).await?;
    Ok(ApiResponse::paged("Feedback fetched successfully", page))
}

async fn my_feedback(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<PaginationQuery>,
) -> ApiResult<Vec<FeedbackWithUser>> {
    let page = state
        .feedback_service
        .list_by_user(user.id(), &query.params())
        .await?;
    Ok(ApiResponse::paged("Your feedback fetched successfully", page))
}

async fn get_feedback(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<FeedbackWithUser> {
    let feedback = state.feedback_service.get_by_id(&id).await?;
    Ok(ApiResponse::new("Feedback fetched successfully", feedback))
}

async fn update_feedback(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
    ValidatedJson(body): ValidatedJson<FeedbackInput>,
) -> ApiResult<FeedbackWithUser> {
    let feedback = state.feedback_service.update(&id, user.id(), body).await?;
    Ok(ApiResponse::new("Feedback updated successfully", feedback))
}

async fn delete_feedback(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> ApiResult<()> {
    state.feedback_service.delete(&id, user.id()).await?;
    Ok(ApiResponse::message("Feedback deleted successfully"))
}
