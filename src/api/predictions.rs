//! Prediction API endpoints
//!
//! - POST /api/predict - Run the flood-risk models (bearer optional)
//! - GET /api/predictions/history - The caller's saved predictions
//! - GET /api/predictions/history/{id} - One saved prediction

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Router,
};

use crate::api::common::{ApiResponse, ApiResult, PaginationQuery};
use crate::api::middleware::{AppState, AuthenticatedUser, ValidatedJson};
use crate::models::{PredictionHistoryItem, PredictionHistoryPage, PredictionInput};

/// Build the predict route (optional auth middleware)
pub fn predict_router() -> Router<AppState> {
    Router::new().route("/predict", post(predict))
}

/// Build the history routes (requires auth middleware)
pub fn history_router() -> Router<AppState> {
    Router::new()
        .route("/history", get(history))
        .route("/history/{id}", get(history_item))
}

async fn predict(
    State(state): State<AppState>,
    user: Option<AuthenticatedUser>,
    ValidatedJson(body): ValidatedJson<PredictionInput>,
) -> ApiResult<serde_json::Value> {
    let caller = user.as_ref().map(|u| u.id());
    tracing::info!("Prediction request received from user: {}", caller.unwrap_or("anonymous"));

    let outcome = state.prediction_service.predict(body, caller).await?;
    Ok(ApiResponse::new("Prediction completed successfully", outcome.payload))
}

async fn history(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<PaginationQuery>,
) -> ApiResult<PredictionHistoryPage> {
    let page = state
        .prediction_service
        .history(user.id(), &query.params())
        .await?;
    Ok(ApiResponse::new("Prediction history fetched successfully", page))
}

async fn history_item(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> ApiResult<PredictionHistoryItem> {
    let item = state.prediction_service.history_item(&id, user.id()).await?;
    Ok(ApiResponse::new("Prediction fetched successfully", item))
}
