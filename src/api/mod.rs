//! API layer - HTTP handlers and routing
//!
//! Every endpoint is mounted under `/api`:
//! - Auth endpoints (`/auth`)
//! - User endpoints (`/user`)
//! - Blog endpoints (`/blogs`)
//! - Feedback endpoints (`/feedback`)
//! - Prediction endpoints (`/predict`, `/predictions`)

pub mod auth;
pub mod blogs;
pub mod common;
pub mod feedback;
pub mod middleware;
pub mod predictions;
pub mod users;

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::get,
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use common::{ApiResponse, ApiResult, PaginationQuery};
pub use middleware::{ApiError, AppState, AuthenticatedUser, ValidatedJson};

/// Build the API router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Protected routes (need a valid access token)
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .nest("/user", users::router())
        .nest("/blogs", blogs::router())
        .nest("/feedback", feedback::router())
        .nest("/predictions", predictions::history_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Routes where a token is used when present
    let optional_routes = Router::new()
        .nest("/auth", auth::optional_router())
        .merge(predictions::predict_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::optional_auth,
        ));

    // Public routes
    Router::new()
        .route("/", get(health))
        .nest("/auth", auth::public_router())
        .merge(optional_routes)
        .merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Result<Router> {
    let origin = cors_origin
        .parse::<HeaderValue>()
        .with_context(|| format!("Invalid CORS origin: {}", cors_origin))?;

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true);

    Ok(Router::new()
        .nest("/api", build_api_router(state.clone()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

/// GET /api
async fn health() -> axum::Json<ApiResponse<()>> {
    ApiResponse::message("API is running")
}
