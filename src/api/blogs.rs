//! Blog API endpoints
//!
//! Every route requires authentication; only the author may update or
//! delete a blog.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use crate::api::common::{ApiResponse, ApiResult, PaginationQuery};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, ValidatedJson};
use crate::models::{BlogWithAuthor, CreateBlogInput, UpdateBlogInput};

/// Build the blog router (requires auth middleware)
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_blogs).post(create_blog))
        .route("/my-blogs", get(my_blogs))
        .route("/{id}", get(get_blog).put(update_blog).delete(delete_blog))
}

/// POST /api/blogs
async fn create_blog(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ValidatedJson(body): ValidatedJson<CreateBlogInput>,
) -> Result<(StatusCode, Json<ApiResponse<BlogWithAuthor>>), ApiError> {
    let blog = state.blog_service.create(user.id(), body).await?;
    Ok((StatusCode::CREATED, ApiResponse::new("Blog created successfully", blog)))
}

/// GET /api/blogs?page=&limit=
async fn list_blogs(
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> ApiResult<Vec<BlogWithAuthor>> {
    let page = state.blog_service.list(&query.params()).await?;
    Ok(ApiResponse::paged("Blogs fetched successfully", page))
}

/// GET /api/blogs/my-blogs?page=&limit=
async fn my_blogs(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<PaginationQuery>,
) -> ApiResult<Vec<BlogWithAuthor>> {
    let page = state
        .blog_service
        .list_by_author(user.id(), &query.params())
        .await?;
    Ok(ApiResponse::paged("Your blogs fetched successfully", page))
}

/// GET /api/blogs/{id}
async fn get_blog(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<BlogWithAuthor> {
    let blog = state.blog_service.get_by_id(&id).await?;
    Ok(ApiResponse::new("Blog fetched successfully", blog))
}

/// PUT /api/blogs/{id}
async fn update_blog(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
    ValidatedJson(body): ValidatedJson<UpdateBlogInput>,
) -> ApiResult<BlogWithAuthor> {
    let blog = state.blog_service.update(&id, user.id(), body).await?;
    Ok(ApiResponse::new("Blog updated successfully", blog))
}

/// DELETE /api/blogs/{id}
async fn delete_blog(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> ApiResult<()> {
    state.blog_service.delete(&id, user.id()).await?;
    Ok(ApiResponse::message("Blog deleted successfully"))
}
