//! API middleware
//!
//! Contains:
//! - Shared application state
//! - The error envelope returned by every failing request
//! - Bearer token authentication (required and optional)
//! - Validated JSON body extraction

use axum::{
    extract::{
        rejection::JsonRejection, FromRequest, FromRequestParts, OptionalFromRequestParts, Request,
        State,
    },
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;

use crate::config::Config;
use crate::db::repositories::{
    SqlxBlogRepository, SqlxFeedbackRepository, SqlxOtpRepository,
    SqlxPredictionHistoryRepository, SqlxRefreshTokenRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::{Validate, ValidationErrors};
use crate::services::{
    AuthService, BlogService, EmailService, FeedbackService, Mailer, OtpService,
    PredictionService, ServiceError, SessionClaims, TokenService, UserService,
};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<AuthService>,
    pub user_service: Arc<UserService>,
    pub blog_service: Arc<BlogService>,
    pub feedback_service: Arc<FeedbackService>,
    pub prediction_service: Arc<PredictionService>,
    pub token_service: Arc<TokenService>,
    pub otp_service: Arc<OtpService>,
}

impl AppState {
    /// Wire the repositories and services on top of a migrated pool
    pub fn new(
        pool: &DynDatabasePool,
        config: &Config,
        mailer: Arc<dyn Mailer>,
    ) -> anyhow::Result<Self> {
        let user_repo = SqlxUserRepository::boxed(pool.clone());

        let token_service = Arc::new(TokenService::new(
            config.auth.clone(),
            SqlxRefreshTokenRepository::boxed(pool.clone()),
        ));
        let otp_service = Arc::new(OtpService::new(
            SqlxOtpRepository::boxed(pool.clone()),
            config.auth.otp_ttl_minutes,
        ));
        let email_service = Arc::new(EmailService::new(mailer, config.auth.otp_ttl_minutes));

        let auth_service = Arc::new(AuthService::new(
            user_repo.clone(),
            token_service.clone(),
            otp_service.clone(),
            email_service,
        ));
        let prediction_service = Arc::new(PredictionService::new(
            &config.prediction,
            SqlxPredictionHistoryRepository::boxed(pool.clone()),
        )?);

        Ok(Self {
            auth_service,
            user_service: Arc::new(UserService::new(user_repo)),
            blog_service: Arc::new(BlogService::new(SqlxBlogRepository::boxed(pool.clone()))),
            feedback_service: Arc::new(FeedbackService::new(SqlxFeedbackRepository::boxed(
                pool.clone(),
            ))),
            prediction_service,
            token_service,
            otp_service,
        })
    }
}

/// Claims of the authenticated caller, placed in request extensions
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub SessionClaims);

impl AuthenticatedUser {
    pub fn id(&self) -> &str {
        &self.0.id
    }
}

/// Error response for API errors
#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    pub status: StatusCode,
    pub success: bool,
    pub message: String,
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorDetail {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            success: false,
            message: message.into(),
            error: ApiErrorDetail {
                code: code.into(),
                details: None,
            },
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.error.details = Some(details);
        self
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "CONFLICT", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::BadRequest(msg) => Self::validation_error(msg),
            ServiceError::Unauthorized(msg) => Self::unauthorized(msg),
            ServiceError::Forbidden(msg) => Self::forbidden(msg),
            ServiceError::NotFound(msg) => Self::not_found(msg),
            ServiceError::Conflict(msg) => Self::conflict(msg),
            ServiceError::Upstream { status, message } => {
                let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
                Self::new(status, "UPSTREAM_ERROR", message)
            }
            ServiceError::Unavailable(msg) => {
                Self::new(StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", msg)
            }
            ServiceError::Internal(e) => {
                tracing::error!("Internal error: {:#}", e);
                Self::internal_error(e.to_string())
            }
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        let details = serde_json::to_value(&errors).unwrap_or(serde_json::Value::Null);
        Self::validation_error("Validation failed").with_details(details)
    }
}

/// Token from an `Authorization: Bearer <token>` header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Authentication middleware
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    let claims = state.token_service.verify_access_token(token)?;

    request.extensions_mut().insert(AuthenticatedUser(claims));
    Ok(next.run(request).await)
}

/// Optional authentication middleware
///
/// A missing or invalid token leaves the request anonymous.
pub async fn optional_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let claims = extract_bearer_token(request.headers())
        .and_then(|token| state.token_service.verify_access_token(token).ok());
    if let Some(claims) = claims {
        request.extensions_mut().insert(AuthenticatedUser(claims));
    }
    next.run(request).await
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))
    }
}

impl<S> OptionalFromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<AuthenticatedUser>().cloned())
    }
}

/// JSON body that has passed its [`Validate`] rules
#[derive(Debug)]
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| ApiError::validation_error(rejection.body_text()))?;
        value.validate()?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(extract_bearer_token(&headers), Some("abc.def"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(extract_bearer_token(&headers), None);
    }

    #[test]
    fn test_service_error_mapping() {
        let err = ApiError::from(ServiceError::forbidden("You can only update your own blogs"));
        assert_eq!(err.status, StatusCode::FORBIDDEN);
        assert_eq!(err.error.code, "FORBIDDEN");

        let err = ApiError::from(ServiceError::Upstream {
            status: 422,
            message: "Prediction service error: bad".to_string(),
        });
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.error.code, "UPSTREAM_ERROR");

        let err = ApiError::from(ServiceError::internal("Failed to make prediction"));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "Failed to make prediction");
    }

    #[test]
    fn test_validation_errors_envelope() {
        let mut errors = ValidationErrors::new();
        errors.add("email", "Invalid email format");
        let err = ApiError::from(errors);

        let body = serde_json::to_value(&err).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Validation failed");
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["details"][0]["field"], "email");
    }
}
