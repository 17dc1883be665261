//! Authentication API endpoints
//!
//! Handles HTTP requests for user authentication:
//! - POST /api/auth/signup - User registration
//! - POST /api/auth/verify-email - Confirm the email verification code
//! - POST /api/auth/resend-otp - Send a new verification code
//! - POST /api/auth/login - User login
//! - POST /api/auth/refresh-token - Rotate the refresh token
//! - POST /api/auth/logout - Revoke one refresh token
//! - POST /api/auth/logout-all - Revoke every refresh token of the caller
//! - POST /api/auth/forgot-password - Send a password reset code
//! - POST /api/auth/verify-reset-otp - Exchange the reset code for a reset token
//! - POST /api/auth/reset-password - Set a new password
//! - GET /api/auth/me - Get current user

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::api::common::{ApiResponse, ApiResult};
use crate::api::middleware::{extract_bearer_token, ApiError, AppState, AuthenticatedUser, ValidatedJson};
use crate::models::{
    EmailInput, LoginInput, RefreshTokenInput, ResetPasswordInput, SignupInput, User,
    ValidationErrors, VerifyEmailInput, VerifyResetOtpInput,
};
use crate::services::{AuthSession, TokenPair};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetTokenResponse {
    pub reset_token: String,
}

/// Build public auth routes (no auth required)
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/resend-otp", post(resend_otp))
        .route("/login", post(login))
        .route("/refresh-token", post(refresh_token))
        .route("/forgot-password", post(forgot_password))
        .route("/verify-reset-otp", post(verify_reset_otp))
        .route("/reset-password", post(reset_password))
}

/// Build routes where a bearer token is optional
pub fn optional_router() -> Router<AppState> {
    Router::new().route("/verify-email", post(verify_email))
}

/// Build protected auth routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/logout-all", post(logout_all))
        .route("/me", get(me))
}

/// POST /api/auth/signup
async fn signup(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<SignupInput>,
) -> Result<(StatusCode, Json<ApiResponse<AuthSession>>), ApiError> {
    let session = state.auth_service.signup(body).await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::new("User registered successfully. Please verify your email.", session),
    ))
}

/// POST /api/auth/verify-email
///
/// The user comes from the bearer token when one is sent, otherwise from
/// the `email` field.
async fn verify_email(
    State(state): State<AppState>,
    user: Option<AuthenticatedUser>,
    ValidatedJson(body): ValidatedJson<VerifyEmailInput>,
) -> ApiResult<AuthSession> {
    let session = state
        .auth_service
        .verify_email(&body.code, body.email.as_deref(), user.as_ref().map(|u| u.id()))
        .await?;
    Ok(ApiResponse::new("Email verified successfully", session))
}

/// POST /api/auth/resend-otp
async fn resend_otp(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<EmailInput>,
) -> ApiResult<()> {
    state.auth_service.resend_verification(&body.email).await?;
    Ok(ApiResponse::message("Verification code sent"))
}

/// POST /api/auth/login
async fn login(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<LoginInput>,
) -> ApiResult<AuthSession> {
    let session = state.auth_service.login(&body.email, &body.password).await?;
    Ok(ApiResponse::new("Login successful", session))
}

/// POST /api/auth/refresh-token
async fn refresh_token(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<RefreshTokenInput>,
) -> ApiResult<TokenPair> {
    let tokens = state.auth_service.refresh(&body.refresh_token).await?;
    Ok(ApiResponse::new("Token refreshed successfully", tokens))
}

/// POST /api/auth/logout
async fn logout(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ValidatedJson(body): ValidatedJson<RefreshTokenInput>,
) -> ApiResult<()> {
    state.auth_service.logout(&body.refresh_token, user.id()).await?;
    Ok(ApiResponse::message("Logged out successfully"))
}

/// POST /api/auth/logout-all
async fn logout_all(State(state): State<AppState>, user: AuthenticatedUser) -> ApiResult<()> {
    let revoked = state.auth_service.logout_all(user.id()).await?;
    tracing::info!("Revoked {} refresh tokens for {}", revoked, user.id());
    Ok(ApiResponse::message("Logged out from all devices"))
}

/// POST /api/auth/forgot-password
async fn forgot_password(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<EmailInput>,
) -> ApiResult<()> {
    state.auth_service.forgot_password(&body.email).await?;
    Ok(ApiResponse::message("Password reset code sent"))
}

/// POST /api/auth/verify-reset-otp
async fn verify_reset_otp(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<VerifyResetOtpInput>,
) -> ApiResult<ResetTokenResponse> {
    let reset_token = state
        .auth_service
        .verify_reset_otp(&body.email, &body.code)
        .await?;
    Ok(ApiResponse::new("OTP verified successfully", ResetTokenResponse { reset_token }))
}

/// POST /api/auth/reset-password
///
/// The reset token is read from the body first, then from the bearer header.
async fn reset_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(body): ValidatedJson<ResetPasswordInput>,
) -> ApiResult<()> {
    let reset_token = body
        .reset_token
        .as_deref()
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .or_else(|| extract_bearer_token(&headers))
        .ok_or_else(|| {
            let mut errors = ValidationErrors::new();
            errors.add("resetToken", "Reset token is required");
            ApiError::from(errors)
        })?;

    state
        .auth_service
        .reset_password(reset_token, &body.new_password)
        .await?;
    Ok(ApiResponse::message("Password reset successfully"))
}

/// GET /api/auth/me
async fn me(State(state): State<AppState>, user: AuthenticatedUser) -> ApiResult<User> {
    let user = state.auth_service.current_user(user.id()).await?;
    Ok(ApiResponse::new("User fetched successfully", user))
}
