//! Authentication service
//!
//! Signup, email verification, login, token rotation, logout and the
//! password-reset flow. Access tokens issued before the email is verified
//! are short-lived; verifying issues a fresh full-length pair.

use anyhow::Context;
use serde::Serialize;
use std::sync::Arc;

use crate::db::repositories::UserRepository;
use crate::models::{OtpPurpose, SignupInput, User, DEFAULT_ROLE};
use crate::services::email::EmailService;
use crate::services::error::{ServiceError, ServiceResult};
use crate::services::otp::OtpService;
use crate::services::password::{hash_password, verify_password};
use crate::services::token::{TokenPair, TokenService};

/// User together with a fresh token pair
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub user: User,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

pub struct AuthService {
    user_repo: Arc<dyn UserRepository>,
    tokens: Arc<TokenService>,
    otps: Arc<OtpService>,
    email: Arc<EmailService>,
}

impl AuthService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        tokens: Arc<TokenService>,
        otps: Arc<OtpService>,
        email: Arc<EmailService>,
    ) -> Self {
        Self {
            user_repo,
            tokens,
            otps,
            email,
        }
    }

    /// Register an unverified user and email a verification code.
    ///
    /// A failed email is logged; the user can ask for a new code.
    pub async fn signup(&self, input: SignupInput) -> ServiceResult<AuthSession> {
        if self.user_repo.get_by_email(&input.email).await?.is_some() {
            return Err(ServiceError::conflict("Email is already registered"));
        }
        if self.user_repo.get_by_username(&input.username).await?.is_some() {
            return Err(ServiceError::conflict("Username is already taken"));
        }

        let password_hash = hash_password(&input.password)?;
        let mut user = User::new(
            input.email,
            input.username,
            input.first_name,
            input.last_name,
            password_hash,
        );
        user.bio = input.bio;
        user.avatar = input.avatar;
        user.expertise = input.expertise;
        user.roles = match input.roles {
            Some(roles) if !roles.is_empty() => roles,
            _ => vec![DEFAULT_ROLE.to_string()],
        };

        let user = self
            .user_repo
            .create(&user)
            .await
            .context("Failed to register user")?;

        match self.otps.issue(&user.id, OtpPurpose::EmailVerification).await {
            Ok(code) => {
                if let Err(e) = self
                    .email
                    .send_verification_code(&user.email, &user.first_name, &code)
                    .await
                {
                    tracing::warn!("Failed to send verification email to {}: {:#}", user.email, e);
                }
            }
            Err(e) => tracing::warn!("Failed to issue verification code for {}: {:#}", user.id, e),
        }

        let tokens = self.tokens.issue_pair(&user).await?;
        tracing::info!("User registered: {}", user.id);
        Ok(AuthSession { user, tokens })
    }

    /// Confirm an email verification code.
    ///
    /// The user is taken from the authenticated session when present,
    /// otherwise from `email`.
    pub async fn verify_email(
        &self,
        code: &str,
        email: Option<&str>,
        user_id: Option<&str>,
    ) -> ServiceResult<AuthSession> {
        let user = match (user_id, email) {
            (Some(id), _) => self.user_repo.get_by_id(id).await?,
            (None, Some(email)) => self.user_repo.get_by_email(email).await?,
            (None, None) => return Err(ServiceError::bad_request("Email is required")),
        }
        .ok_or_else(|| ServiceError::not_found("User not found"))?;

        if user.is_email_verified {
            return Err(ServiceError::bad_request("Email already verified"));
        }

        self.otps
            .consume(&user.id, OtpPurpose::EmailVerification, code)
            .await?;
        self.user_repo.set_email_verified(&user.id).await?;

        let mut user = user;
        user.is_email_verified = true;

        if let Err(e) = self.email.send_welcome(&user.email, &user.first_name).await {
            tracing::warn!("Failed to send welcome email to {}: {:#}", user.email, e);
        }

        let tokens = self.tokens.issue_pair(&user).await?;
        Ok(AuthSession { user, tokens })
    }

    pub async fn resend_verification(&self, email: &str) -> ServiceResult<()> {
        let user = self.require_user_by_email(email).await?;
        if user.is_email_verified {
            return Err(ServiceError::bad_request("Email already verified"));
        }

        let code = self
            .otps
            .issue(&user.id, OtpPurpose::EmailVerification)
            .await?;
        self.email
            .send_verification_code(&user.email, &user.first_name, &code)
            .await
            .map_err(|e| {
                tracing::error!("Failed to send verification email to {}: {:#}", user.email, e);
                ServiceError::internal("Failed to send email")
            })
    }

    pub async fn login(&self, email: &str, password: &str) -> ServiceResult<AuthSession> {
        let invalid = || ServiceError::unauthorized("Invalid email or password");

        let Some(user) = self.user_repo.get_by_email(email).await? else {
            tracing::warn!("Login failed for unknown email");
            return Err(invalid());
        };
        if !verify_password(password, &user.password_hash)? {
            tracing::warn!("Login failed for user {}: wrong password", user.id);
            return Err(invalid());
        }

        let tokens = self.tokens.issue_pair(&user).await?;
        tracing::info!("User logged in: {}", user.id);
        Ok(AuthSession { user, tokens })
    }

    /// Exchange a refresh token for a new pair; the old token is deleted
    pub async fn refresh(&self, refresh_token: &str) -> ServiceResult<TokenPair> {
        let user_id = self.tokens.verify_refresh_token(refresh_token).await?;
        let user = self
            .user_repo
            .get_by_id(&user_id)
            .await?
            .ok_or_else(|| ServiceError::unauthorized("Invalid refresh token"))?;

        // A concurrent rotation may have deleted the token since it was verified
        if !self.tokens.revoke_refresh_token(refresh_token).await? {
            return Err(ServiceError::unauthorized("Invalid refresh token"));
        }
        Ok(self.tokens.issue_pair(&user).await?)
    }

    pub async fn logout(&self, refresh_token: &str, user_id: &str) -> ServiceResult<()> {
        let owner = self.tokens.verify_refresh_token(refresh_token).await?;
        if owner != user_id {
            return Err(ServiceError::unauthorized("Invalid refresh token"));
        }
        self.tokens.revoke_refresh_token(refresh_token).await?;
        Ok(())
    }

    /// Revoke every refresh token of the user, returning how many were removed
    pub async fn logout_all(&self, user_id: &str) -> ServiceResult<u64> {
        Ok(self.tokens.revoke_all(user_id).await?)
    }

    pub async fn forgot_password(&self, email: &str) -> ServiceResult<()> {
        let user = self.require_user_by_email(email).await?;

        let code = self.otps.issue(&user.id, OtpPurpose::PasswordReset).await?;
        self.email
            .send_password_reset_code(&user.email, &user.first_name, &code)
            .await
            .map_err(|e| {
                tracing::error!("Failed to send reset email to {}: {:#}", user.email, e);
                ServiceError::internal("Failed to send email")
            })
    }

    /// Consume a reset code and return a password-reset token
    pub async fn verify_reset_otp(&self, email: &str, code: &str) -> ServiceResult<String> {
        let user = self.require_user_by_email(email).await?;
        self.otps
            .consume(&user.id, OtpPurpose::PasswordReset, code)
            .await?;
        Ok(self.tokens.issue_reset_token(&user)?)
    }

    /// Set a new password and sign the user out everywhere
    pub async fn reset_password(&self, reset_token: &str, new_password: &str) -> ServiceResult<()> {
        let claims = self.tokens.verify_reset_token(reset_token)?;
        let user = self
            .user_repo
            .get_by_id(&claims.id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User not found"))?;

        let password_hash = hash_password(new_password)?;
        self.user_repo
            .update_password(&user.id, &password_hash)
            .await?;
        let revoked = self.tokens.revoke_all(&user.id).await?;

        tracing::info!("Password reset for user {} ({} sessions revoked)", user.id, revoked);
        Ok(())
    }

    pub async fn current_user(&self, user_id: &str) -> ServiceResult<User> {
        self.user_repo
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User not found"))
    }

    async fn require_user_by_email(&self, email: &str) -> ServiceResult<User> {
        self.user_repo
            .get_by_email(email)
            .await?
            .ok_or_else(|| ServiceError::not_found("User not found"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthConfig;
    use crate::db::repositories::test_support::setup_test_pool;
    use crate::db::repositories::{SqlxOtpRepository, SqlxRefreshTokenRepository, SqlxUserRepository};
    use crate::services::test_support::RecordingMailer;

    struct Harness {
        auth: AuthService,
        tokens: Arc<TokenService>,
        mailer: Arc<RecordingMailer>,
    }

    async fn setup_test_service() -> Harness {
        let pool = setup_test_pool().await;
        let tokens = Arc::new(TokenService::new(
            AuthConfig::default(),
            SqlxRefreshTokenRepository::boxed(pool.clone()),
        ));
        let otps = Arc::new(OtpService::new(SqlxOtpRepository::boxed(pool.clone()), 5));
        let mailer = Arc::new(RecordingMailer::default());
        let email = Arc::new(EmailService::new(mailer.clone(), 5));
        let auth = AuthService::new(SqlxUserRepository::boxed(pool), tokens.clone(), otps, email);
        Harness { auth, tokens, mailer }
    }

    fn signup_input(username: &str) -> SignupInput {
        SignupInput {
            first_name: "Ada".to_string(),
            last_name: "Okafor".to_string(),
            username: username.to_string(),
            email: format!("{}@example.com", username),
            password: "Riverbank9".to_string(),
            bio: None,
            avatar: None,
            expertise: vec![],
            roles: None,
        }
    }

    #[tokio::test]
    async fn test_signup_sends_code_and_issues_short_token() {
        let h = setup_test_service().await;
        let session = h.auth.signup(signup_input("adaok")).await.unwrap();

        assert!(!session.user.is_email_verified);
        assert_eq!(session.user.roles, vec!["user".to_string()]);
        let claims = h.tokens.verify_access_token(&session.tokens.access_token).unwrap();
        assert_eq!(claims.exp - claims.iat, 300);

        let sent = h.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Verify Your Email Address");
        assert!(h.mailer.last_code().is_some());
    }

    #[tokio::test]
    async fn test_signup_conflicts() {
        let h = setup_test_service().await;
        h.auth.signup(signup_input("adaok")).await.unwrap();

        let err = h.auth.signup(signup_input("adaok")).await.unwrap_err();
        assert_eq!(err.status_code(), 409);

        let mut same_username = signup_input("adaok");
        same_username.email = "other@example.com".to_string();
        let err = h.auth.signup(same_username).await.unwrap_err();
        assert_eq!(err.status_code(), 409);
    }

    #[tokio::test]
    async fn test_verify_email_flow() {
        let h = setup_test_service().await;
        let session = h.auth.signup(signup_input("adaok")).await.unwrap();
        let code = h.mailer.last_code().unwrap();

        let verified = h
            .auth
            .verify_email(&code, Some("adaok@example.com"), None)
            .await
            .unwrap();
        assert!(verified.user.is_email_verified);
        let claims = h.tokens.verify_access_token(&verified.tokens.access_token).unwrap();
        assert_eq!(claims.exp - claims.iat, 86400);
        assert_eq!(h.mailer.sent().last().unwrap().subject, "Welcome to FloodWatch");

        let err = h
            .auth
            .verify_email(&code, None, Some(&session.user.id))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Email already verified");
    }

    #[tokio::test]
    async fn test_verify_email_wrong_code() {
        let h = setup_test_service().await;
        h.auth.signup(signup_input("adaok")).await.unwrap();
        let code = h.mailer.last_code().unwrap();
        let wrong = if code == "1000" { "1001" } else { "1000" };

        let err = h
            .auth
            .verify_email(wrong, Some("adaok@example.com"), None)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.to_string(), "Invalid OTP");
    }

    #[tokio::test]
    async fn test_login() {
        let h = setup_test_service().await;
        h.auth.signup(signup_input("adaok")).await.unwrap();

        let session = h.auth.login("adaok@example.com", "Riverbank9").await.unwrap();
        assert_eq!(session.user.username, "adaok");

        let err = h.auth.login("adaok@example.com", "Wrongpass1").await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid email or password");
        let err = h.auth.login("nobody@example.com", "Riverbank9").await.unwrap_err();
        assert_eq!(err.status_code(), 401);
    }

    #[tokio::test]
    async fn test_refresh_rotates_token() {
        let h = setup_test_service().await;
        let session = h.auth.signup(signup_input("adaok")).await.unwrap();

        let rotated = h.auth.refresh(&session.tokens.refresh_token).await.unwrap();
        assert_ne!(rotated.refresh_token, session.tokens.refresh_token);

        let err = h.auth.refresh(&session.tokens.refresh_token).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid refresh token");
        assert!(h.auth.refresh(&rotated.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_refresh_rotates_once() {
        let h = setup_test_service().await;
        let session = h.auth.signup(signup_input("adaok")).await.unwrap();
        let token = session.tokens.refresh_token;

        let (first, second) = tokio::join!(h.auth.refresh(&token), h.auth.refresh(&token));
        assert_eq!(
            [first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count(),
            1
        );
        let err = first.err().or(second.err()).unwrap();
        assert_eq!(err.status_code(), 401);
        assert_eq!(err.to_string(), "Invalid refresh token");
    }

    #[tokio::test]
    async fn test_logout_checks_owner() {
        let h = setup_test_service().await;
        let ada = h.auth.signup(signup_input("adaok")).await.unwrap();
        let ben = h.auth.signup(signup_input("benmo")).await.unwrap();

        let err = h
            .auth
            .logout(&ada.tokens.refresh_token, &ben.user.id)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 401);

        h.auth.logout(&ada.tokens.refresh_token, &ada.user.id).await.unwrap();
        assert!(h.auth.refresh(&ada.tokens.refresh_token).await.is_err());
    }

    #[tokio::test]
    async fn test_logout_all() {
        let h = setup_test_service().await;
        let session = h.auth.signup(signup_input("adaok")).await.unwrap();
        h.auth.login("adaok@example.com", "Riverbank9").await.unwrap();

        assert_eq!(h.auth.logout_all(&session.user.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_password_reset_flow() {
        let h = setup_test_service().await;
        let session = h.auth.signup(signup_input("adaok")).await.unwrap();

        h.auth.forgot_password("adaok@example.com").await.unwrap();
        assert_eq!(h.mailer.sent().last().unwrap().subject, "Reset Your Password");
        let code = h.mailer.last_code().unwrap();

        let reset_token = h
            .auth
            .verify_reset_otp("adaok@example.com", &code)
            .await
            .unwrap();
        h.auth.reset_password(&reset_token, "NewRiver22").await.unwrap();

        assert!(h.auth.login("adaok@example.com", "Riverbank9").await.is_err());
        assert!(h.auth.login("adaok@example.com", "NewRiver22").await.is_ok());
        // Existing sessions were revoked
        assert!(h.auth.refresh(&session.tokens.refresh_token).await.is_err());
    }

    #[tokio::test]
    async fn test_forgot_password_unknown_email() {
        let h = setup_test_service().await;
        let err = h.auth.forgot_password("nobody@example.com").await.unwrap_err();
        assert_eq!(err.status_code(), 404);
        assert_eq!(err.to_string(), "User not found");
    }

    #[tokio::test]
    async fn test_reset_password_rejects_session_token() {
        let h = setup_test_service().await;
        let session = h.auth.signup(signup_input("adaok")).await.unwrap();

        let err = h
            .auth
            .reset_password(&session.tokens.access_token, "NewRiver22")
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 401);
    }

    #[tokio::test]
    async fn test_resend_verification() {
        let h = setup_test_service().await;
        h.auth.signup(signup_input("adaok")).await.unwrap();

        h.auth.resend_verification("adaok@example.com").await.unwrap();
        assert_eq!(h.mailer.sent().len(), 2);

        let err = h.auth.resend_verification("nobody@example.com").await.unwrap_err();
        assert_eq!(err.status_code(), 404);
    }
}
