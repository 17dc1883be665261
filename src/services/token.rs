//! Token service
//!
//! Issues and verifies the three credentials of the auth flow:
//! - session access tokens (JWT HS256, short-lived until the email is verified)
//! - password-reset tokens (JWT HS256)
//! - opaque refresh tokens stored server-side

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::db::repositories::RefreshTokenRepository;
use crate::models::{RefreshToken, User};
use crate::services::error::{ServiceError, ServiceResult};

/// What a JWT may be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    Session,
    PasswordReset,
}

/// Claims of a session access token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub id: String,
    pub email: String,
    pub username: String,
    pub roles: Vec<String>,
    #[serde(rename = "isVerified")]
    pub is_verified: bool,
    pub purpose: TokenPurpose,
    pub iat: i64,
    pub exp: i64,
}

/// Claims of a password-reset token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PasswordResetClaims {
    pub id: String,
    pub email: String,
    pub purpose: TokenPurpose,
    pub iat: i64,
    pub exp: i64,
}

/// Access and refresh token handed to the client
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

pub struct TokenService {
    config: AuthConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    refresh_repo: Arc<dyn RefreshTokenRepository>,
}

impl TokenService {
    pub fn new(config: AuthConfig, refresh_repo: Arc<dyn RefreshTokenRepository>) -> Self {
        let encoding_key = EncodingKey::from_secret(config.jwt_secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());

        Self {
            config,
            encoding_key,
            decoding_key,
            refresh_repo,
        }
    }

    /// Session token; its lifetime depends on whether the email is verified
    pub fn issue_access_token(&self, user: &User) -> Result<String> {
        let ttl = if user.is_email_verified {
            self.config.verified_token_ttl_secs
        } else {
            self.config.unverified_token_ttl_secs
        };
        let now = Utc::now().timestamp();

        let claims = SessionClaims {
            id: user.id.clone(),
            email: user.email.clone(),
            username: user.username.clone(),
            roles: user.roles.clone(),
            is_verified: user.is_email_verified,
            purpose: TokenPurpose::Session,
            iat: now,
            exp: now + ttl as i64,
        };
        self.sign(&claims).context("Failed to generate access token")
    }

    pub fn verify_access_token(&self, token: &str) -> ServiceResult<SessionClaims> {
        self.decode::<SessionClaims>(token)
            .filter(|claims| claims.purpose == TokenPurpose::Session)
            .ok_or_else(|| ServiceError::unauthorized("Invalid or expired token"))
    }

    pub fn issue_reset_token(&self, user: &User) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = PasswordResetClaims {
            id: user.id.clone(),
            email: user.email.clone(),
            purpose: TokenPurpose::PasswordReset,
            iat: now,
            exp: now + self.config.password_reset_token_ttl_secs as i64,
        };
        self.sign(&claims).context("Failed to generate reset token")
    }

    pub fn verify_reset_token(&self, token: &str) -> ServiceResult<PasswordResetClaims> {
        self.decode::<PasswordResetClaims>(token)
            .filter(|claims| claims.purpose == TokenPurpose::PasswordReset)
            .ok_or_else(|| ServiceError::unauthorized("Invalid or expired reset token"))
    }

    /// Store a fresh opaque refresh token for the user
    pub async fn issue_refresh_token(&self, user_id: &str) -> Result<RefreshToken> {
        let now = Utc::now();
        let token = RefreshToken {
            id: Uuid::new_v4().to_string(),
            token: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            expires_at: now + Duration::days(self.config.refresh_token_ttl_days as i64),
            created_at: now,
        };
        self.refresh_repo.create(&token).await
    }

    /// Resolve a refresh token to its owner. Expired tokens are deleted.
    pub async fn verify_refresh_token(&self, token: &str) -> ServiceResult<String> {
        let stored = self
            .refresh_repo
            .get_by_token(token)
            .await?
            .ok_or_else(|| ServiceError::unauthorized("Invalid refresh token"))?;

        if stored.is_expired() {
            self.refresh_repo.delete_by_token(token).await?;
            return Err(ServiceError::unauthorized("Refresh token expired"));
        }

        Ok(stored.user_id)
    }

    pub async fn issue_pair(&self, user: &User) -> Result<TokenPair> {
        let access_token = self.issue_access_token(user)?;
        let refresh = self.issue_refresh_token(&user.id).await?;
        Ok(TokenPair {
            access_token,
            refresh_token: refresh.token,
        })
    }

    pub async fn revoke_refresh_token(&self, token: &str) -> Result<bool> {
        self.refresh_repo.delete_by_token(token).await
    }

    pub async fn revoke_all(&self, user_id: &str) -> Result<u64> {
        self.refresh_repo.delete_by_user(user_id).await
    }

    pub async fn purge_expired(&self) -> Result<u64> {
        self.refresh_repo.delete_expired().await
    }

    fn sign<T: Serialize>(&self, claims: &T) -> Result<String> {
        Ok(encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)?)
    }

    fn decode<T: DeserializeOwned>(&self, token: &str) -> Option<T> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iat"]);

        match decode::<T>(token, &self.decoding_key, &validation) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                tracing::debug!("Rejected token: {}", e);
                None
            }
        }
    }
}
