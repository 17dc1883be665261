//! Credential records and authentication request bodies

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::validation::{char_len, check_email, check_password, Validate, ValidationErrors};

/// Server-side refresh token record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshToken {
    pub id: String,
    /// Opaque value handed to the client
    pub token: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl RefreshToken {
    /// Check if the token has expired
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

/// What an OTP was issued for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpPurpose {
    EmailVerification,
    PasswordReset,
}

impl OtpPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpPurpose::EmailVerification => "email_verification",
            OtpPurpose::PasswordReset => "password_reset",
        }
    }
}

impl fmt::Display for OtpPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OtpPurpose {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email_verification" => Ok(OtpPurpose::EmailVerification),
            "password_reset" => Ok(OtpPurpose::PasswordReset),
            _ => Err(anyhow::anyhow!("Invalid OTP purpose: {}", s)),
        }
    }
}

/// Stored one-time code. Only the hash of the code is kept.
#[derive(Debug, Clone)]
pub struct Otp {
    pub id: String,
    pub user_id: String,
    pub otp_hash: String,
    pub purpose: OtpPurpose,
    /// Cleared once the code is used or superseded
    pub is_active: bool,
    pub expires_at: DateTime<Utc>,
    pub requested_at: DateTime<Utc>,
}

impl Otp {
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

impl Validate for LoginInput {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_email(&mut errors, "email", &self.email);
        errors.check(self.password.is_empty(), "password", "Password is required");
        errors.into_result()
    }
}

/// Email verification body; the user comes from `email` or the bearer token
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyEmailInput {
    pub code: String,
    pub email: Option<String>,
}

impl Validate for VerifyEmailInput {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_code(&mut errors, &self.code);
        if let Some(email) = &self.email {
            check_email(&mut errors, "email", email);
        }
        errors.into_result()
    }
}

/// Body carrying only an email (resend code, forgot password)
#[derive(Debug, Clone, Deserialize)]
pub struct EmailInput {
    pub email: String,
}

impl Validate for EmailInput {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_email(&mut errors, "email", &self.email);
        errors.into_result()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyResetOtpInput {
    pub email: String,
    pub code: String,
}

impl Validate for VerifyResetOtpInput {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_email(&mut errors, "email", &self.email);
        check_code(&mut errors, &self.code);
        errors.into_result()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordInput {
    /// May instead arrive as a bearer token
    pub reset_token: Option<String>,
    pub new_password: String,
    pub confirm_password: String,
}

impl Validate for ResetPasswordInput {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_password(&mut errors, "newPassword", &self.new_password);
        errors.check(
            self.new_password != self.confirm_password,
            "confirmPassword",
            "Passwords don't match",
        );
        errors.into_result()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenInput {
    pub refresh_token: String,
}

impl Validate for RefreshTokenInput {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.check(
            self.refresh_token.trim().is_empty(),
            "refreshToken",
            "Refresh token is required",
        );
        errors.into_result()
    }
}

fn check_code(errors: &mut ValidationErrors, code: &str) {
    errors.check(char_len(code) != 4, "code", "Verification code must be 4 digits");
}
