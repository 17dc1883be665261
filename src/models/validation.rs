//! Request body validation
//!
//! Request DTOs implement [`Validate`]; every failing rule is collected so
//! the client sees all problems at once.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"));

/// A single failed rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// All failed rules for one request body
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failed rule
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Record a failed rule when `failed` is true
    pub fn check(&mut self, failed: bool, field: &str, message: &str) {
        if failed {
            self.add(field, message);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    /// Whether any rule failed for `field`
    pub fn has_field(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }

    /// `Ok(())` when nothing was recorded
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.0.iter().map(|e| e.message.as_str()).collect();
        write!(f, "{}", messages.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Implemented by every request body accepted by the API
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationErrors>;
}

/// Length in characters, not bytes
pub fn char_len(value: &str) -> usize {
    value.chars().count()
}

pub fn is_valid_email(value: &str) -> bool {
    EMAIL_RE.is_match(value)
}

pub fn is_valid_url(value: &str) -> bool {
    reqwest::Url::parse(value).is_ok()
}

/// Apply the password strength rules to `field`
pub fn check_password(errors: &mut ValidationErrors, field: &str, password: &str) {
    errors.check(
        char_len(password) < 8,
        field,
        "Password must be at least 8 characters",
    );
    errors.check(
        !password.chars().any(|c| c.is_ascii_uppercase()),
        field,
        "Password must contain at least one uppercase letter",
    );
    errors.check(
        !password.chars().any(|c| c.is_ascii_lowercase()),
        field,
        "Password must contain at least one lowercase letter",
    );
    errors.check(
        !password.chars().any(|c| c.is_ascii_digit()),
        field,
        "Password must contain at least one number",
    );
}

/// Apply the email format rule to `field`
pub fn check_email(errors: &mut ValidationErrors, field: &str, email: &str) {
    errors.check(!is_valid_email(email), field, "Invalid email address");
}
