//! User model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::validation::{char_len, check_email, check_password, is_valid_url, Validate, ValidationErrors};

/// Role assigned when the client does not ask for any
pub const DEFAULT_ROLE: &str = "user";

/// Registered platform user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique identifier (UUID v4)
    pub id: String,
    /// Email address (unique)
    pub email: String,
    /// Username (unique)
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    /// Password hash (argon2)
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub bio: Option<String>,
    /// Avatar URL
    pub avatar: Option<String>,
    pub expertise: Vec<String>,
    pub roles: Vec<String>,
    /// Set once the emailed verification code has been confirmed
    pub is_email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new, unverified user.
    ///
    /// The password must already be hashed with `services::password::hash_password`.
    pub fn new(
        email: String,
        username: String,
        first_name: String,
        last_name: String,
        password_hash: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            email,
            username,
            first_name,
            last_name,
            password_hash,
            bio: None,
            avatar: None,
            expertise: Vec::new(),
            roles: vec![DEFAULT_ROLE.to_string()],
            is_email_verified: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Public profile embedded in blog and feedback responses
    pub fn summary(&self) -> AuthorSummary {
        AuthorSummary {
            id: self.id.clone(),
            username: self.username.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            avatar: self.avatar.clone(),
            bio: self.bio.clone(),
            expertise: self.expertise.clone(),
        }
    }
}

/// Public profile of a resource owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorSummary {
    pub id: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub expertise: Vec<String>,
}

/// Signup request body
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupInput {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub bio: Option<String>,
    pub avatar: Option<String>,
    #[serde(default)]
    pub expertise: Vec<String>,
    pub roles: Option<Vec<String>>,
}

impl Validate for SignupInput {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_names(&mut errors, Some(&self.first_name), Some(&self.last_name));
        check_username(&mut errors, &self.username);
        check_email(&mut errors, "email", &self.email);
        check_password(&mut errors, "password", &self.password);
        check_profile(&mut errors, self.bio.as_deref(), self.avatar.as_deref(), Some(&self.expertise));
        errors.into_result()
    }
}

/// Profile update request body; every field is optional
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserInput {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
    pub expertise: Option<Vec<String>>,
    pub roles: Option<Vec<String>>,
}

impl UpdateUserInput {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.username.is_none()
            && self.email.is_none()
            && self.password.is_none()
            && self.bio.is_none()
            && self.avatar.is_none()
            && self.expertise.is_none()
            && self.roles.is_none()
    }
}

impl Validate for UpdateUserInput {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.is_empty() {
            errors.add("body", "At least one field must be provided for update");
            return Err(errors);
        }
        check_names(&mut errors, self.first_name.as_deref(), self.last_name.as_deref());
        if let Some(username) = &self.username {
            check_username(&mut errors, username);
        }
        if let Some(email) = &self.email {
            check_email(&mut errors, "email", email);
        }
        if let Some(password) = &self.password {
            check_password(&mut errors, "password", password);
        }
        check_profile(&mut errors, self.bio.as_deref(), self.avatar.as_deref(), self.expertise.as_ref());
        errors.into_result()
    }
}

fn check_names(errors: &mut ValidationErrors, first: Option<&str>, last: Option<&str>) {
    if let Some(first) = first {
        errors.check(char_len(first) < 2, "firstName", "First name must be at least 2 characters");
    }
    if let Some(last) = last {
        errors.check(char_len(last) < 2, "lastName", "Last name must be at least 2 characters");
    }
}

fn check_username(errors: &mut ValidationErrors, username: &str) {
    errors.check(char_len(username) < 3, "username", "Username must be at least 3 characters");
}

fn check_profile(
    errors: &mut ValidationErrors,
    bio: Option<&str>,
    avatar: Option<&str>,
    expertise: Option<&Vec<String>>,
) {
    if let Some(bio) = bio {
        errors.check(char_len(bio) > 500, "bio", "Bio must not exceed 500 characters");
    }
    if let Some(avatar) = avatar {
        errors.check(!is_valid_url(avatar), "avatar", "Avatar must be a valid URL");
    }
    if let Some(expertise) = expertise {
        errors.check(expertise.len() > 10, "expertise", "Maximum 10 expertise areas allowed");
        errors.check(
            expertise.iter().any(|e| e.is_empty()),
            "expertise",
            "Expertise items cannot be empty",
        );
    }
}
