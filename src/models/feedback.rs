//! Feedback model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::AuthorSummary;
use super::validation::{char_len, Validate, ValidationErrors};

/// Free-text feedback owned by the user who wrote it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub id: String,
    pub content: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Feedback {
    pub fn new(user_id: &str, content: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            content,
            user_id: user_id.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }
}

/// Feedback together with its owner's public profile
#[derive(Debug, Clone, Serialize)]
pub struct FeedbackWithUser {
    #[serde(flatten)]
    pub feedback: Feedback,
    pub user: AuthorSummary,
}

/// Body for both creating and updating feedback
#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackInput {
    pub content: String,
}

impl Validate for FeedbackInput {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let len = char_len(&self.content);
        errors.check(len < 5, "content", "Feedback must be at least 5 characters");
        errors.check(len > 1000, "content", "Feedback must not exceed 1000 characters");
        errors.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_bounds() {
        let ok = FeedbackInput { content: "Great alerts".into() };
        assert!(ok.validate().is_ok());

        let short = FeedbackInput { content: "ok".into() };
        assert!(short.validate().is_err());

        let long = FeedbackInput { content: "a".repeat(1001) };
        assert!(long.validate().is_err());

        let edge = FeedbackInput { content: "a".repeat(1000) };
        assert!(edge.validate().is_ok());
    }

    #[test]
    fn test_ownership() {
        let feedback = Feedback::new("user-1", "Useful maps".into());
        assert!(feedback.is_owned_by("user-1"));
        assert!(!feedback.is_owned_by("user-2"));
    }
}
