//! Blog model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::AuthorSummary;
use super::validation::{char_len, Validate, ValidationErrors};

/// Blog post owned by its author.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blog {
    pub id: String,
    pub title: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub tags: Vec<String>,
    /// Estimated reading time in minutes
    pub read_time: Option<f64>,
    pub author_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Blog {
    pub fn new(author_id: &str, input: CreateBlogInput) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title: input.title,
            content: input.content,
            excerpt: input.excerpt,
            tags: input.tags,
            read_time: input.read_time,
            author_id: author_id.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.author_id == user_id
    }

    /// Overwrite the fields present in `input` and bump `updated_at`
    pub fn apply(&mut self, input: UpdateBlogInput) {
        if let Some(title) = input.title {
            self.title = title;
        }
        if let Some(content) = input.content {
            self.content = content;
        }
        if let Some(excerpt) = input.excerpt {
            self.excerpt = Some(excerpt);
        }
        if let Some(tags) = input.tags {
            self.tags = tags;
        }
        if let Some(read_time) = input.read_time {
            self.read_time = Some(read_time);
        }
        self.updated_at = Utc::now();
    }
}

/// Blog together with its author's public profile
#[derive(Debug, Clone, Serialize)]
pub struct BlogWithAuthor {
    #[serde(flatten)]
    pub blog: Blog,
    pub author: AuthorSummary,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBlogInput {
    pub title: String,
    pub content: String,
    pub excerpt: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub read_time: Option<f64>,
}

impl Validate for CreateBlogInput {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_title(&mut errors, &self.title);
        check_content(&mut errors, &self.content);
        check_optional(&mut errors, self.excerpt.as_deref(), self.read_time);
        errors.check(
            self.tags.iter().any(|t| t.is_empty()),
            "tags",
            "Tag must be at least 1 character",
        );
        errors.check(
            self.tags.iter().any(|t| char_len(t) > 50),
            "tags",
            "Tag must not exceed 50 characters",
        );
        errors.into_result()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBlogInput {
    pub title: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub tags: Option<Vec<String>>,
    pub read_time: Option<f64>,
}

impl UpdateBlogInput {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.excerpt.is_none()
            && self.tags.is_none()
            && self.read_time.is_none()
    }
}

impl Validate for UpdateBlogInput {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.is_empty() {
            errors.add("body", "At least one field must be provided for update");
            return Err(errors);
        }
        if let Some(title) = &self.title {
            check_title(&mut errors, title);
        }
        if let Some(content) = &self.content {
            check_content(&mut errors, content);
        }
        check_optional(&mut errors, self.excerpt.as_deref(), self.read_time);
        if let Some(tags) = &self.tags {
            errors.check(tags.len() > 10, "tags", "You can add up to 10 tags");
        }
        errors.into_result()
    }
}

fn check_title(errors: &mut ValidationErrors, title: &str) {
    let len = char_len(title);
    errors.check(len < 3, "title", "Title must be at least 3 characters");
    errors.check(len > 200, "title", "Title must not exceed 200 characters");
}

fn check_content(errors: &mut ValidationErrors, content: &str) {
    errors.check(
        char_len(content) < 10,
        "content",
        "Content must be at least 10 characters",
    );
}

fn check_optional(errors: &mut ValidationErrors, excerpt: Option<&str>, read_time: Option<f64>) {
    if let Some(excerpt) = excerpt {
        errors.check(
            char_len(excerpt) > 500,
            "excerpt",
            "Excerpt must not exceed 500 characters",
        );
    }
    if let Some(read_time) = read_time {
        errors.check(read_time < 1.0, "readTime", "Read time must be at least 1 minute");
    }
}
