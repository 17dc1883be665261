//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles CRUD operations for a specific entity.

pub mod blog;
pub mod feedback;
pub mod otp;
pub mod prediction_history;
pub mod refresh_token;
pub mod user;

pub use blog::{BlogRepository, SqlxBlogRepository};
pub use feedback::{FeedbackRepository, SqlxFeedbackRepository};
pub use otp::{OtpRepository, SqlxOtpRepository};
pub use prediction_history::{PredictionHistoryRepository, SqlxPredictionHistoryRepository};
pub use refresh_token::{RefreshTokenRepository, SqlxRefreshTokenRepository};
pub use user::{SqlxUserRepository, UserRepository};

use crate::models::AuthorSummary;
use anyhow::{Context, Result};
use sqlx::Row;

/// Owner profile columns selected from a joined `users u`
pub(crate) const OWNER_COLUMNS: &str = "u.id AS owner_id, u.username AS owner_username, \
     u.first_name AS owner_first_name, u.last_name AS owner_last_name, \
     u.avatar AS owner_avatar, u.bio AS owner_bio, u.expertise AS owner_expertise";

pub(crate) fn encode_list(values: &[String]) -> Result<String> {
    serde_json::to_string(values).context("Failed to encode list column")
}

pub(crate) fn decode_list(raw: &str) -> Result<Vec<String>> {
    serde_json::from_str(raw).context("Failed to decode list column")
}

pub(crate) fn owner_summary_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<AuthorSummary> {
    let expertise: String = row.get("owner_expertise");
    Ok(AuthorSummary {
        id: row.get("owner_id"),
        username: row.get("owner_username"),
        first_name: row.get("owner_first_name"),
        last_name: row.get("owner_last_name"),
        avatar: row.get("owner_avatar"),
        bio: row.get("owner_bio"),
        expertise: decode_list(&expertise)?,
    })
}

pub(crate) fn owner_summary_mysql(row: &sqlx::mysql::MySqlRow) -> Result<AuthorSummary> {
    let expertise: String = row.get("owner_expertise");
    Ok(AuthorSummary {
        id: row.get("owner_id"),
        username: row.get("owner_username"),
        first_name: row.get("owner_first_name"),
        last_name: row.get("owner_last_name"),
        avatar: row.get("owner_avatar"),
        bio: row.get("owner_bio"),
        expertise: decode_list(&expertise)?,
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::User;

    pub async fn setup_test_pool() -> DynDatabasePool {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        pool
    }

    /// Insert a user to satisfy foreign keys
    pub async fn insert_test_user(pool: &DynDatabasePool, username: &str) -> User {
        let user = User::new(
            format!("{}@example.com", username),
            username.to_string(),
            "Test".to_string(),
            "User".to_string(),
            "hash".to_string(),
        );
        SqlxUserRepository::new(pool.clone())
            .create(&user)
            .await
            .expect("Failed to create test user")
    }
}
