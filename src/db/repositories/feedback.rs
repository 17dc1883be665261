//! Feedback repository

use super::{owner_summary_mysql, owner_summary_sqlite, OWNER_COLUMNS};
use crate::db::{Backend, DynDatabasePool};
use crate::models::{Feedback, FeedbackWithUser, ListParams};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Feedback repository trait
#[async_trait]
pub trait FeedbackRepository: Send + Sync {
    async fn create(&self, feedback: &Feedback) -> Result<Feedback>;

    async fn get_by_id(&self, id: &str) -> Result<Option<Feedback>>;

    /// Get feedback by ID together with its owner
    async fn get_with_user(&self, id: &str) -> Result<Option<FeedbackWithUser>>;

    /// List feedback newest first, optionally restricted to one user
    async fn list(&self, params: &ListParams, user_id: Option<&str>)
        -> Result<Vec<FeedbackWithUser>>;

    async fn count(&self, user_id: Option<&str>) -> Result<i64>;

    async fn update(&self, feedback: &Feedback) -> Result<Feedback>;

    /// Delete feedback, returning whether it existed
    async fn delete(&self, id: &str) -> Result<bool>;
}

/// SQLx-based feedback repository implementation
pub struct SqlxFeedbackRepository {
    pool: DynDatabasePool,
}

impl SqlxFeedbackRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn FeedbackRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl FeedbackRepository for SqlxFeedbackRepository {
    async fn create(&self, feedback: &Feedback) -> Result<Feedback> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => create_feedback_sqlite(pool, feedback).await,
            Backend::Mysql(pool) => create_feedback_mysql(pool, feedback).await,
        }
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Feedback>> {
        Ok(self.get_with_user(id).await?.map(|f| f.feedback))
    }

    async fn get_with_user(&self, id: &str) -> Result<Option<FeedbackWithUser>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => get_feedback_sqlite(pool, id).await,
            Backend::Mysql(pool) => get_feedback_mysql(pool, id).await,
        }
    }

    async fn list(
        &self,
        params: &ListParams,
        user_id: Option<&str>,
    ) -> Result<Vec<FeedbackWithUser>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => list_feedback_sqlite(pool, params, user_id).await,
            Backend::Mysql(pool) => list_feedback_mysql(pool, params, user_id).await,
        }
    }

    async fn count(&self, user_id: Option<&str>) -> Result<i64> {
        let sql = match user_id {
            Some(_) => "SELECT COUNT(*) FROM feedback WHERE user_id = ?",
            None => "SELECT COUNT(*) FROM feedback",
        };
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let mut query = sqlx::query_scalar::<_, i64>(sql);
                if let Some(user_id) = user_id {
                    query = query.bind(user_id);
                }
                query.fetch_one(pool).await
            }
            Backend::Mysql(pool) => {
                let mut query = sqlx::query_scalar::<_, i64>(sql);
                if let Some(user_id) = user_id {
                    query = query.bind(user_id);
                }
                query.fetch_one(pool).await
            }
        }
        .context("Failed to count feedback")
    }

    async fn update(&self, feedback: &Feedback) -> Result<Feedback> {
        let sql = "UPDATE feedback SET content = ?, updated_at = ? WHERE id = ?";
        match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(&feedback.content)
                .bind(feedback.updated_at)
                .bind(&feedback.id)
                .execute(pool)
                .await
                .map(|_| ()),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(&feedback.content)
                .bind(feedback.updated_at)
                .bind(&feedback.id)
                .execute(pool)
                .await
                .map(|_| ()),
        }
        .context("Failed to update feedback")?;

        Ok(feedback.clone())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query("DELETE FROM feedback WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete feedback")?
                .rows_affected(),
            Backend::Mysql(pool) => sqlx::query("DELETE FROM feedback WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete feedback")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }
}

fn select_sql(filter: &str, paged: bool) -> String {
    let mut sql = format!(
        "SELECT f.id, f.content, f.user_id, f.created_at, f.updated_at, {} \
         FROM feedback f INNER JOIN users u ON u.id = f.user_id",
        OWNER_COLUMNS
    );
    if !filter.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(filter);
    }
    if paged {
        sql.push_str(" ORDER BY f.created_at DESC LIMIT ? OFFSET ?");
    }
    sql
}

const INSERT_SQL: &str =
    "INSERT INTO feedback (id, content, user_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?)";

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_feedback_sqlite(pool: &SqlitePool, feedback: &Feedback) -> Result<Feedback> {
    sqlx::query(INSERT_SQL)
        .bind(&feedback.id)
        .bind(&feedback.content)
        .bind(&feedback.user_id)
        .bind(feedback.created_at)
        .bind(feedback.updated_at)
        .execute(pool)
        .await
        .context("Failed to create feedback")?;

    Ok(feedback.clone())
}

async fn get_feedback_sqlite(pool: &SqlitePool, id: &str) -> Result<Option<FeedbackWithUser>> {
    let row = sqlx::query(&select_sql("f.id = ?", false))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get feedback by ID")?;

    row.as_ref().map(row_to_feedback_sqlite).transpose()
}

async fn list_feedback_sqlite(
    pool: &SqlitePool,
    params: &ListParams,
    user_id: Option<&str>,
) -> Result<Vec<FeedbackWithUser>> {
    let rows = match user_id {
        Some(user_id) => {
            sqlx::query(&select_sql("f.user_id = ?", true))
                .bind(user_id)
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(pool)
                .await
        }
        None => {
            sqlx::query(&select_sql("", true))
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(pool)
                .await
        }
    }
    .context("Failed to list feedback")?;

    rows.iter().map(row_to_feedback_sqlite).collect()
}

fn row_to_feedback_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<FeedbackWithUser> {
    Ok(FeedbackWithUser {
        feedback: Feedback {
            id: row.get("id"),
            content: row.get("content"),
            user_id: row.get("user_id"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        },
        user: owner_summary_sqlite(row)?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_feedback_mysql(pool: &MySqlPool, feedback: &Feedback) -> Result<Feedback> {
    sqlx::query(INSERT_SQL)
        .bind(&feedback.id)
        .bind(&feedback.content)
        .bind(&feedback.user_id)
        .bind(feedback.created_at)
        .bind(feedback.updated_at)
        .execute(pool)
        .await
        .context("Failed to create feedback")?;

    Ok(feedback.clone())
}

async fn get_feedback_mysql(pool: &MySqlPool, id: &str) -> Result<Option<FeedbackWithUser>> {
    let row = sqlx::query(&select_sql("f.id = ?", false))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get feedback by ID")?;

    row.as_ref().map(row_to_feedback_mysql).transpose()
}

async fn list_feedback_mysql(
    pool: &MySqlPool,
    params: &ListParams,
    user_id: Option<&str>,
) -> Result<Vec<FeedbackWithUser>> {
    let rows = match user_id {
        Some(user_id) => {
            sqlx::query(&select_sql("f.user_id = ?", true))
                .bind(user_id)
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(pool)
                .await
        }
        None => {
            sqlx::query(&select_sql("", true))
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(pool)
                .await
        }
    }
    .context("Failed to list feedback")?;

    rows.iter().map(row_to_feedback_mysql).collect()
}

fn row_to_feedback_mysql(row: &sqlx::mysql::MySqlRow) -> Result<FeedbackWithUser> {
    Ok(FeedbackWithUser {
        feedback: Feedback {
            id: row.get("id"),
            content: row.get("content"),
            user_id: row.get("user_id"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        },
        user: owner_summary_mysql(row)?,
    })
}
