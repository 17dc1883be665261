//! Refresh token repository
//!
//! Server-side storage for the opaque refresh tokens handed out at login.
//! A token is valid while its row exists and `expires_at` is in the future.

use crate::db::{Backend, DynDatabasePool};
use crate::models::RefreshToken;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Refresh token repository trait
#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    /// Store a new token
    async fn create(&self, token: &RefreshToken) -> Result<RefreshToken>;

    /// Look up a token by its opaque value
    async fn get_by_token(&self, token: &str) -> Result<Option<RefreshToken>>;

    /// Delete one token, returning whether it existed
    async fn delete_by_token(&self, token: &str) -> Result<bool>;

    /// Delete every token of a user, returning how many were removed
    async fn delete_by_user(&self, user_id: &str) -> Result<u64>;

    /// Purge expired tokens
    async fn delete_expired(&self) -> Result<u64>;
}

/// SQLx-based refresh token repository implementation
pub struct SqlxRefreshTokenRepository {
    pool: DynDatabasePool,
}

impl SqlxRefreshTokenRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn RefreshTokenRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl RefreshTokenRepository for SqlxRefreshTokenRepository {
    async fn create(&self, token: &RefreshToken) -> Result<RefreshToken> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => create_token_sqlite(pool, token).await,
            Backend::Mysql(pool) => create_token_mysql(pool, token).await,
        }
    }

    async fn get_by_token(&self, token: &str) -> Result<Option<RefreshToken>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => get_token_sqlite(pool, token).await,
            Backend::Mysql(pool) => get_token_mysql(pool, token).await,
        }
    }

    async fn delete_by_token(&self, token: &str) -> Result<bool> {
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => {
                delete_where_sqlite(pool, "DELETE FROM refresh_tokens WHERE token = ?", token).await?
            }
            Backend::Mysql(pool) => {
                delete_where_mysql(pool, "DELETE FROM refresh_tokens WHERE token = ?", token).await?
            }
        };
        Ok(affected > 0)
    }

    async fn delete_by_user(&self, user_id: &str) -> Result<u64> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                delete_where_sqlite(pool, "DELETE FROM refresh_tokens WHERE user_id = ?", user_id).await
            }
            Backend::Mysql(pool) => {
                delete_where_mysql(pool, "DELETE FROM refresh_tokens WHERE user_id = ?", user_id).await
            }
        }
    }

    async fn delete_expired(&self) -> Result<u64> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => delete_expired_sqlite(pool).await,
            Backend::Mysql(pool) => delete_expired_mysql(pool).await,
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_token_sqlite(pool: &SqlitePool, token: &RefreshToken) -> Result<RefreshToken> {
    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (id, token, user_id, expires_at, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&token.id)
    .bind(&token.token)
    .bind(&token.user_id)
    .bind(token.expires_at)
    .bind(token.created_at)
    .execute(pool)
    .await
    .context("Failed to create refresh token")?;

    Ok(token.clone())
}

async fn get_token_sqlite(pool: &SqlitePool, token: &str) -> Result<Option<RefreshToken>> {
    let row = sqlx::query(
        r#"
        SELECT id, token, user_id, expires_at, created_at
        FROM refresh_tokens
        WHERE token = ?
        "#,
    )
    .bind(token)
    .fetch_optional(pool)
    .await
    .context("Failed to get refresh token")?;

    Ok(row.map(|row| RefreshToken {
        id: row.get("id"),
        token: row.get("token"),
        user_id: row.get("user_id"),
        expires_at: row.get("expires_at"),
        created_at: row.get("created_at"),
    }))
}

async fn delete_where_sqlite(pool: &SqlitePool, sql: &str, value: &str) -> Result<u64> {
    let result = sqlx::query(sql)
        .bind(value)
        .execute(pool)
        .await
        .context("Failed to delete refresh tokens")?;

    Ok(result.rows_affected())
}

async fn delete_expired_sqlite(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < ?")
        .bind(Utc::now())
        .execute(pool)
        .await
        .context("Failed to delete expired refresh tokens")?;

    Ok(result.rows_affected())
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_token_mysql(pool: &MySqlPool, token: &RefreshToken) -> Result<RefreshToken> {
    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (id, token, user_id, expires_at, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&token.id)
    .bind(&token.token)
    .bind(&token.user_id)
    .bind(token.expires_at)
    .bind(token.created_at)
    .execute(pool)
    .await
    .context("Failed to create refresh token")?;

    Ok(token.clone())
}

async fn get_token_mysql(pool: &MySqlPool, token: &str) -> Result<Option<RefreshToken>> {
    let row = sqlx::query(
        r#"
        SELECT id, token, user_id, expires_at, created_at
        FROM refresh_tokens
        WHERE token = ?
        "#,
    )
    .bind(token)
    .fetch_optional(pool)
    .await
    .context("Failed to get refresh token")?;

    Ok(row.map(|row| RefreshToken {
        id: row.get("id"),
        token: row.get("token"),
        user_id: row.get("user_id"),
        expires_at: row.get("expires_at"),
        created_at: row.get("created_at"),
    }))
}

async fn delete_where_mysql(pool: &MySqlPool, sql: &str, value: &str) -> Result<u64> {
    let result = sqlx::query(sql)
        .bind(value)
        .execute(pool)
        .await
        .context("Failed to delete refresh tokens")?;

    Ok(result.rows_affected())
}

async fn delete_expired_mysql(pool: &MySqlPool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < ?")
        .bind(Utc::now())
        .execute(pool)
        .await
        .context("Failed to delete expired refresh tokens")?;

    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_test_user, setup_test_pool};
    use chrono::Duration;
    use uuid::Uuid;

    fn create_test_token(user_id: &str, expires_in_days: i64) -> RefreshToken {
        let now = Utc::now();
        RefreshToken {
            id: Uuid::new_v4().to_string(),
            token: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            expires_at: now + Duration::days(expires_in_days),
            created_at: now,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_token() {
        let pool = setup_test_pool().await;
        let user = insert_test_user(&pool, "adaok").await;
        let repo = SqlxRefreshTokenRepository::new(pool);

        let token = create_test_token(&user.id, 7);
        repo.create(&token).await.expect("Failed to create token");

        let found = repo
            .get_by_token(&token.token)
            .await
            .expect("Failed to get token")
            .expect("Token not found");
        assert_eq!(found.user_id, user.id);
        assert!(!found.is_expired());

        assert!(repo.get_by_token("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_by_token() {
        let pool = setup_test_pool().await;
        let user = insert_test_user(&pool, "adaok").await;
        let repo = SqlxRefreshTokenRepository::new(pool);

        let token = create_test_token(&user.id, 7);
        repo.create(&token).await.unwrap();

        assert!(repo.delete_by_token(&token.token).await.unwrap());
        assert!(!repo.delete_by_token(&token.token).await.unwrap());
        assert!(repo.get_by_token(&token.token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_by_user_leaves_other_users() {
        let pool = setup_test_pool().await;
        let ada = insert_test_user(&pool, "adaok").await;
        let ben = insert_test_user(&pool, "benmo").await;
        let repo = SqlxRefreshTokenRepository::new(pool);

        repo.create(&create_test_token(&ada.id, 7)).await.unwrap();
        repo.create(&create_test_token(&ada.id, 7)).await.unwrap();
        let kept = create_test_token(&ben.id, 7);
        repo.create(&kept).await.unwrap();

        assert_eq!(repo.delete_by_user(&ada.id).await.unwrap(), 2);
        assert!(repo.get_by_token(&kept.token).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_expired() {
        let pool = setup_test_pool().await;
        let user = insert_test_user(&pool, "adaok").await;
        let repo = SqlxRefreshTokenRepository::new(pool);

        let expired = create_test_token(&user.id, -1);
        let valid = create_test_token(&user.id, 7);
        repo.create(&expired).await.unwrap();
        repo.create(&valid).await.unwrap();

        assert_eq!(repo.delete_expired().await.unwrap(), 1);
        assert!(repo.get_by_token(&expired.token).await.unwrap().is_none());
        assert!(repo.get_by_token(&valid.token).await.unwrap().is_some());
    }
}
