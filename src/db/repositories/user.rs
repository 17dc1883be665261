//! User repository
//!
//! Database operations for user accounts.
//!
//! This module provides:
//! - `UserRepository` trait defining the interface for user data access
//! - `SqlxUserRepository` implementing the trait for SQLite and MySQL
//!
//! `expertise` and `roles` are stored as JSON text columns.

use super::{decode_list, encode_list};
use crate::db::{Backend, DynDatabasePool};
use crate::models::User;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

const USER_COLUMNS: &str = "id, email, username, first_name, last_name, password_hash, bio, \
     avatar, expertise, roles, is_email_verified, created_at, updated_at";

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user
    async fn create(&self, user: &User) -> Result<User>;

    /// Get user by ID
    async fn get_by_id(&self, id: &str) -> Result<Option<User>>;

    /// Get user by email
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Get user by username
    async fn get_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Persist every mutable profile field, including the password hash
    async fn update(&self, user: &User) -> Result<User>;

    /// Mark the user's email as verified
    async fn set_email_verified(&self, id: &str) -> Result<()>;

    /// Replace the password hash
    async fn update_password(&self, id: &str, password_hash: &str) -> Result<()>;
}

/// SQLx-based user repository implementation
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    /// Create a new SQLx user repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => create_user_sqlite(pool, user).await,
            Backend::Mysql(pool) => create_user_mysql(pool, user).await,
        }
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<User>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => get_user_by_sqlite(pool, "id", id).await,
            Backend::Mysql(pool) => get_user_by_mysql(pool, "id", id).await,
        }
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => get_user_by_sqlite(pool, "email", email).await,
            Backend::Mysql(pool) => get_user_by_mysql(pool, "email", email).await,
        }
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => get_user_by_sqlite(pool, "username", username).await,
            Backend::Mysql(pool) => get_user_by_mysql(pool, "username", username).await,
        }
    }

    async fn update(&self, user: &User) -> Result<User> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => update_user_sqlite(pool, user).await,
            Backend::Mysql(pool) => update_user_mysql(pool, user).await,
        }
    }

    async fn set_email_verified(&self, id: &str) -> Result<()> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => set_email_verified_sqlite(pool, id).await,
            Backend::Mysql(pool) => set_email_verified_mysql(pool, id).await,
        }
    }

    async fn update_password(&self, id: &str, password_hash: &str) -> Result<()> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => update_password_sqlite(pool, id, password_hash).await,
            Backend::Mysql(pool) => update_password_mysql(pool, id, password_hash).await,
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_user_sqlite(pool: &SqlitePool, user: &User) -> Result<User> {
    sqlx::query(&format!(
        "INSERT INTO users ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        USER_COLUMNS
    ))
    .bind(&user.id)
    .bind(&user.email)
    .bind(&user.username)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.password_hash)
    .bind(&user.bio)
    .bind(&user.avatar)
    .bind(encode_list(&user.expertise)?)
    .bind(encode_list(&user.roles)?)
    .bind(user.is_email_verified)
    .bind(user.created_at)
    .bind(user.updated_at)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(user.clone())
}

async fn get_user_by_sqlite(pool: &SqlitePool, column: &str, value: &str) -> Result<Option<User>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM users WHERE {} = ?",
        USER_COLUMNS, column
    ))
    .bind(value)
    .fetch_optional(pool)
    .await
    .with_context(|| format!("Failed to get user by {}", column))?;

    row.as_ref().map(row_to_user_sqlite).transpose()
}

async fn update_user_sqlite(pool: &SqlitePool, user: &User) -> Result<User> {
    let now = Utc::now();
    sqlx::query(
        r#"
        UPDATE users
        SET email = ?, username = ?, first_name = ?, last_name = ?, password_hash = ?,
            bio = ?, avatar = ?, expertise = ?, roles = ?, is_email_verified = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&user.email)
    .bind(&user.username)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.password_hash)
    .bind(&user.bio)
    .bind(&user.avatar)
    .bind(encode_list(&user.expertise)?)
    .bind(encode_list(&user.roles)?)
    .bind(user.is_email_verified)
    .bind(now)
    .bind(&user.id)
    .execute(pool)
    .await
    .context("Failed to update user")?;

    let mut updated = user.clone();
    updated.updated_at = now;
    Ok(updated)
}

async fn update_password_sqlite(pool: &SqlitePool, id: &str, password_hash: &str) -> Result<()> {
    sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
        .bind(password_hash)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update password")?;

    Ok(())
}

async fn set_email_verified_sqlite(pool: &SqlitePool, id: &str) -> Result<()> {
    sqlx::query("UPDATE users SET is_email_verified = ?, updated_at = ? WHERE id = ?")
        .bind(true)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to mark email verified")?;

    Ok(())
}

pub(crate) fn row_to_user_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
    let expertise: String = row.get("expertise");
    let roles: String = row.get("roles");

    Ok(User {
        id: row.get("id"),
        email: row.get("email"),
        username: row.get("username"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        password_hash: row.get("password_hash"),
        bio: row.get("bio"),
        avatar: row.get("avatar"),
        expertise: decode_list(&expertise)?,
        roles: decode_list(&roles)?,
        is_email_verified: row.get("is_email_verified"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_user_mysql(pool: &MySqlPool, user: &User) -> Result<User> {
    sqlx::query(&format!(
        "INSERT INTO users ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        USER_COLUMNS
    ))
    .bind(&user.id)
    .bind(&user.email)
    .bind(&user.username)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.password_hash)
    .bind(&user.bio)
    .bind(&user.avatar)
    .bind(encode_list(&user.expertise)?)
    .bind(encode_list(&user.roles)?)
    .bind(user.is_email_verified)
    .bind(user.created_at)
    .bind(user.updated_at)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(user.clone())
}

async fn get_user_by_mysql(pool: &MySqlPool, column: &str, value: &str) -> Result<Option<User>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM users WHERE {} = ?",
        USER_COLUMNS, column
    ))
    .bind(value)
    .fetch_optional(pool)
    .await
    .with_context(|| format!("Failed to get user by {}", column))?;

    row.as_ref().map(row_to_user_mysql).transpose()
}

async fn update_user_mysql(pool: &MySqlPool, user: &User) -> Result<User> {
    let now = Utc::now();
    sqlx::query(
        r#"
        UPDATE users
        SET email = ?, username = ?, first_name = ?, last_name = ?, password_hash = ?,
            bio = ?, avatar = ?, expertise = ?, roles = ?, is_email_verified = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&user.email)
    .bind(&user.username)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.password_hash)
    .bind(&user.bio)
    .bind(&user.avatar)
    .bind(encode_list(&user.expertise)?)
    .bind(encode_list(&user.roles)?)
    .bind(user.is_email_verified)
    .bind(now)
    .bind(&user.id)
    .execute(pool)
    .await
    .context("Failed to update user")?;

    let mut updated = user.clone();
    updated.updated_at = now;
    Ok(updated)
}

async fn update_password_mysql(pool: &MySqlPool, id: &str, password_hash: &str) -> Result<()> {
    sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
        .bind(password_hash)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update password")?;

    Ok(())
}

async fn set_email_verified_mysql(pool: &MySqlPool, id: &str) -> Result<()> {
    sqlx::query("UPDATE users SET is_email_verified = ?, updated_at = ? WHERE id = ?")
        .bind(true)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to mark email verified")?;

    Ok(())
}

pub(crate) fn row_to_user_mysql(row: &sqlx::mysql::MySqlRow) -> Result<User> {
    let expertise: String = row.get("expertise");
    let roles: String = row.get("roles");

    Ok(User {
        id: row.get("id"),
        email: row.get("email"),
        username: row.get("username"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        password_hash: row.get("password_hash"),
        bio: row.get("bio"),
        avatar: row.get("avatar"),
        expertise: decode_list(&expertise)?,
        roles: decode_list(&roles)?,
        is_email_verified: row.get("is_email_verified"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
