//! OTP repository
//!
//! Hashed one-time codes for email verification and password reset.
//! At most one code per user and purpose is active at a time; the service
//! deactivates older codes before storing a new one.

use crate::db::{Backend, DynDatabasePool};
use crate::models::{Otp, OtpPurpose};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// OTP repository trait
#[async_trait]
pub trait OtpRepository: Send + Sync {
    /// Store a new code
    async fn create(&self, otp: &Otp) -> Result<Otp>;

    /// Most recently requested code for a user and purpose, active or not
    async fn find_latest(&self, user_id: &str, purpose: OtpPurpose) -> Result<Option<Otp>>;

    /// Deactivate a single active code; false if it was already inactive
    async fn deactivate(&self, id: &str) -> Result<bool>;

    /// Deactivate every active code of a user for one purpose
    async fn deactivate_for_user(&self, user_id: &str, purpose: OtpPurpose) -> Result<u64>;

    /// Purge expired codes
    async fn delete_expired(&self) -> Result<u64>;
}

/// SQLx-based OTP repository implementation
pub struct SqlxOtpRepository {
    pool: DynDatabasePool,
}

impl SqlxOtpRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn OtpRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl OtpRepository for SqlxOtpRepository {
    async fn create(&self, otp: &Otp) -> Result<Otp> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => create_otp_sqlite(pool, otp).await,
            Backend::Mysql(pool) => create_otp_mysql(pool, otp).await,
        }
    }

    async fn find_latest(&self, user_id: &str, purpose: OtpPurpose) -> Result<Option<Otp>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => find_latest_sqlite(pool, user_id, purpose).await,
            Backend::Mysql(pool) => find_latest_mysql(pool, user_id, purpose).await,
        }
    }

    async fn deactivate(&self, id: &str) -> Result<bool> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => deactivate_sqlite(pool, id).await,
            Backend::Mysql(pool) => deactivate_mysql(pool, id).await,
        }
    }

    async fn deactivate_for_user(&self, user_id: &str, purpose: OtpPurpose) -> Result<u64> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => deactivate_for_user_sqlite(pool, user_id, purpose).await,
            Backend::Mysql(pool) => deactivate_for_user_mysql(pool, user_id, purpose).await,
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

async fn create_otp_sqlite(pool: &SqlitePool, otp: &Otp) -> Result<Otp> {
    sqlx::query(
        r#"
        INSERT INTO otps (id, user_id, otp_hash, purpose, is_active, expires_at, requested_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&otp.id)
    .bind(&otp.user_id)
    .bind(&otp.otp_hash)
    .bind(otp.purpose.as_str())
    .bind(otp.is_active)
    .bind(otp.expires_at)
    .bind(otp.requested_at)
    .execute(pool)
    .await
    .context("Failed to create OTP")?;

    Ok(otp.clone())
}

async fn find_latest_sqlite(
    pool: &SqlitePool,
    user_id: &str,
    purpose: OtpPurpose,
) -> Result<Option<Otp>> {
    let row = sqlx::query(
        r#"
        SELECT id, user_id, otp_hash, purpose, is_active, expires_at, requested_at
        FROM otps
        WHERE user_id = ? AND purpose = ?
        ORDER BY requested_at DESC
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .bind(purpose.as_str())
    .fetch_optional(pool)
    .await
    .context("Failed to find OTP")?;

    row.as_ref().map(row_to_otp_sqlite).transpose()
}

async fn deactivate_sqlite(pool: &SqlitePool, id: &str) -> Result<bool> {
    let result = sqlx::query("UPDATE otps SET is_active = ? WHERE id = ? AND is_active = ?")
        .bind(false)
        .bind(id)
        .bind(true)
        .execute(pool)
        .await
        .context("Failed to deactivate OTP")?;

    Ok(result.rows_affected() > 0)
}

async fn deactivate_for_user_sqlite(
    pool: &SqlitePool,
    user_id: &str,
    purpose: OtpPurpose,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE otps SET is_active = ? WHERE user_id = ? AND purpose = ? AND is_active = ?",
    )
    .bind(false)
    .bind(user_id)
    .bind(purpose.as_str())
    .bind(true)
    .execute(pool)
    .await
    .context("Failed to deactivate OTPs")?;

    Ok(result.rows_affected())
}

async fn delete_expired_sqlite(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM otps WHERE expires_at < ?")
        .bind(Utc::now())
        .execute(pool)
        .await
        .context("Failed to delete expired OTPs")?;

    Ok(result.rows_affected())
}

fn row_to_otp_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Otp> {
    let purpose: String = row.get("purpose");
    Ok(Otp {
        id: row.get("id"),
        user_id: row.get("user_id"),
        otp_hash: row.get("otp_hash"),
        purpose: purpose.parse()?,
        is_active: row.get("is_active"),
        expires_at: row.get("expires_at"),
        requested_at: row.get("requested_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_otp_mysql(pool: &MySqlPool, otp: &Otp) -> Result<Otp> {
    sqlx::query(
        r#"
        INSERT INTO otps (id, user_id, otp_hash, purpose, is_active, expires_at, requested_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&otp.id)
    .bind(&otp.user_id)
    .bind(&otp.otp_hash)
    .bind(otp.purpose.as_str())
    .bind(otp.is_active)
    .bind(otp.expires_at)
    .bind(otp.requested_at)
    .execute(pool)
    .await
    .context("Failed to create OTP")?;

    Ok(otp.clone())
}

async fn find_latest_mysql(
    pool: &MySqlPool,
    user_id: &str,
    purpose: OtpPurpose,
) -> Result<Option<Otp>> {
    let row = sqlx::query(
        r#"
        SELECT id, user_id, otp_hash, purpose, is_active, expires_at, requested_at
        FROM otps
        WHERE user_id = ? AND purpose = ?
        ORDER BY requested_at DESC
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .bind(purpose.as_str())
    .fetch_optional(pool)
    .await
    .context("Failed to find OTP")?;

    row.as_ref().map(row_to_otp_mysql).transpose()
}

async fn deactivate_mysql(pool: &MySqlPool, id: &str) -> Result<bool> {
    let result = sqlx::query("UPDATE otps SET is_active = ? WHERE id = ? AND is_active = ?")
        .bind(false)
        .bind(id)
        .bind(true)
        .execute(pool)
        .await
        .context("Failed to deactivate OTP")?;

    Ok(result.rows_affected() > 0)
}

async fn deactivate_for_user_mysql(
    pool: &MySqlPool,
    user_id: &str,
    purpose: OtpPurpose,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE otps SET is_active = ? WHERE user_id = ? AND purpose = ? AND is_active = ?",
    )
    .bind(false)
    .bind(user_id)
    .bind(purpose.as_str())
    .bind(true)
    .execute(pool)
    .await
    .context("Failed to deactivate OTPs")?;

    Ok(result.rows_affected())
}

async fn delete_expired_mysql(pool: &MySqlPool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM otps WHERE expires_at < ?")
        .bind(Utc::now())
        .execute(pool)
        .await
        .context("Failed to delete expired OTPs")?;

    Ok(result.rows_affected())
}

fn row_to_otp_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Otp> {
    let purpose: String = row.get("purpose");
    Ok(Otp {
        id: row.get("id"),
        user_id: row.get("user_id"),
        otp_hash: row.get("otp_hash"),
        purpose: purpose.parse()?,
        is_active: row.get("is_active"),
        expires_at: row.get("expires_at"),
        requested_at: row.get("requested_at"),
    })
}
