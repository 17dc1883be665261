//! Prediction history repository
//!
//! Append-only log of predictions made by authenticated users. Nested
//! payload parts are stored as JSON text; the best model's verdict is kept
//! in flat columns.

use crate::db::{Backend, DynDatabasePool};
use crate::models::{ListParams, ModelPrediction, PredictionHistory};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

const HISTORY_COLUMNS: &str = "id, user_id, input_features, input_summary, predictions, consensus, \
     best_model_name, best_prediction, best_prediction_label, best_flood_probability, \
     best_confidence, best_model_accuracy, best_model_auc, created_at";

/// Prediction history repository trait
#[async_trait]
pub trait PredictionHistoryRepository: Send + Sync {
    async fn create(&self, history: &PredictionHistory) -> Result<PredictionHistory>;

    async fn get_by_id(&self, id: &str) -> Result<Option<PredictionHistory>>;

    /// One page of a user's history, newest first
    async fn list_by_user(&self, user_id: &str, params: &ListParams)
        -> Result<Vec<PredictionHistory>>;

    async fn count_by_user(&self, user_id: &str) -> Result<i64>;
}

/// SQLx-based prediction history repository implementation
pub struct SqlxPredictionHistoryRepository {
    pool: DynDatabasePool,
}

impl SqlxPredictionHistoryRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PredictionHistoryRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl PredictionHistoryRepository for SqlxPredictionHistoryRepository {
    async fn create(&self, history: &PredictionHistory) -> Result<PredictionHistory> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => create_history_sqlite(pool, history).await,
            Backend::Mysql(pool) => create_history_mysql(pool, history).await,
        }
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<PredictionHistory>> {
        let sql = format!("SELECT {} FROM prediction_history WHERE id = ?", HISTORY_COLUMNS);
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get prediction by ID")?;
                row.as_ref().map(row_to_history_sqlite).transpose()
            }
            Backend::Mysql(pool) => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get prediction by ID")?;
                row.as_ref().map(row_to_history_mysql).transpose()
            }
        }
    }

    async fn list_by_user(
        &self,
        user_id: &str,
        params: &ListParams,
    ) -> Result<Vec<PredictionHistory>> {
        let sql = format!(
            "SELECT {} FROM prediction_history WHERE user_id = ? \
             ORDER BY created_at DESC LIMIT ? OFFSET ?",
            HISTORY_COLUMNS
        );
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let rows = sqlx::query(&sql)
                    .bind(user_id)
                    .bind(params.limit())
                    .bind(params.offset())
                    .fetch_all(pool)
                    .await
                    .context("Failed to list prediction history")?;
                rows.iter().map(row_to_history_sqlite).collect()
            }
            Backend::Mysql(pool) => {
                let rows = sqlx::query(&sql)
                    .bind(user_id)
                    .bind(params.limit())
                    .bind(params.offset())
                    .fetch_all(pool)
                    .await
                    .context("Failed to list prediction history")?;
                rows.iter().map(row_to_history_mysql).collect()
            }
        }
    }

    async fn count_by_user(&self, user_id: &str) -> Result<i64> {
        let sql = "SELECT COUNT(*) FROM prediction_history WHERE user_id = ?";
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                sqlx::query_scalar::<_, i64>(sql)
                    .bind(user_id)
                    .fetch_one(pool)
                    .await
            }
            Backend::Mysql(pool) => {
                sqlx::query_scalar::<_, i64>(sql)
                    .bind(user_id)
                    .fetch_one(pool)
                    .await
            }
        }
        .context("Failed to count prediction history")
    }
}

/// JSON-encoded columns of a history row, in insert order
struct EncodedHistory {
    input_features: String,
    input_summary: String,
    predictions: String,
    consensus: String,
}

impl EncodedHistory {
    fn encode(history: &PredictionHistory) -> Result<Self> {
        Ok(Self {
            input_features: serde_json::to_string(&history.input_features)
                .context("Failed to encode input features")?,
            input_summary: serde_json::to_string(&history.input_summary)
                .context("Failed to encode input summary")?,
            predictions: serde_json::to_string(&history.predictions)
                .context("Failed to encode predictions")?,
            consensus: serde_json::to_string(&history.consensus)
                .context("Failed to encode consensus")?,
        })
    }
}

fn decode_column<T: DeserializeOwned>(raw: &str, column: &str) -> Result<T> {
    serde_json::from_str(raw).with_context(|| format!("Failed to decode {}", column))
}

fn insert_sql() -> String {
    format!(
        "INSERT INTO prediction_history ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        HISTORY_COLUMNS
    )
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_history_sqlite(
    pool: &SqlitePool,
    history: &PredictionHistory,
) -> Result<PredictionHistory> {
    let encoded = EncodedHistory::encode(history)?;
    let best = &history.best_model_prediction;

    sqlx::query(&insert_sql())
        .bind(&history.id)
        .bind(&history.user_id)
        .bind(&encoded.input_features)
        .bind(&encoded.input_summary)
        .bind(&encoded.predictions)
        .bind(&encoded.consensus)
        .bind(&best.model_name)
        .bind(best.prediction)
        .bind(&best.prediction_label)
        .bind(best.flood_probability)
        .bind(best.confidence)
        .bind(best.model_accuracy)
        .bind(best.model_auc)
        .bind(history.created_at)
        .execute(pool)
        .await
        .context("Failed to save prediction history")?;

    Ok(history.clone())
}

fn row_to_history_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<PredictionHistory> {
    let input_features: String = row.get("input_features");
    let input_summary: String = row.get("input_summary");
    let predictions: String = row.get("predictions");
    let consensus: String = row.get("consensus");

    Ok(PredictionHistory {
        id: row.get("id"),
        user_id: row.get("user_id"),
        input_features: decode_column(&input_features, "input_features")?,
        input_summary: decode_column(&input_summary, "input_summary")?,
        predictions: decode_column(&predictions, "predictions")?,
        consensus: decode_column(&consensus, "consensus")?,
        best_model_prediction: ModelPrediction {
            model_name: row.get("best_model_name"),
            prediction: row.get("best_prediction"),
            prediction_label: row.get("best_prediction_label"),
            flood_probability: row.get("best_flood_probability"),
            confidence: row.get("best_confidence"),
            model_accuracy: row.get("best_model_accuracy"),
            model_auc: row.get("best_model_auc"),
        },
        created_at: row.get("created_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_history_mysql(
    pool: &MySqlPool,
    history: &PredictionHistory,
) -> Result<PredictionHistory> {
    let encoded = EncodedHistory::encode(history)?;
    let best = &history.best_model_prediction;

    sqlx::query(&insert_sql())
        .bind(&history.id)
        .bind(&history.user_id)
        .bind(&encoded.input_features)
        .bind(&encoded.input_summary)
        .bind(&encoded.predictions)
        .bind(&encoded.consensus)
        .bind(&best.model_name)
        .bind(best.prediction)
        .bind(&best.prediction_label)
        .bind(best.flood_probability)
        .bind(best.confidence)
        .bind(best.model_accuracy)
        .bind(best.model_auc)
        .bind(history.created_at)
        .execute(pool)
        .await
        .context("Failed to save prediction history")?;

    Ok(history.clone())
}

fn row_to_history_mysql(row: &sqlx::mysql::MySqlRow) -> Result<PredictionHistory> {
    let input_features: String = row.get("input_features");
    let input_summary: String = row.get("input_summary");
    let predictions: String = row.get("predictions");
    let consensus: String = row.get("consensus");

    Ok(PredictionHistory {
        id: row.get("id"),
        user_id: row.get("user_id"),
        input_features: decode_column(&input_features, "input_features")?,
        input_summary: decode_column(&input_summary, "input_summary")?,
        predictions: decode_column(&predictions, "predictions")?,
        consensus: decode_column(&consensus, "consensus")?,
        best_model_prediction: ModelPrediction {
            model_name: row.get("best_model_name"),
            prediction: row.get("best_prediction"),
            prediction_label: row.get("best_prediction_label"),
            flood_probability: row.get("best_flood_probability"),
            confidence: row.get("best_confidence"),
            model_accuracy: row.get("best_model_accuracy"),
            model_auc: row.get("best_model_auc"),
        },
        created_at: row.get("created_at"),
    })
}
