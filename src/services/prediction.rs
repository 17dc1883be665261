//! Prediction service
//!
//! Forwards flood-risk features to the external model-serving service and
//! relays its multi-model payload. Predictions made by authenticated users
//! are also written to their history.

use anyhow::{Context, Result};
use reqwest::{header, Client};
use std::sync::Arc;
use std::time::Duration;

use crate::config::PredictionConfig;
use crate::db::repositories::PredictionHistoryRepository;
use crate::models::{
    ListParams, MultiModelPredictionOutput, PagedResult, PredictionHistory, PredictionHistoryItem,
    PredictionHistoryPage, PredictionInput,
};
use crate::services::error::{ServiceError, ServiceResult};

/// What happened to the history row of a prediction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistorySave {
    /// Anonymous caller or history disabled
    Skipped,
    Saved(String),
    Failed(String),
}

/// Upstream payload plus the history outcome
#[derive(Debug, Clone)]
pub struct PredictionOutcome {
    pub payload: serde_json::Value,
    pub history: HistorySave,
}

pub struct PredictionService {
    http: Client,
    url: String,
    save_history: bool,
    history_repo: Arc<dyn PredictionHistoryRepository>,
}

impl PredictionService {
    pub fn new(
        config: &PredictionConfig,
        history_repo: Arc<dyn PredictionHistoryRepository>,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build prediction HTTP client")?;

        Ok(Self {
            http,
            url: config.url.clone(),
            save_history: config.save_history,
            history_repo,
        })
    }

    /// Run a prediction. `caller` is the authenticated user, if any.
    pub async fn predict(
        &self,
        input: PredictionInput,
        caller: Option<&str>,
    ) -> ServiceResult<PredictionOutcome> {
        let response = self
            .http
            .post(&self.url)
            .header(header::ACCEPT, "application/json")
            .json(&input)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!("Prediction service returned {}: {}", status, body);
            return Err(ServiceError::Upstream {
                status: status.as_u16(),
                message: format!("Prediction service error: {}", body),
            });
        }

        let payload: serde_json::Value = response.json().await.map_err(transport_error)?;

        let history = match caller {
            Some(user_id) if self.save_history => self.save(user_id, input, &payload).await,
            _ => HistorySave::Skipped,
        };

        Ok(PredictionOutcome { payload, history })
    }

    /// One page of the user's history, newest first
    pub async fn history(&self, user_id: &str, params: &ListParams) -> ServiceResult<PredictionHistoryPage> {
        let (rows, total) = futures::try_join!(
            self.history_repo.list_by_user(user_id, params),
            self.history_repo.count_by_user(user_id),
        )
        .context("Failed to fetch prediction history")?;

        let page = PagedResult::new(rows, total, params).map(PredictionHistoryItem::from);
        let total_pages = page.total_pages();
        Ok(PredictionHistoryPage {
            predictions: page.items,
            total: page.total,
            page: page.page,
            limit: page.limit,
            total_pages,
        })
    }

    /// A single history entry; entries of other users read as missing
    pub async fn history_item(&self, id: &str, user_id: &str) -> ServiceResult<PredictionHistoryItem> {
        self.history_repo
            .get_by_id(id)
            .await?
            .filter(|history| history.user_id == user_id)
            .map(PredictionHistoryItem::from)
            .ok_or_else(|| ServiceError::not_found("Prediction not found"))
    }

    async fn save(&self, user_id: &str, input: PredictionInput, payload: &serde_json::Value) -> HistorySave {
        let output: MultiModelPredictionOutput = match serde_json::from_value(payload.clone()) {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!("Prediction payload not saved to history: {}", e);
                return HistorySave::Failed(e.to_string());
            }
        };

        let history = PredictionHistory::new(user_id, input, output);
        match self.history_repo.create(&history).await {
            Ok(saved) => HistorySave::Saved(saved.id),
            Err(e) => {
                tracing::warn!("Failed to save prediction history for {}: {:#}", user_id, e);
                HistorySave::Failed(e.to_string())
            }
        }
    }
}

fn transport_error(e: reqwest::Error) -> ServiceError {
    if e.is_connect() || e.is_timeout() {
        tracing::error!("Prediction service unreachable: {}", e);
        ServiceError::Unavailable("Unable to connect to prediction service".to_string())
    } else {
        tracing::error!("Prediction request failed: {}", e);
        ServiceError::internal("Failed to make prediction")
    }
}
