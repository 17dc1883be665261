//! Flood prediction model
//!
//! Input features, the multi-model payload returned by the model-serving
//! service, and the history rows kept for authenticated callers. Payload
//! field names follow the model service (snake_case).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::validation::{Validate, ValidationErrors};

/// The ten terrain and hydrology features the models expect
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionInput {
    pub aspect: f64,
    pub dem: f64,
    pub distroads: f64,
    pub distwater: f64,
    pub hand: f64,
    pub ndvi: f64,
    pub rainfreq: f64,
    pub ratio: f64,
    pub slope: f64,
    pub twi: f64,
}

impl PredictionInput {
    fn features(&self) -> [(&'static str, f64, &'static str); 10] {
        [
            ("aspect", self.aspect, "Aspect must be a positive number"),
            ("dem", self.dem, "DEM must be a positive number"),
            ("distroads", self.distroads, "Distance to roads must be a positive number"),
            ("distwater", self.distwater, "Distance to water must be a positive number"),
            ("hand", self.hand, "HAND must be a positive number"),
            ("ndvi", self.ndvi, "NDVI must be a positive number"),
            ("rainfreq", self.rainfreq, "Rain frequency must be a positive number"),
            ("ratio", self.ratio, "Ratio must be a positive number"),
            ("slope", self.slope, "Slope must be a positive number"),
            ("twi", self.twi, "TWI must be a positive number"),
        ]
    }
}

impl Validate for PredictionInput {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        for (field, value, message) in self.features() {
            errors.check(!value.is_finite() || value < 0.0, field, message);
        }
        errors.into_result()
    }
}

/// One model's verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPrediction {
    pub model_name: String,
    pub prediction: f64,
    pub prediction_label: String,
    pub flood_probability: f64,
    pub confidence: f64,
    pub model_accuracy: f64,
    pub model_auc: f64,
}

/// Full payload returned by the model-serving service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiModelPredictionOutput {
    pub input_summary: serde_json::Value,
    pub predictions: Vec<ModelPrediction>,
    pub consensus: serde_json::Value,
    pub best_model_prediction: ModelPrediction,
}

/// Stored prediction, append-only
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionHistory {
    pub id: String,
    pub user_id: String,
    pub input_features: PredictionInput,
    pub input_summary: serde_json::Value,
    pub predictions: Vec<ModelPrediction>,
    pub consensus: serde_json::Value,
    /// Persisted as flat `best_*` columns
    pub best_model_prediction: ModelPrediction,
    pub created_at: DateTime<Utc>,
}

impl PredictionHistory {
    pub fn new(user_id: &str, input: PredictionInput, output: MultiModelPredictionOutput) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            input_features: input,
            input_summary: output.input_summary,
            predictions: output.predictions,
            consensus: output.consensus,
            best_model_prediction: output.best_model_prediction,
            created_at: Utc::now(),
        }
    }
}

/// History entry as returned to the client
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionHistoryItem {
    pub id: String,
    pub input_summary: serde_json::Value,
    pub predictions: Vec<ModelPrediction>,
    pub consensus: serde_json::Value,
    pub best_model_prediction: ModelPrediction,
    pub created_at: DateTime<Utc>,
}

impl From<PredictionHistory> for PredictionHistoryItem {
    fn from(history: PredictionHistory) -> Self {
        Self {
            id: history.id,
            input_summary: history.input_summary,
            predictions: history.predictions,
            consensus: history.consensus,
            best_model_prediction: history.best_model_prediction,
            created_at: history.created_at,
        }
    }
}

/// One page of a user's prediction history
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionHistoryPage {
    pub predictions: Vec<PredictionHistoryItem>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

#[cfg(test)]
pub(crate) fn sample_output() -> MultiModelPredictionOutput {
    let best = ModelPrediction {
        model_name: "random_forest".to_string(),
        prediction: 1.0,
        prediction_label: "Flood".to_string(),
        flood_probability: 0.87,
        confidence: 0.74,
        model_accuracy: 0.91,
        model_auc: 0.95,
    };
    let other = ModelPrediction {
        model_name: "logistic_regression".to_string(),
        prediction: 0.0,
        prediction_label: "No Flood".to_string(),
        flood_probability: 0.41,
        confidence: 0.18,
        model_accuracy: 0.82,
        model_auc: 0.86,
    };
    MultiModelPredictionOutput {
        input_summary: serde_json::json!({"dem": 12.5, "slope": 3.2}),
        predictions: vec![best.clone(), other],
        consensus: serde_json::json!({"flood_votes": 1, "total_models": 2, "majority_prediction": "Flood"}),
        best_model_prediction: best,
    }
}

#[cfg(test)]
pub(crate) fn sample_input() -> PredictionInput {
    PredictionInput {
        aspect: 120.0,
        dem: 12.5,
        distroads: 300.0,
        distwater: 45.0,
        hand: 2.1,
        ndvi: 0.35,
        rainfreq: 14.0,
        ratio: 0.6,
        slope: 3.2,
        twi: 9.8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_input() {
        assert!(sample_input().validate().is_ok());
    }

    #[test]
    fn test_negative_and_non_finite_rejected() {
        let mut input = sample_input();
        input.ndvi = -0.1;
        input.twi = f64::NAN;

        let errors = input.validate().unwrap_err();
        assert!(errors.has_field("ndvi"));
        assert!(errors.has_field("twi"));
        assert_eq!(errors.errors().len(), 2);
    }

    #[test]
    fn test_output_parses_upstream_payload() {
        let payload = serde_json::to_value(sample_output()).unwrap();
        let parsed: MultiModelPredictionOutput = serde_json::from_value(payload).unwrap();
        assert_eq!(parsed.best_model_prediction.model_name, "random_forest");
        assert_eq!(parsed.predictions.len(), 2);
    }

    #[test]
    fn test_integer_prediction_accepted() {
        let raw = serde_json::json!({
            "model_name": "xgboost",
            "prediction": 1,
            "prediction_label": "Flood",
            "flood_probability": 0.9,
            "confidence": 0.8,
            "model_accuracy": 0.9,
            "model_auc": 0.93
        });
        let parsed: ModelPrediction = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.prediction, 1.0);
    }

    #[test]
    fn test_history_item_drops_owner_and_input() {
        let history = PredictionHistory::new("user-1", sample_input(), sample_output());
        let id = history.id.clone();
        let item = PredictionHistoryItem::from(history);
        assert_eq!(item.id, id);
        let json = serde_json::to_value(&item).unwrap();
        assert!(json.get("user_id").is_none());
        assert_eq!(json["best_model_prediction"]["model_name"], "random_forest");
    }
}
