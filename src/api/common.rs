//! Common API utilities and shared types
//!
//! The success envelope and the pagination query shared by list endpoints.

use axum::Json;
use serde::{Deserialize, Serialize};

use crate::models::{ListParams, PagedResult, Pagination, DEFAULT_LIMIT};

use super::middleware::ApiError;

/// Success envelope: `{success, message, data?, pagination?}`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(message: impl Into<String>, data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
            data: Some(data),
            pagination: None,
        })
    }
}

impl<T: Serialize> ApiResponse<Vec<T>> {
    /// One page of items with its pagination block
    pub fn paged(message: impl Into<String>, page: PagedResult<T>) -> Json<Self> {
        let pagination = page.pagination();
        Json(Self {
            success: true,
            message: message.into(),
            data: Some(page.items),
            pagination: Some(pagination),
        })
    }
}

impl ApiResponse<()> {
    /// Envelope without a data field
    pub fn message(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
            data: None,
            pagination: None,
        })
    }
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Pagination query parameters
///
/// Kept as strings so that `?page=abc` falls back to the default instead
/// of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct PaginationQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl PaginationQuery {
    pub fn params(&self) -> ListParams {
        let parse = |value: &Option<String>, default: i64| {
            value
                .as_deref()
                .and_then(|v| v.trim().parse::<i64>().ok())
                .unwrap_or(default)
        };
        ListParams::new(parse(&self.page, 1), parse(&self.limit, DEFAULT_LIMIT as i64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(page: Option<&str>, limit: Option<&str>) -> PaginationQuery {
        PaginationQuery {
            page: page.map(String::from),
            limit: limit.map(String::from),
        }
    }

    #[test]
    fn test_defaults_when_missing_or_garbled() {
        let params = PaginationQuery::default().params();
        assert_eq!(params.page, 1);
        assert_eq!(params.limit, DEFAULT_LIMIT);

        let params = query(Some("abc"), Some("")).params();
        assert_eq!(params.page, 1);
        assert_eq!(params.limit, DEFAULT_LIMIT);
    }

    #[test]
    fn test_explicit_values() {
        let params = query(Some("3"), Some("5")).params();
        assert_eq!(params.page, 3);
        assert_eq!(params.limit(), 5);
        assert_eq!(params.offset(), 10);
    }

    #[test]
    fn test_message_envelope_omits_data() {
        let Json(body) = ApiResponse::message("Logged out successfully");
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["success"], true);
        assert!(value.get("data").is_none());
        assert!(value.get("pagination").is_none());
    }
}
