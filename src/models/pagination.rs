//! Pagination model

use serde::{Deserialize, Serialize};

/// Default page size when the caller does not provide one
pub const DEFAULT_LIMIT: u32 = 10;

/// Largest page size a caller may request
pub const MAX_LIMIT: u32 = 100;

/// Normalized pagination parameters
///
/// `page` is always at least 1 and `limit` is always within `1..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListParams {
    /// Page number (1-indexed)
    pub page: u32,
    /// Number of items per page
    pub limit: u32,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl ListParams {
    /// Create new pagination parameters, clamping out-of-range values
    pub fn new(page: i64, limit: i64) -> Self {
        Self {
            page: page.clamp(1, u32::MAX as i64) as u32,
            limit: limit.clamp(1, MAX_LIMIT as i64) as u32,
        }
    }

    /// Number of rows to skip: `(page - 1) * limit`
    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.limit as i64
    }

    /// Get the limit for database queries
    pub fn limit(&self) -> i64 {
        self.limit as i64
    }
}

/// Paginated result container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedResult<T> {
    /// Items in the current page
    pub items: Vec<T>,
    /// Total number of items across all pages
    pub total: i64,
    /// Current page number (1-indexed)
    pub page: u32,
    /// Number of items per page
    pub limit: u32,
}

impl<T> PagedResult<T> {
    /// Create a new paginated result
    pub fn new(items: Vec<T>, total: i64, params: &ListParams) -> Self {
        Self {
            items,
            total,
            page: params.page,
            limit: params.limit,
        }
    }

    /// Calculate the total number of pages: `ceil(total / limit)`
    pub fn total_pages(&self) -> u32 {
        if self.limit == 0 || self.total <= 0 {
            return 0;
        }
        ((self.total as u64 + self.limit as u64 - 1) / self.limit as u64) as u32
    }

    /// Map every item, keeping the pagination metadata
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PagedResult<U> {
        PagedResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
        }
    }

    /// Pagination metadata in wire form
    pub fn pagination(&self) -> Pagination {
        Pagination {
            total: self.total,
            page: self.page,
            limit: self.limit,
            total_pages: self.total_pages(),
        }
    }
}

/// Pagination block attached to list responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_params_normalization() {
        assert_eq!(ListParams::new(0, 10), ListParams { page: 1, limit: 10 });
        assert_eq!(ListParams::new(-4, 10).page, 1);
        assert_eq!(ListParams::new(3, 0).limit, 1);
        assert_eq!(ListParams::new(3, 500).limit, 100);
        assert_eq!(ListParams::new(3, -2).limit, 1);
    }

    #[test]
    fn test_offset() {
        assert_eq!(ListParams::new(1, 10).offset(), 0);
        assert_eq!(ListParams::new(3, 10).offset(), 20);
        assert_eq!(ListParams::new(2, 25).offset(), 25);
    }

    #[test]
    fn test_total_pages() {
        let params = ListParams::new(1, 10);
        assert_eq!(PagedResult::<()>::new(vec![], 0, &params).total_pages(), 0);
        assert_eq!(PagedResult::<()>::new(vec![], 10, &params).total_pages(), 1);
        assert_eq!(PagedResult::<()>::new(vec![], 11, &params).total_pages(), 2);
    }

    #[test]
    fn test_pagination_serializes_camel_case() {
        let result = PagedResult::new(vec![1, 2], 12, &ListParams::new(2, 5));
        let json = serde_json::to_value(result.pagination()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"total": 12, "page": 2, "limit": 5, "totalPages": 3})
        );
    }

    #[test]
    fn test_map_keeps_metadata() {
        let result = PagedResult::new(vec![1, 2, 3], 3, &ListParams::new(1, 3));
        let mapped = result.map(|n| n * 2);
        assert_eq!(mapped.items, vec![2, 4, 6]);
        assert_eq!(mapped.total, 3);
        assert_eq!(mapped.limit, 3);
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Any raw input normalizes into the allowed ranges
        #[test]
        fn property_params_always_in_range(page in any::<i64>(), limit in any::<i64>()) {
            let params = ListParams::new(page, limit);
            prop_assert!(params.page >= 1);
            prop_assert!((1..=MAX_LIMIT).contains(&params.limit));
            prop_assert!(params.offset() >= 0);
        }

        /// totalPages is the ceiling of total / limit
        #[test]
        fn property_total_pages_is_ceiling(total in 0i64..1_000_000, limit in 1i64..=100) {
            let params = ListParams::new(1, limit);
            let result = PagedResult::<()>::new(vec![], total, &params);
            let pages = result.total_pages() as i64;
            prop_assert!(pages * limit >= total);
            prop_assert!(pages == 0 || (pages - 1) * limit < total);
        }
    }
}
