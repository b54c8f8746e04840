//! Response envelope and paging shared by every handler

use coach_core::traits::{PaginatedResponse, PaginationMeta};
use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

/// Envelope for single-object responses
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            data,
            message: None,
        }
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            data,
            message: Some(message.into()),
        }
    }
}

/// `?page=&per_page=` on booking listings
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PaginationParams {
    /// 1-indexed
    #[serde(default = "first_page", deserialize_with = "number_or_text")]
    #[validate(range(min = 1))]
    pub page: i64,

    #[serde(default = "default_per_page", deserialize_with = "number_or_text")]
    #[validate(range(min = 1, max = 100))]
    pub per_page: i64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(i64),
    Text(String),
}

/// Query strings hand every value over as text, JSON bodies do not
fn number_or_text<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Number(n) => Ok(n),
        NumberOrText::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

fn first_page() -> i64 {
    1
}

fn default_per_page() -> i64 {
    20
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: first_page(),
            per_page: default_per_page(),
        }
    }
}

impl PaginationParams {
    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.per_page
    }

    pub fn limit(&self) -> i64 {
        self.per_page
    }

    /// Wrap one page of rows with the totals the client needs to page on
    pub fn paginate<T>(&self, data: Vec<T>, total: i64) -> PaginatedResponse<T> {
        PaginatedResponse {
            data,
            pagination: PaginationMeta::new(total, self.page, self.per_page),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_follow_page_number() {
        let params = PaginationParams {
            page: 3,
            per_page: 20,
        };
        assert_eq!(params.offset(), 40);
        assert_eq!(params.limit(), 20);
        assert_eq!(PaginationParams::default().offset(), 0);
    }

    #[test]
    fn test_query_values_arrive_as_text() {
        let params: PaginationParams =
            serde_json::from_value(serde_json::json!({ "page": "2", "per_page": 5 })).unwrap();
        assert_eq!((params.page, params.per_page), (2, 5));
        assert!(params.validate().is_ok());

        assert!(serde_json::from_value::<PaginationParams>(serde_json::json!({ "page": "two" }))
            .is_err());

        let oversized = PaginationParams {
            page: 1,
            per_page: 500,
        };
        assert!(oversized.validate().is_err());
    }

    #[test]
    fn test_paginate_counts_pages() {
        let params = PaginationParams {
            page: 2,
            per_page: 2,
        };
        let page = params.paginate(vec!["BK-3", "BK-4"], 5);
        assert_eq!(page.data.len(), 2);
        assert_eq!(page.pagination.total_pages, 3);
        assert_eq!(page.pagination.page, 2);
    }

    #[test]
    fn test_envelope_omits_empty_message() {
        let json = serde_json::to_value(ApiResponse::success("ok")).unwrap();
        assert!(json.get("message").is_none());

        let json = serde_json::to_value(ApiResponse::with_message(1, "Booking confirmed")).unwrap();
        assert_eq!(json["message"], "Booking confirmed");
    }
}
