//! Common API utilities and shared types
//!
//! Query values arrive as strings and are parsed here, so a malformed value
//! becomes a JSON validation error instead of a plain-text rejection.

use serde::Deserialize;
use std::str::FromStr;

use super::responses::{ApiError, PaginatedResponse};
use crate::config::PaginationConfig;
use crate::models::{ListParams, PagedResult};

pub const MSG_INVALID_PAGE: &str = "Invalid page.";

// ============================================================================
// Pagination Query Types
// ============================================================================

/// `?page=&page_size=`
#[derive(Debug, Default, Deserialize)]
pub struct PaginationQuery {
    pub page: Option<String>,
    pub page_size: Option<String>,
}

impl PaginationQuery {
    /// Resolve against the configured default and maximum page size
    ///
    /// A page that is not a positive number is an invalid page (404). A
    /// malformed page size falls back to the default.
    pub fn params(&self, config: &PaginationConfig) -> Result<ListParams, ApiError> {
        let page = match non_empty(&self.page) {
            None => 1,
            Some(raw) => match raw.parse::<u32>() {
                Ok(page) if page > 0 => page,
                _ => return Err(ApiError::not_found(MSG_INVALID_PAGE)),
            },
        };
        let requested = non_empty(&self.page_size).and_then(|raw| raw.parse::<i64>().ok());
        let page_size = config.clamp(requested).clamp(1, u32::MAX as i64) as u32;
        Ok(ListParams::new(page, page_size))
    }
}

/// Turn a page of results into the response body, rejecting pages past
/// the end
pub fn paginate<T>(page: PagedResult<T>) -> Result<PaginatedResponse<T>, ApiError> {
    if page.is_out_of_range() {
        return Err(ApiError::not_found(MSG_INVALID_PAGE));
    }
    Ok(page.into())
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Parse an optional query value; blank counts as absent
pub fn parse_opt<T: FromStr>(
    field: &str,
    value: &Option<String>,
    message: &str,
) -> Result<Option<T>, ApiError> {
    match non_empty(value) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| ApiError::field(field, message)),
    }
}

/// Trimmed query value; blank counts as absent
pub fn text_opt(value: &Option<String>) -> Option<String> {
    non_empty(value).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(page: Option<&str>, page_size: Option<&str>) -> PaginationQuery {
        PaginationQuery {
            page: page.map(String::from),
            page_size: page_size.map(String::from),
        }
    }

    #[test]
    fn test_defaults() {
        let params = query(None, None).params(&PaginationConfig::default()).unwrap();
        assert_eq!(params, ListParams::new(1, 10));
    }

    #[test]
    fn test_page_size_clamped() {
        let params = query(Some("2"), Some("500"))
            .params(&PaginationConfig::default())
            .unwrap();
        assert_eq!(params, ListParams::new(2, 100));

        let params = query(None, Some("abc"))
            .params(&PaginationConfig::default())
            .unwrap();
        assert_eq!(params.per_page, 10);
    }

    #[test]
    fn test_invalid_page() {
        for raw in ["0", "-1", "abc"] {
            let error = query(Some(raw), None)
                .params(&PaginationConfig::default())
                .unwrap_err();
            assert_eq!(error.error.message, MSG_INVALID_PAGE);
        }
    }

    #[test]
    fn test_paginate_out_of_range() {
        let params = ListParams::new(5, 10);
        let page: PagedResult<i32> = PagedResult::new(vec![], 12, &params);
        assert!(paginate(page).is_err());

        let params = ListParams::new(1, 10);
        let page: PagedResult<i32> = PagedResult::new(vec![], 0, &params);
        assert!(paginate(page).is_ok());
    }

    #[test]
    fn test_parse_opt() {
        let year: Option<i32> = parse_opt("publication_year", &Some(" 1999 ".into()), "bad").unwrap();
        assert_eq!(year, Some(1999));
        let blank: Option<i32> = parse_opt("publication_year", &Some("".into()), "bad").unwrap();
        assert_eq!(blank, None);
        assert!(parse_opt::<i32>("publication_year", &Some("x".into()), "bad").is_err());
    }
}
