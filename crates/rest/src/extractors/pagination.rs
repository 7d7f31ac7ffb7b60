//! Pagination extractor.
//!
//! Extracts `skip` and `limit` from the query string.

use axum::extract::FromRequestParts;
use emr_persistence::Page;
use http::request::Parts;
use serde::Deserialize;

use super::ApiQuery;
use crate::error::RestError;
use crate::state::AppState;

/// Axum extractor for pagination parameters.
///
/// `skip` defaults to 0 and must not be negative. `limit` defaults to the
/// configured page size, is clamped to the configured maximum, and must be
/// positive.
///
/// # Example
///
/// ```rust,ignore
/// use emr_rest::extractors::Pagination;
///
/// async fn list_handler(pagination: Pagination) {
///     let page = pagination.page();
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination(Page);

/// Query parameters for pagination.
#[derive(Debug, Deserialize)]
struct PaginationQuery {
    skip: Option<u64>,
    limit: Option<u64>,
}

impl Pagination {
    /// Builds the page window from raw parameters.
    pub fn resolve(
        skip: Option<u64>,
        limit: Option<u64>,
        default_limit: u64,
        max_limit: u64,
    ) -> Result<Self, RestError> {
        let page = Page::clamped(
            skip.unwrap_or(0),
            limit.unwrap_or(default_limit),
            max_limit,
        )?;
        Ok(Self(page))
    }

    /// The validated page window.
    pub fn page(&self) -> Page {
        self.0
    }
}

impl<S> FromRequestParts<AppState<S>> for Pagination
where
    S: Send + Sync,
{
    type Rejection = RestError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S>,
    ) -> Result<Self, Self::Rejection> {
        let ApiQuery(query) = ApiQuery::<PaginationQuery>::from_request_parts(parts, state).await?;
        Self::resolve(
            query.skip,
            query.limit,
            state.default_page_size(),
            state.max_page_size(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let pagination = Pagination::resolve(None, None, 100, 1000).unwrap();
        assert_eq!(pagination.page(), Page { skip: 0, limit: 100 });
    }

    #[test]
    fn test_limit_clamped_to_ceiling() {
        let pagination = Pagination::resolve(Some(5), Some(5000), 100, 1000).unwrap();
        assert_eq!(pagination.page(), Page { skip: 5, limit: 1000 });
    }

    #[test]
    fn test_zero_limit_rejected() {
        assert!(matches!(
            Pagination::resolve(None, Some(0), 100, 1000),
            Err(RestError::Validation { .. })
        ));
    }
}
