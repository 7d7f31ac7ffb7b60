//! Offset pagination.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A validated `(skip, limit)` window over an ordered result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Number of leading results to skip.
    pub skip: u64,
    /// Maximum number of results to return. Always positive.
    pub limit: u64,
}

impl Page {
    /// Limit used when a caller does not ask for one.
    pub const DEFAULT_LIMIT: u64 = 100;

    /// Creates a page, rejecting a zero limit.
    pub fn new(skip: u64, limit: u64) -> Result<Self, ValidationError> {
        if limit == 0 {
            return Err(ValidationError::InvalidPage {
                message: "limit must be greater than zero".to_string(),
            });
        }
        Ok(Self { skip, limit })
    }

    /// Creates a page whose limit is clamped to `ceiling`.
    pub fn clamped(skip: u64, limit: u64, ceiling: u64) -> Result<Self, ValidationError> {
        Self::new(skip, limit.min(ceiling.max(1)))
    }

    /// The first `limit` results.
    pub fn first(limit: u64) -> Result<Self, ValidationError> {
        Self::new(0, limit)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: Self::DEFAULT_LIMIT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_limit_rejected() {
        assert!(matches!(
            Page::new(0, 0),
            Err(ValidationError::InvalidPage { .. })
        ));
    }

    #[test]
    fn test_clamped_to_ceiling() {
        let page = Page::clamped(5, 5000, 1000).unwrap();
        assert_eq!(page, Page { skip: 5, limit: 1000 });
        assert_eq!(Page::clamped(0, 10, 1000).unwrap().limit, 10);
    }
}
