//! Record identity: numeric id or UUID.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ValidationError;

static UUID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
        .expect("static UUID pattern")
});

/// Returns true if `value` has the canonical 8-4-4-4-12 hex UUID shape.
pub fn is_valid_uuid(value: &str) -> bool {
    UUID_PATTERN.is_match(value)
}

/// Validates a UUID and returns its lowercase canonical form.
pub fn normalize_uuid(value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if is_valid_uuid(trimmed) {
        Ok(trimmed.to_ascii_lowercase())
    } else {
        Err(ValidationError::InvalidUuid {
            value: value.to_string(),
        })
    }
}

/// How an operation addresses a record.
///
/// The numeric id is the store's primary key. The UUID is the external key
/// used by every public-facing lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    /// Primary key.
    Id(i64),
    /// Canonical lowercase UUID.
    Uuid(String),
}

impl Identity {
    /// Builds a UUID identity, validating and normalizing the input.
    pub fn uuid(value: &str) -> Result<Self, ValidationError> {
        normalize_uuid(value).map(Identity::Uuid)
    }
}

impl From<i64> for Identity {
    fn from(id: i64) -> Self {
        Identity::Id(id)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Id(id) => write!(f, "id {}", id),
            Identity::Uuid(uuid) => write!(f, "uuid {}", uuid),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_validation() {
        assert!(is_valid_uuid("6000e165-57fd-4ad3-af48-0df1a6b157a9"));
        assert!(is_valid_uuid("6000E165-57FD-4AD3-AF48-0DF1A6B157A9"));
        assert!(!is_valid_uuid("6000e16557fd4ad3af480df1a6b157a9"));
        assert!(!is_valid_uuid("not-a-uuid"));
        assert!(!is_valid_uuid("6000e165-57fd-4ad3-af48-0df1a6b157a9' OR 1=1"));
    }

    #[test]
    fn test_identity_uuid_is_lowercased() {
        let identity = Identity::uuid(" 6000E165-57FD-4AD3-AF48-0DF1A6B157A9 ").unwrap();
        assert_eq!(
            identity,
            Identity::Uuid("6000e165-57fd-4ad3-af48-0df1a6b157a9".to_string())
        );
        assert!(Identity::uuid("xyz").is_err());
    }
}
