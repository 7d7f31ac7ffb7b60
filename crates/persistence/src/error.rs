//! Error types for the persistence layer.
//!
//! Errors fall into two categories that callers treat very differently:
//!
//! - [`ValidationError`]: the inbound payload or change set is malformed. These
//!   are detected before any write reaches the store.
//! - [`PersistenceError`]: the store rejected or failed an operation. These
//!   always wrap the underlying cause, and any partial write has been rolled
//!   back by the time the error is observed.
//!
//! A record that does not exist is *not* an error. Lookups and updates return
//! `Option` so callers branch on absence explicitly.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

/// The primary error type for all storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Payload or change set validation errors
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Store failures
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Errors raised when an inbound payload fails type or shape checks.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field was explicitly set to null.
    #[error("field '{field}' of {record} cannot be null")]
    NullNotAllowed {
        record: &'static str,
        field: &'static str,
    },

    /// Missing required field.
    #[error("missing required field: {field}")]
    MissingRequiredField { field: String },

    /// A field carries a value outside its allowed domain.
    #[error("invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    /// The identifier is not a well-formed UUID.
    #[error("invalid UUID format: {value}")]
    InvalidUuid { value: String },

    /// The payload names a different record than the one addressed.
    #[error("payload uuid {payload} does not match addressed record {addressed}")]
    IdentityMismatch { addressed: String, payload: String },

    /// Pagination parameters are out of range.
    #[error("invalid pagination: {message}")]
    InvalidPage { message: String },

    /// A query referenced a column that the table does not define.
    #[error("unknown column '{column}' on table {table}")]
    UnknownColumn {
        table: &'static str,
        column: &'static str,
    },
}

/// Errors raised by the underlying store.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Connection to the backend failed.
    #[error("connection failed to {backend_name}: {message}")]
    ConnectionFailed {
        backend_name: String,
        message: String,
    },

    /// Connection pool exhausted.
    #[error("connection pool exhausted for {backend_name}")]
    PoolExhausted { backend_name: String },

    /// A uniqueness, foreign key or NOT NULL constraint rejected the write.
    #[error("constraint violation in {backend_name}: {message}")]
    ConstraintViolation {
        backend_name: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Schema migration error.
    #[error("schema migration failed: {message}")]
    MigrationError { message: String },

    /// A stored value could not be decoded into the expected field type.
    #[error("cannot decode column '{column}': {message}")]
    Decode { column: String, message: String },

    /// A write completed but the record could not be read back.
    #[error("{record} {id} missing after write")]
    MissingAfterWrite { record: &'static str, id: i64 },

    /// Internal backend error.
    #[error("internal error in {backend_name}: {message}")]
    Internal {
        backend_name: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl PersistenceError {
    /// Short, client-safe description of the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            PersistenceError::ConnectionFailed { .. } => "store connection failed",
            PersistenceError::PoolExhausted { .. } => "store connection pool exhausted",
            PersistenceError::ConstraintViolation { .. } => "store constraint violation",
            PersistenceError::MigrationError { .. } => "store schema migration failed",
            PersistenceError::Decode { .. } => "stored value could not be decoded",
            PersistenceError::MissingAfterWrite { .. } => "record missing after write",
            PersistenceError::Internal { .. } => "internal store error",
        }
    }
}

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for PersistenceError {
    fn from(err: rusqlite::Error) -> Self {
        let constraint = matches!(
            &err,
            rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
        );
        if constraint {
            PersistenceError::ConstraintViolation {
                backend_name: "sqlite".to_string(),
                message: err.to_string(),
                source: Some(Box::new(err)),
            }
        } else {
            PersistenceError::Internal {
                backend_name: "sqlite".to_string(),
                message: err.to_string(),
                source: Some(Box::new(err)),
            }
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::Persistence(err.into())
    }
}

#[cfg(feature = "sqlite")]
impl From<r2d2::Error> for StorageError {
    fn from(_err: r2d2::Error) -> Self {
        StorageError::Persistence(PersistenceError::PoolExhausted {
            backend_name: "sqlite".to_string(),
        })
    }
}
