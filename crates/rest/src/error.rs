//! Error types for the REST API.
//!
//! Every failure is rendered as the JSON envelope
//! `{ "success": false, "error": <title>, "detail": <message> }`.
//!
//! # Error Mapping
//!
//! | Error | HTTP Status | Title |
//! |-------|-------------|-------|
//! | Unauthorized | 401 | Unauthorized |
//! | NotFound / NoRoute | 404 | Not found |
//! | MethodNotAllowed | 405 | Method not allowed |
//! | Timeout | 408 | Request timeout |
//! | Validation | 422 | Validation error |
//! | Upstream | 502 | Bad gateway |
//! | Persistence | 500 | Storage error |
//! | AuthNotConfigured / Internal | 500 | Internal server error |
//!
//! Persistence failures are logged with their full cause chain; the client
//! only sees a short description of the failure kind.

use axum::{
    Json,
    response::{IntoResponse, Response},
};
use emr_persistence::{PersistenceError, StorageError, ValidationError};
use http::{HeaderValue, StatusCode, header::WWW_AUTHENTICATE};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// The primary error type for REST API operations.
#[derive(Debug, Error)]
pub enum RestError {
    /// Missing or unknown API key (HTTP 401).
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// Error message.
        message: String,
    },

    /// The server has no API keys configured (HTTP 500).
    #[error("No API keys configured")]
    AuthNotConfigured,

    /// No record with the given identity (HTTP 404).
    #[error("{record} not found: {identity}")]
    NotFound {
        /// Record type name.
        record: &'static str,
        /// How the record was addressed.
        identity: String,
    },

    /// No route matches the request path (HTTP 404).
    #[error("No route for {method} {path}")]
    NoRoute {
        /// Request method.
        method: String,
        /// Request path.
        path: String,
    },

    /// The path exists but not for this method (HTTP 405).
    #[error("Method {method} not allowed on {path}")]
    MethodNotAllowed {
        /// Request method.
        method: String,
        /// Request path.
        path: String,
    },

    /// The handler did not finish within the configured timeout (HTTP 408).
    #[error("Request timed out after {seconds}s")]
    Timeout {
        /// The configured limit.
        seconds: u64,
    },

    /// A remote service could not be reached (HTTP 502).
    #[error("Upstream error: {message}")]
    Upstream {
        /// Error message.
        message: String,
    },

    /// The request was well-formed HTTP but its content is invalid (HTTP 422).
    #[error("Validation error: {message}")]
    Validation {
        /// Error message.
        message: String,
    },

    /// The store failed (HTTP 500).
    #[error("Storage error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Internal server error (HTTP 500).
    #[error("Internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },
}

impl RestError {
    /// A 404 for `record` addressed by `identity`.
    pub fn not_found(record: &'static str, identity: impl std::fmt::Display) -> Self {
        RestError::NotFound {
            record,
            identity: identity.to_string(),
        }
    }

    /// A 422 with the given message.
    pub fn validation(message: impl Into<String>) -> Self {
        RestError::Validation {
            message: message.into(),
        }
    }

    /// The HTTP status this error maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            RestError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            RestError::NotFound { .. } | RestError::NoRoute { .. } => StatusCode::NOT_FOUND,
            RestError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            RestError::Timeout { .. } => StatusCode::REQUEST_TIMEOUT,
            RestError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            RestError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            RestError::AuthNotConfigured
            | RestError::Persistence(_)
            | RestError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn title(&self) -> &'static str {
        match self {
            RestError::Unauthorized { .. } => "Unauthorized",
            RestError::NotFound { .. } | RestError::NoRoute { .. } => "Not found",
            RestError::MethodNotAllowed { .. } => "Method not allowed",
            RestError::Timeout { .. } => "Request timeout",
            RestError::Upstream { .. } => "Bad gateway",
            RestError::Validation { .. } => "Validation error",
            RestError::Persistence(_) => "Storage error",
            RestError::AuthNotConfigured | RestError::Internal { .. } => "Internal server error",
        }
    }

    fn detail(&self) -> String {
        match self {
            RestError::Unauthorized { message }
            | RestError::Validation { message }
            | RestError::Upstream { message }
            | RestError::Internal { message } => message.clone(),
            RestError::NoRoute { .. }
            | RestError::MethodNotAllowed { .. }
            | RestError::Timeout { .. } => self.to_string(),
            RestError::AuthNotConfigured => "No API keys configured".to_string(),
            RestError::NotFound { record, identity } => {
                format!("{} with {} not found", record, identity)
            }
            RestError::Persistence(e) => e.kind().to_string(),
        }
    }
}

/// Failure envelope.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Always false.
    pub success: bool,
    /// Short error title.
    pub error: &'static str,
    /// Human-readable detail.
    pub detail: String,
}

impl IntoResponse for RestError {
    fn into_response(self) -> Response {
        if let RestError::Persistence(cause) = &self {
            error!(error = %cause, source = ?std::error::Error::source(cause), "Storage failure");
        }

        let status = self.status();
        let body = ErrorBody {
            success: false,
            error: self.title(),
            detail: self.detail(),
        };
        let mut response = (status, Json(body)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl From<StorageError> for RestError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Validation(e) => e.into(),
            StorageError::Persistence(e) => e.into(),
        }
    }
}

impl From<ValidationError> for RestError {
    fn from(err: ValidationError) -> Self {
        RestError::Validation {
            message: err.to_string(),
        }
    }
}

/// Result type for REST handlers.
pub type RestResult<T> = Result<T, RestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            RestError::Unauthorized {
                message: "API key required".to_string()
            }
            .status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(RestError::not_found("Order", "x").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            RestError::validation("bad").status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            RestError::AuthNotConfigured.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_transport_failures_keep_the_envelope_fields() {
        let timeout = RestError::Timeout { seconds: 5 };
        assert_eq!(timeout.status(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(timeout.title(), "Request timeout");
        assert_eq!(timeout.detail(), "Request timed out after 5s");

        let no_route = RestError::NoRoute {
            method: "GET".to_string(),
            path: "/api/nowhere".to_string(),
        };
        assert_eq!(no_route.status(), StatusCode::NOT_FOUND);
        assert_eq!(no_route.detail(), "No route for GET /api/nowhere");
    }

    #[test]
    fn test_storage_validation_maps_to_422() {
        let err: RestError = StorageError::Validation(ValidationError::InvalidUuid {
            value: "nope".to_string(),
        })
        .into();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.detail(), "invalid UUID format: nope");
    }

    #[test]
    fn test_persistence_detail_hides_cause() {
        let err: RestError = StorageError::Persistence(PersistenceError::Internal {
            backend_name: "sqlite".to_string(),
            message: "disk I/O error at /var/lib/bridge.db".to_string(),
            source: None,
        })
        .into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.detail(), "internal store error");
    }

    #[test]
    fn test_unauthorized_response_carries_challenge() {
        let response = RestError::Unauthorized {
            message: "Invalid API key".to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[WWW_AUTHENTICATE], "Bearer");
    }
}
