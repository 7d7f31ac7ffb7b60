//! Answers for requests no route handles, in the usual error envelope.

use axum::http::{Method, Uri};

use crate::error::RestError;

/// 404 for a path with no route.
pub async fn route_not_found(method: Method, uri: Uri) -> RestError {
    RestError::NoRoute {
        method: method.to_string(),
        path: uri.path().to_string(),
    }
}

/// 405 for a known path requested with an unsupported method.
pub async fn method_not_allowed(method: Method, uri: Uri) -> RestError {
    RestError::MethodNotAllowed {
        method: method.to_string(),
        path: uri.path().to_string(),
    }
}
