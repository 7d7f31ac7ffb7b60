//! Health check endpoint handler.

use axum::{Json, extract::State};
use emr_persistence::Store;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::RestResult;
use crate::state::AppState;

/// Handler for the health check endpoint.
///
/// Unauthenticated. Runs the store's own health check, so a reachable
/// process with a broken database reports failure.
///
/// # HTTP Request
///
/// `GET /health`
///
/// # Response
///
/// - `200 OK` - The store answered
/// - `500 Internal Server Error` - The store check failed
pub async fn health_handler<S>(State(state): State<AppState<S>>) -> RestResult<Json<Value>>
where
    S: Store + 'static,
{
    debug!("Processing health check request");

    state.storage().health_check().await?;

    Ok(Json(json!({
        "status": "healthy",
        "backend": state.storage().backend_name(),
        "version": emr_persistence::VERSION,
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}
