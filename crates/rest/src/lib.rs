//! # emr-rest
//!
//! Authenticated REST transport for the EMR bridge.
//!
//! This crate exposes the record accessors of [`emr_persistence`] over HTTP
//! using [Axum](https://github.com/tokio-rs/axum). Every `/api` route requires
//! an API key (`Authorization: Bearer <key>`); `/health` does not.
//!
//! ## Responses
//!
//! Successful responses are wrapped as `{ "success": true, "data": ... }`.
//! Partial updates and full replaces add `message` and `updated_fields`.
//! Failures are `{ "success": false, "error": ..., "detail": ... }` with
//! status 401, 404, 405, 408, 422, 500 or 502. Unknown routes and requests
//! that exceed the configured timeout use the same envelope.
//!
//! ## Records
//!
//! | Resource | Path | Soft delete |
//! |----------|------|-------------|
//! | Order | `/api/orders` | void |
//! | Observation | `/api/observations` | void |
//! | Concept | `/api/concepts` | retire |
//! | Encounter | `/api/encounters` | void |
//! | Visit | `/api/visits` | void |
//! | Visit type | `/api/visit-types` | retire |
//! | Order type | `/api/order-types` | retire |
//! | Drug | `/api/drugs` | retire |
//! | Diagnosis (read only) | `/api/diagnoses` | |
//! | Vital signs (read only) | `/api/vitals` | |
//! | Provider (read only) | `/api/providers` | |
//!
//! `GET /api/system/search-index/availability` checks whether the upstream
//! OpenMRS search index endpoint is reachable, see [`upstream`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use emr_rest::{ServerConfig, create_app_with_config};
//! use emr_persistence::SqliteBackend;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::for_testing();
//!     let backend = SqliteBackend::in_memory()?;
//!     let app = create_app_with_config(backend, config.clone());
//!
//!     let listener = tokio::net::TcpListener::bind(config.socket_addr()).await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

// Enforce documentation
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod auth;
pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod resource;
pub mod responses;
pub mod routing;
pub mod state;
pub mod upstream;

// Re-export commonly used types
pub use auth::{ApiKey, ApiKeyGate, AuthDecision, generate_api_key, is_well_formed_key};
pub use config::ServerConfig;
pub use error::{RestError, RestResult};
pub use resource::RestResource;
pub use state::AppState;

use std::sync::Arc;

use std::time::Duration;

use axum::{BoxError, Router, error_handling::HandleErrorLayer, extract::DefaultBodyLimit};
use emr_persistence::Store;
use http::{HeaderName, HeaderValue, Method, header};
use tower::{ServiceBuilder, timeout::TimeoutLayer, timeout::error::Elapsed};
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};

/// Creates the Axum application with default configuration.
///
/// The default configuration has no API keys, so every `/api` request is
/// answered with 500 until keys are configured. Use
/// [`create_app_with_config`] for a usable server.
pub fn create_app<S>(storage: S) -> Router
where
    S: Store + 'static,
{
    create_app_with_config(storage, ServerConfig::default())
}

/// Creates the Axum application with custom configuration.
///
/// # Arguments
///
/// * `storage` - The store to serve
/// * `config` - Server configuration
pub fn create_app_with_config<S>(storage: S, config: ServerConfig) -> Router
where
    S: Store + 'static,
{
    create_app_shared(Arc::new(storage), config)
}

/// Creates the Axum application over a store the caller keeps a handle to.
pub fn create_app_shared<S>(storage: Arc<S>, config: ServerConfig) -> Router
where
    S: Store + 'static,
{
    info!(backend = storage.backend_name(), "Creating REST API server");

    let state = AppState::new(storage, config.clone());
    if state.gate().is_empty() {
        warn!("No API keys configured; every /api request will be rejected");
    }

    let router = routing::create_routes(state);
    with_middleware(router, &config)
}

/// Wraps `router` in the request id, tracing, timeout, body limit and CORS
/// layers.
fn with_middleware(router: Router, config: &ServerConfig) -> Router {
    let seconds = config.request_timeout;
    let x_request_id = HeaderName::from_static("x-request-id");
    let service_builder = ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::new(x_request_id))
        .layer(HandleErrorLayer::new(move |err: BoxError| async move {
            middleware_error(err, seconds)
        }))
        .layer(TimeoutLayer::new(Duration::from_secs(seconds)));

    let router = router.layer(DefaultBodyLimit::max(config.max_body_size));

    // Add CORS if enabled
    let router = if config.enable_cors {
        router.layer(build_cors_layer(config))
    } else {
        router
    };

    router.layer(service_builder)
}

/// Maps a failure of the middleware stack to the error envelope.
fn middleware_error(err: BoxError, seconds: u64) -> RestError {
    if err.is::<Elapsed>() {
        warn!(timeout_secs = seconds, "Request timed out");
        RestError::Timeout { seconds }
    } else {
        error!(error = %err, "Unhandled middleware error");
        RestError::Internal {
            message: "Unhandled middleware error".to_string(),
        }
    }
}

/// Builds the CORS layer based on configuration.
fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    if config.cors_origins == "*" {
        cors.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors.allow_origin(origins)
    }
}

/// Initializes the tracing subscriber for logging.
///
/// This should be called once at application startup. `RUST_LOG` overrides
/// `level` when set.
///
/// # Arguments
///
/// * `level` - The log level (error, warn, info, debug, trace)
pub fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "emr_bridge={level},emr_rest={level},emr_persistence={level},tower_http=debug"
        ))
    });

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}
