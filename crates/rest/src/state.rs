//! Application state shared by every request handler.

use std::sync::Arc;

use emr_persistence::Store;

use crate::auth::ApiKeyGate;
use crate::config::ServerConfig;

/// Shared application state for the REST API.
///
/// Holds the store, the server configuration and the API key gate.
///
/// # Type Parameters
///
/// * `S` - The store implementation (must implement [`Store`])
///
/// # Example
///
/// ```rust,ignore
/// use emr_rest::{AppState, ServerConfig};
/// use emr_persistence::SqliteBackend;
/// use std::sync::Arc;
///
/// let backend = SqliteBackend::in_memory()?;
/// let state = AppState::new(Arc::new(backend), ServerConfig::for_testing());
/// ```
pub struct AppState<S: ?Sized> {
    /// The store.
    storage: Arc<S>,

    /// Server configuration.
    config: Arc<ServerConfig>,

    /// Accepted API keys.
    gate: Arc<ApiKeyGate>,
}

// Manually implement Clone since S is wrapped in Arc and doesn't need to be Clone
impl<S: ?Sized> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            config: Arc::clone(&self.config),
            gate: Arc::clone(&self.gate),
        }
    }
}

impl<S: Store + ?Sized> AppState<S> {
    /// Creates a new AppState. The key gate is built from
    /// `config.api_keys`.
    pub fn new(storage: Arc<S>, config: ServerConfig) -> Self {
        let gate = ApiKeyGate::from_list(&config.api_keys);
        Self {
            storage,
            config: Arc::new(config),
            gate: Arc::new(gate),
        }
    }

    /// Returns a reference to the store.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Returns a clone of the store Arc.
    pub fn storage_arc(&self) -> Arc<S> {
        Arc::clone(&self.storage)
    }
}

impl<S: ?Sized> AppState<S> {
    /// Returns a reference to the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the API key gate.
    pub fn gate(&self) -> &ApiKeyGate {
        &self.gate
    }

    /// Returns the default page size for listings.
    pub fn default_page_size(&self) -> u64 {
        self.config.default_page_size
    }

    /// Returns the maximum page size for listings.
    pub fn max_page_size(&self) -> u64 {
        self.config.max_page_size
    }
}
