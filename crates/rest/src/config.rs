//! Server configuration for the bridge REST API.
//!
//! Every option can be given on the command line or through the environment.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `BRIDGE_PORT` | 1221 | Server port |
//! | `BRIDGE_HOST` | 0.0.0.0 | Host to bind |
//! | `BRIDGE_LOG_LEVEL` | info | Log level |
//! | `BRIDGE_DATABASE_URL` | bridge.db | SQLite database path, or `:memory:` |
//! | `BRIDGE_API_KEYS` | (none) | Comma-separated list of accepted API keys |
//! | `BRIDGE_DEFAULT_PAGE_SIZE` | 100 | Page size when a request gives no `limit` |
//! | `BRIDGE_MAX_PAGE_SIZE` | 1000 | Ceiling for `limit` |
//! | `BRIDGE_REQUEST_TIMEOUT` | 30 | Request timeout (seconds) |
//! | `BRIDGE_MAX_BODY_SIZE` | 1048576 | Max request body (bytes) |
//! | `BRIDGE_ENABLE_CORS` | true | Enable CORS |
//! | `BRIDGE_CORS_ORIGINS` | * | Allowed origins |
//! | `BRIDGE_OPENMRS_URL` | http://localhost:8080/openmrs | Base URL of the upstream OpenMRS |
//! | `BRIDGE_OPENMRS_USERNAME` | (none) | Upstream REST user |
//! | `BRIDGE_OPENMRS_PASSWORD` | (none) | Upstream REST password |
//! | `BRIDGE_OPENMRS_TIMEOUT` | 10 | Upstream request timeout (seconds) |
//!
//! # Example
//!
//! ```rust
//! use emr_rest::ServerConfig;
//!
//! let config = ServerConfig {
//!     port: 3000,
//!     api_keys: "omrs_0123456789abcdef0123456789abcdef".to_string(),
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use clap::Parser;

/// Server configuration for the bridge REST API.
#[derive(Debug, Clone, Parser)]
#[command(name = "emr-bridge")]
#[command(about = "Authenticated REST bridge over a clinical records database")]
pub struct ServerConfig {
    /// Port to listen on.
    #[arg(short, long, env = "BRIDGE_PORT", default_value = "1221")]
    pub port: u16,

    /// Host address to bind to.
    #[arg(long, env = "BRIDGE_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "BRIDGE_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// SQLite database path, or `:memory:`.
    #[arg(long, env = "BRIDGE_DATABASE_URL", default_value = "bridge.db")]
    pub database_url: String,

    /// Accepted API keys, comma separated.
    #[arg(long, env = "BRIDGE_API_KEYS", default_value = "")]
    pub api_keys: String,

    /// Page size used when a request does not give a limit.
    #[arg(long, env = "BRIDGE_DEFAULT_PAGE_SIZE", default_value = "100")]
    pub default_page_size: u64,

    /// Largest page size a request may ask for. Larger limits are clamped.
    #[arg(long, env = "BRIDGE_MAX_PAGE_SIZE", default_value = "1000")]
    pub max_page_size: u64,

    /// Request timeout in seconds.
    #[arg(long, env = "BRIDGE_REQUEST_TIMEOUT", default_value = "30")]
    pub request_timeout: u64,

    /// Maximum request body size in bytes.
    #[arg(long, env = "BRIDGE_MAX_BODY_SIZE", default_value = "1048576")]
    pub max_body_size: usize,

    /// Enable CORS.
    #[arg(long, env = "BRIDGE_ENABLE_CORS", default_value = "true")]
    pub enable_cors: bool,

    /// Allowed CORS origins (comma-separated, or * for all).
    #[arg(long, env = "BRIDGE_CORS_ORIGINS", default_value = "*")]
    pub cors_origins: String,

    /// Base URL of the upstream OpenMRS, without the `/ws/rest` suffix.
    #[arg(
        long,
        env = "BRIDGE_OPENMRS_URL",
        default_value = "http://localhost:8080/openmrs"
    )]
    pub openmrs_url: String,

    /// Upstream REST user. Basic auth is sent only with a password as well.
    #[arg(long, env = "BRIDGE_OPENMRS_USERNAME")]
    pub openmrs_username: Option<String>,

    /// Upstream REST password.
    #[arg(long, env = "BRIDGE_OPENMRS_PASSWORD", hide_env_values = true)]
    pub openmrs_password: Option<String>,

    /// Upstream request timeout in seconds.
    #[arg(long, env = "BRIDGE_OPENMRS_TIMEOUT", default_value = "10")]
    pub openmrs_timeout: u64,

    /// Print a freshly generated API key and exit.
    #[arg(long)]
    pub generate_api_key: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 1221,
            host: "0.0.0.0".to_string(),
            log_level: "info".to_string(),
            database_url: "bridge.db".to_string(),
            api_keys: String::new(),
            default_page_size: 100,
            max_page_size: 1000,
            request_timeout: 30,
            max_body_size: 1024 * 1024, // 1MB
            enable_cors: true,
            cors_origins: "*".to_string(),
            openmrs_url: "http://localhost:8080/openmrs".to_string(),
            openmrs_username: None,
            openmrs_password: None,
            openmrs_timeout: 10,
            generate_api_key: false,
        }
    }
}

impl ServerConfig {
    /// Returns the socket address to bind to.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The configured API keys, trimmed, without empty entries.
    pub fn api_key_list(&self) -> Vec<String> {
        self.api_keys
            .split(',')
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(String::from)
            .collect()
    }

    /// Username and password for the upstream, when both are set.
    pub fn openmrs_credentials(&self) -> Option<(&str, &str)> {
        match (&self.openmrs_username, &self.openmrs_password) {
            (Some(user), Some(password)) if !user.is_empty() && !password.is_empty() => {
                Some((user.as_str(), password.as_str()))
            }
            _ => None,
        }
    }

    /// Validates the configuration and returns errors if any.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.max_body_size == 0 {
            errors.push("Max body size cannot be 0".to_string());
        }

        if self.request_timeout == 0 {
            errors.push("Request timeout cannot be 0".to_string());
        }

        if self.default_page_size == 0 {
            errors.push("Default page size cannot be 0".to_string());
        }

        if self.default_page_size > self.max_page_size {
            errors.push("Default page size cannot exceed max page size".to_string());
        }

        if self.openmrs_timeout == 0 {
            errors.push("OpenMRS timeout cannot be 0".to_string());
        }

        if self.database_url.trim().is_empty() {
            errors.push("Database URL cannot be empty".to_string());
        }

        if self.api_key_list().is_empty() {
            errors.push("At least one API key must be configured (BRIDGE_API_KEYS)".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Creates a configuration suitable for testing: an in-memory database,
    /// a single known API key and small pages.
    pub fn for_testing() -> Self {
        Self {
            port: 0,
            host: "127.0.0.1".to_string(),
            log_level: "debug".to_string(),
            database_url: ":memory:".to_string(),
            api_keys: "omrs_00000000000000000000000000000000".to_string(),
            default_page_size: 10,
            max_page_size: 100,
            request_timeout: 5,
            max_body_size: 1024 * 1024,
            enable_cors: false,
            cors_origins: "*".to_string(),
            openmrs_url: "http://127.0.0.1:9".to_string(),
            openmrs_username: None,
            openmrs_password: None,
            openmrs_timeout: 2,
            generate_api_key: false,
        }
    }
}
