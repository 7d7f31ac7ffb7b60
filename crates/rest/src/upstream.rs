//! Client for the upstream OpenMRS REST API.
//!
//! The bridge writes to the OpenMRS database directly, so OpenMRS keeps its
//! own search index. The availability check tells operators whether the
//! index rebuild endpoint can be reached with the configured credentials,
//! without triggering a rebuild.

use std::time::Duration;

use http::{StatusCode, header};
use serde::Serialize;
use tracing::{debug, error};

use crate::config::ServerConfig;
use crate::error::{RestError, RestResult};

/// Path of the search index rebuild endpoint, relative to the base URL.
pub const SEARCH_INDEX_REBUILD_PATH: &str = "/ws/rest/v1/searchIndex/rebuild";

/// Outcome of an availability check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchIndexAvailability {
    /// True unless the endpoint is missing (404) or failing (5xx).
    pub available: bool,
    /// Status OpenMRS answered with.
    pub status_code: u16,
    /// Canonical reason phrase of the status.
    pub reason: Option<String>,
    /// The endpoint asked for credentials (401).
    pub requires_authentication: bool,
    /// Methods listed in the `Allow` header.
    pub allowed_methods: Option<Vec<String>>,
    /// Explanation for the statuses that need one.
    pub message: Option<String>,
}

impl SearchIndexAvailability {
    /// Interprets the status and `Allow` header of the `OPTIONS` response.
    pub fn assess(status: StatusCode, allow: Option<&str>) -> Self {
        let message = match status.as_u16() {
            404 => Some("Endpoint not found (404)."),
            500.. => Some("OpenMRS returned a server error."),
            401 => Some("Authentication required (401)."),
            405 => Some("Endpoint reachable; method not allowed (405) indicates POST is required."),
            _ => None,
        };
        Self {
            available: status != StatusCode::NOT_FOUND && !status.is_server_error(),
            status_code: status.as_u16(),
            reason: status.canonical_reason().map(String::from),
            requires_authentication: status == StatusCode::UNAUTHORIZED,
            allowed_methods: allow.map(|methods| {
                methods
                    .split(',')
                    .map(str::trim)
                    .filter(|method| !method.is_empty())
                    .map(String::from)
                    .collect()
            }),
            message: message.map(String::from),
        }
    }
}

/// HTTP client bound to one OpenMRS instance.
#[derive(Debug, Clone)]
pub struct OpenMrsClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Option<(String, String)>,
}

impl OpenMrsClient {
    /// Builds a client from the `openmrs_*` settings.
    pub fn from_config(config: &ServerConfig) -> RestResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.openmrs_timeout))
            .build()
            .map_err(|e| RestError::Internal {
                message: format!("Failed to build HTTP client: {}", e),
            })?;
        Ok(Self {
            http,
            base_url: config.openmrs_url.trim_end_matches('/').to_string(),
            credentials: config
                .openmrs_credentials()
                .map(|(user, password)| (user.to_string(), password.to_string())),
        })
    }

    /// Full URL of the search index rebuild endpoint.
    pub fn rebuild_url(&self) -> String {
        format!("{}{}", self.base_url, SEARCH_INDEX_REBUILD_PATH)
    }

    /// Sends `OPTIONS` to the rebuild endpoint.
    ///
    /// Any HTTP answer is reported, including 404 and 5xx. Only a transport
    /// failure (refused connection, timeout) is an error.
    pub async fn search_index_availability(&self) -> RestResult<SearchIndexAvailability> {
        let url = self.rebuild_url();
        let mut request = self.http.request(reqwest::Method::OPTIONS, &url);
        if let Some((user, password)) = &self.credentials {
            request = request.basic_auth(user, Some(password));
        }

        let response = request.send().await.map_err(|e| {
            error!(url = %url, error = %e, "Failed to reach OpenMRS search index endpoint");
            RestError::Upstream {
                message: format!("Unable to reach OpenMRS search index endpoint: {}", e),
            }
        })?;

        let allow = response
            .headers()
            .get(header::ALLOW)
            .and_then(|value| value.to_str().ok());
        let availability = SearchIndexAvailability::assess(response.status(), allow);
        debug!(url = %url, status = availability.status_code, "Checked search index endpoint");
        Ok(availability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_not_allowed_counts_as_available() {
        let result =
            SearchIndexAvailability::assess(StatusCode::METHOD_NOT_ALLOWED, Some("POST, GET"));
        assert!(result.available);
        assert!(!result.requires_authentication);
        assert_eq!(result.reason.as_deref(), Some("Method Not Allowed"));
        assert_eq!(
            result.allowed_methods,
            Some(vec!["POST".to_string(), "GET".to_string()])
        );
        assert!(result.message.unwrap().contains("POST is required"));
    }

    #[test]
    fn test_missing_and_failing_endpoints_are_unavailable() {
        let missing = SearchIndexAvailability::assess(StatusCode::NOT_FOUND, None);
        assert!(!missing.available);
        assert_eq!(missing.message.as_deref(), Some("Endpoint not found (404)."));

        let failing = SearchIndexAvailability::assess(StatusCode::BAD_GATEWAY, None);
        assert!(!failing.available);
        assert_eq!(failing.message.as_deref(), Some("OpenMRS returned a server error."));
    }

    #[test]
    fn test_unauthorized_is_available_but_flagged() {
        let result = SearchIndexAvailability::assess(StatusCode::UNAUTHORIZED, None);
        assert!(result.available);
        assert!(result.requires_authentication);
        assert_eq!(result.allowed_methods, None);

        let ok = SearchIndexAvailability::assess(StatusCode::OK, Some("OPTIONS"));
        assert!(ok.available);
        assert_eq!(ok.message, None);
    }

    #[test]
    fn test_rebuild_url_ignores_trailing_slash() {
        let config = ServerConfig {
            openmrs_url: "http://emr.local/openmrs/".to_string(),
            ..ServerConfig::for_testing()
        };
        let client = OpenMrsClient::from_config(&config).unwrap();
        assert_eq!(
            client.rebuild_url(),
            "http://emr.local/openmrs/ws/rest/v1/searchIndex/rebuild"
        );
    }
}
