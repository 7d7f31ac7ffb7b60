//! API key authentication.
//!
//! Callers present a key as `Authorization: Bearer <key>`. The gate only
//! checks membership in the configured key list; keys carry no scopes.
//!
//! Handlers take an [`ApiKey`] argument, so a request that fails the check
//! never reaches the record accessors:
//!
//! | Situation | Status | Detail |
//! |-----------|--------|--------|
//! | No bearer credential | 401 | `API key required` |
//! | No keys configured on the server | 500 | `No API keys configured` |
//! | Key not in the configured list | 401 | `Invalid API key` |

use std::collections::HashSet;

use axum::extract::FromRequestParts;
use http::{HeaderMap, header::AUTHORIZATION, request::Parts};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::RestError;
use crate::state::AppState;

/// Prefix shared by every generated key.
pub const KEY_PREFIX: &str = "omrs_";

/// Generates a new API key: [`KEY_PREFIX`] followed by 32 lowercase hex
/// characters taken from a random v4 UUID.
pub fn generate_api_key() -> String {
    format!("{}{}", KEY_PREFIX, Uuid::new_v4().simple())
}

/// Returns true if `key` has the shape produced by [`generate_api_key`].
///
/// Configured keys are not required to be well formed; this is a helper for
/// tooling that issues keys.
pub fn is_well_formed_key(key: &str) -> bool {
    key.strip_prefix(KEY_PREFIX).is_some_and(|hex| {
        hex.len() == 32
            && hex
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    })
}

/// Outcome of checking a presented key against the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDecision {
    /// The key is in the configured list.
    Authorized,
    /// The key is not in the configured list.
    Rejected,
}

/// The set of accepted API keys.
#[derive(Debug, Clone, Default)]
pub struct ApiKeyGate {
    keys: HashSet<String>,
}

impl ApiKeyGate {
    /// Creates a gate accepting exactly `keys`.
    pub fn new<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Parses a comma-separated key list. Entries are trimmed and empty
    /// entries dropped.
    pub fn from_list(list: &str) -> Self {
        Self::new(list.split(',').map(str::trim).filter(|key| !key.is_empty()))
    }

    /// Number of accepted keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns true if no key is configured.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Membership check.
    pub fn authorize(&self, key: &str) -> AuthDecision {
        if self.keys.contains(key) {
            AuthDecision::Authorized
        } else {
            AuthDecision::Rejected
        }
    }

    /// Full check of an optional presented key, in the order the responses
    /// table above lists.
    pub fn check(&self, presented: Option<&str>) -> Result<ApiKey, RestError> {
        let Some(key) = presented else {
            return Err(RestError::Unauthorized {
                message: "API key required".to_string(),
            });
        };
        if self.is_empty() {
            warn!("Request rejected: no API keys are configured");
            return Err(RestError::AuthNotConfigured);
        }
        match self.authorize(key) {
            AuthDecision::Authorized => Ok(ApiKey(key.to_string())),
            AuthDecision::Rejected => {
                warn!("Request rejected: invalid API key");
                Err(RestError::Unauthorized {
                    message: "Invalid API key".to_string(),
                })
            }
        }
    }
}

/// Extracts the bearer token from an `Authorization` header.
///
/// The scheme name is matched case-insensitively. Any other scheme, or an
/// empty token, counts as no credential.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// An authorized API key.
///
/// Taking this as a handler argument makes the handler unreachable without
/// a valid key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// The key as presented.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<S> FromRequestParts<AppState<S>> for ApiKey
where
    S: Send + Sync,
{
    type Rejection = RestError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S>,
    ) -> Result<Self, Self::Rejection> {
        let key = state.gate().check(bearer_token(&parts.headers))?;
        debug!(path = %parts.uri.path(), "API key accepted");
        Ok(key)
    }
}
