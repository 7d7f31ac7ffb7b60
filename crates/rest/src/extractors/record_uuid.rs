//! Record UUID path extractor.

use axum::extract::FromRequestParts;
use emr_persistence::types::normalize_uuid;
use emr_persistence::Identity;
use http::request::Parts;

use super::ApiPath;
use crate::error::RestError;

/// The `{uuid}` path segment, validated and lowercased.
///
/// A malformed UUID is rejected with 422 before any lookup happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordUuid(pub String);

impl RecordUuid {
    /// The canonical UUID.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The UUID as an accessor identity.
    pub fn identity(&self) -> Identity {
        Identity::Uuid(self.0.clone())
    }
}

impl<S> FromRequestParts<S> for RecordUuid
where
    S: Send + Sync,
{
    type Rejection = RestError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let ApiPath(raw) = ApiPath::<String>::from_request_parts(parts, state).await?;
        Ok(RecordUuid(normalize_uuid(&raw)?))
    }
}
