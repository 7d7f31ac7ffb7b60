//! Axum extractors for the bridge API.
//!
//! - [`Pagination`] - `skip` / `limit` query parameters, clamped to the
//!   configured ceiling
//! - [`ApiJson`] - JSON request bodies whose decode failures become 422
//!   envelopes
//! - [`ApiPath`] / [`ApiQuery`] - path and query parameters whose decode
//!   failures become 422 envelopes
//! - [`RecordUuid`] - a validated, canonical record UUID from the path

mod json;
mod pagination;
mod params;
mod record_uuid;

pub use json::ApiJson;
pub use pagination::Pagination;
pub use params::{ApiPath, ApiQuery};
pub use record_uuid::RecordUuid;
