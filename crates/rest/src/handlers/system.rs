//! Operational checks against the upstream OpenMRS.

use axum::extract::State;
use emr_persistence::Store;

use crate::auth::ApiKey;
use crate::error::RestResult;
use crate::responses::Envelope;
use crate::state::AppState;
use crate::upstream::{OpenMrsClient, SearchIndexAvailability};

/// Checks the OpenMRS search index rebuild endpoint with an `OPTIONS`
/// request.
///
/// `GET /api/system/search-index/availability`
///
/// # Response
///
/// - `200 OK` - Whatever OpenMRS answered, interpreted
/// - `502 Bad Gateway` - OpenMRS could not be reached
pub async fn search_index_availability_handler<S>(
    State(state): State<AppState<S>>,
    _key: ApiKey,
) -> RestResult<Envelope<SearchIndexAvailability>>
where
    S: Store + 'static,
{
    let client = OpenMrsClient::from_config(state.config())?;
    let availability = client.search_index_availability().await?;
    Ok(Envelope::new(availability))
}
