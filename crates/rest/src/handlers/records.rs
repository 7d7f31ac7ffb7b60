//! Generic record handlers.
//!
//! One set of handlers serves every [`RestResource`]; the router
//! instantiates them per record type. Single-record operations address the
//! record by UUID.
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | POST | `/api/{resource}` | [`create_handler`] |
//! | GET | `/api/{resource}` | [`list_handler`] |
//! | GET | `/api/{resource}/retired` or `/voided` | [`list_retired_handler`] |
//! | GET | `/api/{resource}/{scope}/{value}` | [`scoped_list_handler`] |
//! | GET | `/api/{resource}/uuid/{uuid}` | [`read_handler`] |
//! | PATCH | `/api/{resource}/uuid/{uuid}` | [`patch_handler`] |
//! | PUT | `/api/{resource}/uuid/{uuid}` | [`replace_handler`] |
//! | POST | `/api/{resource}/uuid/{uuid}/retire` or `/void` | [`retire_handler`] |
//! | POST | `/api/{resource}/uuid/{uuid}/unretire` or `/unvoid` | [`unretire_handler`] |

use axum::extract::State;
use emr_persistence::Store;
use emr_persistence::core::{EntityAccessor, Visibility};
use serde::Deserialize;
use tracing::{debug, info};

use crate::auth::ApiKey;
use crate::error::{RestError, RestResult};
use crate::extractors::{ApiJson, ApiPath, ApiQuery, Pagination, RecordUuid};
use crate::resource::RestResource;
use crate::responses::{Envelope, UpdateEnvelope};
use crate::state::AppState;

/// Query parameters of listing endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    /// Include retired / voided records.
    #[serde(default)]
    pub include_retired: bool,
}

/// Query parameters of the retire / void action.
#[derive(Debug, Deserialize)]
pub struct RetireParams {
    /// Acting user.
    #[serde(alias = "retired_by", alias = "voided_by")]
    pub by: i64,
    /// Reason for the retirement.
    #[serde(default)]
    pub reason: Option<String>,
}

/// Query parameters of the unretire / unvoid action.
#[derive(Debug, Deserialize)]
pub struct UnretireParams {
    /// Acting user.
    #[serde(alias = "unretired_by", alias = "unvoided_by")]
    pub by: i64,
}

fn accessor<R: RestResource, S: Store + 'static>(state: &AppState<S>) -> EntityAccessor<R, S> {
    EntityAccessor::new(state.storage_arc())
}

/// Creates a record.
///
/// # HTTP Request
///
/// `POST /api/{resource}` with the creation payload as JSON.
///
/// # Response
///
/// - `200 OK` - The stored record, including its new `uuid`
/// - `422 Unprocessable Entity` - The payload could not be decoded
pub async fn create_handler<R, S>(
    State(state): State<AppState<S>>,
    _key: ApiKey,
    ApiJson(draft): ApiJson<R::Draft>,
) -> RestResult<Envelope<R>>
where
    R: RestResource,
    S: Store + 'static,
{
    debug!(record = R::NAME, "Processing create request");
    let record = accessor::<R, S>(&state).create(draft).await?;
    Ok(Envelope::new(record))
}

/// Lists records in id order. Retired records are excluded unless
/// `include_retired=true`.
pub async fn list_handler<R, S>(
    State(state): State<AppState<S>>,
    _key: ApiKey,
    pagination: Pagination,
    ApiQuery(params): ApiQuery<ListParams>,
) -> RestResult<Envelope<Vec<R>>>
where
    R: RestResource,
    S: Store + 'static,
{
    let visibility = Visibility::including_retired(params.include_retired);
    let records = accessor::<R, S>(&state)
        .list_with(visibility, pagination.page())
        .await?;
    Ok(Envelope::new(records))
}

/// Lists retired (voided) records only.
pub async fn list_retired_handler<R, S>(
    State(state): State<AppState<S>>,
    _key: ApiKey,
    pagination: Pagination,
) -> RestResult<Envelope<Vec<R>>>
where
    R: RestResource,
    S: Store + 'static,
{
    let records = accessor::<R, S>(&state)
        .list_retired(pagination.page())
        .await?;
    Ok(Envelope::new(records))
}

/// Lists records sharing a foreign key or attribute value.
///
/// `scope` is fixed per route (`patient`, `encounter`, ...); the router
/// binds it when the route is registered.
pub async fn scoped_list_handler<R, S>(
    scope: &'static str,
    State(state): State<AppState<S>>,
    _key: ApiKey,
    ApiPath(value): ApiPath<String>,
    pagination: Pagination,
    ApiQuery(params): ApiQuery<ListParams>,
) -> RestResult<Envelope<Vec<R>>>
where
    R: RestResource,
    S: Store + 'static,
{
    debug!(record = R::NAME, scope, value = %value, "Processing scoped listing");
    let Some(filter) = R::scope_filter(scope, &value)? else {
        return Ok(Envelope::new(Vec::new()));
    };
    let visibility = Visibility::including_retired(params.include_retired);
    let records = accessor::<R, S>(&state)
        .list_by(&filter, visibility, pagination.page())
        .await?;
    Ok(Envelope::new(records))
}

/// Reads a record by UUID.
///
/// # Response
///
/// - `200 OK` - The record, whether active or retired
/// - `404 Not Found` - No record has this UUID
/// - `422 Unprocessable Entity` - The UUID is malformed
pub async fn read_handler<R, S>(
    State(state): State<AppState<S>>,
    _key: ApiKey,
    uuid: RecordUuid,
) -> RestResult<Envelope<R>>
where
    R: RestResource,
    S: Store + 'static,
{
    debug!(record = R::NAME, uuid = %uuid.as_str(), "Processing read request");
    accessor::<R, S>(&state)
        .fetch_by_uuid(uuid.as_str())
        .await?
        .map(Envelope::new)
        .ok_or_else(|| RestError::not_found(R::NAME, uuid.identity()))
}

/// Applies a partial update. Only the fields present in the body are
/// written; an explicit `null` clears a nullable field.
///
/// # Response
///
/// - `200 OK` - Update envelope listing the changed columns
/// - `404 Not Found` - No record has this UUID
/// - `422 Unprocessable Entity` - Malformed UUID or body, or `null` for a
///   required field
pub async fn patch_handler<R, S>(
    State(state): State<AppState<S>>,
    _key: ApiKey,
    uuid: RecordUuid,
    ApiJson(changes): ApiJson<R::Changes>,
) -> RestResult<UpdateEnvelope<R>>
where
    R: RestResource,
    S: Store + 'static,
{
    debug!(record = R::NAME, uuid = %uuid.as_str(), "Processing partial update");
    let identity = uuid.identity();
    let updated = accessor::<R, S>(&state)
        .update_partial_tracked(&identity, &changes)
        .await?
        .ok_or_else(|| RestError::not_found(R::NAME, &identity))?;
    info!(
        record = R::NAME,
        uuid = %uuid.as_str(),
        fields = ?updated.updated_fields,
        "Partial update applied"
    );
    Ok(UpdateEnvelope::new(R::NAME, updated))
}

/// Replaces every writable field of a record.
///
/// Nullable fields missing from the body are cleared. A `uuid` in the body
/// must match the addressed record.
pub async fn replace_handler<R, S>(
    State(state): State<AppState<S>>,
    _key: ApiKey,
    uuid: RecordUuid,
    ApiJson(replacement): ApiJson<R::Replacement>,
) -> RestResult<UpdateEnvelope<R>>
where
    R: RestResource,
    S: Store + 'static,
{
    debug!(record = R::NAME, uuid = %uuid.as_str(), "Processing full replace");
    let identity = uuid.identity();
    let updated = accessor::<R, S>(&state)
        .update_full_tracked(&identity, &replacement)
        .await?
        .ok_or_else(|| RestError::not_found(R::NAME, &identity))?;
    info!(
        record = R::NAME,
        uuid = %uuid.as_str(),
        fields = ?updated.updated_fields,
        "Full replace applied"
    );
    Ok(UpdateEnvelope::new(R::NAME, updated))
}

/// Retires (voids) a record. Repeating the call re-stamps the actor.
pub async fn retire_handler<R, S>(
    State(state): State<AppState<S>>,
    _key: ApiKey,
    uuid: RecordUuid,
    ApiQuery(params): ApiQuery<RetireParams>,
) -> RestResult<Envelope<R>>
where
    R: RestResource,
    S: Store + 'static,
{
    let identity = uuid.identity();
    accessor::<R, S>(&state)
        .retire(&identity, params.by, params.reason.as_deref())
        .await?
        .map(Envelope::new)
        .ok_or_else(|| RestError::not_found(R::NAME, &identity))
}

/// Returns a record to the active state.
pub async fn unretire_handler<R, S>(
    State(state): State<AppState<S>>,
    _key: ApiKey,
    uuid: RecordUuid,
    ApiQuery(params): ApiQuery<UnretireParams>,
) -> RestResult<Envelope<R>>
where
    R: RestResource,
    S: Store + 'static,
{
    let identity = uuid.identity();
    accessor::<R, S>(&state)
        .unretire(&identity, params.by)
        .await?
        .map(Envelope::new)
        .ok_or_else(|| RestError::not_found(R::NAME, &identity))
}
