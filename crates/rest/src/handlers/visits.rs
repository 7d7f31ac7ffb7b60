//! Visit listings and the stop action.
//!
//! Create, read, update and void go through the generic record handlers;
//! these endpoints cover what is specific to visits. Listings return active
//! visits only, newest first.

use axum::extract::State;
use chrono::{DateTime, Utc};
use emr_persistence::Store;
use emr_persistence::core::Record;
use emr_persistence::records::{Visit, VisitAccessor};
use serde::Deserialize;
use tracing::debug;

use crate::auth::ApiKey;
use crate::error::{RestError, RestResult};
use crate::extractors::{ApiPath, ApiQuery, Pagination, RecordUuid};
use crate::responses::Envelope;
use crate::state::AppState;

fn accessor<S: Store + 'static>(state: &AppState<S>) -> VisitAccessor<S> {
    VisitAccessor::new(state.storage_arc())
}

/// Optional patient restriction.
#[derive(Debug, Default, Deserialize)]
pub struct PatientParams {
    /// Only visits of this patient.
    #[serde(default)]
    pub patient_id: Option<i64>,
}

/// Window on `date_started`. Either bound may be left open.
#[derive(Debug, Default, Deserialize)]
pub struct VisitRangeParams {
    /// Inclusive lower bound (RFC 3339).
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    /// Inclusive upper bound (RFC 3339).
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    /// Only visits of this patient.
    #[serde(default)]
    pub patient_id: Option<i64>,
}

/// Query parameters of the stop action.
#[derive(Debug, Deserialize)]
pub struct StopParams {
    /// Acting user.
    pub stopped_by: i64,
    /// Stop time; now when omitted.
    #[serde(default)]
    pub date_stopped: Option<DateTime<Utc>>,
}

/// Visits that have not been stopped.
///
/// `GET /api/visits/active?patient_id=...`
pub async fn active_visits_handler<S>(
    State(state): State<AppState<S>>,
    _key: ApiKey,
    pagination: Pagination,
    ApiQuery(params): ApiQuery<PatientParams>,
) -> RestResult<Envelope<Vec<Visit>>>
where
    S: Store + 'static,
{
    let visits = accessor(&state)
        .list_active(params.patient_id, pagination.page())
        .await?;
    Ok(Envelope::new(visits))
}

/// Stopped visits, most recently stopped first.
///
/// `GET /api/visits/completed`
pub async fn completed_visits_handler<S>(
    State(state): State<AppState<S>>,
    _key: ApiKey,
    pagination: Pagination,
) -> RestResult<Envelope<Vec<Visit>>>
where
    S: Store + 'static,
{
    let visits = accessor(&state).list_completed(pagination.page()).await?;
    Ok(Envelope::new(visits))
}

/// Visits started within a window.
///
/// `GET /api/visits/date-range?start_date=...&end_date=...&patient_id=...`
pub async fn visit_date_range_handler<S>(
    State(state): State<AppState<S>>,
    _key: ApiKey,
    pagination: Pagination,
    ApiQuery(params): ApiQuery<VisitRangeParams>,
) -> RestResult<Envelope<Vec<Visit>>>
where
    S: Store + 'static,
{
    let visits = accessor(&state)
        .list_by_date_range(
            params.start_date,
            params.end_date,
            params.patient_id,
            pagination.page(),
        )
        .await?;
    Ok(Envelope::new(visits))
}

/// Visits in which an order of the given type was placed.
///
/// `GET /api/visits/with-order-type/{order_type_id}?start_date&end_date&patient_id`
pub async fn visits_with_order_type_handler<S>(
    State(state): State<AppState<S>>,
    _key: ApiKey,
    ApiPath(order_type_id): ApiPath<i64>,
    pagination: Pagination,
    ApiQuery(params): ApiQuery<VisitRangeParams>,
) -> RestResult<Envelope<Vec<Visit>>>
where
    S: Store + 'static,
{
    debug!(order_type_id, "Listing visits by order type");
    let visits = accessor(&state)
        .list_with_order_type(
            order_type_id,
            params.start_date,
            params.end_date,
            params.patient_id,
            pagination.page(),
        )
        .await?;
    Ok(Envelope::new(visits))
}

/// Stops a visit.
///
/// `POST /api/visits/uuid/{uuid}/stop?stopped_by=...&date_stopped=...`
///
/// # Response
///
/// - `200 OK` - The stopped visit
/// - `404 Not Found` - No visit has this UUID
/// - `422 Unprocessable Entity` - `date_stopped` is before `date_started`
pub async fn stop_visit_handler<S>(
    State(state): State<AppState<S>>,
    _key: ApiKey,
    uuid: RecordUuid,
    ApiQuery(params): ApiQuery<StopParams>,
) -> RestResult<Envelope<Visit>>
where
    S: Store + 'static,
{
    let identity = uuid.identity();
    accessor(&state)
        .stop(&identity, params.stopped_by, params.date_stopped)
        .await?
        .map(Envelope::new)
        .ok_or_else(|| RestError::not_found(Visit::NAME, &identity))
}
