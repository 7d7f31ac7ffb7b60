//! Vital sign views of a visit.
//!
//! An unknown or voided visit answers 404; a visit without vitals answers
//! an empty listing.

use axum::extract::State;
use emr_persistence::records::{VisitVitals, VisitVitalsGrouped, VitalsAccessor};
use emr_persistence::{Identity, Store};

use crate::auth::ApiKey;
use crate::error::{RestError, RestResult};
use crate::extractors::{ApiPath, Pagination, RecordUuid};
use crate::responses::Envelope;
use crate::state::AppState;

fn accessor<S: Store + 'static>(state: &AppState<S>) -> VitalsAccessor<S> {
    VitalsAccessor::new(state.storage_arc())
}

/// `GET /api/vitals/visit/{visit_id}`
pub async fn visit_vitals_handler<S>(
    State(state): State<AppState<S>>,
    _key: ApiKey,
    ApiPath(visit_id): ApiPath<i64>,
    pagination: Pagination,
) -> RestResult<Envelope<VisitVitals>>
where
    S: Store + 'static,
{
    listed(&state, Identity::Id(visit_id), pagination).await
}

/// `GET /api/vitals/visit/uuid/{visit_uuid}`
pub async fn visit_vitals_by_uuid_handler<S>(
    State(state): State<AppState<S>>,
    _key: ApiKey,
    uuid: RecordUuid,
    pagination: Pagination,
) -> RestResult<Envelope<VisitVitals>>
where
    S: Store + 'static,
{
    listed(&state, uuid.identity(), pagination).await
}

/// `GET /api/vitals/visit/{visit_id}/grouped`
pub async fn grouped_vitals_handler<S>(
    State(state): State<AppState<S>>,
    _key: ApiKey,
    ApiPath(visit_id): ApiPath<i64>,
    pagination: Pagination,
) -> RestResult<Envelope<VisitVitalsGrouped>>
where
    S: Store + 'static,
{
    grouped(&state, Identity::Id(visit_id), pagination).await
}

/// `GET /api/vitals/visit/uuid/{visit_uuid}/grouped`
pub async fn grouped_vitals_by_uuid_handler<S>(
    State(state): State<AppState<S>>,
    _key: ApiKey,
    uuid: RecordUuid,
    pagination: Pagination,
) -> RestResult<Envelope<VisitVitalsGrouped>>
where
    S: Store + 'static,
{
    grouped(&state, uuid.identity(), pagination).await
}

async fn listed<S: Store + 'static>(
    state: &AppState<S>,
    visit: Identity,
    pagination: Pagination,
) -> RestResult<Envelope<VisitVitals>> {
    accessor(state)
        .list_by_visit(&visit, pagination.page())
        .await?
        .map(Envelope::new)
        .ok_or_else(|| RestError::not_found("Visit", &visit))
}

async fn grouped<S: Store + 'static>(
    state: &AppState<S>,
    visit: Identity,
    pagination: Pagination,
) -> RestResult<Envelope<VisitVitalsGrouped>> {
    accessor(state)
        .grouped_by_visit(&visit, pagination.page())
        .await?
        .map(Envelope::new)
        .ok_or_else(|| RestError::not_found("Visit", &visit))
}
