//! Diagnosis read endpoints.
//!
//! Diagnoses are coded observations enriched with concept names, reference
//! codes, patient and encounter summaries. An unknown reference source or a
//! filter nothing matches yields an empty page, never an error.

use axum::extract::State;
use emr_persistence::records::{
    DiagnosisAccessor, DiagnosisFilter, DiagnosisPage, VisitDiagnoses,
};
use emr_persistence::{Identity, Store};
use tracing::debug;

use crate::auth::ApiKey;
use crate::error::{RestError, RestResult};
use crate::extractors::{ApiPath, ApiQuery, Pagination, RecordUuid};
use crate::responses::Envelope;
use crate::state::AppState;

fn accessor<S: Store + 'static>(state: &AppState<S>) -> DiagnosisAccessor<S> {
    DiagnosisAccessor::new(state.storage_arc())
}

/// Lists diagnoses, newest first.
///
/// `GET /api/diagnoses?patient_id&encounter_id&visit_id&concept_id&has_reference_codes&source_name&skip&limit`
pub async fn list_diagnoses_handler<S>(
    State(state): State<AppState<S>>,
    _key: ApiKey,
    pagination: Pagination,
    ApiQuery(filter): ApiQuery<DiagnosisFilter>,
) -> RestResult<Envelope<DiagnosisPage>>
where
    S: Store + 'static,
{
    debug!(filter = ?filter, "Processing diagnosis listing");
    let page = accessor(&state).list(&filter, pagination.page()).await?;
    Ok(Envelope::new(page))
}

/// Diagnoses of a patient.
///
/// `GET /api/diagnoses/patient/{patient_id}`
pub async fn patient_diagnoses_handler<S>(
    State(state): State<AppState<S>>,
    _key: ApiKey,
    ApiPath(patient_id): ApiPath<i64>,
    pagination: Pagination,
) -> RestResult<Envelope<DiagnosisPage>>
where
    S: Store + 'static,
{
    let page = accessor(&state)
        .list_by_patient(patient_id, pagination.page())
        .await?;
    Ok(Envelope::new(page))
}

/// Diagnoses recorded during an encounter.
///
/// `GET /api/diagnoses/encounter/{encounter_id}`
pub async fn encounter_diagnoses_handler<S>(
    State(state): State<AppState<S>>,
    _key: ApiKey,
    ApiPath(encounter_id): ApiPath<i64>,
    pagination: Pagination,
) -> RestResult<Envelope<DiagnosisPage>>
where
    S: Store + 'static,
{
    let page = accessor(&state)
        .list_by_encounter(encounter_id, pagination.page())
        .await?;
    Ok(Envelope::new(page))
}

/// Diagnoses of a visit addressed by id.
///
/// `GET /api/diagnoses/visit/{visit_id}`
pub async fn visit_diagnoses_handler<S>(
    State(state): State<AppState<S>>,
    _key: ApiKey,
    ApiPath(visit_id): ApiPath<i64>,
    pagination: Pagination,
) -> RestResult<Envelope<VisitDiagnoses>>
where
    S: Store + 'static,
{
    visit_diagnoses(&state, Identity::Id(visit_id), pagination).await
}

/// Diagnoses of a visit addressed by UUID.
///
/// `GET /api/diagnoses/visit/uuid/{visit_uuid}`
pub async fn visit_diagnoses_by_uuid_handler<S>(
    State(state): State<AppState<S>>,
    _key: ApiKey,
    uuid: RecordUuid,
    pagination: Pagination,
) -> RestResult<Envelope<VisitDiagnoses>>
where
    S: Store + 'static,
{
    visit_diagnoses(&state, uuid.identity(), pagination).await
}

async fn visit_diagnoses<S: Store + 'static>(
    state: &AppState<S>,
    visit: Identity,
    pagination: Pagination,
) -> RestResult<Envelope<VisitDiagnoses>> {
    accessor(state)
        .list_by_visit(&visit, pagination.page())
        .await?
        .map(Envelope::new)
        .ok_or_else(|| RestError::not_found("Visit", &visit))
}
