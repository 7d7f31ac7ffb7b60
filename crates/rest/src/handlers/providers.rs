//! Provider read endpoints.

use axum::extract::State;
use emr_persistence::core::Visibility;
use emr_persistence::records::{ProviderAccessor, ProviderDetails, ProviderPage};
use emr_persistence::{Identity, Store};

use crate::auth::ApiKey;
use crate::error::{RestError, RestResult};
use crate::extractors::{ApiPath, ApiQuery, Pagination, RecordUuid};
use crate::handlers::records::ListParams;
use crate::responses::Envelope;
use crate::state::AppState;

fn accessor<S: Store + 'static>(state: &AppState<S>) -> ProviderAccessor<S> {
    ProviderAccessor::new(state.storage_arc())
}

/// Lists providers with their person. Retired providers are excluded
/// unless `include_retired=true`.
///
/// `GET /api/providers?skip&limit&include_retired`
pub async fn list_providers_handler<S>(
    State(state): State<AppState<S>>,
    _key: ApiKey,
    pagination: Pagination,
    ApiQuery(params): ApiQuery<ListParams>,
) -> RestResult<Envelope<ProviderPage>>
where
    S: Store + 'static,
{
    let visibility = Visibility::including_retired(params.include_retired);
    let page = accessor(&state).list(visibility, pagination.page()).await?;
    Ok(Envelope::new(page))
}

/// `GET /api/providers/{provider_id}`
pub async fn provider_handler<S>(
    State(state): State<AppState<S>>,
    _key: ApiKey,
    ApiPath(provider_id): ApiPath<i64>,
) -> RestResult<Envelope<ProviderDetails>>
where
    S: Store + 'static,
{
    fetch(&state, Identity::Id(provider_id)).await
}

/// `GET /api/providers/uuid/{uuid}`
pub async fn provider_by_uuid_handler<S>(
    State(state): State<AppState<S>>,
    _key: ApiKey,
    uuid: RecordUuid,
) -> RestResult<Envelope<ProviderDetails>>
where
    S: Store + 'static,
{
    fetch(&state, uuid.identity()).await
}

async fn fetch<S: Store + 'static>(
    state: &AppState<S>,
    provider: Identity,
) -> RestResult<Envelope<ProviderDetails>> {
    accessor(state)
        .fetch(&provider)
        .await?
        .map(Envelope::new)
        .ok_or_else(|| RestError::not_found("Provider", &provider))
}
