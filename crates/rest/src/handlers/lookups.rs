//! Record-specific lookups that do not fit the generic handlers.

use axum::extract::State;
use chrono::{DateTime, Utc};
use emr_persistence::Store;
use emr_persistence::core::Record;
use emr_persistence::records::{
    Concept, ConceptAccessor, Drug, DrugAccessor, Encounter, EncounterAccessor, Order,
    OrderAccessor, OrderType, OrderTypeAccessor, VisitType, VisitTypeAccessor,
};
use serde::Deserialize;
use tracing::debug;

use crate::auth::ApiKey;
use crate::error::{RestError, RestResult};
use crate::extractors::{ApiPath, ApiQuery, Pagination};
use crate::responses::Envelope;
use crate::state::AppState;

/// Reads an order by its order number.
///
/// `GET /api/orders/number/{order_number}`
pub async fn order_by_number_handler<S>(
    State(state): State<AppState<S>>,
    _key: ApiKey,
    ApiPath(order_number): ApiPath<String>,
) -> RestResult<Envelope<Order>>
where
    S: Store + 'static,
{
    OrderAccessor::new(state.storage_arc())
        .fetch_by_order_number(&order_number)
        .await?
        .map(Envelope::new)
        .ok_or_else(|| {
            RestError::not_found(Order::NAME, format!("order number {}", order_number))
        })
}

/// Query parameters of the name searches.
#[derive(Debug, Deserialize)]
pub struct NameSearchParams {
    /// Case-insensitive substring to look for.
    pub name: String,
}

/// Searches active concepts by short name or description.
///
/// `GET /api/concepts/search?name=...`
pub async fn concept_search_handler<S>(
    State(state): State<AppState<S>>,
    _key: ApiKey,
    pagination: Pagination,
    ApiQuery(params): ApiQuery<NameSearchParams>,
) -> RestResult<Envelope<Vec<Concept>>>
where
    S: Store + 'static,
{
    debug!(term = %params.name, "Searching concepts");
    let concepts = ConceptAccessor::new(state.storage_arc())
        .search_by_name(&params.name, pagination.page())
        .await?;
    Ok(Envelope::new(concepts))
}

/// Reads a concept by its exact short name.
///
/// `GET /api/concepts/name/{short_name}`
pub async fn concept_by_name_handler<S>(
    State(state): State<AppState<S>>,
    _key: ApiKey,
    ApiPath(short_name): ApiPath<String>,
) -> RestResult<Envelope<Concept>>
where
    S: Store + 'static,
{
    ConceptAccessor::new(state.storage_arc())
        .fetch_by_name(&short_name)
        .await?
        .map(Envelope::new)
        .ok_or_else(|| RestError::not_found(Concept::NAME, format!("name {}", short_name)))
}

/// Query parameters of the encounter date range listing.
#[derive(Debug, Deserialize)]
pub struct DateRangeParams {
    /// Inclusive lower bound (RFC 3339).
    pub start_date: DateTime<Utc>,
    /// Inclusive upper bound (RFC 3339).
    pub end_date: DateTime<Utc>,
}

/// Lists active encounters whose datetime lies in `[start_date, end_date]`.
///
/// `GET /api/encounters/date-range?start_date=...&end_date=...`
pub async fn encounter_date_range_handler<S>(
    State(state): State<AppState<S>>,
    _key: ApiKey,
    pagination: Pagination,
    ApiQuery(params): ApiQuery<DateRangeParams>,
) -> RestResult<Envelope<Vec<Encounter>>>
where
    S: Store + 'static,
{
    let encounters = EncounterAccessor::new(state.storage_arc())
        .list_by_date_range(params.start_date, params.end_date, pagination.page())
        .await?;
    Ok(Envelope::new(encounters))
}

/// Searches active drugs by name, in name order.
///
/// `GET /api/drugs/search?name=...`
pub async fn drug_search_handler<S>(
    State(state): State<AppState<S>>,
    _key: ApiKey,
    pagination: Pagination,
    ApiQuery(params): ApiQuery<NameSearchParams>,
) -> RestResult<Envelope<Vec<Drug>>>
where
    S: Store + 'static,
{
    debug!(term = %params.name, "Searching drugs");
    let drugs = DrugAccessor::new(state.storage_arc())
        .search_by_name(&params.name, pagination.page())
        .await?;
    Ok(Envelope::new(drugs))
}

/// Searches active order types by name or description.
///
/// `GET /api/order-types/search?name=...`
pub async fn order_type_search_handler<S>(
    State(state): State<AppState<S>>,
    _key: ApiKey,
    pagination: Pagination,
    ApiQuery(params): ApiQuery<NameSearchParams>,
) -> RestResult<Envelope<Vec<OrderType>>>
where
    S: Store + 'static,
{
    let order_types = OrderTypeAccessor::new(state.storage_arc())
        .search(&params.name, pagination.page())
        .await?;
    Ok(Envelope::new(order_types))
}

/// Reads an order type by its unique name.
///
/// `GET /api/order-types/name/{name}`
pub async fn order_type_by_name_handler<S>(
    State(state): State<AppState<S>>,
    _key: ApiKey,
    ApiPath(name): ApiPath<String>,
) -> RestResult<Envelope<OrderType>>
where
    S: Store + 'static,
{
    OrderTypeAccessor::new(state.storage_arc())
        .fetch_by_name(&name)
        .await?
        .map(Envelope::new)
        .ok_or_else(|| RestError::not_found(OrderType::NAME, format!("name {}", name)))
}

/// Lists active order types without a parent.
///
/// `GET /api/order-types/root`
pub async fn order_type_roots_handler<S>(
    State(state): State<AppState<S>>,
    _key: ApiKey,
    pagination: Pagination,
) -> RestResult<Envelope<Vec<OrderType>>>
where
    S: Store + 'static,
{
    let roots = OrderTypeAccessor::new(state.storage_arc())
        .list_roots(pagination.page())
        .await?;
    Ok(Envelope::new(roots))
}

/// Searches active visit types by name or description.
///
/// `GET /api/visit-types/search?name=...`
pub async fn visit_type_search_handler<S>(
    State(state): State<AppState<S>>,
    _key: ApiKey,
    pagination: Pagination,
    ApiQuery(params): ApiQuery<NameSearchParams>,
) -> RestResult<Envelope<Vec<VisitType>>>
where
    S: Store + 'static,
{
    let visit_types = VisitTypeAccessor::new(state.storage_arc())
        .search(&params.name, pagination.page())
        .await?;
    Ok(Envelope::new(visit_types))
}

/// Reads an active visit type by exact name.
///
/// `GET /api/visit-types/name/{name}`
pub async fn visit_type_by_name_handler<S>(
    State(state): State<AppState<S>>,
    _key: ApiKey,
    ApiPath(name): ApiPath<String>,
) -> RestResult<Envelope<VisitType>>
where
    S: Store + 'static,
{
    VisitTypeAccessor::new(state.storage_arc())
        .fetch_by_name(&name)
        .await?
        .map(Envelope::new)
        .ok_or_else(|| RestError::not_found(VisitType::NAME, format!("name {}", name)))
}
