//! Route table of the bridge API.

use axum::{
    Router,
    extract::State,
    routing::{get, post},
};
use emr_persistence::Store;
use emr_persistence::records::{
    Concept, Drug, Encounter, Observation, Order, OrderType, Visit, VisitType,
};

use crate::auth::ApiKey;
use crate::extractors::{ApiPath, ApiQuery, Pagination};
use crate::handlers::{
    self, diagnoses, fallback, lookups, providers, records, system, visits, vitals,
};
use crate::resource::RestResource;
use crate::state::AppState;

/// Creates all routes.
///
/// # Routes
///
/// ## Unauthenticated
/// - `GET /health` - Health check
///
/// ## Records (`orders`, `observations`, `concepts`, `encounters`, `visits`,
/// `visit-types`, `order-types`, `drugs`)
/// - `POST /api/{resource}` - Create
/// - `GET /api/{resource}` - List
/// - `GET /api/{resource}/retired` (`/voided`) - List retired
/// - `GET /api/{resource}/{scope}/{value}` - Scoped listing
/// - `GET|PATCH|PUT /api/{resource}/uuid/{uuid}` - Read, partial update, replace
/// - `POST /api/{resource}/uuid/{uuid}/retire` (`/void`) - Retire
/// - `POST /api/{resource}/uuid/{uuid}/unretire` (`/unvoid`) - Unretire
///
/// ## Lookups
/// - `GET /api/orders/number/{order_number}`
/// - `GET /api/concepts/search?name=...`
/// - `GET /api/concepts/name/{short_name}`
/// - `GET /api/encounters/date-range?start_date=...&end_date=...`
/// - `GET /api/drugs/search?name=...`
/// - `GET /api/order-types/search?name=...`
/// - `GET /api/order-types/name/{name}`
/// - `GET /api/order-types/root`
/// - `GET /api/visit-types/search?name=...`
/// - `GET /api/visit-types/name/{name}`
///
/// ## Visits
/// - `GET /api/visits/active?patient_id=...`
/// - `GET /api/visits/completed`
/// - `GET /api/visits/date-range?start_date=...&end_date=...&patient_id=...`
/// - `GET /api/visits/with-order-type/{order_type_id}`
/// - `POST /api/visits/uuid/{uuid}/stop?stopped_by=...&date_stopped=...`
///
/// ## Diagnoses
/// - `GET /api/diagnoses`
/// - `GET /api/diagnoses/patient/{patient_id}`
/// - `GET /api/diagnoses/encounter/{encounter_id}`
/// - `GET /api/diagnoses/visit/{visit_id}`
/// - `GET /api/diagnoses/visit/uuid/{visit_uuid}`
///
/// ## Vitals
/// - `GET /api/vitals/visit/{visit_id}` (`/grouped`)
/// - `GET /api/vitals/visit/uuid/{visit_uuid}` (`/grouped`)
///
/// ## Providers
/// - `GET /api/providers`
/// - `GET /api/providers/{provider_id}`
/// - `GET /api/providers/uuid/{uuid}`
///
/// ## System
/// - `GET /api/system/search-index/availability`
///
/// Any other path answers 404, and a known path with the wrong method 405,
/// both in the error envelope.
pub fn create_routes<S>(state: AppState<S>) -> Router
where
    S: Store + 'static,
{
    Router::new()
        .route("/health", get(handlers::health_handler::<S>))
        .merge(record_routes::<Order, S>())
        .merge(record_routes::<Observation, S>())
        .merge(record_routes::<Concept, S>())
        .merge(record_routes::<Encounter, S>())
        .merge(record_routes::<Visit, S>())
        .merge(record_routes::<VisitType, S>())
        .merge(record_routes::<OrderType, S>())
        .merge(record_routes::<Drug, S>())
        .merge(lookup_routes::<S>())
        .merge(visit_routes::<S>())
        .merge(diagnosis_routes::<S>())
        .merge(vitals_routes::<S>())
        .merge(provider_routes::<S>())
        .route(
            "/api/system/search-index/availability",
            get(system::search_index_availability_handler::<S>),
        )
        .fallback(fallback::route_not_found)
        .method_not_allowed_fallback(fallback::method_not_allowed)
        .with_state(state)
}

/// The generic route set of one record type.
fn record_routes<R, S>() -> Router<AppState<S>>
where
    R: RestResource,
    S: Store + 'static,
{
    let base = format!("/api/{}", R::PATH);
    let lifecycle = R::LIFECYCLE;

    let mut router = Router::new()
        .route(
            &base,
            get(records::list_handler::<R, S>).post(records::create_handler::<R, S>),
        )
        .route(
            &format!("{}/{}", base, lifecycle.listing()),
            get(records::list_retired_handler::<R, S>),
        )
        .route(
            &format!("{}/uuid/{{uuid}}", base),
            get(records::read_handler::<R, S>)
                .patch(records::patch_handler::<R, S>)
                .put(records::replace_handler::<R, S>),
        )
        .route(
            &format!("{}/uuid/{{uuid}}/{}", base, lifecycle.verb()),
            post(records::retire_handler::<R, S>),
        )
        .route(
            &format!("{}/uuid/{{uuid}}/{}", base, lifecycle.undo_verb()),
            post(records::unretire_handler::<R, S>),
        );

    for &scope in R::SCOPES {
        router = router.route(
            &format!("{}/{}/{{value}}", base, scope),
            get(
                move |state: State<AppState<S>>,
                      key: ApiKey,
                      value: ApiPath<String>,
                      pagination: Pagination,
                      params: ApiQuery<records::ListParams>| {
                    records::scoped_list_handler::<R, S>(
                        scope, state, key, value, pagination, params,
                    )
                },
            ),
        );
    }

    router
}

fn lookup_routes<S>() -> Router<AppState<S>>
where
    S: Store + 'static,
{
    Router::new()
        .route(
            "/api/orders/number/{order_number}",
            get(lookups::order_by_number_handler::<S>),
        )
        .route(
            "/api/concepts/search",
            get(lookups::concept_search_handler::<S>),
        )
        .route(
            "/api/concepts/name/{short_name}",
            get(lookups::concept_by_name_handler::<S>),
        )
        .route(
            "/api/encounters/date-range",
            get(lookups::encounter_date_range_handler::<S>),
        )
        .route("/api/drugs/search", get(lookups::drug_search_handler::<S>))
        .route(
            "/api/order-types/search",
            get(lookups::order_type_search_handler::<S>),
        )
        .route(
            "/api/order-types/name/{name}",
            get(lookups::order_type_by_name_handler::<S>),
        )
        .route(
            "/api/order-types/root",
            get(lookups::order_type_roots_handler::<S>),
        )
        .route(
            "/api/visit-types/search",
            get(lookups::visit_type_search_handler::<S>),
        )
        .route(
            "/api/visit-types/name/{name}",
            get(lookups::visit_type_by_name_handler::<S>),
        )
}

fn visit_routes<S>() -> Router<AppState<S>>
where
    S: Store + 'static,
{
    Router::new()
        .route("/api/visits/active", get(visits::active_visits_handler::<S>))
        .route(
            "/api/visits/completed",
            get(visits::completed_visits_handler::<S>),
        )
        .route(
            "/api/visits/date-range",
            get(visits::visit_date_range_handler::<S>),
        )
        .route(
            "/api/visits/with-order-type/{order_type_id}",
            get(visits::visits_with_order_type_handler::<S>),
        )
        .route(
            "/api/visits/uuid/{uuid}/stop",
            post(visits::stop_visit_handler::<S>),
        )
}

fn diagnosis_routes<S>() -> Router<AppState<S>>
where
    S: Store + 'static,
{
    Router::new()
        .route("/api/diagnoses", get(diagnoses::list_diagnoses_handler::<S>))
        .route(
            "/api/diagnoses/patient/{patient_id}",
            get(diagnoses::patient_diagnoses_handler::<S>),
        )
        .route(
            "/api/diagnoses/encounter/{encounter_id}",
            get(diagnoses::encounter_diagnoses_handler::<S>),
        )
        .route(
            "/api/diagnoses/visit/{visit_id}",
            get(diagnoses::visit_diagnoses_handler::<S>),
        )
        .route(
            "/api/diagnoses/visit/uuid/{visit_uuid}",
            get(diagnoses::visit_diagnoses_by_uuid_handler::<S>),
        )
}

fn vitals_routes<S>() -> Router<AppState<S>>
where
    S: Store + 'static,
{
    Router::new()
        .route(
            "/api/vitals/visit/{visit_id}",
            get(vitals::visit_vitals_handler::<S>),
        )
        .route(
            "/api/vitals/visit/{visit_id}/grouped",
            get(vitals::grouped_vitals_handler::<S>),
        )
        .route(
            "/api/vitals/visit/uuid/{visit_uuid}",
            get(vitals::visit_vitals_by_uuid_handler::<S>),
        )
        .route(
            "/api/vitals/visit/uuid/{visit_uuid}/grouped",
            get(vitals::grouped_vitals_by_uuid_handler::<S>),
        )
}

fn provider_routes<S>() -> Router<AppState<S>>
where
    S: Store + 'static,
{
    Router::new()
        .route("/api/providers", get(providers::list_providers_handler::<S>))
        .route(
            "/api/providers/{provider_id}",
            get(providers::provider_handler::<S>),
        )
        .route(
            "/api/providers/uuid/{uuid}",
            get(providers::provider_by_uuid_handler::<S>),
        )
}
