//! Test fixtures for persistence layer testing.
//!
//! Clinical records are created through their accessors. The read-only
//! relations used by the diagnosis, vitals and provider views (people,
//! concept names and classes, providers and reference terminology) have no
//! accessor and are seeded as raw rows.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use emr_persistence::backends::sqlite::SqliteBackend;
use emr_persistence::core::{Entity, Store};
use emr_persistence::records::reference::{
    ConceptClass, ConceptName, FULLY_SPECIFIED, Person, PersonName, ReferenceMap, ReferenceSource,
    ReferenceTerm,
};
use emr_persistence::records::{
    Concept, ConceptAccessor, ConceptDraft, Encounter, EncounterAccessor, EncounterDraft,
    Observation, ObservationAccessor, ObservationDraft, Order, OrderAccessor, OrderDraft, Provider,
    Visit, VisitAccessor, VisitDraft,
};
use emr_persistence::types::Row;

/// Creates an in-memory backend with the schema initialized.
pub fn create_backend() -> Arc<SqliteBackend> {
    Arc::new(SqliteBackend::in_memory().expect("Failed to create SQLite backend"))
}

/// A fixed timestamp on 2024-03-`day` at `hour`:00 UTC.
pub fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
}

/// Scenario order payload: patient 9, concept 18566, care setting 1.
pub fn order_draft() -> OrderDraft {
    OrderDraft {
        instructions: Some("X".to_string()),
        ..OrderDraft::new(9, 18566, 1)
    }
}

pub async fn create_order(store: &Arc<SqliteBackend>) -> Order {
    OrderAccessor::new(Arc::clone(store))
        .create(order_draft())
        .await
        .expect("create order")
}

pub async fn create_concept(store: &Arc<SqliteBackend>, short_name: &str) -> Concept {
    ConceptAccessor::new(Arc::clone(store))
        .create(ConceptDraft {
            creator: 1,
            short_name: Some(short_name.to_string()),
            description: Some(format!("{} (test concept)", short_name)),
            datatype_id: Some(4),
            class_id: Some(4),
            ..Default::default()
        })
        .await
        .expect("create concept")
}

pub async fn create_encounter(
    store: &Arc<SqliteBackend>,
    patient_id: i64,
    visit_id: Option<i64>,
) -> Encounter {
    EncounterAccessor::new(Arc::clone(store))
        .create(EncounterDraft {
            encounter_type: 1,
            patient_id,
            location_id: Some(7),
            encounter_datetime: Some(at(1, 8)),
            visit_id,
            ..Default::default()
        })
        .await
        .expect("create encounter")
}

/// Records a coded observation (a diagnosis) for a patient.
pub async fn create_diagnosis_obs(
    store: &Arc<SqliteBackend>,
    patient_id: i64,
    encounter_id: Option<i64>,
    concept_id: i64,
    obs_datetime: DateTime<Utc>,
) -> Observation {
    ObservationAccessor::new(Arc::clone(store))
        .create(ObservationDraft {
            encounter_id,
            obs_datetime: Some(obs_datetime),
            value_coded: Some(concept_id),
            comments: Some("confirmed".to_string()),
            ..ObservationDraft::new(patient_id, 1284)
        })
        .await
        .expect("create observation")
}

/// Builder for a person with one preferred name.
#[derive(Debug, Clone)]
pub struct PersonFixture {
    pub given: Option<String>,
    pub family: Option<String>,
    pub gender: Option<String>,
    pub birthdate: Option<String>,
}

impl PersonFixture {
    pub fn new(given: &str, family: &str) -> Self {
        Self {
            given: Some(given.to_string()),
            family: Some(family.to_string()),
            gender: Some("F".to_string()),
            birthdate: Some("1990-04-12".to_string()),
        }
    }

    /// A person whose only name has every part blank.
    pub fn unnamed() -> Self {
        Self {
            given: None,
            family: None,
            gender: None,
            birthdate: None,
        }
    }

    pub async fn insert(self, store: &SqliteBackend) -> i64 {
        let uuid = uuid::Uuid::new_v4().to_string();
        let person_id = store
            .insert(
                Person::TABLE,
                Row::new()
                    .with("gender", self.gender)
                    .with("birthdate", self.birthdate)
                    .with("voided", false)
                    .with("uuid", uuid.as_str()),
            )
            .await
            .expect("insert person");
        store
            .insert(
                PersonName::TABLE,
                Row::new()
                    .with("person_id", person_id)
                    .with("preferred", true)
                    .with("given_name", self.given)
                    .with("family_name", self.family)
                    .with("voided", false)
                    .with("uuid", format!("{}-name", uuid)),
            )
            .await
            .expect("insert person name");
        person_id
    }
}

pub async fn insert_visit(store: &SqliteBackend, patient_id: i64, uuid: &str) -> i64 {
    store
        .insert(
            Visit::TABLE,
            Row::new()
                .with("patient_id", patient_id)
                .with("date_started", at(1, 7))
                .with("voided", false)
                .with("uuid", uuid),
        )
        .await
        .expect("insert visit")
}

pub async fn insert_concept_name(
    store: &SqliteBackend,
    concept_id: i64,
    name: &str,
    fully_specified: bool,
) {
    let name_type = fully_specified.then_some(FULLY_SPECIFIED);
    store
        .insert(
            ConceptName::TABLE,
            Row::new()
                .with("concept_id", concept_id)
                .with("name", name)
                .with("locale", "en")
                .with("locale_preferred", !fully_specified)
                .with("concept_name_type", name_type)
                .with("voided", false)
                .with("uuid", uuid::Uuid::new_v4().to_string()),
        )
        .await
        .expect("insert concept name");
}

/// Inserts a terminology source and returns its id.
pub async fn insert_source(store: &SqliteBackend, name: &str, hl7_code: &str) -> i64 {
    store
        .insert(
            ReferenceSource::TABLE,
            Row::new()
                .with("name", name)
                .with("description", format!("{} terminology", name))
                .with("hl7_code", hl7_code)
                .with("retired", false)
                .with("uuid", uuid::Uuid::new_v4().to_string()),
        )
        .await
        .expect("insert reference source")
}

/// Maps `concept_id` to `code` in the given source.
pub async fn map_concept(store: &SqliteBackend, concept_id: i64, source_id: i64, code: &str) {
    let term_id = store
        .insert(
            ReferenceTerm::TABLE,
            Row::new()
                .with("concept_source_id", source_id)
                .with("code", code)
                .with("name", format!("term {}", code))
                .with("retired", false)
                .with("uuid", uuid::Uuid::new_v4().to_string()),
        )
        .await
        .expect("insert reference term");
    store
        .insert(
            ReferenceMap::TABLE,
            Row::new()
                .with("concept_id", concept_id)
                .with("concept_reference_term_id", term_id)
                .with("uuid", uuid::Uuid::new_v4().to_string()),
        )
        .await
        .expect("insert reference map");
}

/// Starts a visit of type 1 for a patient through the accessor.
pub async fn create_visit(
    store: &Arc<SqliteBackend>,
    patient_id: i64,
    date_started: DateTime<Utc>,
) -> Visit {
    VisitAccessor::new(Arc::clone(store))
        .create(VisitDraft {
            date_started: Some(date_started),
            location_id: Some(7),
            ..VisitDraft::new(patient_id, 1, 1)
        })
        .await
        .expect("create visit")
}

/// Inserts a concept class and returns its id.
pub async fn insert_concept_class(store: &SqliteBackend, name: &str) -> i64 {
    store
        .insert(
            ConceptClass::TABLE,
            Row::new()
                .with("name", name)
                .with("retired", false)
                .with("uuid", uuid::Uuid::new_v4().to_string()),
        )
        .await
        .expect("insert concept class")
}

/// Creates a concept of the given class with a preferred display name.
pub async fn create_classified_concept(
    store: &Arc<SqliteBackend>,
    class_id: i64,
    name: &str,
) -> Concept {
    let concept = ConceptAccessor::new(Arc::clone(store))
        .create(ConceptDraft {
            creator: 1,
            short_name: Some(name.to_string()),
            datatype_id: Some(1),
            class_id: Some(class_id),
            ..Default::default()
        })
        .await
        .expect("create concept");
    insert_concept_name(store, concept.concept_id, name, false).await;
    concept
}

/// Records a numeric observation in an encounter.
pub async fn create_numeric_obs(
    store: &Arc<SqliteBackend>,
    patient_id: i64,
    encounter_id: i64,
    concept_id: i64,
    value: f64,
    obs_datetime: DateTime<Utc>,
) -> Observation {
    ObservationAccessor::new(Arc::clone(store))
        .create(ObservationDraft {
            encounter_id: Some(encounter_id),
            obs_datetime: Some(obs_datetime),
            value_numeric: Some(value),
            ..ObservationDraft::new(patient_id, concept_id)
        })
        .await
        .expect("create observation")
}

/// Inserts a provider, optionally backed by a person, and returns its id.
pub async fn insert_provider(
    store: &SqliteBackend,
    person_id: Option<i64>,
    identifier: &str,
    retired: bool,
) -> i64 {
    store
        .insert(
            Provider::TABLE,
            Row::new()
                .with("person_id", person_id)
                .with("identifier", identifier)
                .with("creator", 1_i64)
                .with("date_created", at(1, 6))
                .with("retired", retired)
                .with("uuid", uuid::Uuid::new_v4().to_string()),
        )
        .await
        .expect("insert provider")
}
