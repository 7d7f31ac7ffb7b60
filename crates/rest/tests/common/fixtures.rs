//! Test data fixtures.
//!
//! People, concept classes and providers have no write API; tests that need
//! them insert raw rows.

use chrono::{TimeZone, Utc};
use emr_persistence::core::{Entity, Store};
use emr_persistence::records::reference::{ConceptClass, Person, PersonName};
use emr_persistence::records::{Provider, Visit};
use emr_persistence::{Row, SqliteBackend};
use serde_json::{Value, json};

pub const VISIT_UUID: &str = "0b6e4d2c-8f31-4a7b-9c5d-1e2f3a4b5c6d";

/// Order payload: patient 9, concept 18566, care setting 1.
pub fn order_body(patient_id: i64) -> Value {
    json!({
        "patient_id": patient_id,
        "concept_id": 18566,
        "care_setting": 1,
        "instructions": "X"
    })
}

pub fn concept_body(short_name: &str) -> Value {
    json!({
        "creator": 1,
        "short_name": short_name,
        "description": format!("{} (test concept)", short_name),
        "datatype_id": 4,
        "class_id": 4
    })
}

pub fn visit_body(patient_id: i64, date_started: &str) -> Value {
    json!({
        "patient_id": patient_id,
        "visit_type_id": 1,
        "creator": 1,
        "location_id": 7,
        "date_started": date_started
    })
}

pub fn encounter_body(patient_id: i64, visit_id: Option<i64>, datetime: &str) -> Value {
    json!({
        "encounter_type": 1,
        "patient_id": patient_id,
        "location_id": 7,
        "encounter_datetime": datetime,
        "visit_id": visit_id
    })
}

/// Inserts a person with one preferred name and returns the person id.
pub async fn insert_person(store: &SqliteBackend, given: &str, family: &str) -> i64 {
    let uuid = uuid::Uuid::new_v4().to_string();
    let person_id = store
        .insert(
            Person::TABLE,
            Row::new()
                .with("gender", "M")
                .with("birthdate", "1985-07-30")
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
                .with("given_name", given)
                .with("family_name", family)
                .with("voided", false)
                .with("uuid", format!("{}-name", uuid)),
        )
        .await
        .expect("insert person name");
    person_id
}

pub async fn insert_visit(store: &SqliteBackend, patient_id: i64) -> i64 {
    store
        .insert(
            Visit::TABLE,
            Row::new()
                .with("patient_id", patient_id)
                .with("date_started", Utc.with_ymd_and_hms(2024, 3, 1, 7, 0, 0).unwrap())
                .with("voided", false)
                .with("uuid", VISIT_UUID),
        )
        .await
        .expect("insert visit")
}

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

/// Inserts an active provider and returns its uuid.
pub async fn insert_provider(
    store: &SqliteBackend,
    person_id: Option<i64>,
    identifier: &str,
) -> String {
    let uuid = uuid::Uuid::new_v4().to_string();
    store
        .insert(
            Provider::TABLE,
            Row::new()
                .with("person_id", person_id)
                .with("identifier", identifier)
                .with("creator", 1_i64)
                .with("date_created", Utc.with_ymd_and_hms(2024, 1, 5, 9, 0, 0).unwrap())
                .with("retired", false)
                .with("uuid", uuid.as_str()),
        )
        .await
        .expect("insert provider");
    uuid
}
