//! Integration tests for the diagnosis views.

mod common;

use std::sync::Arc;

use chrono::NaiveDate;

use common::*;
use emr_persistence::backends::sqlite::SqliteBackend;
use emr_persistence::core::{Entity, Store, WriteBatch};
use emr_persistence::records::reference::{ReferenceMap, ReferenceTerm};
use emr_persistence::records::{
    Concept, DiagnosisAccessor, DiagnosisFilter, ObservationAccessor, ObservationDraft,
    UNKNOWN_PATIENT,
};
use emr_persistence::types::{Identity, Page, Row};

const VISIT_UUID: &str = "7d3f9c2e-5b1a-4c8e-9f0d-2a6b8c4e1f3a";

struct Seeded {
    store: Arc<SqliteBackend>,
    patient_id: i64,
    encounter_id: i64,
    malaria_id: i64,
    fever_id: i64,
}

/// One patient with a visit. Malaria (mapped to ICD-10 and SNOMED) is
/// diagnosed during the visit, fever (unmapped) the next day outside it. A
/// voided diagnosis and a numeric observation must never show up.
async fn seed() -> Seeded {
    let store = create_backend();
    let patient_id = PersonFixture::new("Amina", "Okoro").insert(&store).await;
    let visit_id = insert_visit(&store, patient_id, VISIT_UUID).await;
    let encounter = create_encounter(&store, patient_id, Some(visit_id)).await;

    let malaria = create_concept(&store, "Malaria").await;
    insert_concept_name(&store, malaria.concept_id, "Malaria", false).await;
    insert_concept_name(&store, malaria.concept_id, "Malaria (disorder)", true).await;
    let fever = create_concept(&store, "Fever").await;

    let icd = insert_source(&store, "ICD-10-WHO", "ICD-10").await;
    let snomed = insert_source(&store, "SNOMED CT", "SCT").await;
    map_concept(&store, malaria.concept_id, icd, "B54").await;
    map_concept(&store, malaria.concept_id, snomed, "61462000").await;

    create_diagnosis_obs(
        &store,
        patient_id,
        Some(encounter.encounter_id),
        malaria.concept_id,
        at(1, 9),
    )
    .await;
    create_diagnosis_obs(&store, patient_id, None, fever.concept_id, at(2, 9)).await;

    let voided = create_diagnosis_obs(&store, patient_id, None, malaria.concept_id, at(3, 9)).await;
    let observations = ObservationAccessor::new(Arc::clone(&store));
    observations
        .void(&Identity::Id(voided.obs_id), 1, Some("entered in error"))
        .await
        .unwrap();
    observations
        .create(ObservationDraft {
            value_numeric: Some(38.2),
            ..ObservationDraft::new(patient_id, 5088)
        })
        .await
        .unwrap();

    Seeded {
        store,
        patient_id,
        encounter_id: encounter.encounter_id,
        malaria_id: malaria.concept_id,
        fever_id: fever.concept_id,
    }
}

#[tokio::test]
async fn test_list_enriches_and_orders_newest_first() {
    let seeded = seed().await;
    let diagnoses = DiagnosisAccessor::new(Arc::clone(&seeded.store));

    let page = diagnoses
        .list(&DiagnosisFilter::default(), Page::default())
        .await
        .unwrap();
    assert_eq!(page.total_count, 2);
    assert_eq!(page.skip, 0);
    assert_eq!(page.limit, 100);

    let concepts: Vec<i64> = page.diagnoses.iter().map(|d| d.concept.concept_id).collect();
    assert_eq!(concepts, vec![seeded.fever_id, seeded.malaria_id]);

    let malaria = &page.diagnoses[1];
    assert_eq!(malaria.concept.name.as_deref(), Some("Malaria (disorder)"));
    assert_eq!(malaria.comments.as_deref(), Some("confirmed"));
    assert_eq!(malaria.status, "FINAL");

    let codes: Vec<(&str, Option<&str>)> = malaria
        .concept
        .reference_codes
        .iter()
        .map(|c| (c.code.as_str(), c.source_name.as_deref()))
        .collect();
    assert_eq!(
        codes,
        vec![("B54", Some("ICD-10-WHO")), ("61462000", Some("SNOMED CT"))]
    );
    assert_eq!(malaria.concept.reference_codes[1].hl7_code.as_deref(), Some("SCT"));

    assert_eq!(malaria.patient.patient_id, seeded.patient_id);
    assert_eq!(malaria.patient.name, "Amina Okoro");
    assert_eq!(malaria.patient.birthdate, NaiveDate::from_ymd_opt(1990, 4, 12));
    let encounter = malaria.encounter.as_ref().expect("encounter summary");
    assert_eq!(encounter.encounter_id, seeded.encounter_id);

    let fever = &page.diagnoses[0];
    assert!(fever.concept.reference_codes.is_empty());
    // No names on record: falls back to the short name.
    assert_eq!(fever.concept.name.as_deref(), Some("Fever"));
    assert!(fever.encounter.is_none());
}

#[tokio::test]
async fn test_total_count_ignores_page_window() {
    let seeded = seed().await;
    let page = DiagnosisAccessor::new(seeded.store)
        .list(&DiagnosisFilter::default(), Page::new(1, 1).unwrap())
        .await
        .unwrap();
    assert_eq!(page.total_count, 2);
    assert_eq!(page.diagnoses.len(), 1);
    assert_eq!(page.diagnoses[0].concept.concept_id, seeded.malaria_id);
}

#[tokio::test]
async fn test_filter_by_reference_code_presence() {
    let seeded = seed().await;
    let diagnoses = DiagnosisAccessor::new(seeded.store);

    let mapped = DiagnosisFilter {
        has_reference_codes: Some(true),
        ..Default::default()
    };
    let page = diagnoses.list(&mapped, Page::default()).await.unwrap();
    assert_eq!(page.total_count, 1);
    assert_eq!(page.diagnoses[0].concept.concept_id, seeded.malaria_id);

    let unmapped = DiagnosisFilter {
        has_reference_codes: Some(false),
        ..Default::default()
    };
    let page = diagnoses.list(&unmapped, Page::default()).await.unwrap();
    assert_eq!(page.total_count, 1);
    assert_eq!(page.diagnoses[0].concept.concept_id, seeded.fever_id);
}

#[tokio::test]
async fn test_filter_by_source_name() {
    let seeded = seed().await;
    let diagnoses = DiagnosisAccessor::new(seeded.store);

    let snomed = DiagnosisFilter {
        source_name: Some("SNOMED CT".to_string()),
        ..Default::default()
    };
    let page = diagnoses.list(&snomed, Page::default()).await.unwrap();
    assert_eq!(page.total_count, 1);

    let unknown = DiagnosisFilter {
        source_name: Some("LOINC".to_string()),
        ..Default::default()
    };
    let page = diagnoses.list(&unknown, Page::default()).await.unwrap();
    assert_eq!(page.total_count, 0);
    assert!(page.diagnoses.is_empty());
}

#[tokio::test]
async fn test_scoped_listings() {
    let seeded = seed().await;
    let diagnoses = DiagnosisAccessor::new(seeded.store);

    let by_patient = diagnoses
        .list_by_patient(seeded.patient_id, Page::default())
        .await
        .unwrap();
    assert_eq!(by_patient.total_count, 2);

    let by_encounter = diagnoses
        .list_by_encounter(seeded.encounter_id, Page::default())
        .await
        .unwrap();
    assert_eq!(by_encounter.total_count, 1);

    let nobody = diagnoses.list_by_patient(404, Page::default()).await.unwrap();
    assert_eq!(nobody.total_count, 0);
}

#[tokio::test]
async fn test_visit_view() {
    let seeded = seed().await;
    let diagnoses = DiagnosisAccessor::new(seeded.store);

    let visit = diagnoses
        .list_by_visit(&Identity::uuid(VISIT_UUID).unwrap(), Page::default())
        .await
        .unwrap()
        .expect("visit exists");
    assert_eq!(visit.visit_uuid, VISIT_UUID);
    assert_eq!(visit.patient.name, "Amina Okoro");
    assert_eq!(visit.total_count, 1);
    assert_eq!(visit.diagnoses[0].concept.concept_id, seeded.malaria_id);

    let missing = diagnoses
        .list_by_visit(
            &Identity::uuid("00000000-0000-0000-0000-000000000000").unwrap(),
            Page::default(),
        )
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_unnamed_patient_is_reported_as_unknown() {
    let store = create_backend();
    let patient_id = PersonFixture::unnamed().insert(&store).await;
    let concept = create_concept(&store, "Cough").await;
    create_diagnosis_obs(&store, patient_id, None, concept.concept_id, at(1, 9)).await;

    let page = DiagnosisAccessor::new(store)
        .list_by_patient(patient_id, Page::default())
        .await
        .unwrap();
    assert_eq!(page.diagnoses[0].patient.name, UNKNOWN_PATIENT);
}

#[tokio::test]
async fn test_reference_codes_and_single_observation() {
    let seeded = seed().await;
    let diagnoses = DiagnosisAccessor::new(Arc::clone(&seeded.store));

    let codes = diagnoses.reference_codes(seeded.malaria_id).await.unwrap();
    assert_eq!(codes.len(), 2);
    assert!(diagnoses.reference_codes(seeded.fever_id).await.unwrap().is_empty());

    let observations = ObservationAccessor::new(Arc::clone(&seeded.store));
    let numeric = observations
        .list_by_value_type("numeric", Page::default())
        .await
        .unwrap();
    assert!(diagnoses.for_observation(&numeric[0]).await.unwrap().is_none());

    let coded = observations
        .list_by_value_type("coded", Page::default())
        .await
        .unwrap();
    let diagnosis = diagnoses.for_observation(&coded[0]).await.unwrap().unwrap();
    assert_eq!(diagnosis.obs_id, coded[0].obs_id);
}

/// More mapped concepts than SQLite accepts bound variables in a statement.
const LARGE_DICTIONARY: i64 = 33_000;

/// Seeds a dictionary of `LARGE_DICTIONARY` concepts, each mapped to one
/// ICD-10 term, in a single transaction. Returns the first concept id.
async fn seed_large_dictionary(store: &SqliteBackend, source_id: i64) -> i64 {
    const FIRST_ID: i64 = 100_000;
    let created = at(1, 0);
    let mut batch = WriteBatch::new();
    for offset in 0..LARGE_DICTIONARY {
        let id = FIRST_ID + offset;
        batch = batch
            .insert(
                Concept::TABLE,
                Row::new()
                    .with("concept_id", id)
                    .with("uuid", format!("dictionary-concept-{id}"))
                    .with("short_name", format!("Condition {id}"))
                    .with("is_set", false)
                    .with("creator", 1_i64)
                    .with("date_created", created)
                    .with("retired", false),
            )
            .insert(
                ReferenceTerm::TABLE,
                Row::new()
                    .with("concept_reference_term_id", id)
                    .with("concept_source_id", source_id)
                    .with("code", format!("X{id}"))
                    .with("retired", false)
                    .with("uuid", format!("dictionary-term-{id}")),
            )
            .insert(
                ReferenceMap::TABLE,
                Row::new()
                    .with("concept_id", id)
                    .with("concept_reference_term_id", id)
                    .with("uuid", format!("dictionary-map-{id}")),
            );
    }
    store.commit(batch).await.expect("seed dictionary");
    FIRST_ID
}

#[tokio::test]
async fn test_reference_filters_scale_past_parameter_limit() {
    let store = create_backend();
    let icd = insert_source(&store, "ICD-10-WHO", "ICD-10").await;
    let first = seed_large_dictionary(&store, icd).await;
    let patient_id = PersonFixture::new("Amina", "Okoro").insert(&store).await;

    let unmapped = create_concept(&store, "Cough").await;
    create_diagnosis_obs(&store, patient_id, None, first + LARGE_DICTIONARY - 1, at(1, 9)).await;
    create_diagnosis_obs(&store, patient_id, None, unmapped.concept_id, at(2, 9)).await;

    let diagnoses = DiagnosisAccessor::new(Arc::clone(&store));
    let mapped = diagnoses
        .list(
            &DiagnosisFilter {
                has_reference_codes: Some(true),
                ..Default::default()
            },
            Page::default(),
        )
        .await
        .expect("mapped filter over a large dictionary");
    assert_eq!(mapped.total_count, 1);
    assert_eq!(
        mapped.diagnoses[0].concept.concept_id,
        first + LARGE_DICTIONARY - 1
    );

    let without = diagnoses
        .list(
            &DiagnosisFilter {
                has_reference_codes: Some(false),
                ..Default::default()
            },
            Page::default(),
        )
        .await
        .expect("unmapped filter over a large dictionary");
    assert_eq!(without.total_count, 1);
    assert_eq!(without.diagnoses[0].concept.concept_id, unmapped.concept_id);

    let by_source = diagnoses
        .list(
            &DiagnosisFilter {
                source_name: Some("ICD-10-WHO".to_string()),
                ..Default::default()
            },
            Page::default(),
        )
        .await
        .expect("source filter over a large dictionary");
    assert_eq!(by_source.total_count, 1);
}

#[tokio::test]
async fn test_dangling_coded_value_is_neither_counted_nor_returned() {
    let seeded = seed().await;
    create_diagnosis_obs(&seeded.store, seeded.patient_id, None, 999_999, at(4, 9)).await;

    let diagnoses = DiagnosisAccessor::new(Arc::clone(&seeded.store));
    let page = diagnoses
        .list(&DiagnosisFilter::default(), Page::default())
        .await
        .unwrap();
    assert_eq!(page.total_count, 2);
    assert_eq!(page.diagnoses.len(), 2);

    let first_only = diagnoses
        .list(&DiagnosisFilter::default(), Page::new(0, 1).unwrap())
        .await
        .unwrap();
    assert_eq!(first_only.diagnoses.len(), 1);
    assert_eq!(first_only.diagnoses[0].concept.concept_id, seeded.fever_id);
}
