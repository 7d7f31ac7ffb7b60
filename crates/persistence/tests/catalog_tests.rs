//! Integration tests for the catalog records (drugs, order types, visit
//! types) and the provider view.

mod common;

use std::sync::Arc;

use common::*;
use emr_persistence::core::Visibility;
use emr_persistence::records::{
    DrugAccessor, DrugDraft, OrderTypeAccessor, OrderTypeDraft, ProviderAccessor,
    VisitTypeAccessor, VisitTypeDraft,
};
use emr_persistence::types::{Identity, Page};

fn page() -> Page {
    Page::first(10).unwrap()
}

fn drug(name: &str, concept_id: i64) -> DrugDraft {
    DrugDraft {
        concept_id,
        name: name.to_string(),
        creator: 1,
        strength: Some("500mg".to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_drug_search_is_case_insensitive_and_skips_retired() {
    let store = create_backend();
    let drugs = DrugAccessor::new(Arc::clone(&store));
    let tablets = drugs.create(drug("Paracetamol 500mg", 71617)).await.unwrap();
    let syrup = drugs.create(drug("paracetamol syrup", 71617)).await.unwrap();
    let retired = drugs.create(drug("Paracetamol 1g", 71617)).await.unwrap();
    drugs.create(drug("Amoxicillin", 73154)).await.unwrap();
    drugs
        .retire(&Identity::Id(retired.drug_id), 1, Some("discontinued"))
        .await
        .unwrap();

    let found = drugs.search_by_name("PARACETAMOL", page()).await.unwrap();
    let names: Vec<&str> = found.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec![tablets.name.as_str(), syrup.name.as_str()]);

    let by_concept = drugs.list_by_concept(71617, page()).await.unwrap();
    assert_eq!(by_concept.len(), 2);
    assert!(!tablets.combination);
}

#[tokio::test]
async fn test_order_types_form_a_tree() {
    let store = create_backend();
    let order_types = OrderTypeAccessor::new(Arc::clone(&store));
    let test_order = order_types
        .create(OrderTypeDraft {
            name: "Test Order".to_string(),
            creator: 1,
            java_class_name: Some("org.openmrs.TestOrder".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    let lab_order = order_types
        .create(OrderTypeDraft {
            name: "Lab Order".to_string(),
            creator: 1,
            description: Some("Laboratory tests".to_string()),
            parent: Some(test_order.order_type_id),
            ..Default::default()
        })
        .await
        .unwrap();

    let roots = order_types.list_roots(page()).await.unwrap();
    assert_eq!(roots, vec![test_order.clone()]);

    let found = order_types.search("laboratory", page()).await.unwrap();
    assert_eq!(found, vec![lab_order.clone()]);

    let by_name = order_types.fetch_by_name("Lab Order").await.unwrap();
    assert_eq!(by_name.map(|t| t.parent), Some(Some(test_order.order_type_id)));
    assert!(order_types.fetch_by_name("Radiology Order").await.unwrap().is_none());
}

#[tokio::test]
async fn test_duplicate_order_type_name_is_a_storage_error() {
    let store = create_backend();
    let order_types = OrderTypeAccessor::new(Arc::clone(&store));
    let draft = OrderTypeDraft {
        name: "Drug Order".to_string(),
        creator: 1,
        ..Default::default()
    };
    order_types.create(draft.clone()).await.unwrap();

    assert!(order_types.create(draft).await.is_err());
    assert_eq!(order_types.count(Visibility::IncludeRetired).await.unwrap(), 1);
}

#[tokio::test]
async fn test_visit_type_lookup_ignores_retired_types() {
    let store = create_backend();
    let visit_types = VisitTypeAccessor::new(Arc::clone(&store));
    let outpatient = visit_types
        .create(VisitTypeDraft {
            name: "Outpatient".to_string(),
            creator: 1,
            description: Some("Same day clinic visit".to_string()),
        })
        .await
        .unwrap();
    let inpatient = visit_types
        .create(VisitTypeDraft {
            name: "Inpatient".to_string(),
            creator: 1,
            description: None,
        })
        .await
        .unwrap();
    visit_types
        .retire(&Identity::Id(inpatient.visit_type_id), 1, None)
        .await
        .unwrap();

    assert_eq!(
        visit_types.fetch_by_name("Outpatient").await.unwrap(),
        Some(outpatient.clone())
    );
    assert!(visit_types.fetch_by_name("Inpatient").await.unwrap().is_none());

    let found = visit_types.search("clinic", page()).await.unwrap();
    assert_eq!(found, vec![outpatient]);
}

#[tokio::test]
async fn test_providers_carry_their_person() {
    let store = create_backend();
    let person_id = PersonFixture::new("Kwame", "Mensah").insert(&store).await;
    let with_person = insert_provider(&store, Some(person_id), "PRV-1", false).await;
    let account = insert_provider(&store, None, "PRV-2", false).await;
    insert_provider(&store, Some(person_id), "PRV-3", true).await;
    let providers = ProviderAccessor::new(Arc::clone(&store));

    let listed = providers.list(Visibility::ActiveOnly, page()).await.unwrap();
    assert_eq!(listed.total_count, 2);
    assert_eq!(listed.limit, 10);

    let first = &listed.providers[0];
    assert_eq!(first.provider.provider_id, with_person);
    let person = first.person.as_ref().expect("person is loaded");
    assert_eq!(person.person_id, person_id);
    assert_eq!(person.full_name.as_deref(), Some("Kwame Mensah"));
    assert_eq!(person.gender.as_deref(), Some("F"));

    assert_eq!(listed.providers[1].provider.provider_id, account);
    assert!(listed.providers[1].person.is_none());

    let everyone = providers
        .list(Visibility::IncludeRetired, page())
        .await
        .unwrap();
    assert_eq!(everyone.total_count, 3);
}

#[tokio::test]
async fn test_provider_fetch_by_uuid_includes_retired() {
    let store = create_backend();
    let person_id = PersonFixture::unnamed().insert(&store).await;
    let retired = insert_provider(&store, Some(person_id), "PRV-9", true).await;
    let providers = ProviderAccessor::new(Arc::clone(&store));

    let by_id = providers
        .fetch(&Identity::Id(retired))
        .await
        .unwrap()
        .expect("retired providers can be fetched");
    assert!(by_id.provider.retired);
    assert_eq!(by_id.person.as_ref().and_then(|p| p.full_name.clone()), None);

    let by_uuid = providers
        .fetch(&Identity::Uuid(by_id.provider.uuid.to_uppercase()))
        .await
        .unwrap();
    assert_eq!(by_uuid, Some(by_id));
    assert!(providers.fetch(&Identity::Id(404)).await.unwrap().is_none());
}
