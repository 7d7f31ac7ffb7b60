//! Drug, order type, visit type and provider endpoint tests.

mod common;

use axum::http::StatusCode;
use serde_json::{Value, json};

use common::fixtures::{insert_person, insert_provider};
use common::harness::{TestApp, uuid_of};

fn data(response: &axum_test::TestResponse) -> Value {
    response.json::<Value>()["data"].clone()
}

fn names(response: &axum_test::TestResponse) -> Vec<String> {
    data(response)
        .as_array()
        .expect("listing is an array")
        .iter()
        .map(|record| record["name"].as_str().unwrap().to_string())
        .collect()
}

fn drug_body(name: &str, concept_id: i64) -> Value {
    json!({ "concept_id": concept_id, "name": name, "creator": 1, "strength": "500mg" })
}

#[tokio::test]
async fn test_drug_crud_and_search() {
    let app = TestApp::new();
    let drug = app.create("drugs", drug_body("Paracetamol 500mg", 71617)).await;
    app.create("drugs", drug_body("Amoxicillin 250mg", 73154)).await;
    assert_eq!(drug["combination"], false);

    let response = app
        .patch(&format!("/api/drugs/uuid/{}", uuid_of(&drug)))
        .json(&json!({ "strength": "1g", "changed_by": 3 }))
        .await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["data"]["strength"], "1g");
    assert!(
        body["updated_fields"]
            .as_array()
            .unwrap()
            .contains(&json!("strength"))
    );

    let found = app.get("/api/drugs/search?name=PARACET").await;
    found.assert_status_ok();
    assert_eq!(names(&found), vec!["Paracetamol 500mg"]);

    let by_concept = app.get("/api/drugs/concept/73154").await;
    assert_eq!(names(&by_concept), vec!["Amoxicillin 250mg"]);
}

#[tokio::test]
async fn test_drug_search_requires_name() {
    let app = TestApp::new();

    let response = app.get("/api/drugs/search").await;

    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_retired_drug_leaves_search() {
    let app = TestApp::new();
    let drug = app.create("drugs", drug_body("Chloroquine", 73300)).await;

    app.post(&format!(
        "/api/drugs/uuid/{}/retire?retired_by=1&reason=withdrawn",
        uuid_of(&drug)
    ))
    .await
    .assert_status_ok();

    let found = app.get("/api/drugs/search?name=chloro").await;
    assert!(names(&found).is_empty());
    let retired = app.get("/api/drugs/retired").await;
    assert_eq!(names(&retired), vec!["Chloroquine"]);
}

#[tokio::test]
async fn test_order_type_lookups() {
    let app = TestApp::new();
    let test_order = app
        .create(
            "order-types",
            json!({ "name": "Test Order", "creator": 1, "java_class_name": "org.openmrs.TestOrder" }),
        )
        .await;
    app.create(
        "order-types",
        json!({
            "name": "Lab Order",
            "creator": 1,
            "description": "Laboratory tests",
            "parent": test_order["order_type_id"]
        }),
    )
    .await;

    let roots = app.get("/api/order-types/root").await;
    roots.assert_status_ok();
    assert_eq!(names(&roots), vec!["Test Order"]);

    let found = app.get("/api/order-types/search?name=laboratory").await;
    assert_eq!(names(&found), vec!["Lab Order"]);

    let children = app
        .get(&format!(
            "/api/order-types/parent/{}",
            test_order["order_type_id"]
        ))
        .await;
    assert_eq!(names(&children), vec!["Lab Order"]);

    let by_name = app.get("/api/order-types/name/Lab%20Order").await;
    by_name.assert_status_ok();
    assert_eq!(data(&by_name)["parent"], test_order["order_type_id"]);

    app.get("/api/order-types/name/Imaging")
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn test_order_type_replace_requires_every_field() {
    let app = TestApp::new();
    let order_type = app
        .create("order-types", json!({ "name": "Drug Order", "creator": 1 }))
        .await;

    let response = app
        .put(&format!("/api/order-types/uuid/{}", uuid_of(&order_type)))
        .json(&json!({ "name": "Drug Order", "description": "Medication" }))
        .await;

    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_visit_type_lookups() {
    let app = TestApp::new();
    app.create(
        "visit-types",
        json!({ "name": "Outpatient", "creator": 1, "description": "Same day clinic visit" }),
    )
    .await;
    let inpatient = app
        .create("visit-types", json!({ "name": "Inpatient", "creator": 1 }))
        .await;
    app.post(&format!(
        "/api/visit-types/uuid/{}/retire?retired_by=1",
        uuid_of(&inpatient)
    ))
    .await
    .assert_status_ok();

    let by_name = app.get("/api/visit-types/name/Outpatient").await;
    by_name.assert_status_ok();
    assert_eq!(data(&by_name)["description"], "Same day clinic visit");
    app.get("/api/visit-types/name/Inpatient")
        .await
        .assert_status_not_found();

    let found = app.get("/api/visit-types/search?name=clinic").await;
    assert_eq!(names(&found), vec!["Outpatient"]);
}

#[tokio::test]
async fn test_providers_listing_and_reads() {
    let app = TestApp::new();
    let person_id = insert_person(&app.store, "Kwame", "Mensah").await;
    let clinician = insert_provider(&app.store, Some(person_id), "PRV-100").await;
    insert_provider(&app.store, None, "PRV-200").await;

    let response = app.get("/api/providers?limit=1").await;
    response.assert_status_ok();
    let page = data(&response);
    assert_eq!(page["total_count"], 2);
    assert_eq!(page["limit"], 1);
    assert_eq!(page["providers"][0]["identifier"], "PRV-100");
    assert_eq!(page["providers"][0]["person"]["full_name"], "Kwame Mensah");

    let by_uuid = app.get(&format!("/api/providers/uuid/{}", clinician)).await;
    by_uuid.assert_status_ok();
    let provider_id = data(&by_uuid)["provider_id"].clone();
    assert_eq!(data(&by_uuid)["person"]["gender"], "M");

    let by_id = app.get(&format!("/api/providers/{}", provider_id)).await;
    by_id.assert_status_ok();
    assert_eq!(data(&by_id)["uuid"], clinician.as_str());

    app.get("/api/providers/404").await.assert_status_not_found();
    app.get("/api/providers/uuid/not-a-uuid")
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}
