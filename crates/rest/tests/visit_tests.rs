//! Visit endpoint tests: generic record routes, visit listings, the stop
//! action and the vitals views.

mod common;

use axum::http::StatusCode;
use serde_json::{Value, json};

use common::fixtures::{
    concept_body, encounter_body, insert_concept_class, insert_person, order_body, visit_body,
};
use common::harness::{TestApp, uuid_of};

fn data(response: &axum_test::TestResponse) -> Value {
    response.json::<Value>()["data"].clone()
}

fn visit_ids(response: &axum_test::TestResponse) -> Vec<i64> {
    data(response)
        .as_array()
        .expect("listing is an array")
        .iter()
        .map(|visit| visit["visit_id"].as_i64().unwrap())
        .collect()
}

mod visits {
    use super::*;

    #[tokio::test]
    async fn test_create_and_read_visit() {
        let app = TestApp::new();
        let created = app
            .create("visits", visit_body(9, "2024-03-01T08:00:00Z"))
            .await;

        assert_eq!(created["date_started"], "2024-03-01T08:00:00Z");
        assert!(created["date_stopped"].is_null());
        assert_eq!(created["voided"], false);

        let response = app
            .get(&format!("/api/visits/uuid/{}", uuid_of(&created)))
            .await;
        response.assert_status_ok();
        assert_eq!(data(&response)["visit_id"], created["visit_id"]);
    }

    #[tokio::test]
    async fn test_patch_null_visit_type_is_unprocessable() {
        let app = TestApp::new();
        let created = app
            .create("visits", visit_body(9, "2024-03-01T08:00:00Z"))
            .await;

        let response = app
            .patch(&format!("/api/visits/uuid/{}", uuid_of(&created)))
            .json(&json!({ "visit_type_id": null }))
            .await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_stop_then_completed_listing() {
        let app = TestApp::new();
        let first = app
            .create("visits", visit_body(9, "2024-03-01T08:00:00Z"))
            .await;
        let second = app
            .create("visits", visit_body(9, "2024-03-02T08:00:00Z"))
            .await;

        let response = app
            .post(&format!(
                "/api/visits/uuid/{}/stop?stopped_by=4&date_stopped=2024-03-01T17:00:00Z",
                uuid_of(&first)
            ))
            .await;
        response.assert_status_ok();
        let stopped = data(&response);
        assert_eq!(stopped["date_stopped"], "2024-03-01T17:00:00Z");
        assert_eq!(stopped["changed_by"], 4);

        let completed = app.get("/api/visits/completed").await;
        completed.assert_status_ok();
        assert_eq!(visit_ids(&completed), vec![first["visit_id"].as_i64().unwrap()]);

        let active = app.get("/api/visits/active?patient_id=9").await;
        assert_eq!(visit_ids(&active), vec![second["visit_id"].as_i64().unwrap()]);
    }

    #[tokio::test]
    async fn test_stop_before_start_is_unprocessable() {
        let app = TestApp::new();
        let visit = app
            .create("visits", visit_body(9, "2024-03-02T08:00:00Z"))
            .await;

        let response = app
            .post(&format!(
                "/api/visits/uuid/{}/stop?stopped_by=4&date_stopped=2024-03-01T08:00:00Z",
                uuid_of(&visit)
            ))
            .await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(response.json::<Value>()["success"], false);
    }

    #[tokio::test]
    async fn test_date_range_listing_is_newest_first() {
        let app = TestApp::new();
        app.create("visits", visit_body(9, "2024-03-01T08:00:00Z"))
            .await;
        let second = app
            .create("visits", visit_body(9, "2024-03-02T08:00:00Z"))
            .await;
        let third = app
            .create("visits", visit_body(9, "2024-03-03T08:00:00Z"))
            .await;

        let response = app
            .get("/api/visits/date-range?start_date=2024-03-02T00:00:00Z&end_date=2024-03-03T23:59:59Z")
            .await;

        response.assert_status_ok();
        assert_eq!(
            visit_ids(&response),
            vec![
                third["visit_id"].as_i64().unwrap(),
                second["visit_id"].as_i64().unwrap()
            ]
        );

        let inverted = app
            .get("/api/visits/date-range?start_date=2024-03-03T00:00:00Z&end_date=2024-03-02T00:00:00Z")
            .await;
        inverted.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_with_order_type_listing() {
        let app = TestApp::new();
        let lab_visit = app
            .create("visits", visit_body(9, "2024-03-01T08:00:00Z"))
            .await;
        app.create("visits", visit_body(9, "2024-03-02T08:00:00Z"))
            .await;
        let encounter = app
            .create(
                "encounters",
                encounter_body(9, lab_visit["visit_id"].as_i64(), "2024-03-01T09:00:00Z"),
            )
            .await;
        let mut order = order_body(9);
        order["order_type_id"] = json!(3);
        order["encounter_id"] = encounter["encounter_id"].clone();
        app.create("orders", order).await;

        let response = app.get("/api/visits/with-order-type/3").await;

        response.assert_status_ok();
        assert_eq!(
            visit_ids(&response),
            vec![lab_visit["visit_id"].as_i64().unwrap()]
        );
        let none = app.get("/api/visits/with-order-type/2").await;
        assert!(visit_ids(&none).is_empty());
    }

    #[tokio::test]
    async fn test_void_uses_void_vocabulary() {
        let app = TestApp::new();
        let visit = app
            .create("visits", visit_body(9, "2024-03-01T08:00:00Z"))
            .await;

        let response = app
            .post(&format!(
                "/api/visits/uuid/{}/void?voided_by=2&reason=duplicate",
                uuid_of(&visit)
            ))
            .await;
        response.assert_status_ok();
        assert_eq!(data(&response)["voided"], true);

        let voided = app.get("/api/visits/voided").await;
        assert_eq!(visit_ids(&voided), vec![visit["visit_id"].as_i64().unwrap()]);
        let by_patient = app.get("/api/visits/patient/9").await;
        assert!(visit_ids(&by_patient).is_empty());
    }
}

mod vitals {
    use super::*;

    struct Seeded {
        app: TestApp,
        visit_id: i64,
        visit_uuid: String,
    }

    /// A visit with pulse and temperature taken in its encounter, plus a
    /// lab result that is not a vital sign.
    async fn seed() -> Seeded {
        let app = TestApp::new();
        let patient_id = insert_person(&app.store, "Kwame", "Mensah").await;
        let vitals_class = insert_concept_class(&app.store, "Vital Signs").await;
        let lab_class = insert_concept_class(&app.store, "Test").await;

        let visit = app
            .create("visits", visit_body(patient_id, "2024-03-01T07:00:00Z"))
            .await;
        let visit_id = visit["visit_id"].as_i64().unwrap();
        let encounter = app
            .create(
                "encounters",
                encounter_body(patient_id, Some(visit_id), "2024-03-01T08:00:00Z"),
            )
            .await;

        let mut concepts = Vec::new();
        for (name, class_id) in [
            ("Pulse", vitals_class),
            ("Temperature", vitals_class),
            ("Hemoglobin", lab_class),
        ] {
            let mut body = concept_body(name);
            body["class_id"] = json!(class_id);
            concepts.push(app.create("concepts", body).await["concept_id"].clone());
        }

        for (concept_id, value, at) in [
            (&concepts[0], 72.0, "2024-03-01T09:00:00Z"),
            (&concepts[1], 37.2, "2024-03-01T10:00:00Z"),
            (&concepts[0], 78.0, "2024-03-01T11:00:00Z"),
            (&concepts[2], 12.5, "2024-03-01T09:30:00Z"),
        ] {
            app.create(
                "observations",
                json!({
                    "person_id": patient_id,
                    "concept_id": concept_id,
                    "encounter_id": encounter["encounter_id"],
                    "obs_datetime": at,
                    "value_numeric": value
                }),
            )
            .await;
        }

        Seeded {
            app,
            visit_id,
            visit_uuid: uuid_of(&visit),
        }
    }

    #[tokio::test]
    async fn test_visit_vitals_by_id() {
        let seeded = seed().await;

        let response = seeded
            .app
            .get(&format!("/api/vitals/visit/{}", seeded.visit_id))
            .await;

        response.assert_status_ok();
        let page = data(&response);
        assert_eq!(page["total_count"], 3);
        assert_eq!(page["patient"]["name"], "Kwame Mensah");
        assert_eq!(page["vitals"][0]["value_numeric"], 78.0);
        assert_eq!(page["vitals"][2]["value_numeric"], 72.0);
        assert!(page["encounter"]["encounter_id"].is_i64());
    }

    #[tokio::test]
    async fn test_grouped_vitals_by_uuid() {
        let seeded = seed().await;

        let response = seeded
            .app
            .get(&format!(
                "/api/vitals/visit/uuid/{}/grouped",
                seeded.visit_uuid
            ))
            .await;

        response.assert_status_ok();
        let grouped = data(&response);
        assert_eq!(grouped["visit_id"], seeded.visit_id);
        assert_eq!(grouped["vitals_by_type"][0]["vital_type"], "Pulse");
        assert_eq!(
            grouped["vitals_by_type"][0]["vitals"]
                .as_array()
                .unwrap()
                .len(),
            2
        );
        assert_eq!(grouped["vitals_by_type"][1]["vital_type"], "Temperature");
    }

    #[tokio::test]
    async fn test_vitals_of_voided_visit_are_not_found() {
        let seeded = seed().await;
        seeded
            .app
            .post(&format!(
                "/api/visits/uuid/{}/void?voided_by=1",
                seeded.visit_uuid
            ))
            .await
            .assert_status_ok();

        let response = seeded
            .app
            .get(&format!("/api/vitals/visit/{}/grouped", seeded.visit_id))
            .await;

        response.assert_status_not_found();
        assert_eq!(response.json::<Value>()["success"], false);
        seeded
            .app
            .get("/api/vitals/visit/999")
            .await
            .assert_status_not_found();
    }
}
