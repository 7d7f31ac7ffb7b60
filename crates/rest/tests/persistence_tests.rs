//! Records written through the API survive a server restart on a file
//! database.

mod common;

use std::sync::Arc;

use emr_persistence::SqliteBackend;
use emr_rest::ServerConfig;
use serde_json::Value;
use tempfile::TempDir;

use common::fixtures::order_body;
use common::harness::{TestApp, uuid_of};

#[tokio::test]
async fn test_records_survive_restart() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("bridge.db");

    let uuid = {
        let store = Arc::new(SqliteBackend::open(&path).expect("Failed to open database"));
        let app = TestApp::over(store, ServerConfig::for_testing());
        let created = app.create("orders", order_body(9)).await;
        app.post(&format!("/api/orders/uuid/{}/void?by=2", uuid_of(&created)))
            .await
            .assert_status_ok();
        uuid_of(&created)
    };

    let store = Arc::new(SqliteBackend::open(&path).expect("Failed to reopen database"));
    let app = TestApp::over(store, ServerConfig::for_testing());

    let response = app.get(&format!("/api/orders/uuid/{}", uuid)).await;

    response.assert_status_ok();
    let order = response.json::<Value>()["data"].clone();
    assert_eq!(order["voided"], true);
    assert_eq!(order["voided_by"], 2);
}
