//! REST API test harness.

use std::sync::Arc;

use axum::http::{HeaderValue, header::AUTHORIZATION};
use axum_test::{TestRequest, TestServer};
use emr_persistence::SqliteBackend;
use serde_json::Value;

use emr_rest::{ServerConfig, create_app_shared};

/// The key accepted by [`ServerConfig::for_testing`].
pub const TEST_KEY: &str = "omrs_00000000000000000000000000000000";

/// `Authorization` header carrying [`TEST_KEY`].
pub fn bearer() -> HeaderValue {
    HeaderValue::from_static("Bearer omrs_00000000000000000000000000000000")
}

/// A test server plus the store behind it, for seeding rows the API cannot
/// write.
pub struct TestApp {
    pub server: TestServer,
    pub store: Arc<SqliteBackend>,
}

impl TestApp {
    /// Server over a fresh in-memory store with the test configuration.
    pub fn new() -> Self {
        Self::with_config(ServerConfig::for_testing())
    }

    pub fn with_config(config: ServerConfig) -> Self {
        let store = Arc::new(SqliteBackend::in_memory().expect("Failed to create SQLite backend"));
        Self::over(store, config)
    }

    /// Server over an existing store.
    pub fn over(store: Arc<SqliteBackend>, config: ServerConfig) -> Self {
        let app = create_app_shared(Arc::clone(&store), config);
        let server = TestServer::new(app).expect("Failed to create test server");
        Self { server, store }
    }

    pub fn get(&self, path: &str) -> TestRequest {
        self.server.get(path).add_header(AUTHORIZATION, bearer())
    }

    pub fn post(&self, path: &str) -> TestRequest {
        self.server.post(path).add_header(AUTHORIZATION, bearer())
    }

    pub fn patch(&self, path: &str) -> TestRequest {
        self.server.patch(path).add_header(AUTHORIZATION, bearer())
    }

    pub fn put(&self, path: &str) -> TestRequest {
        self.server.put(path).add_header(AUTHORIZATION, bearer())
    }

    /// Creates a record and returns its `data` object.
    pub async fn create(&self, collection: &str, body: Value) -> Value {
        let response = self.post(&format!("/api/{}", collection)).json(&body).await;
        response.assert_status_ok();
        response.json::<Value>()["data"].clone()
    }
}

/// The `uuid` of a record returned by the API.
pub fn uuid_of(record: &Value) -> String {
    record["uuid"]
        .as_str()
        .expect("record has a uuid")
        .to_string()
}
