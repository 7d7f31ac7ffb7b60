//! API key authentication tests.
//!
//! - `/health` is open
//! - `/api` requires a configured bearer key
//! - A server with no keys answers 500 rather than letting requests through

mod common;

use axum::http::{HeaderValue, StatusCode, header::AUTHORIZATION, header::WWW_AUTHENTICATE};
use regex::Regex;
use serde_json::Value;

use common::harness::{TEST_KEY, TestApp};
use emr_rest::{ServerConfig, generate_api_key, is_well_formed_key};

#[tokio::test]
async fn test_health_requires_no_key() {
    let app = TestApp::new();

    let response = app.server.get("/health").await;

    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["backend"], "sqlite");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_missing_key_is_unauthorized() {
    let app = TestApp::new();

    let response = app.server.get("/api/orders").await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.header(WWW_AUTHENTICATE), "Bearer");
    let body = response.json::<Value>();
    assert_eq!(body["success"], false);
    assert_eq!(body["detail"], "API key required");
}

#[tokio::test]
async fn test_unknown_key_is_unauthorized() {
    let app = TestApp::new();

    let response = app
        .server
        .get("/api/orders")
        .add_header(AUTHORIZATION, HeaderValue::from_static("Bearer omrs_not-a-real-key"))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["detail"], "Invalid API key");
}

#[tokio::test]
async fn test_non_bearer_scheme_is_unauthorized() {
    let app = TestApp::new();
    let basic = HeaderValue::from_str(&format!("Basic {}", TEST_KEY)).unwrap();

    let response = app
        .server
        .get("/api/orders")
        .add_header(AUTHORIZATION, basic)
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["detail"], "API key required");
}

#[tokio::test]
async fn test_scheme_is_case_insensitive() {
    let app = TestApp::new();
    let lower = HeaderValue::from_str(&format!("bearer {}", TEST_KEY)).unwrap();

    let response = app
        .server
        .get("/api/orders")
        .add_header(AUTHORIZATION, lower)
        .await;

    response.assert_status_ok();
}

#[tokio::test]
async fn test_no_configured_keys_is_server_error() {
    let app = TestApp::with_config(ServerConfig {
        api_keys: String::new(),
        ..ServerConfig::for_testing()
    });

    let response = app.get("/api/orders").await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.json::<Value>()["detail"], "No API keys configured");
}

#[tokio::test]
async fn test_any_configured_key_is_accepted() {
    let second = generate_api_key();
    let app = TestApp::with_config(ServerConfig {
        api_keys: format!("{}, {}", TEST_KEY, second),
        ..ServerConfig::for_testing()
    });
    let header = HeaderValue::from_str(&format!("Bearer {}", second)).unwrap();

    let response = app
        .server
        .get("/api/concepts")
        .add_header(AUTHORIZATION, header)
        .await;

    response.assert_status_ok();
}

#[test]
fn test_generated_key_format() {
    let pattern = Regex::new(r"^omrs_[0-9a-f]{32}$").unwrap();
    let key = generate_api_key();

    assert!(pattern.is_match(&key), "unexpected key {}", key);
    assert!(is_well_formed_key(&key));
    assert_ne!(key, generate_api_key());
}
