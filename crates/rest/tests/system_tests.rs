//! Upstream OpenMRS check tests, against a stand-in OpenMRS served on a
//! local port.

mod common;

use axum::Router;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::options;
use serde_json::Value;

use common::harness::TestApp;
use emr_rest::ServerConfig;

/// Serves `router` on an ephemeral port and returns its base URL.
async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stand-in server");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}/openmrs", addr)
}

fn app_for(openmrs_url: String) -> TestApp {
    TestApp::with_config(ServerConfig {
        openmrs_url,
        openmrs_username: Some("admin".to_string()),
        openmrs_password: Some("Admin123".to_string()),
        ..ServerConfig::for_testing()
    })
}

/// Answers like OpenMRS does when only POST is mapped, and refuses
/// requests without basic auth.
async fn rebuild_options(headers: HeaderMap) -> impl IntoResponse {
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("Basic "));
    if authorized {
        (StatusCode::METHOD_NOT_ALLOWED, [(header::ALLOW, "POST")]).into_response()
    } else {
        StatusCode::UNAUTHORIZED.into_response()
    }
}

#[tokio::test]
async fn test_reachable_endpoint_is_available() {
    let base = serve(Router::new().route(
        "/openmrs/ws/rest/v1/searchIndex/rebuild",
        options(rebuild_options),
    ))
    .await;
    let app = app_for(base);

    let response = app.get("/api/system/search-index/availability").await;

    response.assert_status_ok();
    let data = response.json::<Value>()["data"].clone();
    assert_eq!(data["available"], true);
    assert_eq!(data["status_code"], 405);
    assert_eq!(data["reason"], "Method Not Allowed");
    assert_eq!(data["requires_authentication"], false);
    assert_eq!(data["allowed_methods"], serde_json::json!(["POST"]));
}

#[tokio::test]
async fn test_missing_credentials_are_reported() {
    let base = serve(Router::new().route(
        "/openmrs/ws/rest/v1/searchIndex/rebuild",
        options(rebuild_options),
    ))
    .await;
    let app = TestApp::with_config(ServerConfig {
        openmrs_url: base,
        ..ServerConfig::for_testing()
    });

    let response = app.get("/api/system/search-index/availability").await;

    response.assert_status_ok();
    let data = response.json::<Value>()["data"].clone();
    assert_eq!(data["requires_authentication"], true);
    assert_eq!(data["message"], "Authentication required (401).");
}

#[tokio::test]
async fn test_missing_endpoint_is_unavailable() {
    let base = serve(Router::new()).await;
    let app = app_for(base);

    let response = app.get("/api/system/search-index/availability").await;

    response.assert_status_ok();
    let data = response.json::<Value>()["data"].clone();
    assert_eq!(data["available"], false);
    assert_eq!(data["status_code"], 404);
    assert_eq!(data["message"], "Endpoint not found (404).");
}

#[tokio::test]
async fn test_unreachable_upstream_is_bad_gateway() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let app = app_for(format!("http://{}/openmrs", addr));

    let response = app.get("/api/system/search-index/availability").await;

    response.assert_status(StatusCode::BAD_GATEWAY);
    let body = response.json::<Value>();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Bad gateway");
    assert!(
        body["detail"]
            .as_str()
            .unwrap()
            .starts_with("Unable to reach OpenMRS")
    );
}

#[tokio::test]
async fn test_availability_requires_api_key() {
    let app = TestApp::new();

    let response = app
        .server
        .get("/api/system/search-index/availability")
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}
