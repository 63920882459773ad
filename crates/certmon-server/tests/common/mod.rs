#![allow(dead_code)]

use anyhow::Result;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use certmon_server::app;
use certmon_server::config::{DatabaseConfig, ServerConfig};
use certmon_server::state::AppState;
use certmon_storage::CertStore;
use chrono::{Duration, Utc};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

pub struct TestContext {
    pub temp_dir: TempDir,
    pub state: AppState,
    pub app: axum::Router,
}

pub async fn build_test_context() -> Result<TestContext> {
    let temp_dir = tempfile::tempdir()?;
    let data_dir = temp_dir.path().to_string_lossy().to_string();

    let mut config = ServerConfig {
        database: DatabaseConfig {
            data_dir,
            url: None,
        },
        ..ServerConfig::default()
    };
    config.scheduler.enabled = false;

    let cert_store = Arc::new(
        CertStore::new(&config.database.connection_url(), temp_dir.path()).await?,
    );
    let state = AppState::new(cert_store, config);
    let app = app::build_http_app(state.clone());

    Ok(TestContext {
        temp_dir,
        state,
        app,
    })
}

async fn send(app: &axum::Router, req: Request<Body>) -> (StatusCode, Value, Option<String>) {
    let resp = app
        .clone()
        .oneshot(req)
        .await
        .expect("request should be handled");

    let status = resp.status();
    let trace_id = resp
        .headers()
        .get("x-trace-id")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body should read");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice::<Value>(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()))
    };

    (status, json, trace_id)
}

pub async fn request_json(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Value,
) -> (StatusCode, Value, Option<String>) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request should build");
    send(app, req).await
}

pub async fn request_no_body(
    app: &axum::Router,
    method: &str,
    uri: &str,
) -> (StatusCode, Value, Option<String>) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request should build");
    send(app, req).await
}

pub fn assert_ok_envelope(json: &Value) {
    assert_eq!(json["code"], 200);
    assert!(json["message"].is_string());
    assert!(json["timestamp"].is_i64());
    assert!(json["trace_id"].is_string());
}

pub fn assert_err_envelope(json: &Value, code: u16) {
    assert_eq!(json["code"], code);
    assert!(json["message"].is_string());
    assert!(json["timestamp"].is_i64());
    assert!(json["trace_id"].is_string());
    assert!(json.get("data").is_some());
    assert!(json["data"].is_null());
}

pub fn decode_data<T: DeserializeOwned>(json: &Value) -> T {
    serde_json::from_value(json["data"].clone()).expect("data should decode")
}

/// A create-request body expiring `days` days from now.
pub fn create_body(domain: &str, days: i64) -> Value {
    let expires = Utc::now() + Duration::days(days);
    json!({
        "domain_name": domain,
        "sans": format!("www.{domain}"),
        "issuer": "Test CA",
        "expiration_date": expires.format("%Y-%m-%d %H:%M:%S").to_string(),
        "owner": "ops",
        "notes": "seed"
    })
}

pub async fn create_certificate(app: &axum::Router, domain: &str, days: i64) -> Value {
    let (status, body, _) =
        request_json(app, "POST", "/v1/certificates", create_body(domain, days)).await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {body}");
    body["data"].clone()
}
