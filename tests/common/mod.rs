//! Shared test helpers

#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::util::ServiceExt;

use finance_ledger::ledger::Ledger;
use finance_ledger::profit::ProfitConfig;
use finance_ledger::snapshot::SnapshotBook;
use finance_ledger::{build_router, AppState};

/// In-memory application state with default profit settings.
pub fn test_state() -> AppState {
    AppState::new(
        Ledger::new(),
        SnapshotBook::new(),
        ProfitConfig::default(),
        None,
    )
}

pub fn test_app(state: AppState) -> Router {
    build_router(state)
}

pub async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

/// Extract a uuid field from a JSON response.
pub fn id_of(value: &Value, field: &str) -> uuid::Uuid {
    value[field].as_str().unwrap().parse().unwrap()
}
