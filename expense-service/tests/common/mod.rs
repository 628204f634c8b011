//! Common test utilities for expense-service integration tests.

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, TimeZone, Utc};
use expense_service::config::{DatabaseConfig, ExpenseConfig};
use expense_service::services::{AccessGate, Database, ExpensePipeline, InMemoryLedger};
use expense_service::startup::Application;
use expense_service::{build_router, AppState};
use serde_json::Value;
use service_core::config::Config as CommonConfig;
use std::sync::{Arc, Once};
use tower::util::ServiceExt;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,expense_service=debug,sqlx=warn")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Wall clock used by every in-memory app: 2026-03-15 18:30 UTC.
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 15, 18, 30, 0).unwrap()
}

/// Router over an in-memory ledger. An empty `allowed` admits everyone.
pub fn spawn_app(allowed: &[i64]) -> (Router, Arc<InMemoryLedger>) {
    init_tracing();

    let ledger = Arc::new(InMemoryLedger::new());
    let pipeline = ExpensePipeline::new(ledger.clone()).with_clock(fixed_now);
    let state = AppState::with_pipeline(pipeline, AccessGate::new(allowed.iter().copied()));

    (build_router(state), ledger)
}

/// Send one request and decode the JSON body (Null when empty).
pub async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };

    (status, json)
}

pub async fn post_message(app: &Router, user_id: i64, text: &str) -> (StatusCode, Value) {
    send(
        app,
        Method::POST,
        &format!("/v1/users/{}/messages", user_id),
        Some(serde_json::json!({ "text": text })),
    )
    .await
}

pub async fn post_action(app: &Router, user_id: i64, action: &str) -> (StatusCode, Value) {
    send(
        app,
        Method::POST,
        &format!("/v1/users/{}/{}", user_id, action),
        None,
    )
    .await
}

fn test_database_url() -> String {
    std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set to run database tests")
}

/// Connect to TEST_DATABASE_URL, apply migrations and empty the ledger.
pub async fn test_database() -> Database {
    init_tracing();

    let db = Database::new(&test_database_url(), 2, 1)
        .await
        .expect("Failed to connect to test database");
    db.run_migrations().await.expect("Failed to run migrations");

    sqlx::query("TRUNCATE ledger_records RESTART IDENTITY")
        .execute(db.pool())
        .await
        .expect("Failed to reset ledger_records");

    db
}

/// Running server backed by Postgres.
pub struct TestServer {
    pub address: String,
    pub client: reqwest::Client,
}

/// Spawn the full application on a random port. Migrations are applied (and
/// the ledger emptied) by `test_database` first.
pub async fn spawn_server(allowed_user_ids: Vec<i64>) -> TestServer {
    test_database().await;

    let config = ExpenseConfig {
        common: CommonConfig { port: 0 },
        service_name: "expense-service-test".to_string(),
        service_version: "test".to_string(),
        log_level: "debug".to_string(),
        otlp_endpoint: None,
        database: DatabaseConfig {
            url: test_database_url(),
            max_connections: 2,
            min_connections: 1,
        },
        allowed_user_ids,
    };

    let app = Application::build_without_migrations(config)
        .await
        .expect("Failed to build application");
    let address = format!("http://127.0.0.1:{}", app.http_port());

    tokio::spawn(async move {
        app.run_until_stopped().await.ok();
    });

    let client = reqwest::Client::new();

    // Wait for the listener to serve with retry
    let mut attempts = 0;
    loop {
        match client.get(format!("{}/health", address)).send().await {
            Ok(_) => break,
            Err(_) if attempts < 20 => {
                attempts += 1;
                tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
            }
            Err(e) => panic!("Server did not come up after 20 attempts: {}", e),
        }
    }

    TestServer { address, client }
}
