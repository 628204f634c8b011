//! Application startup and lifecycle management.

use crate::config::ExpenseConfig;
use crate::handlers::{messages, reports};
use crate::services::{
    get_metrics, init_metrics, AccessGate, Database, ExpensePipeline, LedgerStore, SessionStore,
};
use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use service_core::error::AppError;
use service_core::middleware::metrics::metrics_middleware;
use service_core::middleware::tracing::request_id_middleware;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<dyn LedgerStore>,
    pub pipeline: Arc<ExpensePipeline>,
    pub sessions: Arc<SessionStore>,
    pub gate: Arc<AccessGate>,
}

impl AppState {
    pub fn new(ledger: Arc<dyn LedgerStore>, gate: AccessGate) -> Self {
        Self::with_pipeline(ExpensePipeline::new(ledger), gate)
    }

    /// Use a preconfigured pipeline, e.g. one with a fixed clock.
    pub fn with_pipeline(pipeline: ExpensePipeline, gate: AccessGate) -> Self {
        Self {
            ledger: pipeline.ledger().clone(),
            pipeline: Arc::new(pipeline),
            sessions: Arc::new(SessionStore::new()),
            gate: Arc::new(gate),
        }
    }
}

/// Health check endpoint for Docker/K8s liveness probes.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.ledger.health_check().await {
        Ok(_) => {
            tracing::debug!("Health check passed");
            (
                StatusCode::OK,
                Json(json!({
                    "status": "ok",
                    "service": "expense-service",
                    "version": env!("CARGO_PKG_VERSION")
                })),
            )
        }
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed - ledger unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "service": "expense-service",
                    "error": e.to_string()
                })),
            )
        }
    }
}

/// Readiness check endpoint for K8s readiness probes.
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.ledger.health_check().await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// Metrics endpoint for Prometheus scraping.
async fn metrics_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        get_metrics(),
    )
}

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/users/:user_id/messages", post(messages::post_message))
        .route("/users/:user_id/confirm", post(messages::confirm))
        .route("/users/:user_id/cancel", post(messages::cancel))
        .route("/users/:user_id/undo", post(messages::undo))
        .route(
            "/users/:user_id/past-mode",
            axum::routing::put(messages::enable_past_mode).delete(messages::disable_past_mode),
        )
        .route("/owners", get(reports::list_owners))
        .route("/owners/:owner_id/months", get(reports::owner_months))
        .route("/owners/:owner_id/records", get(reports::owner_records))
        .route("/owners/:owner_id/summary", get(reports::owner_summary));

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_handler))
        .nest("/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    http_port: u16,
    http_listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: ExpenseConfig) -> Result<Self, AppError> {
        Self::build_internal(config, true).await
    }

    /// Build the application without running migrations.
    /// Use this in tests when migrations are already applied by the test harness.
    pub async fn build_without_migrations(config: ExpenseConfig) -> Result<Self, AppError> {
        Self::build_internal(config, false).await
    }

    async fn build_internal(config: ExpenseConfig, run_migrations: bool) -> Result<Self, AppError> {
        init_metrics();

        let db = Database::new(
            &config.database.url,
            config.database.max_connections,
            config.database.min_connections,
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to PostgreSQL");
            e
        })?;

        if run_migrations {
            db.run_migrations().await.map_err(|e| {
                tracing::error!(error = %e, "Failed to run migrations");
                e
            })?;
        }

        let gate = AccessGate::new(config.allowed_user_ids.iter().copied());
        if gate.is_open() {
            tracing::warn!("ALLOWED_USER_IDS is empty - every user is admitted");
        }

        let state = AppState::new(Arc::new(db), gate);

        let http_addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let http_listener = TcpListener::bind(http_addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %http_addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let http_port = http_listener.local_addr()?.port();

        tracing::info!(http_port = http_port, "Expense service listener bound");

        Ok(Self {
            http_port,
            http_listener,
            state,
        })
    }

    /// Get the HTTP port the server is listening on.
    pub fn http_port(&self) -> u16 {
        self.http_port
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = build_router(self.state);

        tracing::info!(
            service = "expense-service",
            version = env!("CARGO_PKG_VERSION"),
            http_port = self.http_port,
            "Service ready to accept connections"
        );

        axum::serve(self.http_listener, router).await.map_err(|e| {
            tracing::error!(error = %e, "HTTP server error");
            std::io::Error::other(format!("HTTP server error: {}", e))
        })
    }
}
