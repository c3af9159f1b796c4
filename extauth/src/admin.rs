//! The metrics/health HTTP surface, served on its own port alongside the
//! gRPC listener.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use extauth_core::{AnalysisController, MatchController};
use extauth_metrics::PrometheusInstrumentation;
use serde::Serialize;

#[derive(Clone)]
pub struct AdminState {
    pub metrics: Arc<PrometheusInstrumentation>,
    pub analysis: Arc<Vec<Arc<dyn AnalysisController>>>,
    pub matchers: Arc<Vec<Arc<dyn MatchController>>>,
}

pub fn router(state: AdminState) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

async fn metrics_handler(State(state): State<AdminState>) -> impl IntoResponse {
    (
        [("content-type", "text/plain; version=0.0.4")],
        state.metrics.encode(),
    )
}

#[derive(Serialize)]
struct HealthCheck {
    name: String,
    up: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

#[derive(Serialize)]
struct HealthReport {
    up: bool,
    checks: Vec<HealthCheck>,
}

async fn aggregate(state: &AdminState) -> HealthReport {
    let mut checks = Vec::with_capacity(state.analysis.len() + state.matchers.len());
    let mut all_up = true;

    for controller in state.analysis.iter() {
        let result = controller.health_check().await;
        all_up &= result.is_ok();
        checks.push(HealthCheck {
            name: controller.name().to_string(),
            up: result.is_ok(),
            reason: result.err().map(|e| e.to_string()),
        });
    }
    for controller in state.matchers.iter() {
        let result = controller.health_check().await;
        all_up &= result.is_ok();
        checks.push(HealthCheck {
            name: controller.name().to_string(),
            up: result.is_ok(),
            reason: result.err().map(|e| e.to_string()),
        });
    }

    HealthReport { up: all_up, checks }
}

async fn health_handler(State(state): State<AdminState>) -> impl IntoResponse {
    let report = aggregate(&state).await;
    let status = if report.up { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status, Json(report))
}

/// Always 200: the process is alive and able to answer HTTP requests.
async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness_handler(State(state): State<AdminState>) -> impl IntoResponse {
    let report = aggregate(&state).await;
    let status = if report.up { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status, Json(report))
}
