use crate::infra::AppState;
use axum::extract::Path;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use metro2_audit::audit::{AuditReport, AuditSummary, ViolationRecord};
use metro2_audit::error::AppError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Deserialize)]
pub(crate) struct AuditReportRequest {
    pub(crate) html: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct AuditReportResponse {
    #[serde(flatten)]
    pub(crate) report: AuditReport,
    pub(crate) summary: AuditSummary,
}

/// Field values arrive as raw report text; numbers are accepted and stringified.
#[derive(Debug, Deserialize)]
pub(crate) struct ValidateFieldsRequest {
    pub(crate) fields: BTreeMap<String, Value>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ValidateFieldsResponse {
    pub(crate) violations: Vec<ViolationRecord>,
}

pub(crate) fn audit_routes() -> Router {
    Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .route("/api/v1/reports/audit", post(audit_report_endpoint))
        .route("/api/v1/violations/validate", post(validate_fields_endpoint))
        .route("/api/v1/violations/:code", get(violation_lookup_endpoint))
}

pub(crate) async fn healthcheck() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Parsing is CPU-bound, so it runs on the blocking pool.
pub(crate) async fn audit_report_endpoint(
    Extension(state): Extension<AppState>,
    Json(payload): Json<AuditReportRequest>,
) -> Result<Json<AuditReportResponse>, AppError> {
    let engine = Arc::clone(&state.engine);
    let report = tokio::task::spawn_blocking(move || engine.audit(&payload.html))
        .await
        .map_err(|err| AppError::Io(std::io::Error::other(err)))?;

    let summary = report.summary();
    info!(
        tradelines = summary.tradelines,
        violations = summary.violations,
        "report audited"
    );

    Ok(Json(AuditReportResponse { report, summary }))
}

pub(crate) async fn validate_fields_endpoint(
    Extension(state): Extension<AppState>,
    Json(payload): Json<ValidateFieldsRequest>,
) -> Result<Json<ValidateFieldsResponse>, AppError> {
    let raw = payload
        .fields
        .into_iter()
        .map(|(name, value)| (name, raw_text(value)));
    let fields = state.engine.fields_from_raw(raw)?;

    Ok(Json(ValidateFieldsResponse {
        violations: state.engine.validate(&fields),
    }))
}

pub(crate) async fn violation_lookup_endpoint(
    Extension(state): Extension<AppState>,
    Path(code): Path<String>,
) -> Json<ViolationRecord> {
    Json(state.engine.enrich(&code, None))
}

fn raw_text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
