//! Health check handlers

use crate::AppState;
use axum::{extract::State, Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub registry: CheckResult,
}

#[derive(Serialize)]
pub struct CheckResult {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documents: Option<usize>,
}

/// Liveness probe - always healthy if the server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: veridoc_common::VERSION.to_string(),
    })
}

/// Readiness probe - reports registry state
pub async fn ready(State(state): State<AppState>) -> Json<ReadyResponse> {
    let registry_check = CheckResult {
        status: "up".to_string(),
        documents: Some(state.registry.len()),
    };

    Json(ReadyResponse {
        status: "ready".to_string(),
        checks: HealthChecks {
            registry: registry_check,
        },
    })
}
