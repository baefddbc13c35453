//! Health, readiness and metrics handlers
//!
//! Author: hephaex@gmail.com

use crate::state::{AppState, EndpointStats};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use utoipa::ToSchema;

/// Liveness payload
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Liveness probe; never touches the stores
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Process is up", body = HealthResponse)
    )
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness payload
#[derive(Serialize, ToSchema)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub checks: ReadinessChecks,
}

#[derive(Serialize, ToSchema)]
pub struct ReadinessChecks {
    /// Server has not been marked draining
    pub accepting: bool,
    /// Credential store answered a ping
    pub credential_store: bool,
}

/// Readiness probe
///
/// 503 while draining or when the credential store does not answer.
#[utoipa::path(
    get,
    path = "/ready",
    tag = "health",
    responses(
        (status = 200, description = "Ready to serve", body = ReadinessResponse),
        (status = 503, description = "Draining or store unreachable", body = ReadinessResponse)
    )
)]
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let checks = ReadinessChecks {
        accepting: state.is_ready(),
        credential_store: match state.auth.store().ping().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Credential store ping failed");
                false
            }
        },
    };

    let ready = checks.accepting && checks.credential_store;
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(ReadinessResponse { ready, checks }))
}

/// Metrics snapshot
#[derive(Serialize)]
pub struct MetricsResponse {
    pub uptime_seconds: u64,
    pub total_requests: u64,
    pub requests_per_second: f64,
    /// Keyed by `"<METHOD> <normalized path>"`
    pub endpoints: BTreeMap<String, EndpointStats>,
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> Json<MetricsResponse> {
    let uptime_seconds = state.uptime_secs();
    let total_requests = state.get_request_count();

    Json(MetricsResponse {
        uptime_seconds,
        total_requests,
        requests_per_second: match uptime_seconds {
            0 => 0.0,
            secs => total_requests as f64 / secs as f64,
        },
        endpoints: state.endpoint_stats().await,
    })
}
