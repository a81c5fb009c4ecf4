//! Health check handler

use axum::{Json, extract::State};
use serde::Serialize;

use crate::state::AppState;

/// Liveness report for load balancers.
#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    /// Always "ok" while the process serves requests
    pub status: &'static str,
    pub version: &'static str,
    /// Where sessions are kept: "postgres" or "memory"
    pub session_store: &'static str,
}

/// # Example
/// ```bash
/// curl http://localhost:3000/api/v1/health
/// # Returns: {"status":"ok","version":"0.1.0","session_store":"memory"}
/// ```
pub async fn health_check(State(state): State<AppState>) -> Json<HealthCheckResponse> {
    let session_store = if state.config.database.enabled {
        "postgres"
    } else {
        "memory"
    };
    tracing::debug!(session_store, "[Health] Health check requested");
    Json(HealthCheckResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        session_store,
    })
}
