//! Health Routes
//!
//! Health check endpoints for monitoring.
//!
//! - GET /health/live - Liveness probe (process is alive)
//! - GET /health - Connected and known servers

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::{ConnectedServer, HealthResponse};
use crate::api::state::AppState;

/// GET /health/live
///
/// Returns 200 if the process is alive, no dependency checks.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// GET /health
///
/// Full status with the servers currently connected.
pub async fn full_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let pids = state.watcher.snapshot().await;

    let connected_servers = state
        .registry
        .servers()
        .await
        .into_iter()
        .map(|server| ConnectedServer {
            pid: pids.get(&server.name).copied(),
            name: server.name,
            connected_at: server.connected_at,
        })
        .collect();

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
        connected_servers,
        known_servers: state.servers.names().await,
    })
}
