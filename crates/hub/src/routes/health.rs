use std::collections::HashMap;

use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status: `ok` or `degraded` (no durable storage).
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Whether durable storage is configured and reachable.
    pub storage_healthy: bool,
}

/// Metrics response payload: live connection bookkeeping.
#[derive(Serialize)]
pub struct MetricsResponse {
    /// Total WebSocket connections on this process.
    pub connections: usize,
    /// Live connection count per site.
    pub sites: HashMap<String, usize>,
    /// Tracked dashboard presence records.
    pub presence_records: usize,
}

/// GET /health -- service and storage health.
///
/// A hub without storage is degraded, not down: real-time sync keeps
/// working without persistence.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let storage_healthy = match &state.pool {
        Some(pool) => livetext_db::health_check(pool).await.is_ok(),
        None => false,
    };

    let status = if storage_healthy { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        storage_healthy,
    })
}

/// GET /metrics -- live per-site connection counts.
async fn metrics(State(state): State<AppState>) -> Json<MetricsResponse> {
    Json(MetricsResponse {
        connections: state.registry.connection_count().await,
        sites: state.registry.site_connection_counts().await,
        presence_records: state.presence.len().await,
    })
}

/// Mount health/metrics routes (intended for root-level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
}
