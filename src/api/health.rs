//! Health check endpoint.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::registry::RegistryStats;
use crate::router::RouterStatsSnapshot;
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub connections: RegistryStats,
    pub router: RouterStatsSnapshot,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        connections: state.registry.stats(),
        router: state.router.stats(),
    })
}
