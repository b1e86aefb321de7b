//! Health check endpoint for load balancers and container probes.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use crate::AppState;

static STARTED_AT: OnceLock<Instant> = OnceLock::new();

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    database: bool,
    push_enabled: bool,
    version: &'static str,
    uptime_secs: u64,
}

/// Health check router.
pub fn router() -> Router<Arc<AppState>> {
    STARTED_AT.get_or_init(Instant::now);
    Router::new().route("/health", get(health_check))
}

/// GET /api/health
async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let db_ok = simtaq_db::postgres::health_check(&state.db.pg).await;

    Json(HealthResponse {
        status: if db_ok { "healthy" } else { "degraded" },
        database: db_ok,
        push_enabled: state.push.is_enabled(),
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: STARTED_AT.get().map(|t| t.elapsed().as_secs()).unwrap_or(0),
    })
}
