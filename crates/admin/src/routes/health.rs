use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::state::SharedState;

/// GET /api/health
///
/// Returns the current health status of the gateway, including uptime and
/// the effective snapshot version.
pub async fn health_check(State(state): State<SharedState>) -> Json<Value> {
    let uptime = state.start_time.elapsed().as_secs();
    let stats = state.engine.stats();

    Json(json!({
        "status": "healthy",
        "uptime_secs": uptime,
        "snapshot_version": stats.snapshot_version,
        "snapshot_healthy": stats.snapshot_healthy,
        "version": env!("CARGO_PKG_VERSION")
    }))
}
