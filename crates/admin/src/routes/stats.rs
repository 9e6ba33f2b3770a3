use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::state::SharedState;

/// GET /api/stats
///
/// Returns live admission statistics: active clients, per-span occupancy,
/// and the admitted/rejected counters.
pub async fn get_stats(State(state): State<SharedState>) -> Json<Value> {
    let uptime_secs = state.start_time.elapsed().as_secs();
    let stats = state.engine.stats();

    let occupancy: Value = stats
        .span_occupancy
        .iter()
        .map(|(span, events)| (span.as_str().to_string(), json!(events)))
        .collect::<serde_json::Map<String, Value>>()
        .into();

    Json(json!({
        "uptime_secs": uptime_secs,
        "active_clients": stats.active_clients,
        "snapshot_version": stats.snapshot_version,
        "policy_count": stats.policy_count,
        "span_occupancy": occupancy,
        "requests_total": state.metrics.requests_total.get(),
        "requests_admitted": state.metrics.requests_admitted.get(),
        "requests_rejected": state.metrics.requests_rejected.get()
    }))
}
