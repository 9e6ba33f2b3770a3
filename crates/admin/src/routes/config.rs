use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use gatewarden_common::Policy;
use gatewarden_store::{ReloadOutcome, RollbackOutcome};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::state::SharedState;

/// GET /api/config
///
/// Returns the currently effective policy snapshot.
pub async fn get_config(State(state): State<SharedState>) -> Json<Value> {
    let snapshot = state.engine.store().current();
    Json(json!({
        "version": snapshot.version,
        "applied_at": snapshot.applied_at.to_rfc3339(),
        "healthy": snapshot.healthy,
        "policies": snapshot.policies
    }))
}

/// POST /api/config/reload
///
/// Triggers a manual reload from the policy source. A reload that races an
/// in-flight one returns the in-flight outcome.
pub async fn reload(State(state): State<SharedState>) -> impl IntoResponse {
    // The store blocks on file I/O and validation; keep it off the
    // async workers.
    let store = state.engine.store().clone();
    let outcome = tokio::task::spawn_blocking(move || store.reload())
        .await
        .expect("reload task panicked");

    match outcome {
        ReloadOutcome::Applied { version } => {
            state.metrics.reloads_total.with_label_values(&["applied"]).inc();
            tracing::info!(version, "manual reload applied");
            (
                StatusCode::OK,
                Json(json!({ "status": "applied", "version": version })),
            )
        }
        ReloadOutcome::Unchanged => {
            state.metrics.reloads_total.with_label_values(&["unchanged"]).inc();
            (StatusCode::OK, Json(json!({ "status": "unchanged" })))
        }
        ReloadOutcome::Rejected { errors } => {
            state.metrics.reloads_total.with_label_values(&["rejected"]).inc();
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "status": "rejected", "errors": errors })),
            )
        }
        ReloadOutcome::Failed { error } => {
            state.metrics.reloads_total.with_label_values(&["failed"]).inc();
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "failed", "error": error })),
            )
        }
    }
}

/// GET /api/config/history
///
/// Returns the bounded snapshot history, oldest first.
pub async fn get_history(State(state): State<SharedState>) -> Json<Value> {
    let current = state.engine.store().current();
    let entries: Vec<Value> = state
        .engine
        .store()
        .history()
        .iter()
        .map(|snapshot| {
            json!({
                "version": snapshot.version,
                "applied_at": snapshot.applied_at.to_rfc3339(),
                "policy_count": snapshot.policies.len()
            })
        })
        .collect();

    Json(json!({
        "current_version": current.version,
        "history": entries
    }))
}

/// Request body for a rollback. Omitting `version` targets the most
/// recent history entry.
#[derive(Debug, Default, Deserialize)]
pub struct RollbackRequest {
    pub version: Option<u64>,
}

/// POST /api/config/rollback
///
/// Re-validates a historical snapshot and, if still valid, makes it
/// current under a new version number.
pub async fn rollback(
    State(state): State<SharedState>,
    body: Option<Json<RollbackRequest>>,
) -> impl IntoResponse {
    let wanted = body.map(|Json(req)| req.version).unwrap_or(None);

    let store = state.engine.store().clone();
    let outcome = tokio::task::spawn_blocking(move || store.rollback(wanted))
        .await
        .expect("rollback task panicked");

    match outcome {
        RollbackOutcome::Applied {
            version,
            restored_from,
        } => {
            state.metrics.rollbacks_total.with_label_values(&["applied"]).inc();
            tracing::info!(version, restored_from, "manual rollback applied");
            (
                StatusCode::OK,
                Json(json!({
                    "status": "applied",
                    "version": version,
                    "restored_from": restored_from
                })),
            )
        }
        RollbackOutcome::Rejected { reason } => {
            state.metrics.rollbacks_total.with_label_values(&["rejected"]).inc();
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "status": "rejected", "reason": reason })),
            )
        }
    }
}

/// POST /api/config/validate
///
/// Runs the store's validator against a candidate policy set without
/// applying it.
pub async fn validate(
    State(state): State<SharedState>,
    Json(candidate): Json<Vec<Policy>>,
) -> Json<Value> {
    match state.engine.store().validate_candidate(&candidate) {
        Ok(()) => Json(json!({ "valid": true, "policy_count": candidate.len() })),
        Err(errors) => Json(json!({ "valid": false, "errors": errors })),
    }
}
