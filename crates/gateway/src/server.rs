use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderValue, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use gatewarden_admin::SharedStateType;
use gatewarden_engine::AdmissionEngine;
use serde_json::json;
use tracing::info;

use crate::identity::ClientDirectory;

/// Shared state for the data-plane server.
pub struct GatewayState {
    pub engine: Arc<AdmissionEngine>,
    pub directory: ClientDirectory,
    pub admin: SharedStateType,
}

/// Every inbound request funnels through here: identify the caller,
/// ask the engine, and answer with rate-limit headers either way.
async fn admit(
    State(state): State<Arc<GatewayState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    uri: Uri,
    headers: axum::http::HeaderMap,
) -> Response {
    let descriptor = state.directory.identify(uri.path(), &headers, peer.ip());
    let outcome = state.engine.admit(&descriptor);

    state.admin.metrics.requests_total.inc();

    let mut response = if outcome.admitted {
        state.admin.metrics.requests_admitted.inc();
        (
            StatusCode::OK,
            Json(json!({
                "message": "request admitted",
                "endpoint": descriptor.endpoint,
                "policy": outcome.policy_id
            })),
        )
            .into_response()
    } else {
        state.admin.metrics.requests_rejected.inc();
        let message = outcome
            .reason
            .clone()
            .unwrap_or_else(|| "rate limit exceeded".to_string());
        (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "error": {
                    "message": message,
                    "limiting_span": outcome.limiting_span.map(|span| span.as_str())
                }
            })),
        )
            .into_response()
    };

    let response_headers = response.headers_mut();
    response_headers.insert("x-ratelimit-limit", HeaderValue::from(outcome.limit));
    response_headers.insert("x-ratelimit-remaining", HeaderValue::from(outcome.remaining));
    response_headers.insert(
        "x-ratelimit-reset",
        HeaderValue::from(outcome.reset_at_unix_secs),
    );
    if let Some(retry_after) = outcome.retry_after_secs {
        response_headers.insert("retry-after", HeaderValue::from(retry_after));
    }

    response
}

pub fn build_router(state: Arc<GatewayState>) -> Router {
    Router::new().fallback(admit).with_state(state)
}

/// Start the data-plane server on the specified address.
pub async fn run_gateway_server(state: Arc<GatewayState>, listen_addr: &str) -> anyhow::Result<()> {
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    info!("gateway listening on {}", listen_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
