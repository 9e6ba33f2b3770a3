pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use gatewarden_engine::AdmissionEngine;
use tower_http::cors::{Any, CorsLayer};

use crate::state::SharedState;

pub use state::{AdminState, GatewayMetrics, SharedState as SharedStateType};

/// Build the Axum router with all admin API routes and middleware.
pub fn build_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/api/health", get(routes::health::health_check))
        // Prometheus metrics
        .route("/api/metrics", get(routes::metrics::get_metrics))
        // Configuration management
        .route("/api/config", get(routes::config::get_config))
        .route("/api/config/reload", post(routes::config::reload))
        .route("/api/config/history", get(routes::config::get_history))
        .route("/api/config/rollback", post(routes::config::rollback))
        .route("/api/config/validate", post(routes::config::validate))
        // Live statistics
        .route("/api/stats", get(routes::stats::get_stats))
        // Attach shared state and middleware
        .with_state(state)
        .layer(cors)
}

/// Start the admin API server on the specified address.
///
/// This function will block until the server is shut down.
pub async fn run_admin_server(state: SharedState, listen_addr: &str) -> anyhow::Result<()> {
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!("admin API server listening on {}", listen_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Convenience function to create a SharedState from an engine handle.
pub fn new_shared_state(engine: Arc<AdmissionEngine>) -> SharedState {
    Arc::new(AdminState::new(engine))
}
