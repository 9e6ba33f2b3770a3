mod identity;
mod server;

use std::sync::Arc;

use anyhow::Result;
use gatewarden_common::AppConfig;
use gatewarden_engine::AdmissionEngine;
use gatewarden_rate_limit::RateLimiter;
use gatewarden_store::{ConfigStore, FilePolicySource, ReloadOutcome};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use crate::identity::ClientDirectory;
use crate::server::GatewayState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).json().init();

    // Parse command-line args for config path
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/gatewarden.yaml".to_string());

    info!(config_path = %config_path, "starting gatewarden");

    let config = AppConfig::load(&config_path)?;

    // Bring up the policy store and take the initial snapshot. A broken or
    // missing policy file is not fatal: the gateway serves the empty
    // snapshot and fail-safe tier defaults until a reload succeeds.
    let source = FilePolicySource::new(&config.policy_file);
    let store = Arc::new(ConfigStore::new(Box::new(source), config.store.max_versions));
    match store.reload() {
        ReloadOutcome::Applied { version } => {
            info!(version, "initial policy snapshot loaded");
        }
        ReloadOutcome::Unchanged => {}
        ReloadOutcome::Rejected { errors } => {
            warn!(
                problems = errors.len(),
                "initial policy set rejected; serving tier defaults only"
            );
        }
        ReloadOutcome::Failed { error } => {
            warn!(%error, "policy source unavailable; serving tier defaults only");
        }
    }

    let limiter = Arc::new(RateLimiter::new(&config.limiter));
    limiter.start_eviction_task();
    gatewarden_store::start_watch_task(Arc::clone(&store), &config.store.watch);

    let engine = Arc::new(AdmissionEngine::new(
        limiter,
        Arc::clone(&store),
        config.tiers.clone(),
    ));

    let admin_state = gatewarden_admin::new_shared_state(Arc::clone(&engine));
    let gateway_state = Arc::new(GatewayState {
        engine,
        directory: ClientDirectory::from_config(&config.clients),
        admin: Arc::clone(&admin_state),
    });

    let admin_listen = config.server.admin.listen.clone();
    let gateway_listen = config.server.listen.clone();

    let admin_task = tokio::spawn(async move {
        gatewarden_admin::run_admin_server(admin_state, &admin_listen).await
    });
    let gateway_task = tokio::spawn(async move {
        server::run_gateway_server(gateway_state, &gateway_listen).await
    });

    let (admin_result, gateway_result) = tokio::try_join!(admin_task, gateway_task)?;
    admin_result?;
    gateway_result?;

    Ok(())
}
