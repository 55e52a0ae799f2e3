pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use malblock_common::AppConfig;
use malblock_reputation::ReputationStore;
use tower_http::cors::{Any, CorsLayer};

use crate::state::SharedState;

pub use state::{AppState, GateMetrics, SharedState as SharedStateType};

#[cfg(test)]
pub(crate) mod test_support;

/// Build the Axum router with all admin API routes and middleware.
pub fn build_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(routes::health::health_check))
        .route("/api/metrics", get(routes::metrics::get_metrics))
        .route("/api/stats", get(routes::stats::get_stats))
        .route("/api/identities", get(routes::identities::list_identities))
        .route(
            "/api/identities/{identity}",
            get(routes::identities::get_identity),
        )
        .route("/api/config", get(routes::config::get_config))
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

/// Create the state shared by the gate and the admin API.
pub fn new_shared_state(config: AppConfig, store: ReputationStore) -> anyhow::Result<SharedState> {
    Ok(Arc::new(AppState::new(config, store)?))
}
