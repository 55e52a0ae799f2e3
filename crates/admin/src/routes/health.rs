use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::state::SharedState;

/// GET /api/health
///
/// Returns the current health status, uptime and the number of tracked
/// identities.
pub async fn health_check(State(state): State<SharedState>) -> Json<Value> {
    let uptime = state.start_time.elapsed().as_secs();

    Json(json!({
        "status": "healthy",
        "uptime_secs": uptime,
        "tracked_identities": state.store.len(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}
