use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use crate::state::SharedState;

/// GET /api/config
///
/// Returns the running configuration as JSON. The Pushgateway password is
/// never serialized.
pub async fn get_config(State(state): State<SharedState>) -> (StatusCode, Json<Value>) {
    match serde_json::to_value(&state.config) {
        Ok(value) => (StatusCode::OK, Json(value)),
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize configuration");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "serialization failed"})),
            )
        }
    }
}
