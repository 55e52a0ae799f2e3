use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use malblock_common::default_metrics_namespace;
use prometheus::Encoder;

use crate::state::SharedState;

const TEXT_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// GET /api/metrics
///
/// Gate counters followed by the current reputation aggregate, both in the
/// Prometheus text exposition format.
pub async fn get_metrics(State(state): State<SharedState>) -> impl IntoResponse {
    match encode(&state) {
        Ok(body) => (StatusCode::OK, [("content-type", TEXT_CONTENT_TYPE)], body),
        Err(e) => {
            tracing::error!("failed to encode prometheus metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain; charset=utf-8")],
                format!("failed to encode metrics: {}", e),
            )
        }
    }
}

fn encode(state: &SharedState) -> prometheus::Result<String> {
    let mut buffer = Vec::new();
    prometheus::TextEncoder::new().encode(&state.metrics.registry.gather(), &mut buffer)?;
    let mut body =
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))?;

    let namespace = state
        .config
        .pushgateway
        .as_ref()
        .map(|p| p.namespace.clone())
        .unwrap_or_else(default_metrics_namespace);
    body.push_str(&malblock_maintenance::render(&state.store.snapshot(), &namespace)?);

    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_state;
    use malblock_common::Category;

    #[test]
    fn test_metrics_include_gate_and_reputation_families() {
        let state = test_state();
        state.metrics.requests_total.inc();
        state.store.observe("203.0.113.9", Category::Crawler).unwrap();

        let body = encode(&state).unwrap();
        assert!(body.contains("malblock_gate_requests_total 1"));
        assert!(body.contains("malblock_blocked_ips 0"));
        assert!(body.contains("malblock_malicious_requests{type=\"crawler\"} 1"));
    }
}
