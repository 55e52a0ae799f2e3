use axum::extract::State;
use axum::Json;
use serde_json::{json, Map, Value};

use crate::state::SharedState;

/// GET /api/stats
///
/// Gate throughput plus the reputation aggregate.
pub async fn get_stats(State(state): State<SharedState>) -> Json<Value> {
    let uptime_secs = state.start_time.elapsed().as_secs();
    let total_requests = state.metrics.requests_total.get();
    let blocked_requests = state.metrics.requests_blocked.get();

    let requests_per_second = if uptime_secs > 0 {
        total_requests as f64 / uptime_secs as f64
    } else {
        0.0
    };

    let totals = malblock_maintenance::aggregate(&state.store.snapshot());
    let mut malicious = Map::new();
    for (category, count) in totals.requests.iter() {
        malicious.insert(category.as_label().to_string(), json!(count));
    }

    Json(json!({
        "total_requests": total_requests,
        "blocked_requests": blocked_requests,
        "uptime_secs": uptime_secs,
        "requests_per_second": requests_per_second,
        "tracked_identities": totals.identities,
        "blocked_identities": totals.blocked_identities,
        "malicious_requests": malicious
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_state;
    use malblock_common::Category;

    #[tokio::test]
    async fn test_stats_aggregate_store() {
        let state = test_state();
        state.metrics.requests_total.inc_by(3);
        state.metrics.requests_blocked.inc();
        state.store.observe("203.0.113.1", Category::Spam).unwrap();
        state.store.observe("203.0.113.1", Category::Spam).unwrap();
        state.store.observe("203.0.113.2", Category::AuthEnumeration).unwrap();

        let Json(body) = get_stats(State(state)).await;
        assert_eq!(body["total_requests"], 3);
        assert_eq!(body["blocked_requests"], 1);
        assert_eq!(body["tracked_identities"], 2);
        assert_eq!(body["malicious_requests"]["spam"], 2);
        assert_eq!(body["malicious_requests"]["auth_enumeration"], 1);
        assert_eq!(body["malicious_requests"]["crawler"], 0);
    }
}
