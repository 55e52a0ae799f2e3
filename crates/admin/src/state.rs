use std::sync::Arc;

use malblock_common::{AppConfig, Category};
use malblock_reputation::ReputationStore;
use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

/// Shared state type alias used across all route handlers.
pub type SharedState = Arc<AppState>;

/// State shared between the request gate and the admin API.
pub struct AppState {
    pub config: AppConfig,
    pub store: ReputationStore,
    pub metrics: GateMetrics,
    pub start_time: std::time::Instant,
}

/// Process-local counters maintained by the request gate.
///
/// These are served on `/api/metrics` next to the reputation aggregate and
/// are never pushed to the Pushgateway.
pub struct GateMetrics {
    pub registry: Registry,
    pub requests_total: IntCounter,
    pub requests_blocked: IntCounter,
    pub requests_classified: IntCounterVec,
}

impl GateMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let requests_total = IntCounter::with_opts(Opts::new(
            "malblock_gate_requests_total",
            "Total number of requests seen by the gate",
        ))?;
        let requests_blocked = IntCounter::with_opts(Opts::new(
            "malblock_gate_requests_blocked_total",
            "Total number of requests rejected because the identity is blocked",
        ))?;
        let requests_classified = IntCounterVec::new(
            Opts::new(
                "malblock_gate_requests_classified_total",
                "Requests by classifier verdict",
            ),
            &["category"],
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(requests_blocked.clone()))?;
        registry.register(Box::new(requests_classified.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            requests_blocked,
            requests_classified,
        })
    }

    pub fn record_classification(&self, category: Category) {
        self.requests_classified
            .with_label_values(&[category.as_label()])
            .inc();
    }
}

impl AppState {
    pub fn new(config: AppConfig, store: ReputationStore) -> prometheus::Result<Self> {
        Ok(Self {
            config,
            store,
            metrics: GateMetrics::new()?,
            start_time: std::time::Instant::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_counter_per_category() {
        let metrics = GateMetrics::new().unwrap();
        metrics.record_classification(Category::Spam);
        metrics.record_classification(Category::Spam);
        metrics.record_classification(Category::Unknown);

        let spam = metrics.requests_classified.with_label_values(&["spam"]).get();
        let unknown = metrics.requests_classified.with_label_values(&["unknown"]).get();
        assert_eq!(spam, 2);
        assert_eq!(unknown, 1);
    }
}
