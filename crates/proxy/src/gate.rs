use http::StatusCode;
use malblock_classifier::{Classifier, RequestAttributes};
use malblock_common::Category;
use malblock_reputation::ReputationStore;
use tracing::{debug, error};

/// Status returned to rejected callers. Deliberately indistinguishable from
/// a missing route.
pub const BLOCKED_STATUS: StatusCode = StatusCode::NOT_FOUND;
pub const BLOCKED_HEADER: &str = "Request-Blocked";
pub const BLOCKED_HEADER_VALUE: &str = "1";
pub const BLOCKED_BODY: &str = "not found";

/// Decision for a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    Allow { category: Category },
    Reject { category: Category },
}

impl GateOutcome {
    pub fn category(&self) -> Category {
        match *self {
            GateOutcome::Allow { category } | GateOutcome::Reject { category } => category,
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, GateOutcome::Reject { .. })
    }
}

/// Classifies each request, records it against the caller's identity and
/// rejects callers whose record is blocked.
#[derive(Clone)]
pub struct RequestGate {
    classifier: std::sync::Arc<Classifier>,
    store: ReputationStore,
}

impl RequestGate {
    pub fn new(classifier: Classifier, store: ReputationStore) -> Self {
        Self {
            classifier: std::sync::Arc::new(classifier),
            store,
        }
    }

    pub fn evaluate(&self, request: &RequestAttributes) -> GateOutcome {
        let category = self.classifier.classify(request);
        if category == Category::Unknown {
            return GateOutcome::Allow { category };
        }

        match self.store.observe(&request.identity, category) {
            Ok(record) if record.blocked => {
                debug!(identity = %request.identity, %category, "identity is blocked");
                GateOutcome::Reject { category }
            }
            Ok(_) => GateOutcome::Allow { category },
            Err(e) => {
                error!(identity = %request.identity, %category, error = %e, "failed to record request");
                GateOutcome::Allow { category }
            }
        }
    }

    pub fn store(&self) -> &ReputationStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use malblock_classifier::signatures::SignatureTables;
    use malblock_common::PerCategory;
    use malblock_reputation::BlockPolicy;
    use std::time::Duration;

    fn gate(include_private_ips: bool) -> RequestGate {
        let policy = BlockPolicy {
            reset_after: Duration::from_secs(15 * 60),
            min_time: Duration::ZERO,
            min_requests: PerCategory::new(10, 50, 20),
            min_requests_per_minute: PerCategory::new(5.0, 60.0, 0.0),
        };
        RequestGate::new(
            Classifier::new(include_private_ips, SignatureTables::default()),
            ReputationStore::new(policy),
        )
    }

    fn auth_request(identity: &str) -> RequestAttributes {
        RequestAttributes::new(identity).with_header("Authorization", "Bearer abc")
    }

    #[test]
    fn test_private_identity_passes_untracked() {
        let gate = gate(false);
        for _ in 0..20 {
            let outcome = gate.evaluate(&auth_request("127.0.0.1"));
            assert_eq!(outcome, GateOutcome::Allow { category: Category::Unknown });
        }
        assert!(gate.store().is_empty());
    }

    #[test]
    fn test_private_identity_tracked_when_included() {
        let gate = gate(true);
        let outcome = gate.evaluate(&auth_request("127.0.0.1"));
        assert_eq!(outcome, GateOutcome::Allow { category: Category::AuthEnumeration });
        assert_eq!(gate.store().len(), 1);
    }

    #[test]
    fn test_tenth_auth_request_is_rejected() {
        let gate = gate(false);
        for i in 1..10 {
            let outcome = gate.evaluate(&auth_request("203.0.113.10"));
            assert!(!outcome.is_rejected(), "request {} rejected early", i);
        }
        let outcome = gate.evaluate(&auth_request("203.0.113.10"));
        assert_eq!(outcome, GateOutcome::Reject { category: Category::AuthEnumeration });

        // Other callers are unaffected.
        assert!(!gate.evaluate(&auth_request("203.0.113.11")).is_rejected());
    }

    #[test]
    fn test_missing_identity_passes() {
        let gate = gate(true);
        let outcome = gate.evaluate(&auth_request(""));
        assert_eq!(outcome.category(), Category::Unknown);
        assert!(gate.store().is_empty());
    }
}
