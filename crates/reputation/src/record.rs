use malblock_common::{Category, PerCategory};
use std::time::{Duration, Instant};

/// Per-identity reputation state.
///
/// Counts only ever grow for the lifetime of a record. A record is never
/// rewound: it is either mutated in place or evicted and recreated.
#[derive(Debug, Clone, PartialEq)]
pub struct ReputationRecord {
    pub counts: PerCategory<u64>,
    pub blocked: bool,
    pub first_seen: Instant,
    pub last_seen: Instant,
}

impl ReputationRecord {
    /// Create a record for the first observed request of an identity.
    pub fn new(category: Category, now: Instant) -> Self {
        let mut counts = PerCategory::default();
        if let Some(count) = counts.get_mut(category) {
            *count = 1;
        }
        Self {
            counts,
            blocked: false,
            first_seen: now,
            last_seen: now,
        }
    }

    /// Count one more request and advance `last_seen`.
    ///
    /// `last_seen` never moves backwards, so a clock reading older than the
    /// current value leaves it untouched.
    pub fn record(&mut self, category: Category, now: Instant) {
        if let Some(count) = self.counts.get_mut(category) {
            *count = count.saturating_add(1);
        }
        if now > self.last_seen {
            self.last_seen = now;
        }
    }

    /// Time between the first and the latest observation.
    pub fn observed_span(&self) -> Duration {
        self.last_seen.duration_since(self.first_seen)
    }

    /// Time since the latest observation.
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_seen)
    }

    pub fn total_requests(&self) -> u64 {
        self.counts.total()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record() {
        let now = Instant::now();
        let rec = ReputationRecord::new(Category::Crawler, now);
        assert_eq!(rec.counts.get(Category::Crawler), 1);
        assert_eq!(rec.total_requests(), 1);
        assert!(!rec.blocked);
        assert_eq!(rec.first_seen, rec.last_seen);
        assert_eq!(rec.observed_span(), Duration::ZERO);
    }

    #[test]
    fn test_record_advances_last_seen() {
        let t0 = Instant::now();
        let mut rec = ReputationRecord::new(Category::Spam, t0);
        rec.record(Category::Spam, t0 + Duration::from_secs(3));
        rec.record(Category::AuthEnumeration, t0 + Duration::from_secs(5));
        assert_eq!(rec.counts.get(Category::Spam), 2);
        assert_eq!(rec.counts.get(Category::AuthEnumeration), 1);
        assert_eq!(rec.observed_span(), Duration::from_secs(5));
        assert_eq!(rec.first_seen, t0);
    }

    #[test]
    fn test_last_seen_never_moves_backwards() {
        let t0 = Instant::now();
        let mut rec = ReputationRecord::new(Category::Spam, t0 + Duration::from_secs(10));
        rec.record(Category::Spam, t0);
        assert_eq!(rec.last_seen, t0 + Duration::from_secs(10));
        assert!(rec.last_seen >= rec.first_seen);
        assert_eq!(rec.counts.get(Category::Spam), 2);
    }

    #[test]
    fn test_idle_for() {
        let t0 = Instant::now();
        let rec = ReputationRecord::new(Category::Spam, t0 + Duration::from_secs(1));
        assert_eq!(rec.idle_for(t0), Duration::ZERO);
        assert_eq!(rec.idle_for(t0 + Duration::from_secs(4)), Duration::from_secs(3));
    }
}
