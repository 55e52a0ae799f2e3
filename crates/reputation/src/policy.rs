use malblock_common::{BlockingConfig, PerCategory};
use std::time::{Duration, Instant};

use crate::record::ReputationRecord;

/// Static thresholds deciding whether an identity is blocked.
///
/// Every threshold accepts zero, which disables its gate: a zero request
/// count is always reached and a zero rate is always met.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockPolicy {
    /// Inactivity after which a block is forgiven and the record is stale.
    pub reset_after: Duration,
    /// Minimum span between first and last observation.
    pub min_time: Duration,
    pub min_requests: PerCategory<u64>,
    pub min_requests_per_minute: PerCategory<f64>,
}

impl BlockPolicy {
    pub fn from_config(config: &BlockingConfig) -> Self {
        Self {
            reset_after: config.reset_after(),
            min_time: config.min_time(),
            min_requests: config.min_requests.to_table(),
            min_requests_per_minute: config.min_requests_per_minute.to_table(),
        }
    }

    /// Compute the block verdict for a record at time `now`.
    ///
    /// Checks, in order: reset after inactivity, observation window, volume,
    /// rate. Volume and rate are each satisfied by any category; they need
    /// not be satisfied by the same one.
    ///
    /// On the observe path `last_seen` has already been set to `now`, so the
    /// reset check only ever fires for a read at a later time.
    pub fn should_block(&self, record: &ReputationRecord, now: Instant) -> bool {
        if record.blocked && record.idle_for(now) > self.reset_after {
            return false;
        }

        let span = record.observed_span();
        if span < self.min_time {
            return false;
        }

        let volume_met = record
            .counts
            .iter()
            .any(|(category, count)| count >= self.min_requests.get(category));
        if !volume_met {
            return false;
        }

        let minutes = span.as_secs_f64() / 60.0;
        record.counts.iter().any(|(category, count)| {
            request_rate(count, minutes) >= self.min_requests_per_minute.get(category)
        })
    }

    /// Returns `true` once a record has been idle for longer than `reset_after`.
    pub fn is_stale(&self, record: &ReputationRecord, now: Instant) -> bool {
        record.idle_for(now) > self.reset_after
    }
}

impl Default for BlockPolicy {
    fn default() -> Self {
        Self::from_config(&BlockingConfig::default())
    }
}

/// Requests per minute. A zero-length window gives an infinite rate for any
/// non-zero count and a zero rate otherwise.
fn request_rate(count: u64, minutes: f64) -> f64 {
    if minutes > 0.0 {
        count as f64 / minutes
    } else if count > 0 {
        f64::INFINITY
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use malblock_common::Category;

    fn policy() -> BlockPolicy {
        BlockPolicy {
            reset_after: Duration::from_secs(15 * 60),
            min_time: Duration::from_secs(5),
            min_requests: PerCategory::new(5, 50, 20),
            min_requests_per_minute: PerCategory::new(0.0, 60.0, 0.0),
        }
    }

    fn record(counts: PerCategory<u64>, t0: Instant, span: Duration) -> ReputationRecord {
        ReputationRecord {
            counts,
            blocked: false,
            first_seen: t0,
            last_seen: t0 + span,
        }
    }

    #[test]
    fn test_request_rate() {
        assert_eq!(request_rate(30, 0.5), 60.0);
        assert_eq!(request_rate(3, 0.0), f64::INFINITY);
        assert_eq!(request_rate(0, 0.0), 0.0);
    }

    #[test]
    fn test_short_window_never_blocks() {
        let t0 = Instant::now();
        let rec = record(PerCategory::new(1_000, 1_000, 1_000), t0, Duration::from_secs(4));
        assert!(!policy().should_block(&rec, rec.last_seen));
    }

    #[test]
    fn test_below_volume_never_blocks() {
        let t0 = Instant::now();
        let rec = record(PerCategory::new(4, 49, 19), t0, Duration::from_secs(10));
        assert!(!policy().should_block(&rec, rec.last_seen));
    }

    #[test]
    fn test_volume_and_rate_may_come_from_different_categories() {
        let mut p = policy();
        p.min_requests_per_minute = PerCategory::new(1_000.0, 60.0, 1_000.0);
        let t0 = Instant::now();
        // Only auth meets its volume; only spam (40 over 10s = 240/min) meets its rate.
        let rec = record(PerCategory::new(5, 40, 0), t0, Duration::from_secs(10));
        assert!(p.should_block(&rec, rec.last_seen));
    }

    #[test]
    fn test_rate_gate() {
        let mut p = policy();
        p.min_requests = PerCategory::new(0, 50, 0);
        p.min_requests_per_minute = PerCategory::new(1_000.0, 60.0, 1_000.0);
        let t0 = Instant::now();

        // 50 spam requests over 2 minutes: 25/min, below 60.
        let slow = record(PerCategory::new(0, 50, 0), t0, Duration::from_secs(120));
        assert!(!p.should_block(&slow, slow.last_seen));

        // 60 spam requests over 1 minute: exactly 60/min.
        let fast = record(PerCategory::new(0, 60, 0), t0, Duration::from_secs(60));
        assert!(p.should_block(&fast, fast.last_seen));
    }

    #[test]
    fn test_zero_rate_threshold_is_always_met() {
        let t0 = Instant::now();
        let rec = record(PerCategory::new(5, 0, 0), t0, Duration::from_secs(3_600));
        assert!(policy().should_block(&rec, rec.last_seen));
    }

    #[test]
    fn test_zero_window_with_zero_min_time() {
        let mut p = policy();
        p.min_time = Duration::ZERO;
        p.min_requests = PerCategory::new(1, 50, 20);
        p.min_requests_per_minute = PerCategory::new(5.0, 60.0, 60.0);

        let t0 = Instant::now();
        let rec = ReputationRecord::new(Category::AuthEnumeration, t0);
        assert!(p.should_block(&rec, t0));
    }

    #[test]
    fn test_reset_check_on_stale_read() {
        let p = policy();
        let t0 = Instant::now();
        let mut rec = record(PerCategory::new(100, 0, 0), t0, Duration::from_secs(60));
        assert!(p.should_block(&rec, rec.last_seen));
        rec.blocked = true;

        let within = rec.last_seen + p.reset_after;
        assert!(p.should_block(&rec, within));

        let after = within + Duration::from_millis(1);
        assert!(!p.should_block(&rec, after));
    }

    #[test]
    fn test_is_stale() {
        let p = policy();
        let t0 = Instant::now();
        let rec = ReputationRecord::new(Category::Spam, t0);
        assert!(!p.is_stale(&rec, t0 + p.reset_after));
        assert!(p.is_stale(&rec, t0 + p.reset_after + Duration::from_secs(1)));
    }

    #[test]
    fn test_from_config_defaults() {
        let p = BlockPolicy::default();
        assert_eq!(p.reset_after, Duration::from_secs(900));
        assert_eq!(p.min_time, Duration::from_secs(5));
        assert_eq!(p.min_requests.get(Category::AuthEnumeration), 5);
        assert_eq!(p.min_requests_per_minute.get(Category::Spam), 60.0);
    }
}
