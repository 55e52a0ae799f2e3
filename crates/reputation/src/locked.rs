use malblock_common::Category;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::Instant;

use crate::policy::BlockPolicy;
use crate::record::ReputationRecord;
use crate::Snapshot;

/// All records behind a single readers-writer lock.
///
/// Every mutation is totally ordered, which keeps per-identity updates
/// trivially linearizable. Throughput is bounded by contention on the one
/// lock when many distinct identities are active at once.
pub struct LockedStore {
    records: RwLock<HashMap<String, ReputationRecord>>,
}

impl LockedStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    pub fn observe(
        &self,
        policy: &BlockPolicy,
        identity: &str,
        category: Category,
        now: Instant,
    ) -> ReputationRecord {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);

        let record = records
            .entry(identity.to_string())
            .and_modify(|rec| rec.record(category, now))
            .or_insert_with(|| ReputationRecord::new(category, now));
        record.blocked = policy.should_block(record, now);

        record.clone()
    }

    pub fn evict(&self, policy: &BlockPolicy, now: Instant) -> usize {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let before = records.len();
        records.retain(|_, rec| !policy.is_stale(rec, now));
        before - records.len()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn get(&self, identity: &str) -> Option<ReputationRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(identity)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for LockedStore {
    fn default() -> Self {
        Self::new()
    }
}
