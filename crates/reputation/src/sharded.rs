use dashmap::DashMap;
use malblock_common::Category;
use std::time::Instant;

use crate::policy::BlockPolicy;
use crate::record::ReputationRecord;
use crate::Snapshot;

/// Records sharded by identity hash.
///
/// Each observation holds only the shard lock of its identity, so distinct
/// identities rarely contend. Updates to one identity stay linearizable
/// through the entry API. A snapshot is consistent per record but not across
/// shards.
pub struct ShardedStore {
    records: DashMap<String, ReputationRecord>,
}

impl ShardedStore {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    pub fn observe(
        &self,
        policy: &BlockPolicy,
        identity: &str,
        category: Category,
        now: Instant,
    ) -> ReputationRecord {
        let mut entry = self
            .records
            .entry(identity.to_string())
            .and_modify(|rec| rec.record(category, now))
            .or_insert_with(|| ReputationRecord::new(category, now));

        let record = entry.value_mut();
        record.blocked = policy.should_block(record, now);

        record.clone()
    }

    pub fn evict(&self, policy: &BlockPolicy, now: Instant) -> usize {
        let mut removed = 0;
        self.records.retain(|_, rec| {
            let stale = policy.is_stale(rec, now);
            removed += usize::from(stale);
            !stale
        });
        removed
    }

    pub fn snapshot(&self) -> Snapshot {
        self.records
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn get(&self, identity: &str) -> Option<ReputationRecord> {
        self.records.get(identity).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

impl Default for ShardedStore {
    fn default() -> Self {
        Self::new()
    }
}
