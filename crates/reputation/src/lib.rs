//! Per-identity reputation tracking and the blocking decision.
//!
//! [`ReputationStore`] counts classified requests per source identity and
//! recomputes the block verdict of that identity on every observation. Two
//! storage backends sit behind the same facade:
//!
//! - **Locked** -- one readers-writer lock over all records. Simple total
//!   ordering of every mutation; the default.
//!
//! - **Sharded** -- a [`DashMap`](dashmap::DashMap) sharded by identity hash,
//!   for deployments where lock contention across many identities matters.
//!
//! Both give the same per-identity guarantee: concurrent observations of one
//! identity never lose an update. Records are only ever removed by
//! [`ReputationStore::evict`].

pub mod locked;
pub mod policy;
pub mod record;
pub mod sharded;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use malblock_common::{
    BlockingConfig, Category, MalblockError, MalblockResult, StoreBackend, StoreConfig,
};

pub use locked::LockedStore;
pub use policy::BlockPolicy;
pub use record::ReputationRecord;
pub use sharded::ShardedStore;

/// Point-in-time copy of all records, keyed by identity.
pub type Snapshot = HashMap<String, ReputationRecord>;

/// Concurrent reputation store.
///
/// Cheaply cloneable (backed by `Arc`); all clones share the same records.
#[derive(Clone)]
pub struct ReputationStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    policy: BlockPolicy,
    backend: Backend,
}

enum Backend {
    Locked(LockedStore),
    Sharded(ShardedStore),
}

impl ReputationStore {
    /// Create a store guarded by a single readers-writer lock.
    pub fn new(policy: BlockPolicy) -> Self {
        Self::with_backend(policy, StoreBackend::Locked)
    }

    /// Create a store sharded by identity hash.
    pub fn sharded(policy: BlockPolicy) -> Self {
        Self::with_backend(policy, StoreBackend::Sharded)
    }

    pub fn with_backend(policy: BlockPolicy, backend: StoreBackend) -> Self {
        tracing::info!(
            ?backend,
            reset_after_secs = policy.reset_after.as_secs(),
            min_time_secs = policy.min_time.as_secs(),
            "creating reputation store"
        );
        let backend = match backend {
            StoreBackend::Locked => Backend::Locked(LockedStore::new()),
            StoreBackend::Sharded => Backend::Sharded(ShardedStore::new()),
        };
        Self {
            inner: Arc::new(StoreInner { policy, backend }),
        }
    }

    pub fn from_config(blocking: &BlockingConfig, store: &StoreConfig) -> Self {
        Self::with_backend(BlockPolicy::from_config(blocking), store.backend)
    }

    pub fn policy(&self) -> &BlockPolicy {
        &self.inner.policy
    }

    /// Count one request of `category` for `identity` and return the updated
    /// record, including its freshly computed verdict.
    ///
    /// Returns [`MalblockError::UnknownCategory`] for [`Category::Unknown`];
    /// callers are expected to filter those out beforehand.
    pub fn observe(&self, identity: &str, category: Category) -> MalblockResult<ReputationRecord> {
        self.observe_at(identity, category, Instant::now())
    }

    /// Same as [`observe`](Self::observe) with an explicit clock reading.
    pub fn observe_at(
        &self,
        identity: &str,
        category: Category,
        now: Instant,
    ) -> MalblockResult<ReputationRecord> {
        if !category.is_malicious() {
            return Err(MalblockError::UnknownCategory);
        }

        let policy = &self.inner.policy;
        let record = match &self.inner.backend {
            Backend::Locked(store) => store.observe(policy, identity, category, now),
            Backend::Sharded(store) => store.observe(policy, identity, category, now),
        };
        Ok(record)
    }

    /// Remove every record idle for longer than `reset_after`, blocked or not.
    ///
    /// Returns the number of records removed.
    pub fn evict(&self) -> usize {
        self.evict_at(Instant::now())
    }

    pub fn evict_at(&self, now: Instant) -> usize {
        let policy = &self.inner.policy;
        let removed = match &self.inner.backend {
            Backend::Locked(store) => store.evict(policy, now),
            Backend::Sharded(store) => store.evict(policy, now),
        };
        tracing::debug!(removed, remaining = self.len(), "reputation eviction complete");
        removed
    }

    /// Clone all records. The store is not locked once this returns.
    pub fn snapshot(&self) -> Snapshot {
        match &self.inner.backend {
            Backend::Locked(store) => store.snapshot(),
            Backend::Sharded(store) => store.snapshot(),
        }
    }

    pub fn get(&self, identity: &str) -> Option<ReputationRecord> {
        match &self.inner.backend {
            Backend::Locked(store) => store.get(identity),
            Backend::Sharded(store) => store.get(identity),
        }
    }

    /// Verdict for `identity` as of `now`, without counting a request.
    ///
    /// Unlike the stored `blocked` flag, this applies the reset check against
    /// the time of the read, so a block is forgiven as soon as the identity
    /// has been idle for longer than `reset_after`, even before eviction runs.
    pub fn verdict_at(&self, identity: &str, now: Instant) -> bool {
        self.get(identity)
            .is_some_and(|record| current_verdict(&self.inner.policy, &record, now))
    }

    pub fn is_blocked(&self, identity: &str) -> bool {
        self.verdict_at(identity, Instant::now())
    }

    pub fn len(&self) -> usize {
        match &self.inner.backend {
            Backend::Locked(store) => store.len(),
            Backend::Sharded(store) => store.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ReputationStore {
    fn default() -> Self {
        Self::new(BlockPolicy::default())
    }
}

/// Read-path verdict for a record: the stored flag, forgiven after inactivity.
pub fn current_verdict(policy: &BlockPolicy, record: &ReputationRecord, now: Instant) -> bool {
    record.blocked && policy.should_block(record, now)
}
