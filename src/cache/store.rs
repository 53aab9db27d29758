//! Per-policy store of in-flight and completed computations
//!
//! Backed by a `moka` cache. The store adds the entry contract the
//! interceptor relies on:
//! - an entry is installed before its computation finishes, so racing callers
//!   attach to it instead of starting their own
//! - pending entries never expire; the TTL starts when the computation succeeds
//! - a failed entry is removed before its waiters are woken

use crate::cache::{
    config::CachePolicy,
    entry::{CacheEntry, EntryState, ErasedValue, Outcome},
    key::CacheKey,
    types::Stage,
};
use crate::error::{CacheError, ProducerFailure};
use futures::future::BoxFuture;
use futures::FutureExt;
use moka::future::Cache;
use moka::ops::compute::Op;
use moka::Expiry;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Loader handed to [`CacheStore::get_or_compute`]
pub(crate) type Loader =
    Box<dyn FnOnce() -> BoxFuture<'static, Result<ErasedValue, ProducerFailure>> + Send>;

/// Result of one get-or-compute call
pub(crate) struct Lookup {
    /// True when this call started the computation
    pub(crate) computed: bool,
    pub(crate) outcome: Outcome,
}

/// Bounded, time-expiring store for one cache policy
pub struct CacheStore {
    policy: CachePolicy,
    entries: Cache<CacheKey, CacheEntry>,
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("policy", &self.policy)
            .field("entry_count", &self.entries.entry_count())
            .finish()
    }
}

/// Expiry that only starts counting once an entry has completed
struct CompletionExpiry {
    ttl: Duration,
}

impl CompletionExpiry {
    fn expiry_for(&self, entry: &CacheEntry) -> Option<Duration> {
        if entry.is_pending() {
            None
        } else {
            Some(self.ttl)
        }
    }
}

impl Expiry<CacheKey, CacheEntry> for CompletionExpiry {
    fn expire_after_create(
        &self,
        _key: &CacheKey,
        value: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        self.expiry_for(value)
    }

    fn expire_after_update(
        &self,
        _key: &CacheKey,
        value: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        self.expiry_for(value)
    }
}

impl CacheStore {
    /// Create a store bounded by `policy`
    pub fn new(policy: CachePolicy) -> Self {
        info!(
            "Creating cache store {} (max_entries: {}, ttl: {}s)",
            policy.fingerprint(),
            policy.max_entries,
            policy.ttl_seconds
        );

        let entries = Cache::builder()
            .name(&policy.name)
            .max_capacity(policy.max_entries)
            .expire_after(CompletionExpiry { ttl: policy.ttl() })
            .build();

        Self { policy, entries }
    }

    /// The policy this store was built from
    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// Approximate number of entries, pending ones included
    pub fn entry_count(&self) -> u64 {
        self.entries.entry_count()
    }

    /// Check if a key currently has an entry
    pub fn contains_key(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Lifecycle state of the entry under `key`, if one is stored
    pub async fn state(&self, key: &CacheKey) -> Option<EntryState> {
        self.entries.get(key).await.map(|entry| entry.state)
    }

    /// Apply pending evictions and expirations
    pub async fn run_pending_tasks(&self) {
        self.entries.run_pending_tasks().await;
    }

    /// Attach to the entry for `key`, starting `loader` if there is none.
    ///
    /// The loader runs on its own task: dropping the returned future does not
    /// cancel it, and every caller attached to the entry sees its outcome.
    pub(crate) async fn get_or_compute(&self, key: CacheKey, stage: Stage, loader: Loader) -> Lookup {
        let id = Uuid::new_v4();
        let (inserted_tx, inserted_rx) = oneshot::channel();

        let entries = self.entries.clone();
        let task_key = key.clone();
        let entry = self
            .entries
            .entry(key.clone())
            .or_insert_with(async move { start(entries, task_key, id, stage, loader, inserted_rx) })
            .await;

        let computed = entry.is_fresh();
        let entry = entry.into_value();
        if computed {
            let _ = inserted_tx.send(());
            debug!("Cache miss, computing: {}", key);
        } else {
            debug!(
                "Cache hit ({}): {}",
                if entry.is_pending() { "in flight" } else { "completed" },
                key
            );
        }

        Lookup {
            computed,
            outcome: entry.outcome.await,
        }
    }
}

/// Spawn the computation and build the entry that represents it
fn start(
    entries: Cache<CacheKey, CacheEntry>,
    key: CacheKey,
    id: Uuid,
    stage: Stage,
    loader: Loader,
    inserted: oneshot::Receiver<()>,
) -> CacheEntry {
    let task = tokio::spawn(async move {
        let produced = AssertUnwindSafe(async move { loader().await })
            .catch_unwind()
            .await
            .unwrap_or_else(|_| {
                Err(ProducerFailure::new(anyhow::anyhow!(
                    "producer panicked while computing {}",
                    key
                )))
            });
        let outcome = produced.map_err(|cause| CacheError::computation(stage, cause));

        // The entry must be in the map before it can be settled
        let _ = inserted.await;
        settle(&entries, key, id, &outcome).await;
        outcome
    });

    let outcome = async move {
        task.await.unwrap_or_else(|join_error| {
            Err(CacheError::computation(
                stage,
                ProducerFailure::new(anyhow::anyhow!("producer task aborted: {join_error}")),
            ))
        })
    }
    .boxed()
    .shared();

    CacheEntry::pending(id, stage, outcome)
}

/// Start the TTL of a successful entry, or drop a failed one
async fn settle(entries: &Cache<CacheKey, CacheEntry>, key: CacheKey, id: Uuid, outcome: &Outcome) {
    let succeeded = outcome.is_ok();
    if let Err(error) = outcome {
        warn!("Cached computation failed, evicting {}: {}", key, error);
    }

    let _ = entries
        .entry(key)
        .and_compute_with(|current| {
            let op = match current {
                Some(current) if current.value().id == id => {
                    let entry = current.into_value();
                    debug!(
                        "Settling {} entry {} after {:?}",
                        entry.stage,
                        entry.id,
                        entry.age()
                    );
                    if succeeded {
                        Op::Put(entry.completed())
                    } else {
                        Op::Remove
                    }
                }
                // Evicted meanwhile, or replaced by a newer computation
                _ => Op::Nop,
            };
            std::future::ready(op)
        })
        .await;
}
