//! Registry of cache stores, one per policy fingerprint.
//!
//! The registry is an explicit object: the host creates it once and hands a
//! reference to every interceptor that should share its stores.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, info};

use super::config::{CachePolicy, PolicyFingerprint};
use super::key::OperationId;
use super::store::CacheStore;
use super::types::ResultShape;
use crate::error::Result;

/// An operation together with its cache policy and declared result shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedOperation {
    pub id: OperationId,
    pub policy: CachePolicy,
    pub shape: ResultShape,
}

impl CachedOperation {
    pub fn new(id: impl Into<OperationId>, policy: CachePolicy, shape: ResultShape) -> Self {
        Self {
            id: id.into(),
            policy,
            shape,
        }
    }

    /// An operation producing one value
    pub fn single(id: impl Into<OperationId>, policy: CachePolicy) -> Self {
        Self::new(id, policy, ResultShape::Single)
    }

    /// An operation producing an ordered sequence of values
    pub fn multi(id: impl Into<OperationId>, policy: CachePolicy) -> Self {
        Self::new(id, policy, ResultShape::Multi)
    }
}

type StoreSlot = Arc<OnceCell<Arc<CacheStore>>>;

/// Maps policy fingerprints to their stores.
///
/// Each fingerprint owns a slot that is initialized exactly once. The map lock
/// only guards slot lookup and insertion, so building one store never blocks
/// callers of another fingerprint.
#[derive(Default)]
pub struct CacheRegistry {
    stores: RwLock<HashMap<PolicyFingerprint, StoreSlot>>,
}

impl CacheRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the store for a fingerprint without creating it.
    pub async fn get(&self, fingerprint: &PolicyFingerprint) -> Option<Arc<CacheStore>> {
        let stores = self.stores.read().await;
        stores.get(fingerprint).and_then(|slot| slot.get().cloned())
    }

    /// Return the store for a fingerprint, building it with `factory` if absent.
    ///
    /// Racing callers for the same fingerprint all receive the store built by
    /// the single `factory` invocation that won.
    pub async fn get_or_create<F>(&self, fingerprint: &PolicyFingerprint, factory: F) -> Arc<CacheStore>
    where
        F: FnOnce() -> CacheStore,
    {
        let slot = self.slot(fingerprint).await;
        slot.get_or_init(|| async {
            debug!("Building store for {}", fingerprint);
            Arc::new(factory())
        })
        .await
        .clone()
    }

    /// Register an operation's policy, creating its store if needed.
    ///
    /// Idempotent per fingerprint.
    pub async fn register(&self, operation: &CachedOperation) -> Result<Arc<CacheStore>> {
        operation.policy.validate()?;

        let fingerprint = operation.policy.fingerprint();
        let policy = operation.policy.clone();
        let store = self
            .get_or_create(&fingerprint, move || CacheStore::new(policy))
            .await;

        info!(
            "Registered operation {} ({}) with cache {}",
            operation.id, operation.shape, fingerprint
        );
        Ok(store)
    }

    /// Number of fingerprints with a store
    pub async fn len(&self) -> usize {
        let stores = self.stores.read().await;
        stores.values().filter(|slot| slot.initialized()).count()
    }

    /// Check if no store has been created yet
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Fingerprints of all created stores, sorted
    pub async fn fingerprints(&self) -> Vec<PolicyFingerprint> {
        let stores = self.stores.read().await;
        let mut fingerprints: Vec<_> = stores
            .iter()
            .filter(|(_, slot)| slot.initialized())
            .map(|(fingerprint, _)| fingerprint.clone())
            .collect();
        fingerprints.sort();
        fingerprints
    }

    async fn slot(&self, fingerprint: &PolicyFingerprint) -> StoreSlot {
        if let Some(slot) = self.stores.read().await.get(fingerprint) {
            return slot.clone();
        }

        let mut stores = self.stores.write().await;
        stores
            .entry(fingerprint.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }
}
