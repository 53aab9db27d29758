//! Single-flight get-or-compute engine
//!
//! Call sites hand the interceptor an operation, its arguments and a producer.
//! The interceptor either serves the call from the operation's store, attaching
//! to an in-flight or completed computation, or runs the producer directly when
//! no store is available for the operation.

use crate::cache::{
    config::CacheSettings,
    entry::ErasedValue,
    key::{CallArgs, KeyGenerator},
    registry::{CacheRegistry, CachedOperation},
    replay::Replay,
    store::{CacheStore, Loader},
    types::{CacheStats, ResultShape, Stage, StatsRecorder},
};
use crate::error::{CacheError, ProducerFailure, Result};
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{FutureExt, Stream, StreamExt, TryStreamExt};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

type SingleFactory<V> = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<V>> + Send>;
type MultiFactory<V> = Box<dyn FnOnce() -> BoxStream<'static, anyhow::Result<V>> + Send>;

/// Deferred computation behind a call.
///
/// The variant tells the interceptor which result shape the producer yields
/// without running it.
pub enum Producer<V> {
    /// Yields one eventual value
    Single(SingleFactory<V>),

    /// Yields an ordered, finite sequence of values
    Multi(MultiFactory<V>),
}

impl<V: Send + 'static> Producer<V> {
    /// Wrap a closure returning a future of one value
    pub fn single<F, Fut, E>(f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
        E: Into<anyhow::Error> + 'static,
    {
        Producer::Single(Box::new(move || {
            f().map(|r| r.map_err(Into::<anyhow::Error>::into)).boxed()
        }))
    }

    /// Wrap a closure returning a stream of values
    pub fn multi<F, S, E>(f: F) -> Self
    where
        F: FnOnce() -> S + Send + 'static,
        S: Stream<Item = std::result::Result<V, E>> + Send + 'static,
        E: Into<anyhow::Error> + 'static,
    {
        Producer::Multi(Box::new(move || {
            f().map_err(Into::<anyhow::Error>::into).boxed()
        }))
    }
}

impl<V> Producer<V> {
    pub fn shape(&self) -> ResultShape {
        match self {
            Producer::Single(_) => ResultShape::Single,
            Producer::Multi(_) => ResultShape::Multi,
        }
    }
}

/// Result of an intercepted call
#[derive(Debug)]
pub enum Produced<V> {
    Single(V),
    Multi(Replay<V>),
}

impl<V> Produced<V> {
    pub fn shape(&self) -> ResultShape {
        match self {
            Produced::Single(_) => ResultShape::Single,
            Produced::Multi(_) => ResultShape::Multi,
        }
    }

    pub fn into_single(self) -> Option<V> {
        match self {
            Produced::Single(value) => Some(value),
            Produced::Multi(_) => None,
        }
    }

    pub fn into_multi(self) -> Option<Replay<V>> {
        match self {
            Produced::Multi(replay) => Some(replay),
            Produced::Single(_) => None,
        }
    }
}

/// Caching front door for every cached operation of a host application
pub struct CacheInterceptor {
    registry: Arc<CacheRegistry>,
    settings: CacheSettings,
    keys: KeyGenerator,
    stats: StatsRecorder,
}

impl CacheInterceptor {
    /// Create an interceptor with default settings
    pub fn new(registry: Arc<CacheRegistry>) -> Self {
        Self::with_settings(registry, CacheSettings::default())
    }

    pub fn with_settings(registry: Arc<CacheRegistry>, settings: CacheSettings) -> Self {
        debug!("Creating cache interceptor with settings: {:?}", settings);
        Self {
            registry,
            settings,
            keys: KeyGenerator,
            stats: StatsRecorder::default(),
        }
    }

    pub fn registry(&self) -> &Arc<CacheRegistry> {
        &self.registry
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    /// Snapshot of the interceptor's counters
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    /// Serve one call of `operation`.
    ///
    /// For a given key the producer runs at most once per TTL window; callers
    /// arriving while it runs, or after it completed, share its outcome. A
    /// failed computation is delivered to its current waiters and forgotten.
    pub async fn intercept<V>(
        &self,
        operation: &CachedOperation,
        args: &CallArgs,
        producer: Producer<V>,
    ) -> Result<Produced<V>>
    where
        V: Clone + Send + Sync + 'static,
    {
        if producer.shape() != operation.shape {
            self.stats.configuration_error();
            warn!(
                "Operation {} declares a {} result but its producer yields {}",
                operation.id,
                operation.shape,
                producer.shape()
            );
            return Err(CacheError::Configuration(format!(
                "operation `{}` declares a {} result but its producer yields {}",
                operation.id,
                operation.shape,
                producer.shape()
            )));
        }

        let Some(store) = self.resolve(operation).await else {
            self.stats.bypass();
            return run_uncached(producer).await;
        };

        let key = self.keys.generate(&operation.id, args);
        let stage = Stage::from(operation.shape);
        let lookup = store.get_or_compute(key, stage, loader(producer)).await;

        if lookup.computed {
            self.stats.miss();
            if lookup.outcome.is_err() {
                self.stats.failure();
            }
        } else {
            self.stats.hit();
        }

        let value = lookup.outcome?;
        self.materialize(operation, value)
    }

    /// Serve one call of a single-value operation
    pub async fn single<V, F, Fut, E>(
        &self,
        operation: &CachedOperation,
        args: &CallArgs,
        f: F,
    ) -> Result<V>
    where
        V: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
        E: Into<anyhow::Error> + 'static,
    {
        self.intercept(operation, args, Producer::single(f))
            .await?
            .into_single()
            .ok_or_else(|| unexpected_shape(operation, ResultShape::Multi))
    }

    /// Serve one call of a multi-value operation
    pub async fn multi<V, F, S, E>(
        &self,
        operation: &CachedOperation,
        args: &CallArgs,
        f: F,
    ) -> Result<Replay<V>>
    where
        V: Clone + Send + Sync + 'static,
        F: FnOnce() -> S + Send + 'static,
        S: Stream<Item = std::result::Result<V, E>> + Send + 'static,
        E: Into<anyhow::Error> + 'static,
    {
        self.intercept(operation, args, Producer::multi(f))
            .await?
            .into_multi()
            .ok_or_else(|| unexpected_shape(operation, ResultShape::Single))
    }

    /// Find the store serving `operation`, or `None` to bypass caching
    async fn resolve(&self, operation: &CachedOperation) -> Option<Arc<CacheStore>> {
        if !self.settings.enabled {
            debug!("Caching disabled, calling {} directly", operation.id);
            return None;
        }

        let fingerprint = operation.policy.fingerprint();
        if let Some(store) = self.registry.get(&fingerprint).await {
            return Some(store);
        }

        if self.settings.auto_register {
            return match self.registry.register(operation).await {
                Ok(store) => Some(store),
                Err(error) => {
                    warn!("Cannot cache {}, calling it directly: {}", operation.id, error);
                    None
                }
            };
        }

        debug!(
            "No cache registered for {} ({}), calling it directly",
            operation.id, fingerprint
        );
        None
    }

    fn materialize<V>(&self, operation: &CachedOperation, value: ErasedValue) -> Result<Produced<V>>
    where
        V: Clone + Send + Sync + 'static,
    {
        let produced = match operation.shape {
            ResultShape::Single => value
                .downcast::<V>()
                .ok()
                .map(|value| Produced::Single(V::clone(&value))),
            ResultShape::Multi => value
                .downcast::<Vec<V>>()
                .ok()
                .map(|items| Produced::Multi(Replay::new(items))),
        };

        produced.ok_or_else(|| {
            self.stats.configuration_error();
            warn!(
                "Cached value of {} is not a {} of {}",
                operation.id,
                operation.shape,
                std::any::type_name::<V>()
            );
            CacheError::Configuration(format!(
                "cached value of `{}` is not a {} of {}",
                operation.id,
                operation.shape,
                std::any::type_name::<V>()
            ))
        })
    }
}

/// Turn a producer into a store loader that buffers its whole result
fn loader<V>(producer: Producer<V>) -> Loader
where
    V: Send + Sync + 'static,
{
    match producer {
        Producer::Single(f) => Box::new(move || {
            async move {
                let value = f().await.map_err(ProducerFailure::new)?;
                Ok::<_, ProducerFailure>(Arc::new(value) as ErasedValue)
            }
            .boxed()
        }),
        Producer::Multi(f) => Box::new(move || {
            async move {
                let items: Vec<V> = f().try_collect().await.map_err(ProducerFailure::new)?;
                Ok::<_, ProducerFailure>(Arc::new(items) as ErasedValue)
            }
            .boxed()
        }),
    }
}

/// Run a producer with no caching, surfacing its outcome as is
async fn run_uncached<V>(producer: Producer<V>) -> Result<Produced<V>> {
    let produced = match producer {
        Producer::Single(f) => f().await.map(Produced::Single),
        Producer::Multi(f) => f()
            .try_collect::<Vec<V>>()
            .await
            .map(|items| Produced::Multi(Replay::new(Arc::new(items)))),
    };
    produced.map_err(|error| CacheError::Producer(ProducerFailure::new(error)))
}

fn unexpected_shape(operation: &CachedOperation, found: ResultShape) -> CacheError {
    CacheError::Configuration(format!(
        "operation `{}` declares a {} result but produced {}",
        operation.id, operation.shape, found
    ))
}
