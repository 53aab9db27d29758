//! # Async Cacheable (async-cacheable)
//!
//! Declarative single-flight caching for asynchronous operations.
//!
//! ## Features
//!
//! - Single-flight: one computation per key, shared by every concurrent caller
//! - Single-value and multi-value (stream) operations
//! - Per-policy bounded stores with a TTL that starts on successful completion
//! - Failed computations are delivered to their waiters and then forgotten
//! - Fail-open: an operation without a registered cache is simply called
//! - Async-first design using tokio
//!
//! ## Single-Value Operations
//!
//! ```no_run
//! use async_cacheable::{CacheInterceptor, CachePolicy, CacheRegistry, CachedOperation, CallArgs};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let registry = Arc::new(CacheRegistry::new());
//!     let price = CachedOperation::single("prices.quote", CachePolicy::new("quotes", 500, 30));
//!     registry.register(&price).await?;
//!
//!     let interceptor = CacheInterceptor::new(registry);
//!     let quote = interceptor
//!         .single(&price, &CallArgs::new().arg("EUR").arg("USD"), || async {
//!             Ok::<_, anyhow::Error>(1.08_f64)
//!         })
//!         .await?;
//!     println!("Quote: {}", quote);
//!     Ok(())
//! }
//! ```
//!
//! ## Multi-Value Operations
//!
//! A multi-value producer is drained once; every caller receives an
//! independent [`Replay`] of the buffered sequence.
//!
//! ```no_run
//! use async_cacheable::{CacheInterceptor, CachePolicy, CacheRegistry, CachedOperation, CallArgs};
//! use futures::StreamExt;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let registry = Arc::new(CacheRegistry::new());
//!     let tags = CachedOperation::multi("tags.list", CachePolicy::default());
//!     registry.register(&tags).await?;
//!
//!     let interceptor = CacheInterceptor::new(registry);
//!     let mut replay = interceptor
//!         .multi(&tags, &CallArgs::new(), || {
//!             futures::stream::iter(vec![Ok::<_, anyhow::Error>("rust"), Ok("tokio")])
//!         })
//!         .await?;
//!
//!     while let Some(tag) = replay.next().await {
//!         println!("Tag: {}", tag);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! Interceptor-wide switches are read from the environment (and `.env`) by
//! [`CacheSettings::from_env`]:
//!
//! - `ASYNC_CACHE_ENABLED`: set to `false` to call every operation directly
//! - `ASYNC_CACHE_AUTO_REGISTER`: set to `true` to create missing stores on first use

pub mod cache;
pub mod error;

// Re-export main types for convenience
pub use cache::{
    generate_key, CacheInterceptor, CacheKey, CachePolicy, CacheRegistry, CacheSettings,
    CacheSettingsBuilder, CacheStats, CacheStore, CachedOperation, CallArgs, EntryState,
    KeyGenerator, OperationId, PolicyFingerprint, Produced, Producer, Replay, ResultShape, Stage,
};
pub use error::{CacheError, ProducerFailure, Result};
