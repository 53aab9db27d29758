//! # Single-Flight Async Caching Layer
//!
//! Caches the results of asynchronous operations keyed by operation identity
//! and call arguments.
//!
//! ## Features
//!
//! - **Single-Flight**: concurrent callers with the same key share one computation
//! - **TTL-Based Expiration**: the time-to-live starts when a computation succeeds
//! - **Failure Non-Retention**: failed computations are never served to later callers
//! - **Multi-Value Replay**: sequence results are buffered and replayed per consumer
//! - **Fail-Open**: operations without a registered cache are called directly
//!
//! ## Architecture
//!
//! - [`CacheRegistry`]: one [`CacheStore`] per policy fingerprint
//! - [`CacheStore`]: bounded `moka` cache of in-flight and completed entries
//! - [`CacheInterceptor`]: resolves the store, builds the key and serves the call
//!
//! ## Example
//!
//! ```rust,no_run
//! use async_cacheable::cache::{CacheInterceptor, CachePolicy, CacheRegistry, CachedOperation, CallArgs};
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let registry = Arc::new(CacheRegistry::new());
//! let find_user = CachedOperation::single("users.find", CachePolicy::new("users", 1_000, 300));
//! registry.register(&find_user).await?;
//!
//! let interceptor = CacheInterceptor::new(registry);
//! let name = interceptor
//!     .single(&find_user, &CallArgs::new().arg(42), || async {
//!         Ok::<_, anyhow::Error>("alice".to_string())
//!     })
//!     .await?;
//! println!("Cached user: {}", name);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod entry;
pub mod interceptor;
pub mod key;
pub mod registry;
pub mod replay;
pub mod store;
pub mod types;

pub use config::{CachePolicy, CacheSettings, CacheSettingsBuilder, PolicyFingerprint};
pub use entry::EntryState;
pub use interceptor::{CacheInterceptor, Produced, Producer};
pub use key::{generate_key, CacheKey, CallArgs, KeyGenerator, OperationId};
pub use registry::{CacheRegistry, CachedOperation};
pub use replay::Replay;
pub use store::CacheStore;
pub use types::{CacheStats, ResultShape, Stage};
