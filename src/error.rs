//! Error types for cache operations
//!
//! Configuration mistakes and producer failures are reported as values on the
//! caller's result channel. A missing cache is never an error: the call simply
//! bypasses caching.

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::cache::types::Stage;

/// Main error type for cache operations
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// Caller-side misuse detected before any computation ran
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The producer of a cached entry failed; shared by every waiter of that entry
    #[error("Error processing async cache with {stage}")]
    Computation {
        stage: Stage,
        #[source]
        cause: ProducerFailure,
    },

    /// The producer failed on an uncached call
    #[error(transparent)]
    Producer(ProducerFailure),
}

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

impl CacheError {
    /// Wrap a producer failure with the stage it happened on
    pub fn computation(stage: Stage, cause: ProducerFailure) -> Self {
        CacheError::Computation { stage, cause }
    }

    /// The original producer failure, if this error carries one
    pub fn producer_failure(&self) -> Option<&ProducerFailure> {
        match self {
            CacheError::Computation { cause, .. } | CacheError::Producer(cause) => Some(cause),
            CacheError::Configuration(_) => None,
        }
    }

    /// Check whether this is a configuration error
    pub fn is_configuration(&self) -> bool {
        matches!(self, CacheError::Configuration(_))
    }
}

/// A producer failure that can be handed to many waiters at once.
///
/// Displays as the original error and exposes the original chain through
/// [`std::error::Error::source`].
#[derive(Clone)]
pub struct ProducerFailure(Arc<anyhow::Error>);

impl ProducerFailure {
    pub fn new(error: impl Into<anyhow::Error>) -> Self {
        Self(Arc::new(error.into()))
    }

    /// The original error
    pub fn cause(&self) -> &anyhow::Error {
        &self.0
    }

    /// Downcast the original error to a concrete type
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.0.downcast_ref::<E>()
    }
}

impl fmt::Debug for ProducerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for ProducerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

impl std::error::Error for ProducerFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl From<String> for CacheError {
    fn from(s: String) -> Self {
        CacheError::Configuration(s)
    }
}

impl From<&str> for CacheError {
    fn from(s: &str) -> Self {
        CacheError::Configuration(s.to_string())
    }
}
