//! Core type definitions for the cache system

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Shape of the result an operation produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultShape {
    /// One eventual value
    Single,

    /// An ordered, finite sequence of values
    Multi,
}

impl fmt::Display for ResultShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultShape::Single => write!(f, "single"),
            ResultShape::Multi => write!(f, "multi"),
        }
    }
}

/// Path a computation failure happened on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Single,
    Multi,
}

impl From<ResultShape> for Stage {
    fn from(shape: ResultShape) -> Self {
        match shape {
            ResultShape::Single => Stage::Single,
            ResultShape::Multi => Stage::Multi,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Single => write!(f, "single"),
            Stage::Multi => write!(f, "multi"),
        }
    }
}

/// Statistics for cache performance monitoring
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Calls served by an existing entry (pending or completed)
    pub hits: u64,

    /// Calls that started a new computation
    pub misses: u64,

    /// Computations that failed and were evicted
    pub failures: u64,

    /// Calls that skipped caching entirely
    pub bypasses: u64,

    /// Calls rejected before any computation ran
    pub configuration_errors: u64,
}

impl CacheStats {
    /// Calculate cache hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }

    /// Calculate miss rate as a percentage
    pub fn miss_rate(&self) -> f64 {
        100.0 - self.hit_rate()
    }

    /// Total calls seen by the interceptor
    pub fn total_calls(&self) -> u64 {
        self.hits + self.misses + self.bypasses + self.configuration_errors
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CacheStats {{ hits: {}, misses: {}, hit_rate: {:.2}%, failures: {}, bypasses: {}, configuration_errors: {} }}",
            self.hits,
            self.misses,
            self.hit_rate(),
            self.failures,
            self.bypasses,
            self.configuration_errors
        )
    }
}

/// Lock-free counters behind [`CacheStats`]
#[derive(Debug, Default)]
pub(crate) struct StatsRecorder {
    hits: AtomicU64,
    misses: AtomicU64,
    failures: AtomicU64,
    bypasses: AtomicU64,
    configuration_errors: AtomicU64,
}

impl StatsRecorder {
    pub(crate) fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn bypass(&self) {
        self.bypasses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn configuration_error(&self) {
        self.configuration_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            bypasses: self.bypasses.load(Ordering::Relaxed),
            configuration_errors: self.configuration_errors.load(Ordering::Relaxed),
        }
    }
}
