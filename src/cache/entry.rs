//! Cache entry: a shared, possibly still running computation

use crate::cache::types::Stage;
use crate::error::CacheError;
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, Shared};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Type-erased cached value; stores hold values of many operations
pub(crate) type ErasedValue = Arc<dyn Any + Send + Sync>;

/// What every waiter of an entry eventually observes
pub(crate) type Outcome = Result<ErasedValue, CacheError>;

pub(crate) type SharedOutcome = Shared<BoxFuture<'static, Outcome>>;

/// Lifecycle of a stored entry
///
/// Failed and expired entries are never stored; their slot is simply freed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Producer still running
    Pending,

    /// Producer finished successfully, TTL running
    Completed,
}

/// A stored entry
#[derive(Clone)]
pub(crate) struct CacheEntry {
    /// Distinguishes this entry from a later one under the same key
    pub(crate) id: Uuid,

    pub(crate) stage: Stage,

    pub(crate) state: EntryState,

    pub(crate) created_at: DateTime<Utc>,

    pub(crate) outcome: SharedOutcome,
}

impl CacheEntry {
    /// Create an entry for a computation that has just been started
    pub(crate) fn pending(id: Uuid, stage: Stage, outcome: SharedOutcome) -> Self {
        Self {
            id,
            stage,
            state: EntryState::Pending,
            created_at: Utc::now(),
            outcome,
        }
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.state == EntryState::Pending
    }

    /// The same entry, marked as successfully completed
    pub(crate) fn completed(mut self) -> Self {
        self.state = EntryState::Completed;
        self
    }

    /// Time since the entry was inserted
    pub(crate) fn age(&self) -> Duration {
        (Utc::now() - self.created_at)
            .to_std()
            .unwrap_or(Duration::from_secs(0))
    }
}

impl fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("id", &self.id)
            .field("stage", &self.stage)
            .field("state", &self.state)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}
