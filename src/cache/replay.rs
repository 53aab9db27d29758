//! Replay of a buffered multi-value result

use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Independent, restartable traversal over a cached sequence.
///
/// Every consumer gets its own cursor over the same shared buffer, so
/// concurrent consumers see the full sequence in order regardless of each
/// other's pace. Consume it as a [`Stream`], or borrow the buffer with
/// [`Replay::iter`].
#[derive(Debug)]
pub struct Replay<V> {
    items: Arc<Vec<V>>,
    position: usize,
}

impl<V> Replay<V> {
    pub(crate) fn new(items: Arc<Vec<V>>) -> Self {
        Self { items, position: 0 }
    }

    /// Number of values in the full sequence
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Values not yet yielded by this cursor
    pub fn remaining(&self) -> usize {
        self.items.len() - self.position
    }

    /// Rewind this cursor to the first value
    pub fn restart(&mut self) {
        self.position = 0;
    }

    /// The whole buffered sequence
    pub fn as_slice(&self) -> &[V] {
        &self.items
    }

    /// Borrowing iterator over the whole sequence, ignoring the cursor
    pub fn iter(&self) -> std::slice::Iter<'_, V> {
        self.items.iter()
    }
}

impl<V: Clone> Replay<V> {
    /// Copy the full sequence out, ignoring the cursor
    pub fn to_vec(&self) -> Vec<V> {
        self.items.as_ref().clone()
    }
}

impl<V> Clone for Replay<V> {
    /// A fresh cursor over the same buffer
    fn clone(&self) -> Self {
        Self::new(Arc::clone(&self.items))
    }
}

impl<V: Clone> Stream for Replay<V> {
    type Item = V;

    fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<V>> {
        let this = self.get_mut();
        let item = this.items.get(this.position).cloned();
        if item.is_some() {
            this.position += 1;
        }
        Poll::Ready(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining(), Some(self.remaining()))
    }
}
