// SPDX-License-Identifier: Apache-2.0

//! The bounded, MPSC-safe queue abstraction used as the publish multicaster's prefetch buffer.
//!
//! The queue has a single consumer (the multicaster's drain) and, in the non-fused case, a
//! single producer (the upstream `on_next` calls); in sync fusion the multicaster is itself the
//! consumer of whatever queue the fused upstream already owns. `offer` returning `false` signals
//! overflow, which the multicaster treats as a fatal protocol break and converts into
//! `on_error(OperatorError::QueueOverflow)` broadcast to every current subscriber.

use std::collections::VecDeque;
use std::sync::Mutex;

/// A bounded queue supporting thread-safe `offer` and single-consumer `poll`/`is_empty`/`clear`.
pub trait BoundedQueue<T>: Send + Sync {
    /// Attempts to enqueue `item`. Returns `false` if the queue is full (overflow).
    fn offer(&self, item: T) -> bool;

    /// Dequeues the next item, if any.
    fn poll(&self) -> Option<T>;

    /// `O(1)` emptiness check.
    fn is_empty(&self) -> bool;

    /// Drops all buffered items, used on termination.
    fn clear(&self);
}

/// Produces queues of a given capacity on demand.
///
/// The multicaster calls this once, on the upstream `on_subscribe`, unless the upstream is
/// sync/async-fused and already owns a compatible queue.
pub trait QueueFactory<T>: Send + Sync {
    /// Builds a new bounded queue with room for `capacity` items.
    fn make(&self, capacity: usize) -> Box<dyn BoundedQueue<T>>;
}

/// A `VecDeque`-backed bounded queue guarded by a `Mutex`.
///
/// This mirrors the `VecDeque`-backed channel buffer this crate's operators are modeled on,
/// swapping the single-threaded `RefCell` for a `Mutex` since the publish multicaster's queue is
/// genuinely multi-producer in the non-fused case.
pub struct VecDequeQueue<T> {
    capacity: usize,
    buffer: Mutex<VecDeque<T>>,
}

impl<T> VecDequeQueue<T> {
    /// Creates an empty queue with room for `capacity` items.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            buffer: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }
}

impl<T: Send> BoundedQueue<T> for VecDequeQueue<T> {
    fn offer(&self, item: T) -> bool {
        let mut buffer = self.buffer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if buffer.len() >= self.capacity {
            return false;
        }
        buffer.push_back(item);
        true
    }

    fn poll(&self) -> Option<T> {
        let mut buffer = self.buffer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        buffer.pop_front()
    }

    fn is_empty(&self) -> bool {
        let buffer = self.buffer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        buffer.is_empty()
    }

    fn clear(&self) {
        let mut buffer = self.buffer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        buffer.clear();
    }
}

/// The default [`QueueFactory`], producing [`VecDequeQueue`] instances.
#[derive(Debug, Default, Clone, Copy)]
pub struct VecDequeQueueFactory;

impl<T: Send + 'static> QueueFactory<T> for VecDequeQueueFactory {
    fn make(&self, capacity: usize) -> Box<dyn BoundedQueue<T>> {
        Box::new(VecDequeQueue::new(capacity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offer_respects_capacity() {
        let q: VecDequeQueue<i32> = VecDequeQueue::new(2);
        assert!(q.offer(1));
        assert!(q.offer(2));
        assert!(!q.offer(3));
        assert_eq!(q.poll(), Some(1));
        assert!(q.offer(3));
        assert_eq!(q.poll(), Some(2));
        assert_eq!(q.poll(), Some(3));
        assert!(q.is_empty());
    }

    #[test]
    fn clear_drops_buffered_items() {
        let q: VecDequeQueue<i32> = VecDequeQueue::new(4);
        q.offer(1);
        q.offer(2);
        q.clear();
        assert!(q.is_empty());
        assert_eq!(q.poll(), None);
    }
}
