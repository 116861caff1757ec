// SPDX-License-Identifier: Apache-2.0

//! A stand-in `Subscription` presented to a downstream before the real upstream subscription has
//! arrived, buffering `request`/`cancel` and replaying them exactly once when the upstream is
//! finally known.
//!
//! Used by `SubscribeOn`'s eager-cancel modes: the downstream must be able to cancel before the
//! scheduled `subscribe` call has even run.

use std::sync::Arc;

use parking_lot::Mutex;
use rxop_channel::{demand, Subscription};

enum UpstreamSlot {
    Empty,
    Set(Arc<dyn Subscription>),
    Cancelled,
}

struct State {
    upstream: UpstreamSlot,
    pending: i64,
}

/// See the module documentation.
pub struct DeferredSubscription {
    state: Mutex<State>,
}

impl DeferredSubscription {
    /// Creates a subscription with no upstream yet known.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                upstream: UpstreamSlot::Empty,
                pending: 0,
            }),
        })
    }

    /// Supplies the real upstream subscription, one-shot.
    ///
    /// If this subscription was already cancelled, or `set` was already called once, `upstream`
    /// is cancelled immediately instead. Otherwise any demand buffered by earlier `request` calls
    /// is forwarded to it now.
    pub fn set(&self, upstream: Arc<dyn Subscription>) {
        let mut state = self.state.lock();
        match state.upstream {
            UpstreamSlot::Empty => {
                let pending = state.pending;
                state.pending = 0;
                state.upstream = UpstreamSlot::Set(upstream.clone());
                drop(state);
                if pending > 0 {
                    upstream.request(pending);
                }
            }
            UpstreamSlot::Set(_) | UpstreamSlot::Cancelled => {
                drop(state);
                upstream.cancel();
            }
        }
    }

    /// `true` once `cancel` has been observed.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self.state.lock().upstream, UpstreamSlot::Cancelled)
    }
}

impl Subscription for DeferredSubscription {
    fn request(&self, n: i64) {
        if !demand::validate(n) {
            return;
        }
        let mut state = self.state.lock();
        match &state.upstream {
            UpstreamSlot::Set(upstream) => {
                let upstream = upstream.clone();
                drop(state);
                upstream.request(n);
            }
            UpstreamSlot::Empty => {
                state.pending = demand::add_cap(state.pending, n);
            }
            UpstreamSlot::Cancelled => {}
        }
    }

    fn cancel(&self) {
        let mut state = self.state.lock();
        let prev = std::mem::replace(&mut state.upstream, UpstreamSlot::Cancelled);
        drop(state);
        if let UpstreamSlot::Set(upstream) = prev {
            upstream.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};

    struct RecordingSubscription {
        requested: AtomicI64,
        cancelled: std::sync::atomic::AtomicBool,
    }

    impl RecordingSubscription {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                requested: AtomicI64::new(0),
                cancelled: std::sync::atomic::AtomicBool::new(false),
            })
        }
    }

    impl Subscription for RecordingSubscription {
        fn request(&self, n: i64) {
            self.requested.fetch_add(n, Ordering::SeqCst);
        }

        fn cancel(&self) {
            self.cancelled.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn buffers_request_before_set_then_replays_once() {
        let deferred = DeferredSubscription::new();
        deferred.request(3);
        deferred.request(4);
        let upstream = RecordingSubscription::new();
        deferred.set(upstream.clone());
        assert_eq!(upstream.requested.load(Ordering::SeqCst), 7);
        deferred.request(2);
        assert_eq!(upstream.requested.load(Ordering::SeqCst), 9);
    }

    #[test]
    fn cancel_before_set_cancels_newcomer_immediately() {
        let deferred = DeferredSubscription::new();
        deferred.cancel();
        let upstream = RecordingSubscription::new();
        deferred.set(upstream.clone());
        assert!(upstream.cancelled.load(Ordering::SeqCst));
        assert_eq!(upstream.requested.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn cancel_after_set_cancels_upstream() {
        let deferred = DeferredSubscription::new();
        let upstream = RecordingSubscription::new();
        deferred.set(upstream.clone());
        deferred.cancel();
        assert!(upstream.cancelled.load(Ordering::SeqCst));
    }

    #[test]
    fn second_set_cancels_the_newcomer() {
        let deferred = DeferredSubscription::new();
        let first = RecordingSubscription::new();
        let second = RecordingSubscription::new();
        deferred.set(first.clone());
        deferred.set(second.clone());
        assert!(!first.cancelled.load(Ordering::SeqCst));
        assert!(second.cancelled.load(Ordering::SeqCst));
    }
}
