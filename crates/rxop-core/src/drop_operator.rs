// SPDX-License-Identifier: Apache-2.0

//! The `Drop` backpressure-relief operator: forwards items the downstream has requested and
//! silently discards (via a user-supplied `on_drop` callback) the rest, instead of buffering them
//! or applying backpressure to the upstream.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rxop_channel::{demand, BoxError, Demand, DroppedSignalSink, NoopDroppedSignals, ProtocolError, Sink, Source, Subscription};

use crate::error::{panic_message, OperatorError};

/// The `Drop` operator. Requests `UNBOUNDED` from its upstream and forwards at most as many
/// items downstream as have been requested; the rest go to `on_drop`.
pub struct DropOperator<T> {
    upstream: Arc<dyn Source<T>>,
    on_drop: Arc<dyn Fn(T) + Send + Sync>,
    dropped: Arc<dyn DroppedSignalSink<T>>,
}

impl<T> DropOperator<T>
where
    T: Send + std::fmt::Debug + 'static,
{
    /// Creates a `Drop` operator over `upstream`, discarding unrequested items via `on_drop` and
    /// logging post-terminal stray signals through the default dropped-signals sink.
    pub fn new(upstream: Arc<dyn Source<T>>, on_drop: Arc<dyn Fn(T) + Send + Sync>) -> Arc<Self> {
        Self::with_dropped_signals(upstream, on_drop, Arc::new(NoopDroppedSignals))
    }

    /// As [`DropOperator::new`], but with an explicit dropped-signals sink (used by tests).
    pub fn with_dropped_signals(
        upstream: Arc<dyn Source<T>>,
        on_drop: Arc<dyn Fn(T) + Send + Sync>,
        dropped: Arc<dyn DroppedSignalSink<T>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            upstream,
            on_drop,
            dropped,
        })
    }
}

impl<T> Source<T> for DropOperator<T>
where
    T: Send + std::fmt::Debug + 'static,
{
    fn subscribe(&self, sink: Arc<dyn Sink<T>>) {
        let inner = DropSubscriber::new(sink, self.on_drop.clone(), self.dropped.clone());
        self.upstream.subscribe(inner);
    }
}

struct DropSubscriber<T> {
    self_ref: Weak<DropSubscriber<T>>,
    downstream: Arc<dyn Sink<T>>,
    on_drop: Arc<dyn Fn(T) + Send + Sync>,
    dropped: Arc<dyn DroppedSignalSink<T>>,
    requested: Demand,
    done: AtomicBool,
    upstream: Mutex<Option<Arc<dyn Subscription>>>,
}

impl<T> DropSubscriber<T>
where
    T: Send + std::fmt::Debug + 'static,
{
    fn new(
        downstream: Arc<dyn Sink<T>>,
        on_drop: Arc<dyn Fn(T) + Send + Sync>,
        dropped: Arc<dyn DroppedSignalSink<T>>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            self_ref: weak.clone(),
            downstream,
            on_drop,
            dropped,
            requested: Demand::new(),
            done: AtomicBool::new(false),
            upstream: Mutex::new(None),
        })
    }

    /// Marks terminal and reports `err` downstream, unless already terminal (in which case the
    /// error is routed to the dropped-signals sink instead).
    fn terminate_with_error(&self, err: BoxError) {
        if self.done.swap(true, Ordering::AcqRel) {
            self.dropped.on_error_dropped(err);
            return;
        }
        if let Some(up) = self.upstream.lock().take() {
            up.cancel();
        }
        self.downstream.on_error(err);
    }
}

impl<T> Sink<T> for DropSubscriber<T>
where
    T: Send + std::fmt::Debug + 'static,
{
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
        tracing::debug!("drop: subscribing to upstream, requesting unbounded");
        *self.upstream.lock() = Some(subscription.clone());
        let self_arc = self
            .self_ref
            .upgrade()
            .expect("DropSubscriber must be alive while on_subscribe runs");
        self.downstream.on_subscribe(self_arc);
        subscription.request(demand::UNBOUNDED);
    }

    fn on_next(&self, item: T) {
        if self.done.load(Ordering::Acquire) {
            self.dropped.on_next_dropped(item);
            return;
        }

        let requested = self.requested.get();
        if requested != 0 {
            if requested != demand::UNBOUNDED {
                self.requested.subtract(1);
            }
            let downstream = self.downstream.clone();
            if let Err(payload) = std::panic::catch_unwind(AssertUnwindSafe(|| downstream.on_next(item))) {
                if rxop_channel::is_fatal(&*payload) {
                    std::panic::resume_unwind(payload);
                }
                tracing::warn!(
                    message = panic_message(&*payload),
                    "drop: downstream on_next panicked; subscription remains live"
                );
                self.dropped
                    .on_error_dropped(Arc::new(OperatorError::CallbackPanic {
                        operator: "drop",
                        message: panic_message(&*payload),
                    }));
            }
            return;
        }

        let on_drop = self.on_drop.clone();
        if let Err(payload) = std::panic::catch_unwind(AssertUnwindSafe(move || (&*on_drop)(item))) {
            if rxop_channel::is_fatal(&*payload) {
                std::panic::resume_unwind(payload);
            }
            let message = panic_message(&*payload);
            tracing::warn!(%message, "drop: on_drop panicked; terminating subscription");
            self.terminate_with_error(Arc::new(OperatorError::CallbackPanic {
                operator: "drop",
                message,
            }));
        }
    }

    fn on_error(&self, error: BoxError) {
        if self.done.swap(true, Ordering::AcqRel) {
            self.dropped.on_error_dropped(error);
            return;
        }
        self.downstream.on_error(error);
    }

    fn on_complete(&self) {
        if self.done.swap(true, Ordering::AcqRel) {
            return;
        }
        self.downstream.on_complete();
    }
}

impl<T> Subscription for DropSubscriber<T>
where
    T: Send + std::fmt::Debug + 'static,
{
    fn request(&self, n: i64) {
        if demand::validate(n) {
            self.requested.add(n);
            return;
        }
        self.terminate_with_error(Arc::new(ProtocolError::NonPositiveRequest { n }));
    }

    fn cancel(&self) {
        if self.done.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(up) = self.upstream.lock().take() {
            up.cancel();
        }
    }
}
