// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rxop_channel::{BoxError, Sink, Source, Subscription};
use rxop_core::DropOperator;
use rxop_testing::{ManualSource, RecordingDroppedSignals, RecordingSink};

/// Source emits `1..=10` synchronously. Downstream requests 3, then nothing more. Expect the
/// sink to see `[1,2,3]`, `on_drop` to receive `[4..10]`, then `on_complete`.
#[test]
fn drop_starved_downstream_forwards_requested_and_drops_the_rest() {
    let upstream = ManualSource::<i32>::new();
    let dropped = Arc::new(Mutex::new(Vec::new()));
    let dropped_for_cb = dropped.clone();
    let on_drop: Arc<dyn Fn(i32) + Send + Sync> = Arc::new(move |item| dropped_for_cb.lock().push(item));
    let operator = DropOperator::new(upstream.clone(), on_drop);

    let sink = RecordingSink::<i32>::new();
    operator.subscribe(sink.clone());
    sink.request(3);

    for item in 1..=10 {
        upstream.emit(item);
    }
    upstream.complete();

    assert_eq!(sink.items(), vec![1, 2, 3]);
    assert!(sink.is_terminated());
    assert_eq!(*dropped.lock(), vec![4, 5, 6, 7, 8, 9, 10]);
    assert_eq!(upstream.requested_total(), i64::MAX);
}

/// Source emits `1,2,3`; downstream requests 0 (nothing forwarded); `on_drop(2)` panics with
/// `E`. Expect `on_error(E)` downstream, upstream cancelled, `3` routed to the dropped sink.
#[test]
fn drop_on_drop_panic_terminates_and_cancels_upstream() {
    let upstream = ManualSource::<i32>::new();
    let panicked = AtomicBool::new(false);
    let on_drop: Arc<dyn Fn(i32) + Send + Sync> = Arc::new(move |item| {
        if item == 2 && !panicked.swap(true, Ordering::SeqCst) {
            panic!("on_drop blew up");
        }
    });
    let dropped_signals = Arc::new(RecordingDroppedSignals::<i32>::new());
    let operator = DropOperator::with_dropped_signals(upstream.clone(), on_drop, dropped_signals.clone());

    let sink = RecordingSink::<i32>::new();
    operator.subscribe(sink.clone());

    upstream.emit(1);
    // on_drop(2) panics inside this call; the panic is caught by the operator, not propagated.
    upstream.emit(2);
    // Subscription is now terminal; item 3 goes to the dropped-signals sink, not on_drop.
    upstream.emit(3);

    assert!(sink.is_terminated());
    assert!(upstream.is_cancelled());
    let signals = dropped_signals.signals();
    assert_eq!(signals.len(), 1);
    assert!(matches!(
        &signals[0],
        rxop_testing::dropped::DroppedSignal::Next(3)
    ));
}

/// With sufficient demand, `Drop` is a pass-through: the sink sees the whole source sequence and
/// `on_drop` never runs.
#[test]
fn drop_with_sufficient_demand_is_a_pass_through() {
    let upstream = ManualSource::<i32>::new();
    let collected = Arc::new(Mutex::new(Vec::new()));
    let collected_for_cb = collected.clone();
    let on_drop: Arc<dyn Fn(i32) + Send + Sync> = Arc::new(move |item| collected_for_cb.lock().push(item));
    let operator = DropOperator::new(upstream.clone(), on_drop);

    let sink = RecordingSink::<i32>::new();
    operator.subscribe(sink.clone());
    sink.request(10);

    for item in 1..=10 {
        upstream.emit(item);
    }
    upstream.complete();

    assert_eq!(sink.items(), (1..=10).collect::<Vec<_>>());
    assert!(collected.lock().is_empty());
}

/// A source that pushes every item synchronously, on the same call stack as `request`, the way
/// a truly eager upstream (no scheduler boundary) behaves. Exercises the ordering between
/// `Drop`'s own downstream `on_subscribe` and its upstream `request`.
struct EagerSource<T> {
    items: Mutex<Option<Vec<T>>>,
}

impl<T> EagerSource<T> {
    fn new(items: Vec<T>) -> Arc<Self> {
        Arc::new(Self {
            items: Mutex::new(Some(items)),
        })
    }
}

impl<T: Send + 'static> Source<T> for EagerSource<T> {
    fn subscribe(&self, sink: Arc<dyn Sink<T>>) {
        let items = self.items.lock().take().unwrap_or_default();
        sink.on_subscribe(Arc::new(EagerSubscription {
            items: Mutex::new(Some(items)),
            sink: sink.clone(),
        }));
    }
}

struct EagerSubscription<T> {
    items: Mutex<Option<Vec<T>>>,
    sink: Arc<dyn Sink<T>>,
}

impl<T: Send + 'static> Subscription for EagerSubscription<T> {
    fn request(&self, _n: i64) {
        if let Some(items) = self.items.lock().take() {
            for item in items {
                self.sink.on_next(item);
            }
            self.sink.on_complete();
        }
    }

    fn cancel(&self) {
        self.items.lock().take();
    }
}

/// A sink that requests a fixed amount synchronously from within its own `on_subscribe`, the way
/// many real downstreams do (rather than deferring `request` to a later call).
struct ImmediateRequestSink<T> {
    inner: Arc<RecordingSink<T>>,
    request_amount: i64,
}

impl<T: Send + 'static> Sink<T> for ImmediateRequestSink<T> {
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
        self.inner.on_subscribe(subscription.clone());
        subscription.request(self.request_amount);
    }

    fn on_next(&self, item: T) {
        self.inner.on_next(item);
    }

    fn on_error(&self, error: BoxError) {
        self.inner.on_error(error);
    }

    fn on_complete(&self) {
        self.inner.on_complete();
    }
}

/// Regression test: `Drop` must notify its downstream (`on_subscribe`) before requesting
/// `UNBOUNDED` from an eager upstream. A downstream that requests synchronously from within its
/// own `on_subscribe` (as `ImmediateRequestSink` does here) must have that demand recorded before
/// the eager upstream starts pushing items on the same call stack; otherwise every item would
/// observe zero demand and be misrouted to `on_drop`.
#[test]
fn drop_notifies_downstream_before_requesting_from_an_eager_upstream() {
    let upstream = EagerSource::new(vec![1, 2, 3, 4, 5]);
    let dropped = Arc::new(Mutex::new(Vec::new()));
    let dropped_for_cb = dropped.clone();
    let on_drop: Arc<dyn Fn(i32) + Send + Sync> = Arc::new(move |item| dropped_for_cb.lock().push(item));
    let operator = DropOperator::new(upstream, on_drop);

    let inner = RecordingSink::<i32>::new();
    let sink = Arc::new(ImmediateRequestSink {
        inner: inner.clone(),
        request_amount: 3,
    });
    operator.subscribe(sink);

    assert_eq!(inner.items(), vec![1, 2, 3]);
    assert!(inner.is_terminated());
    assert_eq!(*dropped.lock(), vec![4, 5]);
}
