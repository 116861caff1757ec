// SPDX-License-Identifier: Apache-2.0

//! Controllable test [`Source`] implementations: one driven manually signal-by-signal, one that
//! offers sync fusion over a pre-built `Vec`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rxop_channel::{demand, BoxError, FusedSource, FusionMode, Sink, Source, Subscription};

/// A source that does nothing until the test calls [`ManualSource::emit`],
/// [`ManualSource::complete`], or [`ManualSource::fail`]. Records every `request`/`cancel` call
/// it receives from the operator under test.
pub struct ManualSource<T> {
    sink: Mutex<Option<Arc<dyn Sink<T>>>>,
    shared: Arc<ManualShared>,
}

#[derive(Default)]
struct ManualShared {
    requested_total: AtomicI64,
    cancelled: AtomicBool,
}

impl<T> ManualSource<T>
where
    T: Send + 'static,
{
    /// Creates a source with no sink subscribed yet.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sink: Mutex::new(None),
            shared: Arc::new(ManualShared::default()),
        })
    }

    /// Running total of everything requested of this source across all `request` calls.
    #[must_use]
    pub fn requested_total(&self) -> i64 {
        self.shared.requested_total.load(Ordering::Acquire)
    }

    /// `true` once the operator under test has cancelled this source's subscription.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::Acquire)
    }

    /// `true` once something has called [`Source::subscribe`] on this source.
    #[must_use]
    pub fn has_subscriber(&self) -> bool {
        self.sink.lock().is_some()
    }

    /// Delivers `item` via `on_next`. Panics if no sink has subscribed yet.
    pub fn emit(&self, item: T) {
        self.current_sink().on_next(item);
    }

    /// Delivers `on_complete`.
    pub fn complete(&self) {
        self.current_sink().on_complete();
    }

    /// Delivers `on_error(error)`.
    pub fn fail(&self, error: BoxError) {
        self.current_sink().on_error(error);
    }

    fn current_sink(&self) -> Arc<dyn Sink<T>> {
        match self.sink.lock().as_ref() {
            Some(sink) => sink.clone(),
            None => panic!("ManualSource driven before it was subscribed"),
        }
    }
}

impl<T> Source<T> for ManualSource<T>
where
    T: Send + 'static,
{
    fn subscribe(&self, sink: Arc<dyn Sink<T>>) {
        *self.sink.lock() = Some(sink.clone());
        sink.on_subscribe(Arc::new(ManualSubscription {
            shared: self.shared.clone(),
        }));
    }
}

struct ManualSubscription {
    shared: Arc<ManualShared>,
}

impl Subscription for ManualSubscription {
    fn request(&self, n: i64) {
        if demand::validate(n) {
            self.shared.requested_total.fetch_add(n, Ordering::AcqRel);
        }
    }

    fn cancel(&self) {
        self.shared.cancelled.store(true, Ordering::Release);
    }
}

/// A source backed by a fixed `Vec`, offering sync fusion: the operator that accepts it polls
/// items directly instead of waiting for `on_next`.
///
/// Single-use, like every `Source` in this crate's test harness: subscribe it once.
pub struct SyncFusedSource<T> {
    items: Mutex<VecDeque<T>>,
}

impl<T> SyncFusedSource<T>
where
    T: Send + 'static,
{
    /// Creates a fused source that will yield `items` in order, then complete.
    #[must_use]
    pub fn new(items: Vec<T>) -> Arc<Self> {
        Arc::new(Self {
            items: Mutex::new(items.into()),
        })
    }
}

impl<T> Source<T> for SyncFusedSource<T>
where
    T: Send + 'static,
{
    fn subscribe(&self, sink: Arc<dyn Sink<T>>) {
        let drained = std::mem::take(&mut *self.items.lock());
        let handle = Arc::new(FusedHandle {
            items: Mutex::new(drained),
        });
        if sink.on_subscribe_fused(handle.clone()) {
            tracing::debug!("sync_fused_source: downstream accepted sync fusion");
        } else {
            tracing::debug!("sync_fused_source: downstream declined fusion, falling back");
            drain_plain(&handle, &sink);
        }
    }
}

fn drain_plain<T: Send + 'static>(handle: &Arc<FusedHandle<T>>, sink: &Arc<dyn Sink<T>>) {
    loop {
        match FusedHandle::poll(handle) {
            Ok(Some(item)) => sink.on_next(item),
            Ok(None) => {
                sink.on_complete();
                return;
            }
            Err(err) => {
                sink.on_error(err);
                return;
            }
        }
    }
}

struct FusedHandle<T> {
    items: Mutex<VecDeque<T>>,
}

impl<T> FusedHandle<T> {
    fn poll(&self) -> Result<Option<T>, BoxError> {
        Ok(self.items.lock().pop_front())
    }
}

impl<T> Subscription for FusedHandle<T> {
    fn request(&self, _n: i64) {
        // The sync-fused contract pulls via `poll`; requested counts are not separately tracked.
    }

    fn cancel(&self) {
        self.items.lock().clear();
    }
}

impl<T: Send + 'static> FusedSource<T> for FusedHandle<T> {
    fn request_fusion(&self, mode_mask: FusionMode) -> FusionMode {
        if mode_mask.contains(FusionMode::SYNC) {
            FusionMode::SYNC
        } else {
            FusionMode::NONE
        }
    }

    fn poll(&self) -> Result<Option<T>, BoxError> {
        FusedHandle::poll(self)
    }

    fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}
