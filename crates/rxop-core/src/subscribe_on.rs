// SPDX-License-Identifier: Apache-2.0

//! The `SubscribeOn` operator: moves the upstream `subscribe` call, and optionally each
//! `request(n)` call, onto a caller-supplied [`Scheduler`].

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rxop_channel::{BoxError, Sink, Source, Subscription};

use crate::deferred::DeferredSubscription;
use crate::scheduler::{CancelHandle, Scheduler};

/// Selects one of the four `SubscribeOn` behaviors (`eager_cancel` × `request_on`).
#[derive(Debug, Clone, Copy, Default)]
pub struct SubscribeOnConfig {
    /// Present a deferred, eagerly-cancellable subscription to the downstream instead of
    /// forwarding the real one, so a cancel racing the scheduled `subscribe` still takes effect.
    pub eager_cancel: bool,
    /// Reschedule every `request(n)` call onto the scheduler individually, instead of calling
    /// the upstream `request` inline on the caller's thread.
    pub request_on: bool,
}

/// The `SubscribeOn` operator.
pub struct SubscribeOn<T> {
    upstream: Arc<dyn Source<T>>,
    scheduler: Arc<dyn Scheduler>,
    config: SubscribeOnConfig,
}

impl<T> SubscribeOn<T>
where
    T: Send + 'static,
{
    /// Creates a `SubscribeOn` operator over `upstream`, dispatching through `scheduler`
    /// according to `config`.
    pub fn new(
        upstream: Arc<dyn Source<T>>,
        scheduler: Arc<dyn Scheduler>,
        config: SubscribeOnConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            upstream,
            scheduler,
            config,
        })
    }
}

impl<T> Source<T> for SubscribeOn<T>
where
    T: Send + 'static,
{
    fn subscribe(&self, sink: Arc<dyn Sink<T>>) {
        match (self.config.eager_cancel, self.config.request_on) {
            (false, false) => schedule_plain_subscribe(&self.scheduler, self.upstream.clone(), sink),
            (false, true) => schedule_plain_subscribe(
                &self.scheduler,
                self.upstream.clone(),
                Arc::new(RequestOnSink {
                    downstream: sink,
                    scheduler: self.scheduler.clone(),
                }),
            ),
            (true, request_on) => {
                subscribe_eager(&self.scheduler, self.upstream.clone(), sink, request_on)
            }
        }
    }
}

fn schedule_plain_subscribe<T: Send + 'static>(
    scheduler: &Arc<dyn Scheduler>,
    upstream: Arc<dyn Source<T>>,
    sink: Arc<dyn Sink<T>>,
) {
    let _handle = scheduler.schedule(Box::new(move || {
        tracing::debug!("subscribe_on: running scheduled subscribe");
        upstream.subscribe(sink);
    }));
}

/// Wraps a downstream sink so that every `request(n)` on the subscription it observes is
/// individually rescheduled, without offering early (pre-subscribe) cancellation.
struct RequestOnSink<T> {
    downstream: Arc<dyn Sink<T>>,
    scheduler: Arc<dyn Scheduler>,
}

impl<T: Send + 'static> Sink<T> for RequestOnSink<T> {
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
        self.downstream.on_subscribe(Arc::new(RequestOnSubscription {
            inner: subscription,
            scheduler: self.scheduler.clone(),
        }));
    }

    fn on_next(&self, item: T) {
        self.downstream.on_next(item);
    }

    fn on_error(&self, error: BoxError) {
        self.downstream.on_error(error);
    }

    fn on_complete(&self) {
        self.downstream.on_complete();
    }
}

struct RequestOnSubscription {
    inner: Arc<dyn Subscription>,
    scheduler: Arc<dyn Scheduler>,
}

impl Subscription for RequestOnSubscription {
    fn request(&self, n: i64) {
        let inner = self.inner.clone();
        let _handle = self.scheduler.schedule(Box::new(move || inner.request(n)));
    }

    fn cancel(&self) {
        self.inner.cancel();
    }
}

// --- Eager-cancel (classic) mode ------------------------------------------------------------

/// Tri-state lifecycle of one scheduled unit of work: unscheduled, scheduled (holding the
/// scheduler's cancel handle), or terminal (finished or cancelled).
enum UnitState {
    Unscheduled,
    Scheduled(Arc<dyn CancelHandle>),
    Finished,
    Cancelled,
}

/// One scheduled closure (the initial `subscribe`, or one `request(n)` in eager + request-on
/// mode), tracked so a master cancel can reach it regardless of whether its scheduler handle has
/// arrived yet.
struct ScheduledUnit {
    state: Mutex<UnitState>,
    tracker: Weak<TaskTracker>,
}

impl ScheduledUnit {
    fn mark_scheduled(self: &Arc<Self>, handle: Arc<dyn CancelHandle>) {
        let lost_race = {
            let mut state = self.state.lock();
            match &*state {
                UnitState::Cancelled => true,
                UnitState::Unscheduled => {
                    *state = UnitState::Scheduled(handle.clone());
                    false
                }
                UnitState::Scheduled(_) | UnitState::Finished => false,
            }
        };
        if lost_race {
            handle.cancel();
        }
    }

    fn mark_finished(self: &Arc<Self>) {
        {
            let mut state = self.state.lock();
            if !matches!(&*state, UnitState::Cancelled) {
                *state = UnitState::Finished;
            }
        }
        if let Some(tracker) = self.tracker.upgrade() {
            tracker.remove(self);
        }
    }

    fn cancel(self: &Arc<Self>) {
        let prev = {
            let mut state = self.state.lock();
            match &*state {
                UnitState::Finished | UnitState::Cancelled => return,
                _ => std::mem::replace(&mut *state, UnitState::Cancelled),
            }
        };
        if let UnitState::Scheduled(handle) = prev {
            handle.cancel();
        }
        if let Some(tracker) = self.tracker.upgrade() {
            tracker.remove(self);
        }
    }
}

/// The eager-cancel task collection: `None` once master-cancelled (no further adds accepted).
struct TaskTracker {
    units: Mutex<Option<Vec<Arc<ScheduledUnit>>>>,
}

impl TaskTracker {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            units: Mutex::new(Some(Vec::new())),
        })
    }

    /// Registers `unit`. Returns `false` if this tracker was already master-cancelled, in which
    /// case the caller must not schedule the unit's task at all.
    fn track(&self, unit: &Arc<ScheduledUnit>) -> bool {
        match self.units.lock().as_mut() {
            Some(units) => {
                units.push(unit.clone());
                true
            }
            None => false,
        }
    }

    fn remove(&self, unit: &Arc<ScheduledUnit>) {
        if let Some(units) = self.units.lock().as_mut() {
            units.retain(|tracked| !Arc::ptr_eq(tracked, unit));
        }
    }

    /// Master cancel: swaps the collection reference to `None` under a single lock acquisition,
    /// then walks the captured snapshot cancelling each unit. No unit added after the swap.
    fn cancel_all(&self) {
        let snapshot = self.units.lock().take();
        if let Some(units) = snapshot {
            for unit in units {
                unit.cancel();
            }
        }
    }
}

fn schedule_tracked<F>(scheduler: &Arc<dyn Scheduler>, tracker: &Arc<TaskTracker>, task: F)
where
    F: FnOnce() + Send + 'static,
{
    let unit = Arc::new(ScheduledUnit {
        state: Mutex::new(UnitState::Unscheduled),
        tracker: Arc::downgrade(tracker),
    });
    if !tracker.track(&unit) {
        tracing::debug!("subscribe_on: task dropped, already master-cancelled");
        return;
    }
    let unit_for_task = unit.clone();
    let handle = scheduler.schedule(Box::new(move || {
        task();
        unit_for_task.mark_finished();
    }));
    unit.mark_scheduled(handle);
}

/// The subscription handed to the downstream in eager-cancel mode: a [`DeferredSubscription`]
/// plus the ability to reach every in-flight scheduled unit for a prompt master cancel.
struct EagerSubscription {
    deferred: Arc<DeferredSubscription>,
    tracker: Arc<TaskTracker>,
    scheduler: Arc<dyn Scheduler>,
    request_on: bool,
}

impl Subscription for EagerSubscription {
    fn request(&self, n: i64) {
        if self.request_on {
            let deferred = self.deferred.clone();
            schedule_tracked(&self.scheduler, &self.tracker, move || deferred.request(n));
        } else {
            self.deferred.request(n);
        }
    }

    fn cancel(&self) {
        self.deferred.cancel();
        self.tracker.cancel_all();
    }
}

/// Forwards everything to `downstream` except `on_subscribe`, which instead completes the
/// [`DeferredSubscription`] already handed to the downstream.
struct DeferredSettingSink<T> {
    downstream: Arc<dyn Sink<T>>,
    deferred: Arc<DeferredSubscription>,
}

impl<T: Send + 'static> Sink<T> for DeferredSettingSink<T> {
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
        self.deferred.set(subscription);
    }

    fn on_next(&self, item: T) {
        self.downstream.on_next(item);
    }

    fn on_error(&self, error: BoxError) {
        self.downstream.on_error(error);
    }

    fn on_complete(&self) {
        self.downstream.on_complete();
    }
}

fn subscribe_eager<T: Send + 'static>(
    scheduler: &Arc<dyn Scheduler>,
    upstream: Arc<dyn Source<T>>,
    sink: Arc<dyn Sink<T>>,
    request_on: bool,
) {
    let deferred = DeferredSubscription::new();
    let tracker = TaskTracker::new();

    let eager_sub = Arc::new(EagerSubscription {
        deferred: deferred.clone(),
        tracker: tracker.clone(),
        scheduler: scheduler.clone(),
        request_on,
    });
    sink.on_subscribe(eager_sub);

    let inner_sink = Arc::new(DeferredSettingSink {
        downstream: sink,
        deferred,
    });
    schedule_tracked(scheduler, &tracker, move || upstream.subscribe(inner_sink));
}
