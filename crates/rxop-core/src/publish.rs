// SPDX-License-Identifier: Apache-2.0

//! The `Publish`/multicast operator: a single upstream feeds a dynamically joining set of
//! downstream subscribers through a bounded prefetch queue, throttled to the slowest current
//! subscriber.
//!
//! Mutations to the subscriber table are serialized behind a small mutex; reads (the drain loop,
//! which runs far more often than joins/leaves) go through [`arc_swap::ArcSwap`] and never block.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use rxop_channel::{
    demand, BoxError, Demand, FusedSource, FusionMode, QueueFactory, Sink, Source, Subscription,
};

use crate::error::{panic_message, OperatorError};

/// The `Publish` multicaster. Connects to its upstream on the first `subscribe`, then fans out
/// every item to all subscribers present at the time it was polled.
pub struct PublishOperator<T> {
    state: Arc<PublishState<T>>,
}

struct PublishState<T> {
    upstream: Arc<dyn Source<T>>,
    prefetch: usize,
    limit: usize,
    queue: Box<dyn rxop_channel::BoundedQueue<T>>,
    upstream_sub: Mutex<Option<Arc<dyn Subscription>>>,
    fused: Mutex<Option<Arc<dyn FusedSource<T>>>>,
    connected: AtomicBool,
    done: AtomicBool,
    cancelled: AtomicBool,
    terminated: AtomicBool,
    error: Mutex<Option<BoxError>>,
    subscribers: ArcSwap<Vec<Arc<ClientSub<T>>>>,
    subscribers_lock: Mutex<()>,
    wip: AtomicUsize,
    produced: AtomicUsize,
}

impl<T> PublishOperator<T>
where
    T: Clone + Send + std::fmt::Debug + 'static,
{
    /// Creates a `Publish` operator over `upstream` with the given `prefetch` window, allocating
    /// its internal queue via `queue_factory` (unused if the upstream accepts sync fusion).
    pub fn new(
        upstream: Arc<dyn Source<T>>,
        prefetch: usize,
        queue_factory: Arc<dyn QueueFactory<T>>,
    ) -> Arc<Self> {
        let limit = prefetch.saturating_sub(prefetch / 4);
        let queue = queue_factory.make(prefetch.max(1));
        let state = Arc::new(PublishState {
            upstream,
            prefetch,
            limit,
            queue,
            upstream_sub: Mutex::new(None),
            fused: Mutex::new(None),
            connected: AtomicBool::new(false),
            done: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            terminated: AtomicBool::new(false),
            error: Mutex::new(None),
            subscribers: ArcSwap::from_pointee(Vec::new()),
            subscribers_lock: Mutex::new(()),
            wip: AtomicUsize::new(0),
            produced: AtomicUsize::new(0),
        });
        Arc::new(Self { state })
    }

    fn ensure_connected(&self) {
        if self.state.connected.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::debug!("publish: connecting to upstream");
        let sink = Arc::new(UpstreamSink {
            state: self.state.clone(),
        });
        self.state.upstream.clone().subscribe(sink);
    }

    /// Severs the multicast from the transform side: cancels the upstream and terminates every
    /// current subscriber's subscription without delivering a terminal signal to it (the
    /// subscriber simply stops hearing anything further, as with any other cancellation).
    pub fn disconnect(&self) {
        if self.state.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::debug!("publish: disconnect requested");
        if let Some(up) = self.state.upstream_sub.lock().take() {
            up.cancel();
        }
        self.state.terminated.store(true, Ordering::Release);
        {
            let _guard = self.state.subscribers_lock.lock();
            self.state.subscribers.store(Arc::new(Vec::new()));
        }
        drain(&self.state);
    }
}

impl<T> Source<T> for PublishOperator<T>
where
    T: Clone + Send + std::fmt::Debug + 'static,
{
    fn subscribe(&self, sink: Arc<dyn Sink<T>>) {
        self.ensure_connected();

        let client = Arc::new(ClientSub {
            parent: self.state.clone(),
            sink,
            requested: Demand::new(),
            cancelled: AtomicBool::new(false),
        });
        client.sink.on_subscribe(client.clone());

        match join(&self.state, client.clone()) {
            JoinOutcome::Terminated => deliver_terminal_to_one(&self.state, &client.sink),
            JoinOutcome::Joined => {
                if client.cancelled.load(Ordering::Acquire) {
                    remove_client(&self.state, Arc::as_ptr(&client));
                }
                drain(&self.state);
            }
        }
    }
}

/// The per-subscriber handle stored in the subscriber table and handed to the downstream as its
/// `Subscription`.
struct ClientSub<T> {
    parent: Arc<PublishState<T>>,
    sink: Arc<dyn Sink<T>>,
    requested: Demand,
    cancelled: AtomicBool,
}

impl<T> Subscription for ClientSub<T>
where
    T: Clone + Send + std::fmt::Debug + 'static,
{
    fn request(&self, n: i64) {
        if !demand::validate(n) {
            tracing::debug!(n, "publish: ignoring non-positive request from a subscriber");
            return;
        }
        self.requested.add(n);
        drain(&self.parent);
    }

    fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        remove_client(&self.parent, self as *const ClientSub<T>);
        drain(&self.parent);
    }
}

enum JoinOutcome {
    Joined,
    Terminated,
}

/// Adds `client` to the subscriber table unless already terminated. Closes the race against a
/// concurrent termination by re-checking after the insert and backing the client back out if it
/// lost.
fn join<T>(state: &Arc<PublishState<T>>, client: Arc<ClientSub<T>>) -> JoinOutcome {
    if state.terminated.load(Ordering::Acquire) {
        return JoinOutcome::Terminated;
    }
    {
        let _guard = state.subscribers_lock.lock();
        if state.terminated.load(Ordering::Acquire) {
            return JoinOutcome::Terminated;
        }
        let current = state.subscribers.load_full();
        let mut next = Vec::with_capacity(current.len() + 1);
        next.extend(current.iter().cloned());
        next.push(client);
        state.subscribers.store(Arc::new(next));
    }
    if state.terminated.load(Ordering::Acquire) {
        JoinOutcome::Terminated
    } else {
        JoinOutcome::Joined
    }
}

fn remove_client<T>(state: &Arc<PublishState<T>>, target: *const ClientSub<T>) {
    let _guard = state.subscribers_lock.lock();
    let current = state.subscribers.load_full();
    if !current.iter().any(|c| std::ptr::eq(Arc::as_ptr(c), target)) {
        return;
    }
    let next: Vec<_> = current
        .iter()
        .filter(|c| !std::ptr::eq(Arc::as_ptr(c), target))
        .cloned()
        .collect();
    state.subscribers.store(Arc::new(next));
}

fn deliver_terminal_to_one<T>(state: &Arc<PublishState<T>>, sink: &Arc<dyn Sink<T>>) {
    match state.error.lock().clone() {
        Some(err) => sink.on_error(err),
        None => sink.on_complete(),
    }
}

fn min_requested<T>(subscribers: &[Arc<ClientSub<T>>]) -> i64 {
    subscribers.iter().map(|c| c.requested.get()).min().unwrap_or(0)
}

fn broadcast_next<T: Clone>(subscribers: &[Arc<ClientSub<T>>], item: &T) {
    for client in subscribers {
        client.sink.on_next(item.clone());
    }
}

fn bump_produced<T>(state: &Arc<PublishState<T>>) {
    if state.limit == 0 {
        return;
    }
    let next = state.produced.fetch_add(1, Ordering::AcqRel) + 1;
    if next >= state.limit {
        state.produced.store(0, Ordering::Release);
        let upstream = state.upstream_sub.lock().clone();
        if let Some(up) = upstream {
            up.request(state.limit as i64);
        }
    }
}

/// Moves the subscriber table to `Terminated` and broadcasts the terminal signal captured in
/// `error` (`None` for completion) to every subscriber present at the moment of termination.
/// Write order: record the error, mark `done`, then swap the table away, so a racing joiner
/// either fully misses the swap or observes a fully-written `error` slot alongside it.
fn finish<T: Clone + Send + std::fmt::Debug + 'static>(
    state: &Arc<PublishState<T>>,
    subscribers: &[Arc<ClientSub<T>>],
    error: Option<BoxError>,
) {
    if error.is_some() {
        *state.error.lock() = error.clone();
    }
    state.done.store(true, Ordering::Release);
    state.terminated.store(true, Ordering::Release);
    {
        let _guard = state.subscribers_lock.lock();
        state.subscribers.store(Arc::new(Vec::new()));
    }
    if let Some(up) = state.upstream_sub.lock().take() {
        up.cancel();
    }
    state.queue.clear();
    for client in subscribers {
        match &error {
            Some(e) => client.sink.on_error(e.clone()),
            None => client.sink.on_complete(),
        }
    }
    tracing::debug!(failed = error.is_some(), "publish: terminated");
}

fn fail_all<T: Clone + Send + std::fmt::Debug + 'static>(state: &Arc<PublishState<T>>, err: BoxError) {
    let subscribers = state.subscribers.load_full();
    finish(state, &subscribers, Some(err));
}

/// Entry point for the wip-serialized drain loop: the only caller allowed to poll the queue (or
/// the fused upstream) and broadcast to subscribers.
fn drain<T>(state: &Arc<PublishState<T>>)
where
    T: Clone + Send + std::fmt::Debug + 'static,
{
    if state.wip.fetch_add(1, Ordering::AcqRel) != 0 {
        return;
    }
    let mut missed = 1usize;
    loop {
        if state.cancelled.load(Ordering::Acquire) {
            state.queue.clear();
        } else if state.fused.lock().is_some() {
            drain_sync(state);
        } else {
            drain_async(state);
        }

        missed = state.wip.fetch_sub(missed, Ordering::AcqRel) - missed;
        if missed == 0 {
            return;
        }
    }
}

fn drain_sync<T>(state: &Arc<PublishState<T>>)
where
    T: Clone + Send + std::fmt::Debug + 'static,
{
    let subscribers = state.subscribers.load_full();
    if subscribers.is_empty() {
        return;
    }
    let r = min_requested(&subscribers);
    if r <= 0 {
        return;
    }
    let fused = state.fused.lock().clone();
    let Some(fused) = fused else { return };

    let mut emitted: i64 = 0;
    while emitted < r {
        let polled = std::panic::catch_unwind(AssertUnwindSafe(|| fused.poll()));
        match polled {
            Ok(Ok(Some(item))) => {
                broadcast_next(&subscribers, &item);
                emitted += 1;
            }
            Ok(Ok(None)) => {
                finish(state, &subscribers, None);
                return;
            }
            Ok(Err(err)) => {
                finish(state, &subscribers, Some(err));
                return;
            }
            Err(payload) => {
                if rxop_channel::is_fatal(&*payload) {
                    std::panic::resume_unwind(payload);
                }
                finish(
                    state,
                    &subscribers,
                    Some(Arc::new(OperatorError::CallbackPanic {
                        operator: "publish",
                        message: panic_message(&*payload),
                    })),
                );
                return;
            }
        }
    }
    if emitted > 0 {
        for client in subscribers.iter() {
            client.requested.subtract(emitted);
        }
    }
}

fn drain_async<T>(state: &Arc<PublishState<T>>)
where
    T: Clone + Send + std::fmt::Debug + 'static,
{
    let subscribers = state.subscribers.load_full();
    if subscribers.is_empty() {
        return;
    }
    let r = min_requested(&subscribers);
    let mut emitted: i64 = 0;

    while emitted < r {
        let done = state.done.load(Ordering::Acquire);
        let item = state.queue.poll();
        let empty = item.is_none();

        if done && (state.error.lock().is_some() || empty) {
            let error = state.error.lock().clone();
            finish(state, &subscribers, error);
            return;
        }
        if empty {
            return;
        }

        if let Some(item) = item {
            broadcast_next(&subscribers, &item);
            for client in subscribers.iter() {
                client.requested.subtract(1);
            }
        }
        emitted += 1;
        bump_produced(state);
    }

    let done = state.done.load(Ordering::Acquire);
    if done && (state.error.lock().is_some() || state.queue.is_empty()) {
        let error = state.error.lock().clone();
        finish(state, &subscribers, error);
    }
}

struct UpstreamSink<T> {
    state: Arc<PublishState<T>>,
}

impl<T> Sink<T> for UpstreamSink<T>
where
    T: Clone + Send + std::fmt::Debug + 'static,
{
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
        tracing::debug!(prefetch = self.state.prefetch, "publish: upstream subscribed, non-fused");
        *self.state.upstream_sub.lock() = Some(subscription.clone());
        subscription.request(self.state.prefetch as i64);
    }

    fn on_next(&self, item: T) {
        if !self.state.queue.offer(item) {
            fail_all(
                &self.state,
                Arc::new(OperatorError::QueueOverflow { operator: "publish" }),
            );
            return;
        }
        drain(&self.state);
    }

    fn on_error(&self, error: BoxError) {
        *self.state.error.lock() = Some(error);
        self.state.done.store(true, Ordering::Release);
        drain(&self.state);
    }

    fn on_complete(&self) {
        self.state.done.store(true, Ordering::Release);
        drain(&self.state);
    }

    fn on_subscribe_fused(&self, fused: Arc<dyn FusedSource<T>>) -> bool {
        let mode = fused.request_fusion(FusionMode::SYNC);
        if mode == FusionMode::SYNC {
            tracing::debug!(prefetch = self.state.prefetch, "publish: upstream subscribed, sync-fused");
            *self.state.upstream_sub.lock() = Some(fused.clone());
            *self.state.fused.lock() = Some(fused.clone());
            fused.request(self.state.prefetch as i64);
            true
        } else {
            self.on_subscribe(fused);
            false
        }
    }
}
