// SPDX-License-Identifier: Apache-2.0

//! A [`Sink`] that records every signal it observes, for assertions in operator tests.

use std::sync::Arc;

use parking_lot::Mutex;
use rxop_channel::{BoxError, Sink, Subscription};

/// One signal recorded by [`RecordingSink`], in arrival order.
#[derive(Debug, Clone)]
pub enum RecordedSignal<T> {
    /// `on_next(item)`.
    Next(T),
    /// `on_error(error)`, rendered to a string since the concrete error type varies by test.
    Error(String),
    /// `on_complete()`.
    Complete,
}

/// Records every `on_next`/`on_error`/`on_complete` it receives and stashes the subscription
/// handed to it by `on_subscribe`, so a test can drive `request`/`cancel` afterward.
pub struct RecordingSink<T> {
    signals: Mutex<Vec<RecordedSignal<T>>>,
    subscription: Mutex<Option<Arc<dyn Subscription>>>,
}

impl<T> Default for RecordingSink<T> {
    fn default() -> Self {
        Self {
            signals: Mutex::new(Vec::new()),
            subscription: Mutex::new(None),
        }
    }
}

impl<T> RecordingSink<T> {
    /// Creates an empty recording sink.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The subscription handed to this sink by `on_subscribe`, if any yet.
    #[must_use]
    pub fn subscription(&self) -> Option<Arc<dyn Subscription>> {
        self.subscription.lock().clone()
    }

    /// Requests `n` items from the stashed subscription. Panics if `on_subscribe` has not run
    /// yet, since that would indicate a broken test setup rather than a recoverable condition.
    pub fn request(&self, n: i64) {
        let subscription = self.subscription();
        match subscription {
            Some(sub) => sub.request(n),
            None => panic!("RecordingSink::request called before on_subscribe"),
        }
    }

    /// Cancels the stashed subscription. Same panicking contract as [`RecordingSink::request`].
    pub fn cancel(&self) {
        let subscription = self.subscription();
        match subscription {
            Some(sub) => sub.cancel(),
            None => panic!("RecordingSink::cancel called before on_subscribe"),
        }
    }
}

impl<T: Clone> RecordingSink<T> {
    /// A snapshot of every signal observed so far, in order.
    #[must_use]
    pub fn signals(&self) -> Vec<RecordedSignal<T>> {
        self.signals.lock().clone()
    }

    /// Just the items delivered via `on_next`, in order.
    #[must_use]
    pub fn items(&self) -> Vec<T> {
        self.signals
            .lock()
            .iter()
            .filter_map(|s| match s {
                RecordedSignal::Next(item) => Some(item.clone()),
                _ => None,
            })
            .collect()
    }
}

impl<T> RecordingSink<T> {
    /// `true` once a terminal signal (`on_error` or `on_complete`) has been recorded.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        matches!(
            self.signals.lock().last(),
            Some(RecordedSignal::Error(_) | RecordedSignal::Complete)
        )
    }
}

impl<T: Send + 'static> Sink<T> for RecordingSink<T> {
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
        *self.subscription.lock() = Some(subscription);
    }

    fn on_next(&self, item: T) {
        self.signals.lock().push(RecordedSignal::Next(item));
    }

    fn on_error(&self, error: BoxError) {
        self.signals.lock().push(RecordedSignal::Error(error.to_string()));
    }

    fn on_complete(&self) {
        self.signals.lock().push(RecordedSignal::Complete);
    }
}
