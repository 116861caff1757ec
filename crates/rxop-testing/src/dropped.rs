// SPDX-License-Identifier: Apache-2.0

//! A [`DroppedSignalSink`] that records what arrived, for asserting post-terminal delivery.

use parking_lot::Mutex;
use rxop_channel::{BoxError, DroppedSignalSink};

/// One signal recorded by [`RecordingDroppedSignals`].
#[derive(Debug, Clone)]
pub enum DroppedSignal<T> {
    /// An `on_next(item)` that arrived after termination.
    Next(T),
    /// An `on_error(error)` that arrived after termination, rendered to a string.
    Error(String),
}

/// Records every dropped signal it receives, in arrival order.
#[derive(Default)]
pub struct RecordingDroppedSignals<T> {
    signals: Mutex<Vec<DroppedSignal<T>>>,
}

impl<T> RecordingDroppedSignals<T> {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T: Clone> RecordingDroppedSignals<T> {
    /// A snapshot of every dropped signal observed so far, in order.
    #[must_use]
    pub fn signals(&self) -> Vec<DroppedSignal<T>> {
        self.signals.lock().clone()
    }
}

impl<T: Send + Sync> DroppedSignalSink<T> for RecordingDroppedSignals<T> {
    fn on_next_dropped(&self, item: T) {
        self.signals.lock().push(DroppedSignal::Next(item));
    }

    fn on_error_dropped(&self, error: BoxError) {
        self.signals.lock().push(DroppedSignal::Error(error.to_string()));
    }
}
