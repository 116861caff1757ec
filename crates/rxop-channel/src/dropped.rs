// SPDX-License-Identifier: Apache-2.0

//! Sink for signals that arrive after a subscription has already reached its terminal state.
//!
//! The reactive-streams protocol forbids delivering `on_next`/`on_error` after a terminal signal,
//! but upstream producers racing a cancellation or a completion can still observe one more item
//! or error after the operator has already moved on. Rather than silently discarding those,
//! every operator routes them through a configurable [`DroppedSignalSink`] hook instead of a
//! process-wide global, so tests can install a recording implementation.

use crate::error::BoxError;

/// Receives signals an operator could not deliver because its subscription had already
/// terminated.
pub trait DroppedSignalSink<T>: Send + Sync {
    /// An `on_next(item)` that arrived after termination.
    fn on_next_dropped(&self, item: T);

    /// An `on_error(error)` that arrived after termination.
    fn on_error_dropped(&self, error: BoxError);
}

/// Default dropped-signals sink: logs at `tracing::warn!` and discards.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDroppedSignals;

impl<T> DroppedSignalSink<T> for NoopDroppedSignals
where
    T: std::fmt::Debug,
{
    fn on_next_dropped(&self, item: T) {
        tracing::warn!(?item, "on_next dropped after subscription terminated");
    }

    fn on_error_dropped(&self, error: BoxError) {
        tracing::warn!(%error, "on_error dropped after subscription terminated");
    }
}
