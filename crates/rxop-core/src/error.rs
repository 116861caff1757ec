// SPDX-License-Identifier: Apache-2.0

//! Errors raised by the `rxop-core` operators, grouped by component the way a dataflow engine's
//! per-stage error kinds are grouped, adapted to protocol violations, queue overflow, and
//! user-callback failures.

use rxop_channel::BoxError;

/// Errors an operator can deliver as `on_error`, beyond the bare
/// [`ProtocolError`](rxop_channel::ProtocolError) re-exported from `rxop-channel`.
#[derive(thiserror::Error, Debug, Clone)]
pub enum OperatorError {
    /// The prefetch queue's `offer` returned `false`; the multicaster treats this as fatal.
    #[error("{operator}: prefetch queue overflow")]
    QueueOverflow {
        /// Name of the operator instance that observed the overflow, for log correlation.
        operator: &'static str,
    },

    /// A user-supplied callback (`on_drop`, a transform, a predicate) panicked non-fatally.
    #[error("{operator}: user callback panicked: {message}")]
    CallbackPanic {
        /// Name of the operator instance whose callback panicked.
        operator: &'static str,
        /// Best-effort rendering of the panic payload.
        message: String,
    },

    /// The upstream source delivered `on_error`; wrapped so it can be re-broadcast.
    #[error("{operator}: upstream failed: {source}")]
    Upstream {
        /// Name of the operator instance relaying the failure.
        operator: &'static str,
        /// The upstream's original error.
        source: BoxError,
    },
}

/// Renders a caught panic payload into a human-readable message for [`OperatorError::CallbackPanic`].
#[must_use]
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
