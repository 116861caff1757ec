// SPDX-License-Identifier: Apache-2.0

//! The `Source`/`Sink`/`Subscription` contract and the optional `FusedSource` fast path.
//!
//! These traits are the entire inter-stage protocol: `on_subscribe` exactly once first, then
//! zero or more `on_next`, then at most one of `on_complete`/`on_error`, never a signal after a
//! terminal one. Every operator in `rxop-core` is a [`Source`] that wraps an upstream `Source`.

use std::sync::Arc;

use crate::error::BoxError;

bitflags::bitflags! {
    /// Fusion modes negotiable between adjacent operators via [`FusedSource::request_fusion`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FusionMode: u8 {
        /// No fast path; fall back to the normal `on_next`/`request` protocol.
        const NONE = 0b00;
        /// Items are already available; the consumer drives `poll`/`is_empty` directly.
        const SYNC = 0b01;
        /// Items are delivered through a queue the upstream owns; `on_next` becomes a wake-up.
        const ASYNC = 0b10;
        /// Either `SYNC` or `ASYNC` is acceptable to the requester.
        const ANY = Self::SYNC.bits() | Self::ASYNC.bits();
    }
}

/// A handle from a `Source` back to a `Sink`, used to pull items and to cancel.
pub trait Subscription: Send + Sync {
    /// Requests `n` additional items. `n <= 0` is a protocol violation.
    fn request(&self, n: i64);

    /// Cancels the subscription. Idempotent.
    fn cancel(&self);
}

/// A [`Subscription`] extended with the fast-path fusion negotiation.
///
/// If `request_fusion` returns [`FusionMode::SYNC`], the caller must poll via
/// [`FusedSource::poll`]/[`FusedSource::is_empty`] instead of waiting for `on_next`; completion
/// is implicit when `poll` returns `None`. If it returns [`FusionMode::ASYNC`], `on_next` is
/// still called but only as a wake-up (the item argument is not the payload); the caller then
/// drains the shared queue via `poll`. [`FusionMode::NONE`] means fusion was declined.
pub trait FusedSource<T>: Subscription {
    /// Negotiates a fusion mode from the requested `mode_mask`.
    fn request_fusion(&self, mode_mask: FusionMode) -> FusionMode;

    /// Polls the next item. Returns `Ok(None)` to signal completion.
    ///
    /// Must not panic except to signal a fatal source failure (see
    /// [`crate::fatal::is_fatal`]); must not be called unless fusion negotiated `SYNC`.
    fn poll(&self) -> Result<Option<T>, BoxError>;

    /// `O(1)`, side-effect-free emptiness check. Only meaningful once `SYNC` fusion is active.
    fn is_empty(&self) -> bool;
}

/// A consumer of a stream: receives `on_subscribe` exactly once, then `on_next*`, then at most
/// one of `on_complete`/`on_error`.
///
/// All four methods are invoked non-reentrantly, in signal order, by whichever operator owns
/// the subscription; they may be called from different threads across calls; Sinks must not
/// block the calling thread across a downstream signal they forward.
pub trait Sink<T>: Send + Sync {
    /// Delivers the subscription. Always the first signal.
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>);

    /// Delivers one item. Never called after a terminal signal.
    fn on_next(&self, item: T);

    /// Delivers a terminal error. Never followed by further signals.
    fn on_error(&self, error: BoxError);

    /// Delivers terminal completion. Never followed by further signals.
    fn on_complete(&self);

    /// Offered by a fusion-capable upstream instead of `on_subscribe`, carrying a subscription
    /// that also supports `poll`/`is_empty`.
    ///
    /// The default declines fusion: it forwards `fused` to `on_subscribe` unchanged (upcast to
    /// a plain [`Subscription`]) and returns `false`. A sink that wants the fast path overrides
    /// this, negotiates a mode via `fused.request_fusion`, and if it accepts, stores `fused` for
    /// its own `poll`/`is_empty` access and returns `true` *without* calling `on_subscribe` (the
    /// caller must not call both).
    fn on_subscribe_fused(&self, fused: Arc<dyn FusedSource<T>>) -> bool {
        self.on_subscribe(fused);
        false
    }
}

/// A producer of a stream. `subscribe` is the only entry point.
pub trait Source<T>: Send + Sync {
    /// Subscribes `sink` to this source. Must call `sink.on_subscribe` before any other signal.
    fn subscribe(&self, sink: Arc<dyn Sink<T>>);
}
