// SPDX-License-Identifier: Apache-2.0

//! The abstract scheduler contract consumed by [`crate::subscribe_on`].
//!
//! `rxop-core` only defines the contract; concrete schedulers (an immediate/inline one and a
//! `tokio`-backed one) live in `rxop-testing` as external collaborators, not library-grade
//! schedulers.

use std::sync::Arc;

/// A best-effort, idempotent cancellation handle for one scheduled task.
pub trait CancelHandle: Send + Sync {
    /// Cancels the task if it has not already run. Calling this more than once, or after the
    /// task has already completed, is a no-op.
    fn cancel(&self);
}

/// A scheduler runs a boxed task at most once and returns a handle to cancel it before it does.
pub trait Scheduler: Send + Sync {
    /// Schedules `task` to run at most once, returning a handle that best-effort cancels it.
    fn schedule(&self, task: Box<dyn FnOnce() + Send>) -> Arc<dyn CancelHandle>;
}
