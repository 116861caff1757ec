// SPDX-License-Identifier: Apache-2.0

//! Reference [`Scheduler`] implementations used by `SubscribeOn` tests and examples.

use std::sync::Arc;

use rxop_core::{CancelHandle, Scheduler};

/// Runs every scheduled task synchronously on the calling thread.
///
/// Since the task has always already run by the time `schedule` returns, the cancel handle it
/// hands back is permanently a no-op — mirroring the "already executed" scheduler many
/// reactive-streams test suites ship for exactly this purpose.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImmediateScheduler;

impl Scheduler for ImmediateScheduler {
    fn schedule(&self, task: Box<dyn FnOnce() + Send>) -> Arc<dyn CancelHandle> {
        task();
        Arc::new(NoopCancelHandle)
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct NoopCancelHandle;

impl CancelHandle for NoopCancelHandle {
    fn cancel(&self) {}
}

/// Spawns scheduled tasks onto a [`tokio::runtime::Handle`]. Cancellation calls
/// `JoinHandle::abort`.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: tokio::runtime::Handle,
}

impl TokioScheduler {
    /// Schedules onto `handle`.
    #[must_use]
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, task: Box<dyn FnOnce() + Send>) -> Arc<dyn CancelHandle> {
        let join = self.handle.spawn_blocking(task);
        Arc::new(TokioCancelHandle { join })
    }
}

struct TokioCancelHandle {
    join: tokio::task::JoinHandle<()>,
}

impl CancelHandle for TokioCancelHandle {
    fn cancel(&self) {
        self.join.abort();
    }
}
