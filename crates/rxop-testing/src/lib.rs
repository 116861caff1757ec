// SPDX-License-Identifier: Apache-2.0

//! Test collaborators for the `rxop` operator suite: a recording sink, controllable and fused
//! sources, a recording dropped-signals hook, and the two reference schedulers `SubscribeOn`
//! examples and tests are built against.
//!
//! Mirrors the shape of a dataflow engine's own `testing` module: the production crates depend
//! on nothing here, this crate depends on both.

pub mod dropped;
pub mod scheduler;
pub mod sink;
pub mod source;

pub use dropped::RecordingDroppedSignals;
pub use scheduler::{ImmediateScheduler, TokioScheduler};
pub use sink::{RecordedSignal, RecordingSink};
pub use source::{ManualSource, SyncFusedSource};
