// SPDX-License-Identifier: Apache-2.0

//! Protocol types and low-level helpers shared by the `rxop` reactive-streams operators.
//!
//! This crate defines the [`Source`]/[`Sink`]/[`Subscription`] contract that every operator in
//! `rxop-core` implements, the optional [`FusedSource`] fast path, demand arithmetic with
//! saturation, the dropped-signals hook, and the bounded queue abstraction used as the publish
//! multicaster's prefetch buffer. It intentionally contains no operator logic.

pub mod demand;
pub mod dropped;
pub mod error;
pub mod fatal;
pub mod protocol;
pub mod queue;

pub use demand::Demand;
pub use dropped::{DroppedSignalSink, NoopDroppedSignals};
pub use error::{BoxError, ProtocolError};
pub use fatal::{is_fatal, FatalError};
pub use protocol::{FusedSource, FusionMode, Sink, Source, Subscription};
pub use queue::{BoundedQueue, QueueFactory, VecDequeQueue, VecDequeQueueFactory};
