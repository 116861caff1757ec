// SPDX-License-Identifier: Apache-2.0

//! Operator implementations built on the `rxop-channel` protocol: `Drop`, `SubscribeOn`, and the
//! `Publish` multicaster, plus the deferred-subscription helper they share.

pub mod deferred;
pub mod drop_operator;
pub mod error;
pub mod publish;
pub mod scheduler;
pub mod subscribe_on;

pub use deferred::DeferredSubscription;
pub use drop_operator::DropOperator;
pub use error::OperatorError;
pub use publish::PublishOperator;
pub use scheduler::{CancelHandle, Scheduler};
pub use subscribe_on::{SubscribeOn, SubscribeOnConfig};
