// SPDX-License-Identifier: Apache-2.0

//! Errors for the reactive-streams protocol layer.
//!
//! Important note: it is important not to use `!Send` data types in errors (e.g. avoid using
//! `Rc`) to ensure these errors can travel across the thread boundaries the operators are built
//! to tolerate.

use std::sync::Arc;

/// Type-erased error payload carried by `on_error`.
///
/// Operators box concrete error types (protocol violations, queue overflow, user-callback
/// failures) behind this alias so that downstream sinks only need to depend on
/// `std::error::Error`, not on every operator's concrete error enum.
pub type BoxError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Protocol violations observed by an operator on its downstream-facing `Subscription`.
#[derive(thiserror::Error, Debug, Clone, Copy)]
pub enum ProtocolError {
    /// `request(n)` was called with `n <= 0`.
    #[error("request(n) called with non-positive n = {n}")]
    NonPositiveRequest {
        /// The offending value passed to `request`.
        n: i64,
    },
}
