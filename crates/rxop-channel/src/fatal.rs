// SPDX-License-Identifier: Apache-2.0

//! Fatal-vs-signallable panic classification.
//!
//! Rust has no exception hierarchy to pattern-match on the way the JVM does for
//! `OutOfMemoryError`/`ThreadDeath`; the closest analogue available to user code is a panic
//! payload. Operators that invoke user callbacks (`on_drop`, transforms, predicates) catch the
//! unwind and consult [`is_fatal`] to decide whether to resume unwinding on the calling thread
//! (matching "never wrapped; re-raised to the calling thread") or to convert the payload into an
//! `on_error` signal.

use std::any::Any;

/// Wraps a panic payload to mark it as fatal.
///
/// A user callback that wants its panic to bypass `on_error` conversion and propagate to the
/// calling thread unchanged should panic with a `FatalError` payload (directly, or by resuming
/// one it caught).
#[derive(Debug)]
pub struct FatalError(Box<dyn Any + Send>);

impl FatalError {
    /// Wraps an arbitrary payload as fatal.
    #[must_use]
    pub fn new(payload: Box<dyn Any + Send>) -> Self {
        Self(payload)
    }

    /// Unwraps back to the inner payload, for resuming the unwind.
    #[must_use]
    pub fn into_inner(self) -> Box<dyn Any + Send> {
        self.0
    }
}

/// Returns `true` if a caught panic payload is classified as fatal and must be re-raised rather
/// than converted into a live `on_error` signal.
#[must_use]
pub fn is_fatal(payload: &(dyn Any + Send)) -> bool {
    payload.is::<FatalError>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_fatal_error_payload() {
        let payload: Box<dyn Any + Send> = Box::new(FatalError::new(Box::new("boom")));
        assert!(is_fatal(&*payload));
    }

    #[test]
    fn classifies_ordinary_payload_as_non_fatal() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert!(!is_fatal(&*payload));
    }
}
