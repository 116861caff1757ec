// SPDX-License-Identifier: Apache-2.0

//! Saturating demand arithmetic shared by every operator's `request(n)` bookkeeping.

use std::sync::atomic::{AtomicI64, Ordering};

/// Sentinel demand value meaning "unbounded": once reached, further additions are no-ops and
/// per-emission decrements are skipped.
pub const UNBOUNDED: i64 = i64::MAX;

/// Returns `true` iff `n` is a legal `request(n)` argument.
///
/// The reactive-streams protocol requires `n > 0`; `n <= 0` is a protocol violation that the
/// caller must surface as `on_error(ProtocolError::NonPositiveRequest)`.
#[must_use]
pub fn validate(n: i64) -> bool {
    n > 0
}

/// Adds `n` to `curr`, saturating at [`UNBOUNDED`] on overflow.
#[must_use]
pub fn add_cap(curr: i64, n: i64) -> i64 {
    if curr == UNBOUNDED {
        return UNBOUNDED;
    }
    curr.checked_add(n).unwrap_or(UNBOUNDED).min(UNBOUNDED)
}

/// A non-negative, saturating demand counter backed by an atomic integer.
///
/// Mirrors the `AtomicLong`-based demand fields in the reactive-streams operators this crate is
/// modeled on: additions are a lock-free CAS loop, subtraction is skipped once the sentinel is
/// reached, and the counter never goes negative.
#[derive(Debug, Default)]
pub struct Demand(AtomicI64);

impl Demand {
    /// Creates a new demand counter at zero.
    #[must_use]
    pub fn new() -> Self {
        Self(AtomicI64::new(0))
    }

    /// Reads the current demand.
    #[must_use]
    pub fn get(&self) -> i64 {
        self.0.load(Ordering::Acquire)
    }

    /// Saturating-adds `n` to the demand and returns the value prior to the add.
    pub fn add(&self, n: i64) -> i64 {
        let mut curr = self.0.load(Ordering::Acquire);
        loop {
            let next = add_cap(curr, n);
            match self
                .0
                .compare_exchange_weak(curr, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(prev) => return prev,
                Err(observed) => curr = observed,
            }
        }
    }

    /// Subtracts `n` from the demand unless it is at the unbounded sentinel.
    pub fn subtract(&self, n: i64) {
        let mut curr = self.0.load(Ordering::Acquire);
        loop {
            if curr == UNBOUNDED {
                return;
            }
            let next = (curr - n).max(0);
            match self
                .0
                .compare_exchange_weak(curr, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return,
                Err(observed) => curr = observed,
            }
        }
    }

    /// Resets the demand to zero, used when a subscription terminates.
    pub fn clear(&self) {
        self.0.store(0, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_cap_saturates() {
        assert_eq!(add_cap(i64::MAX - 1, 5), UNBOUNDED);
        assert_eq!(add_cap(UNBOUNDED, 1), UNBOUNDED);
        assert_eq!(add_cap(3, 4), 7);
    }

    #[test]
    fn validate_rejects_non_positive() {
        assert!(validate(1));
        assert!(!validate(0));
        assert!(!validate(-1));
    }

    #[test]
    fn demand_add_and_subtract() {
        let d = Demand::new();
        d.add(3);
        assert_eq!(d.get(), 3);
        d.subtract(2);
        assert_eq!(d.get(), 1);
        d.subtract(5);
        assert_eq!(d.get(), 0);
    }

    #[test]
    fn demand_subtract_skipped_at_sentinel() {
        let d = Demand::new();
        d.add(UNBOUNDED);
        d.subtract(1_000);
        assert_eq!(d.get(), UNBOUNDED);
    }
}
