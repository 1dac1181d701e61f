//! Admission guard.
//!
//! Rejects new requests when too many handlers are already in flight.
//!
//! This is a best-effort gate, not a semaphore:
//! - Every handler registers itself first (RAII ticket)
//! - It then samples the live count and compares it against the limit
//! - No slot is reserved, so a burst of simultaneous arrivals can briefly
//!   over-admit
//!
//! A limit of zero or below disables the check entirely.

use crate::metrics::registry::METRICS;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Live count of request handlers.
#[derive(Debug, Default)]
pub struct AdmissionGuard {
    in_flight: AtomicUsize,
}

impl AdmissionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the calling handler as in flight.
    ///
    /// The returned ticket must live for the whole handler; its Drop
    /// deregisters, including on early return or panic unwinding.
    pub fn enter(&self) -> InFlightTicket<'_> {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        METRICS.inc_inflight();
        InFlightTicket { guard: self }
    }

    /// Sample the live count against `limit`.
    ///
    /// Strictly greater-than: with limit N, N concurrent handlers are fine.
    pub fn check(&self, limit: i64) -> Result<(), Rejection> {
        if limit <= 0 {
            return Ok(());
        }

        let in_flight = self.in_flight();
        if in_flight as u64 > limit as u64 {
            return Err(Rejection { limit, in_flight });
        }
        Ok(())
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    fn release(&self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
        METRICS.dec_inflight();
    }
}

/// RAII registration of one in-flight handler.
pub struct InFlightTicket<'a> {
    guard: &'a AdmissionGuard,
}

impl Drop for InFlightTicket<'_> {
    fn drop(&mut self) {
        self.guard.release();
    }
}

/// A refused request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejection {
    pub limit: i64,
    pub in_flight: usize,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hit the in-flight request limit of: {}", self.limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticket_registers_and_releases() {
        let guard = AdmissionGuard::new();
        {
            let _a = guard.enter();
            let _b = guard.enter();
            assert_eq!(guard.in_flight(), 2);
        }
        assert_eq!(guard.in_flight(), 0);
    }

    #[test]
    fn test_zero_limit_never_rejects() {
        let guard = AdmissionGuard::new();
        let tickets: Vec<_> = (0..500).map(|_| guard.enter()).collect();

        assert!(guard.check(0).is_ok());
        assert!(guard.check(-1).is_ok());
        drop(tickets);
    }

    #[test]
    fn test_limit_is_strict_greater_than() {
        let guard = AdmissionGuard::new();
        let _a = guard.enter();
        let _b = guard.enter();

        assert!(guard.check(2).is_ok());

        let _c = guard.enter();
        let rejection = guard.check(2).unwrap_err();
        assert_eq!(rejection, Rejection { limit: 2, in_flight: 3 });
    }

    #[test]
    fn test_rejection_names_limit() {
        let rejection = Rejection { limit: 4, in_flight: 9 };
        assert_eq!(rejection.to_string(), "Hit the in-flight request limit of: 4");
    }

    #[test]
    fn test_admission_recovers_after_release() {
        let guard = AdmissionGuard::new();
        let first = guard.enter();
        let second = guard.enter();
        assert!(guard.check(1).is_err());

        drop(second);
        assert!(guard.check(1).is_ok());
        drop(first);
    }
}
