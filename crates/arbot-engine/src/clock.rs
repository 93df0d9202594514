//! Cycle window arithmetic and clock implementations.
//!
//! [`elapsed_cycles`] is the single place cycle counting happens: callers
//! pass a reference timestamp (never a default — resolving an absent
//! `last_settled_at` to the activation timestamp is the caller's job) and
//! get back the number of fully elapsed cycles plus the end of the last
//! completed window.

use std::sync::atomic::{AtomicU64, Ordering};

use arbot_core::constants::CYCLE_SECS;
use arbot_core::traits::Clock;

/// Number of fully elapsed cycles between `reference` and `now`, and the
/// timestamp marking the end of the last completed cycle.
///
/// Returns `(0, reference)` when no full cycle has elapsed yet — the
/// common case on every page load between cycles, not an error.
///
/// # Panics
///
/// Panics if `now` precedes `reference`; a backwards clock is a contract
/// violation, not a recoverable condition.
pub fn elapsed_cycles(reference: u64, now: u64) -> (u64, u64) {
    assert!(
        now >= reference,
        "now ({now}) precedes settlement reference ({reference})"
    );
    let count = (now - reference) / CYCLE_SECS;
    (count, reference + count * CYCLE_SECS)
}

/// Wall clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Create a new SystemClock.
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now_unix(&self) -> u64 {
        // Pre-1970 system clocks are not supported.
        chrono::Utc::now().timestamp() as u64
    }
}

/// Deterministic clock for tests: starts at a fixed instant and only
/// moves when explicitly advanced.
#[derive(Debug, Default)]
pub struct FixedClock {
    now: AtomicU64,
}

impl FixedClock {
    /// Create a clock stopped at `now` (Unix seconds).
    pub fn at(now: u64) -> Self {
        Self {
            now: AtomicU64::new(now),
        }
    }

    /// Advance the clock by `secs`.
    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }

    /// Jump the clock to an absolute instant.
    pub fn set(&self, now: u64) {
        self.now.store(now, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now_unix(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const T0: u64 = 1_700_000_000;

    #[test]
    fn zero_cycles_before_first_boundary() {
        assert_eq!(elapsed_cycles(T0, T0), (0, T0));
        assert_eq!(elapsed_cycles(T0, T0 + 1), (0, T0));
        assert_eq!(elapsed_cycles(T0, T0 + CYCLE_SECS - 1), (0, T0));
    }

    #[test]
    fn one_cycle_at_exact_boundary() {
        assert_eq!(elapsed_cycles(T0, T0 + CYCLE_SECS), (1, T0 + CYCLE_SECS));
    }

    #[test]
    fn partial_cycle_beyond_boundary_floors() {
        let (count, end) = elapsed_cycles(T0, T0 + CYCLE_SECS + 300);
        assert_eq!(count, 1);
        assert_eq!(end, T0 + CYCLE_SECS);
    }

    #[test]
    fn twenty_six_hours_is_thirteen_cycles() {
        let (count, end) = elapsed_cycles(T0, T0 + 26 * 3_600);
        assert_eq!(count, 13);
        assert_eq!(end, T0 + 13 * CYCLE_SECS);
    }

    #[test]
    #[should_panic(expected = "precedes settlement reference")]
    fn backwards_clock_panics() {
        elapsed_cycles(T0, T0 - 1);
    }

    #[test]
    fn fixed_clock_advances() {
        let clock = FixedClock::at(T0);
        assert_eq!(clock.now_unix(), T0);
        clock.advance(CYCLE_SECS);
        assert_eq!(clock.now_unix(), T0 + CYCLE_SECS);
        clock.set(42);
        assert_eq!(clock.now_unix(), 42);
    }

    #[test]
    fn system_clock_is_past_2023() {
        assert!(SystemClock::new().now_unix() > T0);
    }

    // --- proptest ---

    proptest! {
        #[test]
        fn count_and_window_consistent(
            reference in 0u64..4_000_000_000,
            delta in 0u64..10_000_000,
        ) {
            let now = reference + delta;
            let (count, end) = elapsed_cycles(reference, now);
            prop_assert_eq!(end, reference + count * CYCLE_SECS);
            prop_assert!(end <= now);
            // Fewer than one full cycle remains past the window end.
            prop_assert!(now - end < CYCLE_SECS);
        }
    }
}
