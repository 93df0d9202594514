//! Piecewise-linear profit curve over the fixed tier table.
//!
//! All computation uses integer arithmetic only: balances and profits are
//! cents (`u64`), intermediates are `u128`, and each derived quantity is
//! rounded half-up to whole cents exactly once. Re-deriving the same
//! quantity therefore always yields the same cents, which keeps settlement
//! replays idempotent.
//!
//! Below the first anchor the curve scales linearly from the origin
//! through that anchor; between anchors it interpolates linearly; at or
//! above the last anchor it extrapolates with the last anchor's
//! profit/balance ratio.

use arbot_core::constants::{CYCLES_PER_DAY, PROFIT_TIERS};
use arbot_core::traits::ProfitModel;

/// Divide with half-up rounding.
///
/// Max numerator here is balance * profit anchor, far inside u128.
fn round_div(num: u128, den: u128) -> u64 {
    ((num + den / 2) / den) as u64
}

/// The production profit curve backed by [`PROFIT_TIERS`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TierCurve;

impl TierCurve {
    /// Create a new TierCurve.
    pub fn new() -> Self {
        Self
    }

    /// Exact profit for `balance` as an unreduced fraction `num / den`,
    /// scaled for one day. Both callers divide (and round) from this so
    /// the per-cycle value is rounded from the exact curve, not from an
    /// already-rounded daily figure.
    fn daily_fraction(balance: u64) -> (u128, u128) {
        let b = balance as u128;
        let (b0, p0) = PROFIT_TIERS[0];
        let (bn, pn) = PROFIT_TIERS[PROFIT_TIERS.len() - 1];

        if balance < b0 {
            // Linear from the origin through the first anchor.
            return (b * p0 as u128, b0 as u128);
        }
        if balance >= bn {
            // Last anchor's ratio, extrapolated.
            return (b * pn as u128, bn as u128);
        }
        for w in PROFIT_TIERS.windows(2) {
            let (lo_b, lo_p) = w[0];
            let (hi_b, hi_p) = w[1];
            if balance < hi_b {
                let span = (hi_b - lo_b) as u128;
                let off = (balance - lo_b) as u128;
                let num = lo_p as u128 * span + (hi_p - lo_p) as u128 * off;
                return (num, span);
            }
        }
        unreachable!("tier windows cover [first, last)");
    }
}

impl ProfitModel for TierCurve {
    fn daily_profit(&self, balance: u64) -> u64 {
        if balance == 0 {
            return 0;
        }
        let (num, den) = Self::daily_fraction(balance);
        round_div(num, den)
    }

    fn cycle_profit(&self, balance: u64) -> u64 {
        if balance == 0 {
            return 0;
        }
        // Round the exact per-cycle value once.
        let (num, den) = Self::daily_fraction(balance);
        round_div(num, den * CYCLES_PER_DAY as u128)
    }
}
