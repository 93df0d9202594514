//! The settlement ledger: pure replay of elapsed profit cycles.
//!
//! Given a user snapshot and `now`, [`SettlementLedger::settle`] computes
//! the complete batch of cycle outcomes due — compounded profit per
//! window, referral shares, and the advanced settlement marker — as a
//! [`SettlementPlan`] value. It performs no I/O; the runner owns
//! persistence and atomicity.
//!
//! Zero-profit policy: iteration stops at the first window whose rounded
//! profit is zero. The curve is monotone and the balance only grows inside
//! a batch, so once a window rounds to zero every later window in the
//! batch would too. The marker advances only through the windows actually
//! recorded, so a dust balance recomputes the same zero-effect plan on
//! every call instead of fabricating empty audit rows.

use std::sync::Arc;

use tracing::trace;

use arbot_core::constants::{BPS_PRECISION, CYCLE_SECS, REFERRAL_RATE_BPS};
use arbot_core::traits::ProfitModel;
use arbot_core::types::{CycleRecord, ReferralShareRecord, SettlementPlan, UserSnapshot};

/// Referral share for one cycle's profit, rounded half-up to cents.
fn referral_share(profit: u64) -> u64 {
    ((profit as u128 * REFERRAL_RATE_BPS as u128 + BPS_PRECISION as u128 / 2)
        / BPS_PRECISION as u128) as u64
}

/// Pure computation of settlement plans over an injected profit model.
#[derive(Clone)]
pub struct SettlementLedger {
    model: Arc<dyn ProfitModel>,
}

impl SettlementLedger {
    /// Create a ledger over the given profit model.
    pub fn new(model: Arc<dyn ProfitModel>) -> Self {
        Self { model }
    }

    /// Compute the batch of cycle outcomes due for `user` as of `now`.
    ///
    /// Inactive users, zero balances, and not-yet-elapsed cycles all
    /// produce a zero-effect plan — the steady-state "nothing to do yet"
    /// path, not a failure.
    ///
    /// # Panics
    ///
    /// Panics if `now` precedes the user's settlement reference, or if
    /// compounding overflows `u64` cents. Both are contract violations.
    pub fn settle(&self, user: &UserSnapshot, now: u64) -> SettlementPlan {
        if !user.is_eligible() {
            return SettlementPlan::noop(user);
        }

        let reference = user.settlement_reference();
        let (count, _) = crate::clock::elapsed_cycles(reference, now);
        if count == 0 {
            return SettlementPlan::noop(user);
        }

        let mut running = user.balance;
        let mut cycle_records = Vec::new();
        let mut referral_shares = Vec::new();

        for i in 0..count {
            let profit = self.model.cycle_profit(running);
            if profit == 0 {
                // Monotone curve: zero stays zero for the rest of the batch.
                break;
            }

            let window_start = reference + i * CYCLE_SECS;
            let cycle_index = user.cycles_settled + i;
            cycle_records.push(CycleRecord {
                user_id: user.id,
                cycle_index,
                window_start,
                window_end: window_start + CYCLE_SECS,
                base_balance: running,
                profit_amount: profit,
            });

            running = running
                .checked_add(profit)
                .expect("compounded balance overflows u64 cents");

            if let Some(earner) = user.referred_by {
                let share = referral_share(profit);
                if share > 0 {
                    referral_shares.push(ReferralShareRecord {
                        earner_id: earner,
                        source_user_id: user.id,
                        source_cycle_index: cycle_index,
                        amount: share,
                    });
                }
            }
        }

        let produced = cycle_records.len() as u64;
        if produced == 0 {
            // Every due window rounded to zero profit (dust balance).
            return SettlementPlan::noop(user);
        }

        trace!(
            user = %user.id,
            cycles_elapsed = count,
            cycles_recorded = produced,
            profit = running - user.balance,
            "settlement plan computed"
        );

        SettlementPlan {
            user_id: user.id,
            cycles_due: produced,
            final_balance: running,
            total_profit_delta: running - user.balance,
            new_last_settled_at: reference + produced * CYCLE_SECS,
            cycle_records,
            referral_shares,
        }
    }
}
