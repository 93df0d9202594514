//! Trait interfaces for the settlement engine.
//!
//! These traits define the contracts between crates:
//! - [`ProfitModel`] — profit curve math (arbot-engine implements)
//! - [`Clock`] — injectable wall clock (arbot-engine provides impls)
//! - [`SettlementStore`] — transactional persistence (arbot-runner implements)

use crate::constants::CYCLES_PER_DAY;
use crate::error::StoreError;
use crate::types::{CycleRecord, ReferralShareRecord, SettlementPlan, UserId, UserSnapshot};

/// Pure mapping from a balance to profit amounts.
///
/// Total (defined for every balance) and monotonically non-decreasing in
/// balance. All amounts in cents. Implemented by the tier curve in
/// arbot-engine.
pub trait ProfitModel: Send + Sync {
    /// Daily profit for the given balance, in cents.
    fn daily_profit(&self, balance: u64) -> u64;

    /// Per-cycle profit for the given balance, in cents.
    ///
    /// Default implementation divides the (already rounded) daily profit by
    /// the cycle count with half-up rounding. Production curves override
    /// this to round the exact per-cycle value once instead.
    fn cycle_profit(&self, balance: u64) -> u64 {
        let daily = self.daily_profit(balance);
        (daily + CYCLES_PER_DAY / 2) / CYCLES_PER_DAY
    }
}

/// Injectable time source. No wall-clock calls are buried in the ledger;
/// the runner reads `now` once per invocation through this seam.
pub trait Clock: Send + Sync {
    /// Current time as Unix seconds.
    fn now_unix(&self) -> u64;
}

/// Transactional persistence collaborator.
///
/// `apply_settlement` is the atomic unit: it must persist the plan's cycle
/// records and referral shares, update the settling user's balance,
/// `total_profit`, `last_settled_at`, and `cycles_settled`, and credit
/// each distinct referrer's balance and `total_referral_earnings` from
/// [`SettlementPlan::referral_totals`] — all or nothing. Before writing,
/// it must re-check that the stored user still matches `snapshot` on
/// `(last_settled_at, cycles_settled)` and fail with
/// [`StoreError::StaleSnapshot`] otherwise; `(user_id, cycle_index)` must
/// be unique across all committed cycle records.
pub trait SettlementStore: Send + Sync {
    /// Load a user's current snapshot. Returns `None` if unknown.
    fn get_user(&self, id: UserId) -> Result<Option<UserSnapshot>, StoreError>;

    /// Insert or replace a user row. Seeding/administration only; never
    /// called by the runner during settlement.
    fn put_user(&self, snapshot: &UserSnapshot) -> Result<(), StoreError>;

    /// Ids of users with `bot_active` and a positive balance, in id order.
    fn eligible_user_ids(&self) -> Result<Vec<UserId>, StoreError>;

    /// Atomically commit a settlement plan computed against `snapshot`.
    fn apply_settlement(
        &self,
        snapshot: &UserSnapshot,
        plan: &SettlementPlan,
    ) -> Result<(), StoreError>;

    /// All cycle records for a user, ordered by cycle index.
    fn cycle_records(&self, id: UserId) -> Result<Vec<CycleRecord>, StoreError>;

    /// All referral shares earned by a user, ordered by (source, cycle).
    fn referral_shares_for(&self, earner: UserId) -> Result<Vec<ReferralShareRecord>, StoreError>;
}
