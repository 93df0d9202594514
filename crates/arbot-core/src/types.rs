//! Settlement data model: user snapshots, cycle records, referral shares.
//!
//! All monetary values are in cents (see [`crate::constants::UNIT`]).
//! All timestamps are Unix seconds as `u64`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque user identifier.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct UserId(pub u64);

impl UserId {
    /// Big-endian key bytes, used by ordered storage keys.
    pub fn to_be_bytes(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    /// Decode from big-endian key bytes.
    pub fn from_be_bytes(bytes: [u8; 8]) -> Self {
        Self(u64::from_be_bytes(bytes))
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "u{}", self.0)
    }
}

impl From<u64> for UserId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// A user's settlement-relevant state, as read inside a commit.
///
/// `last_settled_at` marks the end of the most recently processed cycle
/// window; `None` means the user has never settled and the reference
/// timestamp falls back to `bot_activated_at`. `cycles_settled` counts the
/// cycle records ever produced for this user and seeds the next
/// `cycle_index`.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct UserSnapshot {
    pub id: UserId,
    /// Current balance in cents. The single quantity compounded by settlement.
    pub balance: u64,
    /// Lifetime profit credited by settlement, in cents.
    pub total_profit: u64,
    /// Lifetime referral earnings credited to this user, in cents.
    pub total_referral_earnings: u64,
    /// End of the last fully processed cycle window (Unix seconds).
    pub last_settled_at: Option<u64>,
    /// When the bot license was activated (Unix seconds). Fallback reference.
    pub bot_activated_at: u64,
    /// The user who referred this one, if any. Immutable once set.
    pub referred_by: Option<UserId>,
    /// Settlement is a no-op while false.
    pub bot_active: bool,
    /// Number of cycle records ever produced for this user.
    pub cycles_settled: u64,
}

impl UserSnapshot {
    /// The reference timestamp settlement replays from.
    pub fn settlement_reference(&self) -> u64 {
        self.last_settled_at.unwrap_or(self.bot_activated_at)
    }

    /// Whether this user is eligible for settlement at all.
    pub fn is_eligible(&self) -> bool {
        self.bot_active && self.balance > 0
    }
}

/// One settled profit cycle. Append-only audit record.
///
/// For a given user, windows are contiguous and non-overlapping:
/// `window_end` of cycle `n` equals `window_start` of cycle `n + 1`, and
/// `window_end - window_start` is always the fixed cycle duration.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct CycleRecord {
    pub user_id: UserId,
    /// Monotonically increasing per user, starting at 0.
    pub cycle_index: u64,
    /// Window start (Unix seconds).
    pub window_start: u64,
    /// Window end (Unix seconds). Always `window_start + CYCLE_SECS`.
    pub window_end: u64,
    /// Balance at the start of this cycle, in cents.
    pub base_balance: u64,
    /// Profit credited for this cycle, in cents.
    pub profit_amount: u64,
}

/// A referral share routed to a referrer for one source cycle.
/// Created at most once per `(source_user_id, source_cycle_index)`.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct ReferralShareRecord {
    /// The referrer receiving the share.
    pub earner_id: UserId,
    /// The settling user whose cycle generated the share.
    pub source_user_id: UserId,
    /// The cycle the share derives from.
    pub source_cycle_index: u64,
    /// Share amount in cents.
    pub amount: u64,
}

/// The full batch of outcomes due for one user, computed purely in memory.
///
/// Produced by the settlement ledger and persisted by the runner in one
/// atomic unit. A plan with `cycles_due == 0` carries no state changes.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SettlementPlan {
    pub user_id: UserId,
    /// Number of cycles actually recorded in this plan.
    pub cycles_due: u64,
    /// Balance after compounding all recorded cycles, in cents.
    pub final_balance: u64,
    /// Sum of all recorded cycle profits, in cents.
    pub total_profit_delta: u64,
    /// New settlement marker: end of the last recorded window.
    pub new_last_settled_at: u64,
    pub cycle_records: Vec<CycleRecord>,
    pub referral_shares: Vec<ReferralShareRecord>,
}

impl SettlementPlan {
    /// A zero-effect plan: nothing to persist.
    pub fn noop(user: &UserSnapshot) -> Self {
        Self {
            user_id: user.id,
            cycles_due: 0,
            final_balance: user.balance,
            total_profit_delta: 0,
            new_last_settled_at: user.settlement_reference(),
            cycle_records: Vec::new(),
            referral_shares: Vec::new(),
        }
    }

    /// Whether this plan changes any state.
    pub fn is_noop(&self) -> bool {
        self.cycles_due == 0
    }

    /// Referral shares aggregated per distinct earner, ordered by earner id.
    ///
    /// Stores credit each referrer once per commit from this aggregation
    /// rather than once per share record.
    pub fn referral_totals(&self) -> Vec<(UserId, u64)> {
        let mut totals: BTreeMap<UserId, u64> = BTreeMap::new();
        for share in &self.referral_shares {
            *totals.entry(share.earner_id).or_insert(0) += share.amount;
        }
        totals.into_iter().collect()
    }
}

/// Result of settling one user.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct SettlementOutcome {
    /// Cycles applied by this invocation (0 when nothing was due).
    pub cycles_applied: u64,
    /// Profit credited by this invocation, in cents.
    pub profit_added: u64,
    /// The user's balance after the commit, in cents.
    pub new_balance: u64,
}

impl SettlementOutcome {
    /// Outcome for an invocation that found nothing to do.
    pub fn unchanged(balance: u64) -> Self {
        Self {
            cycles_applied: 0,
            profit_added: 0,
            new_balance: balance,
        }
    }
}

/// Result of a full sweep over eligible users.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct BatchOutcome {
    pub users_processed: u64,
    pub users_failed: u64,
    pub total_cycles_applied: u64,
}
