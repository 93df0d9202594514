//! Shared test helpers for E2E and concurrency tests.

use std::sync::Arc;

use arbot_core::traits::SettlementStore;
use arbot_core::types::{UserId, UserSnapshot};
use arbot_engine::{FixedClock, TierCurve};
use arbot_runner::{RunnerConfig, SettlementRunner};

/// Baseline instant for deterministic clocks.
pub const T0: u64 = 1_700_000_000;

/// A fresh active user, never settled, activated at [`T0`].
pub fn active_user(id: u64, balance: u64) -> UserSnapshot {
    UserSnapshot {
        id: UserId(id),
        balance,
        total_profit: 0,
        total_referral_earnings: 0,
        last_settled_at: None,
        bot_activated_at: T0,
        referred_by: None,
        bot_active: true,
        cycles_settled: 0,
    }
}

/// An active user referred by `referrer`.
pub fn referred_user(id: u64, balance: u64, referrer: u64) -> UserSnapshot {
    UserSnapshot {
        referred_by: Some(UserId(referrer)),
        ..active_user(id, balance)
    }
}

/// A runner over `store` with a deterministic clock stopped at `now`.
pub fn runner_at<S: SettlementStore + 'static>(
    store: Arc<S>,
    clock: Arc<FixedClock>,
) -> SettlementRunner<S> {
    SettlementRunner::new(
        store,
        Arc::new(TierCurve::new()),
        clock,
        RunnerConfig::default(),
    )
}
