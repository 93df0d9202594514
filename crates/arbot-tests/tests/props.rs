//! Property tests driving the full runner + store stack with random
//! balances and elapsed times.

use std::sync::Arc;

use proptest::prelude::*;

use arbot_core::constants::{CYCLE_SECS, UNIT};
use arbot_core::traits::SettlementStore;
use arbot_core::types::UserId;
use arbot_engine::FixedClock;
use arbot_runner::MemoryStore;
use arbot_tests::helpers::{active_user, referred_user, runner_at, T0};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn settlement_conserves_balance(
        balance in 1u64..5_000 * UNIT,
        elapsed in 0u64..40 * CYCLE_SECS,
    ) {
        let store = Arc::new(MemoryStore::new());
        store.put_user(&active_user(1, balance)).unwrap();
        let runner = runner_at(store.clone(), Arc::new(FixedClock::at(T0 + elapsed)));

        let outcome = runner.run_for(UserId(1)).unwrap();
        let user = store.get_user(UserId(1)).unwrap().unwrap();

        prop_assert_eq!(user.balance, balance + user.total_profit);
        prop_assert_eq!(outcome.new_balance, user.balance);
        prop_assert_eq!(user.cycles_settled, outcome.cycles_applied);

        let records = store.cycle_records(UserId(1)).unwrap();
        prop_assert_eq!(records.len() as u64, outcome.cycles_applied);
        let recorded: u64 = records.iter().map(|r| r.profit_amount).sum();
        prop_assert_eq!(recorded, user.total_profit);

        // Replay at the same instant changes nothing.
        let again = runner.run_for(UserId(1)).unwrap();
        prop_assert_eq!(again.cycles_applied, 0);
        prop_assert_eq!(store.get_user(UserId(1)).unwrap().unwrap(), user);
    }

    #[test]
    fn referral_totals_match_share_records(
        balance in UNIT..2_000 * UNIT,
        cycles in 1u64..20,
    ) {
        let store = Arc::new(MemoryStore::new());
        store.put_user(&active_user(9, 0)).unwrap();
        store.put_user(&referred_user(1, balance, 9)).unwrap();
        let runner = runner_at(
            store.clone(),
            Arc::new(FixedClock::at(T0 + cycles * CYCLE_SECS)),
        );

        runner.run_for(UserId(1)).unwrap();

        let shares = store.referral_shares_for(UserId(9)).unwrap();
        let total: u64 = shares.iter().map(|s| s.amount).sum();
        let earner = store.get_user(UserId(9)).unwrap().unwrap();
        prop_assert_eq!(earner.total_referral_earnings, total);
        prop_assert_eq!(earner.balance, total);

        // At most one share per source cycle.
        let records = store.cycle_records(UserId(1)).unwrap();
        prop_assert!(shares.len() <= records.len());
        for share in &shares {
            prop_assert!(share.source_cycle_index < records.len() as u64);
        }
    }
}
