//! End-to-end settlement flows over both store implementations.

use std::sync::Arc;

use arbot_core::constants::{BPS_PRECISION, CYCLE_SECS, REFERRAL_RATE_BPS, UNIT};
use arbot_core::traits::SettlementStore;
use arbot_core::types::UserId;
use arbot_engine::FixedClock;
use arbot_runner::{MemoryStore, RocksStore};
use arbot_tests::helpers::{active_user, referred_user, runner_at, T0};

#[test]
fn catch_up_after_downtime() {
    let store = Arc::new(MemoryStore::new());
    store.put_user(&active_user(1, 20 * UNIT)).unwrap();

    // 26 hours offline: 13 full cycles due at once.
    let clock = Arc::new(FixedClock::at(T0 + 26 * 3_600));
    let runner = runner_at(store.clone(), clock);

    let outcome = runner.run_for(UserId(1)).unwrap();
    assert_eq!(outcome.cycles_applied, 13);

    let user = store.get_user(UserId(1)).unwrap().unwrap();
    assert_eq!(user.cycles_settled, 13);
    assert_eq!(user.balance, 20 * UNIT + user.total_profit);
    assert_eq!(user.last_settled_at, Some(T0 + 13 * CYCLE_SECS));

    let records = store.cycle_records(UserId(1)).unwrap();
    assert_eq!(records.len(), 13);
    for (i, record) in records.iter().enumerate() {
        assert_eq!(record.cycle_index, i as u64);
        assert_eq!(record.window_end, record.window_start + CYCLE_SECS);
    }
    for pair in records.windows(2) {
        assert_eq!(pair[0].window_end, pair[1].window_start);
        // Compounding: each cycle starts from the previous balance plus profit.
        assert_eq!(
            pair[1].base_balance,
            pair[0].base_balance + pair[0].profit_amount
        );
    }
    let recorded_profit: u64 = records.iter().map(|r| r.profit_amount).sum();
    assert_eq!(recorded_profit, user.total_profit);

    // Nothing further due at the same instant.
    let again = runner.run_for(UserId(1)).unwrap();
    assert_eq!(again.cycles_applied, 0);
}

#[test]
fn stepwise_settlement_matches_single_shot() {
    let stepwise = Arc::new(MemoryStore::new());
    let single = Arc::new(MemoryStore::new());
    stepwise.put_user(&active_user(1, 99 * UNIT)).unwrap();
    single.put_user(&active_user(1, 99 * UNIT)).unwrap();

    let clock = Arc::new(FixedClock::at(T0));
    let runner = runner_at(stepwise.clone(), clock.clone());
    // Settle one cycle at a time across five boundaries.
    for _ in 0..5 {
        clock.advance(CYCLE_SECS);
        runner.run_for(UserId(1)).unwrap();
    }

    let runner = runner_at(single.clone(), Arc::new(FixedClock::at(T0 + 5 * CYCLE_SECS)));
    runner.run_for(UserId(1)).unwrap();

    assert_eq!(
        stepwise.get_user(UserId(1)).unwrap(),
        single.get_user(UserId(1)).unwrap()
    );
    assert_eq!(
        stepwise.cycle_records(UserId(1)).unwrap(),
        single.cycle_records(UserId(1)).unwrap()
    );
}

#[test]
fn referral_flow_consistent_across_stores() {
    let dir = tempfile::TempDir::new().unwrap();
    let memory = Arc::new(MemoryStore::new());
    let rocks = Arc::new(RocksStore::open(dir.path()).unwrap());

    let now = T0 + 3 * CYCLE_SECS;
    let seed = |store: &dyn SettlementStore| {
        store.put_user(&active_user(9, 100 * UNIT)).unwrap();
        store.put_user(&referred_user(1, 458 * UNIT, 9)).unwrap();
    };
    seed(memory.as_ref());
    seed(rocks.as_ref());

    runner_at(memory.clone(), Arc::new(FixedClock::at(now)))
        .run_for(UserId(1))
        .unwrap();
    runner_at(rocks.clone(), Arc::new(FixedClock::at(now)))
        .run_for(UserId(1))
        .unwrap();

    let mem_user = memory.get_user(UserId(1)).unwrap().unwrap();
    let rocks_user = rocks.get_user(UserId(1)).unwrap().unwrap();
    assert_eq!(mem_user, rocks_user);

    let mem_earner = memory.get_user(UserId(9)).unwrap().unwrap();
    let rocks_earner = rocks.get_user(UserId(9)).unwrap().unwrap();
    assert_eq!(mem_earner, rocks_earner);
    assert!(mem_earner.total_referral_earnings > 0);

    assert_eq!(
        memory.referral_shares_for(UserId(9)).unwrap(),
        rocks.referral_shares_for(UserId(9)).unwrap()
    );
}

#[test]
fn referral_share_is_twenty_percent_per_cycle() {
    let store = Arc::new(MemoryStore::new());
    store.put_user(&active_user(9, 0)).unwrap();
    store.put_user(&referred_user(1, 458 * UNIT, 9)).unwrap();

    let runner = runner_at(store.clone(), Arc::new(FixedClock::at(T0 + CYCLE_SECS)));
    runner.run_for(UserId(1)).unwrap();

    let records = store.cycle_records(UserId(1)).unwrap();
    let shares = store.referral_shares_for(UserId(9)).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(shares.len(), 1);
    let profit = records[0].profit_amount as u128;
    let expected =
        ((profit * REFERRAL_RATE_BPS as u128 + BPS_PRECISION as u128 / 2) / BPS_PRECISION as u128) as u64;
    assert_eq!(shares[0].amount, expected);
    assert_eq!(
        store
            .get_user(UserId(9))
            .unwrap()
            .unwrap()
            .total_referral_earnings,
        expected
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn sweep_is_idempotent_at_a_fixed_instant() {
    let store = Arc::new(MemoryStore::new());
    for id in 1..=10 {
        store.put_user(&active_user(id, id * 37 * UNIT)).unwrap();
    }
    let runner = runner_at(store.clone(), Arc::new(FixedClock::at(T0 + 4 * CYCLE_SECS)));

    let first = runner.run_for_all_active().await.unwrap();
    assert_eq!(first.users_processed, 10);
    assert_eq!(first.total_cycles_applied, 40);

    let second = runner.run_for_all_active().await.unwrap();
    assert_eq!(second.users_processed, 10);
    assert_eq!(second.total_cycles_applied, 0);
}

#[test]
fn rocks_state_survives_reopen_mid_history() {
    let dir = tempfile::TempDir::new().unwrap();

    {
        let store = Arc::new(RocksStore::open(dir.path()).unwrap());
        store.put_user(&active_user(1, 20 * UNIT)).unwrap();
        let runner = runner_at(store, Arc::new(FixedClock::at(T0 + 2 * CYCLE_SECS)));
        runner.run_for(UserId(1)).unwrap();
    }

    // Reopen and continue settling where the last process stopped.
    let store = Arc::new(RocksStore::open(dir.path()).unwrap());
    let runner = runner_at(store.clone(), Arc::new(FixedClock::at(T0 + 5 * CYCLE_SECS)));
    let outcome = runner.run_for(UserId(1)).unwrap();
    assert_eq!(outcome.cycles_applied, 3);

    let user = store.get_user(UserId(1)).unwrap().unwrap();
    assert_eq!(user.cycles_settled, 5);
    let records = store.cycle_records(UserId(1)).unwrap();
    assert_eq!(records.len(), 5);
    for (i, record) in records.iter().enumerate() {
        assert_eq!(record.cycle_index, i as u64);
    }
}

#[test]
fn balance_conservation_with_referrals() {
    let store = Arc::new(MemoryStore::new());
    store.put_user(&active_user(9, 50 * UNIT)).unwrap();
    store.put_user(&referred_user(1, 20 * UNIT, 9)).unwrap();
    store.put_user(&referred_user(2, 99 * UNIT, 9)).unwrap();

    let runner = runner_at(store.clone(), Arc::new(FixedClock::at(T0 + 6 * CYCLE_SECS)));
    runner.run_for(UserId(1)).unwrap();
    runner.run_for(UserId(2)).unwrap();
    runner.run_for(UserId(9)).unwrap();

    // Every user's balance decomposes into seed + own profit + referral
    // credits, with nothing lost or double-counted.
    for (id, seed) in [(1u64, 20 * UNIT), (2, 99 * UNIT), (9, 50 * UNIT)] {
        let user = store.get_user(UserId(id)).unwrap().unwrap();
        assert_eq!(
            user.balance,
            seed + user.total_profit + user.total_referral_earnings,
            "conservation violated for u{id}"
        );
    }
}
