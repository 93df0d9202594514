//! In-memory settlement store.
//!
//! Reference implementation of [`SettlementStore`] backed by a single
//! `RwLock`. Used by tests and by deployments that rebuild state from an
//! upstream system of record on startup. The write lock makes every
//! commit atomic and serialized; the RocksDB store reproduces the same
//! semantics with finer-grained locking.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use tracing::warn;

use arbot_core::error::StoreError;
use arbot_core::traits::SettlementStore;
use arbot_core::types::{CycleRecord, ReferralShareRecord, SettlementPlan, UserId, UserSnapshot};

#[derive(Default)]
struct Inner {
    users: BTreeMap<UserId, UserSnapshot>,
    /// Keyed by (user, cycle_index); the map enforces uniqueness.
    cycles: BTreeMap<(UserId, u64), CycleRecord>,
    /// Keyed by (earner, source, source_cycle_index).
    shares: BTreeMap<(UserId, UserId, u64), ReferralShareRecord>,
}

/// In-memory [`SettlementStore`].
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettlementStore for MemoryStore {
    fn get_user(&self, id: UserId) -> Result<Option<UserSnapshot>, StoreError> {
        Ok(self.inner.read().users.get(&id).cloned())
    }

    fn put_user(&self, snapshot: &UserSnapshot) -> Result<(), StoreError> {
        self.inner
            .write()
            .users
            .insert(snapshot.id, snapshot.clone());
        Ok(())
    }

    fn eligible_user_ids(&self) -> Result<Vec<UserId>, StoreError> {
        Ok(self
            .inner
            .read()
            .users
            .values()
            .filter(|u| u.is_eligible())
            .map(|u| u.id)
            .collect())
    }

    fn apply_settlement(
        &self,
        snapshot: &UserSnapshot,
        plan: &SettlementPlan,
    ) -> Result<(), StoreError> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;

        let stored = inner
            .users
            .get(&snapshot.id)
            .ok_or(StoreError::UserNotFound(snapshot.id))?;

        // Freshness: another invocation may have settled since the plan
        // was computed.
        if stored.last_settled_at != snapshot.last_settled_at
            || stored.cycles_settled != snapshot.cycles_settled
        {
            return Err(StoreError::StaleSnapshot(snapshot.id));
        }

        for record in &plan.cycle_records {
            if inner
                .cycles
                .contains_key(&(record.user_id, record.cycle_index))
            {
                return Err(StoreError::DuplicateCycle {
                    user: record.user_id,
                    index: record.cycle_index,
                });
            }
        }

        // All checks passed; everything below is infallible, so the
        // commit is all-or-nothing under the write lock.
        let user = inner
            .users
            .get_mut(&snapshot.id)
            .ok_or(StoreError::UserNotFound(snapshot.id))?;
        user.balance = plan.final_balance;
        user.total_profit = user
            .total_profit
            .checked_add(plan.total_profit_delta)
            .expect("lifetime profit overflows u64 cents");
        user.last_settled_at = Some(plan.new_last_settled_at);
        user.cycles_settled += plan.cycles_due;

        for record in &plan.cycle_records {
            inner
                .cycles
                .insert((record.user_id, record.cycle_index), record.clone());
        }

        for (earner, amount) in plan.referral_totals() {
            // A user is never their own referrer; crediting the settling
            // row here would collide with the update above.
            if earner == snapshot.id {
                warn!(%earner, amount, "self-referral share dropped");
                continue;
            }
            match inner.users.get_mut(&earner) {
                Some(row) => {
                    row.balance = row
                        .balance
                        .checked_add(amount)
                        .expect("referrer balance overflows u64 cents");
                    row.total_referral_earnings = row
                        .total_referral_earnings
                        .checked_add(amount)
                        .expect("referral earnings overflow u64 cents");
                    for share in plan.referral_shares.iter().filter(|s| s.earner_id == earner) {
                        inner.shares.insert(
                            (share.earner_id, share.source_user_id, share.source_cycle_index),
                            share.clone(),
                        );
                    }
                }
                None => {
                    // No credit, no record: the share is dropped whole.
                    warn!(%earner, source = %snapshot.id, amount, "referrer row missing, dropping share");
                }
            }
        }

        Ok(())
    }

    fn cycle_records(&self, id: UserId) -> Result<Vec<CycleRecord>, StoreError> {
        Ok(self
            .inner
            .read()
            .cycles
            .range((id, 0)..=(id, u64::MAX))
            .map(|(_, r)| r.clone())
            .collect())
    }

    fn referral_shares_for(&self, earner: UserId) -> Result<Vec<ReferralShareRecord>, StoreError> {
        Ok(self
            .inner
            .read()
            .shares
            .range((earner, UserId(0), 0)..=(earner, UserId(u64::MAX), u64::MAX))
            .map(|(_, s)| s.clone())
            .collect())
    }
}
