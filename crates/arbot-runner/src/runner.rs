//! The settlement runner: per-user commit loop and full sweeps.
//!
//! [`SettlementRunner`] glues the pure ledger to a [`SettlementStore`].
//! `run_for` settles one user with optimistic retries: compute a plan
//! against a snapshot, try to commit, and on a benign conflict (another
//! invocation won the race) re-read and recompute. The loser of a race
//! finds nothing left to do and returns an unchanged outcome, which is
//! what makes concurrent triggers safe.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use arbot_core::error::RunnerError;
use arbot_core::traits::{Clock, ProfitModel, SettlementStore};
use arbot_core::types::{BatchOutcome, SettlementOutcome, UserId};
use arbot_engine::SettlementLedger;

use crate::config::RunnerConfig;

/// Drives settlement against a store.
///
/// Cheap to clone; clones share the store, clock, and cancellation flag.
pub struct SettlementRunner<S> {
    store: Arc<S>,
    ledger: SettlementLedger,
    clock: Arc<dyn Clock>,
    config: RunnerConfig,
    cancelled: Arc<AtomicBool>,
}

impl<S> Clone for SettlementRunner<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            ledger: self.ledger.clone(),
            clock: Arc::clone(&self.clock),
            config: self.config.clone(),
            cancelled: Arc::clone(&self.cancelled),
        }
    }
}

impl<S: SettlementStore + 'static> SettlementRunner<S> {
    /// Create a runner over `store` using `model` for profit math.
    pub fn new(
        store: Arc<S>,
        model: Arc<dyn ProfitModel>,
        clock: Arc<dyn Clock>,
        config: RunnerConfig,
    ) -> Self {
        Self {
            store,
            ledger: SettlementLedger::new(model),
            clock,
            config,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The underlying store, for seeding and read paths.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Shared flag that stops an in-progress sweep between users.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Settle all cycles currently due for one user.
    ///
    /// Safe to call from any trigger (sweep, page load, admin) at any
    /// time: when nothing is due, or a concurrent invocation settles
    /// first, the outcome reports zero cycles applied.
    pub fn run_for(&self, id: UserId) -> Result<SettlementOutcome, RunnerError> {
        for attempt in 1..=self.config.max_commit_attempts {
            let user = self
                .store
                .get_user(id)?
                .ok_or(RunnerError::UserNotFound(id))?;
            let now = self.clock.now_unix();
            let plan = self.ledger.settle(&user, now);

            if plan.is_noop() {
                return Ok(SettlementOutcome::unchanged(user.balance));
            }

            match self.store.apply_settlement(&user, &plan) {
                Ok(()) => {
                    info!(
                        user = %id,
                        cycles = plan.cycles_due,
                        profit = plan.total_profit_delta,
                        balance = plan.final_balance,
                        "settlement committed"
                    );
                    return Ok(SettlementOutcome {
                        cycles_applied: plan.cycles_due,
                        profit_added: plan.total_profit_delta,
                        new_balance: plan.final_balance,
                    });
                }
                Err(err) if err.is_benign_conflict() => {
                    debug!(user = %id, attempt, %err, "lost settlement race, re-reading");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(RunnerError::Contended {
            user: id,
            attempts: self.config.max_commit_attempts,
        })
    }

    /// Sweep every eligible user, settling up to `max_concurrency` users
    /// at a time. One user's failure never aborts the sweep; failures are
    /// counted and logged.
    pub async fn run_for_all_active(&self) -> Result<BatchOutcome, RunnerError> {
        let ids = self.store.eligible_user_ids()?;
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency));
        let mut handles = Vec::with_capacity(ids.len());

        for id in ids {
            if self.cancelled.load(Ordering::SeqCst) {
                info!("sweep cancelled, stopping before {id}");
                break;
            }
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .expect("semaphore never closed");
            let runner = self.clone();
            handles.push((
                id,
                tokio::task::spawn_blocking(move || {
                    let outcome = runner.run_for(id);
                    drop(permit);
                    outcome
                }),
            ));
        }

        let mut batch = BatchOutcome::default();
        for (id, handle) in handles {
            match handle.await.expect("settlement task panicked") {
                Ok(outcome) => {
                    batch.users_processed += 1;
                    batch.total_cycles_applied += outcome.cycles_applied;
                }
                Err(err) => {
                    batch.users_failed += 1;
                    warn!(user = %id, %err, "settlement failed during sweep");
                }
            }
        }
        Ok(batch)
    }
}
