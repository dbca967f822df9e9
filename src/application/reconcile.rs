use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::domain::{net_effect, AccountId};
use crate::storage::Repository;

use super::ReconcileError;

/// Upper bound on settlements applied per reconciliation run. Anything beyond
/// it waits for the next run.
pub const BATCH_SIZE: i64 = 10;

/// Periodic sweep that folds recorded-but-unapplied settlements into the
/// account balance. Ingestion applies its own effects synchronously, so a
/// healthy ledger gives the sweep nothing to do; it exists to absorb rows
/// left behind by interrupted or decoupled writers.
pub struct Reconciler {
    repo: Repository,
    account_id: AccountId,
}

impl Reconciler {
    pub fn new(repo: Repository, account_id: AccountId) -> Self {
        Self { repo, account_id }
    }

    /// One reconciliation pass as a single atomic unit of work. Returns the
    /// number of settlements applied.
    ///
    /// Uses the same sign convention as ingestion: wins credit, losses debit.
    /// If the batch would overdraw the account, the whole run aborts and the
    /// rows stay unprocessed for a later attempt.
    pub async fn run_once(&self) -> Result<usize, ReconcileError> {
        let mut uow = self.repo.begin().await?;

        let account = uow
            .lock_account(self.account_id)
            .await?
            .ok_or(ReconcileError::AccountNotFound(self.account_id))?;

        let pending = uow
            .unprocessed_transactions(self.account_id, BATCH_SIZE)
            .await?;
        if pending.is_empty() {
            uow.rollback().await?;
            debug!("reconciliation: nothing to apply");
            return Ok(0);
        }

        let delta = net_effect(&pending);
        let balance = account.balance + delta;
        if balance < 0 {
            uow.rollback().await?;
            return Err(ReconcileError::WouldOverdraw {
                balance: account.balance,
                delta,
                count: pending.len(),
            });
        }

        for record in &pending {
            uow.mark_processed(&record.external_id).await?;
        }
        uow.update_balance(self.account_id, balance).await?;
        uow.commit().await?;

        info!(count = pending.len(), delta, balance, "reconciliation applied");
        Ok(pending.len())
    }

    /// Run reconciliation on a fixed period until the task is dropped.
    /// Failed runs are logged and retried on the next tick.
    pub async fn run(self, period: Duration) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if let Err(err) = self.run_once().await {
                warn!(error = %err, "reconciliation run failed");
            }
        }
    }
}
