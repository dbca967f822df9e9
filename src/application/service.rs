use tracing::info;

use crate::domain::{parse_millis, Account, AccountId, Millis, Outcome, Transaction};
use crate::storage::{Repository, TxInsert};

use super::{ProvisionError, SubmitError};

/// Application service for settlement ingestion and account provisioning.
/// This is the primary interface for any client (HTTP API, CLI, tests).
pub struct LedgerService {
    repo: Repository,
}

/// Result of an accepted submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The settlement was recorded and its effect applied to the balance.
    Applied { balance: Millis },
    /// A settlement with this external ID was already recorded; nothing
    /// changed. Replays are accepted so callers can retry blindly.
    Replayed,
}

impl LedgerService {
    /// Create a new ledger service with the given repository.
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    // ========================
    // Ingestion
    // ========================

    /// Ingest one settlement: record it and apply its balance effect, all in
    /// a single unit of work.
    ///
    /// Wins credit the account and losses debit it. A debit that would take
    /// the balance below zero is rejected without leaving any trace, and the
    /// same external ID can be retried once the balance allows it. A replayed
    /// external ID is accepted and changes nothing, whatever its payload.
    pub async fn submit_transaction(
        &self,
        account_id: AccountId,
        source: &str,
        outcome: &str,
        amount: &str,
        external_id: &str,
    ) -> Result<SubmitOutcome, SubmitError> {
        let amount = parse_millis(amount)
            .map_err(|_| SubmitError::MalformedAmount(amount.to_string()))?;
        let outcome = Outcome::from_str(outcome)
            .ok_or_else(|| SubmitError::InvalidOutcome(outcome.to_string()))?;

        // Resolved outside the unit of work: the label table is static, and
        // an unknown source must be rejected before the account lock is taken.
        let source_type = self
            .repo
            .source_type_id(source)
            .await?
            .ok_or_else(|| SubmitError::UnknownSource(source.to_string()))?;

        let mut uow = self.repo.begin().await?;

        let account = uow
            .lock_account(account_id)
            .await?
            .ok_or(SubmitError::AccountNotFound(account_id))?;

        let record = Transaction::new(external_id, account_id, outcome, amount, source_type);
        if uow.insert_transaction(&record).await? == TxInsert::DuplicateId {
            uow.rollback().await?;
            info!(external_id, "duplicate settlement, replay ignored");
            return Ok(SubmitOutcome::Replayed);
        }

        let balance = account.balance + outcome.signed(amount);
        if balance < 0 {
            uow.rollback().await?;
            return Err(SubmitError::InsufficientBalance {
                balance: account.balance,
                debit: amount,
            });
        }

        uow.update_balance(account_id, balance).await?;
        uow.mark_processed(external_id).await?;
        uow.commit().await?;

        info!(
            external_id,
            outcome = %outcome,
            amount,
            balance,
            "settlement applied"
        );
        Ok(SubmitOutcome::Applied { balance })
    }

    // ========================
    // Provisioning
    // ========================

    /// Create the account this deployment will serve.
    pub async fn provision_account(
        &self,
        email: &str,
        opening_balance: Millis,
    ) -> Result<Account, ProvisionError> {
        if self.repo.find_account_by_email(email).await?.is_some() {
            return Err(ProvisionError::AccountExists(email.to_string()));
        }

        let account = self.repo.create_account(email, opening_balance).await?;
        info!(email, account_id = account.id, balance = account.balance, "account provisioned");
        Ok(account)
    }

    /// Register the source-type labels callers may use.
    pub async fn seed_source_types(&self, labels: &[String]) -> Result<(), ProvisionError> {
        for label in labels {
            self.repo.ensure_source_type(label).await?;
        }
        Ok(())
    }
}
