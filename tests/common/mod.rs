// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::{Context, Result};
use bankroll::application::{LedgerService, SubmitError, SubmitOutcome};
use bankroll::domain::{parse_millis, Account, Millis, Outcome, Transaction};
use bankroll::storage::{Repository, TxInsert};
use tempfile::TempDir;

/// Source-type label the fixture registers and helpers submit under.
pub const SOURCE: &str = "game";

/// Everything a test needs: the service, raw store access, and the account
/// the fixture provisioned. The TempDir keeps the database file alive.
pub struct TestLedger {
    pub service: LedgerService,
    pub repo: Repository,
    pub account: Account,
    _temp_dir: TempDir,
}

/// Build a ledger on a temporary database with one provisioned account and
/// the standard source types.
pub async fn test_ledger(opening_balance: Millis) -> Result<TestLedger> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let repo = Repository::init(db_path.to_str().unwrap()).await?;

    let service = LedgerService::new(repo.clone());
    let account = service
        .provision_account("player@example.com", opening_balance)
        .await?;
    service
        .seed_source_types(&["game".into(), "server".into(), "payment".into()])
        .await?;

    Ok(TestLedger {
        service,
        repo,
        account,
        _temp_dir: temp_dir,
    })
}

impl TestLedger {
    /// Submit against the fixture account with the default source type.
    pub async fn submit(
        &self,
        outcome: &str,
        amount: &str,
        external_id: &str,
    ) -> Result<SubmitOutcome, SubmitError> {
        self.service
            .submit_transaction(self.account.id, SOURCE, outcome, amount, external_id)
            .await
    }

    /// Committed balance of the fixture account.
    pub async fn balance(&self) -> Result<Millis> {
        self.repo
            .account_balance(self.account.id)
            .await?
            .context("account row missing")
    }

    /// Record a settlement without applying its balance effect, leaving it
    /// for the reconciliation sweep. This is the state a decoupled writer
    /// leaves behind.
    pub async fn record_unapplied(
        &self,
        outcome: &str,
        amount: &str,
        external_id: &str,
    ) -> Result<()> {
        let outcome = Outcome::from_str(outcome).context("bad outcome in fixture")?;
        let amount = parse_millis(amount)
            .map_err(|err| anyhow::anyhow!("bad amount in fixture: {}", err))?;
        let source_type = self
            .repo
            .source_type_id(SOURCE)
            .await?
            .context("source type missing")?;

        let mut uow = self.repo.begin().await?;
        uow.lock_account(self.account.id)
            .await?
            .context("account missing")?;
        let record = Transaction::new(external_id, self.account.id, outcome, amount, source_type);
        let inserted = uow.insert_transaction(&record).await?;
        anyhow::ensure!(
            inserted == TxInsert::Inserted,
            "duplicate external id in fixture: {}",
            external_id
        );
        uow.commit().await?;
        Ok(())
    }
}
