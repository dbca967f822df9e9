use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool};

use crate::domain::{Account, AccountId, Millis, Outcome, SourceTypeId, Transaction};

use super::MIGRATION_001_INITIAL;

/// Outcome of a conditional settlement insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxInsert {
    Inserted,
    /// A settlement with this external ID is already recorded.
    DuplicateId,
}

/// Repository for accounts and the settlement journal.
/// Cheap to clone; all clones share the same connection pool.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given path.
    /// Creates the database file if it doesn't exist.
    pub async fn connect(database_path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;

        Ok(())
    }

    /// Initialize a database (connect + migrate).
    pub async fn init(database_path: &str) -> Result<Self> {
        let repo = Self::connect(database_path).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    // ========================
    // Account operations
    // ========================

    /// Create an account with an opening balance.
    pub async fn create_account(&self, email: &str, opening_balance: Millis) -> Result<Account> {
        let row = sqlx::query("INSERT INTO accounts (email, balance) VALUES (?, ?) RETURNING id")
            .bind(email)
            .bind(opening_balance)
            .fetch_one(&self.pool)
            .await
            .context("Failed to create account")?;

        Ok(Account {
            id: row.get("id"),
            email: email.to_string(),
            balance: opening_balance,
        })
    }

    /// Get an account by email.
    pub async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>> {
        let row = sqlx::query("SELECT id, email, balance FROM accounts WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch account by email")?;

        Ok(row.map(|row| row_to_account(&row)))
    }

    /// Current committed balance for an account.
    pub async fn account_balance(&self, id: AccountId) -> Result<Option<Millis>> {
        let row = sqlx::query("SELECT balance FROM accounts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch account balance")?;

        Ok(row.map(|row| row.get("balance")))
    }

    // ========================
    // Source type operations
    // ========================

    /// Resolve a source-type label to its ID.
    pub async fn source_type_id(&self, label: &str) -> Result<Option<SourceTypeId>> {
        let row = sqlx::query("SELECT id FROM source_types WHERE value = ?")
            .bind(label)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to resolve source type")?;

        Ok(row.map(|row| row.get("id")))
    }

    /// Register a source-type label if it is not already present.
    pub async fn ensure_source_type(&self, label: &str) -> Result<SourceTypeId> {
        sqlx::query("INSERT OR IGNORE INTO source_types (value) VALUES (?)")
            .bind(label)
            .execute(&self.pool)
            .await
            .context("Failed to insert source type")?;

        let row = sqlx::query("SELECT id FROM source_types WHERE value = ?")
            .bind(label)
            .fetch_one(&self.pool)
            .await
            .context("Failed to fetch source type")?;

        Ok(row.get("id"))
    }

    // ========================
    // Settlement reads
    // ========================

    /// Get a settlement by its external ID.
    pub async fn find_transaction(&self, external_id: &str) -> Result<Option<Transaction>> {
        let row = sqlx::query(
            r#"
            SELECT external_id, account_id, outcome, amount, source_type, processed, created_at
            FROM transactions
            WHERE external_id = ?
            "#,
        )
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch transaction")?;

        match row {
            Some(row) => Ok(Some(row_to_transaction(&row)?)),
            None => Ok(None),
        }
    }

    /// Count settlements recorded for an account.
    pub async fn transaction_count(&self, id: AccountId) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM transactions WHERE account_id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .context("Failed to count transactions")?;

        Ok(row.get("count"))
    }

    // ========================
    // Units of work
    // ========================

    /// Open a unit of work. Every balance-affecting sequence runs inside one;
    /// dropping it without `commit` rolls everything back.
    pub async fn begin(&self) -> Result<UnitOfWork> {
        let tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin unit of work")?;
        Ok(UnitOfWork { tx })
    }
}

/// A single atomic unit of work against the ledger.
///
/// SQLite has no row-level `SELECT ... FOR UPDATE`, so `lock_account` takes
/// the database write lock up front by touching the account row before
/// reading it. It must be the first call on a fresh unit of work: contenders
/// then queue on the connection's busy timeout until the holder commits or
/// rolls back.
pub struct UnitOfWork {
    tx: sqlx::Transaction<'static, Sqlite>,
}

impl UnitOfWork {
    /// Lock the account for the remainder of the unit of work and return its
    /// current state.
    pub async fn lock_account(&mut self, id: AccountId) -> Result<Option<Account>> {
        // The no-op update is what acquires the write lock.
        sqlx::query("UPDATE accounts SET balance = balance WHERE id = ?")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .context("Failed to lock account row")?;

        let row = sqlx::query("SELECT id, email, balance FROM accounts WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .context("Failed to read locked account")?;

        Ok(row.map(|row| row_to_account(&row)))
    }

    /// Insert a settlement row. A duplicate external ID is reported as a
    /// typed outcome rather than an error.
    pub async fn insert_transaction(&mut self, record: &Transaction) -> Result<TxInsert> {
        let result = sqlx::query(
            r#"
            INSERT INTO transactions (external_id, account_id, outcome, amount, source_type, processed, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.external_id)
        .bind(record.account_id)
        .bind(record.outcome.as_str())
        .bind(record.amount)
        .bind(record.source_type)
        .bind(record.processed)
        .bind(record.created_at.to_rfc3339())
        .execute(&mut *self.tx)
        .await;

        match result {
            Ok(_) => Ok(TxInsert::Inserted),
            Err(err) if is_unique_violation(&err) => Ok(TxInsert::DuplicateId),
            Err(err) => Err(err).context("Failed to insert transaction"),
        }
    }

    /// Unapplied settlements for an account, most recent first.
    pub async fn unprocessed_transactions(
        &mut self,
        id: AccountId,
        limit: i64,
    ) -> Result<Vec<Transaction>> {
        let rows = sqlx::query(
            r#"
            SELECT external_id, account_id, outcome, amount, source_type, processed, created_at
            FROM transactions
            WHERE account_id = ? AND processed = 0
            ORDER BY created_at DESC
            LIMIT ?
            "#,
        )
        .bind(id)
        .bind(limit)
        .fetch_all(&mut *self.tx)
        .await
        .context("Failed to list unprocessed transactions")?;

        rows.iter().map(row_to_transaction).collect()
    }

    /// Mark a settlement as applied to the balance.
    pub async fn mark_processed(&mut self, external_id: &str) -> Result<()> {
        sqlx::query("UPDATE transactions SET processed = 1 WHERE external_id = ?")
            .bind(external_id)
            .execute(&mut *self.tx)
            .await
            .context("Failed to mark transaction processed")?;
        Ok(())
    }

    /// Persist a new balance for the account.
    pub async fn update_balance(&mut self, id: AccountId, balance: Millis) -> Result<()> {
        sqlx::query("UPDATE accounts SET balance = ? WHERE id = ?")
            .bind(balance)
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .context("Failed to update balance")?;
        Ok(())
    }

    /// Commit the unit of work.
    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await.context("Failed to commit unit of work")
    }

    /// Discard the unit of work. Dropping it has the same effect; this form
    /// makes the abort explicit at call sites.
    pub async fn rollback(self) -> Result<()> {
        self.tx
            .rollback()
            .await
            .context("Failed to roll back unit of work")
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}

fn row_to_account(row: &SqliteRow) -> Account {
    Account {
        id: row.get("id"),
        email: row.get("email"),
        balance: row.get("balance"),
    }
}

fn row_to_transaction(row: &SqliteRow) -> Result<Transaction> {
    let outcome_str: String = row.get("outcome");
    let created_at_str: String = row.get("created_at");

    Ok(Transaction {
        external_id: row.get("external_id"),
        account_id: row.get("account_id"),
        outcome: Outcome::from_str(&outcome_str)
            .ok_or_else(|| anyhow::anyhow!("Invalid outcome: {}", outcome_str))?,
        amount: row.get("amount"),
        source_type: row.get("source_type"),
        processed: row.get::<i32, _>("processed") != 0,
        created_at: DateTime::parse_from_rfc3339(&created_at_str)
            .context("Invalid created_at timestamp")?
            .with_timezone(&Utc),
    })
}
