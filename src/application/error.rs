use thiserror::Error;

use crate::domain::{AccountId, Millis};

/// Errors surfaced by settlement ingestion.
#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("Malformed amount: {0}")]
    MalformedAmount(String),

    #[error("Invalid outcome: {0} (expected \"win\" or \"lost\")")]
    InvalidOutcome(String),

    #[error("Unknown source type: {0}")]
    UnknownSource(String),

    #[error("Insufficient balance: have {balance}, debit of {debit} would overdraw")]
    InsufficientBalance { balance: Millis, debit: Millis },

    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl SubmitError {
    /// True for rejections caused by the request itself, as opposed to
    /// failures of the ledger's own infrastructure.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            SubmitError::MalformedAmount(_)
                | SubmitError::InvalidOutcome(_)
                | SubmitError::UnknownSource(_)
                | SubmitError::InsufficientBalance { .. }
        )
    }
}

/// Errors surfaced by a reconciliation run.
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error(
        "Applying {count} pending transactions would overdraw: balance {balance}, net delta {delta}"
    )]
    WouldOverdraw {
        balance: Millis,
        delta: Millis,
        count: usize,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

/// Errors surfaced by account and source-type provisioning.
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("Account already exists: {0}")]
    AccountExists(String),

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}
