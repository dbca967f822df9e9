use std::fmt;

use chrono::{DateTime, Utc};

use super::{AccountId, Millis};

pub type SourceTypeId = i64;

/// Outcome of a settled wager. The only two states a settlement can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Win,
    Lost,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Win => "win",
            Outcome::Lost => "lost",
        }
    }

    /// Case-sensitive: callers must send exactly "win" or "lost".
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "win" => Some(Outcome::Win),
            "lost" => Some(Outcome::Lost),
            _ => None,
        }
    }

    /// Signed balance effect of an amount with this outcome: wins credit,
    /// losses debit. Every path that moves a balance goes through here, so
    /// ingestion and reconciliation can never disagree on direction.
    pub fn signed(&self, amount: Millis) -> Millis {
        match self {
            Outcome::Win => amount,
            Outcome::Lost => -amount,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A recorded wager settlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// Caller-supplied identifier, unique across the whole ledger.
    pub external_id: String,
    pub account_id: AccountId,
    pub outcome: Outcome,
    /// Magnitude in millis, always non-negative. Direction comes from `outcome`.
    pub amount: Millis,
    pub source_type: SourceTypeId,
    /// Whether the balance effect has been applied to the account.
    pub processed: bool,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        external_id: impl Into<String>,
        account_id: AccountId,
        outcome: Outcome,
        amount: Millis,
        source_type: SourceTypeId,
    ) -> Self {
        assert!(amount >= 0, "Transaction amount must be non-negative");
        Self {
            external_id: external_id.into(),
            account_id,
            outcome,
            amount,
            source_type,
            processed: false,
            created_at: Utc::now(),
        }
    }

    /// Balance delta this settlement contributes.
    pub fn signed_amount(&self) -> Millis {
        self.outcome.signed(self.amount)
    }
}

/// Net signed effect of a batch of settlements.
pub fn net_effect(transactions: &[Transaction]) -> Millis {
    transactions.iter().map(|t| t.signed_amount()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_from_str() {
        assert_eq!(Outcome::from_str("win"), Some(Outcome::Win));
        assert_eq!(Outcome::from_str("lost"), Some(Outcome::Lost));
        assert_eq!(Outcome::from_str("WIN"), None);
        assert_eq!(Outcome::from_str("draw"), None);
        assert_eq!(Outcome::from_str(""), None);
    }

    #[test]
    fn test_outcome_signed() {
        assert_eq!(Outcome::Win.signed(2500), 2500);
        assert_eq!(Outcome::Lost.signed(2500), -2500);
        assert_eq!(Outcome::Win.signed(0), 0);
        assert_eq!(Outcome::Lost.signed(0), 0);
    }

    #[test]
    fn test_new_transaction_starts_unprocessed() {
        let tx = Transaction::new("tx-1", 1, Outcome::Win, 1000, 1);
        assert!(!tx.processed);
        assert_eq!(tx.signed_amount(), 1000);
    }

    #[test]
    fn test_net_effect() {
        let batch = vec![
            Transaction::new("a", 1, Outcome::Win, 2500, 1),
            Transaction::new("b", 1, Outcome::Win, 1000, 1),
            Transaction::new("c", 1, Outcome::Lost, 500, 1),
        ];
        assert_eq!(net_effect(&batch), 3000);
        assert_eq!(net_effect(&[]), 0);
    }
}
