use super::Millis;

pub type AccountId = i64;

/// A ledger account. One balance, identified externally by email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    pub email: String,
    pub balance: Millis,
}
