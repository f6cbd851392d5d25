use crate::domain::account::{Account, Amount, Balance};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The record of a single money movement between two accounts.
///
/// Immutable once created; `amount` is the positive magnitude moved.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Transfer {
    pub id: i64,
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: Amount,
    pub created_at: DateTime<Utc>,
}

/// One account's balance change caused by one transfer.
///
/// Append-only: negative amount for the debit side, positive for the credit
/// side. Exactly two entries exist per transfer and their amounts sum to zero.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Entry {
    pub id: i64,
    pub account_id: i64,
    pub amount: Balance,
    pub created_at: DateTime<Utc>,
}

/// Everything one successful transfer produced: the transfer row, both
/// entries, and the post-transfer account snapshots. Transient, never stored.
#[derive(Debug, PartialEq, Clone)]
pub struct TransferResult {
    pub transfer: Transfer,
    pub from_entry: Entry,
    pub to_entry: Entry,
    pub from_account: Account,
    pub to_account: Account,
}
