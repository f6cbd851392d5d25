use super::account::{Account, Amount, Balance, Currency};
use super::transfer::{Entry, Transfer};
use crate::error::Result;
use async_trait::async_trait;

/// Persistence boundary for the ledger. No business logic lives here;
/// concurrent callers serialize on the row locks taken inside a [`LedgerTxn`],
/// never on a store-wide lock.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn create_account(
        &self,
        owner: String,
        currency: Currency,
        balance: Balance,
    ) -> Result<Account>;
    async fn get_account(&self, account_id: i64) -> Result<Option<Account>>;
    async fn list_accounts(&self) -> Result<Vec<Account>>;
    /// Direct administrative balance write, outside any transfer.
    async fn set_account_balance(&self, account_id: i64, balance: Balance) -> Result<Account>;
    /// Refuses while entries or transfers still reference the account.
    async fn delete_account(&self, account_id: i64) -> Result<()>;

    async fn get_transfer(&self, transfer_id: i64) -> Result<Option<Transfer>>;
    async fn list_transfers(&self) -> Result<Vec<Transfer>>;
    async fn get_entry(&self, entry_id: i64) -> Result<Option<Entry>>;
    async fn list_entries(&self, account_id: Option<i64>) -> Result<Vec<Entry>>;

    /// Opens a scoped transaction. Dropping the handle without committing
    /// rolls back everything staged in it.
    async fn begin(&self) -> Result<Box<dyn LedgerTxn>>;
}

/// One open transaction. Writes are staged and become visible to other
/// callers only after `commit`; `get_account_for_update` acquires the row
/// lock and holds it until the transaction ends.
#[async_trait]
pub trait LedgerTxn: Send {
    async fn create_transfer(
        &mut self,
        from_account_id: i64,
        to_account_id: i64,
        amount: Amount,
    ) -> Result<Transfer>;
    async fn create_entry(&mut self, account_id: i64, amount: Balance) -> Result<Entry>;
    async fn get_account_for_update(&mut self, account_id: i64) -> Result<Account>;
    /// Writes the balance of a row this transaction already holds the lock on.
    async fn update_locked_balance(&mut self, account_id: i64, balance: Balance)
    -> Result<Account>;
    async fn commit(self: Box<Self>) -> Result<()>;
}

pub type LedgerStoreBox = Box<dyn LedgerStore>;
