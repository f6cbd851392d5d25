use crate::domain::account::{Account, Amount, Balance, Currency};
use crate::domain::ports::{LedgerStore, LedgerTxn};
use crate::domain::transfer::{Entry, Transfer};
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// One account row. The mutex is the row lock: a transaction that reads the
/// row for update holds the guard until it commits or rolls back.
type Row = Arc<Mutex<Account>>;

/// A thread-safe in-memory ledger.
///
/// Accounts live behind per-row `tokio::sync::Mutex`es, so lock waits,
/// transaction isolation, and the deadlock risk of mis-ordered acquisition
/// are all real here, just in-process. Ideal for tests and small datasets
/// where persistence is not required.
#[derive(Default, Clone)]
pub struct InMemoryLedger {
    inner: Arc<Shared>,
}

#[derive(Default)]
struct Shared {
    accounts: RwLock<HashMap<i64, Row>>,
    transfers: RwLock<BTreeMap<i64, Transfer>>,
    entries: RwLock<BTreeMap<i64, Entry>>,
    next_account_id: AtomicI64,
    next_transfer_id: AtomicI64,
    next_entry_id: AtomicI64,
}

impl InMemoryLedger {
    /// Creates a new, empty in-memory ledger.
    pub fn new() -> Self {
        Self::default()
    }

    async fn row(&self, account_id: i64) -> Result<Row> {
        let accounts = self.inner.accounts.read().await;
        accounts
            .get(&account_id)
            .cloned()
            .ok_or(LedgerError::AccountNotFound(account_id))
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    async fn create_account(
        &self,
        owner: String,
        currency: Currency,
        balance: Balance,
    ) -> Result<Account> {
        let id = self.inner.next_account_id.fetch_add(1, Ordering::SeqCst) + 1;
        let account = Account {
            id,
            owner,
            balance,
            currency,
            created_at: Utc::now(),
        };

        let mut accounts = self.inner.accounts.write().await;
        accounts.insert(id, Arc::new(Mutex::new(account.clone())));
        Ok(account)
    }

    async fn get_account(&self, account_id: i64) -> Result<Option<Account>> {
        let row = {
            let accounts = self.inner.accounts.read().await;
            accounts.get(&account_id).cloned()
        };
        match row {
            // Waits out any transaction currently holding the row lock, so
            // only committed state is ever returned.
            Some(row) => Ok(Some(row.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn list_accounts(&self) -> Result<Vec<Account>> {
        let rows: Vec<Row> = {
            let accounts = self.inner.accounts.read().await;
            let mut ids: Vec<i64> = accounts.keys().copied().collect();
            ids.sort_unstable();
            ids.iter().map(|id| accounts[id].clone()).collect()
        };

        let mut all = Vec::with_capacity(rows.len());
        for row in rows {
            all.push(row.lock().await.clone());
        }
        Ok(all)
    }

    async fn set_account_balance(&self, account_id: i64, balance: Balance) -> Result<Account> {
        let row = self.row(account_id).await?;
        let mut account = row.lock().await;
        account.balance = balance;
        Ok(account.clone())
    }

    async fn delete_account(&self, account_id: i64) -> Result<()> {
        {
            let entries = self.inner.entries.read().await;
            if entries.values().any(|e| e.account_id == account_id) {
                return Err(LedgerError::InvalidArgument(format!(
                    "account {account_id} is still referenced by entries"
                )));
            }
        }
        {
            let transfers = self.inner.transfers.read().await;
            if transfers
                .values()
                .any(|t| t.from_account_id == account_id || t.to_account_id == account_id)
            {
                return Err(LedgerError::InvalidArgument(format!(
                    "account {account_id} is still referenced by transfers"
                )));
            }
        }

        let mut accounts = self.inner.accounts.write().await;
        accounts
            .remove(&account_id)
            .map(|_| ())
            .ok_or(LedgerError::AccountNotFound(account_id))
    }

    async fn get_transfer(&self, transfer_id: i64) -> Result<Option<Transfer>> {
        let transfers = self.inner.transfers.read().await;
        Ok(transfers.get(&transfer_id).cloned())
    }

    async fn list_transfers(&self) -> Result<Vec<Transfer>> {
        let transfers = self.inner.transfers.read().await;
        Ok(transfers.values().cloned().collect())
    }

    async fn get_entry(&self, entry_id: i64) -> Result<Option<Entry>> {
        let entries = self.inner.entries.read().await;
        Ok(entries.get(&entry_id).cloned())
    }

    async fn list_entries(&self, account_id: Option<i64>) -> Result<Vec<Entry>> {
        let entries = self.inner.entries.read().await;
        Ok(entries
            .values()
            .filter(|e| account_id.is_none_or(|id| e.account_id == id))
            .cloned()
            .collect())
    }

    async fn begin(&self) -> Result<Box<dyn LedgerTxn>> {
        Ok(Box::new(InMemoryTxn {
            shared: self.inner.clone(),
            locked: HashMap::new(),
            staged_transfers: Vec::new(),
            staged_entries: Vec::new(),
        }))
    }
}

struct LockedRow {
    guard: OwnedMutexGuard<Account>,
    working: Account,
}

/// An open transaction against [`InMemoryLedger`].
///
/// Row guards acquired by `get_account_for_update` are held until the handle
/// is committed or dropped; all writes are staged and published under those
/// guards at commit, so no other caller can observe a half-applied transfer.
struct InMemoryTxn {
    shared: Arc<Shared>,
    locked: HashMap<i64, LockedRow>,
    staged_transfers: Vec<Transfer>,
    staged_entries: Vec<Entry>,
}

#[async_trait]
impl LedgerTxn for InMemoryTxn {
    async fn create_transfer(
        &mut self,
        from_account_id: i64,
        to_account_id: i64,
        amount: Amount,
    ) -> Result<Transfer> {
        let id = self.shared.next_transfer_id.fetch_add(1, Ordering::SeqCst) + 1;
        let transfer = Transfer {
            id,
            from_account_id,
            to_account_id,
            amount,
            created_at: Utc::now(),
        };
        self.staged_transfers.push(transfer.clone());
        Ok(transfer)
    }

    async fn create_entry(&mut self, account_id: i64, amount: Balance) -> Result<Entry> {
        let id = self.shared.next_entry_id.fetch_add(1, Ordering::SeqCst) + 1;
        let entry = Entry {
            id,
            account_id,
            amount,
            created_at: Utc::now(),
        };
        self.staged_entries.push(entry.clone());
        Ok(entry)
    }

    async fn get_account_for_update(&mut self, account_id: i64) -> Result<Account> {
        if let Some(locked) = self.locked.get(&account_id) {
            return Ok(locked.working.clone());
        }

        let row = {
            let accounts = self.shared.accounts.read().await;
            accounts
                .get(&account_id)
                .cloned()
                .ok_or(LedgerError::AccountNotFound(account_id))?
        };
        // The only suspension point where one transfer can wait on another.
        let guard = row.lock_owned().await;
        let working = guard.clone();
        self.locked.insert(
            account_id,
            LockedRow {
                guard,
                working: working.clone(),
            },
        );
        Ok(working)
    }

    async fn update_locked_balance(
        &mut self,
        account_id: i64,
        balance: Balance,
    ) -> Result<Account> {
        let locked = self.locked.get_mut(&account_id).ok_or_else(|| {
            LedgerError::store(std::io::Error::other(format!(
                "balance write on account {account_id} without a row lock"
            )))
        })?;
        locked.working.balance = balance;
        Ok(locked.working.clone())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        {
            let mut transfers = self.shared.transfers.write().await;
            for transfer in self.staged_transfers {
                transfers.insert(transfer.id, transfer);
            }
        }
        {
            let mut entries = self.shared.entries.write().await;
            for entry in self.staged_entries {
                entries.insert(entry.id, entry);
            }
        }
        // Publish balances through the held guards, then release the row
        // locks by dropping them.
        for (_, locked) in self.locked {
            let LockedRow { mut guard, working } = locked;
            *guard = working;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    async fn account(store: &InMemoryLedger, owner: &str, balance: rust_decimal::Decimal) -> Account {
        store
            .create_account(owner.into(), Currency::Usd, Balance::new(balance))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_account_crud() {
        let store = InMemoryLedger::new();
        let created = account(&store, "alice", dec!(100.0)).await;
        assert_eq!(created.id, 1);

        let fetched = store.get_account(created.id).await.unwrap().unwrap();
        assert_eq!(fetched, created);
        assert!(store.get_account(99).await.unwrap().is_none());

        let updated = store
            .set_account_balance(created.id, Balance::new(dec!(42.0)))
            .await
            .unwrap();
        assert_eq!(updated.balance, Balance::new(dec!(42.0)));

        store.delete_account(created.id).await.unwrap();
        assert!(store.get_account(created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_accounts_is_id_ordered() {
        let store = InMemoryLedger::new();
        account(&store, "alice", dec!(1.0)).await;
        account(&store, "bob", dec!(2.0)).await;
        account(&store, "carol", dec!(3.0)).await;

        let ids: Vec<i64> = store
            .list_accounts()
            .await
            .unwrap()
            .iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_commit_publishes_staged_rows() {
        let store = InMemoryLedger::new();
        let a = account(&store, "alice", dec!(100.0)).await;
        let b = account(&store, "bob", dec!(0.0)).await;

        let mut txn = store.begin().await.unwrap();
        let transfer = txn
            .create_transfer(a.id, b.id, dec!(10.0).try_into().unwrap())
            .await
            .unwrap();
        txn.create_entry(a.id, Balance::new(dec!(-10.0))).await.unwrap();
        txn.create_entry(b.id, Balance::new(dec!(10.0))).await.unwrap();

        // Nothing visible before commit
        assert!(store.get_transfer(transfer.id).await.unwrap().is_none());
        assert!(store.list_entries(None).await.unwrap().is_empty());

        txn.commit().await.unwrap();

        assert_eq!(
            store.get_transfer(transfer.id).await.unwrap().unwrap(),
            transfer
        );
        assert_eq!(store.list_entries(None).await.unwrap().len(), 2);
        assert_eq!(store.list_entries(Some(a.id)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_drop_discards_staged_rows_and_releases_locks() {
        let store = InMemoryLedger::new();
        let a = account(&store, "alice", dec!(100.0)).await;

        let mut txn = store.begin().await.unwrap();
        txn.get_account_for_update(a.id).await.unwrap();
        txn.update_locked_balance(a.id, Balance::new(dec!(0.0)))
            .await
            .unwrap();
        txn.create_entry(a.id, Balance::new(dec!(-100.0)))
            .await
            .unwrap();
        drop(txn);

        // The lock is free again and nothing was published
        let fetched = store.get_account(a.id).await.unwrap().unwrap();
        assert_eq!(fetched.balance, Balance::new(dec!(100.0)));
        assert!(store.list_entries(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_row_lock_blocks_second_transaction() {
        let store = InMemoryLedger::new();
        let a = account(&store, "alice", dec!(100.0)).await;

        let mut txn1 = store.begin().await.unwrap();
        txn1.get_account_for_update(a.id).await.unwrap();

        let mut txn2 = store.begin().await.unwrap();
        let contended = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            txn2.get_account_for_update(a.id),
        )
        .await;
        assert!(contended.is_err(), "second txn acquired a held row lock");

        drop(txn1);
        let account = txn2.get_account_for_update(a.id).await.unwrap();
        assert_eq!(account.balance, Balance::new(dec!(100.0)));
    }

    #[tokio::test]
    async fn test_delete_account_refuses_while_referenced() {
        let store = InMemoryLedger::new();
        let a = account(&store, "alice", dec!(100.0)).await;
        let b = account(&store, "bob", dec!(0.0)).await;

        let mut txn = store.begin().await.unwrap();
        txn.create_transfer(a.id, b.id, dec!(10.0).try_into().unwrap())
            .await
            .unwrap();
        txn.create_entry(a.id, Balance::new(dec!(-10.0))).await.unwrap();
        txn.create_entry(b.id, Balance::new(dec!(10.0))).await.unwrap();
        txn.commit().await.unwrap();

        assert!(matches!(
            store.delete_account(a.id).await,
            Err(LedgerError::InvalidArgument(_))
        ));
    }
}
