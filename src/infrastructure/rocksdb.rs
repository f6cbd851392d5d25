use crate::domain::account::{Account, Amount, Balance, Currency};
use crate::domain::ports::{LedgerStore, LedgerTxn};
use crate::domain::transfer::{Entry, Transfer};
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use chrono::Utc;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Options, WriteBatch};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Column Family for account rows.
pub const CF_ACCOUNTS: &str = "accounts";
/// Column Family for entry rows.
pub const CF_ENTRIES: &str = "entries";
/// Column Family for transfer rows.
pub const CF_TRANSFERS: &str = "transfers";
/// Column Family for ID counters.
pub const CF_META: &str = "meta";

const KEY_NEXT_ACCOUNT_ID: &[u8] = b"next_account_id";
const KEY_NEXT_TRANSFER_ID: &[u8] = b"next_transfer_id";
const KEY_NEXT_ENTRY_ID: &[u8] = b"next_entry_id";

/// A persistent ledger backed by RocksDB.
///
/// Each entity lives in its own Column Family with big-endian ID keys, so CF
/// iteration yields ID order. RocksDB has no row locks of its own, so the
/// store keeps an in-process lock table keyed by account ID; transactions
/// stage their writes and publish them as one `WriteBatch` at commit.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDbLedger {
    db: Arc<DB>,
    row_locks: Arc<Mutex<HashMap<i64, Arc<Mutex<()>>>>>,
    next_account_id: Arc<AtomicI64>,
    next_transfer_id: Arc<AtomicI64>,
    next_entry_id: Arc<AtomicI64>,
}

fn load_counter(db: &DB, key: &[u8]) -> Result<i64> {
    let meta = db.cf_handle(CF_META).ok_or_else(|| {
        LedgerError::store(std::io::Error::other("meta column family not found"))
    })?;
    match db.get_cf(meta, key)? {
        Some(bytes) => {
            let bytes: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                LedgerError::store(std::io::Error::other("corrupt ID counter value"))
            })?;
            Ok(i64::from_be_bytes(bytes))
        }
        None => Ok(0),
    }
}

impl RocksDbLedger {
    /// Opens or creates a RocksDB instance at the specified path, ensuring
    /// the required column families exist and recovering the ID counters.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = [CF_ACCOUNTS, CF_ENTRIES, CF_TRANSFERS, CF_META]
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));

        let db = DB::open_cf_descriptors(&opts, path, cfs)?;
        let next_account_id = load_counter(&db, KEY_NEXT_ACCOUNT_ID)?;
        let next_transfer_id = load_counter(&db, KEY_NEXT_TRANSFER_ID)?;
        let next_entry_id = load_counter(&db, KEY_NEXT_ENTRY_ID)?;

        Ok(Self {
            db: Arc::new(db),
            row_locks: Arc::new(Mutex::new(HashMap::new())),
            next_account_id: Arc::new(AtomicI64::new(next_account_id)),
            next_transfer_id: Arc::new(AtomicI64::new(next_transfer_id)),
            next_entry_id: Arc::new(AtomicI64::new(next_entry_id)),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            LedgerError::store(std::io::Error::other(format!(
                "{name} column family not found"
            )))
        })
    }

    async fn row_lock(&self, account_id: i64) -> Arc<Mutex<()>> {
        let mut locks = self.row_locks.lock().await;
        locks.entry(account_id).or_default().clone()
    }

    fn read_account(&self, account_id: i64) -> Result<Option<Account>> {
        let accounts = self.cf(CF_ACCOUNTS)?;
        match self.db.get_cf(accounts, account_id.to_be_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl LedgerStore for RocksDbLedger {
    async fn create_account(
        &self,
        owner: String,
        currency: Currency,
        balance: Balance,
    ) -> Result<Account> {
        let id = self.next_account_id.fetch_add(1, Ordering::SeqCst) + 1;
        let account = Account {
            id,
            owner,
            balance,
            currency,
            created_at: Utc::now(),
        };

        let mut batch = WriteBatch::default();
        batch.put_cf(
            self.cf(CF_ACCOUNTS)?,
            id.to_be_bytes(),
            serde_json::to_vec(&account)?,
        );
        batch.put_cf(self.cf(CF_META)?, KEY_NEXT_ACCOUNT_ID, id.to_be_bytes());
        self.db.write(batch)?;

        Ok(account)
    }

    async fn get_account(&self, account_id: i64) -> Result<Option<Account>> {
        self.read_account(account_id)
    }

    async fn list_accounts(&self) -> Result<Vec<Account>> {
        let accounts = self.cf(CF_ACCOUNTS)?;
        let mut all = Vec::new();
        for item in self.db.iterator_cf(accounts, rocksdb::IteratorMode::Start) {
            let (_key, value) = item?;
            all.push(serde_json::from_slice(&value)?);
        }
        Ok(all)
    }

    async fn set_account_balance(&self, account_id: i64, balance: Balance) -> Result<Account> {
        let row_lock = self.row_lock(account_id).await;
        let _guard = row_lock.lock().await;

        let mut account = self
            .read_account(account_id)?
            .ok_or(LedgerError::AccountNotFound(account_id))?;
        account.balance = balance;
        self.db.put_cf(
            self.cf(CF_ACCOUNTS)?,
            account_id.to_be_bytes(),
            serde_json::to_vec(&account)?,
        )?;
        Ok(account)
    }

    async fn delete_account(&self, account_id: i64) -> Result<()> {
        if !self.list_entries(Some(account_id)).await?.is_empty() {
            return Err(LedgerError::InvalidArgument(format!(
                "account {account_id} is still referenced by entries"
            )));
        }
        for transfer in self.list_transfers().await? {
            if transfer.from_account_id == account_id || transfer.to_account_id == account_id {
                return Err(LedgerError::InvalidArgument(format!(
                    "account {account_id} is still referenced by transfers"
                )));
            }
        }

        let row_lock = self.row_lock(account_id).await;
        let _guard = row_lock.lock().await;
        if self.read_account(account_id)?.is_none() {
            return Err(LedgerError::AccountNotFound(account_id));
        }
        self.db
            .delete_cf(self.cf(CF_ACCOUNTS)?, account_id.to_be_bytes())?;
        Ok(())
    }

    async fn get_transfer(&self, transfer_id: i64) -> Result<Option<Transfer>> {
        let transfers = self.cf(CF_TRANSFERS)?;
        match self.db.get_cf(transfers, transfer_id.to_be_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn list_transfers(&self) -> Result<Vec<Transfer>> {
        let transfers = self.cf(CF_TRANSFERS)?;
        let mut all = Vec::new();
        for item in self.db.iterator_cf(transfers, rocksdb::IteratorMode::Start) {
            let (_key, value) = item?;
            all.push(serde_json::from_slice(&value)?);
        }
        Ok(all)
    }

    async fn get_entry(&self, entry_id: i64) -> Result<Option<Entry>> {
        let entries = self.cf(CF_ENTRIES)?;
        match self.db.get_cf(entries, entry_id.to_be_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn list_entries(&self, account_id: Option<i64>) -> Result<Vec<Entry>> {
        let entries = self.cf(CF_ENTRIES)?;
        let mut all = Vec::new();
        for item in self.db.iterator_cf(entries, rocksdb::IteratorMode::Start) {
            let (_key, value) = item?;
            let entry: Entry = serde_json::from_slice(&value)?;
            if account_id.is_none_or(|id| entry.account_id == id) {
                all.push(entry);
            }
        }
        Ok(all)
    }

    async fn begin(&self) -> Result<Box<dyn LedgerTxn>> {
        Ok(Box::new(RocksDbTxn {
            store: self.clone(),
            locked: HashMap::new(),
            staged_transfers: Vec::new(),
            staged_entries: Vec::new(),
        }))
    }
}

struct LockedRow {
    _guard: OwnedMutexGuard<()>,
    working: Account,
}

/// An open transaction against [`RocksDbLedger`]: row locks from the store's
/// lock table plus staged rows, flushed as one atomic `WriteBatch` at commit.
struct RocksDbTxn {
    store: RocksDbLedger,
    locked: HashMap<i64, LockedRow>,
    staged_transfers: Vec<Transfer>,
    staged_entries: Vec<Entry>,
}

#[async_trait]
impl LedgerTxn for RocksDbTxn {
    async fn create_transfer(
        &mut self,
        from_account_id: i64,
        to_account_id: i64,
        amount: Amount,
    ) -> Result<Transfer> {
        let id = self.store.next_transfer_id.fetch_add(1, Ordering::SeqCst) + 1;
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
        let id = self.store.next_entry_id.fetch_add(1, Ordering::SeqCst) + 1;
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

        let row_lock = self.store.row_lock(account_id).await;
        let guard = row_lock.lock_owned().await;
        let working = self
            .store
            .read_account(account_id)?
            .ok_or(LedgerError::AccountNotFound(account_id))?;
        self.locked.insert(
            account_id,
            LockedRow {
                _guard: guard,
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
        let db = &self.store.db;
        let mut batch = WriteBatch::default();

        let accounts = self.store.cf(CF_ACCOUNTS)?;
        for locked in self.locked.values() {
            batch.put_cf(
                accounts,
                locked.working.id.to_be_bytes(),
                serde_json::to_vec(&locked.working)?,
            );
        }

        let transfers = self.store.cf(CF_TRANSFERS)?;
        for transfer in &self.staged_transfers {
            batch.put_cf(
                transfers,
                transfer.id.to_be_bytes(),
                serde_json::to_vec(transfer)?,
            );
        }

        let entries = self.store.cf(CF_ENTRIES)?;
        for entry in &self.staged_entries {
            batch.put_cf(entries, entry.id.to_be_bytes(), serde_json::to_vec(entry)?);
        }

        let meta = self.store.cf(CF_META)?;
        if let Some(last) = self.staged_transfers.last() {
            batch.put_cf(meta, KEY_NEXT_TRANSFER_ID, last.id.to_be_bytes());
        }
        if let Some(last) = self.staged_entries.last() {
            batch.put_cf(meta, KEY_NEXT_ENTRY_ID, last.id.to_be_bytes());
        }

        db.write(batch)?;
        // Row locks release when the guards drop with self.
        Ok(())
    }
}
