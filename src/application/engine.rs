use crate::application::balance::apply_delta;
use crate::application::ordering::lock_order;
use crate::domain::account::{Account, Amount, Balance, Currency};
use crate::domain::ports::{LedgerStoreBox, LedgerTxn};
use crate::domain::transfer::TransferResult;
use crate::error::{LedgerError, Result};
use rust_decimal::Decimal;
use tracing::{debug, warn};

/// The main entry point for moving money between accounts.
///
/// `TransferEngine` holds no state between calls beyond shared access to the
/// ledger store, so any number of invocations may run concurrently. Each
/// transfer executes inside one scoped store transaction: the transfer row,
/// both entries, and both balance updates commit together or not at all.
pub struct TransferEngine {
    store: LedgerStoreBox,
}

impl TransferEngine {
    pub fn new(store: LedgerStoreBox) -> Self {
        Self { store }
    }

    /// Creates an account with an opening balance and no entry history.
    pub async fn open_account(
        &self,
        owner: impl Into<String>,
        currency: Currency,
        opening_balance: Decimal,
    ) -> Result<Account> {
        let owner = owner.into();
        if owner.trim().is_empty() {
            return Err(LedgerError::InvalidArgument(
                "owner must not be empty".to_string(),
            ));
        }
        if opening_balance < Decimal::ZERO {
            return Err(LedgerError::InvalidArgument(
                "opening balance must not be negative".to_string(),
            ));
        }

        let account = self
            .store
            .create_account(owner, currency, Balance::new(opening_balance))
            .await?;
        debug!(account_id = account.id, %currency, "account opened");
        Ok(account)
    }

    pub async fn get_account(&self, account_id: i64) -> Result<Account> {
        self.store
            .get_account(account_id)
            .await?
            .ok_or(LedgerError::AccountNotFound(account_id))
    }

    /// Moves `amount` from one account to another as a single atomic unit.
    ///
    /// Writes one transfer row and two entries (debit before credit), then
    /// applies both balance updates with row locks taken in [`lock_order`],
    /// not in from/to order. Overdraft is detected after the updates and
    /// undone by rolling the whole transaction back, so there is no window
    /// between a balance check and the write.
    pub async fn transfer(
        &self,
        from_account_id: i64,
        to_account_id: i64,
        amount: Decimal,
    ) -> Result<TransferResult> {
        if from_account_id == to_account_id {
            return Err(LedgerError::InvalidArgument(
                "cannot transfer to the same account".to_string(),
            ));
        }
        let amount = Amount::new(amount)?;

        let mut txn = self.store.begin().await?;
        match Self::transfer_in_txn(txn.as_mut(), from_account_id, to_account_id, amount).await {
            Ok(result) => {
                txn.commit().await?;
                debug!(
                    transfer_id = result.transfer.id,
                    from_account_id,
                    to_account_id,
                    amount = %amount.value(),
                    "transfer committed"
                );
                Ok(result)
            }
            // Dropping the handle rolls the transaction back on every
            // failure path before the error reaches the caller.
            Err(err) => {
                drop(txn);
                Err(err)
            }
        }
    }

    async fn transfer_in_txn(
        txn: &mut dyn LedgerTxn,
        from_account_id: i64,
        to_account_id: i64,
        amount: Amount,
    ) -> Result<TransferResult> {
        let transfer = txn
            .create_transfer(from_account_id, to_account_id, amount)
            .await?;

        // Debit entry before credit entry, a fixed audit order independent
        // of the lock order below.
        let from_entry = txn
            .create_entry(from_account_id, Balance::new(-amount.value()))
            .await?;
        let to_entry = txn
            .create_entry(to_account_id, Balance::new(amount.value()))
            .await?;

        let (first, second) = lock_order(from_account_id, to_account_id);
        let delta = |account_id: i64| {
            if account_id == from_account_id {
                -amount.value()
            } else {
                amount.value()
            }
        };
        let first_account = apply_delta(txn, first, delta(first)).await?;
        let second_account = apply_delta(txn, second, delta(second)).await?;

        let (from_account, to_account) = if first == from_account_id {
            (first_account, second_account)
        } else {
            (second_account, first_account)
        };

        if from_account.balance.is_negative() {
            warn!(
                from_account_id,
                balance = %from_account.balance,
                "transfer rejected: would overdraw"
            );
            return Err(LedgerError::InsufficientBalance {
                account_id: from_account_id,
                balance: from_account.balance.0,
            });
        }

        Ok(TransferResult {
            transfer,
            from_entry,
            to_entry,
            from_account,
            to_account,
        })
    }

    /// Consumes the engine and returns the final state of all accounts.
    pub async fn into_results(self) -> Result<Vec<Account>> {
        self.store.list_accounts().await
    }
}
