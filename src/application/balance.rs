use crate::domain::account::{Account, Balance};
use crate::domain::ports::LedgerTxn;
use crate::error::Result;
use rust_decimal::Decimal;

/// Applies a signed delta to one account inside an open transaction.
///
/// Read-for-update acquires the row lock, which the transaction holds until
/// it commits or rolls back; the write goes through the same lock. Fails with
/// `AccountNotFound` if the row no longer exists, aborting the enclosing
/// transfer.
pub async fn apply_delta(
    txn: &mut dyn LedgerTxn,
    account_id: i64,
    delta: Decimal,
) -> Result<Account> {
    let account = txn.get_account_for_update(account_id).await?;
    let updated = account.balance + Balance::new(delta);
    txn.update_locked_balance(account_id, updated).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::Currency;
    use crate::domain::ports::LedgerStore;
    use crate::error::LedgerError;
    use crate::infrastructure::in_memory::InMemoryLedger;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_apply_delta_is_staged_until_commit() {
        let store = InMemoryLedger::new();
        let account = store
            .create_account("alice".into(), Currency::Usd, Balance::new(dec!(100.0)))
            .await
            .unwrap();

        let mut txn = store.begin().await.unwrap();
        let updated = apply_delta(txn.as_mut(), account.id, dec!(-30.0))
            .await
            .unwrap();
        assert_eq!(updated.balance, Balance::new(dec!(70.0)));

        txn.commit().await.unwrap();
        let committed = store.get_account(account.id).await.unwrap().unwrap();
        assert_eq!(committed.balance, Balance::new(dec!(70.0)));
    }

    #[tokio::test]
    async fn test_apply_delta_rolls_back_on_drop() {
        let store = InMemoryLedger::new();
        let account = store
            .create_account("bob".into(), Currency::Eur, Balance::new(dec!(50.0)))
            .await
            .unwrap();

        let mut txn = store.begin().await.unwrap();
        apply_delta(txn.as_mut(), account.id, dec!(-20.0))
            .await
            .unwrap();
        drop(txn);

        let unchanged = store.get_account(account.id).await.unwrap().unwrap();
        assert_eq!(unchanged.balance, Balance::new(dec!(50.0)));
    }

    #[tokio::test]
    async fn test_apply_delta_missing_account() {
        let store = InMemoryLedger::new();
        let mut txn = store.begin().await.unwrap();

        let err = apply_delta(txn.as_mut(), 404, dec!(1.0)).await.unwrap_err();
        assert!(matches!(err, LedgerError::AccountNotFound(404)));
    }
}
