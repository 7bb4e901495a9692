//! Check persistence.

use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;
use tracing::info;

use bankledger_common::{
    parse_balance, AccountId, Amount, Check, CheckId, EntityKind, LedgerError, Result,
};

use crate::error::{corrupt, storage_error, write_error};
use crate::store::Store;

const SELECT_BY_ID: &str =
    "SELECT checkId, amount, accountId, isValidated FROM checks WHERE checkId = ?";
const SELECT_UNVALIDATED: &str = "SELECT checkId, amount, accountId, isValidated FROM checks \
     WHERE accountId = ? AND isValidated = 0 ORDER BY checkId";

fn check_from_row(row: &SqliteRow) -> Result<Check> {
    let check_id: String = row.try_get("checkId").map_err(storage_error)?;
    let raw_amount: String = row.try_get("amount").map_err(storage_error)?;
    let amount = parse_balance(&raw_amount).map_err(|e| corrupt(EntityKind::Check, &check_id, e))?;

    Ok(Check {
        check_id: CheckId::new(check_id),
        amount,
        account_id: AccountId::new(row.try_get::<String, _>("accountId").map_err(storage_error)?),
        is_validated: row.try_get("isValidated").map_err(storage_error)?,
    })
}

pub async fn insert(conn: &mut SqliteConnection, check: &Check) -> Result<()> {
    sqlx::query("INSERT INTO checks (checkId, amount, accountId, isValidated) VALUES (?, ?, ?, ?)")
        .bind(check.check_id.as_str())
        .bind(check.amount.to_string())
        .bind(check.account_id.as_str())
        .bind(check.is_validated)
        .execute(&mut *conn)
        .await
        .map_err(|e| write_error(e, EntityKind::Check, &check.check_id))?;
    Ok(())
}

pub async fn fetch(conn: &mut SqliteConnection, id: &CheckId) -> Result<Option<Check>> {
    let row = sqlx::query(SELECT_BY_ID)
        .bind(id.as_str())
        .fetch_optional(&mut *conn)
        .await
        .map_err(storage_error)?;

    row.as_ref().map(check_from_row).transpose()
}

pub async fn replace(conn: &mut SqliteConnection, check: &Check) -> Result<()> {
    let result =
        sqlx::query("UPDATE checks SET amount = ?, accountId = ?, isValidated = ? WHERE checkId = ?")
            .bind(check.amount.to_string())
            .bind(check.account_id.as_str())
            .bind(check.is_validated)
            .bind(check.check_id.as_str())
            .execute(&mut *conn)
            .await
            .map_err(|e| write_error(e, EntityKind::Check, &check.check_id))?;

    if result.rows_affected() == 0 {
        return Err(LedgerError::not_found(EntityKind::Check, &check.check_id));
    }
    Ok(())
}

/// Flip an unvalidated check to validated.
///
/// Returns `false` when no unvalidated row matched, so a check can only
/// transition once.
pub async fn mark_validated(conn: &mut SqliteConnection, id: &CheckId) -> Result<bool> {
    let result = sqlx::query("UPDATE checks SET isValidated = 1 WHERE checkId = ? AND isValidated = 0")
        .bind(id.as_str())
        .execute(&mut *conn)
        .await
        .map_err(storage_error)?;

    Ok(result.rows_affected() == 1)
}

pub async fn delete(conn: &mut SqliteConnection, id: &CheckId) -> Result<()> {
    let result = sqlx::query("DELETE FROM checks WHERE checkId = ?")
        .bind(id.as_str())
        .execute(&mut *conn)
        .await
        .map_err(|e| write_error(e, EntityKind::Check, id))?;

    if result.rows_affected() == 0 {
        return Err(LedgerError::not_found(EntityKind::Check, id));
    }
    Ok(())
}

/// Unvalidated checks for one account, checkId ascending.
pub async fn list_unvalidated_for_account(
    conn: &mut SqliteConnection,
    account_id: &AccountId,
) -> Result<Vec<Check>> {
    let rows = sqlx::query(SELECT_UNVALIDATED)
        .bind(account_id.as_str())
        .fetch_all(&mut *conn)
        .await
        .map_err(storage_error)?;

    rows.iter().map(check_from_row).collect()
}

/// Typed CRUD over the `checks` table.
#[derive(Clone)]
pub struct CheckRepository {
    store: Store,
}

impl CheckRepository {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Insert a check row as given; `DuplicateKey` if the id is taken.
    ///
    /// The amount must be a valid positive [`Amount`].
    pub async fn add(&self, check: &Check) -> Result<()> {
        if !check.check_id.is_valid() {
            return Err(LedgerError::InvalidId {
                entity: EntityKind::Check,
                id: check.check_id.to_string(),
            });
        }
        Amount::new(check.amount)?;

        let mut tx = self.store.begin_write().await?;
        insert(tx.conn(), check).await?;
        tx.commit().await?;

        info!(check = %check.check_id, account = %check.account_id, "Check added");
        Ok(())
    }

    /// Delete a check; `NotFound` if absent.
    pub async fn remove(&self, id: &CheckId) -> Result<()> {
        let mut tx = self.store.begin_write().await?;
        delete(tx.conn(), id).await?;
        tx.commit().await?;

        info!(check = %id, "Check removed");
        Ok(())
    }

    pub async fn find(&self, id: &CheckId) -> Result<Option<Check>> {
        let mut conn = self.store.acquire().await?;
        fetch(&mut conn, id).await
    }

    /// Replace amount and account; `NotFound` if absent.
    ///
    /// The validation flag is owned by the ledger's check validation, which
    /// credits the account in the same transaction. Any attempt to change it
    /// here is an `InvariantViolation`.
    pub async fn update(&self, check: &Check) -> Result<()> {
        Amount::new(check.amount)?;

        let mut tx = self.store.begin_write().await?;
        let current = fetch(tx.conn(), &check.check_id)
            .await?
            .ok_or_else(|| LedgerError::not_found(EntityKind::Check, &check.check_id))?;

        if current.is_validated != check.is_validated {
            return Err(LedgerError::InvariantViolation(format!(
                "check {} validation state can only change through validation",
                check.check_id
            )));
        }

        replace(tx.conn(), check).await?;
        tx.commit().await?;

        info!(check = %check.check_id, "Check updated");
        Ok(())
    }

    pub async fn list_unvalidated_for_account(&self, account_id: &AccountId) -> Result<Vec<Check>> {
        let mut conn = self.store.acquire().await?;
        list_unvalidated_for_account(&mut conn, account_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AccountRepository, StorageConfig, UserRepository};
    use bankledger_common::{Account, User};
    use rust_decimal_macros::dec;

    async fn repository() -> CheckRepository {
        let store = Store::connect(StorageConfig::in_memory()).await.unwrap();
        store.bootstrap().await.unwrap();
        UserRepository::new(store.clone())
            .add(&User::new("owner", "pw", "client"))
            .await
            .unwrap();
        let accounts = AccountRepository::new(store.clone());
        accounts.add(&Account::new("A1", dec!(100), "owner")).await.unwrap();
        accounts.add(&Account::new("A2", dec!(100), "owner")).await.unwrap();
        CheckRepository::new(store)
    }

    #[tokio::test]
    async fn test_add_find_remove() {
        let checks = repository().await;
        let check = Check::new("C1", dec!(50), "A1");

        checks.add(&check).await.unwrap();
        assert_eq!(checks.find(&check.check_id).await.unwrap(), Some(check.clone()));

        checks.remove(&check.check_id).await.unwrap();
        assert!(checks.find(&check.check_id).await.unwrap().is_none());
        assert!(matches!(
            checks.remove(&check.check_id).await,
            Err(LedgerError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_mark_validated_only_once() {
        let checks = repository().await;
        checks.add(&Check::new("C1", dec!(50), "A1")).await.unwrap();

        let mut conn = checks.store.acquire().await.unwrap();
        let id = CheckId::new("C1");
        assert!(mark_validated(&mut conn, &id).await.unwrap());
        assert!(!mark_validated(&mut conn, &id).await.unwrap());
        assert!(!mark_validated(&mut conn, &CheckId::new("nope")).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_unvalidated_filters_and_sorts() {
        let checks = repository().await;
        checks.add(&Check::new("C2", dec!(1), "A1")).await.unwrap();
        checks.add(&Check::new("C1", dec!(2), "A1")).await.unwrap();
        checks.add(&Check::new("C3", dec!(3), "A2")).await.unwrap();
        let mut validated = Check::new("C0", dec!(4), "A1");
        validated.is_validated = true;
        checks.add(&validated).await.unwrap();

        let listed = checks
            .list_unvalidated_for_account(&AccountId::new("A1"))
            .await
            .unwrap();
        let ids: Vec<&str> = listed.iter().map(|c| c.check_id.as_str()).collect();
        assert_eq!(ids, vec!["C1", "C2"]);
        assert!(listed.iter().all(|c| !c.is_validated));
    }

    #[tokio::test]
    async fn test_validated_check_cannot_revert() {
        let checks = repository().await;
        let mut check = Check::new("C1", dec!(50), "A1");
        check.is_validated = true;
        checks.add(&check).await.unwrap();

        check.is_validated = false;
        let err = checks.update(&check).await.unwrap_err();
        assert_eq!(err.error_code(), "INVARIANT_VIOLATION");
    }

    #[tokio::test]
    async fn test_update_cannot_validate() {
        let checks = repository().await;
        let mut check = Check::new("C1", dec!(50), "A1");
        checks.add(&check).await.unwrap();

        check.is_validated = true;
        let err = checks.update(&check).await.unwrap_err();
        assert_eq!(err.error_code(), "INVARIANT_VIOLATION");

        let stored = checks.find(&check.check_id).await.unwrap().unwrap();
        assert!(!stored.is_validated);
        assert_eq!(
            checks
                .list_unvalidated_for_account(&AccountId::new("A1"))
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_update_amount_and_account() {
        let checks = repository().await;
        checks.add(&Check::new("C1", dec!(50), "A1")).await.unwrap();

        let moved = Check::new("C1", dec!(75.25), "A2");
        checks.update(&moved).await.unwrap();
        assert_eq!(checks.find(&moved.check_id).await.unwrap(), Some(moved));

        assert!(checks
            .list_unvalidated_for_account(&AccountId::new("A1"))
            .await
            .unwrap()
            .is_empty());
        let pending = checks
            .list_unvalidated_for_account(&AccountId::new("A2"))
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].amount, dec!(75.25));
    }

    #[tokio::test]
    async fn test_update_absent_check() {
        let checks = repository().await;
        let err = checks
            .update(&Check::new("C9", dec!(1), "A1"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::NotFound {
                entity: EntityKind::Check,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_non_positive_amount_rejected() {
        let checks = repository().await;
        for amount in [dec!(0), dec!(-10)] {
            let err = checks
                .add(&Check::new("C1", amount, "A1"))
                .await
                .unwrap_err();
            assert_eq!(err.error_code(), "INVALID_AMOUNT");
        }
        assert!(checks.find(&CheckId::new("C1")).await.unwrap().is_none());

        checks.add(&Check::new("C1", dec!(5), "A1")).await.unwrap();
        let err = checks
            .update(&Check::new("C1", dec!(0), "A1"))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_AMOUNT");
    }

    #[tokio::test]
    async fn test_update_to_unknown_account() {
        let checks = repository().await;
        checks.add(&Check::new("C1", dec!(5), "A1")).await.unwrap();
        let err = checks
            .update(&Check::new("C1", dec!(5), "missing"))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "REFERENCE_VIOLATION");
    }

    #[tokio::test]
    async fn test_check_for_unknown_account() {
        let checks = repository().await;
        let err = checks
            .add(&Check::new("C1", dec!(5), "missing"))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "REFERENCE_VIOLATION");
    }
}
