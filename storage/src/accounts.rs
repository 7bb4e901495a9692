//! Account persistence.

use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;
use tracing::info;

use bankledger_common::{parse_balance, Account, AccountId, EntityKind, LedgerError, Result, UserId};

use crate::error::{corrupt, storage_error, write_error};
use crate::store::Store;

fn account_from_row(row: &SqliteRow) -> Result<Account> {
    let account_id: String = row.try_get("accountId").map_err(storage_error)?;
    let raw_balance: String = row.try_get("balance").map_err(storage_error)?;
    let balance = parse_balance(&raw_balance)
        .map_err(|e| corrupt(EntityKind::Account, &account_id, e))?;

    Ok(Account {
        account_id: AccountId::new(account_id),
        balance,
        owner_id: UserId::new(row.try_get::<String, _>("ownerId").map_err(storage_error)?),
    })
}

pub async fn insert(conn: &mut SqliteConnection, account: &Account) -> Result<()> {
    sqlx::query("INSERT INTO accounts (accountId, balance, ownerId) VALUES (?, ?, ?)")
        .bind(account.account_id.as_str())
        .bind(account.balance.to_string())
        .bind(account.owner_id.as_str())
        .execute(&mut *conn)
        .await
        .map_err(|e| write_error(e, EntityKind::Account, &account.account_id))?;
    Ok(())
}

pub async fn fetch(conn: &mut SqliteConnection, id: &AccountId) -> Result<Option<Account>> {
    let row = sqlx::query("SELECT accountId, balance, ownerId FROM accounts WHERE accountId = ?")
        .bind(id.as_str())
        .fetch_optional(&mut *conn)
        .await
        .map_err(storage_error)?;

    row.as_ref().map(account_from_row).transpose()
}

/// Fetch an account that must exist.
pub async fn fetch_existing(conn: &mut SqliteConnection, id: &AccountId) -> Result<Account> {
    fetch(conn, id)
        .await?
        .ok_or_else(|| LedgerError::not_found(EntityKind::Account, id))
}

pub async fn replace(conn: &mut SqliteConnection, account: &Account) -> Result<()> {
    let result = sqlx::query("UPDATE accounts SET balance = ?, ownerId = ? WHERE accountId = ?")
        .bind(account.balance.to_string())
        .bind(account.owner_id.as_str())
        .bind(account.account_id.as_str())
        .execute(&mut *conn)
        .await
        .map_err(|e| write_error(e, EntityKind::Account, &account.account_id))?;

    if result.rows_affected() == 0 {
        return Err(LedgerError::not_found(EntityKind::Account, &account.account_id));
    }
    Ok(())
}

/// Overwrite the balance of an existing account.
pub async fn set_balance(conn: &mut SqliteConnection, id: &AccountId, balance: Decimal) -> Result<()> {
    let result = sqlx::query("UPDATE accounts SET balance = ? WHERE accountId = ?")
        .bind(balance.to_string())
        .bind(id.as_str())
        .execute(&mut *conn)
        .await
        .map_err(storage_error)?;

    if result.rows_affected() == 0 {
        return Err(LedgerError::not_found(EntityKind::Account, id));
    }
    Ok(())
}

pub async fn delete(conn: &mut SqliteConnection, id: &AccountId) -> Result<()> {
    let result = sqlx::query("DELETE FROM accounts WHERE accountId = ?")
        .bind(id.as_str())
        .execute(&mut *conn)
        .await
        .map_err(|e| write_error(e, EntityKind::Account, id))?;

    if result.rows_affected() == 0 {
        return Err(LedgerError::not_found(EntityKind::Account, id));
    }
    Ok(())
}

/// All accounts of one owner, accountId ascending.
pub async fn list_for_owner(conn: &mut SqliteConnection, owner: &UserId) -> Result<Vec<Account>> {
    let rows = sqlx::query(
        "SELECT accountId, balance, ownerId FROM accounts WHERE ownerId = ? ORDER BY accountId",
    )
    .bind(owner.as_str())
    .fetch_all(&mut *conn)
    .await
    .map_err(storage_error)?;

    rows.iter().map(account_from_row).collect()
}

/// Every account, accountId ascending.
pub async fn list_all(conn: &mut SqliteConnection) -> Result<Vec<Account>> {
    let rows = sqlx::query("SELECT accountId, balance, ownerId FROM accounts ORDER BY accountId")
        .fetch_all(&mut *conn)
        .await
        .map_err(storage_error)?;

    rows.iter().map(account_from_row).collect()
}

/// Typed CRUD over the `accounts` table.
///
/// `update` is an administrative full-row replace; routine balance changes
/// go through the ledger engine so they are journaled.
#[derive(Clone)]
pub struct AccountRepository {
    store: Store,
}

impl AccountRepository {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Insert an account; `DuplicateKey` if the id is taken.
    pub async fn add(&self, account: &Account) -> Result<()> {
        if !account.account_id.is_valid() {
            return Err(LedgerError::InvalidId {
                entity: EntityKind::Account,
                id: account.account_id.to_string(),
            });
        }

        let mut tx = self.store.begin_write().await?;
        insert(tx.conn(), account).await?;
        tx.commit().await?;

        info!(
            account = %account.account_id,
            owner = %account.owner_id,
            balance = %account.balance,
            "Account added"
        );
        Ok(())
    }

    /// Delete an account; `NotFound` if absent.
    pub async fn remove(&self, id: &AccountId) -> Result<()> {
        let mut tx = self.store.begin_write().await?;
        delete(tx.conn(), id).await?;
        tx.commit().await?;

        info!(account = %id, "Account removed");
        Ok(())
    }

    pub async fn find(&self, id: &AccountId) -> Result<Option<Account>> {
        let mut conn = self.store.acquire().await?;
        fetch(&mut conn, id).await
    }

    /// Replace balance and owner; `NotFound` if absent.
    pub async fn update(&self, account: &Account) -> Result<()> {
        let mut tx = self.store.begin_write().await?;
        replace(tx.conn(), account).await?;
        tx.commit().await?;

        info!(account = %account.account_id, "Account updated");
        Ok(())
    }

    pub async fn list_for_owner(&self, owner: &UserId) -> Result<Vec<Account>> {
        let mut conn = self.store.acquire().await?;
        list_for_owner(&mut conn, owner).await
    }

    pub async fn list_all(&self) -> Result<Vec<Account>> {
        let mut conn = self.store.acquire().await?;
        list_all(&mut conn).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{StorageConfig, UserRepository};
    use bankledger_common::User;
    use rust_decimal_macros::dec;

    async fn repositories() -> (UserRepository, AccountRepository) {
        let store = Store::connect(StorageConfig::in_memory()).await.unwrap();
        store.bootstrap().await.unwrap();
        let users = UserRepository::new(store.clone());
        users.add(&User::new("owner", "pw", "client")).await.unwrap();
        (users, AccountRepository::new(store))
    }

    #[tokio::test]
    async fn test_round_trip_preserves_precision() {
        let (_, accounts) = repositories().await;
        let account = Account::new("A1", dec!(1234567890.12345678), "owner");

        accounts.add(&account).await.unwrap();

        let found = accounts.find(&account.account_id).await.unwrap().unwrap();
        assert_eq!(found, account);
        assert_eq!(found.balance.to_string(), "1234567890.12345678");
    }

    #[tokio::test]
    async fn test_duplicate_account() {
        let (_, accounts) = repositories().await;
        accounts.add(&Account::new("A1", dec!(0), "owner")).await.unwrap();

        let err = accounts
            .add(&Account::new("A1", dec!(5), "owner"))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "DUPLICATE_KEY");
    }

    #[tokio::test]
    async fn test_unknown_owner_violates_reference() {
        let (_, accounts) = repositories().await;
        let err = accounts
            .add(&Account::new("A1", dec!(0), "nobody"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::ReferenceViolation {
                entity: EntityKind::Account,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_update_and_remove() {
        let (users, accounts) = repositories().await;
        users.add(&User::new("heir", "pw", "client")).await.unwrap();
        accounts.add(&Account::new("A1", dec!(10), "owner")).await.unwrap();

        let moved = Account::new("A1", dec!(10), "heir");
        accounts.update(&moved).await.unwrap();
        assert_eq!(accounts.find(&moved.account_id).await.unwrap(), Some(moved));

        accounts.remove(&AccountId::new("A1")).await.unwrap();
        let err = accounts.remove(&AccountId::new("A1")).await.unwrap_err();
        assert!(matches!(err, LedgerError::NotFound { .. }));

        let err = accounts
            .update(&Account::new("A1", dec!(1), "owner"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_list_for_owner_is_sorted() {
        let (users, accounts) = repositories().await;
        users.add(&User::new("other", "pw", "client")).await.unwrap();
        for id in ["C", "A", "B"] {
            accounts.add(&Account::new(id, dec!(1), "owner")).await.unwrap();
        }
        accounts.add(&Account::new("Z", dec!(1), "other")).await.unwrap();

        let ids: Vec<String> = accounts
            .list_for_owner(&UserId::new("owner"))
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.account_id.into_inner())
            .collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
        assert_eq!(accounts.list_all().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_owner_with_accounts_cannot_be_removed() {
        let (users, accounts) = repositories().await;
        accounts.add(&Account::new("A1", dec!(0), "owner")).await.unwrap();

        let err = users.remove(&UserId::new("owner")).await.unwrap_err();
        assert_eq!(err.error_code(), "REFERENCE_VIOLATION");
    }

    #[tokio::test]
    async fn test_corrupt_balance_is_reported() {
        let (_, accounts) = repositories().await;
        accounts.add(&Account::new("A1", dec!(0), "owner")).await.unwrap();

        let mut conn = accounts.store.acquire().await.unwrap();
        sqlx::query("UPDATE accounts SET balance = 'lots' WHERE accountId = 'A1'")
            .execute(&mut *conn)
            .await
            .unwrap();

        let err = fetch(&mut conn, &AccountId::new("A1")).await.unwrap_err();
        assert!(matches!(err, LedgerError::CorruptRow { .. }));
    }
}
