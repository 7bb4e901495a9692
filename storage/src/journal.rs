//! Append-only journal of balance mutations.

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;
use uuid::Uuid;

use bankledger_common::{
    parse_balance, AccountId, EntityKind, EntryId, EntryType, JournalEntry, OperationId,
    OperationKind, Result,
};

use crate::error::{corrupt, storage_error, write_error};
use crate::store::Store;

const COLUMNS: &str =
    "entryId, operationId, operation, accountId, entryType, amount, balanceAfter, reference, createdAt";

fn entry_from_row(row: &SqliteRow) -> Result<JournalEntry> {
    let id: Uuid = row.try_get("entryId").map_err(storage_error)?;
    let operation_id: Uuid = row.try_get("operationId").map_err(storage_error)?;
    let operation: String = row.try_get("operation").map_err(storage_error)?;
    let entry_type: String = row.try_get("entryType").map_err(storage_error)?;
    let amount: String = row.try_get("amount").map_err(storage_error)?;
    let balance_after: String = row.try_get("balanceAfter").map_err(storage_error)?;
    let created_at: DateTime<Utc> = row.try_get("createdAt").map_err(storage_error)?;

    let bad = |reason: String| corrupt(EntityKind::JournalEntry, id, reason);

    Ok(JournalEntry {
        id: EntryId::from_uuid(id),
        operation_id: OperationId::from_uuid(operation_id),
        operation: operation.parse::<OperationKind>().map_err(bad)?,
        account_id: AccountId::new(row.try_get::<String, _>("accountId").map_err(storage_error)?),
        entry_type: entry_type.parse::<EntryType>().map_err(bad)?,
        amount: parse_balance(&amount).map_err(|e| bad(e.to_string()))?,
        balance_after: parse_balance(&balance_after).map_err(|e| bad(e.to_string()))?,
        reference: row.try_get("reference").map_err(storage_error)?,
        created_at,
    })
}

pub async fn append(conn: &mut SqliteConnection, entry: &JournalEntry) -> Result<()> {
    sqlx::query(
        "INSERT INTO ledger_entries \
         (entryId, operationId, operation, accountId, entryType, amount, balanceAfter, reference, createdAt) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(*entry.id.as_uuid())
    .bind(*entry.operation_id.as_uuid())
    .bind(entry.operation.as_str())
    .bind(entry.account_id.as_str())
    .bind(entry.entry_type.as_str())
    .bind(entry.amount.to_string())
    .bind(entry.balance_after.to_string())
    .bind(entry.reference.as_deref())
    .bind(entry.created_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| write_error(e, EntityKind::JournalEntry, entry.id))?;
    Ok(())
}

/// Entries touching one account, in insertion order.
pub async fn list_for_account(
    conn: &mut SqliteConnection,
    account_id: &AccountId,
) -> Result<Vec<JournalEntry>> {
    let sql = format!(
        "SELECT {} FROM ledger_entries WHERE accountId = ? ORDER BY rowid",
        COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(account_id.as_str())
        .fetch_all(&mut *conn)
        .await
        .map_err(storage_error)?;

    rows.iter().map(entry_from_row).collect()
}

/// Entries written by one operation, in insertion order.
pub async fn list_for_operation(
    conn: &mut SqliteConnection,
    operation_id: OperationId,
) -> Result<Vec<JournalEntry>> {
    let sql = format!(
        "SELECT {} FROM ledger_entries WHERE operationId = ? ORDER BY rowid",
        COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(*operation_id.as_uuid())
        .fetch_all(&mut *conn)
        .await
        .map_err(storage_error)?;

    rows.iter().map(entry_from_row).collect()
}

/// Entries of one operation kind, in insertion order.
pub async fn list_by_kind(
    conn: &mut SqliteConnection,
    kind: OperationKind,
) -> Result<Vec<JournalEntry>> {
    let sql = format!(
        "SELECT {} FROM ledger_entries WHERE operation = ? ORDER BY rowid",
        COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(kind.as_str())
        .fetch_all(&mut *conn)
        .await
        .map_err(storage_error)?;

    rows.iter().map(entry_from_row).collect()
}

/// The most recent entry of every account that has one, accountId ascending.
pub async fn latest_per_account(conn: &mut SqliteConnection) -> Result<Vec<JournalEntry>> {
    let sql = format!(
        "SELECT {} FROM ledger_entries AS e \
         WHERE e.rowid = (SELECT MAX(rowid) FROM ledger_entries WHERE accountId = e.accountId) \
         ORDER BY e.accountId",
        COLUMNS
    );
    let rows = sqlx::query(&sql)
        .fetch_all(&mut *conn)
        .await
        .map_err(storage_error)?;

    rows.iter().map(entry_from_row).collect()
}

/// Read access to the journal. Writes happen only inside ledger transactions.
#[derive(Clone)]
pub struct JournalRepository {
    store: Store,
}

impl JournalRepository {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn history_for_account(&self, account_id: &AccountId) -> Result<Vec<JournalEntry>> {
        let mut conn = self.store.acquire().await?;
        list_for_account(&mut conn, account_id).await
    }

    pub async fn entries_for_operation(&self, operation_id: OperationId) -> Result<Vec<JournalEntry>> {
        let mut conn = self.store.acquire().await?;
        list_for_operation(&mut conn, operation_id).await
    }

    pub async fn entries_of_kind(&self, kind: OperationKind) -> Result<Vec<JournalEntry>> {
        let mut conn = self.store.acquire().await?;
        list_by_kind(&mut conn, kind).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StorageConfig;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_append_and_read_back() {
        let store = Store::connect(StorageConfig::in_memory()).await.unwrap();
        store.bootstrap().await.unwrap();
        let journal = JournalRepository::new(store.clone());

        let op = OperationId::new();
        let debit = JournalEntry::debit(op, OperationKind::Transfer, "A".into(), dec!(20), dec!(80));
        let credit = JournalEntry::credit(op, OperationKind::Transfer, "B".into(), dec!(20), dec!(120))
            .with_reference("memo");

        let mut tx = store.begin_write().await.unwrap();
        append(tx.conn(), &debit).await.unwrap();
        append(tx.conn(), &credit).await.unwrap();
        tx.commit().await.unwrap();

        let entries = journal.entries_for_operation(op).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, debit.id);
        assert_eq!(entries[0].entry_type, EntryType::Debit);
        assert_eq!(entries[1].reference.as_deref(), Some("memo"));
        assert_eq!(entries[1].balance_after, dec!(120));

        let history = journal.history_for_account(&"A".into()).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].amount, dec!(20));

        assert_eq!(journal.entries_of_kind(OperationKind::Transfer).await.unwrap().len(), 2);
        assert!(journal.entries_of_kind(OperationKind::Deposit).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_latest_per_account() {
        let store = Store::connect(StorageConfig::in_memory()).await.unwrap();
        store.bootstrap().await.unwrap();

        let first = OperationId::new();
        let second = OperationId::new();
        let mut tx = store.begin_write().await.unwrap();
        for entry in [
            JournalEntry::credit(first, OperationKind::Deposit, "B".into(), dec!(5), dec!(105)),
            JournalEntry::debit(second, OperationKind::Transfer, "B".into(), dec!(10), dec!(95)),
            JournalEntry::credit(second, OperationKind::Transfer, "A".into(), dec!(10), dec!(10)),
        ] {
            append(tx.conn(), &entry).await.unwrap();
        }
        tx.commit().await.unwrap();

        let mut conn = store.acquire().await.unwrap();
        let latest = latest_per_account(&mut conn).await.unwrap();
        let summary: Vec<(&str, _)> = latest
            .iter()
            .map(|e| (e.account_id.as_str(), e.balance_after))
            .collect();
        assert_eq!(summary, vec![("A", dec!(10)), ("B", dec!(95))]);
    }
}
