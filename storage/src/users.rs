//! User persistence.

use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;
use tracing::info;

use bankledger_common::{EntityKind, LedgerError, Result, User, UserId};

use crate::error::{storage_error, write_error};
use crate::store::Store;

fn user_from_row(row: &SqliteRow) -> Result<User> {
    Ok(User {
        id: UserId::new(row.try_get::<String, _>("id").map_err(storage_error)?),
        password: row.try_get("password").map_err(storage_error)?,
        role: row.try_get("role").map_err(storage_error)?,
    })
}

pub async fn insert(conn: &mut SqliteConnection, user: &User) -> Result<()> {
    sqlx::query("INSERT INTO users (id, password, role) VALUES (?, ?, ?)")
        .bind(user.id.as_str())
        .bind(&user.password)
        .bind(&user.role)
        .execute(&mut *conn)
        .await
        .map_err(|e| write_error(e, EntityKind::User, &user.id))?;
    Ok(())
}

pub async fn fetch(conn: &mut SqliteConnection, id: &UserId) -> Result<Option<User>> {
    let row = sqlx::query("SELECT id, password, role FROM users WHERE id = ?")
        .bind(id.as_str())
        .fetch_optional(&mut *conn)
        .await
        .map_err(storage_error)?;

    row.as_ref().map(user_from_row).transpose()
}

pub async fn replace(conn: &mut SqliteConnection, user: &User) -> Result<()> {
    let result = sqlx::query("UPDATE users SET password = ?, role = ? WHERE id = ?")
        .bind(&user.password)
        .bind(&user.role)
        .bind(user.id.as_str())
        .execute(&mut *conn)
        .await
        .map_err(|e| write_error(e, EntityKind::User, &user.id))?;

    if result.rows_affected() == 0 {
        return Err(LedgerError::not_found(EntityKind::User, &user.id));
    }
    Ok(())
}

pub async fn delete(conn: &mut SqliteConnection, id: &UserId) -> Result<()> {
    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id.as_str())
        .execute(&mut *conn)
        .await
        .map_err(|e| write_error(e, EntityKind::User, id))?;

    if result.rows_affected() == 0 {
        return Err(LedgerError::not_found(EntityKind::User, id));
    }
    Ok(())
}

/// Typed CRUD over the `users` table.
#[derive(Clone)]
pub struct UserRepository {
    store: Store,
}

impl UserRepository {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Insert a user; `DuplicateKey` if the id is taken.
    pub async fn add(&self, user: &User) -> Result<()> {
        if !user.id.is_valid() {
            return Err(LedgerError::InvalidId {
                entity: EntityKind::User,
                id: user.id.to_string(),
            });
        }

        let mut tx = self.store.begin_write().await?;
        insert(tx.conn(), user).await?;
        tx.commit().await?;

        info!(user = %user.id, role = %user.role, "User added");
        Ok(())
    }

    /// Delete a user; `NotFound` if absent.
    pub async fn remove(&self, id: &UserId) -> Result<()> {
        let mut tx = self.store.begin_write().await?;
        delete(tx.conn(), id).await?;
        tx.commit().await?;

        info!(user = %id, "User removed");
        Ok(())
    }

    pub async fn find(&self, id: &UserId) -> Result<Option<User>> {
        let mut conn = self.store.acquire().await?;
        fetch(&mut conn, id).await
    }

    /// Replace password and role; `NotFound` if absent.
    pub async fn update(&self, user: &User) -> Result<()> {
        let mut tx = self.store.begin_write().await?;
        replace(tx.conn(), user).await?;
        tx.commit().await?;

        info!(user = %user.id, "User updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StorageConfig;

    async fn repository() -> UserRepository {
        let store = Store::connect(StorageConfig::in_memory()).await.unwrap();
        store.bootstrap().await.unwrap();
        UserRepository::new(store)
    }

    #[tokio::test]
    async fn test_add_and_find() {
        let users = repository().await;
        let user = User::new("alice", "pw", "client");

        users.add(&user).await.unwrap();

        assert_eq!(users.find(&user.id).await.unwrap(), Some(user));
        assert_eq!(users.find(&UserId::new("bob")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_duplicate_id() {
        let users = repository().await;
        users.add(&User::new("alice", "pw", "client")).await.unwrap();

        let err = users
            .add(&User::new("alice", "other", "admin"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::DuplicateKey {
                entity: EntityKind::User,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_invalid_id_rejected() {
        let users = repository().await;
        let err = users.add(&User::new("", "pw", "client")).await.unwrap_err();
        assert_eq!(err.error_code(), "INVALID_ID");
    }

    #[tokio::test]
    async fn test_update() {
        let users = repository().await;
        users.add(&User::new("alice", "pw", "client")).await.unwrap();

        let updated = User::new("alice", "pw2", "admin");
        users.update(&updated).await.unwrap();
        assert_eq!(users.find(&updated.id).await.unwrap(), Some(updated));

        let err = users
            .update(&User::new("ghost", "pw", "client"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_remove_absent_is_not_found() {
        let users = repository().await;
        users.add(&User::new("alice", "pw", "client")).await.unwrap();

        users.remove(&UserId::new("alice")).await.unwrap();
        assert!(users.find(&UserId::new("alice")).await.unwrap().is_none());

        let err = users.remove(&UserId::new("alice")).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::NotFound {
                entity: EntityKind::User,
                ..
            }
        ));
    }
}
