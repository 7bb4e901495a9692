//! Classification of sqlx failures into [`LedgerError`].

use std::fmt;

use bankledger_common::{EntityKind, LedgerError};
use sqlx::error::ErrorKind;

/// Map a sqlx error raised outside any specific row context.
pub(crate) fn storage_error(err: sqlx::Error) -> LedgerError {
    match err {
        sqlx::Error::PoolTimedOut => {
            LedgerError::Timeout("timed out acquiring a database connection".to_string())
        }
        sqlx::Error::PoolClosed => {
            LedgerError::StorageUnavailable("connection pool is closed".to_string())
        }
        sqlx::Error::Io(e) => LedgerError::StorageUnavailable(e.to_string()),
        sqlx::Error::Tls(e) => LedgerError::StorageUnavailable(e.to_string()),
        sqlx::Error::Protocol(msg) => LedgerError::StorageUnavailable(msg),
        sqlx::Error::WorkerCrashed => {
            LedgerError::StorageUnavailable("sqlite worker thread crashed".to_string())
        }
        other => LedgerError::Storage(other.to_string()),
    }
}

/// Map a sqlx error raised while writing a specific row.
pub(crate) fn write_error(err: sqlx::Error, entity: EntityKind, id: impl fmt::Display) -> LedgerError {
    if let sqlx::Error::Database(db_err) = &err {
        match db_err.kind() {
            ErrorKind::UniqueViolation => return LedgerError::duplicate(entity, id),
            ErrorKind::ForeignKeyViolation => {
                return LedgerError::ReferenceViolation {
                    entity,
                    id: id.to_string(),
                }
            }
            _ => {}
        }
    }
    storage_error(err)
}

/// Map a column that decoded but held an invalid value.
pub(crate) fn corrupt(entity: EntityKind, id: impl fmt::Display, reason: impl fmt::Display) -> LedgerError {
    LedgerError::CorruptRow {
        entity,
        id: id.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_errors_are_classified() {
        assert!(matches!(
            storage_error(sqlx::Error::PoolTimedOut),
            LedgerError::Timeout(_)
        ));
        assert!(matches!(
            storage_error(sqlx::Error::PoolClosed),
            LedgerError::StorageUnavailable(_)
        ));
        assert!(matches!(
            storage_error(sqlx::Error::RowNotFound),
            LedgerError::Storage(_)
        ));
    }

    #[test]
    fn test_non_database_write_error_falls_through() {
        let err = write_error(sqlx::Error::PoolClosed, EntityKind::Account, "A1");
        assert_eq!(err.error_code(), "STORAGE_UNAVAILABLE");
    }
}
