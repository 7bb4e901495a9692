//! Operation counters for the service facade.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use bankledger_common::Result;

/// Service metrics.
#[derive(Debug, Default)]
pub struct ServiceMetrics {
    /// Total operations attempted.
    pub operations_total: AtomicU64,
    /// Operations that completed.
    pub operations_success: AtomicU64,
    /// Operations refused by a business rule.
    pub operations_rejected: AtomicU64,
    /// Operations that hit a storage or internal fault.
    pub operations_failed: AtomicU64,
    /// Transfers committed.
    pub transfers_committed: AtomicU64,
    /// Checks validated and credited.
    pub checks_validated: AtomicU64,
    /// Authentication attempts that did not match.
    pub authentication_failures: AtomicU64,
}

impl ServiceMetrics {
    /// Create new metrics instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one operation by its outcome.
    pub fn record<T>(&self, result: &Result<T>) {
        self.operations_total.fetch_add(1, Ordering::Relaxed);
        let counter = match result {
            Ok(_) => &self.operations_success,
            Err(e) if e.is_rejection() => &self.operations_rejected,
            Err(_) => &self.operations_failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn transfer_committed(&self) {
        self.transfers_committed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn check_validated(&self) {
        self.checks_validated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn authentication_failed(&self) {
        self.authentication_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            operations_total: self.operations_total.load(Ordering::Relaxed),
            operations_success: self.operations_success.load(Ordering::Relaxed),
            operations_rejected: self.operations_rejected.load(Ordering::Relaxed),
            operations_failed: self.operations_failed.load(Ordering::Relaxed),
            transfers_committed: self.transfers_committed.load(Ordering::Relaxed),
            checks_validated: self.checks_validated.load(Ordering::Relaxed),
            authentication_failures: self.authentication_failures.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub operations_total: u64,
    pub operations_success: u64,
    pub operations_rejected: u64,
    pub operations_failed: u64,
    pub transfers_committed: u64,
    pub checks_validated: u64,
    pub authentication_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use bankledger_common::{EntityKind, LedgerError};

    #[test]
    fn test_record_outcomes() {
        let metrics = ServiceMetrics::new();

        metrics.record(&Ok(()));
        metrics.record::<()>(&Err(LedgerError::not_found(EntityKind::Account, "A1")));
        metrics.record::<()>(&Err(LedgerError::StorageUnavailable("gone".into())));
        metrics.transfer_committed();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.operations_total, 3);
        assert_eq!(snapshot.operations_success, 1);
        assert_eq!(snapshot.operations_rejected, 1);
        assert_eq!(snapshot.operations_failed, 1);
        assert_eq!(snapshot.transfers_committed, 1);
    }
}
