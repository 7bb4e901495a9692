//! Journal batches: the entries one ledger operation commits together.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use bankledger_common::{checked_sum, EntryType, JournalEntry, OperationId, OperationKind};

/// A batch of journal entries that must be committed together.
#[derive(Debug, Clone)]
pub struct JournalBatch {
    /// Operation every entry belongs to.
    pub operation_id: OperationId,
    /// Kind of operation.
    pub operation: OperationKind,
    entries: Vec<JournalEntry>,
}

impl JournalBatch {
    /// Create a new batch.
    pub fn new(operation_id: OperationId, operation: OperationKind) -> Self {
        Self {
            operation_id,
            operation,
            entries: Vec::new(),
        }
    }

    /// Add an entry to the batch.
    pub fn add_entry(&mut self, entry: JournalEntry) {
        debug_assert_eq!(entry.operation_id, self.operation_id);
        self.entries.push(entry);
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    /// Verify the batch is balanced (debits == credits).
    ///
    /// A side whose total overflows never balances.
    pub fn is_balanced(&self) -> bool {
        match (self.total_debits(), self.total_credits()) {
            (Some(debits), Some(credits)) => debits == credits,
            _ => false,
        }
    }

    /// Get total debits; `None` on overflow.
    pub fn total_debits(&self) -> Option<Decimal> {
        self.sum_of(EntryType::Debit)
    }

    /// Get total credits; `None` on overflow.
    pub fn total_credits(&self) -> Option<Decimal> {
        self.sum_of(EntryType::Credit)
    }

    fn sum_of(&self, entry_type: EntryType) -> Option<Decimal> {
        checked_sum(
            self.entries
                .iter()
                .filter(|e| e.entry_type == entry_type)
                .map(|e| e.amount),
        )
    }

    /// Regroup a flat list of entries into per-operation batches.
    pub fn group(entries: Vec<JournalEntry>) -> Vec<JournalBatch> {
        let mut batches: BTreeMap<OperationId, JournalBatch> = BTreeMap::new();
        for entry in entries {
            batches
                .entry(entry.operation_id)
                .or_insert_with(|| JournalBatch::new(entry.operation_id, entry.operation))
                .add_entry(entry);
        }
        batches.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_balanced_batch() {
        let op = OperationId::new();
        let mut batch = JournalBatch::new(op, OperationKind::Transfer);

        batch.add_entry(JournalEntry::debit(op, OperationKind::Transfer, "A1".into(), dec!(1000), dec!(0)));
        batch.add_entry(JournalEntry::credit(op, OperationKind::Transfer, "A2".into(), dec!(1000), dec!(2000)));

        assert!(batch.is_balanced());
        assert_eq!(batch.total_debits(), Some(dec!(1000)));
        assert_eq!(batch.total_credits(), Some(dec!(1000)));
    }

    #[test]
    fn test_unbalanced_batch() {
        let op = OperationId::new();
        let mut batch = JournalBatch::new(op, OperationKind::Deposit);

        batch.add_entry(JournalEntry::credit(op, OperationKind::Deposit, "A1".into(), dec!(50), dec!(150)));

        assert!(!batch.is_balanced());
    }

    #[test]
    fn test_overflowing_side_is_unbalanced() {
        let op = OperationId::new();
        let mut batch = JournalBatch::new(op, OperationKind::Transfer);

        batch.add_entry(JournalEntry::debit(op, OperationKind::Transfer, "A1".into(), Decimal::MAX, dec!(0)));
        batch.add_entry(JournalEntry::debit(op, OperationKind::Transfer, "A1".into(), dec!(1), dec!(0)));
        batch.add_entry(JournalEntry::credit(op, OperationKind::Transfer, "A2".into(), Decimal::MAX, Decimal::MAX));

        assert_eq!(batch.total_debits(), None);
        assert!(!batch.is_balanced());
    }

    #[test]
    fn test_group_by_operation() {
        let first = OperationId::new();
        let second = OperationId::new();
        let entries = vec![
            JournalEntry::debit(first, OperationKind::Transfer, "A".into(), dec!(5), dec!(5)),
            JournalEntry::credit(second, OperationKind::Deposit, "B".into(), dec!(1), dec!(1)),
            JournalEntry::credit(first, OperationKind::Transfer, "B".into(), dec!(5), dec!(6)),
        ];

        let batches = JournalBatch::group(entries);
        assert_eq!(batches.len(), 2);
        let transfer = batches.iter().find(|b| b.operation_id == first).unwrap();
        assert_eq!(transfer.entries().len(), 2);
        assert!(transfer.is_balanced());
    }
}
