//! # Transaction History
//!
//! Session-scoped record of validated transactions and their results, in
//! the order they were recorded. The clawback engine resolves transactions
//! here.
//!
//! Retention is bounded like the audit log: past capacity the oldest 10% of
//! entries are dropped. A dropped transaction is unknown to later lookups,
//! so clawing it back needs `force` and a fallback amount.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use intentforge_core::{TransactionId, WalletId};
use intentforge_policy::{Transaction, ValidationResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// A recorded transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// The transaction, with its final status.
    pub transaction: Transaction,
    /// The validation outcome.
    pub result: ValidationResult,
    /// Whether the amount was debited from the wallet.
    pub settled: bool,
    /// When the entry was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// Entries retained when no capacity is configured.
pub const DEFAULT_HISTORY_CAPACITY: usize = 10_000;

#[derive(Debug)]
struct HistoryTable {
    order: VecDeque<TransactionId>,
    entries: HashMap<TransactionId, HistoryEntry>,
    capacity: usize,
}

/// Concurrent in-memory transaction history.
#[derive(Debug, Clone)]
pub struct TransactionHistory {
    table: Arc<RwLock<HistoryTable>>,
}

impl Default for TransactionHistory {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }
}

impl TransactionHistory {
    /// Create an empty history with the default capacity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty history retaining at most `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            table: Arc::new(RwLock::new(HistoryTable {
                order: VecDeque::new(),
                entries: HashMap::new(),
                capacity: capacity.max(1),
            })),
        }
    }

    /// Record a transaction and its result.
    pub fn record(&self, transaction: Transaction, result: ValidationResult, settled: bool) {
        let id = transaction.id.clone();
        let entry = HistoryEntry {
            transaction,
            result,
            settled,
            recorded_at: Utc::now(),
        };
        let mut table = self.table.write();
        if table.entries.insert(id.clone(), entry).is_some() {
            return;
        }
        table.order.push_back(id);
        if table.order.len() > table.capacity {
            let trim = (table.capacity / 10).max(1);
            for _ in 0..trim {
                if let Some(oldest) = table.order.pop_front() {
                    table.entries.remove(&oldest);
                }
            }
            tracing::debug!(trimmed = trim, retained = table.order.len(), "transaction history trimmed");
        }
    }

    /// Fetch one entry.
    pub fn get(&self, id: &TransactionId) -> Option<HistoryEntry> {
        self.table.read().entries.get(id).cloned()
    }

    /// Entries for one wallet, oldest first.
    pub fn for_wallet(&self, wallet_id: &WalletId) -> Vec<HistoryEntry> {
        let table = self.table.read();
        table
            .order
            .iter()
            .filter_map(|id| table.entries.get(id))
            .filter(|e| &e.transaction.wallet_id == wallet_id)
            .cloned()
            .collect()
    }

    /// Flag a recorded transaction as settled. Returns `false` when unknown.
    pub fn mark_settled(&self, id: &TransactionId) -> bool {
        match self.table.write().entries.get_mut(id) {
            Some(entry) => {
                entry.settled = true;
                true
            }
            None => false,
        }
    }

    /// Number of recorded transactions.
    pub fn len(&self) -> usize {
        self.table.read().order.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intentforge_policy::ValidationOrchestrator;

    fn validated(wallet_id: &WalletId, amount: f64) -> (Transaction, ValidationResult) {
        let tx = Transaction::new(wallet_id.clone(), amount, "food");
        let result = ValidationOrchestrator::default().validate(&tx, &[]);
        (tx, result)
    }

    #[test]
    fn record_and_get() {
        let history = TransactionHistory::new();
        let wallet = WalletId::new();
        let (tx, result) = validated(&wallet, 10.0);
        let id = tx.id.clone();
        history.record(tx, result, false);
        let entry = history.get(&id).unwrap();
        assert_eq!(entry.transaction.amount, 10.0);
        assert!(!entry.settled);
        assert!(history.get(&TransactionId::new()).is_none());
    }

    #[test]
    fn for_wallet_keeps_order() {
        let history = TransactionHistory::new();
        let wallet = WalletId::new();
        let other = WalletId::new();
        for amount in [1.0, 2.0, 3.0] {
            let (tx, result) = validated(&wallet, amount);
            history.record(tx, result, false);
        }
        let (tx, result) = validated(&other, 9.0);
        history.record(tx, result, false);

        let amounts: Vec<f64> = history
            .for_wallet(&wallet)
            .iter()
            .map(|e| e.transaction.amount)
            .collect();
        assert_eq!(amounts, vec![1.0, 2.0, 3.0]);
        assert_eq!(history.len(), 4);
    }

    #[test]
    fn capacity_drops_oldest_tenth() {
        let history = TransactionHistory::with_capacity(20);
        let wallet = WalletId::new();
        let mut ids = Vec::new();
        for n in 0..21 {
            let (tx, result) = validated(&wallet, f64::from(n) + 1.0);
            ids.push(tx.id.clone());
            history.record(tx, result, false);
        }
        assert_eq!(history.len(), 19);
        assert!(history.get(&ids[0]).is_none());
        assert!(history.get(&ids[1]).is_none());
        assert!(history.get(&ids[2]).is_some());
        let first = &history.for_wallet(&wallet)[0];
        assert_eq!(first.transaction.amount, 3.0);
    }

    #[test]
    fn mark_settled() {
        let history = TransactionHistory::new();
        let (tx, result) = validated(&WalletId::new(), 5.0);
        let id = tx.id.clone();
        history.record(tx, result, false);
        assert!(history.mark_settled(&id));
        assert!(history.get(&id).unwrap().settled);
        assert!(!history.mark_settled(&TransactionId::new()));
    }
}
