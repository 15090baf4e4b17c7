//! # Policy Store
//!
//! Insertion-ordered, in-memory policy collection behind one coarse
//! `parking_lot::RwLock`. Creation validates the schema and computes
//! conflicts against the active set under the write lock; conflict analysis
//! runs under the read lock, so writers wait for an in-flight analysis.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use intentforge_core::{NotFoundError, PolicyId, WalletId};
use intentforge_policy::{
    Conflict, ConflictAnalyzer, ConflictReport, Policy, PolicyDraft, PolicyType, PolicyUpdate,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Filter for [`PolicyStore::list`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyFilter {
    /// Only policies effective now.
    pub active_only: bool,
    /// Only policies of this type.
    pub policy_type: Option<PolicyType>,
}

/// A freshly created policy and the conflicts it introduced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyCreated {
    /// The stored policy.
    pub policy: Policy,
    /// Conflicts against the active policies present at creation.
    pub conflicts: Vec<Conflict>,
}

#[derive(Debug, Default)]
struct PolicyTable {
    next_seq: u64,
    by_seq: BTreeMap<u64, Policy>,
    index: HashMap<PolicyId, u64>,
}

impl PolicyTable {
    fn get_mut(&mut self, id: &PolicyId) -> Option<&mut Policy> {
        let seq = self.index.get(id)?;
        self.by_seq.get_mut(seq)
    }
}

/// Concurrent in-memory policy store.
#[derive(Debug, Clone, Default)]
pub struct PolicyStore {
    table: Arc<RwLock<PolicyTable>>,
    analyzer: ConflictAnalyzer,
}

impl PolicyStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and store a new policy, optionally attached to `wallet_id`.
    pub fn create(
        &self,
        draft: PolicyDraft,
        wallet_id: Option<&WalletId>,
    ) -> Result<PolicyCreated, LedgerError> {
        let mut policy = Policy::from_draft(draft, Utc::now())?;
        if let Some(wallet_id) = wallet_id {
            policy.attached_wallets.push(wallet_id.clone());
        }

        let mut table = self.table.write();
        let conflicts = self.analyzer.conflicts_with(&policy, table.by_seq.values());
        let seq = table.next_seq;
        table.next_seq += 1;
        table.index.insert(policy.id.clone(), seq);
        table.by_seq.insert(seq, policy.clone());
        drop(table);

        tracing::info!(
            policy_id = %policy.id,
            name = %policy.name,
            policy_type = %policy.policy_type,
            conflicts = conflicts.len(),
            "policy created"
        );
        Ok(PolicyCreated { policy, conflicts })
    }

    /// Fetch a policy.
    pub fn get(&self, id: &PolicyId) -> Option<Policy> {
        let table = self.table.read();
        let seq = table.index.get(id)?;
        table.by_seq.get(seq).cloned()
    }

    /// Policies matching `filter`, in insertion order.
    pub fn list(&self, filter: PolicyFilter) -> Vec<Policy> {
        let now = Utc::now();
        self.table
            .read()
            .by_seq
            .values()
            .filter(|p| !filter.active_only || p.is_effective_at(now))
            .filter(|p| filter.policy_type.map_or(true, |t| p.policy_type == t))
            .cloned()
            .collect()
    }

    /// Policies attached to `wallet_id` and effective now.
    pub fn list_for_wallet(&self, wallet_id: &WalletId) -> Vec<Policy> {
        self.list_for_wallet_at(wallet_id, Utc::now())
    }

    /// Policies attached to `wallet_id` and effective at `now`.
    pub fn list_for_wallet_at(&self, wallet_id: &WalletId, now: DateTime<Utc>) -> Vec<Policy> {
        self.table
            .read()
            .by_seq
            .values()
            .filter(|p| p.is_attached_to(wallet_id) && p.is_effective_at(now))
            .cloned()
            .collect()
    }

    /// Apply a partial update.
    pub fn update(&self, id: &PolicyId, update: PolicyUpdate) -> Result<Policy, LedgerError> {
        let mut table = self.table.write();
        let current = table
            .get_mut(id)
            .ok_or_else(|| NotFoundError::Policy(id.clone()))?;
        let next = current.with_update(update, Utc::now())?;
        *current = next.clone();
        drop(table);
        tracing::info!(policy_id = %id, "policy updated");
        Ok(next)
    }

    /// Remove a policy, returning it.
    pub fn delete(&self, id: &PolicyId) -> Result<Policy, LedgerError> {
        let mut table = self.table.write();
        let seq = table
            .index
            .remove(id)
            .ok_or_else(|| NotFoundError::Policy(id.clone()))?;
        let removed = table
            .by_seq
            .remove(&seq)
            .ok_or_else(|| NotFoundError::Policy(id.clone()))?;
        drop(table);
        tracing::info!(policy_id = %id, "policy deleted");
        Ok(removed)
    }

    /// Attach a policy to a wallet. Idempotent.
    pub fn attach_wallet(&self, id: &PolicyId, wallet_id: &WalletId) -> Result<Policy, LedgerError> {
        let mut table = self.table.write();
        let policy = table
            .get_mut(id)
            .ok_or_else(|| NotFoundError::Policy(id.clone()))?;
        if !policy.is_attached_to(wallet_id) {
            policy.attached_wallets.push(wallet_id.clone());
            policy.updated_at = Utc::now();
        }
        Ok(policy.clone())
    }

    /// Whether a policy with this identifier is stored.
    pub fn contains(&self, id: &PolicyId) -> bool {
        self.table.read().index.contains_key(id)
    }

    /// Run conflict analysis over the whole collection under the read lock.
    pub fn analyze(&self, analyzer: &ConflictAnalyzer) -> ConflictReport {
        analyzer.analyze(self.table.read().by_seq.values())
    }

    /// Number of stored policies.
    pub fn len(&self) -> usize {
        self.table.read().by_seq.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
