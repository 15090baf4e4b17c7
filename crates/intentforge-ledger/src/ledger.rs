//! # Ledger Facade
//!
//! Owns the stores and engines and exposes the operations the HTTP service
//! and tests drive. Everything is constructed explicitly; there is no
//! process-wide state. Cloning a `Ledger` yields another handle onto the
//! same stores.
//!
//! Lock order: a wallet's lock may be held while the policy lock is taken
//! (validate-then-debit), never the reverse.

use std::sync::Arc;

use intentforge_core::{NotFoundError, PolicyId, TransactionId, WalletId};
use intentforge_policy::{
    ConflictAnalyzer, ConflictReport, ExplanationGenerator, Policy, PolicyDraft, PolicyUpdate,
    Transaction, TransactionRequest, TransactionStatus, ValidationOrchestrator, ValidationResult,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::audit::{AuditEvent, AuditEventType, AuditLog, AuditSink, DEFAULT_AUDIT_CAPACITY};
use crate::clawback::{
    ClawbackEngine, ClawbackError, ClawbackRecord, ClawbackRequest, ClawbackResult,
    DEFAULT_CLAWBACK_CAPACITY,
};
use crate::error::LedgerError;
use crate::history::{HistoryEntry, TransactionHistory, DEFAULT_HISTORY_CAPACITY};
use crate::policy_store::{PolicyCreated, PolicyFilter, PolicyStore};
use crate::wallet::{BalanceChange, Wallet, WalletDraft, WalletStore, DEFAULT_CURRENCY};

/// Construction parameters for a [`Ledger`].
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerConfig {
    /// Currency assigned to wallets created without one.
    pub default_currency: String,
    /// Audit records retained before trimming.
    pub audit_capacity: usize,
    /// Transactions retained in the history before trimming.
    pub history_capacity: usize,
    /// Clawback records retained before trimming.
    pub clawback_capacity: usize,
    /// Validations slower than this are logged at warn level.
    pub latency_budget_ms: f64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            default_currency: DEFAULT_CURRENCY.to_string(),
            audit_capacity: DEFAULT_AUDIT_CAPACITY,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            clawback_capacity: DEFAULT_CLAWBACK_CAPACITY,
            latency_budget_ms: 100.0,
        }
    }
}

/// Schema check of a stored policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyCheck {
    /// The policy checked.
    pub policy_id: PolicyId,
    /// Whether the schema holds.
    pub valid: bool,
    /// Every violated constraint.
    pub errors: Vec<String>,
    /// Whether the policy has expired.
    pub is_expired: bool,
    /// Whether the policy is active and unexpired.
    pub is_effective: bool,
}

/// Outcome of [`Ledger::execute_transaction`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    /// The validation decision.
    pub result: ValidationResult,
    /// Whether the amount was debited.
    pub settled: bool,
    /// The debit, when settled.
    pub balance: Option<BalanceChange>,
}

/// The IntentForge ledger.
#[derive(Debug, Clone)]
pub struct Ledger {
    policies: PolicyStore,
    wallets: WalletStore,
    history: TransactionHistory,
    audit: Arc<AuditLog>,
    clawbacks: ClawbackEngine,
    orchestrator: ValidationOrchestrator,
    analyzer: ConflictAnalyzer,
    explainer: ExplanationGenerator,
    latency_budget_ms: f64,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new(LedgerConfig::default())
    }
}

impl Ledger {
    /// Build a ledger with empty stores.
    pub fn new(config: LedgerConfig) -> Self {
        let policies = PolicyStore::new();
        let wallets = WalletStore::new(config.default_currency);
        let history = TransactionHistory::with_capacity(config.history_capacity);
        let audit = Arc::new(AuditLog::new(config.audit_capacity));
        let sink: Arc<dyn AuditSink> = audit.clone();
        let clawbacks = ClawbackEngine::new(wallets.clone(), history.clone(), sink)
            .with_capacity(config.clawback_capacity);
        Self::from_parts(policies, wallets, history, audit, clawbacks, config.latency_budget_ms)
    }

    /// Build a ledger over existing stores.
    pub fn from_parts(
        policies: PolicyStore,
        wallets: WalletStore,
        history: TransactionHistory,
        audit: Arc<AuditLog>,
        clawbacks: ClawbackEngine,
        latency_budget_ms: f64,
    ) -> Self {
        let explainer = ExplanationGenerator::new();
        Self {
            policies,
            wallets,
            history,
            audit,
            clawbacks,
            orchestrator: ValidationOrchestrator::new(explainer),
            analyzer: ConflictAnalyzer::new(),
            explainer,
            latency_budget_ms,
        }
    }

    /// The policy store.
    pub fn policies(&self) -> &PolicyStore {
        &self.policies
    }

    /// The wallet store.
    pub fn wallets(&self) -> &WalletStore {
        &self.wallets
    }

    /// The audit log.
    pub fn audit_log(&self) -> &AuditLog {
        &self.audit
    }

    // -- Wallets -------------------------------------------------------------

    /// Create a wallet.
    pub fn create_wallet(&self, draft: WalletDraft) -> Result<Wallet, LedgerError> {
        let wallet = self.wallets.create(draft)?;
        self.audit.record(
            AuditEvent::new(AuditEventType::WalletCreated)
                .wallet(&wallet.id)
                .metadata(json!({
                    "owner_id": wallet.owner_id,
                    "initial_balance": wallet.balance,
                    "currency": wallet.currency,
                })),
        );
        Ok(wallet)
    }

    /// Fetch a wallet.
    pub fn wallet(&self, id: &WalletId) -> Result<Wallet, LedgerError> {
        self.wallets
            .get(id)
            .ok_or_else(|| NotFoundError::Wallet(id.clone()).into())
    }

    /// Every wallet, optionally of one owner.
    pub fn list_wallets(&self, owner_id: Option<&str>) -> Vec<Wallet> {
        self.wallets.list(owner_id)
    }

    /// Lock or unlock a wallet.
    pub fn set_wallet_locked(&self, id: &WalletId, locked: bool) -> Result<Wallet, LedgerError> {
        self.wallets.set_locked(id, locked)
    }

    // -- Policies ------------------------------------------------------------

    /// Create a policy, optionally attached to an existing wallet.
    pub fn create_policy(
        &self,
        draft: PolicyDraft,
        wallet_id: Option<&WalletId>,
    ) -> Result<PolicyCreated, LedgerError> {
        if let Some(wallet_id) = wallet_id {
            if !self.wallets.contains(wallet_id) {
                return Err(NotFoundError::Wallet(wallet_id.clone()).into());
            }
        }
        let created = self.policies.create(draft, wallet_id)?;
        if let Some(wallet_id) = wallet_id {
            self.wallets.attach_policy(wallet_id, &created.policy.id)?;
        }

        let mut event = AuditEvent::new(AuditEventType::PolicyCreated)
            .subject(&created.policy.id)
            .metadata(json!({
                "name": created.policy.name,
                "policy_type": created.policy.policy_type,
                "conflicts": created.conflicts.len(),
            }));
        if let Some(wallet_id) = wallet_id {
            event = event.wallet(wallet_id);
        }
        self.audit.record(event);
        Ok(created)
    }

    /// Fetch a policy.
    pub fn policy(&self, id: &PolicyId) -> Result<Policy, LedgerError> {
        self.policies
            .get(id)
            .ok_or_else(|| NotFoundError::Policy(id.clone()).into())
    }

    /// Policies matching `filter`.
    pub fn list_policies(&self, filter: PolicyFilter) -> Vec<Policy> {
        self.policies.list(filter)
    }

    /// Apply a partial update to a policy.
    pub fn update_policy(&self, id: &PolicyId, update: PolicyUpdate) -> Result<Policy, LedgerError> {
        let policy = self.policies.update(id, update)?;
        self.audit.record(
            AuditEvent::new(AuditEventType::PolicyUpdated)
                .subject(id)
                .metadata(json!({ "is_active": policy.is_active, "priority": policy.priority })),
        );
        Ok(policy)
    }

    /// Delete a policy and detach it from every wallet.
    pub fn delete_policy(&self, id: &PolicyId) -> Result<Policy, LedgerError> {
        let policy = self.policies.delete(id)?;
        for wallet_id in &policy.attached_wallets {
            if let Err(e) = self.wallets.detach_policy(wallet_id, id) {
                tracing::warn!(policy_id = %id, wallet_id = %wallet_id, error = %e, "detach on delete failed");
            }
        }
        self.audit.record(
            AuditEvent::new(AuditEventType::PolicyDeleted)
                .subject(id)
                .metadata(json!({ "name": policy.name })),
        );
        Ok(policy)
    }

    /// Attach an existing policy to an existing wallet.
    ///
    /// A delete racing this call either sees the wallet in the policy's
    /// attachment list and detaches it, or removes the policy before the
    /// re-check below, which then undoes the wallet side.
    pub fn attach_policy(&self, policy_id: &PolicyId, wallet_id: &WalletId) -> Result<Policy, LedgerError> {
        if !self.wallets.contains(wallet_id) {
            return Err(NotFoundError::Wallet(wallet_id.clone()).into());
        }
        let policy = self.policies.attach_wallet(policy_id, wallet_id)?;
        self.wallets.attach_policy(wallet_id, policy_id)?;
        if !self.policies.contains(policy_id) {
            self.wallets.detach_policy(wallet_id, policy_id)?;
            return Err(NotFoundError::Policy(policy_id.clone()).into());
        }
        self.audit.record(
            AuditEvent::new(AuditEventType::PolicyAttached)
                .wallet(wallet_id)
                .subject(policy_id),
        );
        Ok(policy)
    }

    /// Effective policies of a wallet.
    pub fn wallet_policies(&self, wallet_id: &WalletId) -> Result<Vec<Policy>, LedgerError> {
        if !self.wallets.contains(wallet_id) {
            return Err(NotFoundError::Wallet(wallet_id.clone()).into());
        }
        Ok(self.policies.list_for_wallet(wallet_id))
    }

    /// Re-run the schema check of a stored policy.
    pub fn check_policy(&self, id: &PolicyId) -> Result<PolicyCheck, LedgerError> {
        let policy = self.policy(id)?;
        let errors = policy.validate_schema();
        let now = chrono::Utc::now();
        Ok(PolicyCheck {
            policy_id: policy.id.clone(),
            valid: errors.is_empty(),
            errors,
            is_expired: policy.is_expired_at(now),
            is_effective: policy.is_effective_at(now),
        })
    }

    /// Human-readable summary of a policy.
    pub fn describe_policy(&self, id: &PolicyId) -> Result<String, LedgerError> {
        let policy = self.policy(id)?;
        Ok(self.explainer.describe_policy(&policy))
    }

    /// Conflict report over every stored policy.
    pub fn detect_conflicts(&self) -> ConflictReport {
        self.policies.analyze(&self.analyzer)
    }

    // -- Transactions --------------------------------------------------------

    fn prepare(&self, request: TransactionRequest) -> Result<Transaction, LedgerError> {
        let wallet = self.wallet(&request.wallet_id)?;
        Ok(request.into_transaction(&wallet.currency)?)
    }

    fn decide(&self, tx: &Transaction) -> ValidationResult {
        let policies = self.policies.list_for_wallet(&tx.wallet_id);
        let result = self.orchestrator.validate(tx, &policies);
        if result.processing_time_ms > self.latency_budget_ms {
            tracing::warn!(
                transaction_id = %tx.id,
                elapsed_ms = result.processing_time_ms,
                budget_ms = self.latency_budget_ms,
                "validation exceeded latency budget"
            );
        }
        result
    }

    fn audit_decision(&self, tx: &Transaction, result: &ValidationResult) {
        let event_type = match result.status {
            TransactionStatus::Approved => AuditEventType::TransactionApproved,
            _ => AuditEventType::TransactionBlocked,
        };
        self.audit.record(
            AuditEvent::new(event_type)
                .wallet(&tx.wallet_id)
                .subject(&tx.id)
                .metadata(json!({
                    "amount": tx.amount,
                    "category": tx.category,
                    "violations": result.violation_messages(),
                    "policies_evaluated": result.policies_evaluated.len(),
                })),
        );
    }

    /// Validate a transaction and record the decision.
    pub fn validate_transaction(&self, request: TransactionRequest) -> Result<ValidationResult, LedgerError> {
        let mut tx = self.prepare(request)?;
        let result = self.decide(&tx);
        tx.status = result.status;
        self.audit_decision(&tx, &result);
        self.history.record(tx, result.clone(), false);
        Ok(result)
    }

    /// Validate a transaction without recording anything.
    pub fn simulate_transaction(&self, request: TransactionRequest) -> Result<ValidationResult, LedgerError> {
        let tx = self.prepare(request)?;
        Ok(self.decide(&tx))
    }

    /// Validate a transaction and, if approved, debit it, atomically with
    /// respect to other balance changes on the same wallet.
    pub fn execute_transaction(&self, request: TransactionRequest) -> Result<Execution, LedgerError> {
        let mut tx = self.prepare(request)?;
        let (result, balance) = self.wallets.with_wallet(&tx.wallet_id, |wallet| {
            let result = self.decide(&tx);
            let balance = if result.is_approved() {
                Some(wallet.debit(tx.amount)?)
            } else {
                None
            };
            Ok::<_, LedgerError>((result, balance))
        })??;

        tx.status = result.status;
        self.audit_decision(&tx, &result);
        let settled = balance.is_some();
        if let Some(change) = &balance {
            self.audit.record(
                AuditEvent::new(AuditEventType::TransactionSettled)
                    .wallet(&tx.wallet_id)
                    .subject(&tx.id)
                    .metadata(json!({
                        "amount": change.amount,
                        "previous_balance": change.previous_balance,
                        "new_balance": change.new_balance,
                    })),
            );
            tracing::info!(
                transaction_id = %tx.id,
                wallet_id = %tx.wallet_id,
                amount = change.amount,
                new_balance = change.new_balance,
                "transaction settled"
            );
        }
        self.history.record(tx, result.clone(), settled);
        Ok(Execution {
            result,
            settled,
            balance,
        })
    }

    /// A recorded transaction.
    pub fn transaction(&self, id: &TransactionId) -> Result<HistoryEntry, LedgerError> {
        self.history
            .get(id)
            .ok_or_else(|| NotFoundError::Transaction(id.clone()).into())
    }

    /// Recorded transactions of a wallet, oldest first.
    pub fn wallet_transactions(&self, wallet_id: &WalletId) -> Result<Vec<HistoryEntry>, LedgerError> {
        if !self.wallets.contains(wallet_id) {
            return Err(NotFoundError::Wallet(wallet_id.clone()).into());
        }
        Ok(self.history.for_wallet(wallet_id))
    }

    // -- Clawbacks -----------------------------------------------------------

    /// Reverse a transaction.
    pub fn execute_clawback(&self, request: ClawbackRequest) -> Result<ClawbackResult, ClawbackError> {
        self.clawbacks.execute_clawback(request)
    }

    /// Stored clawback records, optionally filtered.
    pub fn clawback_history(
        &self,
        wallet_id: Option<&WalletId>,
        transaction_id: Option<&TransactionId>,
    ) -> Vec<ClawbackRecord> {
        self.clawbacks.history(wallet_id, transaction_id)
    }
}
