//! # Clawback Engine
//!
//! Reverses the balance effect of a transaction by crediting its amount back
//! to the wallet, and keeps an immutable record of every attempt.
//!
//! Each wallet remembers which transactions were already clawed back. A
//! second clawback of the same transaction is refused unless the caller both
//! forces it and explicitly acknowledges the repeat. The membership check,
//! the credit and the set insertion happen under the wallet's lock, so two
//! concurrent clawbacks of one transaction cannot both credit.
//!
//! A failed credit is not an error: it is stored as a `FAILED` record and
//! returned to the caller with the balance unchanged.
//!
//! Stored records are bounded; past capacity the oldest 10% are dropped.
//! Repeat protection does not depend on them, it lives on the wallet.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use intentforge_core::{ClawbackId, TransactionId, WalletId};
use intentforge_policy::Violation;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::audit::{AuditEvent, AuditEventType, AuditSink};
use crate::history::TransactionHistory;
use crate::wallet::WalletStore;

/// Why a clawback was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClawbackReason {
    /// The transaction broke a policy after execution.
    #[default]
    PolicyViolation,
    /// The transaction ran under an expired policy.
    ExpiredPolicy,
    /// Fraud was detected.
    FraudDetection,
    /// A regulatory requirement was breached.
    ComplianceBreach,
    /// An administrator asked for it.
    ManualReversal,
}

impl ClawbackReason {
    /// Return the wire name of this reason.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PolicyViolation => "POLICY_VIOLATION",
            Self::ExpiredPolicy => "EXPIRED_POLICY",
            Self::FraudDetection => "FRAUD_DETECTION",
            Self::ComplianceBreach => "COMPLIANCE_BREACH",
            Self::ManualReversal => "MANUAL_REVERSAL",
        }
    }

    fn rationale(&self) -> &'static str {
        match self {
            Self::PolicyViolation => {
                "Transaction violated wallet policy rules after execution. Automated clawback initiated to enforce compliance."
            }
            Self::ExpiredPolicy => {
                "Transaction executed under an expired policy. Funds reversed to maintain policy integrity."
            }
            Self::FraudDetection => "Fraudulent activity detected. Transaction reversed for security.",
            Self::ComplianceBreach => {
                "Regulatory compliance violation detected. Mandatory reversal executed."
            }
            Self::ManualReversal => "Manual reversal requested by administrator.",
        }
    }
}

impl std::fmt::Display for ClawbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a clawback record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClawbackStatus {
    /// Not yet attempted.
    Pending,
    /// The wallet was credited.
    Executed,
    /// The credit failed.
    Failed,
    /// Withdrawn before execution.
    Cancelled,
}

impl ClawbackStatus {
    /// Return the wire name of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Executed => "EXECUTED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for ClawbackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request to reverse a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClawbackRequest {
    /// Transaction to reverse.
    pub transaction_id: TransactionId,
    /// Wallet to credit.
    pub wallet_id: WalletId,
    /// Why.
    #[serde(default)]
    pub reason: ClawbackReason,
    /// Proceed even if the transaction is unknown or already reversed.
    #[serde(default)]
    pub force: bool,
    /// Explicit consent to reverse the same transaction again.
    #[serde(default)]
    pub acknowledge_repeat: bool,
    /// Amount to credit when a forced clawback targets an unknown transaction.
    #[serde(default)]
    pub fallback_amount: Option<f64>,
}

impl ClawbackRequest {
    /// A non-forced request with the default reason.
    pub fn new(transaction_id: TransactionId, wallet_id: WalletId) -> Self {
        Self {
            transaction_id,
            wallet_id,
            reason: ClawbackReason::default(),
            force: false,
            acknowledge_repeat: false,
            fallback_amount: None,
        }
    }

    /// Set the reason.
    pub fn with_reason(mut self, reason: ClawbackReason) -> Self {
        self.reason = reason;
        self
    }

    /// Force the clawback.
    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }

    /// Acknowledge a repeat clawback.
    pub fn acknowledged(mut self) -> Self {
        self.acknowledge_repeat = true;
        self
    }

    /// Amount to use when the transaction is unknown.
    pub fn with_fallback_amount(mut self, amount: f64) -> Self {
        self.fallback_amount = Some(amount);
        self
    }
}

/// Immutable record of one clawback attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClawbackRecord {
    /// Unique identifier.
    pub id: ClawbackId,
    /// Transaction reversed.
    pub transaction_id: TransactionId,
    /// Wallet credited.
    pub wallet_id: WalletId,
    /// Amount credited (or attempted).
    pub amount: f64,
    /// Why.
    pub reason: ClawbackReason,
    /// Outcome.
    pub status: ClawbackStatus,
    /// Human-readable outcome.
    pub explanation: String,
    /// When the attempt was made.
    pub created_at: DateTime<Utc>,
}

/// Result returned to the caller of a clawback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClawbackResult {
    /// Id of the stored record.
    pub clawback_id: ClawbackId,
    /// Transaction reversed.
    pub transaction_id: TransactionId,
    /// Wallet credited.
    pub wallet_id: WalletId,
    /// Outcome.
    pub status: ClawbackStatus,
    /// Why.
    pub reason: ClawbackReason,
    /// Amount credited (or attempted).
    pub amount_reversed: f64,
    /// Balance before.
    pub previous_balance: f64,
    /// Balance after; equal to `previous_balance` on failure.
    pub new_balance: f64,
    /// Wall-clock time spent, in milliseconds.
    pub processing_time_ms: f64,
    /// Human-readable outcome.
    pub explanation: String,
    /// Violations recorded against the transaction when it was validated.
    pub violations: Vec<Violation>,
}

/// Why a clawback was refused before any balance change.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClawbackError {
    /// The wallet does not exist.
    #[error("wallet not found: {0}")]
    WalletNotFound(WalletId),

    /// The transaction is unknown and the request was not forced.
    #[error("transaction {0} not found")]
    TransactionNotFound(TransactionId),

    /// The transaction belongs to another wallet.
    #[error("transaction {transaction_id} belongs to wallet {owner}, not {requested}")]
    WalletMismatch {
        /// The transaction.
        transaction_id: TransactionId,
        /// Wallet the transaction was made from.
        owner: WalletId,
        /// Wallet named in the request.
        requested: WalletId,
    },

    /// The transaction was already clawed back and the request was not forced.
    #[error("transaction {0} has already been clawed back")]
    AlreadyClawedBack(TransactionId),

    /// A forced repeat clawback lacks the explicit acknowledgement.
    #[error("transaction {0} has already been clawed back; set acknowledge_repeat to reverse it again")]
    AcknowledgementRequired(TransactionId),

    /// A forced clawback of an unknown transaction lacks a usable amount.
    #[error("transaction {0} is unknown; a positive fallback_amount is required")]
    MissingFallbackAmount(TransactionId),
}

/// Outcome of the locked section of a clawback.
struct Reversal {
    previous_balance: f64,
    new_balance: f64,
    failure: Option<String>,
}

/// Clawback records retained when no capacity is configured.
pub const DEFAULT_CLAWBACK_CAPACITY: usize = 10_000;

/// Executes clawbacks and keeps their records.
#[derive(Clone)]
pub struct ClawbackEngine {
    wallets: WalletStore,
    history: TransactionHistory,
    records: Arc<RwLock<VecDeque<ClawbackRecord>>>,
    capacity: usize,
    audit: Arc<dyn AuditSink>,
}

impl ClawbackEngine {
    /// Create an engine over the given stores, reporting to `audit`.
    pub fn new(wallets: WalletStore, history: TransactionHistory, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            wallets,
            history,
            records: Arc::new(RwLock::new(VecDeque::new())),
            capacity: DEFAULT_CLAWBACK_CAPACITY,
            audit,
        }
    }

    /// Retain at most `capacity` records.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    fn store(&self, record: ClawbackRecord) {
        let mut records = self.records.write();
        records.push_back(record);
        if records.len() > self.capacity {
            let trim = (self.capacity / 10).max(1);
            records.drain(..trim);
            tracing::debug!(trimmed = trim, retained = records.len(), "clawback records trimmed");
        }
    }

    /// Reverse a transaction.
    pub fn execute_clawback(&self, request: ClawbackRequest) -> Result<ClawbackResult, ClawbackError> {
        let started = Instant::now();
        let ClawbackRequest {
            transaction_id,
            wallet_id,
            reason,
            force,
            acknowledge_repeat,
            fallback_amount,
        } = request;

        let currency = self
            .wallets
            .get(&wallet_id)
            .map(|w| w.currency)
            .ok_or_else(|| ClawbackError::WalletNotFound(wallet_id.clone()))?;

        let (amount, violations) = match self.history.get(&transaction_id) {
            Some(entry) if entry.transaction.wallet_id != wallet_id => {
                return Err(ClawbackError::WalletMismatch {
                    transaction_id,
                    owner: entry.transaction.wallet_id,
                    requested: wallet_id,
                });
            }
            Some(entry) => (entry.transaction.amount, entry.result.violations),
            None if !force => return Err(ClawbackError::TransactionNotFound(transaction_id)),
            None => match fallback_amount {
                Some(amount) if amount.is_finite() && amount > 0.0 => (amount, Vec::new()),
                _ => return Err(ClawbackError::MissingFallbackAmount(transaction_id)),
            },
        };

        let reversal = self
            .wallets
            .with_wallet(&wallet_id, |wallet| {
                if wallet.has_clawed_back(&transaction_id) {
                    if !force {
                        return Err(ClawbackError::AlreadyClawedBack(transaction_id.clone()));
                    }
                    if !acknowledge_repeat {
                        return Err(ClawbackError::AcknowledgementRequired(transaction_id.clone()));
                    }
                }
                let previous_balance = wallet.balance;
                Ok(match wallet.credit(amount) {
                    Ok(change) => {
                        wallet.clawed_back_transactions.insert(transaction_id.clone());
                        Reversal {
                            previous_balance,
                            new_balance: change.new_balance,
                            failure: None,
                        }
                    }
                    Err(e) => Reversal {
                        previous_balance,
                        new_balance: previous_balance,
                        failure: Some(e.to_string()),
                    },
                })
            })
            .map_err(|_| ClawbackError::WalletNotFound(wallet_id.clone()))??;

        let (status, explanation) = match &reversal.failure {
            None => (
                ClawbackStatus::Executed,
                format!(
                    "CLAWBACK EXECUTED: {} Amount {amount} {currency} restored to wallet. Balance updated successfully.",
                    reason.rationale()
                ),
            ),
            Some(_) => (
                ClawbackStatus::Failed,
                "CLAWBACK FAILED: Unable to reverse transaction. Manual intervention required."
                    .to_string(),
            ),
        };

        let record = ClawbackRecord {
            id: ClawbackId::new(),
            transaction_id: transaction_id.clone(),
            wallet_id: wallet_id.clone(),
            amount,
            reason,
            status,
            explanation: explanation.clone(),
            created_at: Utc::now(),
        };
        self.store(record.clone());

        let event_type = match status {
            ClawbackStatus::Executed => AuditEventType::ClawbackExecuted,
            _ => AuditEventType::ClawbackFailed,
        };
        self.audit.record(
            AuditEvent::new(event_type)
                .wallet(&wallet_id)
                .subject(&record.id)
                .metadata(json!({
                    "transaction_id": transaction_id,
                    "amount": amount,
                    "reason": reason,
                    "previous_balance": reversal.previous_balance,
                    "new_balance": reversal.new_balance,
                    "error": reversal.failure,
                })),
        );

        match &reversal.failure {
            None => tracing::info!(
                clawback_id = %record.id,
                %transaction_id,
                %wallet_id,
                amount,
                %reason,
                "clawback executed"
            ),
            Some(error) => tracing::error!(
                clawback_id = %record.id,
                %transaction_id,
                %wallet_id,
                error = %error,
                "clawback failed"
            ),
        }

        Ok(ClawbackResult {
            clawback_id: record.id,
            transaction_id,
            wallet_id,
            status,
            reason,
            amount_reversed: amount,
            previous_balance: reversal.previous_balance,
            new_balance: reversal.new_balance,
            processing_time_ms: started.elapsed().as_secs_f64() * 1000.0,
            explanation,
            violations,
        })
    }

    /// Stored records, oldest first, optionally filtered.
    pub fn history(
        &self,
        wallet_id: Option<&WalletId>,
        transaction_id: Option<&TransactionId>,
    ) -> Vec<ClawbackRecord> {
        self.records
            .read()
            .iter()
            .filter(|r| wallet_id.map_or(true, |w| &r.wallet_id == w))
            .filter(|r| transaction_id.map_or(true, |t| &r.transaction_id == t))
            .cloned()
            .collect()
    }
}

impl std::fmt::Debug for ClawbackEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClawbackEngine")
            .field("records", &self.records.read().len())
            .finish()
    }
}
