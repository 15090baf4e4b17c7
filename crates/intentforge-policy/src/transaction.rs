//! # Transactions and Validation Results
//!
//! A [`Transaction`] is ephemeral: it exists for the duration of one
//! validation (and, when recorded, in the session history). Its outcome is a
//! [`ValidationResult`] carrying the ordered list of [`Violation`]s.

use chrono::{DateTime, Utc};
use intentforge_core::{PolicyId, TransactionId, ValidationError, WalletId};
use serde::{Deserialize, Serialize};

use crate::evaluator::Violation;

/// Status of a transaction after validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    /// Not yet validated.
    Pending,
    /// Every effective policy passed.
    Approved,
    /// At least one effective policy was violated.
    Blocked,
    /// Flagged as violating after the fact.
    Violation,
    /// Settled and later found to need reversal.
    ClawbackRequired,
}

impl TransactionStatus {
    /// Return the wire name of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Blocked => "BLOCKED",
            Self::Violation => "VIOLATION",
            Self::ClawbackRequired => "CLAWBACK_REQUIRED",
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A proposed movement of money out of a wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique identifier.
    pub id: TransactionId,
    /// Wallet the money leaves.
    pub wallet_id: WalletId,
    /// Positive amount.
    pub amount: f64,
    /// Currency code, taken from the wallet.
    pub currency: String,
    /// Spending category.
    pub category: String,
    /// Merchant name, if any.
    pub merchant: Option<String>,
    /// Region code of the point of sale, if any.
    pub location: Option<String>,
    /// UPI reference, if the payment came through UPI.
    pub upi_ref_id: Option<String>,
    /// Free-form caller data.
    pub metadata: Option<serde_json::Value>,
    /// Validation status.
    pub status: TransactionStatus,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// A pending transaction in the default currency.
    pub fn new(wallet_id: WalletId, amount: f64, category: impl Into<String>) -> Self {
        Self {
            id: TransactionId::new(),
            wallet_id,
            amount,
            currency: "INR".to_string(),
            category: category.into(),
            merchant: None,
            location: None,
            upi_ref_id: None,
            metadata: None,
            status: TransactionStatus::Pending,
            created_at: Utc::now(),
        }
    }

    /// Set the merchant.
    pub fn with_merchant(mut self, merchant: impl Into<String>) -> Self {
        self.merchant = Some(merchant.into());
        self
    }

    /// Set the location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Set the currency.
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    /// The merchant, treating a blank string as absent.
    pub fn merchant(&self) -> Option<&str> {
        non_blank(self.merchant.as_deref())
    }

    /// The location, treating a blank string as absent.
    pub fn location(&self) -> Option<&str> {
        non_blank(self.location.as_deref())
    }

    /// Check the amount and category invariants.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(ValidationError::amount(
                "amount",
                self.amount,
                "must be greater than zero",
            ));
        }
        if self.category.trim().is_empty() {
            return Err(ValidationError::empty("category"));
        }
        Ok(())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Caller input describing a transaction against a stored wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRequest {
    /// Wallet the money leaves.
    pub wallet_id: WalletId,
    /// Positive amount.
    pub amount: f64,
    /// Spending category.
    pub category: String,
    /// Merchant name.
    #[serde(default)]
    pub merchant: Option<String>,
    /// Region code.
    #[serde(default)]
    pub location: Option<String>,
    /// UPI reference.
    #[serde(default)]
    pub upi_ref_id: Option<String>,
    /// Free-form caller data.
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl TransactionRequest {
    /// Build and validate a pending transaction in `currency`.
    pub fn into_transaction(self, currency: &str) -> Result<Transaction, ValidationError> {
        let tx = Transaction {
            id: TransactionId::new(),
            wallet_id: self.wallet_id,
            amount: self.amount,
            currency: currency.to_string(),
            category: self.category.trim().to_string(),
            merchant: self.merchant,
            location: self.location,
            upi_ref_id: self.upi_ref_id,
            metadata: self.metadata,
            status: TransactionStatus::Pending,
            created_at: Utc::now(),
        };
        tx.validate()?;
        Ok(tx)
    }
}

/// Outcome of validating one transaction against a wallet's policies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// The transaction validated.
    pub transaction_id: TransactionId,
    /// `APPROVED` or `BLOCKED`.
    pub status: TransactionStatus,
    /// Every violation, in evaluation order.
    pub violations: Vec<Violation>,
    /// Ids of the effective policies, in evaluation order.
    pub policies_evaluated: Vec<PolicyId>,
    /// Human-readable explanation.
    pub explanation: String,
    /// Fixed-heuristic confidence in the decision.
    pub confidence: f64,
    /// Wall-clock time spent, in milliseconds. Advisory.
    pub processing_time_ms: f64,
    /// Always `false` from direct validation.
    pub requires_clawback: bool,
}

impl ValidationResult {
    /// Whether the transaction was approved.
    pub fn is_approved(&self) -> bool {
        self.status == TransactionStatus::Approved
    }

    /// Messages of every violation, in order.
    pub fn violation_messages(&self) -> Vec<&str> {
        self.violations.iter().map(|v| v.message.as_str()).collect()
    }
}
