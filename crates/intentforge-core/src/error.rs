//! # Error Hierarchy
//!
//! Structured error types shared across the IntentForge workspace, built
//! with `thiserror`. No `Box<dyn Error>`, no `.unwrap()` outside tests.
//!
//! Business-rule violations (a transaction outside a policy's category,
//! amount or region) are *not* errors: they are data carried in validation
//! results. The types here cover malformed input, missing resources and
//! serialization failures.

use thiserror::Error;

use crate::identity::{PolicyId, TransactionId, WalletId};

/// Top-level error type for IntentForge.
#[derive(Error, Debug)]
pub enum IntentForgeError {
    /// Input failed schema or field validation.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A referenced resource does not exist.
    #[error("{0}")]
    NotFound(#[from] NotFoundError),

    /// Canonicalization failure during digest computation.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A referenced resource is absent. Carries the missing identifier.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotFoundError {
    /// No wallet with this identifier.
    #[error("wallet not found: {0}")]
    Wallet(WalletId),

    /// No policy with this identifier.
    #[error("policy not found: {0}")]
    Policy(PolicyId),

    /// No transaction with this identifier in the session history.
    #[error("transaction not found: {0}")]
    Transaction(TransactionId),
}

/// Validation failures for policies, wallets and transaction requests.
///
/// Schema validation reports every violated constraint at once so callers
/// can fix a policy definition in a single round trip.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// One or more policy schema constraints were violated.
    #[error("policy schema validation failed: {}", .errors.join(", "))]
    PolicySchema {
        /// Every violated constraint, in check order.
        errors: Vec<String>,
    },

    /// A required text field is empty or whitespace.
    #[error("{field} must not be empty")]
    EmptyField {
        /// Name of the offending field.
        field: String,
    },

    /// An amount is negative, zero where a positive value is required,
    /// or not a finite number.
    #[error("invalid {field}: {value} ({reason})")]
    InvalidAmount {
        /// Name of the offending field.
        field: String,
        /// The rejected value.
        value: f64,
        /// Why it was rejected.
        reason: String,
    },

    /// Two inputs that must agree disagree.
    #[error("inconsistent input: {0}")]
    Inconsistent(String),
}

impl ValidationError {
    /// Build an [`ValidationError::EmptyField`] for `field`.
    pub fn empty(field: impl Into<String>) -> Self {
        Self::EmptyField {
            field: field.into(),
        }
    }

    /// Build an [`ValidationError::InvalidAmount`].
    pub fn amount(field: impl Into<String>, value: f64, reason: impl Into<String>) -> Self {
        Self::InvalidAmount {
            field: field.into(),
            value,
            reason: reason.into(),
        }
    }

    /// Individual error messages (one per violated constraint).
    pub fn messages(&self) -> Vec<String> {
        match self {
            Self::PolicySchema { errors } => errors.clone(),
            other => vec![other.to_string()],
        }
    }
}

/// Errors during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// JSON serialization failed during canonicalization.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_schema_lists_every_error() {
        let err = ValidationError::PolicySchema {
            errors: vec![
                "max_amount must be positive".to_string(),
                "per_transaction_cap cannot exceed max_amount".to_string(),
            ],
        };
        let msg = err.to_string();
        assert!(msg.starts_with("policy schema validation failed"));
        assert!(msg.contains("max_amount must be positive"));
        assert!(msg.contains("per_transaction_cap cannot exceed max_amount"));
        assert_eq!(err.messages().len(), 2);
    }

    #[test]
    fn empty_field_display() {
        let err = ValidationError::empty("owner_id");
        assert_eq!(err.to_string(), "owner_id must not be empty");
        assert_eq!(err.messages(), vec!["owner_id must not be empty".to_string()]);
    }

    #[test]
    fn invalid_amount_display() {
        let err = ValidationError::amount("amount", -5.0, "must be greater than zero");
        let msg = err.to_string();
        assert!(msg.contains("amount"));
        assert!(msg.contains("-5"));
        assert!(msg.contains("greater than zero"));
    }

    #[test]
    fn not_found_carries_identifier() {
        let id = WalletId::new();
        let err = NotFoundError::Wallet(id.clone());
        assert_eq!(err.to_string(), format!("wallet not found: {id}"));

        let pid = PolicyId::new();
        assert!(NotFoundError::Policy(pid.clone())
            .to_string()
            .contains(&pid.to_string()));

        let tid = TransactionId::new();
        assert!(NotFoundError::Transaction(tid.clone())
            .to_string()
            .starts_with("transaction not found"));
    }

    #[test]
    fn top_level_wraps_via_from() {
        let err: IntentForgeError = ValidationError::empty("name").into();
        assert!(err.to_string().starts_with("validation error"));

        let err: IntentForgeError = NotFoundError::Policy(PolicyId::new()).into();
        assert!(err.to_string().starts_with("policy not found"));

        let json_err = serde_json::from_str::<serde_json::Value>("[").unwrap_err();
        let err: IntentForgeError = CanonicalizationError::from(json_err).into();
        assert!(err.to_string().contains("canonicalization error"));
    }

    #[test]
    fn json_error_converts() {
        let json_err = serde_json::from_str::<serde_json::Value>("{nope").unwrap_err();
        let err = IntentForgeError::from(json_err);
        assert!(err.to_string().starts_with("JSON error"));
    }
}
