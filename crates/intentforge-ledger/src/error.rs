//! # Ledger Errors
//!
//! Failures of store and facade operations. Policy violations never appear
//! here; they are data in a `ValidationResult`.

use intentforge_core::{NotFoundError, ValidationError, WalletId};
use thiserror::Error;

/// Error returned by ledger operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    /// A referenced wallet, policy or transaction does not exist.
    #[error("{0}")]
    NotFound(#[from] NotFoundError),

    /// Input failed validation.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A debit exceeds the wallet balance.
    #[error("insufficient balance in wallet {wallet_id}: required {required}, available {available}")]
    InsufficientBalance {
        /// The wallet debited.
        wallet_id: WalletId,
        /// Amount requested.
        required: f64,
        /// Balance at the time of the attempt.
        available: f64,
    },

    /// The wallet is locked against debits.
    #[error("wallet {0} is locked")]
    WalletLocked(WalletId),

    /// The wallet is deactivated.
    #[error("wallet {0} is inactive")]
    WalletInactive(WalletId),

    /// A balance operation received a non-positive or non-finite amount.
    #[error("invalid amount {0}: must be a finite number greater than zero")]
    InvalidAmount(f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_balance_message_carries_amounts() {
        let id = WalletId::new();
        let err = LedgerError::InsufficientBalance {
            wallet_id: id.clone(),
            required: 500.0,
            available: 120.5,
        };
        let msg = err.to_string();
        assert!(msg.contains(&id.to_string()));
        assert!(msg.contains("500"));
        assert!(msg.contains("120.5"));
    }

    #[test]
    fn not_found_passes_through() {
        let id = WalletId::new();
        let err: LedgerError = NotFoundError::Wallet(id.clone()).into();
        assert_eq!(err.to_string(), format!("wallet not found: {id}"));
    }

    #[test]
    fn validation_is_prefixed() {
        let err: LedgerError = ValidationError::empty("owner_id").into();
        assert_eq!(err.to_string(), "validation error: owner_id must not be empty");
    }
}
