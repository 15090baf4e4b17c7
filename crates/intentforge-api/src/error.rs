//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps ledger and clawback errors to HTTP status codes and returns JSON
//! bodies with an error code, message and optional details. Internal
//! error details are never returned to clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use intentforge_core::{NotFoundError, ValidationError};
use intentforge_ledger::{ClawbackError, LedgerError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "VALIDATION_ERROR").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional context for client errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Request validation failed (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// Policy schema validation failed (422). Carries every violated constraint.
    #[error("policy schema validation failed: {}", .0.join(", "))]
    Schema(Vec<String>),

    /// Request body could not be parsed (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Conflict with current resource state (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) | Self::Schema(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR")
            }
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::Schema(errors) => Some(serde_json::json!({ "errors": errors })),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        if matches!(&self, Self::Internal(_)) {
            tracing::error!(error = %self, "internal server error");
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details: self.details(),
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<NotFoundError> for AppError {
    fn from(err: NotFoundError) -> Self {
        Self::NotFound(err.to_string())
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::PolicySchema { errors } => Self::Schema(errors),
            other => Self::Validation(other.to_string()),
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotFound(e) => e.into(),
            LedgerError::Validation(e) => e.into(),
            LedgerError::InvalidAmount(_) => Self::Validation(err.to_string()),
            LedgerError::InsufficientBalance { .. }
            | LedgerError::WalletLocked(_)
            | LedgerError::WalletInactive(_) => Self::Conflict(err.to_string()),
        }
    }
}

impl From<ClawbackError> for AppError {
    fn from(err: ClawbackError) -> Self {
        match &err {
            ClawbackError::WalletNotFound(_) | ClawbackError::TransactionNotFound(_) => {
                Self::NotFound(err.to_string())
            }
            ClawbackError::WalletMismatch { .. } | ClawbackError::MissingFallbackAmount(_) => {
                Self::Validation(err.to_string())
            }
            ClawbackError::AlreadyClawedBack(_) | ClawbackError::AcknowledgementRequired(_) => {
                Self::Conflict(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intentforge_core::{TransactionId, WalletId};

    #[test]
    fn status_codes() {
        let cases = [
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND, "NOT_FOUND"),
            (
                AppError::Validation("x".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
                "VALIDATION_ERROR",
            ),
            (
                AppError::Schema(vec!["x".into()]),
                StatusCode::UNPROCESSABLE_ENTITY,
                "VALIDATION_ERROR",
            ),
            (AppError::BadRequest("x".into()), StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            (AppError::Conflict("x".into()), StatusCode::CONFLICT, "CONFLICT"),
            (
                AppError::Internal("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
            ),
        ];
        for (err, status, code) in cases {
            assert_eq!(err.status_and_code(), (status, code), "{err}");
        }
    }

    #[test]
    fn schema_errors_travel_as_details() {
        let err: AppError = ValidationError::PolicySchema {
            errors: vec!["Policy name is required".into(), "max_amount must be positive".into()],
        }
        .into();
        let details = err.details().unwrap();
        assert_eq!(details["errors"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn ledger_state_errors_are_conflicts() {
        let wallet = WalletId::new();
        let err: AppError = LedgerError::InsufficientBalance {
            wallet_id: wallet.clone(),
            required: 10.0,
            available: 5.0,
        }
        .into();
        assert!(matches!(err, AppError::Conflict(_)));
        assert!(matches!(
            AppError::from(LedgerError::WalletLocked(wallet.clone())),
            AppError::Conflict(_)
        ));
        assert!(matches!(
            AppError::from(LedgerError::NotFound(NotFoundError::Wallet(wallet))),
            AppError::NotFound(_)
        ));
    }

    #[test]
    fn clawback_errors_map_by_kind() {
        let tx = TransactionId::new();
        assert!(matches!(
            AppError::from(ClawbackError::AlreadyClawedBack(tx.clone())),
            AppError::Conflict(_)
        ));
        assert!(matches!(
            AppError::from(ClawbackError::TransactionNotFound(tx.clone())),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            AppError::from(ClawbackError::MissingFallbackAmount(tx)),
            AppError::Validation(_)
        ));
    }

    #[test]
    fn internal_message_is_hidden() {
        let response = AppError::Internal("db password wrong".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
