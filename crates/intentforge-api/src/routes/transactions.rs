//! # Transaction API
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | `POST` | `/v1/transactions/validate` | `validate_transaction` |
//! | `POST` | `/v1/transactions/simulate` | `simulate_transaction` |
//! | `POST` | `/v1/transactions/execute` | `execute_transaction` |
//! | `GET` | `/v1/transactions/:transaction_id` | `get_transaction` |
//!
//! A blocked transaction is a successful response: violations are data in
//! the body, not an error status.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use intentforge_core::TransactionId;
use intentforge_ledger::{Execution, HistoryEntry};
use intentforge_policy::{TransactionRequest, ValidationResult};
use uuid::Uuid;

use crate::error::AppError;
use crate::extractors::extract_json;
use crate::state::AppState;

/// Build the transactions router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/transactions/validate", post(validate_transaction))
        .route("/v1/transactions/simulate", post(simulate_transaction))
        .route("/v1/transactions/execute", post(execute_transaction))
        .route("/v1/transactions/:transaction_id", get(get_transaction))
}

/// POST /v1/transactions/validate — Validate against the wallet's policies and record the result.
#[utoipa::path(
    post,
    path = "/v1/transactions/validate",
    request_body = serde_json::Value,
    responses(
        (status = 200, description = "Validation result, approved or blocked"),
        (status = 404, description = "Wallet not found", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid transaction", body = crate::error::ErrorBody),
    ),
    tag = "transactions"
)]
pub(crate) async fn validate_transaction(
    State(state): State<AppState>,
    body: Result<Json<TransactionRequest>, JsonRejection>,
) -> Result<Json<ValidationResult>, AppError> {
    let req = extract_json(body)?;
    let result = state.ledger.validate_transaction(req)?;
    tracing::info!(
        transaction_id = %result.transaction_id,
        status = %result.status,
        violations = result.violations.len(),
        "transaction validated"
    );
    Ok(Json(result))
}

/// POST /v1/transactions/simulate — Dry run; nothing is recorded.
#[utoipa::path(
    post,
    path = "/v1/transactions/simulate",
    request_body = serde_json::Value,
    responses(
        (status = 200, description = "Validation result"),
        (status = 404, description = "Wallet not found", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid transaction", body = crate::error::ErrorBody),
    ),
    tag = "transactions"
)]
pub(crate) async fn simulate_transaction(
    State(state): State<AppState>,
    body: Result<Json<TransactionRequest>, JsonRejection>,
) -> Result<Json<ValidationResult>, AppError> {
    let req = extract_json(body)?;
    Ok(Json(state.ledger.simulate_transaction(req)?))
}

/// POST /v1/transactions/execute — Validate, then debit when approved.
#[utoipa::path(
    post,
    path = "/v1/transactions/execute",
    request_body = serde_json::Value,
    responses(
        (status = 200, description = "Execution outcome"),
        (status = 404, description = "Wallet not found", body = crate::error::ErrorBody),
        (status = 409, description = "Insufficient balance or wallet locked", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid transaction", body = crate::error::ErrorBody),
    ),
    tag = "transactions"
)]
pub(crate) async fn execute_transaction(
    State(state): State<AppState>,
    body: Result<Json<TransactionRequest>, JsonRejection>,
) -> Result<Json<Execution>, AppError> {
    let req = extract_json(body)?;
    Ok(Json(state.ledger.execute_transaction(req)?))
}

/// GET /v1/transactions/:transaction_id — Recorded transaction and result.
#[utoipa::path(
    get,
    path = "/v1/transactions/{transaction_id}",
    params(("transaction_id" = Uuid, Path, description = "Transaction UUID")),
    responses(
        (status = 200, description = "Recorded transaction"),
        (status = 404, description = "Transaction not found", body = crate::error::ErrorBody),
    ),
    tag = "transactions"
)]
pub(crate) async fn get_transaction(
    State(state): State<AppState>,
    Path(transaction_id): Path<Uuid>,
) -> Result<Json<HistoryEntry>, AppError> {
    Ok(Json(
        state
            .ledger
            .transaction(&TransactionId::from_uuid(transaction_id))?,
    ))
}
