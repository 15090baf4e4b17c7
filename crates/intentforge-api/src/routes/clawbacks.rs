//! # Clawback API
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | `POST` | `/v1/clawbacks` | `execute_clawback` |
//! | `GET` | `/v1/clawbacks` | `clawback_history` |

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::routing::post;
use axum::{Json, Router};
use intentforge_core::{TransactionId, WalletId};
use intentforge_ledger::{ClawbackReason, ClawbackRecord, ClawbackRequest, ClawbackResult};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Request to reverse a transaction.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ExecuteClawbackRequest {
    pub transaction_id: Uuid,
    pub wallet_id: Uuid,
    /// POLICY_VIOLATION (default), EXPIRED_POLICY, FRAUD_DETECTION,
    /// COMPLIANCE_BREACH or MANUAL_REVERSAL.
    #[serde(default)]
    #[schema(value_type = String)]
    pub reason: ClawbackReason,
    /// Bypass repeat protection and allow unknown transactions.
    #[serde(default)]
    pub force: bool,
    /// Required alongside `force` to reverse a transaction twice.
    #[serde(default)]
    pub acknowledge_repeat: bool,
    /// Amount to credit when the transaction is unknown.
    #[serde(default)]
    pub fallback_amount: Option<f64>,
}

impl Validate for ExecuteClawbackRequest {
    fn validate(&self) -> Result<(), String> {
        if self.acknowledge_repeat && !self.force {
            return Err("acknowledge_repeat requires force".to_string());
        }
        match self.fallback_amount {
            Some(amount) if !amount.is_finite() || amount <= 0.0 => {
                Err("fallback_amount must be a positive number".to_string())
            }
            _ => Ok(()),
        }
    }
}

impl From<ExecuteClawbackRequest> for ClawbackRequest {
    fn from(req: ExecuteClawbackRequest) -> Self {
        ClawbackRequest {
            transaction_id: TransactionId::from_uuid(req.transaction_id),
            wallet_id: WalletId::from_uuid(req.wallet_id),
            reason: req.reason,
            force: req.force,
            acknowledge_repeat: req.acknowledge_repeat,
            fallback_amount: req.fallback_amount,
        }
    }
}

/// Query for `GET /v1/clawbacks`.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ClawbackHistoryQuery {
    pub wallet_id: Option<Uuid>,
    pub transaction_id: Option<Uuid>,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the clawbacks router.
pub fn router() -> Router<AppState> {
    Router::new().route("/v1/clawbacks", post(execute_clawback).get(clawback_history))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /v1/clawbacks — Reverse a transaction and credit the wallet.
#[utoipa::path(
    post,
    path = "/v1/clawbacks",
    request_body = ExecuteClawbackRequest,
    responses(
        (status = 200, description = "Clawback executed or failed; see status"),
        (status = 404, description = "Wallet or transaction not found", body = crate::error::ErrorBody),
        (status = 409, description = "Already clawed back", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid request", body = crate::error::ErrorBody),
    ),
    tag = "clawbacks"
)]
pub(crate) async fn execute_clawback(
    State(state): State<AppState>,
    body: Result<Json<ExecuteClawbackRequest>, JsonRejection>,
) -> Result<Json<ClawbackResult>, AppError> {
    let req = extract_validated_json(body)?;
    Ok(Json(state.ledger.execute_clawback(req.into())?))
}

/// GET /v1/clawbacks — Clawback records, oldest first.
#[utoipa::path(
    get,
    path = "/v1/clawbacks",
    params(ClawbackHistoryQuery),
    responses((status = 200, description = "Clawback records")),
    tag = "clawbacks"
)]
pub(crate) async fn clawback_history(
    State(state): State<AppState>,
    Query(query): Query<ClawbackHistoryQuery>,
) -> Json<Vec<ClawbackRecord>> {
    let wallet_id = query.wallet_id.map(WalletId::from_uuid);
    let transaction_id = query.transaction_id.map(TransactionId::from_uuid);
    Json(
        state
            .ledger
            .clawback_history(wallet_id.as_ref(), transaction_id.as_ref()),
    )
}
