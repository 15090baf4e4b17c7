//! # Wallet API
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | `POST` | `/v1/wallets` | `create_wallet` |
//! | `GET` | `/v1/wallets` | `list_wallets` |
//! | `GET` | `/v1/wallets/:wallet_id` | `get_wallet` |
//! | `GET` | `/v1/wallets/:wallet_id/balance` | `get_balance` |
//! | `PUT` | `/v1/wallets/:wallet_id/lock` | `set_lock` |
//! | `GET` | `/v1/wallets/:wallet_id/policies` | `wallet_policies` |
//! | `GET` | `/v1/wallets/:wallet_id/transactions` | `wallet_transactions` |

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use intentforge_core::WalletId;
use intentforge_ledger::{Wallet, WalletDraft};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::AppError;
use crate::extractors::{extract_json, extract_validated_json, Validate};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request to create a wallet.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateWalletRequest {
    /// Owner reference.
    pub owner_id: String,
    /// Opening balance, zero when omitted.
    #[serde(default)]
    pub initial_balance: f64,
    /// ISO currency code; the service default when omitted.
    #[serde(default)]
    pub currency: Option<String>,
}

impl Validate for CreateWalletRequest {
    fn validate(&self) -> Result<(), String> {
        if self.owner_id.trim().is_empty() {
            return Err("owner_id must not be empty".to_string());
        }
        if !self.initial_balance.is_finite() || self.initial_balance < 0.0 {
            return Err("initial_balance must be a non-negative number".to_string());
        }
        Ok(())
    }
}

impl From<CreateWalletRequest> for WalletDraft {
    fn from(req: CreateWalletRequest) -> Self {
        WalletDraft {
            owner_id: req.owner_id,
            initial_balance: req.initial_balance,
            currency: req.currency,
        }
    }
}

/// Query for `GET /v1/wallets`.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListWalletsQuery {
    /// Only wallets of this owner.
    pub owner_id: Option<String>,
}

/// Lock or unlock a wallet.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct LockRequest {
    /// `true` blocks debits.
    pub locked: bool,
}

/// Balance view of a wallet.
#[derive(Debug, Serialize, ToSchema)]
pub struct BalanceResponse {
    pub wallet_id: Uuid,
    pub balance: f64,
    pub currency: String,
    pub is_locked: bool,
    pub is_active: bool,
}

impl From<&Wallet> for BalanceResponse {
    fn from(wallet: &Wallet) -> Self {
        Self {
            wallet_id: *wallet.id.as_uuid(),
            balance: wallet.balance,
            currency: wallet.currency.clone(),
            is_locked: wallet.is_locked,
            is_active: wallet.is_active,
        }
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the wallets router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/wallets", post(create_wallet).get(list_wallets))
        .route("/v1/wallets/:wallet_id", get(get_wallet))
        .route("/v1/wallets/:wallet_id/balance", get(get_balance))
        .route("/v1/wallets/:wallet_id/lock", put(set_lock))
        .route("/v1/wallets/:wallet_id/policies", get(wallet_policies))
        .route("/v1/wallets/:wallet_id/transactions", get(wallet_transactions))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /v1/wallets — Create a wallet.
#[utoipa::path(
    post,
    path = "/v1/wallets",
    request_body = CreateWalletRequest,
    responses(
        (status = 201, description = "Wallet created"),
        (status = 400, description = "Malformed body", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid wallet", body = crate::error::ErrorBody),
    ),
    tag = "wallets"
)]
pub(crate) async fn create_wallet(
    State(state): State<AppState>,
    body: Result<Json<CreateWalletRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let req = extract_validated_json(body)?;
    let wallet = state.ledger.create_wallet(req.into())?;
    Ok((StatusCode::CREATED, Json(wallet)))
}

/// GET /v1/wallets — List wallets, oldest first.
#[utoipa::path(
    get,
    path = "/v1/wallets",
    params(ListWalletsQuery),
    responses((status = 200, description = "Wallets")),
    tag = "wallets"
)]
pub(crate) async fn list_wallets(
    State(state): State<AppState>,
    Query(query): Query<ListWalletsQuery>,
) -> Json<Vec<Wallet>> {
    Json(state.ledger.list_wallets(query.owner_id.as_deref()))
}

/// GET /v1/wallets/:wallet_id — Fetch a wallet.
#[utoipa::path(
    get,
    path = "/v1/wallets/{wallet_id}",
    params(("wallet_id" = Uuid, Path, description = "Wallet UUID")),
    responses(
        (status = 200, description = "Wallet"),
        (status = 404, description = "Wallet not found", body = crate::error::ErrorBody),
    ),
    tag = "wallets"
)]
pub(crate) async fn get_wallet(
    State(state): State<AppState>,
    Path(wallet_id): Path<Uuid>,
) -> Result<Json<Wallet>, AppError> {
    Ok(Json(state.ledger.wallet(&WalletId::from_uuid(wallet_id))?))
}

/// GET /v1/wallets/:wallet_id/balance — Balance and lock state.
#[utoipa::path(
    get,
    path = "/v1/wallets/{wallet_id}/balance",
    params(("wallet_id" = Uuid, Path, description = "Wallet UUID")),
    responses(
        (status = 200, description = "Balance", body = BalanceResponse),
        (status = 404, description = "Wallet not found", body = crate::error::ErrorBody),
    ),
    tag = "wallets"
)]
pub(crate) async fn get_balance(
    State(state): State<AppState>,
    Path(wallet_id): Path<Uuid>,
) -> Result<Json<BalanceResponse>, AppError> {
    let wallet = state.ledger.wallet(&WalletId::from_uuid(wallet_id))?;
    Ok(Json(BalanceResponse::from(&wallet)))
}

/// PUT /v1/wallets/:wallet_id/lock — Lock or unlock debits.
#[utoipa::path(
    put,
    path = "/v1/wallets/{wallet_id}/lock",
    params(("wallet_id" = Uuid, Path, description = "Wallet UUID")),
    request_body = LockRequest,
    responses(
        (status = 200, description = "Updated balance view", body = BalanceResponse),
        (status = 404, description = "Wallet not found", body = crate::error::ErrorBody),
    ),
    tag = "wallets"
)]
pub(crate) async fn set_lock(
    State(state): State<AppState>,
    Path(wallet_id): Path<Uuid>,
    body: Result<Json<LockRequest>, JsonRejection>,
) -> Result<Json<BalanceResponse>, AppError> {
    let req = extract_json(body)?;
    let wallet = state
        .ledger
        .set_wallet_locked(&WalletId::from_uuid(wallet_id), req.locked)?;
    tracing::info!(wallet_id = %wallet.id, locked = req.locked, "wallet lock changed");
    Ok(Json(BalanceResponse::from(&wallet)))
}

/// GET /v1/wallets/:wallet_id/policies — Effective policies of a wallet.
#[utoipa::path(
    get,
    path = "/v1/wallets/{wallet_id}/policies",
    params(("wallet_id" = Uuid, Path, description = "Wallet UUID")),
    responses(
        (status = 200, description = "Effective policies, insertion order"),
        (status = 404, description = "Wallet not found", body = crate::error::ErrorBody),
    ),
    tag = "wallets"
)]
pub(crate) async fn wallet_policies(
    State(state): State<AppState>,
    Path(wallet_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let policies = state.ledger.wallet_policies(&WalletId::from_uuid(wallet_id))?;
    Ok(Json(policies))
}

/// GET /v1/wallets/:wallet_id/transactions — Recorded transactions.
#[utoipa::path(
    get,
    path = "/v1/wallets/{wallet_id}/transactions",
    params(("wallet_id" = Uuid, Path, description = "Wallet UUID")),
    responses(
        (status = 200, description = "Transactions, oldest first"),
        (status = 404, description = "Wallet not found", body = crate::error::ErrorBody),
    ),
    tag = "wallets"
)]
pub(crate) async fn wallet_transactions(
    State(state): State<AppState>,
    Path(wallet_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let entries = state
        .ledger
        .wallet_transactions(&WalletId::from_uuid(wallet_id))?;
    Ok(Json(entries))
}
