//! # Policy API
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | `POST` | `/v1/policies` | `create_policy` |
//! | `GET` | `/v1/policies` | `list_policies` |
//! | `GET` | `/v1/policies/conflicts` | `detect_conflicts` |
//! | `GET` | `/v1/policies/:policy_id` | `get_policy` |
//! | `PUT` | `/v1/policies/:policy_id` | `update_policy` |
//! | `DELETE` | `/v1/policies/:policy_id` | `delete_policy` |
//! | `POST` | `/v1/policies/:policy_id/attach/:wallet_id` | `attach_policy` |
//! | `GET` | `/v1/policies/:policy_id/check` | `check_policy` |
//! | `GET` | `/v1/policies/:policy_id/describe` | `describe_policy` |
//!
//! Creation reports the conflicts the new policy introduces against the
//! active set; it does not refuse a conflicting policy.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use intentforge_core::{PolicyId, WalletId};
use intentforge_ledger::{PolicyCheck, PolicyFilter};
use intentforge_policy::{ConflictReport, Policy, PolicyDraft, PolicyType, PolicyUpdate};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::AppError;
use crate::extractors::extract_json;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request to create a policy: a policy draft plus an optional wallet.
#[derive(Debug, Deserialize)]
pub struct CreatePolicyRequest {
    #[serde(flatten)]
    pub draft: PolicyDraft,
    /// Wallet to attach the new policy to.
    #[serde(default)]
    pub wallet_id: Option<Uuid>,
}

/// Query for `GET /v1/policies`.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListPoliciesQuery {
    /// Only policies active and unexpired now.
    pub active_only: Option<bool>,
    /// Only policies of this type (snake_case).
    pub policy_type: Option<String>,
}

impl ListPoliciesQuery {
    fn filter(&self) -> Result<PolicyFilter, AppError> {
        let policy_type = self
            .policy_type
            .as_deref()
            .map(str::parse::<PolicyType>)
            .transpose()
            .map_err(|e| AppError::Validation(e.to_string()))?;
        Ok(PolicyFilter {
            active_only: self.active_only.unwrap_or(false),
            policy_type,
        })
    }
}

/// Result of a policy deletion.
#[derive(Debug, Serialize, ToSchema)]
pub struct DeletePolicyResponse {
    pub policy_id: Uuid,
    pub deleted: bool,
    /// Wallets the policy was detached from.
    pub detached_wallets: usize,
}

/// Human-readable description of a policy.
#[derive(Debug, Serialize, ToSchema)]
pub struct DescribePolicyResponse {
    pub policy_id: Uuid,
    pub description: String,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the policies router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/policies", post(create_policy).get(list_policies))
        .route("/v1/policies/conflicts", get(detect_conflicts))
        .route(
            "/v1/policies/:policy_id",
            get(get_policy).put(update_policy).delete(delete_policy),
        )
        .route("/v1/policies/:policy_id/attach/:wallet_id", post(attach_policy))
        .route("/v1/policies/:policy_id/check", get(check_policy))
        .route("/v1/policies/:policy_id/describe", get(describe_policy))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /v1/policies — Create a policy.
#[utoipa::path(
    post,
    path = "/v1/policies",
    request_body = serde_json::Value,
    responses(
        (status = 201, description = "Policy created, with the conflicts it introduced"),
        (status = 404, description = "Wallet not found", body = crate::error::ErrorBody),
        (status = 422, description = "Schema validation failed", body = crate::error::ErrorBody),
    ),
    tag = "policies"
)]
pub(crate) async fn create_policy(
    State(state): State<AppState>,
    body: Result<Json<CreatePolicyRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let req = extract_json(body)?;
    let wallet_id = req.wallet_id.map(WalletId::from_uuid);
    let created = state.ledger.create_policy(req.draft, wallet_id.as_ref())?;
    if !created.conflicts.is_empty() {
        tracing::warn!(
            policy_id = %created.policy.id,
            conflicts = created.conflicts.len(),
            "new policy conflicts with existing policies"
        );
    }
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /v1/policies — List policies in insertion order.
#[utoipa::path(
    get,
    path = "/v1/policies",
    params(ListPoliciesQuery),
    responses(
        (status = 200, description = "Policies"),
        (status = 422, description = "Unknown policy type", body = crate::error::ErrorBody),
    ),
    tag = "policies"
)]
pub(crate) async fn list_policies(
    State(state): State<AppState>,
    Query(query): Query<ListPoliciesQuery>,
) -> Result<Json<Vec<Policy>>, AppError> {
    Ok(Json(state.ledger.list_policies(query.filter()?)))
}

/// GET /v1/policies/conflicts — Conflict report over all policies.
#[utoipa::path(
    get,
    path = "/v1/policies/conflicts",
    responses((status = 200, description = "Conflict report")),
    tag = "policies"
)]
pub(crate) async fn detect_conflicts(State(state): State<AppState>) -> Json<ConflictReport> {
    Json(state.ledger.detect_conflicts())
}

/// GET /v1/policies/:policy_id — Fetch a policy.
#[utoipa::path(
    get,
    path = "/v1/policies/{policy_id}",
    params(("policy_id" = Uuid, Path, description = "Policy UUID")),
    responses(
        (status = 200, description = "Policy"),
        (status = 404, description = "Policy not found", body = crate::error::ErrorBody),
    ),
    tag = "policies"
)]
pub(crate) async fn get_policy(
    State(state): State<AppState>,
    Path(policy_id): Path<Uuid>,
) -> Result<Json<Policy>, AppError> {
    Ok(Json(state.ledger.policy(&PolicyId::from_uuid(policy_id))?))
}

/// PUT /v1/policies/:policy_id — Partial update; omitted fields are kept.
#[utoipa::path(
    put,
    path = "/v1/policies/{policy_id}",
    params(("policy_id" = Uuid, Path, description = "Policy UUID")),
    request_body = serde_json::Value,
    responses(
        (status = 200, description = "Updated policy"),
        (status = 404, description = "Policy not found", body = crate::error::ErrorBody),
        (status = 422, description = "Schema validation failed", body = crate::error::ErrorBody),
    ),
    tag = "policies"
)]
pub(crate) async fn update_policy(
    State(state): State<AppState>,
    Path(policy_id): Path<Uuid>,
    body: Result<Json<PolicyUpdate>, JsonRejection>,
) -> Result<Json<Policy>, AppError> {
    let update = extract_json(body)?;
    Ok(Json(
        state
            .ledger
            .update_policy(&PolicyId::from_uuid(policy_id), update)?,
    ))
}

/// DELETE /v1/policies/:policy_id — Delete and detach from all wallets.
#[utoipa::path(
    delete,
    path = "/v1/policies/{policy_id}",
    params(("policy_id" = Uuid, Path, description = "Policy UUID")),
    responses(
        (status = 200, description = "Policy deleted", body = DeletePolicyResponse),
        (status = 404, description = "Policy not found", body = crate::error::ErrorBody),
    ),
    tag = "policies"
)]
pub(crate) async fn delete_policy(
    State(state): State<AppState>,
    Path(policy_id): Path<Uuid>,
) -> Result<Json<DeletePolicyResponse>, AppError> {
    let removed = state.ledger.delete_policy(&PolicyId::from_uuid(policy_id))?;
    Ok(Json(DeletePolicyResponse {
        policy_id,
        deleted: true,
        detached_wallets: removed.attached_wallets.len(),
    }))
}

/// POST /v1/policies/:policy_id/attach/:wallet_id — Attach to a wallet.
#[utoipa::path(
    post,
    path = "/v1/policies/{policy_id}/attach/{wallet_id}",
    params(
        ("policy_id" = Uuid, Path, description = "Policy UUID"),
        ("wallet_id" = Uuid, Path, description = "Wallet UUID"),
    ),
    responses(
        (status = 200, description = "Policy with the wallet attached"),
        (status = 404, description = "Policy or wallet not found", body = crate::error::ErrorBody),
    ),
    tag = "policies"
)]
pub(crate) async fn attach_policy(
    State(state): State<AppState>,
    Path((policy_id, wallet_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Policy>, AppError> {
    let policy = state.ledger.attach_policy(
        &PolicyId::from_uuid(policy_id),
        &WalletId::from_uuid(wallet_id),
    )?;
    Ok(Json(policy))
}

/// GET /v1/policies/:policy_id/check — Schema check and expiry status.
#[utoipa::path(
    get,
    path = "/v1/policies/{policy_id}/check",
    params(("policy_id" = Uuid, Path, description = "Policy UUID")),
    responses(
        (status = 200, description = "Check result"),
        (status = 404, description = "Policy not found", body = crate::error::ErrorBody),
    ),
    tag = "policies"
)]
pub(crate) async fn check_policy(
    State(state): State<AppState>,
    Path(policy_id): Path<Uuid>,
) -> Result<Json<PolicyCheck>, AppError> {
    Ok(Json(state.ledger.check_policy(&PolicyId::from_uuid(policy_id))?))
}

/// GET /v1/policies/:policy_id/describe — Human-readable description.
#[utoipa::path(
    get,
    path = "/v1/policies/{policy_id}/describe",
    params(("policy_id" = Uuid, Path, description = "Policy UUID")),
    responses(
        (status = 200, description = "Description", body = DescribePolicyResponse),
        (status = 404, description = "Policy not found", body = crate::error::ErrorBody),
    ),
    tag = "policies"
)]
pub(crate) async fn describe_policy(
    State(state): State<AppState>,
    Path(policy_id): Path<Uuid>,
) -> Result<Json<DescribePolicyResponse>, AppError> {
    let description = state
        .ledger
        .describe_policy(&PolicyId::from_uuid(policy_id))?;
    Ok(Json(DescribePolicyResponse {
        policy_id,
        description,
    }))
}
