//! # Audit API
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | `GET` | `/v1/audit` | `list_audit_records` |
//! | `GET` | `/v1/audit/verify` | `verify_chain` |
//! | `GET` | `/v1/audit/hash/:hash` | `find_by_hash` |
//! | `GET` | `/v1/metrics` | `request_metrics` |

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Extension, Json, Router};
use intentforge_ledger::{AuditEventType, AuditRecord, ChainVerification};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::error::AppError;
use crate::middleware::metrics::{ApiMetrics, MetricsSnapshot};
use crate::state::AppState;

const DEFAULT_LIMIT: usize = 100;
const MAX_LIMIT: usize = 1000;

/// Query for `GET /v1/audit`.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct AuditQuery {
    /// Most recent N records (default 100, max 1000).
    pub limit: Option<usize>,
    /// Only records of this event type.
    pub event_type: Option<String>,
}

/// Build the audit router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/audit", get(list_audit_records))
        .route("/v1/audit/verify", get(verify_chain))
        .route("/v1/audit/hash/:hash", get(find_by_hash))
        .route("/v1/metrics", get(request_metrics))
}

/// GET /v1/audit — Most recent audit records, oldest first.
#[utoipa::path(
    get,
    path = "/v1/audit",
    params(AuditQuery),
    responses(
        (status = 200, description = "Audit records"),
        (status = 422, description = "Unknown event type", body = crate::error::ErrorBody),
    ),
    tag = "audit"
)]
pub(crate) async fn list_audit_records(
    State(state): State<AppState>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Vec<AuditRecord>>, AppError> {
    let event_type = query
        .event_type
        .as_deref()
        .map(str::parse::<AuditEventType>)
        .transpose()
        .map_err(AppError::Validation)?;
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    Ok(Json(state.ledger.audit_log().recent(limit, event_type)))
}

/// GET /v1/audit/verify — Recompute and check the hash chain.
#[utoipa::path(
    get,
    path = "/v1/audit/verify",
    responses((status = 200, description = "Chain verification")),
    tag = "audit"
)]
pub(crate) async fn verify_chain(State(state): State<AppState>) -> Json<ChainVerification> {
    Json(state.ledger.audit_log().verify_chain())
}

/// GET /v1/audit/hash/:hash — Look up a record by data or chain hash.
#[utoipa::path(
    get,
    path = "/v1/audit/hash/{hash}",
    params(("hash" = String, Path, description = "Hex SHA-256, optionally sha256: prefixed")),
    responses(
        (status = 200, description = "Audit record"),
        (status = 404, description = "No record with this hash", body = crate::error::ErrorBody),
    ),
    tag = "audit"
)]
pub(crate) async fn find_by_hash(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> Result<Json<AuditRecord>, AppError> {
    state
        .ledger
        .audit_log()
        .find_by_hash(&hash)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("audit record {hash}")))
}

/// GET /v1/metrics — Request and error counters.
#[utoipa::path(
    get,
    path = "/v1/metrics",
    responses((status = 200, description = "Counters", body = MetricsSnapshot)),
    tag = "audit"
)]
pub(crate) async fn request_metrics(Extension(metrics): Extension<ApiMetrics>) -> Json<MetricsSnapshot> {
    Json(metrics.snapshot())
}
