//! # OpenAPI Specification Assembly
//!
//! Collects every utoipa-documented route into one document served at
//! `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

/// Assembled OpenAPI spec for the entire API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "IntentForge API",
        version = "0.1.0",
        description = "Programmable-money policy engine: wallets, spending policies, transaction validation with explanations, conflict detection, clawbacks and a hash-chained audit log.",
        license(name = "Apache-2.0")
    ),
    paths(
        // Wallets
        crate::routes::wallets::create_wallet,
        crate::routes::wallets::list_wallets,
        crate::routes::wallets::get_wallet,
        crate::routes::wallets::get_balance,
        crate::routes::wallets::set_lock,
        crate::routes::wallets::wallet_policies,
        crate::routes::wallets::wallet_transactions,
        // Policies
        crate::routes::policies::create_policy,
        crate::routes::policies::list_policies,
        crate::routes::policies::detect_conflicts,
        crate::routes::policies::get_policy,
        crate::routes::policies::update_policy,
        crate::routes::policies::delete_policy,
        crate::routes::policies::attach_policy,
        crate::routes::policies::check_policy,
        crate::routes::policies::describe_policy,
        // Transactions
        crate::routes::transactions::validate_transaction,
        crate::routes::transactions::simulate_transaction,
        crate::routes::transactions::execute_transaction,
        crate::routes::transactions::get_transaction,
        // Clawbacks
        crate::routes::clawbacks::execute_clawback,
        crate::routes::clawbacks::clawback_history,
        // Audit
        crate::routes::audit::list_audit_records,
        crate::routes::audit::verify_chain,
        crate::routes::audit::find_by_hash,
        crate::routes::audit::request_metrics,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        crate::middleware::metrics::MetricsSnapshot,
        crate::routes::wallets::CreateWalletRequest,
        crate::routes::wallets::LockRequest,
        crate::routes::wallets::BalanceResponse,
        crate::routes::policies::DeletePolicyResponse,
        crate::routes::policies::DescribePolicyResponse,
        crate::routes::clawbacks::ExecuteClawbackRequest,
    )),
    tags(
        (name = "wallets", description = "Wallet API"),
        (name = "policies", description = "Policy Management API"),
        (name = "transactions", description = "Transaction Validation API"),
        (name = "clawbacks", description = "Clawback & Recovery API"),
        (name = "audit", description = "Audit Log & Metrics API"),
    )
)]
pub struct ApiDoc;

/// Build the OpenAPI router.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

/// GET /openapi.json — Return the generated OpenAPI specification.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
