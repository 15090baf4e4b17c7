//! # intentforge-api — Axum API Service for IntentForge
//!
//! HTTP surface over the [`intentforge_ledger::Ledger`]. Handlers hold no
//! business logic: they decode requests, call the ledger and map errors
//! through [`AppError`].
//!
//! ## API Surface
//!
//! | Prefix | Module | Domain |
//! |--------|--------|--------|
//! | `/v1/wallets/*` | [`routes::wallets`] | Wallets |
//! | `/v1/policies/*` | [`routes::policies`] | Policies and conflicts |
//! | `/v1/transactions/*` | [`routes::transactions`] | Validation and settlement |
//! | `/v1/clawbacks` | [`routes::clawbacks`] | Clawbacks |
//! | `/v1/audit/*`, `/v1/metrics` | [`routes::audit`] | Audit log and counters |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! CorsLayer (when origins are configured) → TraceLayer → MetricsMiddleware → Handler
//! ```
//!
//! ## OpenAPI
//!
//! Generated with utoipa and served at `/openapi.json`.

pub mod config;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::http::HeaderValue;
use axum::middleware::from_fn;
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::middleware::metrics::ApiMetrics;

pub use config::{AppConfig, ConfigError};
pub use error::AppError;
pub use state::AppState;

/// Assemble the full application router with all routes and middleware.
pub fn app(state: AppState) -> Router {
    app_with_metrics(state, ApiMetrics::new())
}

/// [`app`] with caller-owned counters.
pub fn app_with_metrics(state: AppState, metrics: ApiMetrics) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    let api = Router::new()
        .merge(routes::wallets::router())
        .merge(routes::policies::router())
        .merge(routes::transactions::router())
        .merge(routes::clawbacks::router())
        .merge(routes::audit::router())
        .merge(openapi::router())
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(axum::Extension(metrics))
        .with_state(state);

    let health = Router::new()
        .route("/health/liveness", axum::routing::get(liveness))
        .route("/health/readiness", axum::routing::get(readiness));

    let router = Router::new().merge(health).merge(api);
    match cors {
        Some(cors) => router.layer(cors),
        None => router,
    }
}

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    if origins.is_empty() {
        return None;
    }
    if origins.iter().any(|o| o == "*") {
        return Some(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any));
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any),
    )
}

/// Liveness check: 200 while the process runs.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness check: 200 once the router is serving.
async fn readiness() -> &'static str {
    "ready"
}
