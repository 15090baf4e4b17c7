//! # intentforge-api — Binary Entry Point
//!
//! Starts the Axum HTTP server. Configuration comes from the environment,
//! optionally seeded by the YAML file named in `INTENTFORGE_CONFIG`.

use intentforge_api::config::{AppConfig, LogFormat};
use intentforge_api::AppState;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }

    let addr = config.bind_addr();
    tracing::info!(
        environment = %config.environment,
        default_currency = %config.default_currency,
        audit_capacity = config.audit_capacity,
        history_capacity = config.history_capacity,
        clawback_capacity = config.clawback_capacity,
        "starting IntentForge API"
    );

    let app = intentforge_api::app(AppState::with_config(config));

    let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
        tracing::error!("failed to bind {addr}: {e}");
        e
    })?;
    tracing::info!("IntentForge API listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
