//! # Application State
//!
//! Shared state passed to every handler through the `State` extractor.
//! The [`Ledger`] is a cheap handle: clones share the same stores, and all
//! locks are `parking_lot` locks never held across an `.await`.

use std::sync::Arc;

use intentforge_ledger::Ledger;

use crate::config::AppConfig;

/// Shared application state.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Policies, wallets, history, audit log and clawbacks.
    pub ledger: Ledger,
    /// Resolved configuration.
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// State over an empty ledger with default configuration.
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    /// State over an empty ledger built from `config`.
    pub fn with_config(config: AppConfig) -> Self {
        let ledger = Ledger::new(config.ledger_config());
        Self {
            ledger,
            config: Arc::new(config),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
