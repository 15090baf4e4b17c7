#![deny(missing_docs)]

//! # intentforge-ledger — Stateful Side of IntentForge
//!
//! In-memory stores and the engines that mutate them:
//!
//! - [`policy_store`]: insertion-ordered policies behind one `RwLock`.
//! - [`wallet`]: wallets, each behind its own `Mutex` so balance changes on
//!   different wallets never contend.
//! - [`history`]: validated transactions and their results.
//! - [`audit`]: bounded, hash-chained audit log.
//! - [`clawback`]: reversal of transactions with repeat protection.
//! - [`ledger`]: the [`Ledger`] facade wiring the above together.
//!
//! State is session-scoped; nothing is persisted.

pub mod audit;
pub mod clawback;
pub mod error;
pub mod history;
pub mod ledger;
pub mod policy_store;
pub mod wallet;

pub use audit::{
    AuditEvent, AuditEventType, AuditLog, AuditRecord, AuditSink, ChainVerification,
    DEFAULT_AUDIT_CAPACITY,
};
pub use clawback::{
    ClawbackEngine, ClawbackError, ClawbackReason, ClawbackRecord, ClawbackRequest, ClawbackResult,
    ClawbackStatus, DEFAULT_CLAWBACK_CAPACITY,
};
pub use error::LedgerError;
pub use history::{HistoryEntry, TransactionHistory, DEFAULT_HISTORY_CAPACITY};
pub use ledger::{Execution, Ledger, LedgerConfig, PolicyCheck};
pub use policy_store::{PolicyCreated, PolicyFilter, PolicyStore};
pub use wallet::{BalanceChange, Wallet, WalletDraft, WalletStore, DEFAULT_CURRENCY};
