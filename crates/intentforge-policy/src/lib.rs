#![deny(missing_docs)]

//! # intentforge-policy — Programmable-Money Policy Engine
//!
//! The pure, synchronous core of IntentForge. Nothing here touches a lock,
//! a clock beyond the caller-overridable default instant, or the network.
//!
//! - [`policy`]: [`Policy`], the typed [`RuleBundle`], drafts and updates.
//! - [`transaction`]: [`Transaction`] and [`ValidationResult`].
//! - [`evaluator`]: ordered, short-circuiting checks of one transaction
//!   against one policy.
//! - [`orchestrator`]: priority-sorted validation against every effective
//!   policy of a wallet.
//! - [`conflict`]: pairwise detection of contradictory policies with a
//!   typed [`Severity`] per rule.
//! - [`explanation`]: deterministic decision and policy descriptions.
//!
//! ## Quick Start
//!
//! ```
//! use chrono::Utc;
//! use intentforge_core::WalletId;
//! use intentforge_policy::{
//!     Policy, PolicyDraft, RuleBundle, Transaction, TransactionStatus, ValidationOrchestrator,
//! };
//!
//! let policy = Policy::from_draft(
//!     PolicyDraft::new("Education Only")
//!         .with_rules(RuleBundle::default().with_categories(["education"])),
//!     Utc::now(),
//! )
//! .unwrap();
//!
//! let tx = Transaction::new(WalletId::new(), 1000.0, "entertainment");
//! let result = ValidationOrchestrator::default().validate(&tx, &[policy]);
//! assert_eq!(result.status, TransactionStatus::Blocked);
//! ```

pub mod conflict;
pub mod evaluator;
pub mod explanation;
pub mod orchestrator;
pub mod policy;
pub mod transaction;

pub use conflict::{
    Conflict, ConflictAnalyzer, ConflictReport, ConflictRule, PolicyRef, Severity, SeverityCounts,
};
pub use evaluator::{evaluate, evaluate_at, Violation, ViolationKind};
pub use explanation::ExplanationGenerator;
pub use orchestrator::{ValidationOrchestrator, CONFIDENCE_APPROVED, CONFIDENCE_BLOCKED};
pub use policy::{
    DraftRules, Policy, PolicyDraft, PolicyType, PolicyUpdate, RuleBundle, UnknownPolicyType,
};
pub use transaction::{Transaction, TransactionRequest, TransactionStatus, ValidationResult};
