#![deny(missing_docs)]

//! # intentforge-core — Foundational Types for IntentForge
//!
//! Types every other crate in the workspace depends on. No internal crate
//! dependencies; only `serde`, `serde_json`, `thiserror`, `uuid` and `sha2`
//! from the ecosystem.
//!
//! ## Design Principles
//!
//! 1. **Newtype identifiers.** [`PolicyId`], [`WalletId`], [`TransactionId`]
//!    and [`ClawbackId`] are distinct types over UUID v4.
//!
//! 2. **Violations are data, errors are errors.** Policy breaches travel in
//!    validation results. [`IntentForgeError`] covers malformed input,
//!    missing resources and serialization faults only.
//!
//! 3. **[`CanonicalBytes`] is the sole path to digest computation.** Audit
//!    hashes are reproducible regardless of struct field order.

pub mod canonical;
pub mod digest;
pub mod error;
pub mod identity;

pub use canonical::CanonicalBytes;
pub use digest::{chain_digest, sha256_digest, ContentDigest};
pub use error::{CanonicalizationError, IntentForgeError, NotFoundError, ValidationError};
pub use identity::{ClawbackId, PolicyId, TransactionId, WalletId};
