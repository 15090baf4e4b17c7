//! # intentforge-cli — Command-Line Interface for IntentForge
//!
//! Offline tooling over policy files. Nothing here touches a ledger: the
//! policies in the file are evaluated directly.
//!
//! ## Subcommands
//!
//! - `intentforge validate` — Validate one transaction against a policy file.
//! - `intentforge conflicts` — Report contradictory policies.
//! - `intentforge describe` — Print a description of every policy.
//!
//! ## Exit Codes
//!
//! `0` success or approved, `1` blocked or critical conflicts found,
//! `2` operational error (unreadable file, invalid policy).
//!
//! ## Policy Files
//!
//! YAML or JSON with a `policies` list of policy drafts:
//!
//! ```yaml
//! policies:
//!   - name: Education Only
//!     policy_type: category_restriction
//!     rules:
//!       allowed_categories: [education, books]
//!       max_amount: 50000
//! ```

pub mod conflicts;
pub mod describe;
pub mod validate;

use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use intentforge_core::WalletId;
use intentforge_policy::{Policy, PolicyDraft, Transaction};

/// Exit code for success.
pub const EXIT_OK: u8 = 0;
/// Exit code for a blocked transaction or critical conflicts.
pub const EXIT_FINDINGS: u8 = 1;
/// Exit code for operational errors.
pub const EXIT_ERROR: u8 = 2;

/// On-disk policy file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyFile {
    pub policies: Vec<PolicyDraft>,
}

/// On-disk transaction description. The wallet is implicit: every policy
/// in the accompanying file applies.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransactionFile {
    pub amount: f64,
    pub category: String,
    #[serde(default)]
    pub merchant: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
}

impl TransactionFile {
    /// Build a pending transaction from the file contents.
    pub fn into_transaction(self) -> Result<Transaction> {
        let mut tx = Transaction::new(WalletId::new(), self.amount, self.category.trim());
        tx.merchant = self.merchant;
        tx.location = self.location;
        if let Some(currency) = self.currency {
            tx.currency = currency;
        }
        tx.validate().context("invalid transaction")?;
        Ok(tx)
    }
}

/// Parse a YAML or JSON document. `.json` files use the JSON parser; all
/// others go through YAML.
pub fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| e.eq_ignore_ascii_case("json"));
    if is_json {
        serde_json::from_str(&raw).with_context(|| format!("failed to parse JSON {}", path.display()))
    } else {
        serde_yaml::from_str(&raw).with_context(|| format!("failed to parse YAML {}", path.display()))
    }
}

/// Load and schema-check every policy in a policy file.
///
/// All invalid policies are reported together before failing.
pub fn load_policies(path: &Path, now: DateTime<Utc>) -> Result<Vec<Policy>> {
    let file: PolicyFile = read_document(path)?;
    let mut policies = Vec::with_capacity(file.policies.len());
    let mut failures = Vec::new();
    for (index, draft) in file.policies.into_iter().enumerate() {
        let name = draft.name.clone();
        match Policy::from_draft(draft, now) {
            Ok(policy) => policies.push(policy),
            Err(e) => failures.push(format!("policy #{} ({name:?}): {}", index + 1, e.messages().join("; "))),
        }
    }
    if !failures.is_empty() {
        for failure in &failures {
            tracing::error!("{failure}");
        }
        bail!(
            "{} invalid polic{} in {}:\n  {}",
            failures.len(),
            if failures.len() == 1 { "y" } else { "ies" },
            path.display(),
            failures.join("\n  ")
        );
    }
    tracing::info!(count = policies.len(), path = %path.display(), "loaded policies");
    Ok(policies)
}

/// Load a transaction file.
pub fn load_transaction(path: &Path) -> Result<Transaction> {
    let file: TransactionFile = read_document(path)?;
    file.into_transaction()
        .with_context(|| format!("in {}", path.display()))
}
