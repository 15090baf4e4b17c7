//! # Validate Subcommand
//!
//! Evaluates one transaction against every effective policy in a policy
//! file and prints the result JSON followed by the explanation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;

use intentforge_policy::{Policy, Transaction, ValidationOrchestrator, ValidationResult};

use crate::{load_policies, load_transaction, EXIT_FINDINGS, EXIT_OK};

/// Arguments for `intentforge validate`.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Policy file (YAML or JSON).
    #[arg(long, value_name = "FILE")]
    pub policies: PathBuf,

    /// Transaction file (YAML or JSON).
    #[arg(long, value_name = "FILE")]
    pub transaction: PathBuf,

    /// Evaluate as of this RFC 3339 instant instead of now.
    #[arg(long, value_name = "RFC3339")]
    pub at: Option<DateTime<Utc>>,

    /// Print only the result JSON.
    #[arg(long)]
    pub quiet: bool,
}

/// Validate `tx` against `policies` at `now`.
pub fn evaluate(tx: &Transaction, policies: &[Policy], now: DateTime<Utc>) -> ValidationResult {
    ValidationOrchestrator::default().validate_at(tx, policies, now)
}

/// Execute the validate subcommand.
///
/// Returns exit code: 0 approved, 1 blocked.
pub fn run_validate(args: &ValidateArgs) -> Result<u8> {
    let now = args.at.unwrap_or_else(Utc::now);
    let policies = load_policies(&args.policies, now)?;
    let tx = load_transaction(&args.transaction)?;

    let result = evaluate(&tx, &policies, now);
    tracing::info!(
        status = %result.status,
        violations = result.violations.len(),
        policies_evaluated = result.policies_evaluated.len(),
        "transaction evaluated"
    );

    let json = serde_json::to_string_pretty(&result).context("failed to serialize result")?;
    println!("{json}");
    if !args.quiet {
        println!();
        println!("{}", result.explanation);
    }

    Ok(if result.is_approved() {
        EXIT_OK
    } else {
        EXIT_FINDINGS
    })
}
