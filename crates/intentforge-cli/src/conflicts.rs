//! # Conflicts Subcommand
//!
//! Pairwise conflict analysis over a policy file.

use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;

use intentforge_policy::{ConflictAnalyzer, ConflictReport};

use crate::{load_policies, EXIT_FINDINGS, EXIT_OK};

/// Arguments for `intentforge conflicts`.
#[derive(Args, Debug)]
pub struct ConflictsArgs {
    /// Policy file (YAML or JSON).
    #[arg(long, value_name = "FILE")]
    pub policies: PathBuf,

    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Render a report as text, one line per conflict.
pub fn render(report: &ConflictReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Policies analyzed: {}  Conflicts: {} (critical {}, high {}, medium {}, low {})",
        report.policies_analyzed,
        report.total_conflicts,
        report.by_severity.critical,
        report.by_severity.high,
        report.by_severity.medium,
        report.by_severity.low,
    );
    for conflict in &report.conflicts {
        let _ = writeln!(
            out,
            "  [{}] {} <-> {}: {}",
            conflict.severity, conflict.policy_a.name, conflict.policy_b.name, conflict.description
        );
    }
    out
}

/// Execute the conflicts subcommand.
///
/// Returns exit code: 1 when any critical conflict exists.
pub fn run_conflicts(args: &ConflictsArgs) -> Result<u8> {
    let policies = load_policies(&args.policies, Utc::now())?;
    let report = ConflictAnalyzer::new().detect_conflicts(&policies);

    if args.json {
        let json = serde_json::to_string_pretty(&report).context("failed to serialize report")?;
        println!("{json}");
    } else {
        print!("{}", render(&report));
    }

    if report.has_critical_conflicts {
        tracing::warn!(total = report.total_conflicts, "critical policy conflicts found");
        Ok(EXIT_FINDINGS)
    } else {
        Ok(EXIT_OK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intentforge_policy::{Policy, PolicyDraft, RuleBundle};

    #[test]
    fn render_lists_each_conflict() {
        let now = Utc::now();
        let policies: Vec<Policy> = [("Edu", "education"), ("Food", "food")]
            .into_iter()
            .map(|(name, category)| {
                Policy::from_draft(
                    PolicyDraft::new(name).with_rules(RuleBundle::default().with_categories([category])),
                    now,
                )
                .unwrap()
            })
            .collect();
        let text = render(&ConflictAnalyzer::new().detect_conflicts(&policies));
        assert!(text.starts_with("Policies analyzed: 2  Conflicts: 1 (critical 1"));
        assert!(text.contains("[CRITICAL] Edu <-> Food"));
    }
}
