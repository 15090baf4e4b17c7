//! # Explanation Generator
//!
//! Turns a [`ValidationResult`] into text a payer can act on. Templates are
//! fixed; the same result, transaction and policy set always yield the same
//! text. The generator is presentation only and never changes a decision.

use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::fmt::Write as _;

use crate::policy::{Policy, PolicyType};
use crate::transaction::{Transaction, TransactionStatus, ValidationResult};

/// Upper bound on per-policy compliance lines in an approval.
pub const MAX_COMPLIANCE_LINES: usize = 3;

/// Deterministic, template-based explanation builder.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExplanationGenerator;

impl ExplanationGenerator {
    /// Create a generator.
    pub fn new() -> Self {
        Self
    }

    /// Explain a validation decision.
    ///
    /// `policies` are the effective policies in evaluation order.
    pub fn explain<P: Borrow<Policy>>(
        &self,
        result: &ValidationResult,
        tx: &Transaction,
        policies: &[P],
    ) -> String {
        match result.status {
            TransactionStatus::Approved => self.approval(tx, policies),
            _ => self.rejection(result, tx, policies.len()),
        }
    }

    fn approval<P: Borrow<Policy>>(&self, tx: &Transaction, policies: &[P]) -> String {
        let mut out = String::from("[APPROVED] TRANSACTION APPROVED\n\n");
        write_details(&mut out, tx);
        out.push_str("\nValidation Summary:\n");
        if policies.is_empty() {
            out.push_str("  - No active policies - transaction allowed by default\n");
        } else {
            let _ = writeln!(
                out,
                "  - Evaluated {} active {}",
                policies.len(),
                plural(policies.len(), "policy", "policies")
            );
            out.push_str("  - All policy checks passed successfully\n");
            for policy in policies.iter().take(MAX_COMPLIANCE_LINES) {
                let _ = writeln!(out, "  - {}", compliance_line(policy.borrow(), tx));
            }
        }
        out.push_str("\nRecommendation: Proceed with transaction");
        out
    }

    fn rejection(&self, result: &ValidationResult, tx: &Transaction, evaluated: usize) -> String {
        let mut out = String::from("[BLOCKED] TRANSACTION BLOCKED\n\n");
        write_details(&mut out, tx);
        let _ = writeln!(out, "\nViolations Detected ({}):", result.violations.len());
        for (i, violation) in result.violations.iter().enumerate() {
            let _ = writeln!(out, "  {}. {}", i + 1, violation.message);
            let _ = writeln!(out, "     Hint: {}", violation.rule.remediation());
        }
        let violated: BTreeSet<_> = result.violations.iter().map(|v| &v.policy_id).collect();
        out.push_str("\nPolicy Analysis:\n");
        let _ = writeln!(out, "  - Total Policies Evaluated: {evaluated}");
        let _ = writeln!(out, "  - Policies Violated: {}", violated.len());
        out.push_str("\nRecommendation: Transaction rejected - address violations to proceed");
        out
    }

    /// Summarise what a policy enforces.
    pub fn describe_policy(&self, policy: &Policy) -> String {
        let rules = &policy.rules;
        let mut out = format!("Policy: {}\n", policy.name);
        let _ = writeln!(out, "Type: {}", policy.policy_type.label());
        let _ = writeln!(out, "Priority: {}", policy.priority);
        let _ = writeln!(
            out,
            "Status: {}",
            if policy.is_active { "Active" } else { "Inactive" }
        );
        if let Some(description) = policy.description.as_deref().filter(|d| !d.is_empty()) {
            let _ = writeln!(out, "Description: {description}");
        }

        out.push_str("\nRules:\n");
        if rules.is_empty() {
            out.push_str("  - No constraints (all transactions pass)\n");
        }
        if !rules.allowed_categories.is_empty() {
            let _ = writeln!(
                out,
                "  - Allowed categories: {}",
                rules.allowed_categories.join(", ")
            );
        }
        if let Some(max) = rules.max_amount {
            let _ = writeln!(out, "  - Maximum amount: {max}");
        }
        if let Some(cap) = rules.per_transaction_cap {
            let _ = writeln!(out, "  - Per-transaction cap: {cap}");
        }
        if !rules.geo_fence.is_empty() {
            let _ = writeln!(out, "  - Allowed regions: {}", rules.geo_fence.join(", "));
        }
        if !rules.merchant_whitelist.is_empty() {
            let _ = writeln!(
                out,
                "  - Approved merchants: {}",
                rules.merchant_whitelist.join(", ")
            );
        }
        if !rules.merchant_blacklist.is_empty() {
            let _ = writeln!(
                out,
                "  - Blocked merchants: {}",
                rules.merchant_blacklist.join(", ")
            );
        }

        match policy.expires_at {
            Some(expiry) => {
                let _ = write!(out, "\nExpires: {}", expiry.format("%Y-%m-%d %H:%M UTC"));
            }
            None => out.push_str("\nExpires: never"),
        }
        out
    }
}

fn write_details(out: &mut String, tx: &Transaction) {
    out.push_str("Transaction Details:\n");
    let _ = writeln!(out, "  - Amount: {} {}", tx.currency, tx.amount);
    let _ = writeln!(out, "  - Category: {}", capitalize(&tx.category));
    let _ = writeln!(out, "  - Merchant: {}", tx.merchant().unwrap_or("unknown"));
    let _ = writeln!(out, "  - Location: {}", tx.location().unwrap_or("unspecified"));
}

fn compliance_line(policy: &Policy, tx: &Transaction) -> String {
    let rules = &policy.rules;
    match policy.policy_type {
        PolicyType::CategoryRestriction if !rules.allowed_categories.is_empty() => format!(
            "Category '{}' is allowed (permitted: {})",
            tx.category,
            rules.allowed_categories.join(", ")
        ),
        PolicyType::SpendingLimit | PolicyType::AmountLimit if rules.max_amount.is_some() => {
            format!(
                "Amount {cur} {} is within limit (max: {cur} {})",
                tx.amount,
                rules.max_amount.unwrap_or_default(),
                cur = tx.currency
            )
        }
        PolicyType::GeoRestriction | PolicyType::GeoFence if !rules.geo_fence.is_empty() => {
            format!(
                "Location {} is permitted (allowed: {})",
                tx.location().unwrap_or("unspecified"),
                rules.geo_fence.join(", ")
            )
        }
        _ => format!("Policy '{}' requirements satisfied", policy.name),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn plural<'a>(n: usize, one: &'a str, many: &'a str) -> &'a str {
    if n == 1 {
        one
    } else {
        many
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::{Violation, ViolationKind};
    use crate::policy::{PolicyDraft, RuleBundle};
    use chrono::Utc;
    use intentforge_core::{PolicyId, WalletId};

    fn result(status: TransactionStatus, violations: Vec<Violation>) -> ValidationResult {
        ValidationResult {
            transaction_id: intentforge_core::TransactionId::new(),
            status,
            violations,
            policies_evaluated: Vec::new(),
            explanation: String::new(),
            confidence: 0.0,
            processing_time_ms: 0.0,
            requires_clawback: false,
        }
    }

    #[test]
    fn approval_without_policies() {
        let tx = Transaction::new(WalletId::new(), 1000.0, "education");
        let text = ExplanationGenerator::new().explain::<Policy>(
            &result(TransactionStatus::Approved, vec![]),
            &tx,
            &[],
        );
        assert!(text.starts_with("[APPROVED] TRANSACTION APPROVED"));
        assert!(text.contains("Amount: INR 1000"));
        assert!(text.contains("Category: Education"));
        assert!(text.contains("Merchant: unknown"));
        assert!(text.contains("No active policies"));
        assert!(text.ends_with("Recommendation: Proceed with transaction"));
    }

    #[test]
    fn approval_caps_compliance_lines() {
        let policies: Vec<Policy> = (0..5)
            .map(|i| {
                Policy::from_draft(
                    PolicyDraft::new(format!("Policy {i}"))
                        .with_type(PolicyType::SpendingLimit)
                        .with_rules(RuleBundle::default().with_max_amount(5000.0)),
                    Utc::now(),
                )
                .unwrap()
            })
            .collect();
        let tx = Transaction::new(WalletId::new(), 200.0, "food");
        let text = ExplanationGenerator::new().explain(
            &result(TransactionStatus::Approved, vec![]),
            &tx,
            &policies,
        );
        assert!(text.contains("Evaluated 5 active policies"));
        assert_eq!(text.matches("is within limit").count(), MAX_COMPLIANCE_LINES);
        assert!(text.contains("Amount INR 200 is within limit (max: INR 5000)"));
    }

    #[test]
    fn rejection_numbers_violations_with_hints() {
        let pid = PolicyId::new();
        let violations = vec![
            Violation {
                policy_id: pid.clone(),
                policy_name: "Edu".to_string(),
                rule: ViolationKind::CategoryNotAllowed,
                message: "Policy 'Edu': Category 'games' not in allowed list [education]"
                    .to_string(),
            },
            Violation {
                policy_id: PolicyId::new(),
                policy_name: "Cap".to_string(),
                rule: ViolationKind::ExceedsMaxAmount,
                message: "Policy 'Cap': Amount 900 exceeds maximum limit 500".to_string(),
            },
        ];
        let tx = Transaction::new(WalletId::new(), 900.0, "games").with_merchant("Arcade");
        let text = ExplanationGenerator::new().explain::<Policy>(
            &result(TransactionStatus::Blocked, violations),
            &tx,
            &[],
        );
        assert!(text.starts_with("[BLOCKED] TRANSACTION BLOCKED"));
        assert!(text.contains("Violations Detected (2):"));
        assert!(text.contains("  1. Policy 'Edu'"));
        assert!(text.contains("  2. Policy 'Cap'"));
        assert!(text.contains("Hint: Try a different category"));
        assert!(text.contains("Hint: Reduce the amount"));
        assert!(text.contains("Policies Violated: 2"));
        assert!(text.contains("Merchant: Arcade"));
    }

    #[test]
    fn explanation_is_deterministic() {
        let tx = Transaction::new(WalletId::new(), 42.0, "food");
        let gen = ExplanationGenerator::new();
        let r = result(TransactionStatus::Approved, vec![]);
        assert_eq!(
            gen.explain::<Policy>(&r, &tx, &[]),
            gen.explain::<Policy>(&r, &tx, &[])
        );
    }

    #[test]
    fn describe_lists_rules() {
        let policy = Policy::from_draft(
            PolicyDraft::new("Student Grant")
                .with_description("Scholarship funds")
                .with_priority(5)
                .with_rules(
                    RuleBundle::default()
                        .with_categories(["education", "books"])
                        .with_max_amount(10000.0)
                        .with_blacklist(["Casino"]),
                ),
            Utc::now(),
        )
        .unwrap();
        let text = ExplanationGenerator::new().describe_policy(&policy);
        assert!(text.starts_with("Policy: Student Grant"));
        assert!(text.contains("Type: Category Restriction"));
        assert!(text.contains("Priority: 5"));
        assert!(text.contains("Description: Scholarship funds"));
        assert!(text.contains("Allowed categories: education, books"));
        assert!(text.contains("Maximum amount: 10000"));
        assert!(text.contains("Blocked merchants: Casino"));
        assert!(text.ends_with("Expires: never"));
    }

    #[test]
    fn describe_empty_policy() {
        let policy = Policy::from_draft(PolicyDraft::new("Open").inactive(), Utc::now()).unwrap();
        let text = ExplanationGenerator::new().describe_policy(&policy);
        assert!(text.contains("Status: Inactive"));
        assert!(text.contains("No constraints"));
    }
}
