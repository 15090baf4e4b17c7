//! # Policy Engine Scenarios
//!
//! End-to-end decisions over realistic wallet policies:
//! - Education grant blocks entertainment spending
//! - Spending limit blocks an oversized payment
//! - Education vs food restrictions flagged as a CRITICAL conflict
//! - Geo-fenced policy requires a location
//! - Policies loaded from YAML drafts

use chrono::Utc;
use intentforge_core::WalletId;
use intentforge_policy::{
    ConflictAnalyzer, ConflictRule, ExplanationGenerator, Policy, PolicyDraft, PolicyType,
    RuleBundle, Severity, Transaction, TransactionStatus, ValidationOrchestrator, ViolationKind,
};

fn create(draft: PolicyDraft) -> Policy {
    Policy::from_draft(draft, Utc::now()).unwrap()
}

// ---------------------------------------------------------------------------
// 1. Category restriction
// ---------------------------------------------------------------------------

#[test]
fn education_grant_blocks_entertainment() {
    let grant = create(
        PolicyDraft::new("Education Grant")
            .with_type(PolicyType::CategoryRestriction)
            .with_rules(RuleBundle::default().with_categories(["education"])),
    );
    let tx = Transaction::new(WalletId::new(), 1000.0, "entertainment");
    let result = ValidationOrchestrator::default().validate(&tx, &[grant.clone()]);

    assert_eq!(result.status, TransactionStatus::Blocked);
    assert_eq!(result.violations.len(), 1);
    let message = &result.violations[0].message;
    assert!(message.contains("Education Grant"));
    assert!(message.contains("entertainment"));
    assert!(message.contains("education"));
    assert_eq!(result.policies_evaluated, vec![grant.id]);
    assert!(result.explanation.contains("TRANSACTION BLOCKED"));
    assert!(result.explanation.contains("Try a different category"));
}

#[test]
fn education_grant_approves_education() {
    let grant = create(
        PolicyDraft::new("Education Grant")
            .with_rules(RuleBundle::default().with_categories(["education"])),
    );
    let tx = Transaction::new(WalletId::new(), 1000.0, "education");
    let result = ValidationOrchestrator::default().validate(&tx, &[grant]);
    assert_eq!(result.status, TransactionStatus::Approved);
    assert!(result
        .explanation
        .contains("Category 'education' is allowed (permitted: education)"));
}

// ---------------------------------------------------------------------------
// 2. Spending limit
// ---------------------------------------------------------------------------

#[test]
fn spending_limit_blocks_oversized_payment() {
    let limit = create(
        PolicyDraft::new("Monthly Cap")
            .with_type(PolicyType::SpendingLimit)
            .with_rules(RuleBundle::default().with_max_amount(50000.0)),
    );
    let tx = Transaction::new(WalletId::new(), 60000.0, "rent");
    let result = ValidationOrchestrator::default().validate(&tx, &[limit]);
    assert_eq!(result.status, TransactionStatus::Blocked);
    let message = &result.violations[0].message;
    assert!(message.contains("60000"));
    assert!(message.contains("50000"));
    assert_eq!(result.violations[0].rule, ViolationKind::ExceedsMaxAmount);
}

// ---------------------------------------------------------------------------
// 3. Conflicts
// ---------------------------------------------------------------------------

#[test]
fn education_and_food_restrictions_conflict() {
    let education = create(
        PolicyDraft::new("Education Only")
            .with_rules(RuleBundle::default().with_categories(["education"])),
    );
    let food = create(
        PolicyDraft::new("Food Only").with_rules(RuleBundle::default().with_categories(["food"])),
    );
    let report = ConflictAnalyzer::new().detect_conflicts(&[education, food]);
    assert!(report.total_conflicts >= 1);
    assert!(report.has_critical_conflicts);
    let conflict = report
        .conflicts
        .iter()
        .find(|c| c.rule == ConflictRule::CategoryDisjoint)
        .unwrap();
    assert_eq!(conflict.severity, Severity::Critical);
}

// ---------------------------------------------------------------------------
// 4. Geo-fence
// ---------------------------------------------------------------------------

#[test]
fn geo_fence_without_location_is_blocked() {
    let fence = create(
        PolicyDraft::new("Maharashtra Relief")
            .with_type(PolicyType::GeoFence)
            .with_rules(RuleBundle::default().with_geo_fence(["MH"])),
    );
    let tx = Transaction::new(WalletId::new(), 200.0, "groceries");
    let result = ValidationOrchestrator::default().validate(&tx, &[fence]);
    assert_eq!(result.status, TransactionStatus::Blocked);
    assert!(result.violations[0].message.contains("location required"));
    assert!(result.explanation.contains("Move within a permitted region"));
}

// ---------------------------------------------------------------------------
// 5. Every violated policy is reported
// ---------------------------------------------------------------------------

#[test]
fn multiple_violations_are_all_reported() {
    let policies = vec![
        create(
            PolicyDraft::new("Edu")
                .with_priority(3)
                .with_rules(RuleBundle::default().with_categories(["education"])),
        ),
        create(
            PolicyDraft::new("Limit")
                .with_priority(1)
                .with_rules(RuleBundle::default().with_max_amount(100.0)),
        ),
        create(
            PolicyDraft::new("No Casino")
                .with_priority(2)
                .with_rules(RuleBundle::default().with_blacklist(["Casino"])),
        ),
    ];
    let tx = Transaction::new(WalletId::new(), 500.0, "leisure").with_merchant("Casino");
    let result = ValidationOrchestrator::default().validate(&tx, &policies);
    let names: Vec<_> = result
        .violations
        .iter()
        .map(|v| v.policy_name.as_str())
        .collect();
    assert_eq!(names, vec!["Limit", "No Casino", "Edu"]);
    assert!(result.explanation.contains("Policies Violated: 3"));
}

// ---------------------------------------------------------------------------
// 6. YAML drafts
// ---------------------------------------------------------------------------

#[test]
fn drafts_load_from_yaml() {
    let yaml = r#"
- name: Scholarship
  policy_type: category_restriction
  priority: 1
  rules:
    allowed_categories: [education, books]
    max_amount: 20000
- name: Local Vendors
  policy_type: merchant_control
  rules:
    merchant_whitelist: [Campus Store]
"#;
    let drafts: Vec<PolicyDraft> = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(drafts.len(), 2);
    let policies: Vec<Policy> = drafts.into_iter().map(create).collect();
    assert_eq!(policies[0].rules.max_amount, Some(20000.0));
    assert_eq!(policies[1].policy_type, PolicyType::MerchantControl);

    let tx = Transaction::new(WalletId::new(), 1500.0, "books").with_merchant("Campus Store");
    let result = ValidationOrchestrator::default().validate(&tx, &policies);
    assert_eq!(result.status, TransactionStatus::Approved);

    let description = ExplanationGenerator::new().describe_policy(&policies[1]);
    assert!(description.contains("Approved merchants: Campus Store"));
}
