//! # Evaluation Properties
//!
//! Property tests over randomly generated policy sets and transactions:
//! - Determinism of status, violations and evaluation order
//! - Priority ordering with stable ties
//! - Expired and inactive policies never evaluated
//! - At most one violation per policy
//! - Conflict detection independent of input order

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use intentforge_core::WalletId;
use intentforge_policy::{
    ConflictAnalyzer, Policy, PolicyDraft, PolicyType, RuleBundle, Transaction, TransactionStatus,
    ValidationOrchestrator,
};
use proptest::prelude::*;

const CATEGORIES: [&str; 5] = ["education", "food", "travel", "health", "books"];
const REGIONS: [&str; 4] = ["MH", "KA", "DL", "TN"];
const MERCHANTS: [&str; 4] = ["Campus Store", "Cafe", "Casino", "Pharmacy"];

fn fixed_now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-06-01T00:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn subset(pool: &'static [&'static str]) -> impl Strategy<Value = Vec<String>> {
    prop::sample::subsequence(pool.to_vec(), 0..=pool.len())
        .prop_map(|items| items.into_iter().map(String::from).collect())
}

fn rule_bundle() -> impl Strategy<Value = RuleBundle> {
    (
        subset(&CATEGORIES),
        prop::option::of(1u32..100_000),
        prop::option::of(1u32..100_000),
        subset(&REGIONS),
        subset(&MERCHANTS),
        subset(&MERCHANTS),
    )
        .prop_map(|(cats, max, cap, geo, white, black)| {
            let max_amount = max.map(f64::from);
            // Keep the cap within the maximum so the bundle passes the schema.
            let per_transaction_cap = match (cap.map(f64::from), max_amount) {
                (Some(c), Some(m)) => Some(c.min(m)),
                (c, _) => c,
            };
            RuleBundle {
                allowed_categories: cats,
                max_amount,
                per_transaction_cap,
                geo_fence: geo,
                merchant_whitelist: white,
                merchant_blacklist: black,
            }
        })
}

fn policy_type() -> impl Strategy<Value = PolicyType> {
    prop::sample::select(PolicyType::ALL.to_vec())
}

fn policy() -> impl Strategy<Value = Policy> {
    (
        rule_bundle(),
        0u32..20,
        any::<bool>(),
        prop::option::of(-48i64..48),
        policy_type(),
        "[A-Z][a-z]{2,10}",
    )
        .prop_map(|(rules, priority, is_active, expiry_hours, policy_type, name)| {
            let mut policy = Policy::from_draft(
                PolicyDraft::new(name)
                    .with_type(policy_type)
                    .with_rules(rules)
                    .with_priority(priority),
                fixed_now() - Duration::days(7),
            )
            .unwrap();
            policy.is_active = is_active;
            policy.expires_at = expiry_hours.map(|h| fixed_now() + Duration::hours(h));
            policy
        })
}

fn transaction() -> impl Strategy<Value = Transaction> {
    (
        1u32..150_000,
        prop::sample::select(CATEGORIES.to_vec()),
        prop::option::of(prop::sample::select(REGIONS.to_vec())),
        prop::option::of(prop::sample::select(MERCHANTS.to_vec())),
    )
        .prop_map(|(amount, category, location, merchant)| {
            let mut tx = Transaction::new(WalletId::new(), f64::from(amount), category);
            tx.location = location.map(String::from);
            tx.merchant = merchant.map(String::from);
            tx
        })
}

proptest! {
    #[test]
    fn validation_is_deterministic(
        policies in prop::collection::vec(policy(), 0..8),
        tx in transaction(),
    ) {
        let orchestrator = ValidationOrchestrator::default();
        let first = orchestrator.validate_at(&tx, &policies, fixed_now());
        let second = orchestrator.validate_at(&tx, &policies, fixed_now());
        prop_assert_eq!(first.status, second.status);
        prop_assert_eq!(&first.violations, &second.violations);
        prop_assert_eq!(&first.policies_evaluated, &second.policies_evaluated);
        prop_assert_eq!(&first.explanation, &second.explanation);
    }

    #[test]
    fn evaluation_order_is_stable_by_priority(
        policies in prop::collection::vec(policy(), 0..10),
        tx in transaction(),
    ) {
        let result = ValidationOrchestrator::default().validate_at(&tx, &policies, fixed_now());

        let mut expected: Vec<(u32, usize)> = policies
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_effective_at(fixed_now()))
            .map(|(i, p)| (p.priority, i))
            .collect();
        expected.sort();
        let expected_ids: Vec<_> = expected.iter().map(|(_, i)| policies[*i].id.clone()).collect();
        prop_assert_eq!(result.policies_evaluated, expected_ids);
    }

    #[test]
    fn non_effective_policies_are_never_evaluated(
        policies in prop::collection::vec(policy(), 0..8),
        tx in transaction(),
    ) {
        let result = ValidationOrchestrator::default().validate_at(&tx, &policies, fixed_now());
        for policy in &policies {
            if !policy.is_effective_at(fixed_now()) {
                prop_assert!(!result.policies_evaluated.contains(&policy.id));
                prop_assert!(result.violations.iter().all(|v| v.policy_id != policy.id));
            }
        }
    }

    #[test]
    fn at_most_one_violation_per_policy(
        policies in prop::collection::vec(policy(), 0..8),
        tx in transaction(),
    ) {
        let result = ValidationOrchestrator::default().validate_at(&tx, &policies, fixed_now());
        let distinct: BTreeSet<_> = result.violations.iter().map(|v| v.policy_id.clone()).collect();
        prop_assert_eq!(distinct.len(), result.violations.len());
        let expected = if result.violations.is_empty() {
            TransactionStatus::Approved
        } else {
            TransactionStatus::Blocked
        };
        prop_assert_eq!(result.status, expected);
        prop_assert!(!result.requires_clawback);
    }

    #[test]
    fn conflict_detection_ignores_input_order(
        policies in prop::collection::vec(policy(), 0..7),
    ) {
        let analyzer = ConflictAnalyzer::new();
        let forward = analyzer.detect_conflicts(&policies);
        let mut reversed = policies.clone();
        reversed.reverse();
        let backward = analyzer.detect_conflicts(&reversed);

        let key = |report: &intentforge_policy::ConflictReport| {
            report
                .conflicts
                .iter()
                .map(|c| {
                    let mut pair = [c.policy_a.id.clone(), c.policy_b.id.clone()];
                    pair.sort();
                    (c.rule, pair)
                })
                .collect::<Vec<_>>()
        };
        let mut f = key(&forward);
        let mut b = key(&backward);
        f.sort();
        b.sort();
        prop_assert_eq!(f, b);
        prop_assert_eq!(forward.has_critical_conflicts, backward.has_critical_conflicts);
        prop_assert_eq!(forward.by_severity, backward.by_severity);
    }
}

// ---------------------------------------------------------------------------
// Fixed cases
// ---------------------------------------------------------------------------

#[test]
fn priority_ties_keep_input_order() {
    let make = |name: &str, priority: u32| {
        Policy::from_draft(PolicyDraft::new(name).with_priority(priority), fixed_now()).unwrap()
    };
    let first = make("first", 5);
    let second = make("second", 5);
    let urgent = make("urgent", 1);
    let tx = Transaction::new(WalletId::new(), 10.0, "food");
    let result = ValidationOrchestrator::default().validate_at(
        &tx,
        &[first.clone(), second.clone(), urgent.clone()],
        fixed_now(),
    );
    assert_eq!(result.policies_evaluated, vec![urgent.id, first.id, second.id]);
}
