//! # Conflict Analyzer
//!
//! Pairwise analysis of active policies for contradictory or suspicious
//! combinations. Each rule carries its own [`Severity`]; a pair may trigger
//! several rules. Every unordered pair is visited exactly once and
//! directional rules are checked both ways, so the detected set does not
//! depend on input order.
//!
//! Expiry is ignored for membership: a policy that is active but already
//! expired still takes part in analysis.

use std::collections::BTreeSet;

use chrono::Duration;
use intentforge_core::PolicyId;
use serde::{Deserialize, Serialize};

use crate::evaluator::bracketed;
use crate::policy::{Policy, PolicyType};

/// Fraction of the larger `max_amount` below which the smaller is suspicious.
pub const DISPROPORTION_RATIO: f64 = 0.1;

/// Window within which two expiries count as near-simultaneous (inclusive).
pub const EXPIRY_PROXIMITY_HOURS: i64 = 24;

/// How serious a conflict is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// Worth a look.
    Low,
    /// Probably unintended.
    Medium,
    /// Some transactions will be blocked unexpectedly.
    High,
    /// No transaction can satisfy both policies.
    Critical,
}

impl Severity {
    /// Return the wire name of this severity.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The conflict rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictRule {
    /// Two category restrictions with no category in common.
    CategoryDisjoint,
    /// One `max_amount` under 10% of the other.
    AmountDisproportion,
    /// One policy's cap above the other's `max_amount`.
    CapExceedsLimit,
    /// Two geo-fences with no region in common.
    GeoFenceDisjoint,
    /// A merchant whitelisted by one policy and blacklisted by the other.
    WhitelistBlacklistOverlap,
    /// Two different expiries within 24 hours of each other.
    NearSimultaneousExpiry,
}

impl ConflictRule {
    /// The severity this rule assigns.
    pub fn severity(&self) -> Severity {
        match self {
            Self::CategoryDisjoint => Severity::Critical,
            Self::AmountDisproportion => Severity::Medium,
            Self::CapExceedsLimit => Severity::High,
            Self::GeoFenceDisjoint => Severity::Critical,
            Self::WhitelistBlacklistOverlap => Severity::Critical,
            Self::NearSimultaneousExpiry => Severity::Low,
        }
    }

    /// Return the wire name of this rule.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CategoryDisjoint => "category_disjoint",
            Self::AmountDisproportion => "amount_disproportion",
            Self::CapExceedsLimit => "cap_exceeds_limit",
            Self::GeoFenceDisjoint => "geo_fence_disjoint",
            Self::WhitelistBlacklistOverlap => "whitelist_blacklist_overlap",
            Self::NearSimultaneousExpiry => "near_simultaneous_expiry",
        }
    }
}

impl std::fmt::Display for ConflictRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a policy inside a conflict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRef {
    /// Policy id.
    pub id: PolicyId,
    /// Policy name.
    pub name: String,
}

impl From<&Policy> for PolicyRef {
    fn from(policy: &Policy) -> Self {
        Self {
            id: policy.id.clone(),
            name: policy.name.clone(),
        }
    }
}

/// One detected conflict between two policies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    /// First policy of the pair.
    pub policy_a: PolicyRef,
    /// Second policy of the pair.
    pub policy_b: PolicyRef,
    /// The rule that fired.
    pub rule: ConflictRule,
    /// Severity of `rule`.
    pub severity: Severity,
    /// Human-readable description.
    pub description: String,
}

impl Conflict {
    fn new(a: &Policy, b: &Policy, rule: ConflictRule, description: String) -> Self {
        Self {
            policy_a: a.into(),
            policy_b: b.into(),
            rule,
            severity: rule.severity(),
            description,
        }
    }

    /// Whether this conflict involves the given policy.
    pub fn involves(&self, id: &PolicyId) -> bool {
        &self.policy_a.id == id || &self.policy_b.id == id
    }
}

/// Number of conflicts per severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    /// CRITICAL conflicts.
    pub critical: usize,
    /// HIGH conflicts.
    pub high: usize,
    /// MEDIUM conflicts.
    pub medium: usize,
    /// LOW conflicts.
    pub low: usize,
}

impl SeverityCounts {
    fn tally(conflicts: &[Conflict]) -> Self {
        let mut counts = Self::default();
        for conflict in conflicts {
            match conflict.severity {
                Severity::Critical => counts.critical += 1,
                Severity::High => counts.high += 1,
                Severity::Medium => counts.medium += 1,
                Severity::Low => counts.low += 1,
            }
        }
        counts
    }
}

/// Outcome of a conflict analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictReport {
    /// `conflicts.len()`.
    pub total_conflicts: usize,
    /// Every detected conflict.
    pub conflicts: Vec<Conflict>,
    /// Whether any conflict is CRITICAL.
    pub has_critical_conflicts: bool,
    /// Number of active policies analysed.
    pub policies_analyzed: usize,
    /// Conflicts per severity.
    pub by_severity: SeverityCounts,
}

impl ConflictReport {
    fn new(conflicts: Vec<Conflict>, policies_analyzed: usize) -> Self {
        Self {
            total_conflicts: conflicts.len(),
            has_critical_conflicts: conflicts.iter().any(|c| c.severity == Severity::Critical),
            by_severity: SeverityCounts::tally(&conflicts),
            conflicts,
            policies_analyzed,
        }
    }

    /// The most severe conflict level, if any.
    pub fn max_severity(&self) -> Option<Severity> {
        self.conflicts.iter().map(|c| c.severity).max()
    }
}

/// Pairwise policy conflict detection.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictAnalyzer;

impl ConflictAnalyzer {
    /// Create an analyzer.
    pub fn new() -> Self {
        Self
    }

    /// Analyse every unordered pair of active policies.
    pub fn detect_conflicts(&self, policies: &[Policy]) -> ConflictReport {
        self.analyze(policies)
    }

    /// [`ConflictAnalyzer::detect_conflicts`] over borrowed policies.
    pub fn analyze<'a, I>(&self, policies: I) -> ConflictReport
    where
        I: IntoIterator<Item = &'a Policy>,
    {
        let active: Vec<&Policy> = policies.into_iter().filter(|p| p.is_active).collect();
        let mut conflicts = Vec::new();
        for (i, a) in active.iter().enumerate() {
            for b in &active[i + 1..] {
                conflicts.extend(self.check_pair(a, b));
            }
        }
        tracing::debug!(
            policies = active.len(),
            conflicts = conflicts.len(),
            "conflict analysis complete"
        );
        ConflictReport::new(conflicts, active.len())
    }

    /// Conflicts a candidate policy would introduce against `existing`.
    ///
    /// Empty when the candidate is inactive. Inactive existing policies and
    /// any existing entry with the candidate's id are ignored.
    pub fn conflicts_with<'a, I>(&self, candidate: &Policy, existing: I) -> Vec<Conflict>
    where
        I: IntoIterator<Item = &'a Policy>,
    {
        if !candidate.is_active {
            return Vec::new();
        }
        existing
            .into_iter()
            .filter(|p| p.is_active && p.id != candidate.id)
            .flat_map(|p| self.check_pair(p, candidate))
            .collect()
    }

    /// Every rule that fires for the pair `(a, b)`.
    pub fn check_pair(&self, a: &Policy, b: &Policy) -> Vec<Conflict> {
        let mut found = Vec::new();
        let (ra, rb) = (&a.rules, &b.rules);

        if a.policy_type == PolicyType::CategoryRestriction
            && b.policy_type == PolicyType::CategoryRestriction
            && disjoint(&ra.allowed_categories, &rb.allowed_categories)
        {
            found.push(Conflict::new(
                a,
                b,
                ConflictRule::CategoryDisjoint,
                format!(
                    "Policies '{}' and '{}' allow disjoint categories {} and {}; no transaction can satisfy both",
                    a.name,
                    b.name,
                    bracketed(&ra.allowed_categories),
                    bracketed(&rb.allowed_categories)
                ),
            ));
        }

        if let (Some(max_a), Some(max_b)) = (ra.max_amount, rb.max_amount) {
            let (small, small_max, large, large_max) = if max_a <= max_b {
                (a, max_a, b, max_b)
            } else {
                (b, max_b, a, max_a)
            };
            if small_max < large_max * DISPROPORTION_RATIO {
                found.push(Conflict::new(
                    a,
                    b,
                    ConflictRule::AmountDisproportion,
                    format!(
                        "Policy '{}' max_amount {small_max} is less than 10% of policy '{}' max_amount {large_max}",
                        small.name, large.name
                    ),
                ));
            }
        }

        for (capped, limited) in [(a, b), (b, a)] {
            if let (Some(cap), Some(max)) = (
                capped.rules.per_transaction_cap,
                limited.rules.max_amount,
            ) {
                if cap > max {
                    found.push(Conflict::new(
                        a,
                        b,
                        ConflictRule::CapExceedsLimit,
                        format!(
                            "Policy '{}' per_transaction_cap {cap} exceeds policy '{}' max_amount {max}",
                            capped.name, limited.name
                        ),
                    ));
                }
            }
        }

        if disjoint(&ra.geo_fence, &rb.geo_fence) {
            found.push(Conflict::new(
                a,
                b,
                ConflictRule::GeoFenceDisjoint,
                format!(
                    "Policies '{}' and '{}' have non-overlapping geo-fences {} and {}; no location can satisfy both",
                    a.name,
                    b.name,
                    bracketed(&ra.geo_fence),
                    bracketed(&rb.geo_fence)
                ),
            ));
        }

        for (allowing, denying) in [(a, b), (b, a)] {
            let overlap = intersection(
                &allowing.rules.merchant_whitelist,
                &denying.rules.merchant_blacklist,
            );
            if !overlap.is_empty() {
                found.push(Conflict::new(
                    a,
                    b,
                    ConflictRule::WhitelistBlacklistOverlap,
                    format!(
                        "Merchants {} are whitelisted by policy '{}' but blacklisted by policy '{}'",
                        bracketed(&overlap),
                        allowing.name,
                        denying.name
                    ),
                ));
            }
        }

        if let (Some(ea), Some(eb)) = (a.expires_at, b.expires_at) {
            let gap = if ea > eb { ea - eb } else { eb - ea };
            if ea != eb && gap <= Duration::hours(EXPIRY_PROXIMITY_HOURS) {
                found.push(Conflict::new(
                    a,
                    b,
                    ConflictRule::NearSimultaneousExpiry,
                    format!(
                        "Policies '{}' and '{}' expire within 24 hours of each other ({} and {})",
                        a.name,
                        b.name,
                        ea.to_rfc3339(),
                        eb.to_rfc3339()
                    ),
                ));
            }
        }

        found
    }
}

/// Both lists non-empty and sharing no element.
fn disjoint(a: &[String], b: &[String]) -> bool {
    !a.is_empty() && !b.is_empty() && intersection(a, b).is_empty()
}

/// Sorted, de-duplicated common elements.
fn intersection(a: &[String], b: &[String]) -> Vec<String> {
    let left: BTreeSet<&String> = a.iter().collect();
    b.iter()
        .filter(|item| left.contains(item))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{PolicyDraft, RuleBundle};
    use chrono::{DateTime, Utc};

    fn policy(name: &str, policy_type: PolicyType, rules: RuleBundle) -> Policy {
        Policy::from_draft(
            PolicyDraft::new(name).with_type(policy_type).with_rules(rules),
            Utc::now(),
        )
        .unwrap()
    }

    fn category(name: &str, categories: &[&str]) -> Policy {
        policy(
            name,
            PolicyType::CategoryRestriction,
            RuleBundle::default().with_categories(categories.iter().copied()),
        )
    }

    fn limit(name: &str, max: f64) -> Policy {
        policy(
            name,
            PolicyType::SpendingLimit,
            RuleBundle::default().with_max_amount(max),
        )
    }

    fn rules_of(report: &ConflictReport) -> Vec<ConflictRule> {
        report.conflicts.iter().map(|c| c.rule).collect()
    }

    #[test]
    fn disjoint_categories_are_critical() {
        let report = ConflictAnalyzer::new().detect_conflicts(&[
            category("Education", &["education"]),
            category("Food", &["food"]),
        ]);
        assert_eq!(report.total_conflicts, 1);
        assert!(report.has_critical_conflicts);
        assert_eq!(report.conflicts[0].rule, ConflictRule::CategoryDisjoint);
        assert_eq!(report.conflicts[0].severity, Severity::Critical);
        assert_eq!(report.by_severity.critical, 1);
        assert_eq!(report.policies_analyzed, 2);
    }

    #[test]
    fn overlapping_categories_do_not_conflict() {
        let report = ConflictAnalyzer::new().detect_conflicts(&[
            category("A", &["education", "books"]),
            category("B", &["books"]),
        ]);
        assert_eq!(report.total_conflicts, 0);
        assert!(!report.has_critical_conflicts);
        assert_eq!(report.max_severity(), None);
    }

    #[test]
    fn category_rule_needs_both_category_restrictions() {
        let mixed = policy(
            "Mixed",
            PolicyType::Composite,
            RuleBundle::default().with_categories(["food"]),
        );
        let report =
            ConflictAnalyzer::new().detect_conflicts(&[category("Edu", &["education"]), mixed]);
        assert!(!rules_of(&report).contains(&ConflictRule::CategoryDisjoint));
    }

    #[test]
    fn disproportionate_limits_are_medium() {
        let report =
            ConflictAnalyzer::new().detect_conflicts(&[limit("Big", 100000.0), limit("Tiny", 5000.0)]);
        assert_eq!(rules_of(&report), vec![ConflictRule::AmountDisproportion]);
        assert_eq!(report.conflicts[0].severity, Severity::Medium);
        assert!(report.conflicts[0].description.contains("'Tiny'"));

        let exactly_ten_percent =
            ConflictAnalyzer::new().detect_conflicts(&[limit("Big", 100000.0), limit("Ten", 10000.0)]);
        assert_eq!(exactly_ten_percent.total_conflicts, 0);
    }

    #[test]
    fn cap_above_other_limit_is_high_in_either_direction() {
        let capped = policy(
            "Cap",
            PolicyType::AmountLimit,
            RuleBundle::default().with_per_transaction_cap(8000.0),
        );
        let limited = limit("Limit", 5000.0);
        for pair in [
            vec![capped.clone(), limited.clone()],
            vec![limited.clone(), capped.clone()],
        ] {
            let report = ConflictAnalyzer::new().detect_conflicts(&pair);
            assert_eq!(rules_of(&report), vec![ConflictRule::CapExceedsLimit]);
            assert_eq!(report.conflicts[0].severity, Severity::High);
            assert_eq!(report.by_severity.high, 1);
        }
    }

    #[test]
    fn disjoint_geo_fences_are_critical() {
        let a = policy("North", PolicyType::GeoFence, RuleBundle::default().with_geo_fence(["DL"]));
        let b = policy("South", PolicyType::GeoFence, RuleBundle::default().with_geo_fence(["KA"]));
        let report = ConflictAnalyzer::new().detect_conflicts(&[a, b]);
        assert_eq!(rules_of(&report), vec![ConflictRule::GeoFenceDisjoint]);
        assert!(report.has_critical_conflicts);
    }

    #[test]
    fn whitelist_blacklist_overlap_is_critical() {
        let allow = policy(
            "Allow",
            PolicyType::MerchantControl,
            RuleBundle::default().with_whitelist(["Shop", "Cafe"]),
        );
        let deny = policy(
            "Deny",
            PolicyType::MerchantControl,
            RuleBundle::default().with_blacklist(["Cafe"]),
        );
        let report = ConflictAnalyzer::new().detect_conflicts(&[deny, allow]);
        assert_eq!(rules_of(&report), vec![ConflictRule::WhitelistBlacklistOverlap]);
        assert_eq!(
            report.conflicts[0].description,
            "Merchants [Cafe] are whitelisted by policy 'Allow' but blacklisted by policy 'Deny'"
        );
    }

    #[test]
    fn near_simultaneous_expiry_is_low_and_inclusive() {
        let base: DateTime<Utc> = Utc::now() + Duration::days(10);
        let mut a = limit("A", 1000.0);
        let mut b = limit("B", 2000.0);
        a.expires_at = Some(base);
        b.expires_at = Some(base + Duration::hours(24));
        let report = ConflictAnalyzer::new().detect_conflicts(&[a.clone(), b.clone()]);
        assert_eq!(rules_of(&report), vec![ConflictRule::NearSimultaneousExpiry]);
        assert_eq!(report.conflicts[0].severity, Severity::Low);

        b.expires_at = Some(base + Duration::hours(25));
        assert_eq!(
            ConflictAnalyzer::new().detect_conflicts(&[a.clone(), b.clone()]).total_conflicts,
            0
        );

        b.expires_at = Some(base);
        assert_eq!(ConflictAnalyzer::new().detect_conflicts(&[a, b]).total_conflicts, 0);
    }

    #[test]
    fn inactive_policies_are_ignored() {
        let mut food = category("Food", &["food"]);
        food.is_active = false;
        let report = ConflictAnalyzer::new().detect_conflicts(&[category("Edu", &["education"]), food]);
        assert_eq!(report.total_conflicts, 0);
        assert_eq!(report.policies_analyzed, 1);
    }

    #[test]
    fn a_pair_can_trigger_several_rules() {
        let a = policy(
            "A",
            PolicyType::CategoryRestriction,
            RuleBundle::default()
                .with_categories(["education"])
                .with_geo_fence(["MH"]),
        );
        let b = policy(
            "B",
            PolicyType::CategoryRestriction,
            RuleBundle::default()
                .with_categories(["food"])
                .with_geo_fence(["KA"]),
        );
        let report = ConflictAnalyzer::new().detect_conflicts(&[a, b]);
        assert_eq!(
            rules_of(&report),
            vec![ConflictRule::CategoryDisjoint, ConflictRule::GeoFenceDisjoint]
        );
        assert_eq!(report.by_severity.critical, 2);
    }

    #[test]
    fn conflicts_with_checks_candidate_against_existing() {
        let existing = vec![category("Edu", &["education"]), limit("Limit", 1000.0)];
        let candidate = category("Food", &["food"]);
        let found = ConflictAnalyzer::new().conflicts_with(&candidate, &existing);
        assert_eq!(found.len(), 1);
        assert!(found[0].involves(&candidate.id));
        assert!(found[0].involves(&existing[0].id));

        let mut inactive = candidate.clone();
        inactive.is_active = false;
        assert!(ConflictAnalyzer::new().conflicts_with(&inactive, &existing).is_empty());
    }

    #[test]
    fn severity_ordering_and_names() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
        assert_eq!(serde_json::to_string(&Severity::Critical).unwrap(), "\"CRITICAL\"");
        assert_eq!(
            serde_json::to_string(&ConflictRule::CapExceedsLimit).unwrap(),
            "\"cap_exceeds_limit\""
        );
    }
}
