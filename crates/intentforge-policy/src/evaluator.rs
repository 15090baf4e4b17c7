//! # Rule Evaluator
//!
//! Checks one transaction against one policy. The checks run in a fixed
//! order and stop at the first failure, so each policy contributes at most
//! one [`Violation`]:
//!
//! 1. non-effective policy: skipped, no violation
//! 2. allowed categories
//! 3. maximum amount
//! 4. per-transaction cap
//! 5. geo-fence (missing location fails)
//! 6. merchant whitelist (missing merchant fails)
//! 7. merchant blacklist
//!
//! Evaluation is pure: no clock reads beyond the optional default instant,
//! no I/O, no shared state.

use chrono::{DateTime, Utc};
use intentforge_core::PolicyId;
use serde::{Deserialize, Serialize};

use crate::policy::Policy;
use crate::transaction::Transaction;

/// Which rule a violation broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// Category outside `allowed_categories`.
    CategoryNotAllowed,
    /// Amount above `max_amount`.
    ExceedsMaxAmount,
    /// Amount above `per_transaction_cap`.
    ExceedsPerTransactionCap,
    /// Geo-fence set but no location given.
    LocationRequired,
    /// Location outside the geo-fence.
    OutsideGeoFence,
    /// Whitelist set but no merchant given.
    MerchantRequired,
    /// Merchant not on the whitelist.
    MerchantNotWhitelisted,
    /// Merchant on the blacklist.
    MerchantBlacklisted,
}

impl ViolationKind {
    /// Return the wire name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CategoryNotAllowed => "category_not_allowed",
            Self::ExceedsMaxAmount => "exceeds_max_amount",
            Self::ExceedsPerTransactionCap => "exceeds_per_transaction_cap",
            Self::LocationRequired => "location_required",
            Self::OutsideGeoFence => "outside_geo_fence",
            Self::MerchantRequired => "merchant_required",
            Self::MerchantNotWhitelisted => "merchant_not_whitelisted",
            Self::MerchantBlacklisted => "merchant_blacklisted",
        }
    }

    /// What the payer can do about it.
    pub fn remediation(&self) -> &'static str {
        match self {
            Self::CategoryNotAllowed => "Try a different category permitted by this policy.",
            Self::ExceedsMaxAmount => "Reduce the amount to stay within the spending limit.",
            Self::ExceedsPerTransactionCap => {
                "Reduce the amount or split the payment into smaller transactions."
            }
            Self::LocationRequired | Self::OutsideGeoFence => {
                "Move within a permitted region and provide the transaction location."
            }
            Self::MerchantRequired | Self::MerchantNotWhitelisted | Self::MerchantBlacklisted => {
                "Use an approved merchant for this payment."
            }
        }
    }
}

impl std::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single rule failure attributable to one policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// The violated policy.
    pub policy_id: PolicyId,
    /// Its name at evaluation time.
    pub policy_name: String,
    /// The rule broken.
    pub rule: ViolationKind,
    /// Human-readable description naming the policy, the rule, the offending
    /// value and the permitted set or limit.
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Evaluate `tx` against `policy` at the current instant.
pub fn evaluate(tx: &Transaction, policy: &Policy) -> Option<Violation> {
    evaluate_at(tx, policy, Utc::now())
}

/// Evaluate `tx` against `policy` as of `now`.
pub fn evaluate_at(tx: &Transaction, policy: &Policy, now: DateTime<Utc>) -> Option<Violation> {
    if !policy.is_effective_at(now) {
        return None;
    }
    let rules = &policy.rules;
    let violation = |rule: ViolationKind, detail: String| {
        Some(Violation {
            policy_id: policy.id.clone(),
            policy_name: policy.name.clone(),
            rule,
            message: format!("Policy '{}': {detail}", policy.name),
        })
    };

    if !rules.allowed_categories.is_empty() && !contains(&rules.allowed_categories, &tx.category) {
        return violation(
            ViolationKind::CategoryNotAllowed,
            format!(
                "Category '{}' not in allowed list {}",
                tx.category,
                bracketed(&rules.allowed_categories)
            ),
        );
    }

    if let Some(max) = rules.max_amount {
        if tx.amount > max {
            return violation(
                ViolationKind::ExceedsMaxAmount,
                format!("Amount {} exceeds maximum limit {max}", tx.amount),
            );
        }
    }

    if let Some(cap) = rules.per_transaction_cap {
        if tx.amount > cap {
            return violation(
                ViolationKind::ExceedsPerTransactionCap,
                format!(
                    "Transaction amount {} exceeds per-transaction cap {cap}",
                    tx.amount
                ),
            );
        }
    }

    if !rules.geo_fence.is_empty() {
        match tx.location() {
            None => {
                return violation(
                    ViolationKind::LocationRequired,
                    format!(
                        "Transaction location required but not provided. Allowed regions: {}",
                        bracketed(&rules.geo_fence)
                    ),
                );
            }
            Some(location) if !contains(&rules.geo_fence, location) => {
                return violation(
                    ViolationKind::OutsideGeoFence,
                    format!(
                        "Location '{location}' not in allowed geo-fence {}",
                        bracketed(&rules.geo_fence)
                    ),
                );
            }
            Some(_) => {}
        }
    }

    if !rules.merchant_whitelist.is_empty() {
        match tx.merchant() {
            None => {
                return violation(
                    ViolationKind::MerchantRequired,
                    format!(
                        "Merchant information required. Allowed merchants: {}",
                        bracketed(&rules.merchant_whitelist)
                    ),
                );
            }
            Some(merchant) if !contains(&rules.merchant_whitelist, merchant) => {
                return violation(
                    ViolationKind::MerchantNotWhitelisted,
                    format!(
                        "Merchant '{merchant}' not in whitelist {}",
                        bracketed(&rules.merchant_whitelist)
                    ),
                );
            }
            Some(_) => {}
        }
    }

    if let Some(merchant) = tx.merchant() {
        if contains(&rules.merchant_blacklist, merchant) {
            return violation(
                ViolationKind::MerchantBlacklisted,
                format!("Merchant '{merchant}' is blacklisted"),
            );
        }
    }

    None
}

fn contains(list: &[String], value: &str) -> bool {
    list.iter().any(|item| item == value)
}

/// Render a list as `[a, b, c]`.
pub(crate) fn bracketed(items: &[String]) -> String {
    format!("[{}]", items.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{PolicyDraft, RuleBundle};
    use chrono::Duration;
    use intentforge_core::WalletId;

    fn policy(name: &str, rules: RuleBundle) -> Policy {
        Policy::from_draft(PolicyDraft::new(name).with_rules(rules), Utc::now()).unwrap()
    }

    fn tx(amount: f64, category: &str) -> Transaction {
        Transaction::new(WalletId::new(), amount, category)
    }

    #[test]
    fn category_outside_allowed_list() {
        let p = policy(
            "Education Only",
            RuleBundle::default().with_categories(["education", "books"]),
        );
        let v = evaluate(&tx(100.0, "entertainment"), &p).unwrap();
        assert_eq!(v.rule, ViolationKind::CategoryNotAllowed);
        assert_eq!(
            v.message,
            "Policy 'Education Only': Category 'entertainment' not in allowed list [education, books]"
        );
        assert_eq!(v.policy_id, p.id);
        assert!(evaluate(&tx(100.0, "books"), &p).is_none());
    }

    #[test]
    fn amount_over_max() {
        let p = policy("Monthly Limit", RuleBundle::default().with_max_amount(50000.0));
        let v = evaluate(&tx(60000.0, "rent"), &p).unwrap();
        assert_eq!(v.rule, ViolationKind::ExceedsMaxAmount);
        assert_eq!(
            v.message,
            "Policy 'Monthly Limit': Amount 60000 exceeds maximum limit 50000"
        );
        assert!(evaluate(&tx(50000.0, "rent"), &p).is_none());
    }

    #[test]
    fn fractional_amounts_are_not_rounded() {
        let p = policy("Cap", RuleBundle::default().with_per_transaction_cap(99.99));
        let v = evaluate(&tx(100.25, "food"), &p).unwrap();
        assert_eq!(
            v.message,
            "Policy 'Cap': Transaction amount 100.25 exceeds per-transaction cap 99.99"
        );
    }

    #[test]
    fn category_checked_before_amount() {
        let p = policy(
            "Both",
            RuleBundle::default()
                .with_categories(["education"])
                .with_max_amount(100.0),
        );
        let v = evaluate(&tx(500.0, "travel"), &p).unwrap();
        assert_eq!(v.rule, ViolationKind::CategoryNotAllowed);
    }

    #[test]
    fn geo_fence_requires_location() {
        let p = policy("Local", RuleBundle::default().with_geo_fence(["MH", "KA"]));
        let v = evaluate(&tx(10.0, "food"), &p).unwrap();
        assert_eq!(v.rule, ViolationKind::LocationRequired);
        assert!(v.message.contains("location required"));
        assert!(v.message.ends_with("Allowed regions: [MH, KA]"));

        let v = evaluate(&tx(10.0, "food").with_location("DL"), &p).unwrap();
        assert_eq!(v.rule, ViolationKind::OutsideGeoFence);
        assert_eq!(
            v.message,
            "Policy 'Local': Location 'DL' not in allowed geo-fence [MH, KA]"
        );

        assert!(evaluate(&tx(10.0, "food").with_location("KA"), &p).is_none());
    }

    #[test]
    fn blank_location_counts_as_missing() {
        let p = policy("Local", RuleBundle::default().with_geo_fence(["MH"]));
        let v = evaluate(&tx(10.0, "food").with_location("  "), &p).unwrap();
        assert_eq!(v.rule, ViolationKind::LocationRequired);
    }

    #[test]
    fn whitelist_requires_merchant() {
        let p = policy(
            "Approved Vendors",
            RuleBundle::default().with_whitelist(["Campus Store"]),
        );
        let v = evaluate(&tx(10.0, "books"), &p).unwrap();
        assert_eq!(v.rule, ViolationKind::MerchantRequired);
        assert_eq!(
            v.message,
            "Policy 'Approved Vendors': Merchant information required. Allowed merchants: [Campus Store]"
        );

        let v = evaluate(&tx(10.0, "books").with_merchant("Mall"), &p).unwrap();
        assert_eq!(v.rule, ViolationKind::MerchantNotWhitelisted);
        assert_eq!(
            v.message,
            "Policy 'Approved Vendors': Merchant 'Mall' not in whitelist [Campus Store]"
        );
    }

    #[test]
    fn blacklisted_merchant() {
        let p = policy("No Casinos", RuleBundle::default().with_blacklist(["Casino Royale"]));
        let v = evaluate(&tx(10.0, "leisure").with_merchant("Casino Royale"), &p).unwrap();
        assert_eq!(v.rule, ViolationKind::MerchantBlacklisted);
        assert_eq!(v.message, "Policy 'No Casinos': Merchant 'Casino Royale' is blacklisted");
        assert!(evaluate(&tx(10.0, "leisure"), &p).is_none());
    }

    #[test]
    fn inactive_or_expired_policy_is_skipped() {
        let mut p = policy("Strict", RuleBundle::default().with_categories(["none"]));
        p.is_active = false;
        assert!(evaluate(&tx(10.0, "food"), &p).is_none());

        p.is_active = true;
        let now = Utc::now();
        p.expires_at = Some(now - Duration::seconds(1));
        assert!(evaluate_at(&tx(10.0, "food"), &p, now).is_none());
        assert!(evaluate_at(&tx(10.0, "food"), &p, now - Duration::hours(1)).is_some());
    }

    #[test]
    fn empty_bundle_never_fails() {
        let p = policy("Permissive", RuleBundle::default());
        assert!(evaluate(&tx(1e12, "anything").with_merchant("x"), &p).is_none());
    }

    #[test]
    fn every_kind_has_a_remediation() {
        let kinds = [
            ViolationKind::CategoryNotAllowed,
            ViolationKind::ExceedsMaxAmount,
            ViolationKind::ExceedsPerTransactionCap,
            ViolationKind::LocationRequired,
            ViolationKind::OutsideGeoFence,
            ViolationKind::MerchantRequired,
            ViolationKind::MerchantNotWhitelisted,
            ViolationKind::MerchantBlacklisted,
        ];
        for kind in kinds {
            assert!(!kind.remediation().is_empty());
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }
}
