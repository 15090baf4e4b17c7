//! # Policy Model
//!
//! A [`Policy`] is a named, prioritised [`RuleBundle`] that governs how money
//! in the wallets it is attached to may be spent. The bundle is one typed
//! structure consumed uniformly by the evaluator, the conflict analyzer and
//! the explanation generator; no rule is ever looked up by string key.
//!
//! Expiry lives on the policy only (`expires_at`). Policies never expire
//! eagerly: effectiveness is computed at read time against a caller-supplied
//! instant.

use chrono::{DateTime, Utc};
use intentforge_core::{PolicyId, ValidationError, WalletId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Highest accepted priority value. Lower values are evaluated first.
pub const MAX_PRIORITY: u32 = 1000;

/// Longest accepted policy name, in characters.
pub const MAX_NAME_LEN: usize = 200;

// ---------------------------------------------------------------------------
// PolicyType
// ---------------------------------------------------------------------------

/// The closed set of policy kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyType {
    /// Restricts spending to a set of categories.
    #[default]
    CategoryRestriction,
    /// Caps the amount that may be spent.
    SpendingLimit,
    /// Caps individual transaction amounts.
    AmountLimit,
    /// Restricts spending to regions.
    GeoRestriction,
    /// Allow-list of region codes.
    GeoFence,
    /// Merchant allow/deny lists.
    MerchantControl,
    /// Time-bounded spending window.
    TimeConstraint,
    /// Mixture of the above.
    Composite,
}

impl PolicyType {
    /// Every policy type, in declaration order.
    pub const ALL: [PolicyType; 8] = [
        Self::CategoryRestriction,
        Self::SpendingLimit,
        Self::AmountLimit,
        Self::GeoRestriction,
        Self::GeoFence,
        Self::MerchantControl,
        Self::TimeConstraint,
        Self::Composite,
    ];

    /// Return the wire name of this policy type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CategoryRestriction => "category_restriction",
            Self::SpendingLimit => "spending_limit",
            Self::AmountLimit => "amount_limit",
            Self::GeoRestriction => "geo_restriction",
            Self::GeoFence => "geo_fence",
            Self::MerchantControl => "merchant_control",
            Self::TimeConstraint => "time_constraint",
            Self::Composite => "composite",
        }
    }

    /// Title-cased label for human-readable output.
    pub fn label(&self) -> &'static str {
        match self {
            Self::CategoryRestriction => "Category Restriction",
            Self::SpendingLimit => "Spending Limit",
            Self::AmountLimit => "Amount Limit",
            Self::GeoRestriction => "Geo Restriction",
            Self::GeoFence => "Geo Fence",
            Self::MerchantControl => "Merchant Control",
            Self::TimeConstraint => "Time Constraint",
            Self::Composite => "Composite",
        }
    }
}

impl std::fmt::Display for PolicyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A string did not name a known policy type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown policy type: \"{0}\"")]
pub struct UnknownPolicyType(pub String);

impl std::str::FromStr for PolicyType {
    type Err = UnknownPolicyType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownPolicyType(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// RuleBundle
// ---------------------------------------------------------------------------

/// The constraints a policy enforces. An empty list or `None` means the
/// corresponding rule is not specified.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleBundle {
    /// Categories a transaction must belong to.
    pub allowed_categories: Vec<String>,
    /// Amount ceiling for a single transaction under the spending limit.
    pub max_amount: Option<f64>,
    /// Per-transaction ceiling.
    pub per_transaction_cap: Option<f64>,
    /// Region codes a transaction location must belong to.
    pub geo_fence: Vec<String>,
    /// Merchants a transaction must be made with.
    pub merchant_whitelist: Vec<String>,
    /// Merchants a transaction must not be made with.
    pub merchant_blacklist: Vec<String>,
}

impl RuleBundle {
    /// Set the allowed categories.
    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_categories = categories.into_iter().map(Into::into).collect();
        self
    }

    /// Set the maximum amount.
    pub fn with_max_amount(mut self, max_amount: f64) -> Self {
        self.max_amount = Some(max_amount);
        self
    }

    /// Set the per-transaction cap.
    pub fn with_per_transaction_cap(mut self, cap: f64) -> Self {
        self.per_transaction_cap = Some(cap);
        self
    }

    /// Set the geo-fence.
    pub fn with_geo_fence<I, S>(mut self, regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.geo_fence = regions.into_iter().map(Into::into).collect();
        self
    }

    /// Set the merchant whitelist.
    pub fn with_whitelist<I, S>(mut self, merchants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.merchant_whitelist = merchants.into_iter().map(Into::into).collect();
        self
    }

    /// Set the merchant blacklist.
    pub fn with_blacklist<I, S>(mut self, merchants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.merchant_blacklist = merchants.into_iter().map(Into::into).collect();
        self
    }

    /// Whether no rule at all is specified.
    pub fn is_empty(&self) -> bool {
        self.allowed_categories.is_empty()
            && self.max_amount.is_none()
            && self.per_transaction_cap.is_none()
            && self.geo_fence.is_empty()
            && self.merchant_whitelist.is_empty()
            && self.merchant_blacklist.is_empty()
    }

    /// Check amount constraints, appending one message per violation.
    fn collect_errors(&self, errors: &mut Vec<String>) {
        if let Some(max) = self.max_amount {
            if !max.is_finite() || max <= 0.0 {
                errors.push("max_amount must be positive".to_string());
            }
        }
        if let Some(cap) = self.per_transaction_cap {
            if !cap.is_finite() || cap < 0.0 {
                errors.push("per_transaction_cap must not be negative".to_string());
            }
        }
        if let (Some(cap), Some(max)) = (self.per_transaction_cap, self.max_amount) {
            if cap > max {
                errors.push("per_transaction_cap cannot exceed max_amount".to_string());
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// A programmable-money policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    /// Unique identifier.
    pub id: PolicyId,
    /// Human-readable name, embedded in every violation message.
    pub name: String,
    /// Kind of policy.
    pub policy_type: PolicyType,
    /// The constraints enforced.
    pub rules: RuleBundle,
    /// Optional free-text description.
    pub description: Option<String>,
    /// Evaluation priority; lower values are evaluated first.
    pub priority: u32,
    /// Inactive policies are never evaluated nor analysed for conflicts.
    pub is_active: bool,
    /// Instant after which the policy stops being effective.
    pub expires_at: Option<DateTime<Utc>>,
    /// Wallets this policy is attached to.
    pub attached_wallets: Vec<WalletId>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl Policy {
    /// Materialise a draft into a new, schema-checked policy.
    ///
    /// A `rules.expiry` in the draft is folded into `expires_at`; a draft
    /// carrying both with different values is a schema error.
    pub fn from_draft(draft: PolicyDraft, now: DateTime<Utc>) -> Result<Self, ValidationError> {
        let mut errors = Vec::new();
        let expires_at = match (draft.expires_at, draft.rules.expiry) {
            (Some(policy_level), Some(rule_level)) if policy_level != rule_level => {
                errors.push("rules.expiry conflicts with expires_at".to_string());
                Some(policy_level)
            }
            (policy_level, rule_level) => policy_level.or(rule_level),
        };
        let policy = Self {
            id: PolicyId::new(),
            name: draft.name.trim().to_string(),
            policy_type: draft.policy_type,
            rules: draft.rules.bundle,
            description: draft.description,
            priority: draft.priority,
            is_active: draft.is_active,
            expires_at,
            attached_wallets: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        errors.extend(policy.validate_schema());
        if errors.is_empty() {
            Ok(policy)
        } else {
            Err(ValidationError::PolicySchema { errors })
        }
    }

    /// Return every violated schema constraint (empty when valid).
    pub fn validate_schema(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.name.trim().is_empty() {
            errors.push("Policy name is required".to_string());
        } else if self.name.chars().count() > MAX_NAME_LEN {
            errors.push(format!(
                "Policy name must not exceed {MAX_NAME_LEN} characters"
            ));
        }
        self.rules.collect_errors(&mut errors);
        if self.priority > MAX_PRIORITY {
            errors.push(format!("priority must be between 0 and {MAX_PRIORITY}"));
        }
        errors
    }

    /// [`Policy::validate_schema`] as a `Result`.
    pub fn check_schema(&self) -> Result<(), ValidationError> {
        let errors = self.validate_schema();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::PolicySchema { errors })
        }
    }

    /// Whether the policy has expired at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(false, |expiry| expiry <= now)
    }

    /// Whether the policy is effective (active and unexpired) at `now`.
    pub fn is_effective_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && !self.is_expired_at(now)
    }

    /// Whether the policy is effective right now.
    pub fn is_effective(&self) -> bool {
        self.is_effective_at(Utc::now())
    }

    /// Whether the policy is attached to `wallet_id`.
    pub fn is_attached_to(&self, wallet_id: &WalletId) -> bool {
        self.attached_wallets.contains(wallet_id)
    }

    /// Produce the updated policy, re-checking the schema.
    ///
    /// `self` is left untouched so a rejected update never leaves a
    /// half-applied record behind. A `rules.expiry` in the update is folded
    /// into `expires_at` under the same divergence rule as
    /// [`Policy::from_draft`].
    pub fn with_update(&self, update: PolicyUpdate, now: DateTime<Utc>) -> Result<Self, ValidationError> {
        let mut errors = Vec::new();
        let mut next = self.clone();
        if let Some(name) = update.name {
            next.name = name.trim().to_string();
        }
        let rule_expiry = match update.rules {
            Some(rules) => {
                next.rules = rules.bundle;
                rules.expiry
            }
            None => None,
        };
        if let Some(description) = update.description {
            next.description = description;
        }
        if let Some(is_active) = update.is_active {
            next.is_active = is_active;
        }
        if let Some(priority) = update.priority {
            next.priority = priority;
        }
        match (update.expires_at, rule_expiry) {
            (Some(policy_level), Some(rule_level)) if policy_level != Some(rule_level) => {
                errors.push("rules.expiry conflicts with expires_at".to_string());
            }
            (Some(policy_level), _) => next.expires_at = policy_level,
            (None, Some(rule_level)) => next.expires_at = Some(rule_level),
            (None, None) => {}
        }
        errors.extend(next.validate_schema());
        if !errors.is_empty() {
            return Err(ValidationError::PolicySchema { errors });
        }
        next.updated_at = now;
        Ok(next)
    }
}

fn default_active() -> bool {
    true
}

/// Input for creating a policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDraft {
    /// Human-readable name.
    pub name: String,
    /// Kind of policy.
    #[serde(default)]
    pub policy_type: PolicyType,
    /// The constraints to enforce.
    #[serde(default)]
    pub rules: DraftRules,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Evaluation priority (0..=1000).
    #[serde(default)]
    pub priority: u32,
    /// Whether the policy starts active.
    #[serde(default = "default_active")]
    pub is_active: bool,
    /// Optional expiry instant.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl PolicyDraft {
    /// A draft with default type, empty rules and priority 0.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            policy_type: PolicyType::default(),
            rules: DraftRules::default(),
            description: None,
            priority: 0,
            is_active: true,
            expires_at: None,
        }
    }

    /// Set the policy type.
    pub fn with_type(mut self, policy_type: PolicyType) -> Self {
        self.policy_type = policy_type;
        self
    }

    /// Set the rule bundle.
    pub fn with_rules(mut self, rules: RuleBundle) -> Self {
        self.rules.bundle = rules;
        self
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the expiry.
    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Start the policy inactive.
    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// Rule bundle as accepted on input, with the legacy rule-level expiry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DraftRules {
    /// The constraints proper.
    #[serde(flatten)]
    pub bundle: RuleBundle,
    /// Rule-level expiry, folded into the policy's `expires_at`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

impl From<RuleBundle> for DraftRules {
    fn from(bundle: RuleBundle) -> Self {
        Self {
            bundle,
            expiry: None,
        }
    }
}

/// Partial update of a policy. Absent fields are left unchanged; an
/// explicit `null` clears `description` or `expires_at`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyUpdate {
    /// New name.
    pub name: Option<String>,
    /// Replacement rule bundle, with the legacy rule-level expiry.
    pub rules: Option<DraftRules>,
    /// New description; `Some(None)` clears it.
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    /// Activate or deactivate.
    pub is_active: Option<bool>,
    /// New priority.
    pub priority: Option<u32>,
    /// New expiry; `Some(None)` removes it.
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<Option<DateTime<Utc>>>,
}

/// A field that is present deserializes to `Some`, even when `null`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
