//! # Validation Orchestrator
//!
//! Runs the rule evaluator over every effective policy of a wallet and folds
//! the outcomes into one [`ValidationResult`]. Policies are visited in
//! ascending priority; equal priorities keep their input order. Evaluation
//! never stops early across policies: every violated policy is reported.

use std::time::Instant;

use chrono::{DateTime, Utc};

use crate::evaluator::evaluate_at;
use crate::explanation::ExplanationGenerator;
use crate::policy::Policy;
use crate::transaction::{Transaction, TransactionStatus, ValidationResult};

/// Confidence attached to an approval.
pub const CONFIDENCE_APPROVED: f64 = 0.98;

/// Confidence attached to a block.
pub const CONFIDENCE_BLOCKED: f64 = 0.95;

/// Validates transactions against a set of policies.
#[derive(Debug, Clone, Default)]
pub struct ValidationOrchestrator {
    explainer: ExplanationGenerator,
}

impl ValidationOrchestrator {
    /// Create an orchestrator using `explainer` for result text.
    pub fn new(explainer: ExplanationGenerator) -> Self {
        Self { explainer }
    }

    /// Validate `tx` against `policies` at the current instant.
    pub fn validate(&self, tx: &Transaction, policies: &[Policy]) -> ValidationResult {
        self.validate_at(tx, policies, Utc::now())
    }

    /// Validate `tx` against `policies` as of `now`.
    pub fn validate_at(
        &self,
        tx: &Transaction,
        policies: &[Policy],
        now: DateTime<Utc>,
    ) -> ValidationResult {
        let started = Instant::now();

        let mut ordered: Vec<&Policy> = policies
            .iter()
            .filter(|p| p.is_effective_at(now))
            .collect();
        ordered.sort_by_key(|p| p.priority);

        let violations: Vec<_> = ordered
            .iter()
            .filter_map(|policy| evaluate_at(tx, policy, now))
            .collect();

        let status = if violations.is_empty() {
            TransactionStatus::Approved
        } else {
            TransactionStatus::Blocked
        };
        let confidence = match status {
            TransactionStatus::Approved => CONFIDENCE_APPROVED,
            _ => CONFIDENCE_BLOCKED,
        };

        let mut result = ValidationResult {
            transaction_id: tx.id.clone(),
            status,
            violations,
            policies_evaluated: ordered.iter().map(|p| p.id.clone()).collect(),
            explanation: String::new(),
            confidence,
            processing_time_ms: 0.0,
            requires_clawback: false,
        };
        result.explanation = self.explainer.explain(&result, tx, &ordered);
        result.processing_time_ms = started.elapsed().as_secs_f64() * 1000.0;

        tracing::debug!(
            transaction_id = %tx.id,
            wallet_id = %tx.wallet_id,
            status = %result.status,
            violations = result.violations.len(),
            policies = result.policies_evaluated.len(),
            elapsed_ms = result.processing_time_ms,
            "transaction validated"
        );
        result
    }
}
