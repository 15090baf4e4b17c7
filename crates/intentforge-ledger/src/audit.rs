//! # Audit Log
//!
//! Every state change of note (policy lifecycle, wallet creation,
//! transaction decisions, clawbacks) is reported to an [`AuditSink`].
//! Recording is fire-and-forget: a sink never fails its caller, it logs
//! its own failures with `tracing::warn!`.
//!
//! [`AuditLog`] is the in-memory sink. Each stored [`AuditRecord`] carries
//! the SHA-256 digest of the event's canonical JSON and a chain digest over
//! the previous record's chain digest, so altering any stored event breaks
//! every later link. The trail is bounded: on overflow the oldest 10% of
//! records are trimmed and the chain continues from the last trimmed link.

use chrono::{DateTime, Utc};
use intentforge_core::{
    chain_digest, sha256_digest, CanonicalBytes, ContentDigest, IntentForgeError, WalletId,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Default number of records retained.
pub const DEFAULT_AUDIT_CAPACITY: usize = 10_000;

// ---------------------------------------------------------------------------
// AuditEventType
// ---------------------------------------------------------------------------

/// The kind of audited event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// A policy was created.
    PolicyCreated,
    /// A policy was updated.
    PolicyUpdated,
    /// A policy was deleted.
    PolicyDeleted,
    /// A policy was attached to a wallet.
    PolicyAttached,
    /// A wallet was created.
    WalletCreated,
    /// A transaction passed validation.
    TransactionApproved,
    /// A transaction was blocked.
    TransactionBlocked,
    /// An approved transaction was debited.
    TransactionSettled,
    /// A clawback credited the wallet.
    ClawbackExecuted,
    /// A clawback could not credit the wallet.
    ClawbackFailed,
}

impl AuditEventType {
    /// Return the string value for serialization.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PolicyCreated => "policy_created",
            Self::PolicyUpdated => "policy_updated",
            Self::PolicyDeleted => "policy_deleted",
            Self::PolicyAttached => "policy_attached",
            Self::WalletCreated => "wallet_created",
            Self::TransactionApproved => "transaction_approved",
            Self::TransactionBlocked => "transaction_blocked",
            Self::TransactionSettled => "transaction_settled",
            Self::ClawbackExecuted => "clawback_executed",
            Self::ClawbackFailed => "clawback_failed",
        }
    }
}

impl std::fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AuditEventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        const ALL: [AuditEventType; 10] = [
            AuditEventType::PolicyCreated,
            AuditEventType::PolicyUpdated,
            AuditEventType::PolicyDeleted,
            AuditEventType::PolicyAttached,
            AuditEventType::WalletCreated,
            AuditEventType::TransactionApproved,
            AuditEventType::TransactionBlocked,
            AuditEventType::TransactionSettled,
            AuditEventType::ClawbackExecuted,
            AuditEventType::ClawbackFailed,
        ];
        ALL.into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown audit event type: \"{s}\""))
    }
}

// ---------------------------------------------------------------------------
// AuditEvent
// ---------------------------------------------------------------------------

/// One audited event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// The kind of event.
    pub event_type: AuditEventType,
    /// UTC time of the event.
    pub timestamp: DateTime<Utc>,
    /// Wallet involved, if any.
    pub wallet_id: Option<WalletId>,
    /// Identifier of the policy, transaction or clawback concerned.
    pub subject_id: Option<String>,
    /// Structured details.
    pub metadata: Option<serde_json::Value>,
}

impl AuditEvent {
    /// An event of `event_type` stamped with the current time.
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event_type,
            timestamp: Utc::now(),
            wallet_id: None,
            subject_id: None,
            metadata: None,
        }
    }

    /// Attach the wallet involved.
    pub fn wallet(mut self, wallet_id: &WalletId) -> Self {
        self.wallet_id = Some(wallet_id.clone());
        self
    }

    /// Attach the subject identifier.
    pub fn subject(mut self, subject: impl ToString) -> Self {
        self.subject_id = Some(subject.to_string());
        self
    }

    /// Attach structured details.
    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Digest of the event's canonical JSON.
    pub fn digest(&self) -> Result<ContentDigest, IntentForgeError> {
        let canonical = CanonicalBytes::new(self)?;
        Ok(sha256_digest(&canonical))
    }
}

// ---------------------------------------------------------------------------
// AuditSink
// ---------------------------------------------------------------------------

/// Destination for audit events.
pub trait AuditSink: Send + Sync {
    /// Record an event. Must not fail the caller.
    fn record(&self, event: AuditEvent);
}

/// A stored, hash-chained audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Monotonic sequence number, starting at 1.
    pub sequence: u64,
    /// The event.
    pub event: AuditEvent,
    /// Hex SHA-256 of the event's canonical JSON.
    pub data_hash: String,
    /// Hex SHA-256 over the previous chain hash and `data_hash`.
    pub chain_hash: String,
}

/// Outcome of [`AuditLog::verify_chain`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainVerification {
    /// Whether every retained record verified.
    pub valid: bool,
    /// Number of records checked.
    pub records_checked: usize,
    /// Sequence number of the first record that failed, if any.
    pub first_invalid_sequence: Option<u64>,
}

struct AuditTrail {
    records: Vec<AuditRecord>,
    capacity: usize,
    next_sequence: u64,
    head: Option<ContentDigest>,
    /// Chain digest preceding the first retained record.
    anchor: Option<ContentDigest>,
}

impl AuditTrail {
    fn append(&mut self, event: AuditEvent) -> Result<u64, IntentForgeError> {
        let data = event.digest()?;
        let chain = chain_digest(self.head.as_ref(), &data);
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.head = Some(chain);
        self.records.push(AuditRecord {
            sequence,
            event,
            data_hash: data.to_hex(),
            chain_hash: chain.to_hex(),
        });
        if self.records.len() > self.capacity {
            let trim = (self.capacity / 10).max(1);
            self.anchor = self
                .records
                .get(trim - 1)
                .and_then(|r| ContentDigest::from_hex(&r.chain_hash));
            self.records.drain(..trim);
        }
        Ok(sequence)
    }
}

/// In-memory, capacity-bounded, hash-chained audit sink.
pub struct AuditLog {
    trail: Mutex<AuditTrail>,
}

impl AuditLog {
    /// Create a log retaining at most `capacity` records.
    pub fn new(capacity: usize) -> Self {
        Self {
            trail: Mutex::new(AuditTrail {
                records: Vec::new(),
                capacity: capacity.max(1),
                next_sequence: 1,
                head: None,
                anchor: None,
            }),
        }
    }

    /// The most recent `limit` records, optionally of one type, oldest first.
    pub fn recent(&self, limit: usize, event_type: Option<AuditEventType>) -> Vec<AuditRecord> {
        let trail = self.trail.lock();
        let matching: Vec<&AuditRecord> = trail
            .records
            .iter()
            .filter(|r| event_type.map_or(true, |t| r.event.event_type == t))
            .collect();
        let start = matching.len().saturating_sub(limit);
        matching[start..].iter().map(|r| (*r).clone()).collect()
    }

    /// Find a record by its data or chain hash (hex, optional `sha256:` prefix).
    pub fn find_by_hash(&self, hash: &str) -> Option<AuditRecord> {
        let hash = hash.trim();
        let hash = hash.strip_prefix("sha256:").unwrap_or(hash).to_ascii_lowercase();
        self.trail
            .lock()
            .records
            .iter()
            .find(|r| r.data_hash == hash || r.chain_hash == hash)
            .cloned()
    }

    /// Recompute every retained record's digests and check the chain.
    pub fn verify_chain(&self) -> ChainVerification {
        let trail = self.trail.lock();
        let mut previous = trail.anchor;
        for record in &trail.records {
            let ok = record.event.digest().map_or(false, |data| {
                let chain = chain_digest(previous.as_ref(), &data);
                previous = Some(chain);
                data.to_hex() == record.data_hash && chain.to_hex() == record.chain_hash
            });
            if !ok {
                tracing::warn!(sequence = record.sequence, "audit chain verification failed");
                return ChainVerification {
                    valid: false,
                    records_checked: trail.records.len(),
                    first_invalid_sequence: Some(record.sequence),
                };
            }
        }
        ChainVerification {
            valid: true,
            records_checked: trail.records.len(),
            first_invalid_sequence: None,
        }
    }

    /// Number of retained records.
    pub fn len(&self) -> usize {
        self.trail.lock().records.len()
    }

    /// Whether no record is retained.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    fn tamper(&self, index: usize, f: impl FnOnce(&mut AuditRecord)) {
        if let Some(record) = self.trail.lock().records.get_mut(index) {
            f(record);
        }
    }
}

impl AuditSink for AuditLog {
    fn record(&self, event: AuditEvent) {
        let event_type = event.event_type;
        match self.trail.lock().append(event) {
            Ok(sequence) => tracing::debug!(%event_type, sequence, "audit event recorded"),
            Err(e) => tracing::warn!(%event_type, error = %e, "audit event dropped"),
        }
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new(DEFAULT_AUDIT_CAPACITY)
    }
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let trail = self.trail.lock();
        f.debug_struct("AuditLog")
            .field("records", &trail.records.len())
            .field("capacity", &trail.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(event_type: AuditEventType, n: u64) -> AuditEvent {
        AuditEvent::new(event_type).metadata(json!({ "n": n }))
    }

    #[test]
    fn records_are_sequenced_and_chained() {
        let log = AuditLog::new(100);
        log.record(event(AuditEventType::WalletCreated, 1));
        log.record(event(AuditEventType::PolicyCreated, 2));
        let records = log.recent(10, None);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].sequence, 1);
        assert_eq!(records[1].sequence, 2);
        assert_eq!(records[0].data_hash.len(), 64);
        assert_ne!(records[0].chain_hash, records[1].chain_hash);
        assert!(log.verify_chain().valid);
    }

    #[test]
    fn recent_filters_and_limits() {
        let log = AuditLog::new(100);
        for n in 0..5 {
            log.record(event(AuditEventType::TransactionApproved, n));
            log.record(event(AuditEventType::TransactionBlocked, n));
        }
        let blocked = log.recent(3, Some(AuditEventType::TransactionBlocked));
        assert_eq!(blocked.len(), 3);
        assert!(blocked
            .iter()
            .all(|r| r.event.event_type == AuditEventType::TransactionBlocked));
        assert_eq!(blocked.last().unwrap().sequence, 10);
        assert_eq!(log.recent(100, None).len(), 10);
    }

    #[test]
    fn capacity_trims_oldest_tenth() {
        let log = AuditLog::new(20);
        for n in 0..21 {
            log.record(event(AuditEventType::WalletCreated, n));
        }
        assert_eq!(log.len(), 19);
        let first = &log.recent(1000, None)[0];
        assert_eq!(first.sequence, 3);
        let verification = log.verify_chain();
        assert!(verification.valid);
        assert_eq!(verification.records_checked, 19);
    }

    #[test]
    fn tampering_is_detected() {
        let log = AuditLog::new(100);
        for n in 0..4 {
            log.record(event(AuditEventType::PolicyUpdated, n));
        }
        log.tamper(1, |r| r.event.metadata = Some(json!({ "n": 999 })));
        let verification = log.verify_chain();
        assert!(!verification.valid);
        assert_eq!(verification.first_invalid_sequence, Some(2));
    }

    #[test]
    fn find_by_hash_accepts_either_digest() {
        let log = AuditLog::new(10);
        log.record(event(AuditEventType::ClawbackExecuted, 1));
        let record = log.recent(1, None).remove(0);
        assert_eq!(log.find_by_hash(&record.data_hash), Some(record.clone()));
        let prefixed = format!("sha256:{}", record.chain_hash.to_uppercase());
        assert_eq!(log.find_by_hash(&prefixed), Some(record));
        assert!(log.find_by_hash("deadbeef").is_none());
    }

    #[test]
    fn event_type_parses() {
        assert_eq!(
            "clawback_failed".parse::<AuditEventType>(),
            Ok(AuditEventType::ClawbackFailed)
        );
        assert!("nope".parse::<AuditEventType>().is_err());
        assert_eq!(
            serde_json::to_string(&AuditEventType::TransactionSettled).unwrap(),
            "\"transaction_settled\""
        );
    }

    #[test]
    fn events_carry_subject_and_wallet() {
        let wallet = WalletId::new();
        let e = AuditEvent::new(AuditEventType::PolicyAttached)
            .wallet(&wallet)
            .subject("policy-1");
        assert_eq!(e.wallet_id, Some(wallet));
        assert_eq!(e.subject_id.as_deref(), Some("policy-1"));
        assert!(e.digest().is_ok());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn trimmed_trail_stays_bounded_and_verifiable(
                capacity in 1usize..40,
                count in 0u64..120,
            ) {
                let log = AuditLog::new(capacity);
                for n in 0..count {
                    log.record(event(AuditEventType::TransactionApproved, n));
                }
                prop_assert!(log.len() <= capacity);
                let records = log.recent(usize::MAX, None);
                if let Some(last) = records.last() {
                    prop_assert_eq!(last.sequence, count);
                }
                prop_assert!(records.windows(2).all(|w| w[1].sequence == w[0].sequence + 1));
                let verification = log.verify_chain();
                prop_assert!(verification.valid);
                prop_assert_eq!(verification.records_checked, records.len());
            }
        }
    }
}
