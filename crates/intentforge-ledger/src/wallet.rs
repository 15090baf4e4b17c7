//! # Wallet Store
//!
//! Programmable wallets and their balances. The map of wallets sits under a
//! `parking_lot::RwLock` that is held only long enough to clone out the
//! wallet's `Arc<Mutex<Wallet>>`; balance changes then lock that single
//! wallet. Operations on one wallet are serialized, different wallets
//! proceed in parallel.
//!
//! No lock is ever held across an `.await` point.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use intentforge_core::{NotFoundError, PolicyId, TransactionId, ValidationError, WalletId};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Currency assigned to wallets created without one.
pub const DEFAULT_CURRENCY: &str = "INR";

/// A programmable wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    /// Unique identifier.
    pub id: WalletId,
    /// Owner reference.
    pub owner_id: String,
    /// Current balance. Never driven negative by a debit.
    pub balance: f64,
    /// Currency code.
    pub currency: String,
    /// Compliance score in `[0, 1]`.
    pub compliance_score: f64,
    /// Policies attached to this wallet.
    pub attached_policies: Vec<PolicyId>,
    /// Inactive wallets accept neither debits nor credits.
    pub is_active: bool,
    /// Locked wallets reject debits.
    pub is_locked: bool,
    /// Transactions already reversed on this wallet.
    pub clawed_back_transactions: BTreeSet<TransactionId>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

/// Effect of one balance operation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BalanceChange {
    /// Balance before the operation.
    pub previous_balance: f64,
    /// Balance after the operation.
    pub new_balance: f64,
    /// Amount moved.
    pub amount: f64,
}

impl Wallet {
    /// Remove `amount` from the balance.
    pub fn debit(&mut self, amount: f64) -> Result<BalanceChange, LedgerError> {
        check_amount(amount)?;
        if !self.is_active {
            return Err(LedgerError::WalletInactive(self.id.clone()));
        }
        if self.is_locked {
            return Err(LedgerError::WalletLocked(self.id.clone()));
        }
        if amount > self.balance {
            return Err(LedgerError::InsufficientBalance {
                wallet_id: self.id.clone(),
                required: amount,
                available: self.balance,
            });
        }
        Ok(self.apply(self.balance - amount, amount))
    }

    /// Add `amount` to the balance.
    pub fn credit(&mut self, amount: f64) -> Result<BalanceChange, LedgerError> {
        check_amount(amount)?;
        if !self.is_active {
            return Err(LedgerError::WalletInactive(self.id.clone()));
        }
        Ok(self.apply(self.balance + amount, amount))
    }

    fn apply(&mut self, new_balance: f64, amount: f64) -> BalanceChange {
        let change = BalanceChange {
            previous_balance: self.balance,
            new_balance,
            amount,
        };
        self.balance = new_balance;
        self.updated_at = Utc::now();
        change
    }

    /// Whether `transaction_id` was already clawed back on this wallet.
    pub fn has_clawed_back(&self, transaction_id: &TransactionId) -> bool {
        self.clawed_back_transactions.contains(transaction_id)
    }
}

fn check_amount(amount: f64) -> Result<(), LedgerError> {
    if amount.is_finite() && amount > 0.0 {
        Ok(())
    } else {
        Err(LedgerError::InvalidAmount(amount))
    }
}

/// Input for creating a wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletDraft {
    /// Owner reference.
    pub owner_id: String,
    /// Opening balance.
    #[serde(default)]
    pub initial_balance: f64,
    /// Currency; the store default when absent.
    #[serde(default)]
    pub currency: Option<String>,
}

impl WalletDraft {
    /// A draft for `owner_id` with an opening balance.
    pub fn new(owner_id: impl Into<String>, initial_balance: f64) -> Self {
        Self {
            owner_id: owner_id.into(),
            initial_balance,
            currency: None,
        }
    }
}

/// Concurrent in-memory wallet store.
#[derive(Debug, Clone)]
pub struct WalletStore {
    wallets: Arc<RwLock<HashMap<WalletId, Arc<Mutex<Wallet>>>>>,
    default_currency: String,
}

impl Default for WalletStore {
    fn default() -> Self {
        Self::new(DEFAULT_CURRENCY)
    }
}

impl WalletStore {
    /// Create an empty store assigning `default_currency` to new wallets.
    pub fn new(default_currency: impl Into<String>) -> Self {
        Self {
            wallets: Arc::new(RwLock::new(HashMap::new())),
            default_currency: default_currency.into(),
        }
    }

    /// Create a wallet.
    pub fn create(&self, draft: WalletDraft) -> Result<Wallet, LedgerError> {
        let owner_id = draft.owner_id.trim().to_string();
        if owner_id.is_empty() {
            return Err(ValidationError::empty("owner_id").into());
        }
        let currency = match draft.currency {
            Some(c) => c.trim().to_string(),
            None => self.default_currency.clone(),
        };
        if currency.is_empty() {
            return Err(ValidationError::empty("currency").into());
        }
        if !draft.initial_balance.is_finite() || draft.initial_balance < 0.0 {
            return Err(ValidationError::amount(
                "initial_balance",
                draft.initial_balance,
                "must be zero or greater",
            )
            .into());
        }

        let now = Utc::now();
        let wallet = Wallet {
            id: WalletId::new(),
            owner_id,
            balance: draft.initial_balance,
            currency,
            compliance_score: 1.0,
            attached_policies: Vec::new(),
            is_active: true,
            is_locked: false,
            clawed_back_transactions: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        };
        self.wallets
            .write()
            .insert(wallet.id.clone(), Arc::new(Mutex::new(wallet.clone())));
        tracing::info!(
            wallet_id = %wallet.id,
            owner_id = %wallet.owner_id,
            balance = wallet.balance,
            "wallet created"
        );
        Ok(wallet)
    }

    fn handle(&self, id: &WalletId) -> Option<Arc<Mutex<Wallet>>> {
        self.wallets.read().get(id).cloned()
    }

    /// Snapshot of a wallet.
    pub fn get(&self, id: &WalletId) -> Option<Wallet> {
        self.handle(id).map(|w| w.lock().clone())
    }

    /// Whether a wallet exists.
    pub fn contains(&self, id: &WalletId) -> bool {
        self.wallets.read().contains_key(id)
    }

    /// Every wallet (optionally of one owner), oldest first.
    pub fn list(&self, owner_id: Option<&str>) -> Vec<Wallet> {
        let handles: Vec<_> = self.wallets.read().values().cloned().collect();
        let mut wallets: Vec<Wallet> = handles
            .iter()
            .map(|w| w.lock().clone())
            .filter(|w| owner_id.map_or(true, |owner| w.owner_id == owner))
            .collect();
        wallets.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        wallets
    }

    /// Run `f` while holding the wallet's lock.
    pub fn with_wallet<R>(
        &self,
        id: &WalletId,
        f: impl FnOnce(&mut Wallet) -> R,
    ) -> Result<R, LedgerError> {
        let handle = self
            .handle(id)
            .ok_or_else(|| NotFoundError::Wallet(id.clone()))?;
        let mut wallet = handle.lock();
        Ok(f(&mut wallet))
    }

    /// Debit a wallet.
    pub fn debit(&self, id: &WalletId, amount: f64) -> Result<BalanceChange, LedgerError> {
        let change = self.with_wallet(id, |w| w.debit(amount))??;
        tracing::info!(
            wallet_id = %id,
            amount,
            new_balance = change.new_balance,
            "wallet debited"
        );
        Ok(change)
    }

    /// Credit a wallet.
    pub fn credit(&self, id: &WalletId, amount: f64) -> Result<BalanceChange, LedgerError> {
        let change = self.with_wallet(id, |w| w.credit(amount))??;
        tracing::info!(
            wallet_id = %id,
            amount,
            new_balance = change.new_balance,
            "wallet credited"
        );
        Ok(change)
    }

    /// Record `policy_id` as attached. Idempotent.
    pub fn attach_policy(&self, id: &WalletId, policy_id: &PolicyId) -> Result<Wallet, LedgerError> {
        self.with_wallet(id, |w| {
            if !w.attached_policies.contains(policy_id) {
                w.attached_policies.push(policy_id.clone());
                w.updated_at = Utc::now();
            }
            w.clone()
        })
    }

    /// Remove `policy_id` from the wallet's attached list.
    pub fn detach_policy(&self, id: &WalletId, policy_id: &PolicyId) -> Result<Wallet, LedgerError> {
        self.with_wallet(id, |w| {
            let before = w.attached_policies.len();
            w.attached_policies.retain(|p| p != policy_id);
            if w.attached_policies.len() != before {
                w.updated_at = Utc::now();
            }
            w.clone()
        })
    }

    /// Lock or unlock a wallet against debits.
    pub fn set_locked(&self, id: &WalletId, locked: bool) -> Result<Wallet, LedgerError> {
        let wallet = self.with_wallet(id, |w| {
            w.is_locked = locked;
            w.updated_at = Utc::now();
            w.clone()
        })?;
        tracing::info!(wallet_id = %id, locked, "wallet lock changed");
        Ok(wallet)
    }

    /// Activate or deactivate a wallet.
    pub fn set_active(&self, id: &WalletId, active: bool) -> Result<Wallet, LedgerError> {
        self.with_wallet(id, |w| {
            w.is_active = active;
            w.updated_at = Utc::now();
            w.clone()
        })
    }

    /// Number of wallets.
    pub fn len(&self) -> usize {
        self.wallets.read().len()
    }

    /// Whether the store holds no wallet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
