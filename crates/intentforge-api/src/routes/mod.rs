//! # API Route Modules
//!
//! - `wallets`: wallet lifecycle, balances, attached policies and history.
//! - `policies`: policy CRUD, attachment, schema checks, descriptions and
//!   the conflict report.
//! - `transactions`: validation, dry runs and settlement.
//! - `clawbacks`: reversal of transactions and clawback history.
//! - `audit`: the hash-chained audit log and request counters.

pub mod audit;
pub mod clawbacks;
pub mod policies;
pub mod transactions;
pub mod wallets;
