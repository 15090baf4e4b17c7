//! # Middleware
//!
//! Tower middleware shared by every route.

pub mod metrics;
