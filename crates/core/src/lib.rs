//! Orderdeck Core - Shared domain types.
//!
//! This crate provides the types shared between the sync pipeline and the
//! console's read layer:
//! - [`types`] - Order status, fulfillment channel
//! - [`policy`] - The status-transition policy applied by the sync job
//! - [`financials`] - Profit/margin/ROI calculator
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no
//! database access, no HTTP clients. Every call site that needs consistent
//! financial numbers goes through [`financials`] rather than re-deriving the
//! formulas.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod financials;
pub mod policy;
pub mod types;

pub use financials::{FinancialInputs, FinancialMetrics};
pub use policy::{Decision, decide};
pub use types::*;
