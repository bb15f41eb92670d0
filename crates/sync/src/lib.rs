//! Orderdeck Sync - marketplace order synchronization pipeline.
//!
//! A scheduled job that pulls orders from the marketplace SP-API, reconciles
//! them against the local `orders` table, enriches each line item with
//! estimated fees and shipping costs, and applies a restricted
//! status-transition policy before persisting. One run executes inside a
//! single database transaction; a fatal error rolls the whole run back.
//!
//! # Modules
//!
//! - [`config`] - Environment-driven configuration
//! - [`limiter`] - Token-window rate limiter for outbound marketplace calls
//! - [`retry`] - Shared retry/backoff policy
//! - [`http`] - Rate-limited, retrying HTTP invoker
//! - [`marketplace`] - SP-API client (orders, order items, fee estimates)
//! - [`shipping`] - Internal shipping-cost lookup
//! - [`enrich`] - Per-item fee and shipping enrichment
//! - [`db`] - Order store over one transaction per run
//! - [`pipeline`] - The sync orchestrator

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod enrich;
pub mod error;
pub mod http;
pub mod limiter;
pub mod marketplace;
pub mod pipeline;
pub mod retry;
pub mod shipping;

pub use error::SyncError;
