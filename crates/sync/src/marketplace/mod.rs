//! Marketplace SP-API surface used by the sync pipeline.
//!
//! The pipeline makes exactly three calls - list orders, list order items,
//! estimate fees - plus the LWA token exchange. Everything is behind the
//! [`MarketplaceApi`] trait so the orchestrator and fee estimator can be
//! tested against an in-memory fake.

mod auth;
mod client;
pub mod types;

pub use auth::TokenProvider;
pub use client::SpApiClient;
pub use types::{FeedItem, FeedOrder, OrderListQuery, OrderPage};

use rust_decimal::Decimal;
use thiserror::Error;

use crate::retry::RetryClass;

/// Errors from marketplace API calls.
#[derive(Debug, Error)]
pub enum MarketplaceError {
    /// Connection-level failure (DNS, TLS, timeout).
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success HTTP status other than 429.
    #[error("API call failed: status {status}, body: {body}")]
    Api { status: u16, body: String },

    /// A single attempt came back 429.
    #[error("rate limited (HTTP 429)")]
    RateLimited,

    /// Every retry attempt came back 429.
    #[error("rate limit retries exhausted")]
    RateLimitExceeded,

    /// Response parsed but the expected fields were missing.
    #[error("unexpected response shape: {0}")]
    Shape(String),

    /// LWA token exchange failed.
    #[error("token exchange failed: {0}")]
    Auth(String),
}

impl RetryClass for MarketplaceError {
    fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited)
    }

    fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// The three marketplace calls the pipeline depends on.
pub trait MarketplaceApi {
    /// Fetch one page of order headers.
    fn list_orders(
        &self,
        query: &OrderListQuery,
    ) -> impl Future<Output = Result<OrderPage, MarketplaceError>>;

    /// Fetch the line items of one order.
    fn order_items(
        &self,
        order_id: &str,
    ) -> impl Future<Output = Result<Vec<FeedItem>, MarketplaceError>>;

    /// Estimate the marketplace fee for one item at the given listing
    /// price. A single attempt - callers own the backoff schedule.
    fn fee_estimate(
        &self,
        asin: &str,
        price: Decimal,
    ) -> impl Future<Output = Result<Decimal, MarketplaceError>>;
}
