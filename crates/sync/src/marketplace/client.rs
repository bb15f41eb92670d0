//! SP-API client: the concrete [`MarketplaceApi`] implementation.

use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

use crate::config::MarketplaceConfig;
use crate::http::ResilientInvoker;
use crate::limiter::RateLimiter;
use crate::marketplace::auth::TokenProvider;
use crate::marketplace::types::{
    FeedItem, FeesEnvelope, FeesEstimateBody, ItemsEnvelope, OrderListQuery, OrderPage,
    OrdersEnvelope,
};
use crate::marketplace::{MarketplaceApi, MarketplaceError};

const ACCESS_TOKEN_HEADER: &str = "x-amz-access-token";

/// HTTP client for the orders and fees endpoints.
///
/// General calls go through [`ResilientInvoker::invoke`] and inherit the
/// flat-cooldown retry policy; fee estimates are single attempts because the
/// fee estimator owns its own exponential schedule.
#[derive(Debug)]
pub struct SpApiClient {
    http: reqwest::Client,
    invoker: ResilientInvoker,
    auth: TokenProvider,
    endpoint: String,
    marketplace_id: String,
}

impl SpApiClient {
    /// Build a client sharing the given rate limiter.
    ///
    /// # Errors
    ///
    /// `MarketplaceError::Transport` if the underlying HTTP client cannot
    /// be constructed.
    pub fn new(
        config: &MarketplaceConfig,
        limiter: Arc<RateLimiter>,
        timeout: Duration,
    ) -> Result<Self, MarketplaceError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            invoker: ResilientInvoker::with_default_policy(limiter),
            auth: TokenProvider::new(http.clone(), config.clone()),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            marketplace_id: config.marketplace_id.clone(),
            http,
        })
    }

    /// Exchange the refresh token once up front so credential problems
    /// surface before a transaction is opened.
    ///
    /// # Errors
    ///
    /// `MarketplaceError::Auth` when the exchange fails.
    pub async fn verify_credentials(&self) -> Result<(), MarketplaceError> {
        self.auth.access_token().await.map(|_| ())
    }
}

impl MarketplaceApi for SpApiClient {
    #[instrument(skip(self, query), fields(page_size = query.page_size))]
    async fn list_orders(&self, query: &OrderListQuery) -> Result<OrderPage, MarketplaceError> {
        let token = self.auth.access_token().await?;
        let url = format!("{}/orders/v0/orders", self.endpoint);
        let page_size = query.page_size.to_string();

        let response = self
            .invoker
            .invoke("list_orders", || {
                let mut request = self
                    .http
                    .get(&url)
                    .header(ACCESS_TOKEN_HEADER, &token)
                    .query(&[
                        ("MarketplaceIds", self.marketplace_id.as_str()),
                        ("MaxResultsPerPage", page_size.as_str()),
                    ]);
                // NextToken supersedes the window filter on later pages.
                if let Some(next) = &query.next_token {
                    request = request.query(&[("NextToken", next.as_str())]);
                } else if let Some(after) = query.created_after {
                    request = request.query(&[(
                        "CreatedAfter",
                        after.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
                    )]);
                }
                request
            })
            .await?;

        let envelope: OrdersEnvelope = response.json().await?;
        Ok(OrderPage {
            orders: envelope.payload.orders,
            next_token: envelope.payload.next_token,
        })
    }

    #[instrument(skip(self))]
    async fn order_items(&self, order_id: &str) -> Result<Vec<FeedItem>, MarketplaceError> {
        let token = self.auth.access_token().await?;
        let url = format!("{}/orders/v0/orders/{order_id}/orderItems", self.endpoint);

        let response = self
            .invoker
            .invoke("order_items", || {
                self.http.get(&url).header(ACCESS_TOKEN_HEADER, &token)
            })
            .await?;

        let envelope: ItemsEnvelope = response.json().await?;
        Ok(envelope.payload.order_items)
    }

    #[instrument(skip(self, price), fields(price = %price))]
    async fn fee_estimate(&self, asin: &str, price: Decimal) -> Result<Decimal, MarketplaceError> {
        let token = self.auth.access_token().await?;
        let url = format!(
            "{}/products/fees/v0/items/{asin}/feesEstimate",
            self.endpoint
        );
        let body = FeesEstimateBody::new(&self.marketplace_id, asin, price);

        let response = self
            .invoker
            .invoke_once(
                "fee_estimate",
                self.http
                    .post(&url)
                    .header(ACCESS_TOKEN_HEADER, &token)
                    .json(&body),
            )
            .await?;

        let envelope: FeesEnvelope = response.json().await?;
        envelope
            .total_fee()
            .ok_or_else(|| MarketplaceError::Shape("missing TotalFeesEstimate".to_string()))
    }
}
