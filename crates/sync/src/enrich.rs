//! Order line enrichment: fee estimates and shipping costs.
//!
//! Both lookups are best-effort. A fee estimate retries on a dedicated
//! exponential schedule (the fees endpoint recovers slowly from throttling)
//! and degrades to zero when exhausted; shipping degrades to zero inside the
//! resolver. Either way the order line is persisted.

use std::time::Duration;

use rust_decimal::Decimal;
use tracing::{error, warn};

use crate::marketplace::{FeedItem, MarketplaceApi, MarketplaceError};
use crate::retry::{RetryPolicy, with_retry};
use crate::shipping::ShippingApi;

/// Attempts for one fee estimate, including the first call.
pub const FEE_ATTEMPTS: u32 = 5;

/// Base of the fee-estimate backoff: 1s, 2s, 4s, 8s.
pub const FEE_BACKOFF_BASE: Duration = Duration::from_secs(1);

/// An order line with its marketplace price, estimated fee and shipping
/// cost filled in.
#[derive(Debug, Clone)]
pub struct PricedItem {
    pub asin: String,
    pub seller_sku: String,
    pub title: String,
    /// Line total as reported by the feed; zero when the feed omitted it.
    pub amazon_price: Decimal,
    pub quantity: i32,
    /// Estimated marketplace fee; zero when estimation failed.
    pub amazon_fee: Decimal,
    /// Customer-facing shipping cost; zero when unknown.
    pub customer_shipping: Decimal,
}

/// Fills in fees and shipping for the items of one order.
#[derive(Debug)]
pub struct Enricher<'a, M, S> {
    marketplace: &'a M,
    shipping: &'a S,
    fee_policy: RetryPolicy,
}

impl<'a, M: MarketplaceApi, S: ShippingApi> Enricher<'a, M, S> {
    #[must_use]
    pub fn new(marketplace: &'a M, shipping: &'a S) -> Self {
        Self {
            marketplace,
            shipping,
            fee_policy: RetryPolicy::exponential(FEE_ATTEMPTS, FEE_BACKOFF_BASE),
        }
    }

    /// Estimate the marketplace fee for one item.
    ///
    /// Never fails: non-positive prices skip the call, and any error after
    /// the retry budget degrades to zero so the order line is still
    /// persisted.
    pub async fn estimate_fee(&self, asin: &str, price: Decimal) -> Decimal {
        if price <= Decimal::ZERO {
            warn!(asin, "no listing price, skipping fee estimate");
            return Decimal::ZERO;
        }

        match with_retry(self.fee_policy, "fee_estimate", || {
            self.marketplace.fee_estimate(asin, price)
        })
        .await
        {
            Ok(fee) => fee,
            Err(err) => {
                error!(asin, error = %err, "fee estimate failed, defaulting to zero");
                Decimal::ZERO
            }
        }
    }

    /// Fetch the items of one order and price each line.
    ///
    /// # Errors
    ///
    /// `MarketplaceError` only when the item list itself cannot be read;
    /// per-line enrichment failures degrade to zero instead.
    pub async fn enrich_order(&self, order_id: &str) -> Result<Vec<PricedItem>, MarketplaceError> {
        let items = self.marketplace.order_items(order_id).await?;

        let mut priced = Vec::with_capacity(items.len());
        for item in items {
            priced.push(self.price_item(item).await);
        }
        Ok(priced)
    }

    async fn price_item(&self, item: FeedItem) -> PricedItem {
        let amazon_price = item
            .item_price
            .as_ref()
            .map_or(Decimal::ZERO, |p| p.amount);
        let amazon_fee = self.estimate_fee(&item.asin, amazon_price).await;
        let customer_shipping = self.shipping.customer_shipping(&item.asin).await;

        PricedItem {
            asin: item.asin,
            seller_sku: item.seller_sku,
            title: item.title,
            amazon_price,
            quantity: item.quantity_ordered,
            amazon_fee,
            customer_shipping,
        }
    }
}
