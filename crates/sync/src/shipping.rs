//! Customer-facing shipping cost lookup against the internal pricing
//! service.
//!
//! Shipping is advisory data on the order row, never a reason to lose an
//! order: every failure mode degrades to zero cost with a warning.

use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

const SHIPPING_TIMEOUT: Duration = Duration::from_secs(10);

/// Resolves the customer-facing shipping cost for one item.
pub trait ShippingApi {
    /// Shipping cost for the item, or zero when unknown.
    fn customer_shipping(&self, asin: &str) -> impl Future<Output = Decimal>;
}

#[derive(Debug, Deserialize)]
struct ShippingResponse {
    #[serde(default)]
    customer_price_shipping: Option<Decimal>,
}

/// HTTP-backed resolver against the internal pricing service.
#[derive(Debug, Clone)]
pub struct HttpShippingResolver {
    http: reqwest::Client,
    base_url: String,
}

impl HttpShippingResolver {
    /// # Errors
    ///
    /// Fails only if the HTTP client cannot be constructed.
    pub fn new(base_url: &str) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: reqwest::Client::builder()
                .timeout(SHIPPING_TIMEOUT)
                .build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn lookup(&self, asin: &str) -> Result<Decimal, String> {
        let url = format!("{}/products/shipping/{asin}", self.base_url);
        let response = self.http.get(&url).send().await.map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("shipping service returned {status}"));
        }

        let parsed: ShippingResponse = response.json().await.map_err(|e| e.to_string())?;
        Ok(parsed.customer_price_shipping.unwrap_or(Decimal::ZERO))
    }
}

impl ShippingApi for HttpShippingResolver {
    async fn customer_shipping(&self, asin: &str) -> Decimal {
        match self.lookup(asin).await {
            Ok(cost) => cost,
            Err(reason) => {
                warn!(asin, reason, "shipping lookup failed, defaulting to zero");
                Decimal::ZERO
            }
        }
    }
}
