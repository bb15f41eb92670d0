//! Wire types for the SP-API orders and fees endpoints.
//!
//! The envelopes mirror the JSON the API actually returns (PascalCase keys,
//! money amounts as strings); the `Feed*` types are what the rest of the
//! pipeline consumes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Query parameters for one page of the order feed.
#[derive(Debug, Clone, Default)]
pub struct OrderListQuery {
    /// Start of the order window; ignored when `next_token` is set.
    pub created_after: Option<DateTime<Utc>>,
    /// Continuation token from the previous page.
    pub next_token: Option<String>,
    /// Orders per page.
    pub page_size: u32,
}

/// One page of order headers plus the continuation token, if any.
#[derive(Debug, Clone)]
pub struct OrderPage {
    pub orders: Vec<FeedOrder>,
    pub next_token: Option<String>,
}

/// An order header as reported by the marketplace feed.
///
/// `order_status` and `fulfillment_channel` stay raw strings here; mapping
/// them into domain types happens in the pipeline, where unrecognized
/// values can be logged with their order ID.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FeedOrder {
    pub amazon_order_id: String,
    pub order_status: String,
    #[serde(default)]
    pub fulfillment_channel: String,
    pub purchase_date: DateTime<Utc>,
    #[serde(default)]
    pub latest_ship_date: Option<DateTime<Utc>>,
}

/// A line item of one order.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FeedItem {
    #[serde(rename = "ASIN")]
    pub asin: String,
    #[serde(rename = "SellerSKU", default)]
    pub seller_sku: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub item_price: Option<Money>,
    pub quantity_ordered: i32,
}

/// A money amount as the API serializes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Money {
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub currency_code: String,
}

impl Money {
    #[must_use]
    pub fn usd(amount: Decimal) -> Self {
        Self {
            amount,
            currency_code: "USD".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct OrdersEnvelope {
    pub payload: OrdersPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct OrdersPayload {
    #[serde(default)]
    pub orders: Vec<FeedOrder>,
    #[serde(default)]
    pub next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ItemsEnvelope {
    pub payload: ItemsPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ItemsPayload {
    #[serde(default)]
    pub order_items: Vec<FeedItem>,
}

/// Request body for `POST /products/fees/v0/items/{asin}/feesEstimate`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct FeesEstimateBody {
    pub fees_estimate_request: FeesEstimateRequest,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct FeesEstimateRequest {
    pub marketplace_id: String,
    pub id_type: String,
    pub id_value: String,
    pub is_amazon_fulfilled: bool,
    pub price_to_estimate_fees: PriceToEstimateFees,
    pub identifier: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct PriceToEstimateFees {
    pub listing_price: Money,
}

impl FeesEstimateBody {
    pub(crate) fn new(marketplace_id: &str, asin: &str, price: Decimal) -> Self {
        Self {
            fees_estimate_request: FeesEstimateRequest {
                marketplace_id: marketplace_id.to_string(),
                id_type: "ASIN".to_string(),
                id_value: asin.to_string(),
                is_amazon_fulfilled: false,
                price_to_estimate_fees: PriceToEstimateFees {
                    listing_price: Money::usd(price),
                },
                identifier: format!("request_{asin}"),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct FeesEnvelope {
    pub payload: FeesPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct FeesPayload {
    #[serde(default)]
    pub fees_estimate_result: Option<FeesEstimateResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct FeesEstimateResult {
    #[serde(default)]
    pub fees_estimate: Option<FeesEstimate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct FeesEstimate {
    #[serde(default)]
    pub total_fees_estimate: Option<Money>,
}

impl FeesEnvelope {
    /// Total fee amount, if the response carried one.
    pub(crate) fn total_fee(&self) -> Option<Decimal> {
        self.payload
            .fees_estimate_result
            .as_ref()?
            .fees_estimate
            .as_ref()?
            .total_fees_estimate
            .as_ref()
            .map(|m| m.amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().expect("decimal literal")
    }

    #[test]
    fn test_orders_envelope_deserializes_feed_shape() {
        let json = r#"{
            "payload": {
                "Orders": [{
                    "AmazonOrderId": "111-2223334-5556667",
                    "OrderStatus": "Unshipped",
                    "FulfillmentChannel": "MFN",
                    "PurchaseDate": "2026-08-27T14:30:00Z",
                    "LatestShipDate": "2026-08-29T23:59:59Z"
                }],
                "NextToken": "abc123"
            }
        }"#;
        let envelope: OrdersEnvelope = serde_json::from_str(json).expect("valid feed page");
        assert_eq!(envelope.payload.orders.len(), 1);
        assert_eq!(
            envelope.payload.orders[0].amazon_order_id,
            "111-2223334-5556667"
        );
        assert_eq!(envelope.payload.next_token.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_orders_envelope_tolerates_missing_optionals() {
        let json = r#"{
            "payload": {
                "Orders": [{
                    "AmazonOrderId": "111-0000000-0000000",
                    "OrderStatus": "Pending",
                    "PurchaseDate": "2026-08-27T14:30:00Z"
                }]
            }
        }"#;
        let envelope: OrdersEnvelope = serde_json::from_str(json).expect("valid feed page");
        assert!(envelope.payload.orders[0].latest_ship_date.is_none());
        assert!(envelope.payload.next_token.is_none());
    }

    #[test]
    fn test_item_money_parses_string_amount() {
        let json = r#"{
            "payload": {
                "OrderItems": [{
                    "ASIN": "B000TEST01",
                    "SellerSKU": "SKU-1",
                    "Title": "Widget",
                    "ItemPrice": {"Amount": "49.99", "CurrencyCode": "USD"},
                    "QuantityOrdered": 2
                }]
            }
        }"#;
        let envelope: ItemsEnvelope = serde_json::from_str(json).expect("valid items page");
        let item = &envelope.payload.order_items[0];
        assert_eq!(item.item_price.as_ref().map(|p| p.amount), Some(dec("49.99")));
        assert_eq!(item.quantity_ordered, 2);
    }

    #[test]
    fn test_fees_body_serializes_expected_shape() {
        let body = FeesEstimateBody::new("ATVPDKIKX0DER", "B000TEST01", dec("49.99"));
        let json = serde_json::to_value(&body).expect("serializable");
        assert_eq!(
            json["FeesEstimateRequest"]["PriceToEstimateFees"]["ListingPrice"]["Amount"],
            "49.99"
        );
        assert_eq!(json["FeesEstimateRequest"]["IdType"], "ASIN");
        assert_eq!(json["FeesEstimateRequest"]["IsAmazonFulfilled"], false);
    }

    #[test]
    fn test_fees_envelope_total_fee_path() {
        let json = r#"{
            "payload": {
                "FeesEstimateResult": {
                    "FeesEstimate": {
                        "TotalFeesEstimate": {"Amount": "7.48", "CurrencyCode": "USD"}
                    }
                }
            }
        }"#;
        let envelope: FeesEnvelope = serde_json::from_str(json).expect("valid fees response");
        assert_eq!(envelope.total_fee(), Some(dec("7.48")));
    }

    #[test]
    fn test_fees_envelope_missing_estimate_is_none() {
        let json = r#"{"payload": {"FeesEstimateResult": {}}}"#;
        let envelope: FeesEnvelope = serde_json::from_str(json).expect("valid fees response");
        assert_eq!(envelope.total_fee(), None);
    }
}
