//! Fulfillment channel reported by the marketplace order feed.

use serde::{Deserialize, Serialize};

/// Who ships the order.
///
/// Only merchant-fulfilled orders are ingested by the sync pipeline;
/// marketplace-fulfilled orders are out of scope for this reseller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentChannel {
    /// Shipped by the seller directly ("MFN" in the feed).
    Merchant,
    /// Fulfilled by the marketplace's own warehouses ("AFN" in the feed).
    Marketplace,
}

impl FulfillmentChannel {
    /// Map the feed's channel code. Unknown codes are treated as
    /// marketplace-fulfilled so the insert path skips them.
    #[must_use]
    pub fn from_feed(code: &str) -> Self {
        if code == "MFN" {
            Self::Merchant
        } else {
            Self::Marketplace
        }
    }

    /// The channel code stored alongside the order row.
    #[must_use]
    pub const fn as_feed_code(self) -> &'static str {
        match self {
            Self::Merchant => "MFN",
            Self::Marketplace => "AFN",
        }
    }
}
