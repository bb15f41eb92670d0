//! Order status for the reseller's order lifecycle.
//!
//! The full label set is owned by the console UI; the sync pipeline only
//! distinguishes the subset involved in its transition policy and the
//! zero-revenue rule, but the enum is closed so the compiler enforces
//! exhaustive handling wherever statuses are matched.

use serde::{Deserialize, Serialize};

/// Status of an order as stored in the `orders` table.
///
/// Stored and serialized in snake_case. The marketplace feed reports a
/// different (PascalCase) label set; see [`OrderStatus::from_marketplace`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Ordered,
    Unshipped,
    Shipped,
    Canceled,
    Refunded,
    ActionRequired,
    FulfillmentError,
    LateShip,
    Oos,
    PhysicalStock,
    ToInventory,
    RequestedReturn,
    Replacement,
    Store,
    FakeShip,
    PickUp,
}

impl OrderStatus {
    /// Map a status label from the marketplace order feed.
    ///
    /// The feed uses PascalCase labels and carries statuses this system does
    /// not track (e.g. `PendingAvailability`); those return `None` and the
    /// caller decides how loudly to report them.
    #[must_use]
    pub fn from_marketplace(label: &str) -> Option<Self> {
        match label {
            "Pending" => Some(Self::Pending),
            "Unshipped" | "PartiallyShipped" => Some(Self::Unshipped),
            "Shipped" => Some(Self::Shipped),
            "Canceled" => Some(Self::Canceled),
            "Refunded" => Some(Self::Refunded),
            _ => None,
        }
    }

    /// Whether this status must never contribute to revenue aggregates.
    ///
    /// For these statuses `amazon_price` and `amazon_fee` are forced to zero
    /// on every pipeline write.
    #[must_use]
    pub const fn is_zero_revenue(self) -> bool {
        matches!(self, Self::Canceled | Self::Refunded)
    }

    /// The snake_case label stored in the database.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Ordered => "ordered",
            Self::Unshipped => "unshipped",
            Self::Shipped => "shipped",
            Self::Canceled => "canceled",
            Self::Refunded => "refunded",
            Self::ActionRequired => "action_required",
            Self::FulfillmentError => "fulfillment_error",
            Self::LateShip => "late_ship",
            Self::Oos => "oos",
            Self::PhysicalStock => "physical_stock",
            Self::ToInventory => "to_inventory",
            Self::RequestedReturn => "requested_return",
            Self::Replacement => "replacement",
            Self::Store => "store",
            Self::FakeShip => "fake_ship",
            Self::PickUp => "pick_up",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "ordered" => Ok(Self::Ordered),
            "unshipped" => Ok(Self::Unshipped),
            "shipped" => Ok(Self::Shipped),
            "canceled" => Ok(Self::Canceled),
            "refunded" => Ok(Self::Refunded),
            "action_required" => Ok(Self::ActionRequired),
            "fulfillment_error" => Ok(Self::FulfillmentError),
            "late_ship" => Ok(Self::LateShip),
            "oos" => Ok(Self::Oos),
            "physical_stock" => Ok(Self::PhysicalStock),
            "to_inventory" => Ok(Self::ToInventory),
            "requested_return" => Ok(Self::RequestedReturn),
            "replacement" => Ok(Self::Replacement),
            "store" => Ok(Self::Store),
            "fake_ship" => Ok(Self::FakeShip),
            "pick_up" => Ok(Self::PickUp),
            _ => Err(format!("invalid order status: {s}")),
        }
    }
}
