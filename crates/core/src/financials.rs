//! Profit, margin and ROI for a single order line.
//!
//! The dashboard, the order-edit path and the sync pipeline all persist or
//! display these numbers; they must come from this one place so every call
//! site agrees.
//!
//! All monetary fields are totals for the line except `supplier_price` and
//! `supplier_tax`, which are unit prices and are multiplied by quantity.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Monetary inputs for one order line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FinancialInputs {
    /// Marketplace sale price, total for the line.
    pub amazon_price: Decimal,
    /// Marketplace fee, total for the line.
    pub amazon_fee: Decimal,
    /// Supplier price per unit.
    pub supplier_price: Decimal,
    /// Supplier tax per unit.
    pub supplier_tax: Decimal,
    /// Supplier shipping, total for the line.
    pub supplier_shipping: Decimal,
    /// Customer-facing shipping, total for the line.
    pub customer_shipping: Decimal,
    /// Units sold; values below 1 are treated as 1.
    pub quantity: i32,
}

/// Derived metrics, persisted on the order row for read efficiency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FinancialMetrics {
    pub profit: Decimal,
    /// Percentage of revenue kept as profit, rounded to 2 decimals.
    pub margin: Decimal,
    /// Percentage return on total cost, rounded to 2 decimals.
    pub roi: Decimal,
}

impl FinancialMetrics {
    /// All-zero metrics, reported for orders that bypass the calculator
    /// (canceled/refunded lines).
    pub const ZERO: Self = Self {
        profit: Decimal::ZERO,
        margin: Decimal::ZERO,
        roi: Decimal::ZERO,
    };
}

impl FinancialInputs {
    /// Compute profit, margin and ROI.
    ///
    /// Division by zero is guarded to `0` - the result never contains
    /// `NaN`-like values regardless of input.
    #[must_use]
    pub fn metrics(&self) -> FinancialMetrics {
        let quantity = Decimal::from(self.quantity.max(1));
        let hundred = Decimal::ONE_HUNDRED;

        let total_revenue = self.amazon_price - self.amazon_fee;
        let total_cost = self.supplier_price * quantity
            + self.supplier_tax * quantity
            + self.supplier_shipping
            + self.customer_shipping;
        let profit = total_revenue - total_cost;

        let margin = if total_revenue > Decimal::ZERO {
            (profit / total_revenue * hundred).round_dp(2)
        } else {
            Decimal::ZERO
        };
        let roi = if total_cost > Decimal::ZERO {
            (profit / total_cost * hundred).round_dp(2)
        } else {
            Decimal::ZERO
        };

        FinancialMetrics {
            profit: profit.round_dp(2),
            margin,
            roi,
        }
    }
}
