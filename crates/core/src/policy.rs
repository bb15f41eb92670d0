//! Status-transition policy applied by the sync pipeline.
//!
//! The marketplace feed is eventually consistent and can reorder status
//! updates, while operators correct statuses by hand through the console.
//! The sync job therefore auto-applies only a narrow transition subset and
//! logs everything else without writing it.

use crate::types::OrderStatus;

/// Outcome of the transition policy for one observed status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Write the incoming status to the store.
    pub apply: bool,
    /// Force `amazon_price` and `amazon_fee` to zero on that write.
    pub zero_revenue: bool,
}

impl Decision {
    /// Decision that leaves the stored order untouched.
    pub const SKIP: Self = Self {
        apply: false,
        zero_revenue: false,
    };
}

/// Decide whether the sync job may apply an observed status change.
///
/// Only `pending -> unshipped` and `pending -> canceled` are auto-applied;
/// any other pair is skipped so manual corrections are never clobbered.
#[must_use]
pub const fn decide(existing: OrderStatus, incoming: OrderStatus) -> Decision {
    match (existing, incoming) {
        (OrderStatus::Pending, OrderStatus::Unshipped) => Decision {
            apply: true,
            zero_revenue: false,
        },
        (OrderStatus::Pending, OrderStatus::Canceled) => Decision {
            apply: true,
            zero_revenue: true,
        },
        _ => Decision::SKIP,
    }
}
