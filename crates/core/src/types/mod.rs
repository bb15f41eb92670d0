//! Newtype wrappers and enums shared across Orderdeck components.

mod channel;
mod status;

pub use channel::FulfillmentChannel;
pub use status::OrderStatus;
