//! Order fulfillment tracking
//!
//! - [`OrderFulfillment`]: one order's splits and running tallies
//! - [`OrderSplit`]: one pairing against a counter-order

pub(crate) mod order_fulfillment;

pub use order_fulfillment::{OrderFulfillment, OrderSplit};
