//! Settlement transfer building
//!
//! Turns finalized fulfillments into balanced transfers plus per-owner fee
//! inputs.
//!
//! - [`IndexedAddrAmts`]: insertion-ordered per-address accumulator
//! - [`Transfer`] / [`SettlementTransfers`]: the built output
//! - [`build_settlement_transfers`]: the batch builder
//! - [`settle`]: finalize then build, in one call

mod builder;
mod indexed;
mod transfer;

pub use builder::{build_settlement_transfers, finalize_fulfillments, settle};
pub use indexed::IndexedAddrAmts;
pub use transfer::{get_asset_transfer, get_price_transfer, AddrCoins, Input, Output, SettlementTransfers, Transfer};
