//! Core data types for exchange settlement
//!
//! Amounts are unsigned 128-bit integers. No floating point anywhere.
//!
//! ## Types
//!
//! - [`Coin`] / [`Coins`]: single-denom amounts and denom-sorted sets of them
//! - [`Order`]: an ask or bid order with its id
//! - [`FeeRatio`]: a market's price-to-fee ratio
//! - [`SettlementReceipt`]: SSZ commitment to a built settlement

mod coin;
mod fee_ratio;
pub(crate) mod order;
mod receipt;

// Re-export all types at module level
pub use coin::{Amount, Coin, Coins};
pub use fee_ratio::{validate_buyer_fee_ratios, validate_fee_ratios, validate_seller_fee_ratios, FeeRatio};
pub use order::{validate_order_ids, AskOrder, BidOrder, Order, OrderType, SubOrder, MAX_EXTERNAL_ID_LENGTH};
pub use receipt::SettlementReceipt;
