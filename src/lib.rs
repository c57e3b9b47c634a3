//! # Exchange Settlement
//!
//! Order fulfillment and settlement-transfer building for an on-chain limit
//! order exchange.
//!
//! ## Architecture
//!
//! - **Types**: coins, orders, fee ratios, the settlement receipt
//! - **Fulfillment**: per-order split accumulation and finalization
//! - **Settlement**: balanced transfers and per-owner fee inputs for a batch
//!
//! ## Design Principles
//!
//! 1. **Determinism**: identical batches build identical transfers, in identical order
//! 2. **Integer Math**: unsigned 128-bit amounts, truncating division with explicit remainder handling
//! 3. **Errors, not panics**: every failure is a [`SettlementError`] that aborts the batch
//! 4. **Synchronous Execution**: pure computation, no I/O and no shared state
//!
//! ## Flow
//!
//! ```
//! use exchange_settlement::{settle, AskOrder, BidOrder, Coin, Order, OrderFulfillment, SettlementParams};
//!
//! let ask = Order::new_ask(1, AskOrder {
//!     market_id: 1,
//!     seller: "seller".into(),
//!     assets: Coin::new("apple", 10),
//!     price: Coin::new("peach", 10),
//!     ..Default::default()
//! });
//! let bid = Order::new_bid(2, BidOrder {
//!     market_id: 1,
//!     buyer: "buyer".into(),
//!     assets: Coin::new("apple", 10),
//!     price: Coin::new("peach", 12),
//!     ..Default::default()
//! });
//!
//! let mut fulfillment = OrderFulfillment::new(ask).unwrap();
//! fulfillment.add_split(&bid, 10).unwrap();
//! let mut asks = vec![fulfillment];
//! let transfers = settle(&mut asks, &mut [], &SettlementParams::new(1)).unwrap();
//! assert_eq!(transfers.order_transfers.len(), 2);
//! ```

// ============================================================================
// Module declarations
// ============================================================================

/// Market settlement parameters
pub mod config;

/// Error type and result alias
pub mod error;

/// Core data types: Coin, Order, FeeRatio, SettlementReceipt
pub mod types;

/// Per-order fulfillment tracking
pub mod fulfillment;

/// Transfer building for a batch of fulfillments
pub mod settlement;

// ============================================================================
// Re-exports for convenience
// ============================================================================

pub use config::SettlementParams;
pub use error::{Result, SettlementError};
pub use fulfillment::{OrderFulfillment, OrderSplit};
pub use settlement::{build_settlement_transfers, finalize_fulfillments, settle, SettlementTransfers, Transfer};
pub use types::{AskOrder, BidOrder, Coin, Coins, FeeRatio, Order, OrderType, SettlementReceipt};
