//! Error type for the settlement engine.
//!
//! ## Error Classes
//!
//! Every failure is a [`SettlementError`]. Two classes exist:
//!
//! - **Validation**: the pairing, split or batch being described is invalid.
//!   The caller should not commit it. Nothing already built is modified.
//! - **Internal**: a state that correct matching can never produce reached the
//!   engine (see [`SettlementError::is_internal`]).
//!
//! Either class aborts the whole settlement build. This is pure deterministic
//! computation, so retrying reproduces the same error.

use thiserror::Error;

use crate::types::{Amount, Coin, FeeRatio, OrderType};

/// Settlement engine errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SettlementError {
    // ------------------------------------------------------------------------
    // Pairing (AddSplit) validation
    // ------------------------------------------------------------------------
    /// A split was attempted against an order of the same type.
    #[error("cannot fill {order_type} order {order_id} with {counter_type} order {counter_id}")]
    OrderTypeMismatch {
        order_type: OrderType,
        order_id: u64,
        counter_type: OrderType,
        counter_id: u64,
    },

    /// The fulfillment no longer accepts splits.
    #[error("cannot fill {order_type} order {order_id} with {counter_type} order {counter_id}: fulfillment is already finalized")]
    AlreadyFinalized {
        order_type: OrderType,
        order_id: u64,
        counter_type: OrderType,
        counter_id: u64,
    },

    #[error("cannot fill ask order {ask_id} having price \"{ask_price}\" with bid order {bid_id} having price \"{bid_price}\": denom mismatch")]
    PriceDenomMismatch {
        ask_id: u64,
        ask_price: Coin,
        bid_id: u64,
        bid_price: Coin,
    },

    #[error("cannot fill ask order {ask_id} having assets \"{ask_assets}\" with bid order {bid_id} having assets \"{bid_assets}\": denom mismatch")]
    AssetsDenomMismatch {
        ask_id: u64,
        ask_assets: Coin,
        bid_id: u64,
        bid_assets: Coin,
    },

    #[error("cannot fill {order_type} order {order_id} with zero assets from {counter_type} order {counter_id}")]
    ZeroAssets {
        order_type: OrderType,
        order_id: u64,
        counter_type: OrderType,
        counter_id: u64,
    },

    #[error("cannot fill {order_type} order {order_id} with assets \"{assets}\" from {counter_type} order {counter_id}: insufficient assets \"{counter_assets}\" in {counter_type} order")]
    InsufficientCounterAssets {
        order_type: OrderType,
        order_id: u64,
        assets: Coin,
        counter_type: OrderType,
        counter_id: u64,
        counter_assets: Coin,
    },

    #[error("cannot fill {order_type} order {order_id} having assets left \"{assets_left}{denom}\" with \"{assets}{denom}\" from {counter_type} order {counter_id}: overfill")]
    Overfill {
        order_type: OrderType,
        order_id: u64,
        assets_left: i128,
        denom: String,
        assets: Amount,
        counter_type: OrderType,
        counter_id: u64,
    },

    #[error("cannot fill bid order {order_id} having price left \"{price_left}{denom}\" with ask order {counter_id} needing \"{price_needed}{denom}\": price left is less than price needed")]
    PriceLeftTooLow {
        order_id: u64,
        price_left: i128,
        denom: String,
        price_needed: Amount,
        counter_id: u64,
    },

    // ------------------------------------------------------------------------
    // Order split validation
    // ------------------------------------------------------------------------
    #[error("cannot split {order_type} order {order_id} having asset \"{assets}\" at \"{filled}\": amount filled not positive")]
    SplitNotPositive {
        order_type: OrderType,
        order_id: u64,
        assets: Coin,
        filled: Coin,
    },

    #[error("cannot split {order_type} order {order_id} having asset \"{assets}\" at \"{filled}\": amount filled equals order assets")]
    SplitEqualsOrder {
        order_type: OrderType,
        order_id: u64,
        assets: Coin,
        filled: Coin,
    },

    #[error("cannot split {order_type} order {order_id} having asset \"{assets}\" at \"{filled}\": overfilled")]
    SplitOverfilled {
        order_type: OrderType,
        order_id: u64,
        assets: Coin,
        filled: Coin,
    },

    #[error("cannot split {order_type} order {order_id} having assets \"{assets}\" at \"{filled}\": order does not allow partial fulfillment")]
    PartialNotAllowed {
        order_type: OrderType,
        order_id: u64,
        assets: Coin,
        filled: Coin,
    },

    #[error("{order_type} order {order_id} having assets \"{assets}\" cannot be partially filled by \"{filled}\": price \"{price}\" is not evenly divisible")]
    PriceNotDivisible {
        order_type: OrderType,
        order_id: u64,
        assets: Coin,
        filled: Coin,
        price: Coin,
    },

    #[error("{order_type} order {order_id} having assets \"{assets}\" cannot be partially filled by \"{filled}\": fee \"{fee}\" is not evenly divisible")]
    FeeNotDivisible {
        order_type: OrderType,
        order_id: u64,
        assets: Coin,
        filled: Coin,
        fee: Coin,
    },

    // ------------------------------------------------------------------------
    // Fee ratios
    // ------------------------------------------------------------------------
    #[error("cannot apply ratio {ratio} to price {price}: incorrect price denom")]
    RatioPriceDenom { ratio: FeeRatio, price: Coin },

    #[error("cannot apply ratio {ratio} to price {price}: division by zero")]
    RatioDivisionByZero { ratio: FeeRatio, price: Coin },

    #[error("cannot apply ratio {ratio} to price {price}: price amount cannot be evenly divided by ratio price")]
    RatioNotEvenlyDivisible { ratio: FeeRatio, price: Coin },

    #[error("invalid fee ratio: {0}")]
    InvalidFeeRatio(String),

    // ------------------------------------------------------------------------
    // Orders, ids and parameters
    // ------------------------------------------------------------------------
    #[error("invalid order {order_id}: {reason}")]
    InvalidOrder { order_id: u64, reason: String },

    #[error("no {field} order ids provided")]
    NoOrderIds { field: String },

    #[error("invalid {field} order ids: cannot contain order id zero")]
    ZeroOrderId { field: String },

    #[error("duplicate {field} order ids provided: {order_ids:?}")]
    DuplicateOrderIds { field: String, order_ids: Vec<u64> },

    #[error("invalid settlement params: {0}")]
    InvalidParams(String),

    // ------------------------------------------------------------------------
    // Finalization
    // ------------------------------------------------------------------------
    #[error("{order_type} order {order_id} not even partially filled")]
    NotFilled { order_type: OrderType, order_id: u64 },

    #[error("{order_type} order {order_id} fulfillment is already finalized")]
    FinalizedTwice { order_type: OrderType, order_id: u64 },

    #[error("ask order {order_id} cannot be filled at \"{price_applied}{denom}\": price received is less than minimum price \"{target}\"")]
    InsufficientPrice {
        order_id: u64,
        price_applied: i128,
        denom: String,
        target: Coin,
    },

    #[error("bid order {order_id} having price \"{target}\" cannot pay \"{price_applied}{denom}\": overfill")]
    BidOverpay {
        order_id: u64,
        price_applied: i128,
        denom: String,
        target: Coin,
    },

    #[error("cannot fill {order_type} order {order_id} with \"{assets}\" from {counter_type} order {counter_id} having price \"{counter_price}\": prorated price is zero")]
    ZeroPriceSplit {
        order_type: OrderType,
        order_id: u64,
        assets: Coin,
        counter_type: OrderType,
        counter_id: u64,
        counter_price: Coin,
    },

    #[error("{counter_type} order {counter_id} having assets \"{counter_assets}\" cannot provide \"{assets}\"")]
    CounterOverfilled {
        counter_type: OrderType,
        counter_id: u64,
        assets: Coin,
        counter_assets: Coin,
    },

    // ------------------------------------------------------------------------
    // Settlement batch validation
    // ------------------------------------------------------------------------
    #[error("{order_type} order {order_id} fulfillment provided with the {expected} fulfillments")]
    MisplacedFulfillment {
        order_type: OrderType,
        order_id: u64,
        expected: OrderType,
    },

    #[error("{order_type} order {order_id} is for market {market_id}, not market {expected}")]
    MarketMismatch {
        order_type: OrderType,
        order_id: u64,
        market_id: u32,
        expected: u32,
    },

    #[error("ask order {ask_id} and bid order {bid_id} are paired in both an ask and a bid fulfillment")]
    PairingSettledTwice { ask_id: u64, bid_id: u64 },

    #[error("amount overflow: {0}")]
    Overflow(String),

    // ------------------------------------------------------------------------
    // Internal consistency
    // ------------------------------------------------------------------------
    #[error("{order_type} order {order_id} cannot be filled with \"{amount}{denom}\" assets: amount not positive")]
    AssetsFilledNotPositive {
        order_type: OrderType,
        order_id: u64,
        amount: i128,
        denom: String,
    },

    #[error("{order_type} order {order_id} cannot be filled at price \"{amount}{denom}\": amount not positive")]
    PriceAppliedNotPositive {
        order_type: OrderType,
        order_id: u64,
        amount: i128,
        denom: String,
    },

    #[error("accumulated amount for {address} is not positive: \"{coins}\"")]
    AddrAmountNotPositive { address: String, coins: String },

    #[error("{order_type} order {order_id} fulfillment was not finalized before settlement")]
    NotFinalized { order_type: OrderType, order_id: u64 },

    #[error("settlement encoding failed: {0}")]
    Encoding(String),
}

impl SettlementError {
    /// True for failures that correct matching can never produce.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            SettlementError::AssetsFilledNotPositive { .. }
                | SettlementError::PriceAppliedNotPositive { .. }
                | SettlementError::AddrAmountNotPositive { .. }
                | SettlementError::NotFinalized { .. }
                | SettlementError::Encoding(_)
        )
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SettlementError>;
