//! Order types for the settlement engine.
//!
//! ## Variants
//!
//! An [`Order`] is an id plus exactly one [`SubOrder`]: an [`AskOrder`] (sell side)
//! or a [`BidOrder`] (buy side). The set of variants is closed, so every consumer
//! matches on it exhaustively.
//!
//! ## Splitting
//!
//! [`Order::split`] partitions an order into a filled and an unfilled order at an
//! exact assets amount. Price and fees are prorated and must divide evenly; a
//! remainder is an error, never a silent truncation.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SettlementError};
use crate::types::{Amount, Coin, Coins};

/// Maximum length of an order's external id.
pub const MAX_EXTERNAL_ID_LENGTH: usize = 100;

// ============================================================================
// OrderType enum
// ============================================================================

/// Order type: Ask (sell) or Bid (buy)
///
/// Represented as a byte for encoding:
/// - Ask = 0x00
/// - Bid = 0x01
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Ask,
    Bid,
}

impl OrderType {
    /// Convert to the type byte
    pub fn to_byte(self) -> u8 {
        match self {
            OrderType::Ask => 0x00,
            OrderType::Bid => 0x01,
        }
    }

    /// Convert from the type byte
    pub fn from_byte(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(OrderType::Ask),
            0x01 => Some(OrderType::Bid),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderType::Ask => "ask",
            OrderType::Bid => "bid",
        }
    }

    /// Returns the opposite type
    pub fn opposite(self) -> Self {
        match self {
            OrderType::Ask => OrderType::Bid,
            OrderType::Bid => OrderType::Ask,
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Sub-orders
// ============================================================================

/// Sell side: the seller offers `assets` for at least `price`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AskOrder {
    pub market_id: u32,
    pub seller: String,
    pub assets: Coin,
    /// Minimum acceptable price for all of `assets`.
    pub price: Coin,
    pub seller_settlement_flat_fee: Option<Coin>,
    pub allow_partial: bool,
    #[serde(default)]
    pub external_id: String,
}

/// Buy side: the buyer wants `assets` and offers `price` for them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BidOrder {
    pub market_id: u32,
    pub buyer: String,
    pub assets: Coin,
    pub price: Coin,
    #[serde(default)]
    pub buyer_settlement_fees: Coins,
    pub allow_partial: bool,
    #[serde(default)]
    pub external_id: String,
}

impl AskOrder {
    /// Funds escrowed for this ask: the assets, plus the flat fee unless it is
    /// paid in the price denom (then it comes out of the proceeds).
    pub fn hold_amount(&self) -> Result<Coins> {
        let mut rv = Coins::from_coin(self.assets.clone());
        if let Some(fee) = &self.seller_settlement_flat_fee {
            if fee.denom != self.price.denom {
                rv.add_coin(fee)?;
            }
        }
        Ok(rv)
    }
}

impl BidOrder {
    /// Funds escrowed for this bid: the price plus all settlement fees.
    pub fn hold_amount(&self) -> Result<Coins> {
        let mut rv = self.buyer_settlement_fees.clone();
        rv.add_coin(&self.price)?;
        Ok(rv)
    }
}

/// One of the two order variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubOrder {
    Ask(AskOrder),
    Bid(BidOrder),
}

// ============================================================================
// Order
// ============================================================================

/// An order with its id.
///
/// ## Example
///
/// ```
/// use exchange_settlement::types::{AskOrder, Coin, Order, OrderType};
///
/// let order = Order::new_ask(1, AskOrder {
///     market_id: 1,
///     seller: "seller1".to_string(),
///     assets: Coin::new("apple", 100),
///     price: Coin::new("plum", 10),
///     allow_partial: true,
///     ..Default::default()
/// });
/// assert_eq!(order.order_type(), OrderType::Ask);
///
/// let (filled, unfilled) = order.split(30).unwrap();
/// assert_eq!(filled.price(), &Coin::new("plum", 3));
/// assert_eq!(unfilled.assets(), &Coin::new("apple", 70));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: u64,
    pub sub_order: SubOrder,
}

impl Order {
    pub fn new_ask(order_id: u64, ask: AskOrder) -> Self {
        Self {
            order_id,
            sub_order: SubOrder::Ask(ask),
        }
    }

    pub fn new_bid(order_id: u64, bid: BidOrder) -> Self {
        Self {
            order_id,
            sub_order: SubOrder::Bid(bid),
        }
    }

    pub fn order_type(&self) -> OrderType {
        match &self.sub_order {
            SubOrder::Ask(_) => OrderType::Ask,
            SubOrder::Bid(_) => OrderType::Bid,
        }
    }

    pub fn is_ask(&self) -> bool {
        matches!(self.sub_order, SubOrder::Ask(_))
    }

    pub fn is_bid(&self) -> bool {
        matches!(self.sub_order, SubOrder::Bid(_))
    }

    pub fn as_ask(&self) -> Option<&AskOrder> {
        match &self.sub_order {
            SubOrder::Ask(ask) => Some(ask),
            SubOrder::Bid(_) => None,
        }
    }

    pub fn as_bid(&self) -> Option<&BidOrder> {
        match &self.sub_order {
            SubOrder::Bid(bid) => Some(bid),
            SubOrder::Ask(_) => None,
        }
    }

    pub fn market_id(&self) -> u32 {
        match &self.sub_order {
            SubOrder::Ask(ask) => ask.market_id,
            SubOrder::Bid(bid) => bid.market_id,
        }
    }

    /// The seller of an ask, the buyer of a bid.
    pub fn owner(&self) -> &str {
        match &self.sub_order {
            SubOrder::Ask(ask) => &ask.seller,
            SubOrder::Bid(bid) => &bid.buyer,
        }
    }

    pub fn assets(&self) -> &Coin {
        match &self.sub_order {
            SubOrder::Ask(ask) => &ask.assets,
            SubOrder::Bid(bid) => &bid.assets,
        }
    }

    pub fn price(&self) -> &Coin {
        match &self.sub_order {
            SubOrder::Ask(ask) => &ask.price,
            SubOrder::Bid(bid) => &bid.price,
        }
    }

    /// Settlement fees the owner agreed to: the flat fee of an ask, or the bid's fees.
    pub fn settlement_fees(&self) -> Coins {
        match &self.sub_order {
            SubOrder::Ask(ask) => ask
                .seller_settlement_flat_fee
                .clone()
                .map(Coins::from_coin)
                .unwrap_or_default(),
            SubOrder::Bid(bid) => bid.buyer_settlement_fees.clone(),
        }
    }

    pub fn allow_partial(&self) -> bool {
        match &self.sub_order {
            SubOrder::Ask(ask) => ask.allow_partial,
            SubOrder::Bid(bid) => bid.allow_partial,
        }
    }

    pub fn external_id(&self) -> &str {
        match &self.sub_order {
            SubOrder::Ask(ask) => &ask.external_id,
            SubOrder::Bid(bid) => &bid.external_id,
        }
    }

    /// Funds that must stay escrowed while this order is open.
    pub fn hold_amount(&self) -> Result<Coins> {
        match &self.sub_order {
            SubOrder::Ask(ask) => ask.hold_amount(),
            SubOrder::Bid(bid) => bid.hold_amount(),
        }
    }

    /// Check the order's own fields.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| SettlementError::InvalidOrder {
            order_id: self.order_id,
            reason,
        };

        if self.order_id == 0 {
            return Err(invalid("order id must not be zero".to_string()));
        }
        if self.market_id() == 0 {
            return Err(invalid("market id must not be zero".to_string()));
        }
        if self.owner().is_empty() {
            let field = match self.order_type() {
                OrderType::Ask => "seller",
                OrderType::Bid => "buyer",
            };
            return Err(invalid(format!("{} must not be empty", field)));
        }

        let (assets, price) = (self.assets(), self.price());
        if price.denom.is_empty() || !price.is_positive() {
            return Err(invalid(format!("price \"{}\" must be positive", price)));
        }
        if assets.denom.is_empty() || !assets.is_positive() {
            return Err(invalid(format!("assets \"{}\" must be positive", assets)));
        }
        if assets.denom == price.denom {
            return Err(invalid(format!(
                "assets cannot contain price denom {}",
                price.denom
            )));
        }

        if let SubOrder::Ask(ask) = &self.sub_order {
            if let Some(fee) = &ask.seller_settlement_flat_fee {
                if !fee.is_positive() {
                    return Err(invalid(format!(
                        "seller settlement flat fee: {} amount cannot be zero",
                        fee.denom
                    )));
                }
            }
        }

        let external_id = self.external_id();
        if external_id.len() > MAX_EXTERNAL_ID_LENGTH {
            return Err(invalid(format!(
                "external id {:?}: max length {}",
                external_id, MAX_EXTERNAL_ID_LENGTH
            )));
        }
        Ok(())
    }

    /// Split this order into a filled order and an unfilled order.
    ///
    /// # Arguments
    ///
    /// * `assets_filled_amt` - Assets amount of the filled part; must be strictly
    ///   between zero and the order's assets amount.
    ///
    /// # Returns
    ///
    /// `(filled, unfilled)`, both keeping this order's id, owner, market, flags and
    /// external id. Assets, price and every fee coin add up to this order's.
    pub fn split(&self, assets_filled_amt: Amount) -> Result<(Order, Order)> {
        let order_type = self.order_type();
        let order_id = self.order_id;
        let assets = self.assets().clone();
        let filled = Coin::new(assets.denom.clone(), assets_filled_amt);

        if assets_filled_amt == 0 {
            return Err(SettlementError::SplitNotPositive {
                order_type,
                order_id,
                assets,
                filled,
            });
        }
        if assets_filled_amt == assets.amount {
            return Err(SettlementError::SplitEqualsOrder {
                order_type,
                order_id,
                assets,
                filled,
            });
        }
        if assets_filled_amt > assets.amount {
            return Err(SettlementError::SplitOverfilled {
                order_type,
                order_id,
                assets,
                filled,
            });
        }
        if !self.allow_partial() {
            return Err(SettlementError::PartialNotAllowed {
                order_type,
                order_id,
                assets,
                filled,
            });
        }

        let price = self.price().clone();
        let price_filled_amt = match prorate_exact(price.amount, assets_filled_amt, assets.amount)? {
            Some(amt) => amt,
            None => {
                return Err(SettlementError::PriceNotDivisible {
                    order_type,
                    order_id,
                    assets,
                    filled,
                    price,
                })
            }
        };

        let mut fees_filled = Coins::new();
        let mut fees_unfilled = Coins::new();
        for fee in self.settlement_fees().iter() {
            let fee_filled_amt = match prorate_exact(fee.amount, assets_filled_amt, assets.amount)? {
                Some(amt) => amt,
                None => {
                    return Err(SettlementError::FeeNotDivisible {
                        order_type,
                        order_id,
                        assets,
                        filled,
                        fee,
                    })
                }
            };
            fees_filled.add_coin(&Coin::new(fee.denom.clone(), fee_filled_amt))?;
            fees_unfilled.add_coin(&Coin::new(fee.denom.clone(), fee.amount - fee_filled_amt))?;
        }

        let filled_assets = filled;
        let unfilled_assets = Coin::new(assets.denom.clone(), assets.amount - assets_filled_amt);
        let filled_price = Coin::new(price.denom.clone(), price_filled_amt);
        let unfilled_price = Coin::new(price.denom.clone(), price.amount - price_filled_amt);

        let (filled_sub, unfilled_sub) = match &self.sub_order {
            SubOrder::Ask(ask) => {
                let flat_fee = |fees: &Coins| fees.iter().next();
                let filled_ask = AskOrder {
                    assets: filled_assets,
                    price: filled_price,
                    seller_settlement_flat_fee: flat_fee(&fees_filled),
                    ..ask.clone()
                };
                let unfilled_ask = AskOrder {
                    assets: unfilled_assets,
                    price: unfilled_price,
                    seller_settlement_flat_fee: flat_fee(&fees_unfilled),
                    ..ask.clone()
                };
                (SubOrder::Ask(filled_ask), SubOrder::Ask(unfilled_ask))
            }
            SubOrder::Bid(bid) => {
                let filled_bid = BidOrder {
                    assets: filled_assets,
                    price: filled_price,
                    buyer_settlement_fees: fees_filled,
                    ..bid.clone()
                };
                let unfilled_bid = BidOrder {
                    assets: unfilled_assets,
                    price: unfilled_price,
                    buyer_settlement_fees: fees_unfilled,
                    ..bid.clone()
                };
                (SubOrder::Bid(filled_bid), SubOrder::Bid(unfilled_bid))
            }
        };

        Ok((
            Order {
                order_id,
                sub_order: filled_sub,
            },
            Order {
                order_id,
                sub_order: unfilled_sub,
            },
        ))
    }
}

/// `amount * part / whole` if it is a whole number.
///
/// An overflowing product is an error rather than `None`, so callers don't
/// report it as an uneven division.
pub(crate) fn prorate_exact(amount: Amount, part: Amount, whole: Amount) -> Result<Option<Amount>> {
    let product = amount
        .checked_mul(part)
        .ok_or_else(|| SettlementError::Overflow(format!("{} * {}", amount, part)))?;
    if whole == 0 || product % whole != 0 {
        return Ok(None);
    }
    Ok(Some(product / whole))
}

// ============================================================================
// Order id validation
// ============================================================================

/// Require at least one order id, none of them zero, and no duplicates.
///
/// Duplicates are reported once each, in the order they were first repeated.
pub fn validate_order_ids(field: &str, order_ids: &[u64]) -> Result<()> {
    if order_ids.is_empty() {
        return Err(SettlementError::NoOrderIds {
            field: field.to_string(),
        });
    }
    if order_ids.contains(&0) {
        return Err(SettlementError::ZeroOrderId {
            field: field.to_string(),
        });
    }

    let mut seen = BTreeSet::new();
    let mut dups = Vec::new();
    for order_id in order_ids {
        if !seen.insert(*order_id) && !dups.contains(order_id) {
            dups.push(*order_id);
        }
    }
    if !dups.is_empty() {
        return Err(SettlementError::DuplicateOrderIds {
            field: field.to_string(),
            order_ids: dups,
        });
    }
    Ok(())
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn ask(order_id: u64, assets_amt: Amount, price_amt: Amount, fee: Option<Coin>) -> Order {
        Order::new_ask(
            order_id,
            AskOrder {
                market_id: 55,
                seller: "samuel".to_string(),
                assets: Coin::new("apple", assets_amt),
                price: Coin::new("peach", price_amt),
                seller_settlement_flat_fee: fee,
                allow_partial: true,
                external_id: String::new(),
            },
        )
    }

    fn bid(order_id: u64, assets_amt: Amount, price_amt: Amount, fees: &[Coin]) -> Order {
        Order::new_bid(
            order_id,
            BidOrder {
                market_id: 55,
                buyer: "brian".to_string(),
                assets: Coin::new("apple", assets_amt),
                price: Coin::new("peach", price_amt),
                buyer_settlement_fees: Coins::try_from_coins(fees.iter().cloned()).unwrap(),
                allow_partial: true,
                external_id: String::new(),
            },
        )
    }

    #[test]
    fn test_order_type_conversion() {
        assert_eq!(OrderType::Ask.to_byte(), 0x00);
        assert_eq!(OrderType::Bid.to_byte(), 0x01);
        assert_eq!(OrderType::from_byte(0x01), Some(OrderType::Bid));
        assert_eq!(OrderType::from_byte(0x02), None);
        assert_eq!(OrderType::Ask.opposite(), OrderType::Bid);
        assert_eq!(OrderType::Bid.to_string(), "bid");
    }

    #[test]
    fn test_order_accessors() {
        let order = ask(3, 10, 100, Some(Coin::new("fig", 2)));
        assert!(order.is_ask());
        assert!(!order.is_bid());
        assert_eq!(order.market_id(), 55);
        assert_eq!(order.owner(), "samuel");
        assert_eq!(order.settlement_fees().to_string(), "2fig");

        let order = bid(4, 10, 100, &[Coin::new("fig", 2), Coin::new("grape", 1)]);
        assert_eq!(order.order_type(), OrderType::Bid);
        assert_eq!(order.owner(), "brian");
        assert!(order.as_ask().is_none());
        assert_eq!(order.settlement_fees().to_string(), "2fig,1grape");
    }

    #[test]
    fn test_hold_amount() {
        // Flat fee in another denom is held with the assets
        let order = ask(1, 10, 100, Some(Coin::new("fig", 2)));
        assert_eq!(order.hold_amount().unwrap().to_string(), "10apple,2fig");

        // Flat fee in the price denom comes out of the proceeds
        let order = ask(1, 10, 100, Some(Coin::new("peach", 2)));
        assert_eq!(order.hold_amount().unwrap().to_string(), "10apple");

        let order = bid(2, 10, 100, &[Coin::new("fig", 2), Coin::new("peach", 1)]);
        assert_eq!(order.hold_amount().unwrap().to_string(), "2fig,101peach");
    }

    #[test]
    fn test_validate() {
        assert!(ask(1, 10, 100, None).validate().is_ok());
        assert!(bid(1, 10, 100, &[]).validate().is_ok());

        let err = ask(0, 10, 100, None).validate().unwrap_err();
        assert_eq!(err.to_string(), "invalid order 0: order id must not be zero");

        let err = bid(7, 10, 0, &[]).validate().unwrap_err();
        assert_eq!(err.to_string(), "invalid order 7: price \"0peach\" must be positive");

        let mut order = ask(8, 10, 100, Some(Coin::new("fig", 0)));
        assert!(order.validate().is_err());

        if let SubOrder::Ask(a) = &mut order.sub_order {
            a.seller_settlement_flat_fee = None;
            a.assets = Coin::new("peach", 10);
        }
        let err = order.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid order 8: assets cannot contain price denom peach"
        );

        let mut order = bid(9, 10, 100, &[]);
        if let SubOrder::Bid(b) = &mut order.sub_order {
            b.external_id = "n".repeat(MAX_EXTERNAL_ID_LENGTH + 1);
        }
        assert!(order.validate().is_err());
    }

    #[test]
    fn test_split_errors() {
        let err = ask(9, 10, 100, None).split(0).unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot split ask order 9 having asset \"10apple\" at \"0apple\": amount filled not positive"
        );

        let err = bid(8, 10, 100, &[]).split(10).unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot split bid order 8 having asset \"10apple\" at \"10apple\": amount filled equals order assets"
        );

        let err = ask(5, 10, 100, None).split(11).unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot split ask order 5 having asset \"10apple\" at \"11apple\": overfilled"
        );

        let mut order = bid(2, 2, 10, &[]);
        if let SubOrder::Bid(b) = &mut order.sub_order {
            b.allow_partial = false;
        }
        let err = order.split(1).unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot split bid order 2 having assets \"2apple\" at \"1apple\": order does not allow partial fulfillment"
        );
    }

    #[test]
    fn test_split_not_divisible() {
        let err = ask(11, 70, 501, None).split(7).unwrap_err();
        assert_eq!(
            err.to_string(),
            "ask order 11 having assets \"70apple\" cannot be partially filled by \"7apple\": \
             price \"501peach\" is not evenly divisible"
        );

        let err = ask(13, 70, 500, Some(Coin::new("fig", 23))).split(7).unwrap_err();
        assert_eq!(
            err.to_string(),
            "ask order 13 having assets \"70apple\" cannot be partially filled by \"7apple\": \
             fee \"23fig\" is not evenly divisible"
        );

        let err = bid(14, 70, 500, &[Coin::new("fig", 20), Coin::new("grape", 34)])
            .split(7)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "bid order 14 having assets \"70apple\" cannot be partially filled by \"7apple\": \
             fee \"34grape\" is not evenly divisible"
        );
    }

    #[test]
    fn test_split_overflow_is_not_divisibility() {
        let err = ask(12, 3, u128::MAX, None).split(2).unwrap_err();
        assert!(matches!(err, SettlementError::Overflow(_)));

        let err = ask(13, 3, 30, Some(Coin::new("fig", u128::MAX))).split(2).unwrap_err();
        assert!(matches!(err, SettlementError::Overflow(_)));
    }

    #[test]
    fn test_split_prorates() {
        let (filled, unfilled) = ask(21, 70, 500, None).split(7).unwrap();
        assert_eq!(filled, ask(21, 7, 50, None));
        assert_eq!(unfilled, ask(21, 63, 450, None));

        let (filled, unfilled) = ask(23, 10, 500, Some(Coin::new("fig", 5))).split(8).unwrap();
        assert_eq!(filled, ask(23, 8, 400, Some(Coin::new("fig", 4))));
        assert_eq!(unfilled, ask(23, 2, 100, Some(Coin::new("fig", 1))));

        let fees = [Coin::new("fig", 5), Coin::new("grape", 15)];
        let (filled, unfilled) = bid(24, 10, 500, &fees).split(8).unwrap();
        assert_eq!(filled, bid(24, 8, 400, &[Coin::new("fig", 4), Coin::new("grape", 12)]));
        assert_eq!(unfilled, bid(24, 2, 100, &[Coin::new("fig", 1), Coin::new("grape", 3)]));
    }

    #[test]
    fn test_split_small_flat_fee() {
        // 1fig * 2 / 10 is not whole, so this errors
        assert!(ask(30, 10, 100, Some(Coin::new("fig", 1))).split(2).is_err());
        // 5fig * 2 / 10 = 1fig
        let (filled, unfilled) = ask(30, 10, 100, Some(Coin::new("fig", 5))).split(2).unwrap();
        assert_eq!(filled.settlement_fees().to_string(), "1fig");
        assert_eq!(unfilled.settlement_fees().to_string(), "4fig");
    }

    #[test]
    fn test_split_complementary() {
        let order = bid(40, 100, 10, &[Coin::new("fig", 20)]);
        for n in [10, 20, 30, 50, 90] {
            let (filled, unfilled) = order.split(n).unwrap();
            assert_eq!(filled.assets().amount + unfilled.assets().amount, 100);
            assert_eq!(filled.price().amount + unfilled.price().amount, 10);
            assert_eq!(
                filled.settlement_fees().amount_of("fig") + unfilled.settlement_fees().amount_of("fig"),
                20
            );
        }
        assert_eq!(order.split(30).unwrap().0.price(), &Coin::new("peach", 3));
        assert!(order.split(33).is_err());
    }

    #[test]
    fn test_validate_order_ids() {
        assert!(validate_order_ids("ask", &[1, 2, 3]).is_ok());
        assert_eq!(
            validate_order_ids("ask", &[]).unwrap_err().to_string(),
            "no ask order ids provided"
        );
        assert_eq!(
            validate_order_ids("bid", &[1, 0]).unwrap_err().to_string(),
            "invalid bid order ids: cannot contain order id zero"
        );
        assert_eq!(
            validate_order_ids("bid", &[1, 5, 1, 3, 5, 3, 1]).unwrap_err().to_string(),
            "duplicate bid order ids provided: [1, 5, 3]"
        );
    }
}
