//! Transfer records and their construction from fulfillments.
//!
//! ## Shape
//!
//! A [`Transfer`] moves coins from its inputs to its outputs and always
//! balances: the inputs sum to exactly the outputs. Each finalized fulfillment
//! produces two of them.
//!
//! | fulfillment | asset transfer            | price transfer            |
//! |-------------|---------------------------|---------------------------|
//! | ask         | seller -> each buyer      | each buyer -> seller      |
//! | bid         | each seller -> buyer      | buyer -> each seller      |

use serde::{Deserialize, Serialize};

use crate::error::{Result, SettlementError};
use crate::fulfillment::OrderFulfillment;
use crate::settlement::indexed::IndexedAddrAmts;
use crate::types::{Coin, Coins, OrderType};

// ============================================================================
// Records
// ============================================================================

/// An address together with the coins it sends or receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddrCoins {
    pub address: String,
    pub coins: Coins,
}

impl AddrCoins {
    pub fn new(address: impl Into<String>, coins: Coins) -> Self {
        Self {
            address: address.into(),
            coins,
        }
    }
}

/// Coins leaving an address.
pub type Input = AddrCoins;

/// Coins arriving at an address.
pub type Output = AddrCoins;

/// A balanced multi-party movement of coins.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Transfer {
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
}

impl Transfer {
    /// Sum of all inputs.
    pub fn input_total(&self) -> Result<Coins> {
        sum(&self.inputs)
    }

    /// Sum of all outputs.
    pub fn output_total(&self) -> Result<Coins> {
        sum(&self.outputs)
    }

    pub fn is_balanced(&self) -> Result<bool> {
        Ok(self.input_total()? == self.output_total()?)
    }
}

fn sum(entries: &[AddrCoins]) -> Result<Coins> {
    entries
        .iter()
        .try_fold(Coins::new(), |acc, entry| acc.checked_add(&entry.coins))
}

/// Everything one settlement pass moves.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SettlementTransfers {
    /// Two transfers per fulfillment: assets first, then price.
    pub order_transfers: Vec<Transfer>,
    /// Fees owed, one entry per owner.
    pub fee_inputs: Vec<Input>,
}

impl SettlementTransfers {
    pub fn is_empty(&self) -> bool {
        self.order_transfers.is_empty() && self.fee_inputs.is_empty()
    }

    /// Sum of every fee input.
    pub fn total_fees(&self) -> Result<Coins> {
        sum(&self.fee_inputs)
    }
}

// ============================================================================
// Construction
// ============================================================================

/// The transfer moving the filled assets between the order's owner and its counterparties.
pub fn get_asset_transfer(f: &OrderFulfillment) -> Result<Transfer> {
    let denom = &f.order().assets().denom;
    if f.assets_filled() <= 0 {
        return Err(SettlementError::AssetsFilledNotPositive {
            order_type: f.order_type(),
            order_id: f.order_id(),
            amount: f.assets_filled(),
            denom: denom.clone(),
        });
    }

    let mut counterparties = IndexedAddrAmts::new();
    for split in f.splits() {
        counterparties.add_coin(split.counter_order.owner(), &split.assets)?;
    }

    let own = AddrCoins::new(
        f.owner(),
        Coins::from_coin(Coin::new(denom.clone(), f.assets_filled().unsigned_abs())),
    );
    Ok(match f.order_type() {
        OrderType::Ask => Transfer {
            inputs: vec![own],
            outputs: counterparties.get_as_outputs()?,
        },
        OrderType::Bid => Transfer {
            inputs: counterparties.get_as_inputs()?,
            outputs: vec![own],
        },
    })
}

/// The transfer moving the applied price between the order's owner and its counterparties.
pub fn get_price_transfer(f: &OrderFulfillment) -> Result<Transfer> {
    let denom = &f.order().price().denom;
    if f.price_applied() <= 0 {
        return Err(SettlementError::PriceAppliedNotPositive {
            order_type: f.order_type(),
            order_id: f.order_id(),
            amount: f.price_applied(),
            denom: denom.clone(),
        });
    }

    let mut counterparties = IndexedAddrAmts::new();
    for split in f.splits() {
        counterparties.add_coin(split.counter_order.owner(), &split.price)?;
    }

    let own = AddrCoins::new(
        f.owner(),
        Coins::from_coin(Coin::new(denom.clone(), f.price_applied().unsigned_abs())),
    );
    Ok(match f.order_type() {
        OrderType::Ask => Transfer {
            inputs: counterparties.get_as_inputs()?,
            outputs: vec![own],
        },
        OrderType::Bid => Transfer {
            inputs: vec![own],
            outputs: counterparties.get_as_outputs()?,
        },
    })
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fulfillment::OrderSplit;
    use crate::types::{AskOrder, BidOrder, Order};

    fn ask(order_id: u64, seller: &str, assets: u128, price: u128) -> Order {
        Order::new_ask(
            order_id,
            AskOrder {
                market_id: 1,
                seller: seller.to_string(),
                assets: Coin::new("apple", assets),
                price: Coin::new("peach", price),
                allow_partial: true,
                ..Default::default()
            },
        )
    }

    fn bid(order_id: u64, buyer: &str, assets: u128, price: u128) -> Order {
        Order::new_bid(
            order_id,
            BidOrder {
                market_id: 1,
                buyer: buyer.to_string(),
                assets: Coin::new("apple", assets),
                price: Coin::new("peach", price),
                allow_partial: true,
                ..Default::default()
            },
        )
    }

    fn addr_coins(address: &str, coin: (&str, u128)) -> AddrCoins {
        AddrCoins::new(address, Coins::from_coin(Coin::new(coin.0, coin.1)))
    }

    #[test]
    fn test_ask_transfers_merge_repeat_counterparty() {
        let mut f = OrderFulfillment::new(ask(1, "seller", 10, 10)).unwrap();
        f.add_split(&bid(2, "buyerA", 3, 3), 3).unwrap();
        f.add_split(&bid(3, "buyerB", 4, 4), 4).unwrap();
        f.add_split(&bid(4, "buyerA", 3, 3), 3).unwrap();

        let assets = get_asset_transfer(&f).unwrap();
        assert_eq!(assets.inputs, vec![addr_coins("seller", ("apple", 10))]);
        assert_eq!(
            assets.outputs,
            vec![addr_coins("buyerA", ("apple", 6)), addr_coins("buyerB", ("apple", 4))]
        );
        assert!(assets.is_balanced().unwrap());

        let price = get_price_transfer(&f).unwrap();
        assert_eq!(
            price.inputs,
            vec![addr_coins("buyerA", ("peach", 6)), addr_coins("buyerB", ("peach", 4))]
        );
        assert_eq!(price.outputs, vec![addr_coins("seller", ("peach", 10))]);
        assert!(price.is_balanced().unwrap());
    }

    #[test]
    fn test_bid_transfers_flip_direction() {
        let mut f = OrderFulfillment::new(bid(1, "buyer", 10, 20)).unwrap();
        f.add_split(&ask(2, "sellerA", 6, 12), 6).unwrap();
        f.add_split(&ask(3, "sellerB", 4, 8), 4).unwrap();

        let assets = get_asset_transfer(&f).unwrap();
        assert_eq!(
            assets.inputs,
            vec![addr_coins("sellerA", ("apple", 6)), addr_coins("sellerB", ("apple", 4))]
        );
        assert_eq!(assets.outputs, vec![addr_coins("buyer", ("apple", 10))]);

        let price = get_price_transfer(&f).unwrap();
        assert_eq!(price.inputs, vec![addr_coins("buyer", ("peach", 20))]);
        assert_eq!(
            price.outputs,
            vec![addr_coins("sellerA", ("peach", 12)), addr_coins("sellerB", ("peach", 8))]
        );
    }

    #[test]
    fn test_asset_transfer_not_positive() {
        let mut f = OrderFulfillment::new(ask(18, "seller", 10, 10)).unwrap();
        f.assets_filled_amt = -1;
        let err = get_asset_transfer(&f).unwrap_err();
        assert!(err.is_internal());
        assert_eq!(
            err.to_string(),
            "ask order 18 cannot be filled with \"-1apple\" assets: amount not positive"
        );

        f.assets_filled_amt = 0;
        assert!(get_asset_transfer(&f).is_err());
    }

    #[test]
    fn test_price_transfer_not_positive() {
        let mut f = OrderFulfillment::new(bid(12, "buyer", 10, 10)).unwrap();
        f.price_applied_amt = 0;
        let err = get_price_transfer(&f).unwrap_err();
        assert!(err.is_internal());
        assert_eq!(
            err.to_string(),
            "bid order 12 cannot be filled at price \"0peach\": amount not positive"
        );
    }

    #[test]
    fn test_zero_price_split_is_internal_error() {
        // add_split never records a zero price, so plant one directly.
        let mut f = OrderFulfillment::new(ask(1, "seller", 10, 1)).unwrap();
        f.add_split(&bid(2, "buyerA", 10, 10), 9).unwrap();
        f.splits.push(OrderSplit {
            counter_order: bid(3, "buyerB", 10, 1),
            assets: Coin::new("apple", 1),
            price: Coin::new("peach", 0),
        });
        let err = get_price_transfer(&f).unwrap_err();
        assert!(matches!(err, SettlementError::AddrAmountNotPositive { ref address, .. } if address == "buyerB"));
    }

    #[test]
    fn test_transfer_totals() {
        let transfer = Transfer {
            inputs: vec![addr_coins("a", ("apple", 3)), addr_coins("b", ("apple", 2))],
            outputs: vec![addr_coins("c", ("apple", 4))],
        };
        assert_eq!(transfer.input_total().unwrap().to_string(), "5apple");
        assert!(!transfer.is_balanced().unwrap());
    }
}
