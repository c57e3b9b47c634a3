//! Per-order fulfillment tracking.
//!
//! ## Lifecycle
//!
//! ```text
//! open (add_split ...) --finalize--> finalized --> settlement builder
//! ```
//!
//! An [`OrderFulfillment`] is created for one order in one settlement pass,
//! accumulates [`OrderSplit`]s against counter-orders, then is finalized once.
//! A finalized fulfillment rejects further splits.
//!
//! ## Tallies
//!
//! The four tallies are signed so that, for every fulfillment,
//! `assets_filled + assets_unfilled == order assets` and
//! `price_applied + price_left == order price` hold even when an ask receives
//! more than its minimum price (its price left then goes negative).
//!
//! ## Remainders
//!
//! Split prices are prorated from the counter-order with truncating division.
//! Finalizing hands the truncated units back so that the total exchanged with
//! each counter-order is exactly
//! `floor(counter_price * assets_taken / counter_assets)`.
//! [`OrderFulfillment::finalize`] does this over one fulfillment's splits;
//! [`crate::finalize_fulfillments`] does it over every split in the batch, so a
//! counter-order consumed by several fulfillments is reconciled as a whole.
//!
//! ## Counter-order fees
//!
//! A counter-order that has no fulfillment of its own still pays its settlement
//! fees, prorated to what was taken from it. Finalize records them in
//! [`OrderFulfillment::counter_fees_to_pay`].

use std::collections::hash_map::{Entry, HashMap};

use tracing::{debug, warn};

use crate::error::{Result, SettlementError};
use crate::settlement::AddrCoins;
use crate::types::{order::prorate_exact, Amount, Coin, Coins, FeeRatio, Order, OrderType};

// ============================================================================
// OrderSplit
// ============================================================================

/// One pairing between the order being fulfilled and a counter-order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSplit {
    /// The counter-order on the other side of this pairing.
    pub counter_order: Order,
    /// Assets exchanged in this pairing.
    pub assets: Coin,
    /// Price exchanged in this pairing.
    pub price: Coin,
}

// ============================================================================
// OrderFulfillment
// ============================================================================

/// Tracks how one order is being filled during a settlement pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderFulfillment {
    pub(crate) order: Order,
    pub(crate) assets_filled_amt: i128,
    pub(crate) assets_unfilled_amt: i128,
    pub(crate) price_applied_amt: i128,
    pub(crate) price_left_amt: i128,
    pub(crate) splits: Vec<OrderSplit>,
    pub(crate) fees_to_pay: Coins,
    pub(crate) counter_fees_to_pay: Vec<AddrCoins>,
    pub(crate) is_finalized: bool,
}

/// What a successful finalize commits.
struct Finalized {
    split_prices: Vec<Amount>,
    distributed: i128,
    fees_to_pay: Coins,
    counter_fees_to_pay: Vec<AddrCoins>,
}

impl OrderFulfillment {
    /// Start tracking an order: nothing filled, nothing applied.
    pub fn new(order: Order) -> Result<Self> {
        let assets_unfilled_amt = to_signed(order.assets())?;
        let price_left_amt = to_signed(order.price())?;
        Ok(Self {
            order,
            assets_filled_amt: 0,
            assets_unfilled_amt,
            price_applied_amt: 0,
            price_left_amt,
            splits: Vec::new(),
            fees_to_pay: Coins::new(),
            counter_fees_to_pay: Vec::new(),
            is_finalized: false,
        })
    }

    /// Pair this order with a counter-order for the given assets amount.
    ///
    /// The price of the split is the counter-order's price prorated to
    /// `assets_amt`, truncated. An ask fulfillment accumulates the price it
    /// receives; a bid fulfillment draws down the price it has left to pay.
    ///
    /// On error this fulfillment is left unchanged.
    pub fn add_split(&mut self, counter: &Order, assets_amt: Amount) -> Result<()> {
        let order_id = self.order.order_id;
        let order_type = self.order.order_type();
        let counter_id = counter.order_id;
        let counter_type = counter.order_type();

        if counter_type == order_type {
            return Err(SettlementError::OrderTypeMismatch {
                order_type,
                order_id,
                counter_type,
                counter_id,
            });
        }
        if self.is_finalized {
            return Err(SettlementError::AlreadyFinalized {
                order_type,
                order_id,
                counter_type,
                counter_id,
            });
        }

        let (ask, bid) = match order_type {
            OrderType::Ask => (&self.order, counter),
            OrderType::Bid => (counter, &self.order),
        };
        if ask.price().denom != bid.price().denom {
            return Err(SettlementError::PriceDenomMismatch {
                ask_id: ask.order_id,
                ask_price: ask.price().clone(),
                bid_id: bid.order_id,
                bid_price: bid.price().clone(),
            });
        }
        if ask.assets().denom != bid.assets().denom {
            return Err(SettlementError::AssetsDenomMismatch {
                ask_id: ask.order_id,
                ask_assets: ask.assets().clone(),
                bid_id: bid.order_id,
                bid_assets: bid.assets().clone(),
            });
        }

        if assets_amt == 0 {
            return Err(SettlementError::ZeroAssets {
                order_type,
                order_id,
                counter_type,
                counter_id,
            });
        }

        let assets = Coin::new(counter.assets().denom.clone(), assets_amt);
        if assets_amt > counter.assets().amount {
            return Err(SettlementError::InsufficientCounterAssets {
                order_type,
                order_id,
                assets,
                counter_type,
                counter_id,
                counter_assets: counter.assets().clone(),
            });
        }

        let assets_signed = to_signed(&assets)?;
        if assets_signed > self.assets_unfilled_amt {
            return Err(SettlementError::Overfill {
                order_type,
                order_id,
                assets_left: self.assets_unfilled_amt,
                denom: assets.denom,
                assets: assets_amt,
                counter_type,
                counter_id,
            });
        }

        let counter_price = counter.price();
        let price_amt = if assets_amt == counter.assets().amount {
            counter_price.amount
        } else {
            counter_price
                .amount
                .checked_mul(assets_amt)
                .ok_or_else(|| {
                    SettlementError::Overflow(format!(
                        "prorating {} of {} order {} by {}",
                        counter_price, counter_type, counter_id, assets
                    ))
                })?
                / counter.assets().amount
        };
        if price_amt == 0 {
            return Err(SettlementError::ZeroPriceSplit {
                order_type,
                order_id,
                assets,
                counter_type,
                counter_id,
                counter_price: counter_price.clone(),
            });
        }
        let price = Coin::new(counter_price.denom.clone(), price_amt);
        let price_signed = to_signed(&price)?;

        if order_type == OrderType::Bid && self.price_left_amt < price_signed {
            return Err(SettlementError::PriceLeftTooLow {
                order_id,
                price_left: self.price_left_amt,
                denom: price.denom,
                price_needed: price_amt,
                counter_id,
            });
        }

        let assets_filled_amt = checked_signed_add(self.assets_filled_amt, assets_signed)?;
        let price_applied_amt = checked_signed_add(self.price_applied_amt, price_signed)?;
        let assets_unfilled_amt = self.assets_unfilled_amt - assets_signed;
        let price_left_amt = self
            .price_left_amt
            .checked_sub(price_signed)
            .ok_or_else(|| SettlementError::Overflow(format!("price left of order {}", order_id)))?;

        debug!(
            order_id,
            order_type = %order_type,
            counter_id,
            assets = %assets,
            price = %price,
            "split added"
        );

        self.splits.push(OrderSplit {
            counter_order: counter.clone(),
            assets,
            price,
        });
        self.assets_filled_amt = assets_filled_amt;
        self.assets_unfilled_amt = assets_unfilled_amt;
        self.price_applied_amt = price_applied_amt;
        self.price_left_amt = price_left_amt;
        Ok(())
    }

    /// Settle remainders, check the result against the order, and compute fees.
    ///
    /// # Arguments
    ///
    /// * `seller_ratio` - The market's seller ratio for the price denom, if any.
    ///   An ask pays it on the price it receives. For a bid it is charged to the
    ///   counter asks on the price they receive.
    ///
    /// Counter-orders pay their settlement fees for what this fulfillment
    /// consumed of them (see [`OrderFulfillment::counter_fees_to_pay`]).
    ///
    /// On error this fulfillment is left unchanged and still open.
    pub fn finalize(&mut self, seller_ratio: Option<&FeeRatio>) -> Result<()> {
        let staged = self.check_finalizable().and_then(|()| {
            let splits: Vec<&OrderSplit> = self.splits.iter().collect();
            let units = remainder_units(&splits)?;
            let counter_fees = counter_fees(&splits, &units, |_| seller_ratio)?
                .into_iter()
                .map(|(_, fee)| fee)
                .collect();
            self.finalized_state(seller_ratio, &units, counter_fees)
        });
        self.commit(staged)
    }

    /// Finalize with remainder units and counter-order fees worked out over a whole batch.
    pub(crate) fn finalize_in_batch(
        &mut self,
        seller_ratio: Option<&FeeRatio>,
        units: &[Amount],
        counter_fees: Vec<AddrCoins>,
    ) -> Result<()> {
        let staged = self
            .check_finalizable()
            .and_then(|()| self.finalized_state(seller_ratio, units, counter_fees));
        self.commit(staged)
    }

    fn commit(&mut self, staged: Result<Finalized>) -> Result<()> {
        match staged {
            Ok(finalized) => {
                for (split, price_amt) in self.splits.iter_mut().zip(finalized.split_prices) {
                    split.price.amount = price_amt;
                }
                self.price_applied_amt += finalized.distributed;
                self.price_left_amt -= finalized.distributed;
                self.fees_to_pay = finalized.fees_to_pay;
                self.counter_fees_to_pay = finalized.counter_fees_to_pay;
                self.is_finalized = true;
                debug!(
                    order_id = self.order.order_id,
                    order_type = %self.order.order_type(),
                    assets_filled = self.assets_filled_amt,
                    price_applied = self.price_applied_amt,
                    remainder_distributed = finalized.distributed,
                    fees_to_pay = %self.fees_to_pay,
                    counter_fees = self.counter_fees_to_pay.len(),
                    "fulfillment finalized"
                );
                Ok(())
            }
            Err(err) => {
                warn!(
                    order_id = self.order.order_id,
                    order_type = %self.order.order_type(),
                    error = %err,
                    "fulfillment rejected"
                );
                Err(err)
            }
        }
    }

    fn check_finalizable(&self) -> Result<()> {
        let order_id = self.order.order_id;
        let order_type = self.order.order_type();
        if self.is_finalized {
            return Err(SettlementError::FinalizedTwice {
                order_type,
                order_id,
            });
        }
        if self.splits.is_empty() || self.assets_filled_amt <= 0 {
            return Err(SettlementError::NotFilled {
                order_type,
                order_id,
            });
        }
        Ok(())
    }

    /// Everything finalize would commit, computed without touching `self`.
    fn finalized_state(
        &self,
        seller_ratio: Option<&FeeRatio>,
        units: &[Amount],
        counter_fees_to_pay: Vec<AddrCoins>,
    ) -> Result<Finalized> {
        let order_id = self.order.order_id;
        let order_type = self.order.order_type();

        let splits: Vec<&OrderSplit> = self.splits.iter().collect();
        let split_prices = with_units(&splits, units)?;
        let distributed = units.iter().try_fold(0i128, |acc, unit| {
            let unit = i128::try_from(*unit)
                .map_err(|_| SettlementError::Overflow(format!("remainder units for order {}", order_id)))?;
            checked_signed_add(acc, unit)
        })?;
        let price_applied_amt = checked_signed_add(self.price_applied_amt, distributed)?;

        // The filled part of the order on its own terms.
        let filled_order = if self.assets_unfilled_amt == 0 {
            self.order.clone()
        } else {
            let assets_filled = Amount::try_from(self.assets_filled_amt)
                .map_err(|_| SettlementError::Overflow(format!("assets filled {}", self.assets_filled_amt)))?;
            self.order.split(assets_filled)?.0
        };
        let target = filled_order.price().clone();
        let target_amt = to_signed(&target)?;

        let mut fees_to_pay = filled_order.settlement_fees();
        match order_type {
            OrderType::Ask => {
                if price_applied_amt < target_amt {
                    return Err(SettlementError::InsufficientPrice {
                        order_id,
                        price_applied: price_applied_amt,
                        denom: target.denom.clone(),
                        target,
                    });
                }
                if let Some(ratio) = seller_ratio {
                    // price_applied_amt >= target_amt > 0 here.
                    let received = Coin::new(target.denom.clone(), price_applied_amt.unsigned_abs());
                    let (ratio_fee, _) = ratio.apply_to_loosely(&received)?;
                    fees_to_pay.add_coin(&ratio_fee)?;
                }
            }
            OrderType::Bid => {
                if price_applied_amt > target_amt {
                    return Err(SettlementError::BidOverpay {
                        order_id,
                        price_applied: price_applied_amt,
                        denom: target.denom.clone(),
                        target,
                    });
                }
            }
        }

        Ok(Finalized {
            split_prices,
            distributed,
            fees_to_pay,
            counter_fees_to_pay,
        })
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn order(&self) -> &Order {
        &self.order
    }

    pub fn order_id(&self) -> u64 {
        self.order.order_id
    }

    pub fn order_type(&self) -> OrderType {
        self.order.order_type()
    }

    pub fn owner(&self) -> &str {
        self.order.owner()
    }

    pub fn splits(&self) -> &[OrderSplit] {
        &self.splits
    }

    /// Fees owed by the order's owner for this settlement (set by finalize).
    pub fn fees_to_pay(&self) -> &Coins {
        &self.fees_to_pay
    }

    /// Settlement fees owed by counter-orders for what this fulfillment consumed
    /// of them (set by finalize). One entry per fee-paying counter-order.
    pub fn counter_fees_to_pay(&self) -> &[AddrCoins] {
        &self.counter_fees_to_pay
    }

    pub fn is_finalized(&self) -> bool {
        self.is_finalized
    }

    pub fn assets_filled(&self) -> i128 {
        self.assets_filled_amt
    }

    pub fn assets_unfilled(&self) -> i128 {
        self.assets_unfilled_amt
    }

    /// Price received (ask) or paid (bid) so far.
    pub fn price_applied(&self) -> i128 {
        self.price_applied_amt
    }

    pub fn price_left(&self) -> i128 {
        self.price_left_amt
    }

    /// The order's own price for the assets filled so far, if that is a whole amount.
    pub fn price_filled(&self) -> Option<Amount> {
        let price = self.order.price().amount;
        let assets = self.order.assets().amount;
        let filled = Amount::try_from(self.assets_filled_amt).ok()?;
        if filled == assets {
            return Some(price);
        }
        prorate_exact(price, filled, assets).ok().flatten()
    }

    /// The order's own price for the assets not yet filled, if that is a whole amount.
    pub fn price_unfilled(&self) -> Option<Amount> {
        self.order.price().amount.checked_sub(self.price_filled()?)
    }

    pub fn is_fully_filled(&self) -> bool {
        self.assets_unfilled_amt <= 0
    }

    pub fn is_completely_unfulfilled(&self) -> bool {
        self.assets_filled_amt == 0
    }

    pub fn hold_amount(&self) -> Result<Coins> {
        self.order.hold_amount()
    }
}

fn to_signed(coin: &Coin) -> Result<i128> {
    i128::try_from(coin.amount)
        .map_err(|_| SettlementError::Overflow(format!("{} exceeds the signed range", coin)))
}

fn checked_signed_add(a: i128, b: i128) -> Result<i128> {
    a.checked_add(b)
        .ok_or_else(|| SettlementError::Overflow(format!("{} + {}", a, b)))
}

// ============================================================================
// Counter-order reconciliation
// ============================================================================

/// Split indexes grouped by counter-order, groups in first-seen order.
fn group_by_counter(splits: &[&OrderSplit]) -> Vec<Vec<usize>> {
    let mut indexes: HashMap<(OrderType, u64), usize> = HashMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for (i, split) in splits.iter().enumerate() {
        let counter = &split.counter_order;
        match indexes.entry((counter.order_type(), counter.order_id)) {
            Entry::Occupied(g) => groups[*g.get()].push(i),
            Entry::Vacant(slot) => {
                slot.insert(groups.len());
                groups.push(vec![i]);
            }
        }
    }
    groups
}

/// Units lost to truncation, handed back one per split, counter-order by counter-order.
///
/// For each counter-order the splits' remainders
/// `(counter_price * assets) mod counter_assets` are summed, and that many whole
/// units go to the splits with a non-zero remainder in split order. The total
/// exchanged with the counter-order then equals
/// `floor(counter_price * assets_taken / counter_assets)`. Splits may come from
/// any number of fulfillments.
pub(crate) fn remainder_units(splits: &[&OrderSplit]) -> Result<Vec<Amount>> {
    let mut units = vec![0; splits.len()];

    for group in group_by_counter(splits) {
        let counter = &splits[group[0]].counter_order;
        let counter_assets = counter.assets().amount;
        let counter_price = counter.price().amount;

        let mut taken: Amount = 0;
        let mut remainders = Vec::with_capacity(group.len());
        let mut total: Amount = 0;
        for &i in &group {
            let assets_amt = splits[i].assets.amount;
            taken = taken.saturating_add(assets_amt);
            let rem = if assets_amt == counter_assets {
                0
            } else {
                counter_price
                    .checked_mul(assets_amt)
                    .ok_or_else(|| {
                        SettlementError::Overflow(format!(
                            "prorating {} of {} order {}",
                            counter.price(),
                            counter.order_type(),
                            counter.order_id
                        ))
                    })?
                    % counter_assets
            };
            total = total.checked_add(rem).ok_or_else(|| {
                SettlementError::Overflow(format!("remainders for order {}", counter.order_id))
            })?;
            remainders.push(rem);
        }
        if taken > counter_assets {
            return Err(SettlementError::CounterOverfilled {
                counter_type: counter.order_type(),
                counter_id: counter.order_id,
                assets: Coin::new(counter.assets().denom.clone(), taken),
                counter_assets: counter.assets().clone(),
            });
        }

        // Fewer units than splits with a remainder, since each remainder < counter_assets.
        let mut left = total / counter_assets;
        for (&i, rem) in group.iter().zip(remainders) {
            if left == 0 {
                break;
            }
            if rem > 0 {
                units[i] = 1;
                left -= 1;
            }
        }
    }

    Ok(units)
}

/// Split prices with the remainder units added.
fn with_units(splits: &[&OrderSplit], units: &[Amount]) -> Result<Vec<Amount>> {
    splits
        .iter()
        .zip(units)
        .map(|(split, unit)| {
            split
                .price
                .amount
                .checked_add(*unit)
                .ok_or_else(|| SettlementError::Overflow(format!("price of split {}", split.price)))
        })
        .collect()
}

/// Settlement fees each counter-order owes for what the splits took from it.
///
/// `units` are the splits' remainder units from [`remainder_units`].
///
/// A counter-order pays its settlement fees prorated to the assets taken (in
/// full when all of them were taken). A counter ask also pays the seller ratio
/// for its price denom on the price it received. Returns one entry per
/// fee-paying counter-order, paired with the index of its first split.
pub(crate) fn counter_fees<'r, F>(
    splits: &[&OrderSplit],
    units: &[Amount],
    seller_ratio_for: F,
) -> Result<Vec<(usize, AddrCoins)>>
where
    F: Fn(&str) -> Option<&'r FeeRatio>,
{
    let prices = with_units(splits, units)?;
    let mut rv = Vec::new();
    for group in group_by_counter(splits) {
        let counter = &splits[group[0]].counter_order;
        let counter_assets = counter.assets();

        let mut taken: Amount = 0;
        let mut received: Amount = 0;
        for &i in &group {
            taken = taken
                .checked_add(splits[i].assets.amount)
                .ok_or_else(|| SettlementError::Overflow(format!("assets of order {}", counter.order_id)))?;
            received = received
                .checked_add(prices[i])
                .ok_or_else(|| SettlementError::Overflow(format!("price of order {}", counter.order_id)))?;
        }

        let mut fees = Coins::new();
        for fee in counter.settlement_fees().iter() {
            let fee_amt = if taken == counter_assets.amount {
                fee.amount
            } else {
                match prorate_exact(fee.amount, taken, counter_assets.amount)? {
                    Some(amt) => amt,
                    None => {
                        return Err(SettlementError::FeeNotDivisible {
                            order_type: counter.order_type(),
                            order_id: counter.order_id,
                            assets: counter_assets.clone(),
                            filled: Coin::new(counter_assets.denom.clone(), taken),
                            fee,
                        })
                    }
                }
            };
            fees.add_coin(&Coin::new(fee.denom.clone(), fee_amt))?;
        }
        if counter.is_ask() {
            if let Some(ratio) = seller_ratio_for(&counter.price().denom) {
                let (ratio_fee, _) =
                    ratio.apply_to_loosely(&Coin::new(counter.price().denom.clone(), received))?;
                fees.add_coin(&ratio_fee)?;
            }
        }

        if !fees.is_empty() {
            rv.push((group[0], AddrCoins::new(counter.owner(), fees)));
        }
    }
    Ok(rv)
}

// ============================================================================
// Unit Tests
// ============================================================================
