//! Batch settlement building.
//!
//! ## Batch Model
//!
//! Each pairing between an ask and a bid is settled from exactly one side:
//! either the ask's fulfillment lists the bid as a split, or the bid's
//! fulfillment lists the ask, never both. Every fulfillment then emits both its
//! asset and its price transfer. A pairing present on both sides would move
//! its coins twice and is rejected.
//!
//! ## Output Order
//!
//! Asks first, then bids, each in input order; per fulfillment the asset
//! transfer precedes the price transfer. Fee inputs are one per owner in
//! first-seen order. The same batch always builds the same transfers.

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::config::SettlementParams;
use crate::error::{Result, SettlementError};
use crate::fulfillment::order_fulfillment::{counter_fees, remainder_units};
use crate::fulfillment::{OrderFulfillment, OrderSplit};
use crate::settlement::indexed::IndexedAddrAmts;
use crate::settlement::transfer::{get_asset_transfer, get_price_transfer, AddrCoins, SettlementTransfers};
use crate::types::{validate_order_ids, OrderType};

/// Build every transfer for a batch of finalized fulfillments.
///
/// # Arguments
///
/// * `asks` - Finalized ask fulfillments
/// * `bids` - Finalized bid fulfillments
///
/// # Returns
///
/// The transfers, or the first error. Nothing partial is ever returned.
pub fn build_settlement_transfers(
    asks: &[OrderFulfillment],
    bids: &[OrderFulfillment],
) -> Result<SettlementTransfers> {
    validate_batch(asks, bids)?;

    let mut rv = SettlementTransfers::default();
    let mut fees = IndexedAddrAmts::new();
    for f in asks.iter().chain(bids) {
        rv.order_transfers.push(get_asset_transfer(f)?);
        rv.order_transfers.push(get_price_transfer(f)?);
        if !f.fees_to_pay().is_empty() {
            fees.add(f.owner(), f.fees_to_pay())?;
        }
        for counter_fee in f.counter_fees_to_pay() {
            fees.add(&counter_fee.address, &counter_fee.coins)?;
        }
    }
    rv.fee_inputs = fees.get_as_inputs()?;

    debug!(
        asks = asks.len(),
        bids = bids.len(),
        transfers = rv.order_transfers.len(),
        fee_inputs = rv.fee_inputs.len(),
        "settlement transfers built"
    );
    Ok(rv)
}

/// Finalize a whole batch against the market's parameters.
///
/// Remainders are reconciled per counter-order across the whole batch, so a
/// counter-order taken by several fulfillments exchanges exactly
/// `floor(counter_price * assets_taken / counter_assets)` in total. Each
/// counter-order's settlement fees (and, for a counter ask, the seller ratio)
/// are charged once, to the fulfillment holding its first split.
///
/// All-or-nothing: if any fulfillment fails, none of them are changed.
pub fn finalize_fulfillments(
    asks: &mut [OrderFulfillment],
    bids: &mut [OrderFulfillment],
    params: &SettlementParams,
) -> Result<()> {
    let mut staged: Vec<OrderFulfillment> = asks.iter().chain(bids.iter()).cloned().collect();

    for f in &staged {
        if f.order().market_id() != params.market_id {
            return Err(SettlementError::MarketMismatch {
                order_type: f.order_type(),
                order_id: f.order_id(),
                market_id: f.order().market_id(),
                expected: params.market_id,
            });
        }
    }

    let (units, mut counter_fees_by_fulfillment) = {
        let splits: Vec<&OrderSplit> = staged.iter().flat_map(|f| f.splits()).collect();
        let units = remainder_units(&splits)?;

        let mut owners = Vec::with_capacity(splits.len());
        for (i, f) in staged.iter().enumerate() {
            owners.extend(std::iter::repeat(i).take(f.splits().len()));
        }
        let mut by_fulfillment: Vec<Vec<AddrCoins>> = vec![Vec::new(); staged.len()];
        for (split_index, fee) in counter_fees(&splits, &units, |denom| params.seller_ratio_for(denom))? {
            by_fulfillment[owners[split_index]].push(fee);
        }
        (units, by_fulfillment)
    };

    let mut offset = 0;
    for (i, f) in staged.iter_mut().enumerate() {
        let count = f.splits().len();
        let ratio = match f.order_type() {
            OrderType::Ask => params.seller_ratio_for(&f.order().price().denom),
            OrderType::Bid => None,
        };
        let counter_fees = std::mem::take(&mut counter_fees_by_fulfillment[i]);
        f.finalize_in_batch(ratio, &units[offset..offset + count], counter_fees)?;
        offset += count;
    }

    let (staged_asks, staged_bids) = staged.split_at(asks.len());
    asks.clone_from_slice(staged_asks);
    bids.clone_from_slice(staged_bids);
    Ok(())
}

/// Validate the params, finalize the batch, and build its transfers.
pub fn settle(
    asks: &mut [OrderFulfillment],
    bids: &mut [OrderFulfillment],
    params: &SettlementParams,
) -> Result<SettlementTransfers> {
    params.validate()?;
    finalize_fulfillments(asks, bids, params)?;
    let rv = build_settlement_transfers(asks, bids)?;
    info!(
        market_id = params.market_id,
        asks = asks.len(),
        bids = bids.len(),
        transfers = rv.order_transfers.len(),
        "batch settled"
    );
    Ok(rv)
}

fn validate_batch(asks: &[OrderFulfillment], bids: &[OrderFulfillment]) -> Result<()> {
    for (list, expected) in [(asks, OrderType::Ask), (bids, OrderType::Bid)] {
        for f in list {
            if f.order_type() != expected {
                return Err(SettlementError::MisplacedFulfillment {
                    order_type: f.order_type(),
                    order_id: f.order_id(),
                    expected,
                });
            }
            if !f.is_finalized() {
                return Err(SettlementError::NotFinalized {
                    order_type: f.order_type(),
                    order_id: f.order_id(),
                });
            }
        }
    }

    let order_ids: Vec<u64> = asks.iter().chain(bids).map(|f| f.order_id()).collect();
    if !order_ids.is_empty() {
        validate_order_ids("settlement", &order_ids)?;
    }

    // (ask id, bid id) pairings settled from the ask side.
    let from_asks: BTreeSet<(u64, u64)> = asks
        .iter()
        .flat_map(|f| {
            f.splits()
                .iter()
                .map(move |split| (f.order_id(), split.counter_order.order_id))
        })
        .collect();
    for f in bids {
        for split in f.splits() {
            let pairing = (split.counter_order.order_id, f.order_id());
            if from_asks.contains(&pairing) {
                return Err(SettlementError::PairingSettledTwice {
                    ask_id: pairing.0,
                    bid_id: pairing.1,
                });
            }
        }
    }
    Ok(())
}

// ============================================================================
// Unit Tests
// ============================================================================
