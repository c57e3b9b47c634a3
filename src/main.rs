//! Exchange Settlement - Binary Entry Point
//!
//! Settles a sample batch (one ask filled by two bids) and prints the
//! resulting transfers and receipt. Log level comes from `RUST_LOG`.

use exchange_settlement::{
    settle, AskOrder, BidOrder, Coin, FeeRatio, Order, OrderFulfillment, SettlementParams,
    SettlementReceipt,
};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run() {
        eprintln!("settlement failed: {}", e);
        std::process::exit(1);
    }
}

fn run() -> exchange_settlement::Result<()> {
    println!("===========================================");
    println!("  Exchange Settlement");
    println!("===========================================");
    println!();

    let mut params = SettlementParams::new(1);
    params.seller_fee_ratios = vec![FeeRatio::new(Coin::new("pdolla", 5), Coin::new("pdolla", 1))];
    params.buyer_fee_ratios = vec![FeeRatio::new(Coin::new("pdolla", 5), Coin::new("fig", 1))];

    let ask = Order::new_ask(
        1,
        AskOrder {
            market_id: 1,
            seller: "seller".to_string(),
            assets: Coin::new("adolla", 92),
            price: Coin::new("pdolla", 15),
            allow_partial: true,
            ..Default::default()
        },
    );
    let bids = [("buyerA", 2, 40, 6), ("buyerB", 3, 52, 9)].map(|(buyer, id, assets, price)| {
        Order::new_bid(
            id,
            BidOrder {
                market_id: 1,
                buyer: buyer.to_string(),
                assets: Coin::new("adolla", assets),
                price: Coin::new("pdolla", price),
                ..Default::default()
            },
        )
    });

    let mut fulfillment = OrderFulfillment::new(ask)?;
    for bid in &bids {
        fulfillment.add_split(bid, bid.assets().amount)?;
    }
    println!("Ask order {}:", fulfillment.order_id());
    println!("  Assets filled: {}", fulfillment.assets_filled());
    println!("  Price applied: {}", fulfillment.price_applied());
    println!();

    let mut asks = vec![fulfillment];
    let transfers = settle(&mut asks, &mut [], &params)?;

    println!("Transfers:");
    for (i, transfer) in transfers.order_transfers.iter().enumerate() {
        println!("  [{}]", i);
        for input in &transfer.inputs {
            println!("    in:  {} {}", input.address, input.coins);
        }
        for output in &transfer.outputs {
            println!("    out: {} {}", output.address, output.coins);
        }
    }
    println!("Fees:");
    for input in &transfers.fee_inputs {
        println!("  {} {}", input.address, input.coins);
    }
    println!();

    let receipt = SettlementReceipt::from_transfers(&transfers)?;
    println!("Receipt:");
    println!("  Transfers: {}", receipt.transfer_count);
    println!("  Fee inputs: {}", receipt.fee_input_count);
    println!("  Root: {}", receipt.settlement_root_hex());
    Ok(())
}
