//! Settlement fee ratios.
//!
//! A ratio `price:fee` says "for every `price` of the price denom paid, charge
//! `fee` of the fee denom". Applying it to an actual price computes
//! `actual * fee / price`.
//!
//! ## Modes
//!
//! - [`FeeRatio::apply_to`]: exact, errors when the division leaves a remainder.
//! - [`FeeRatio::apply_to_loosely`]: rounds up to the next whole unit and reports
//!   whether it had to.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SettlementError};
use crate::types::Coin;

/// A (price, fee) ratio configured for a market.
///
/// ```
/// use exchange_settlement::types::{Coin, FeeRatio};
///
/// let ratio = FeeRatio::new(Coin::new("pdenom", 7), Coin::new("fdenom", 3));
/// let (fee, rounded) = ratio.apply_to_loosely(&Coin::new("pdenom", 71)).unwrap();
/// assert_eq!(fee, Coin::new("fdenom", 31));
/// assert!(rounded);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeeRatio {
    pub price: Coin,
    pub fee: Coin,
}

impl FeeRatio {
    pub fn new(price: Coin, fee: Coin) -> Self {
        Self { price, fee }
    }

    /// Apply this ratio to a price, requiring the result to be a whole amount.
    pub fn apply_to(&self, price: &Coin) -> Result<Coin> {
        let (fee, rounded) = self.apply_to_loosely(price)?;
        if rounded {
            return Err(SettlementError::RatioNotEvenlyDivisible {
                ratio: self.clone(),
                price: price.clone(),
            });
        }
        Ok(fee)
    }

    /// Apply this ratio to a price, rounding up when it doesn't divide evenly.
    ///
    /// # Returns
    ///
    /// The fee and whether it was rounded up.
    pub fn apply_to_loosely(&self, price: &Coin) -> Result<(Coin, bool)> {
        if price.denom != self.price.denom {
            return Err(SettlementError::RatioPriceDenom {
                ratio: self.clone(),
                price: price.clone(),
            });
        }
        if self.price.amount == 0 {
            return Err(SettlementError::RatioDivisionByZero {
                ratio: self.clone(),
                price: price.clone(),
            });
        }

        let numerator = price
            .amount
            .checked_mul(self.fee.amount)
            .ok_or_else(|| SettlementError::Overflow(format!("{} applied to {}", self, price)))?;
        let mut amount = numerator / self.price.amount;
        let rounded = numerator % self.price.amount != 0;
        if rounded {
            // Cannot overflow: amount <= numerator / 2 here.
            amount += 1;
        }
        Ok((Coin::new(self.fee.denom.clone(), amount), rounded))
    }

    /// Check the ratio itself: positive price, and a same-denom fee no larger than the price.
    pub fn validate(&self) -> Result<()> {
        if !self.price.is_positive() {
            return Err(SettlementError::InvalidFeeRatio(format!(
                "price amount \"{}\" must be positive",
                self.price
            )));
        }
        if self.price.denom == self.fee.denom && self.fee.amount > self.price.amount {
            return Err(SettlementError::InvalidFeeRatio(format!(
                "fee amount \"{}\" cannot be greater than price amount \"{}\"",
                self.fee, self.price
            )));
        }
        Ok(())
    }
}

impl fmt::Display for FeeRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.price, self.fee)
    }
}

// ============================================================================
// Ratio list validation
// ============================================================================

/// Seller ratios: at most one per price denom, and the fee is paid in the price denom.
pub fn validate_seller_fee_ratios(ratios: &[FeeRatio]) -> Result<()> {
    let mut errs = Vec::new();
    let mut seen = BTreeSet::new();
    let mut dups = BTreeSet::new();
    for ratio in ratios {
        let key = ratio.price.denom.as_str();
        if !seen.insert(key) {
            if dups.insert(key) {
                errs.push(format!(
                    "seller fee ratio denom {:?} appears in multiple ratios",
                    key
                ));
            }
            continue;
        }
        if ratio.price.denom != ratio.fee.denom {
            errs.push(format!(
                "seller fee ratio price denom {:?} does not equal fee denom {:?}",
                ratio.price.denom, ratio.fee.denom
            ));
            continue;
        }
        if let Err(err) = ratio.validate() {
            errs.push(format!("seller fee ratio {}", ratio_reason(err)));
        }
    }
    join_errs(errs)
}

/// Buyer ratios: at most one per (price denom, fee denom) pair.
pub fn validate_buyer_fee_ratios(ratios: &[FeeRatio]) -> Result<()> {
    let mut errs = Vec::new();
    let mut seen = BTreeSet::new();
    let mut dups = BTreeSet::new();
    for ratio in ratios {
        let key = (ratio.price.denom.as_str(), ratio.fee.denom.as_str());
        if !seen.insert(key) {
            if dups.insert(key) {
                errs.push(format!(
                    "buyer fee ratio pair {:?} to {:?} appears in multiple ratios",
                    key.0, key.1
                ));
            }
            continue;
        }
        if let Err(err) = ratio.validate() {
            errs.push(format!("buyer fee ratio {}", ratio_reason(err)));
        }
    }
    join_errs(errs)
}

/// Validate both lists, then require every price denom in one list to appear in the other.
pub fn validate_fee_ratios(seller: &[FeeRatio], buyer: &[FeeRatio]) -> Result<()> {
    let mut errs = Vec::new();
    if let Err(err) = validate_seller_fee_ratios(seller) {
        errs.push(ratio_reason(err));
    }
    if let Err(err) = validate_buyer_fee_ratios(buyer) {
        errs.push(ratio_reason(err));
    }
    if !errs.is_empty() {
        return join_errs(errs);
    }

    // Vec + contains keeps first-seen order in the messages.
    let mut seller_denoms: Vec<&str> = Vec::new();
    for ratio in seller {
        if !seller_denoms.contains(&ratio.price.denom.as_str()) {
            seller_denoms.push(&ratio.price.denom);
        }
    }
    let mut buyer_denoms: Vec<&str> = Vec::new();
    for ratio in buyer {
        if !buyer_denoms.contains(&ratio.price.denom.as_str()) {
            buyer_denoms.push(&ratio.price.denom);
        }
    }

    for denom in &seller_denoms {
        if !buyer_denoms.contains(denom) {
            errs.push(format!(
                "denom {:?} is defined in the seller settlement fee ratios but not buyer",
                denom
            ));
        }
    }
    for denom in &buyer_denoms {
        if !seller_denoms.contains(denom) {
            errs.push(format!(
                "denom {:?} is defined in the buyer settlement fee ratios but not seller",
                denom
            ));
        }
    }
    join_errs(errs)
}

fn ratio_reason(err: SettlementError) -> String {
    match err {
        SettlementError::InvalidFeeRatio(reason) => reason,
        other => other.to_string(),
    }
}

fn join_errs(errs: Vec<String>) -> Result<()> {
    if errs.is_empty() {
        Ok(())
    } else {
        Err(SettlementError::InvalidFeeRatio(errs.join("; ")))
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn ratio(price_amt: u128, price_denom: &str, fee_amt: u128, fee_denom: &str) -> FeeRatio {
        FeeRatio::new(Coin::new(price_denom, price_amt), Coin::new(fee_denom, fee_amt))
    }

    #[test]
    fn test_apply_to_wrong_denom() {
        let err = ratio(1, "pdenom", 1, "fdenom")
            .apply_to(&Coin::new("fdenom", 1))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot apply ratio 1pdenom:1fdenom to price 1fdenom: incorrect price denom"
        );
    }

    #[test]
    fn test_apply_to_division_by_zero() {
        let err = ratio(0, "pdenom", 1, "fdenom")
            .apply_to_loosely(&Coin::new("pdenom", 1))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot apply ratio 0pdenom:1fdenom to price 1pdenom: division by zero"
        );
    }

    #[test]
    fn test_apply_to_indivisible() {
        let err = ratio(14, "pdenom", 1, "fdenom")
            .apply_to(&Coin::new("pdenom", 7))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot apply ratio 14pdenom:1fdenom to price 7pdenom: price amount cannot be evenly divided by ratio price"
        );
    }

    #[test]
    fn test_apply_to_exact() {
        let cases = [
            (ratio(55, "pdenom", 3, "fdenom"), 55, Coin::new("fdenom", 3)),
            (ratio(13, "pdenom", 17, "fdenom"), 39, Coin::new("fdenom", 51)),
            (ratio(100, "nhash", 1, "nhash"), 5_000_000_000, Coin::new("nhash", 50_000_000)),
            (
                ratio(1_000_000_000, "pdenom", 3, "fdenom"),
                1_000_000_000_000_000_000_000,
                Coin::new("fdenom", 3_000_000_000_000),
            ),
        ];
        for (r, price_amt, expected) in cases {
            let price = Coin::new(r.price.denom.clone(), price_amt);
            assert_eq!(r.apply_to(&price).unwrap(), expected, "{} applied to {}", r, price);
        }
    }

    #[test]
    fn test_apply_to_loosely_rounds_up() {
        // 7 * 3 / 14 = 1.5 => 2
        let (fee, rounded) = ratio(14, "pdenom", 3, "fdenom")
            .apply_to_loosely(&Coin::new("pdenom", 7))
            .unwrap();
        assert_eq!(fee, Coin::new("fdenom", 2));
        assert!(rounded);

        // 71 * 3 / 7 = 30.4 => 31
        let (fee, rounded) = ratio(7, "pdenom", 3, "fdenom")
            .apply_to_loosely(&Coin::new("pdenom", 71))
            .unwrap();
        assert_eq!(fee, Coin::new("fdenom", 31));
        assert!(rounded);

        let (fee, rounded) = ratio(55, "pdenom", 3, "fdenom")
            .apply_to_loosely(&Coin::new("pdenom", 110))
            .unwrap();
        assert_eq!(fee, Coin::new("fdenom", 6));
        assert!(!rounded);
    }

    #[test]
    fn test_apply_to_loosely_never_rounds_down() {
        let r = ratio(7, "pdenom", 3, "fdenom");
        for price_amt in 0..200u128 {
            let (fee, rounded) = r.apply_to_loosely(&Coin::new("pdenom", price_amt)).unwrap();
            assert!(fee.amount * 7 >= price_amt * 3);
            assert_eq!(rounded, (price_amt * 3) % 7 != 0);
        }
    }

    #[test]
    fn test_ratio_validate() {
        assert!(ratio(1, "nhash", 1, "nhash").validate().is_ok());
        assert!(ratio(1, "nhash", 0, "fig").validate().is_ok());
        assert!(ratio(0, "nhash", 0, "fig").validate().is_err());
        let err = ratio(1, "nhash", 2, "nhash").validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid fee ratio: fee amount \"2nhash\" cannot be greater than price amount \"1nhash\""
        );
    }

    #[test]
    fn test_validate_seller_fee_ratios() {
        assert!(validate_seller_fee_ratios(&[]).is_ok());
        assert!(validate_seller_fee_ratios(&[ratio(100, "plum", 1, "plum")]).is_ok());

        let err = validate_seller_fee_ratios(&[
            ratio(100, "plum", 1, "plum"),
            ratio(50, "plum", 1, "plum"),
            ratio(50, "plum", 1, "plum"),
            ratio(10, "pear", 1, "fig"),
        ])
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid fee ratio: seller fee ratio denom \"plum\" appears in multiple ratios; \
             seller fee ratio price denom \"pear\" does not equal fee denom \"fig\""
        );
    }

    #[test]
    fn test_validate_buyer_fee_ratios() {
        assert!(validate_buyer_fee_ratios(&[
            ratio(100, "plum", 1, "plum"),
            ratio(100, "plum", 3, "fig"),
        ])
        .is_ok());

        let err = validate_buyer_fee_ratios(&[
            ratio(100, "plum", 3, "fig"),
            ratio(10, "plum", 1, "fig"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("pair \"plum\" to \"fig\" appears in multiple ratios"));
    }

    #[test]
    fn test_validate_fee_ratios_denoms_in_both() {
        assert!(validate_fee_ratios(
            &[ratio(100, "plum", 1, "plum")],
            &[ratio(100, "plum", 3, "fig")],
        )
        .is_ok());

        let err = validate_fee_ratios(
            &[ratio(100, "plum", 1, "plum")],
            &[ratio(100, "pear", 3, "fig")],
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid fee ratio: denom \"plum\" is defined in the seller settlement fee ratios but not buyer; \
             denom \"pear\" is defined in the buyer settlement fee ratios but not seller"
        );
    }
}
