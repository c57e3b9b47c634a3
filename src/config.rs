//! Market settlement parameters.
//!
//! Loaded by the host (usually from JSON) and validated once before any
//! settlement pass uses them.
//!
//! ```
//! use exchange_settlement::config::SettlementParams;
//!
//! let params: SettlementParams = serde_json::from_str(
//!     r#"{
//!         "market_id": 3,
//!         "seller_fee_ratios": [
//!             {"price": {"denom": "pdolla", "amount": 100}, "fee": {"denom": "pdolla", "amount": 1}}
//!         ],
//!         "buyer_fee_ratios": [
//!             {"price": {"denom": "pdolla", "amount": 100}, "fee": {"denom": "fig", "amount": 2}}
//!         ]
//!     }"#,
//! )
//! .unwrap();
//! params.validate().unwrap();
//! assert!(params.seller_ratio_for("pdolla").is_some());
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Result, SettlementError};
use crate::types::{validate_fee_ratios, FeeRatio};

/// Per-market parameters consumed by finalization and settlement.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SettlementParams {
    /// Market every settled order must belong to.
    pub market_id: u32,

    /// Ratio fees charged to sellers, at most one per price denom.
    #[serde(default)]
    pub seller_fee_ratios: Vec<FeeRatio>,

    /// Ratio fee options offered to buyers. Buyers pick one when placing a bid,
    /// so these only constrain order creation.
    #[serde(default)]
    pub buyer_fee_ratios: Vec<FeeRatio>,
}

impl SettlementParams {
    pub fn new(market_id: u32) -> Self {
        Self {
            market_id,
            ..Default::default()
        }
    }

    /// Reject a zero market id and malformed fee ratios.
    pub fn validate(&self) -> Result<()> {
        if self.market_id == 0 {
            return Err(SettlementError::InvalidParams(
                "market id cannot be zero".to_string(),
            ));
        }
        validate_fee_ratios(&self.seller_fee_ratios, &self.buyer_fee_ratios)
            .map_err(|err| SettlementError::InvalidParams(err.to_string()))
    }

    /// The seller ratio for the given price denom, if the market has one.
    pub fn seller_ratio_for(&self, price_denom: &str) -> Option<&FeeRatio> {
        self.seller_fee_ratios
            .iter()
            .find(|ratio| ratio.price.denom == price_denom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Coin;

    fn ratio(price: (&str, u128), fee: (&str, u128)) -> FeeRatio {
        FeeRatio::new(Coin::new(price.0, price.1), Coin::new(fee.0, fee.1))
    }

    #[test]
    fn test_params_validate() {
        let mut params = SettlementParams::new(1);
        params.seller_fee_ratios = vec![ratio(("pdolla", 100), ("pdolla", 1))];
        params.buyer_fee_ratios = vec![ratio(("pdolla", 100), ("fig", 3))];
        assert!(params.validate().is_ok());

        assert_eq!(
            SettlementParams::new(0).validate().unwrap_err().to_string(),
            "invalid settlement params: market id cannot be zero"
        );

        params.seller_fee_ratios.push(ratio(("pdolla", 10), ("pdolla", 2)));
        let err = params.validate().unwrap_err();
        assert!(matches!(err, SettlementError::InvalidParams(_)));
        assert!(err.to_string().contains("appears in multiple ratios"));
    }

    #[test]
    fn test_seller_ratio_lookup() {
        let mut params = SettlementParams::new(1);
        params.seller_fee_ratios = vec![
            ratio(("plum", 10), ("plum", 1)),
            ratio(("pdolla", 100), ("pdolla", 1)),
        ];
        assert_eq!(
            params.seller_ratio_for("pdolla"),
            Some(&ratio(("pdolla", 100), ("pdolla", 1)))
        );
        assert_eq!(params.seller_ratio_for("pear"), None);
    }

    #[test]
    fn test_params_from_json_defaults() {
        let params: SettlementParams = serde_json::from_str(r#"{"market_id": 7}"#).unwrap();
        assert_eq!(params, SettlementParams::new(7));
    }
}
