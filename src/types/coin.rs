//! Coin and coin-set arithmetic.
//!
//! ## Amounts
//!
//! Amounts are unsigned 128-bit integers: a coin can never be negative, so the
//! "negative amount" failures other ledgers check for cannot be constructed here.
//! Overflow is the only arithmetic failure and is reported, never wrapped.
//!
//! ## Ordering
//!
//! [`Coins`] keeps its entries sorted by denom and drops zero entries. Iteration
//! order is therefore fixed for a given set of amounts, which keeps every
//! transfer built from it identical across nodes.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SettlementError};

/// Integer amount of a single denom.
pub type Amount = u128;

// ============================================================================
// Coin
// ============================================================================

/// A single (denom, amount) pair.
///
/// ```
/// use exchange_settlement::types::Coin;
///
/// let coin = Coin::new("apple", 10);
/// assert_eq!(coin.to_string(), "10apple");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: Amount,
}

impl Coin {
    pub fn new(denom: impl Into<String>, amount: Amount) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }

    pub fn is_positive(&self) -> bool {
        self.amount > 0
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

// ============================================================================
// Coins
// ============================================================================

/// A set of coins with unique denoms.
///
/// Zero amounts are never stored, so an empty set is the only zero value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Coins(BTreeMap<String, Amount>);

impl Coins {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Build a set from any number of coins, summing repeated denoms.
    pub fn try_from_coins<I>(coins: I) -> Result<Self>
    where
        I: IntoIterator<Item = Coin>,
    {
        let mut rv = Coins::new();
        for coin in coins {
            rv.add_coin(&coin)?;
        }
        Ok(rv)
    }

    /// A set holding just the one coin (or nothing if it is zero).
    pub fn from_coin(coin: Coin) -> Self {
        let mut map = BTreeMap::new();
        if coin.amount > 0 {
            map.insert(coin.denom, coin.amount);
        }
        Self(map)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Amount of the given denom (zero if absent).
    pub fn amount_of(&self, denom: &str) -> Amount {
        self.0.get(denom).copied().unwrap_or(0)
    }

    /// Iterate over the coins in denom order.
    pub fn iter(&self) -> impl Iterator<Item = Coin> + '_ {
        self.0
            .iter()
            .map(|(denom, amount)| Coin::new(denom.clone(), *amount))
    }

    pub fn to_vec(&self) -> Vec<Coin> {
        self.iter().collect()
    }

    /// Add one coin in place. On overflow nothing is changed.
    pub fn add_coin(&mut self, coin: &Coin) -> Result<()> {
        if coin.amount == 0 {
            return Ok(());
        }
        let current = self.amount_of(&coin.denom);
        let sum = current.checked_add(coin.amount).ok_or_else(|| {
            SettlementError::Overflow(format!("{}{} + {}", current, coin.denom, coin))
        })?;
        self.0.insert(coin.denom.clone(), sum);
        Ok(())
    }

    /// Sum of two sets. All-or-nothing: an overflow in any denom is an error.
    pub fn checked_add(&self, other: &Coins) -> Result<Coins> {
        let mut rv = self.clone();
        for coin in other.iter() {
            rv.add_coin(&coin)?;
        }
        Ok(rv)
    }

    /// Difference of two sets, or `None` if any denom would go negative.
    pub fn checked_sub(&self, other: &Coins) -> Option<Coins> {
        let mut rv = self.clone();
        for (denom, amount) in other.0.iter() {
            let left = rv.amount_of(denom).checked_sub(*amount)?;
            if left == 0 {
                rv.0.remove(denom);
            } else {
                rv.0.insert(denom.clone(), left);
            }
        }
        Some(rv)
    }
}

impl From<Coin> for Coins {
    fn from(coin: Coin) -> Self {
        Coins::from_coin(coin)
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (denom, amount) in self.0.iter() {
            if !first {
                write!(f, ",")?;
            }
            write!(f, "{}{}", amount, denom)?;
            first = false;
        }
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
