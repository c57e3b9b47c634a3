//! Insertion-ordered per-address coin accumulator.
//!
//! Transfers list their counterparties in the order they were first seen, so
//! the accumulator remembers first-insertion order rather than sorting by
//! address. The index map is only ever used for lookups.

use std::collections::HashMap;

use crate::error::{Result, SettlementError};
use crate::settlement::transfer::{AddrCoins, Input, Output};
use crate::types::{Coin, Coins};

/// Sums coins per address, remembering first-insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexedAddrAmts {
    addrs: Vec<String>,
    amts: Vec<Coins>,
    indexes: HashMap<String, usize>,
}

impl IndexedAddrAmts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.addrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addrs.is_empty()
    }

    /// Add coins to an address, creating its entry on first use.
    ///
    /// On overflow nothing is changed.
    pub fn add(&mut self, addr: &str, coins: &Coins) -> Result<()> {
        match self.indexes.get(addr) {
            Some(&i) => {
                self.amts[i] = self.amts[i].checked_add(coins)?;
            }
            None => {
                self.indexes.insert(addr.to_string(), self.addrs.len());
                self.addrs.push(addr.to_string());
                self.amts.push(coins.clone());
            }
        }
        Ok(())
    }

    pub fn add_coin(&mut self, addr: &str, coin: &Coin) -> Result<()> {
        self.add(addr, &Coins::from_coin(coin.clone()))
    }

    /// Coins accumulated for an address, if it has an entry.
    pub fn get(&self, addr: &str) -> Option<&Coins> {
        self.indexes.get(addr).map(|&i| &self.amts[i])
    }

    /// Every entry as a transfer input, in first-insertion order.
    pub fn get_as_inputs(&self) -> Result<Vec<Input>> {
        self.entries()
    }

    /// Every entry as a transfer output, in first-insertion order.
    pub fn get_as_outputs(&self) -> Result<Vec<Output>> {
        self.entries()
    }

    fn entries(&self) -> Result<Vec<AddrCoins>> {
        self.addrs
            .iter()
            .zip(&self.amts)
            .map(|(address, coins)| {
                if coins.is_empty() {
                    return Err(SettlementError::AddrAmountNotPositive {
                        address: address.clone(),
                        coins: coins.to_string(),
                    });
                }
                Ok(AddrCoins::new(address.clone(), coins.clone()))
            })
            .collect()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
