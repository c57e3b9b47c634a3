//! Settlement receipt: a deterministic commitment to a built settlement.
//!
//! The settlement is encoded with SSZ and hashed with SHA-256. Two nodes that
//! build the same batch get the same root, so the root can be compared instead
//! of the transfers themselves.

use sha2::{Digest, Sha256};
use ssz_rs::prelude::*;

// The SimpleSerialize derive names `Result` unqualified, so no crate alias is imported here.
use crate::error::SettlementError;
use crate::settlement::{AddrCoins, SettlementTransfers, Transfer};
use crate::types::Coins;

const MAX_DENOM_LENGTH: usize = 128;
const MAX_ADDRESS_LENGTH: usize = 256;
const MAX_COINS: usize = 64;
const MAX_ENTRIES: usize = 4096;
const MAX_TRANSFERS: usize = 1 << 20;
const MAX_FEE_INPUTS: usize = MAX_TRANSFERS;

// ============================================================================
// SSZ records
// ============================================================================

/// One coin. The 128-bit amount is split into two SSZ `uint64`s.
#[derive(Debug, Clone, PartialEq, Eq, Default, SimpleSerialize)]
struct CoinRecord {
    denom: List<u8, MAX_DENOM_LENGTH>,
    amount_hi: u64,
    amount_lo: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, SimpleSerialize)]
struct AddrCoinsRecord {
    address: List<u8, MAX_ADDRESS_LENGTH>,
    coins: List<CoinRecord, MAX_COINS>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, SimpleSerialize)]
struct TransferRecord {
    inputs: List<AddrCoinsRecord, MAX_ENTRIES>,
    outputs: List<AddrCoinsRecord, MAX_ENTRIES>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, SimpleSerialize)]
struct SettlementRecord {
    transfers: List<TransferRecord, MAX_TRANSFERS>,
    fee_inputs: List<AddrCoinsRecord, MAX_FEE_INPUTS>,
}

fn bytes_list<const N: usize>(what: &str, value: &str) -> crate::error::Result<List<u8, N>> {
    List::try_from(value.as_bytes().to_vec()).map_err(|_| {
        SettlementError::Encoding(format!("{} {:?} longer than {} bytes", what, value, N))
    })
}

fn list<T: SimpleSerialize, const N: usize>(what: &str, items: Vec<T>) -> crate::error::Result<List<T, N>> {
    let len = items.len();
    List::try_from(items)
        .map_err(|_| SettlementError::Encoding(format!("{} {} exceed limit {}", len, what, N)))
}

fn coins_record(coins: &Coins) -> crate::error::Result<List<CoinRecord, MAX_COINS>> {
    let records = coins
        .iter()
        .map(|coin| -> crate::error::Result<CoinRecord> {
            Ok(CoinRecord {
                denom: bytes_list("denom", &coin.denom)?,
                amount_hi: (coin.amount >> 64) as u64,
                amount_lo: coin.amount as u64,
            })
        })
        .collect::<crate::error::Result<Vec<_>>>()?;
    list("coins", records)
}

fn entries_record<const N: usize>(entries: &[AddrCoins]) -> crate::error::Result<List<AddrCoinsRecord, N>> {
    let records = entries
        .iter()
        .map(|entry| -> crate::error::Result<AddrCoinsRecord> {
            Ok(AddrCoinsRecord {
                address: bytes_list("address", &entry.address)?,
                coins: coins_record(&entry.coins)?,
            })
        })
        .collect::<crate::error::Result<Vec<_>>>()?;
    list("entries", records)
}

fn transfer_record(transfer: &Transfer) -> crate::error::Result<TransferRecord> {
    Ok(TransferRecord {
        inputs: entries_record(&transfer.inputs)?,
        outputs: entries_record(&transfer.outputs)?,
    })
}

// ============================================================================
// SettlementReceipt
// ============================================================================

/// Summary of one built settlement.
///
/// ## Encoding limits
///
/// Encoding fails with an internal error when a settlement exceeds any of:
///
/// * 128 bytes per denom and 256 bytes per address
/// * 64 coins per address
/// * 4096 inputs or outputs per transfer
/// * 2^20 transfers, and 2^20 fee inputs (one per fee-paying owner)
///
/// ## Example
///
/// ```
/// use exchange_settlement::settlement::SettlementTransfers;
/// use exchange_settlement::types::SettlementReceipt;
///
/// let receipt = SettlementReceipt::from_transfers(&SettlementTransfers::default()).unwrap();
/// assert_eq!(receipt.transfer_count, 0);
/// assert_eq!(receipt.settlement_root_hex().len(), 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, SimpleSerialize)]
pub struct SettlementReceipt {
    /// Number of order transfers (two per fulfillment)
    pub transfer_count: u64,

    /// Number of fee inputs (one per fee-paying owner)
    pub fee_input_count: u64,

    /// SHA-256 of the SSZ-encoded settlement
    pub settlement_root: [u8; 32],
}

impl SettlementReceipt {
    /// Encode a settlement and commit to it.
    pub fn from_transfers(transfers: &SettlementTransfers) -> crate::error::Result<Self> {
        let bytes = Self::encode(transfers)?;
        Ok(Self {
            transfer_count: transfers.order_transfers.len() as u64,
            fee_input_count: transfers.fee_inputs.len() as u64,
            settlement_root: Self::compute_hash(&bytes),
        })
    }

    /// SSZ encoding of a settlement, in transfer order.
    pub fn encode(transfers: &SettlementTransfers) -> crate::error::Result<Vec<u8>> {
        let records = transfers
            .order_transfers
            .iter()
            .map(transfer_record)
            .collect::<crate::error::Result<Vec<_>>>()?;
        let record = SettlementRecord {
            transfers: list("transfers", records)?,
            fee_inputs: entries_record(&transfers.fee_inputs)?,
        };
        ssz_rs::serialize(&record).map_err(|err| SettlementError::Encoding(format!("{:?}", err)))
    }

    /// Compute SHA-256 hash of the given data
    pub fn compute_hash(data: &[u8]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(data);
        let result = hasher.finalize();

        let mut hash = [0u8; 32];
        hash.copy_from_slice(&result);
        hash
    }

    /// Get the settlement root as a hex string
    pub fn settlement_root_hex(&self) -> String {
        hex::encode(self.settlement_root)
    }

    pub fn is_empty(&self) -> bool {
        self.transfer_count == 0 && self.fee_input_count == 0
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
