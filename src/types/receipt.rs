//! Run receipt: the summary of a whole simulation run.
//!
//! The receipt carries two digests so that two runs can be compared without
//! diffing their logs: `trade_root` over every executed trade in execution
//! order, and `book_root` over the final resting book.

use sha2::{Digest, Sha256};
use ssz_rs::prelude::*;

use super::Trade;
use crate::error::{SimError, SimResult};

/// Summary of a simulation run.
///
/// Same seed and same config always produce the same receipt.
///
/// ## Example
///
/// ```
/// use market_sim::types::RunReceipt;
///
/// let receipt = RunReceipt::new(
///     10,         // ticks
///     8,          // orders accepted
///     3,          // trades executed
///     45,         // volume
///     350_000_000,// last price: 3.50
///     [0u8; 32],  // trade root
///     [0u8; 32],  // book root
/// );
/// assert_eq!(receipt.trade_root_hex().len(), 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, SimpleSerialize)]
pub struct RunReceipt {
    /// Ticks executed across all phases
    pub ticks: u64,

    /// Orders that reached the book
    pub orders_accepted: u64,

    /// Number of trades executed
    pub trades_executed: u64,

    /// Total shares traded
    pub volume: u64,

    /// Last trade price in fixed-point (0 when nothing traded)
    pub last_price: u64,

    /// SHA-256 over the SSZ encoding of every trade, in execution order
    pub trade_root: [u8; 32],

    /// State root of the final order book
    pub book_root: [u8; 32],
}

impl RunReceipt {
    pub fn new(
        ticks: u64,
        orders_accepted: u64,
        trades_executed: u64,
        volume: u64,
        last_price: u64,
        trade_root: [u8; 32],
        book_root: [u8; 32],
    ) -> Self {
        Self {
            ticks,
            orders_accepted,
            trades_executed,
            volume,
            last_price,
            trade_root,
            book_root,
        }
    }

    /// Compute SHA-256 hash of the given data
    pub fn compute_hash(data: &[u8]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(data);
        hasher.finalize().into()
    }

    pub fn trade_root_hex(&self) -> String {
        hex::encode(self.trade_root)
    }

    pub fn book_root_hex(&self) -> String {
        hex::encode(self.book_root)
    }

    /// Last trade price, if anything traded
    pub fn last_price(&self) -> Option<u64> {
        (self.last_price != 0).then_some(self.last_price)
    }

    /// Trades per accepted order
    ///
    /// Returns None if no orders were accepted.
    pub fn fill_rate(&self) -> Option<f64> {
        if self.orders_accepted == 0 {
            None
        } else {
            Some(self.trades_executed as f64 / self.orders_accepted as f64)
        }
    }
}

/// Running SHA-256 over a stream of trades.
#[derive(Clone, Default)]
pub struct TradeDigest {
    hasher: Sha256,
    count: u64,
}

impl TradeDigest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Absorb one trade's SSZ encoding
    pub fn push(&mut self, trade: &Trade) -> SimResult<()> {
        let bytes = ssz_rs::serialize(trade).map_err(|e| SimError::Encoding(format!("{e:?}")))?;
        self.hasher.update(&bytes);
        self.count += 1;
        Ok(())
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn finalize(self) -> [u8; 32] {
        self.hasher.finalize().into()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
