//! Continuous double auction.
//!
//! Runs after every accepted order and drains all crossing pairs. Each
//! pair trades at the price of the order that rested first, so liquidity
//! providers keep their quote and an aggressive order pays the resting
//! price.

use crate::engine::{drain_crosses, ClearingPolicy, MarketSession};
use crate::orderbook::OrderBook;
use crate::types::{Order, Trade};

/// Clearing policy registered as `ContinuousOrderDriven`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContinuousDoubleAuction;

impl ContinuousDoubleAuction {
    pub fn new() -> Self {
        Self
    }

    /// Price of a crossing pair: the older order's limit, the bid's on equal sequence
    pub fn execution_price(bid: &Order, ask: &Order) -> u64 {
        if bid.sequence > ask.sequence {
            ask.price
        } else {
            bid.price
        }
    }
}

impl ClearingPolicy for ContinuousDoubleAuction {
    fn name(&self) -> &'static str {
        "ContinuousOrderDriven"
    }

    fn clear(&mut self, book: &mut OrderBook, session: &mut MarketSession, time: u64) -> Vec<Trade> {
        drain_crosses(book, session, time, Self::execution_price)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
