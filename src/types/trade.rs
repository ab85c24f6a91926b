//! Trade type representing one executed print.
//!
//! ## SSZ Serialization
//!
//! Trades are serialized using SSZ so a run's trade stream can be hashed
//! into a deterministic digest (see [`super::TradeDigest`]).

use rust_decimal::Decimal;
use ssz_rs::prelude::*;

use super::price;
use super::AgentId;

/// A single match between a resting bid and a resting ask.
///
/// ## Price
///
/// Set by the clearing policy: the older order's price for the continuous
/// auction, the uniform fixing price for the call auction.
///
/// ## Example
///
/// ```
/// use market_sim::types::{AgentId, Trade};
///
/// let trade = Trade::new(
///     1,              // transaction number
///     4,              // time (tick)
///     3,              // buy order id
///     2,              // sell order id
///     AgentId(1),     // buyer
///     AgentId(2),     // seller
///     350_000_000,    // price: 3.50
///     15,             // quantity
/// );
/// assert_eq!(trade.buyer(), AgentId(1));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, SimpleSerialize)]
pub struct Trade {
    /// Transaction number, assigned by the market session
    pub id: u64,

    /// Scheduler tick at which the trade was executed
    pub time: u64,

    /// Book id of the bid
    pub buy_order_id: u64,

    /// Book id of the ask
    pub sell_order_id: u64,

    /// Buyer agent id
    pub buyer_id: u64,

    /// Seller agent id
    pub seller_id: u64,

    /// Execution price in fixed-point (scaled by 10^8)
    pub price: u64,

    /// Executed quantity in shares
    pub quantity: u64,
}

impl Trade {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: u64,
        time: u64,
        buy_order_id: u64,
        sell_order_id: u64,
        buyer: AgentId,
        seller: AgentId,
        price: u64,
        quantity: u64,
    ) -> Self {
        Self {
            id,
            time,
            buy_order_id,
            sell_order_id,
            buyer_id: buyer.0,
            seller_id: seller.0,
            price,
            quantity,
        }
    }

    pub fn buyer(&self) -> AgentId {
        AgentId(self.buyer_id)
    }

    pub fn seller(&self) -> AgentId {
        AgentId(self.seller_id)
    }

    /// Cash exchanged by this trade (price * quantity), exact
    pub fn notional(&self) -> Decimal {
        price::notional(self.price, self.quantity)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
