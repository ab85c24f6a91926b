//! Core data types for the market simulator.
//!
//! ## Types
//!
//! - [`Side`]: Buy or Sell (encoded 0 / 1 in order logs)
//! - [`AgentId`]: opaque identity of an order's originator
//! - [`RawOrder`]: what an agent emits; price, quantity and even direction may be missing
//! - [`Order`]: a sanitized, sequence-stamped limit order ready for the book
//! - [`Trade`]: one executed print
//! - [`RunReceipt`]: run summary with trade and book digests
//!
//! ## Fixed-Point Prices
//!
//! Prices are stored as `u64` scaled by 10^8, see [`price`].
//! Quantities are whole share counts.

mod order;
mod trade;
mod receipt;
pub mod price;

pub use order::{AgentId, Order, RawOrder, Side};
pub use trade::Trade;
pub use receipt::{RunReceipt, TradeDigest};
