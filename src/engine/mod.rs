//! Matching engine module.
//!
//! ## Design Principles
//!
//! 1. **Determinism**: same book, same trades
//! 2. **Fixed-Point Math**: prices are compared and copied as integers
//! 3. **Price-Time Priority**: best price first, then earliest tick
//!
//! ## Clearing Policies
//!
//! A [`ClearingPolicy`] decides at which price crossing orders execute:
//!
//! - [`ContinuousDoubleAuction`]: per pair, the price of the older order
//! - [`FixingAuction`]: one volume-maximizing price for the whole round
//!
//! A [`Market`] bundles a book, its [`MarketSession`] and a policy. Markets
//! are built by name through [`MarketKind`].
//!
//! ## Example
//!
//! ```
//! use market_sim::engine::MarketKind;
//! use market_sim::orderbook::Uniqueness;
//! use market_sim::types::{AgentId, Order, Side};
//!
//! let mut market = MarketKind::from_name("ContinuousOrderDriven")
//!     .unwrap()
//!     .build(&serde_json::Value::Null)
//!     .unwrap();
//!
//! market.insert(Order::new(0, AgentId(2), Side::Sell, 350_000_000, 20, 1), Uniqueness::Global);
//! market.insert(Order::new(0, AgentId(1), Side::Buy, 360_000_000, 15, 4), Uniqueness::Global);
//!
//! let trades = market.clear(4);
//! assert_eq!(trades.len(), 1);
//! assert_eq!(trades[0].price, 350_000_000);
//! ```

pub mod execution;
pub mod continuous;
pub mod fixing;

pub use continuous::ContinuousDoubleAuction;
pub use execution::drain_crosses;
pub use fixing::{volume_curve, FixingAuction, FixingQuote, TieBreak};

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::agents::{Account, MarketView};
use crate::error::ConfigError;
use crate::orderbook::{OrderBook, Uniqueness};
use crate::types::{Order, Trade};

// ============================================================================
// ClearingPolicy
// ============================================================================

/// Matching rule of a market.
pub trait ClearingPolicy {
    /// Registry name of the policy
    fn name(&self) -> &'static str;

    /// Execute whatever the policy allows on the current book
    fn clear(&mut self, book: &mut OrderBook, session: &mut MarketSession, time: u64) -> Vec<Trade>;

    /// Admission check for a sanitized order. Accepts everything by default;
    /// agents are expected to keep within their own means.
    fn is_valid(&self, _account: &Account, _order: &Order) -> bool {
        true
    }
}

// ============================================================================
// MarketSession
// ============================================================================

/// Per-market state that outlives individual trades.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarketSession {
    last_price: Option<u64>,
    transactions: u64,
}

impl MarketSession {
    /// Allocate the next transaction number (the first is 1)
    pub fn next_transaction(&mut self) -> u64 {
        self.transactions += 1;
        self.transactions
    }

    pub fn record_price(&mut self, price: u64) {
        self.last_price = Some(price);
    }

    pub fn last_price(&self) -> Option<u64> {
        self.last_price
    }

    pub fn transactions(&self) -> u64 {
        self.transactions
    }
}

// ============================================================================
// Market
// ============================================================================

/// A book, its session and the policy that clears it.
pub struct Market {
    book: OrderBook,
    session: MarketSession,
    policy: Box<dyn ClearingPolicy>,
    /// Fills are not applied to agent accounts when set
    replay: bool,
}

impl fmt::Debug for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Market")
            .field("policy", &self.policy.name())
            .field("orders", &self.book.order_count())
            .field("session", &self.session)
            .field("replay", &self.replay)
            .finish()
    }
}

impl Market {
    pub fn new(policy: Box<dyn ClearingPolicy>) -> Self {
        Self {
            book: OrderBook::new(),
            session: MarketSession::default(),
            policy,
            replay: false,
        }
    }

    pub fn name(&self) -> &'static str {
        self.policy.name()
    }

    pub fn book(&self) -> &OrderBook {
        &self.book
    }

    pub fn book_mut(&mut self) -> &mut OrderBook {
        &mut self.book
    }

    pub fn session(&self) -> &MarketSession {
        &self.session
    }

    pub fn last_price(&self) -> Option<u64> {
        self.session.last_price()
    }

    pub fn is_replay(&self) -> bool {
        self.replay
    }

    pub fn set_replay(&mut self, replay: bool) {
        self.replay = replay;
    }

    /// What an agent may observe before quoting
    pub fn view(&self) -> MarketView {
        MarketView {
            best_bid: self.book.best_bid_price(),
            best_ask: self.book.best_ask_price(),
            last_price: self.session.last_price(),
        }
    }

    pub fn is_valid(&self, account: &Account, order: &Order) -> bool {
        self.policy.is_valid(account, order)
    }

    /// Rest an order; see [`OrderBook::insert`]
    pub fn insert(&mut self, order: Order, uniqueness: Uniqueness) -> u64 {
        self.book.insert(order, uniqueness)
    }

    /// Run the clearing policy at tick `time`
    pub fn clear(&mut self, time: u64) -> Vec<Trade> {
        self.policy.clear(&mut self.book, &mut self.session, time)
    }

    /// Drop every resting order (end-of-day policy)
    pub fn clear_books(&mut self) {
        self.book.clear();
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Known market classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketKind {
    ContinuousOrderDriven,
    HighestQtyFixing,
}

impl MarketKind {
    pub const ALL: [MarketKind; 2] = [MarketKind::ContinuousOrderDriven, MarketKind::HighestQtyFixing];

    pub fn name(self) -> &'static str {
        match self {
            MarketKind::ContinuousOrderDriven => "ContinuousOrderDriven",
            MarketKind::HighestQtyFixing => "HighestQtyFixing",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, ConfigError> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == name)
            .ok_or_else(|| ConfigError::UnknownClass {
                kind: "market",
                name: name.to_string(),
            })
    }

    /// Build a market from its config `args`
    ///
    /// `HighestQtyFixing` reads an optional `tie_break` key; other args are
    /// ignored.
    pub fn build(self, args: &Value) -> Result<Market, ConfigError> {
        let policy: Box<dyn ClearingPolicy> = match self {
            MarketKind::ContinuousOrderDriven => Box::new(ContinuousDoubleAuction::new()),
            MarketKind::HighestQtyFixing => {
                let tie_break = match args.get("tie_break") {
                    None | Some(Value::Null) => TieBreak::default(),
                    Some(Value::String(s)) => s.parse()?,
                    Some(other) => {
                        return Err(ConfigError::InvalidValue {
                            name: "tie_break".to_string(),
                            reason: format!("expected a string, got {other}"),
                        })
                    }
                };
                Box::new(FixingAuction::new(tie_break))
            }
        };
        Ok(Market::new(policy))
    }
}

impl FromStr for MarketKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
