//! Order types for the simulator.
//!
//! ## SSZ Serialization
//!
//! [`Order`] derives `SimpleSerialize` so resting orders can be hashed into a
//! deterministic book state root. Enum-like fields are therefore stored raw
//! (`side_raw`, `agent_id`) with typed accessors.

use std::fmt;

use ssz_rs::prelude::*;

// ============================================================================
// Side enum
// ============================================================================

/// Order side: Buy or Sell
///
/// Represented as u8 for SSZ and for the order log format:
/// - Buy = 0
/// - Sell = 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Side {
    /// Buy order (bid)
    #[default]
    Buy,
    /// Sell order (ask)
    Sell,
}

impl Side {
    /// Convert to u8 for serialization
    pub fn to_u8(self) -> u8 {
        match self {
            Side::Buy => 0,
            Side::Sell => 1,
        }
    }

    /// Convert from u8 for deserialization
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Side::Buy),
            1 => Some(Side::Sell),
            _ => None,
        }
    }

    /// Returns the opposite side
    pub fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

// ============================================================================
// AgentId
// ============================================================================

/// Identity of the agent that originated an order.
///
/// Only compared for equality (ownership and uniqueness rules) and printed
/// in the order log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct AgentId(pub u64);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// RawOrder
// ============================================================================

/// An order as emitted by an agent, before sanitization.
///
/// Only `direction` is mandatory; the sanitizer fills a missing price from
/// the opposite side of the book and a missing quantity with 1. `agent` is
/// set by replayed orders, which carry their historical originator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawOrder {
    pub direction: Option<Side>,
    /// Limit price, fixed-point
    pub price: Option<u64>,
    pub quantity: Option<u64>,
    pub agent: Option<AgentId>,
}

impl RawOrder {
    /// Order with a direction and nothing else
    pub fn new(direction: Side) -> Self {
        Self {
            direction: Some(direction),
            ..Self::default()
        }
    }

    /// Fully specified limit order
    pub fn limit(direction: Side, price: u64, quantity: u64) -> Self {
        Self::new(direction).with_price(price).with_quantity(quantity)
    }

    pub fn with_price(mut self, price: u64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_quantity(mut self, quantity: u64) -> Self {
        self.quantity = Some(quantity);
        self
    }

    pub fn with_agent(mut self, agent: AgentId) -> Self {
        self.agent = Some(agent);
        self
    }
}

// ============================================================================
// Order struct
// ============================================================================

/// A limit order accepted for the book.
///
/// `sequence` is the scheduler tick at which the order entered the book and
/// is the time-priority key. `id` is assigned by the book on insertion.
///
/// ## Example
///
/// ```
/// use market_sim::types::{AgentId, Order, Side};
///
/// // Buy 10 shares at 2.50, entered at tick 0
/// let order = Order::new(0, AgentId(1), Side::Buy, 250_000_000, 10, 0);
/// assert_eq!(order.side(), Side::Buy);
/// assert_eq!(order.remaining, 10);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, SimpleSerialize)]
pub struct Order {
    /// Book-assigned order identifier (0 = not yet assigned)
    pub id: u64,

    /// Originating agent, raw form of [`AgentId`]
    pub agent_id: u64,

    /// Order side as u8 (0=Buy, 1=Sell)
    pub side_raw: u8,

    /// Limit price in fixed-point (scaled by 10^8)
    pub price: u64,

    /// Original quantity in shares
    pub quantity: u64,

    /// Quantity still resting after partial fills
    pub remaining: u64,

    /// Tick at which the order entered the book
    pub sequence: u64,
}

impl Order {
    pub fn new(
        id: u64,
        agent: AgentId,
        side: Side,
        price: u64,
        quantity: u64,
        sequence: u64,
    ) -> Self {
        Self {
            id,
            agent_id: agent.0,
            side_raw: side.to_u8(),
            price,
            quantity,
            remaining: quantity,
            sequence,
        }
    }

    /// Get the order side
    pub fn side(&self) -> Side {
        Side::from_u8(self.side_raw).unwrap_or(Side::Buy)
    }

    /// Get the originating agent
    pub fn agent(&self) -> AgentId {
        AgentId(self.agent_id)
    }

    /// Check if the order is fully filled
    pub fn is_filled(&self) -> bool {
        self.remaining == 0
    }

    /// Quantity already executed
    pub fn filled_quantity(&self) -> u64 {
        self.quantity.saturating_sub(self.remaining)
    }

    /// Fill a portion of this order
    ///
    /// # Returns
    ///
    /// The actual quantity filled (capped by what remains)
    pub fn fill(&mut self, fill_qty: u64) -> u64 {
        let actual_fill = fill_qty.min(self.remaining);
        self.remaining -= actual_fill;
        actual_fill
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
