//! Order node for slab-based storage.
//!
//! `OrderNode` wraps an [`Order`] with doubly-linked list pointers so it can
//! sit in a [`PriceLevel`](super::PriceLevel) queue and be unlinked in O(1)
//! once we have its slab key.
//!
//! ## Linked List
//!
//! Orders at the same price level form a list ordered by time priority:
//! - `prev`: the order ahead in the queue (older)
//! - `next`: the order behind in the queue (newer)

use crate::types::{AgentId, Order};

/// Order node stored in the slab.
///
/// The pointers are slab keys (`usize`), not direct references.
#[derive(Debug, Clone)]
pub struct OrderNode {
    pub order: Order,

    /// Next order in the price level queue (slab key)
    /// None if this is the tail (newest order)
    pub next: Option<usize>,

    /// Previous order in the price level queue (slab key)
    /// None if this is the head (oldest order)
    pub prev: Option<usize>,
}

impl OrderNode {
    /// Create a new order node (not yet linked)
    ///
    /// ```
    /// use market_sim::orderbook::OrderNode;
    /// use market_sim::types::{AgentId, Order, Side};
    ///
    /// let order = Order::new(1, AgentId(7), Side::Buy, 250_000_000, 10, 0);
    /// let node = OrderNode::new(order);
    ///
    /// assert!(node.is_unlinked());
    /// ```
    #[inline]
    pub fn new(order: Order) -> Self {
        Self {
            order,
            next: None,
            prev: None,
        }
    }

    /// Check if this node is unlinked (not part of any price level)
    #[inline]
    pub fn is_unlinked(&self) -> bool {
        self.next.is_none() && self.prev.is_none()
    }

    #[inline]
    pub fn order_id(&self) -> u64 {
        self.order.id
    }

    #[inline]
    pub fn price(&self) -> u64 {
        self.order.price
    }

    #[inline]
    pub fn remaining(&self) -> u64 {
        self.order.remaining
    }

    #[inline]
    pub fn agent(&self) -> AgentId {
        self.order.agent()
    }

    /// Time-priority key within a price level: entry tick, then book id
    #[inline]
    pub fn priority(&self) -> (u64, u64) {
        (self.order.sequence, self.order.id)
    }

    /// Fill a portion of this order
    ///
    /// # Returns
    ///
    /// The actual quantity filled (may be less than requested)
    #[inline]
    pub fn fill(&mut self, quantity: u64) -> u64 {
        self.order.fill(quantity)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
