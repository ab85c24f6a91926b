//! Limit order book for the simulator.
//!
//! ## Architecture
//!
//! - **Slab**: pre-allocated storage for O(1) order insert, remove and lookup
//! - **BTreeMap**: sorted price levels for best bid/ask lookup
//! - **HashMap**: order id to slab key, agent to resting order ids
//!
//! ## Price Ordering
//!
//! - **Bids**: best = highest price, oldest first
//! - **Asks**: best = lowest price, oldest first
//!
//! [`OrderBook::bids`] and [`OrderBook::asks`] expose the entries in the
//! canonical sort order: asks ascending by `(price, sequence)`, bids
//! ascending by `(price, -sequence)` so the best bid is the *last* entry.
//!
//! The book never matches by itself. Crossing entries are drained by a
//! clearing policy (see [`crate::engine`]).
//!
//! ## Example
//!
//! ```
//! use market_sim::orderbook::{OrderBook, Uniqueness};
//! use market_sim::types::{AgentId, Order, Side};
//!
//! let mut book = OrderBook::with_capacity(1_000);
//!
//! book.insert(Order::new(0, AgentId(1), Side::Buy, 250_000_000, 10, 0), Uniqueness::Global);
//! book.insert(Order::new(0, AgentId(2), Side::Sell, 350_000_000, 20, 1), Uniqueness::Global);
//!
//! assert_eq!(book.best_bid_price(), Some(250_000_000));
//! assert_eq!(book.best_ask_price(), Some(350_000_000));
//! assert!(!book.is_crossed());
//! ```

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use log::debug;
use sha2::{Digest, Sha256};
use slab::Slab;

use crate::error::{SimError, SimResult};
use crate::orderbook::{OrderNode, PriceLevel};
use crate::types::price::format_2dp;
use crate::types::{AgentId, Order, Side};

// ============================================================================
// Uniqueness policy
// ============================================================================

/// How many resting orders an agent may hold.
///
/// On insertion the agent's previous orders in scope are withdrawn first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Uniqueness {
    /// Agents may stack any number of orders
    Disabled,
    /// At most one resting order per agent on each side
    PerSide,
    /// At most one resting order per agent across both sides
    #[default]
    Global,
}

impl Uniqueness {
    /// Build the policy from the `unique_by_agent` flag and its scope
    pub fn from_flags(unique_by_agent: bool, per_side: bool) -> Self {
        match (unique_by_agent, per_side) {
            (false, _) => Uniqueness::Disabled,
            (true, true) => Uniqueness::PerSide,
            (true, false) => Uniqueness::Global,
        }
    }
}

// ============================================================================
// Snapshot and depth views
// ============================================================================

/// One resting order as seen from outside the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookEntry {
    pub price: u64,
    pub sequence: u64,
    /// Remaining quantity
    pub quantity: u64,
    pub agent: AgentId,
}

impl BookEntry {
    fn to_order(self, side: Side) -> Order {
        Order::new(0, self.agent, side, self.price, self.quantity, self.sequence)
    }
}

impl From<&Order> for BookEntry {
    fn from(order: &Order) -> Self {
        Self {
            price: order.price,
            sequence: order.sequence,
            quantity: order.remaining,
            agent: order.agent(),
        }
    }
}

/// Both sides of a book in canonical sort order.
///
/// Used to carry resting liquidity between engine phases.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookSnapshot {
    pub bids: Vec<BookEntry>,
    pub asks: Vec<BookEntry>,
}

impl BookSnapshot {
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bids.len() + self.asks.len()
    }
}

/// Aggregate of one price level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthLevel {
    pub price: u64,
    pub quantity: u64,
    pub orders: usize,
}

/// Top levels of each side, best first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookDepth {
    pub bids: Vec<DepthLevel>,
    pub asks: Vec<DepthLevel>,
}

impl fmt::Display for BookDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "asks:")?;
        for level in self.asks.iter().rev() {
            writeln!(f, "  {:>10} x {} ({})", format_2dp(level.price), level.quantity, level.orders)?;
        }
        writeln!(f, "bids:")?;
        for level in &self.bids {
            writeln!(f, "  {:>10} x {} ({})", format_2dp(level.price), level.quantity, level.orders)?;
        }
        Ok(())
    }
}

// ============================================================================
// OrderBook
// ============================================================================

#[derive(Debug)]
pub struct OrderBook {
    /// Resting order storage
    orders: Slab<OrderNode>,

    /// Bid price levels (sorted high to low)
    bids: BTreeMap<Reverse<u64>, PriceLevel>,

    /// Ask price levels (sorted low to high)
    asks: BTreeMap<u64, PriceLevel>,

    /// Order ID to slab key
    order_index: HashMap<u64, usize>,

    /// Agent to its resting order IDs
    agent_index: HashMap<AgentId, BTreeSet<u64>>,

    /// Next order ID (auto-assignment); survives `clear()`
    next_order_id: u64,

    bid_count: usize,
    ask_count: usize,
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderBook {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create a book with pre-allocated capacity
    ///
    /// ```
    /// use market_sim::orderbook::OrderBook;
    ///
    /// let book = OrderBook::with_capacity(10_000);
    /// assert!(book.capacity() >= 10_000);
    /// ```
    pub fn with_capacity(order_capacity: usize) -> Self {
        Self {
            orders: Slab::with_capacity(order_capacity),
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            order_index: HashMap::with_capacity(order_capacity),
            agent_index: HashMap::new(),
            next_order_id: 1,
            bid_count: 0,
            ask_count: 0,
        }
    }

    /// Build a book holding exactly the entries of a snapshot
    pub fn from_snapshot(snapshot: &BookSnapshot) -> Self {
        let mut book = Self::with_capacity(snapshot.len());
        book.load_snapshot(snapshot);
        book
    }

    // ========================================================================
    // Capacity and Size
    // ========================================================================

    #[inline]
    pub fn capacity(&self) -> usize {
        self.orders.capacity()
    }

    #[inline]
    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    #[inline]
    pub fn bid_count(&self) -> usize {
        self.bid_count
    }

    #[inline]
    pub fn ask_count(&self) -> usize {
        self.ask_count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    #[inline]
    pub fn bid_levels(&self) -> usize {
        self.bids.len()
    }

    #[inline]
    pub fn ask_levels(&self) -> usize {
        self.asks.len()
    }

    // ========================================================================
    // Order Management
    // ========================================================================

    /// Add a resting order
    ///
    /// Under `Uniqueness::Global` / `PerSide` the agent's previous orders in
    /// scope are withdrawn first. An order with `id == 0` gets the next book
    /// id.
    ///
    /// # Returns
    ///
    /// The book id of the inserted order
    ///
    /// # Panics
    ///
    /// Panics if the order has no remaining quantity or a zero price, or if
    /// its id is already resting.
    pub fn insert(&mut self, mut order: Order, uniqueness: Uniqueness) -> u64 {
        assert!(order.remaining > 0, "order {} has no quantity to rest", order.id);
        assert!(order.price > 0, "order {} has no price", order.id);

        let side = order.side();
        let agent = order.agent();

        let scope = match uniqueness {
            Uniqueness::Disabled => None,
            Uniqueness::PerSide => Some(Some(side)),
            Uniqueness::Global => Some(None),
        };
        if let Some(scope) = scope {
            let withdrawn = self.remove_agent_orders(agent, scope);
            if !withdrawn.is_empty() {
                debug!("agent {} replaced {} resting order(s)", agent, withdrawn.len());
            }
        }

        if order.id == 0 {
            order.id = self.next_order_id;
            self.next_order_id += 1;
        } else {
            self.next_order_id = self.next_order_id.max(order.id + 1);
        }
        let order_id = order.id;
        let price = order.price;
        assert!(
            !self.order_index.contains_key(&order_id),
            "order {} is already resting",
            order_id
        );

        let key = self.orders.insert(OrderNode::new(order));
        self.order_index.insert(order_id, key);
        self.agent_index.entry(agent).or_default().insert(order_id);

        match side {
            Side::Buy => {
                let level = self
                    .bids
                    .entry(Reverse(price))
                    .or_insert_with(|| PriceLevel::new(price));
                level.insert_sorted(key, &mut self.orders);
                self.bid_count += 1;
            }
            Side::Sell => {
                let level = self
                    .asks
                    .entry(price)
                    .or_insert_with(|| PriceLevel::new(price));
                level.insert_sorted(key, &mut self.orders);
                self.ask_count += 1;
            }
        }

        order_id
    }

    /// Remove an order by slab key
    fn remove_order(&mut self, key: usize) -> Option<Order> {
        let node = self.orders.get(key)?;
        let order_id = node.order_id();
        let price = node.price();
        let agent = node.agent();
        let side = node.order.side();

        match side {
            Side::Buy => {
                if let Some(level) = self.bids.get_mut(&Reverse(price)) {
                    level.remove(key, &mut self.orders);
                    self.bid_count -= 1;
                    if level.is_empty() {
                        self.bids.remove(&Reverse(price));
                    }
                }
            }
            Side::Sell => {
                if let Some(level) = self.asks.get_mut(&price) {
                    level.remove(key, &mut self.orders);
                    self.ask_count -= 1;
                    if level.is_empty() {
                        self.asks.remove(&price);
                    }
                }
            }
        }

        self.order_index.remove(&order_id);
        if let Some(ids) = self.agent_index.get_mut(&agent) {
            ids.remove(&order_id);
            if ids.is_empty() {
                self.agent_index.remove(&agent);
            }
        }

        Some(self.orders.remove(key).order)
    }

    /// Withdraw every resting order of `agent`, on one side or on both
    ///
    /// # Returns
    ///
    /// The withdrawn orders, oldest book id first
    pub fn remove_agent_orders(&mut self, agent: AgentId, side: Option<Side>) -> Vec<Order> {
        let ids: Vec<u64> = match self.agent_index.get(&agent) {
            Some(ids) => ids.iter().copied().collect(),
            None => return Vec::new(),
        };

        let mut removed = Vec::new();
        for id in ids {
            let Some(&key) = self.order_index.get(&id) else {
                continue;
            };
            if side.map_or(true, |s| self.orders[key].order.side() == s) {
                if let Some(order) = self.remove_order(key) {
                    removed.push(order);
                }
            }
        }
        removed
    }

    fn get_order(&self, order_id: u64) -> Option<&Order> {
        let key = self.order_index.get(&order_id)?;
        self.orders.get(*key).map(|node| &node.order)
    }

    /// Resting orders of one agent, oldest book id first
    pub fn orders_of(&self, agent: AgentId) -> Vec<&Order> {
        self.agent_index
            .get(&agent)
            .into_iter()
            .flatten()
            .filter_map(|id| self.get_order(*id))
            .collect()
    }

    // ========================================================================
    // Best Bid/Ask
    // ========================================================================

    /// Highest-priority bid, or None for an empty side
    pub fn best_bid(&self) -> Option<&Order> {
        let key = self.bids.values().next()?.peek_head()?;
        self.orders.get(key).map(|node| &node.order)
    }

    /// Highest-priority ask, or None for an empty side
    pub fn best_ask(&self) -> Option<&Order> {
        let key = self.asks.values().next()?.peek_head()?;
        self.orders.get(key).map(|node| &node.order)
    }

    #[inline]
    pub fn best_bid_price(&self) -> Option<u64> {
        self.bids.keys().next().map(|r| r.0)
    }

    #[inline]
    pub fn best_ask_price(&self) -> Option<u64> {
        self.asks.keys().next().copied()
    }

    /// Best price resting on `side`
    pub fn best_price(&self, side: Side) -> Option<u64> {
        match side {
            Side::Buy => self.best_bid_price(),
            Side::Sell => self.best_ask_price(),
        }
    }

    /// True when the best ask is at or below the best bid
    pub fn is_crossed(&self) -> bool {
        matches!(
            (self.best_bid_price(), self.best_ask_price()),
            (Some(bid), Some(ask)) if ask <= bid
        )
    }

    // ========================================================================
    // Head mutation (for clearing policies)
    // ========================================================================

    pub fn pop_best_bid(&mut self) -> Option<Order> {
        let key = self.bids.values().next()?.peek_head()?;
        self.remove_order(key)
    }

    pub fn pop_best_ask(&mut self) -> Option<Order> {
        let key = self.asks.values().next()?.peek_head()?;
        self.remove_order(key)
    }

    /// Shrink the best bid by `qty`; the entry is removed once exhausted
    ///
    /// # Returns
    ///
    /// The bid's remaining quantity
    ///
    /// # Panics
    ///
    /// Panics on an empty bid side or if `qty` exceeds the remaining quantity.
    pub fn reduce_best_bid(&mut self, qty: u64) -> u64 {
        self.reduce_best(Side::Buy, qty)
    }

    /// Shrink the best ask by `qty`; see [`OrderBook::reduce_best_bid`]
    pub fn reduce_best_ask(&mut self, qty: u64) -> u64 {
        self.reduce_best(Side::Sell, qty)
    }

    fn reduce_best(&mut self, side: Side, qty: u64) -> u64 {
        let level = match side {
            Side::Buy => self.bids.values_mut().next(),
            Side::Sell => self.asks.values_mut().next(),
        }
        .unwrap_or_else(|| panic!("reduce on empty {:?} side", side));
        let key = level.peek_head().expect("non-empty level without head");

        let node = &mut self.orders[key];
        assert!(
            qty <= node.remaining(),
            "reduce by {} exceeds remaining {} of order {}",
            qty,
            node.remaining(),
            node.order_id()
        );
        node.fill(qty);
        let remaining = node.remaining();
        level.reduce_quantity(qty);

        if remaining == 0 {
            self.remove_order(key);
        }
        remaining
    }

    // ========================================================================
    // Views
    // ========================================================================

    /// Bids ascending by `(price, -sequence)`: the best bid comes last
    pub fn bids(&self) -> impl Iterator<Item = &Order> + '_ {
        self.bids
            .values()
            .rev()
            .flat_map(move |level| level.iter_rev(&self.orders))
            .map(|node| &node.order)
    }

    /// Asks ascending by `(price, sequence)`: the best ask comes first
    pub fn asks(&self) -> impl Iterator<Item = &Order> + '_ {
        self.asks
            .values()
            .flat_map(move |level| level.iter(&self.orders))
            .map(|node| &node.order)
    }

    /// Bid price levels, best (highest) first
    pub fn bid_levels_iter(&self) -> impl Iterator<Item = &PriceLevel> + '_ {
        self.bids.values()
    }

    /// Ask price levels, best (lowest) first
    pub fn ask_levels_iter(&self) -> impl Iterator<Item = &PriceLevel> + '_ {
        self.asks.values()
    }

    /// Top `n` levels per side
    pub fn depth(&self, n: usize) -> BookDepth {
        let summarize = |level: &PriceLevel| DepthLevel {
            price: level.price,
            quantity: level.total_quantity,
            orders: level.order_count,
        };
        BookDepth {
            bids: self.bids.values().take(n).map(summarize).collect(),
            asks: self.asks.values().take(n).map(summarize).collect(),
        }
    }

    pub fn snapshot(&self) -> BookSnapshot {
        BookSnapshot {
            bids: self.bids().map(BookEntry::from).collect(),
            asks: self.asks().map(BookEntry::from).collect(),
        }
    }

    /// Replace the contents of the book with a snapshot
    ///
    /// Entries get fresh book ids; sequences and quantities are kept.
    pub fn load_snapshot(&mut self, snapshot: &BookSnapshot) {
        self.clear();
        for entry in &snapshot.bids {
            self.insert(entry.to_order(Side::Buy), Uniqueness::Disabled);
        }
        for entry in &snapshot.asks {
            self.insert(entry.to_order(Side::Sell), Uniqueness::Disabled);
        }
    }

    /// SHA-256 over the SSZ encoding of every resting order,
    /// asks then bids, in canonical order
    pub fn compute_state_root(&self) -> SimResult<[u8; 32]> {
        let mut hasher = Sha256::new();
        for order in self.asks().chain(self.bids()) {
            let bytes =
                ssz_rs::serialize(order).map_err(|e| SimError::Encoding(format!("{e:?}")))?;
            hasher.update(&bytes);
        }
        Ok(hasher.finalize().into())
    }

    /// Empty both sides. Book ids keep counting.
    pub fn clear(&mut self) {
        self.orders.clear();
        self.bids.clear();
        self.asks.clear();
        self.order_index.clear();
        self.agent_index.clear();
        self.bid_count = 0;
        self.ask_count = 0;
    }

    /// Verify the structural invariants of the book
    ///
    /// # Panics
    ///
    /// Panics with a description of the first broken invariant.
    pub fn assert_invariants(&self) {
        let mut counted = 0;
        for (side, levels) in [
            (Side::Buy, self.bids.values().collect::<Vec<_>>()),
            (Side::Sell, self.asks.values().collect::<Vec<_>>()),
        ] {
            for level in levels {
                assert!(!level.is_empty(), "empty {:?} level {} kept", side, level.price);
                let nodes: Vec<&OrderNode> = level.iter(&self.orders).collect();
                assert_eq!(nodes.len(), level.order_count, "level {} count", level.price);
                let total: u64 = nodes.iter().map(|n| n.remaining()).sum();
                assert_eq!(total, level.total_quantity, "level {} quantity", level.price);
                for node in &nodes {
                    assert_eq!(node.price(), level.price, "order {} level", node.order_id());
                    assert_eq!(node.order.side(), side, "order {} side", node.order_id());
                    assert!(node.remaining() > 0, "order {} exhausted", node.order_id());
                }
                for pair in nodes.windows(2) {
                    assert!(
                        pair[0].priority() < pair[1].priority(),
                        "level {} out of time priority",
                        level.price
                    );
                }
                counted += nodes.len();
            }
        }
        assert_eq!(counted, self.orders.len(), "orphaned orders in slab");
        assert_eq!(self.bid_count + self.ask_count, self.orders.len());
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
