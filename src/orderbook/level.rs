//! Price level management for orders at the same price.
//!
//! ## Queue Structure
//!
//! ```text
//! head (oldest) <-> order2 <-> order3 <-> tail (newest)
//! ```
//!
//! The queue is kept sorted by `(sequence, order id)`. Orders normally
//! arrive in tick order and are appended at the tail; an order carrying an
//! older sequence (a book seeded from a snapshot) is walked back into place.
//! Matching consumes orders from the head.

use slab::Slab;

use crate::orderbook::OrderNode;

/// A price level containing orders at a single price.
///
/// The order data lives in the slab; this struct only holds the queue
/// metadata and the aggregate quantity.
#[derive(Debug, Clone)]
pub struct PriceLevel {
    /// Price for this level (fixed-point, scaled by 10^8)
    pub price: u64,

    /// Total remaining quantity at this level
    pub total_quantity: u64,

    /// Head of the order queue (oldest order, slab key)
    pub head: Option<usize>,

    /// Tail of the order queue (newest order, slab key)
    pub tail: Option<usize>,

    pub order_count: usize,
}

impl PriceLevel {
    pub fn new(price: u64) -> Self {
        Self {
            price,
            total_quantity: 0,
            head: None,
            tail: None,
            order_count: 0,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.order_count == 0
    }

    /// Insert an order at its time-priority position
    ///
    /// # Panics
    ///
    /// Panics if the key doesn't exist in the slab
    pub fn insert_sorted(&mut self, key: usize, slab: &mut Slab<OrderNode>) {
        let rank = slab.get(key).expect("Invalid slab key").priority();

        // Last node that sorts at or before the new one
        let mut anchor = self.tail;
        while let Some(k) = anchor {
            let node = slab.get(k).expect("Invalid slab key");
            if node.priority() <= rank {
                break;
            }
            anchor = node.prev;
        }

        match anchor {
            None => self.push_front(key, slab),
            Some(k) if Some(k) == self.tail => self.push_back(key, slab),
            Some(k) => self.link_after(k, key, slab),
        }
    }

    /// Append an order at the tail of the queue
    pub fn push_back(&mut self, key: usize, slab: &mut Slab<OrderNode>) {
        let node = slab.get_mut(key).expect("Invalid slab key");
        let quantity = node.remaining();

        node.prev = self.tail;
        node.next = None;

        if let Some(tail_key) = self.tail {
            let tail_node = slab.get_mut(tail_key).expect("Invalid tail key");
            tail_node.next = Some(key);
        } else {
            self.head = Some(key);
        }

        self.tail = Some(key);
        self.order_count += 1;
        self.total_quantity = self.total_quantity.saturating_add(quantity);
    }

    /// Put an order at the head of the queue
    pub fn push_front(&mut self, key: usize, slab: &mut Slab<OrderNode>) {
        let node = slab.get_mut(key).expect("Invalid slab key");
        let quantity = node.remaining();

        node.prev = None;
        node.next = self.head;

        if let Some(head_key) = self.head {
            let head_node = slab.get_mut(head_key).expect("Invalid head key");
            head_node.prev = Some(key);
        } else {
            self.tail = Some(key);
        }

        self.head = Some(key);
        self.order_count += 1;
        self.total_quantity = self.total_quantity.saturating_add(quantity);
    }

    fn link_after(&mut self, anchor: usize, key: usize, slab: &mut Slab<OrderNode>) {
        let next = slab.get(anchor).expect("Invalid anchor key").next;

        let node = slab.get_mut(key).expect("Invalid slab key");
        let quantity = node.remaining();
        node.prev = Some(anchor);
        node.next = next;

        slab.get_mut(anchor).expect("Invalid anchor key").next = Some(key);
        match next {
            Some(next_key) => slab.get_mut(next_key).expect("Invalid next key").prev = Some(key),
            None => self.tail = Some(key),
        }

        self.order_count += 1;
        self.total_quantity = self.total_quantity.saturating_add(quantity);
    }

    /// Unlink an order from the queue by slab key
    ///
    /// # Returns
    ///
    /// The remaining quantity of the removed order
    pub fn remove(&mut self, key: usize, slab: &mut Slab<OrderNode>) -> u64 {
        let node = slab.get(key).expect("Invalid slab key");
        let quantity = node.remaining();
        let prev_key = node.prev;
        let next_key = node.next;

        if let Some(prev) = prev_key {
            slab.get_mut(prev).expect("Invalid prev key").next = next_key;
        } else {
            self.head = next_key;
        }

        if let Some(next) = next_key {
            slab.get_mut(next).expect("Invalid next key").prev = prev_key;
        } else {
            self.tail = prev_key;
        }

        let node = slab.get_mut(key).expect("Invalid slab key");
        node.prev = None;
        node.next = None;

        self.order_count -= 1;
        self.total_quantity = self.total_quantity.saturating_sub(quantity);

        quantity
    }

    /// Slab key of the head order, the first to be matched
    #[inline]
    pub fn peek_head(&self) -> Option<usize> {
        self.head
    }

    /// Update the total quantity after a partial fill
    pub fn reduce_quantity(&mut self, filled_quantity: u64) {
        self.total_quantity = self.total_quantity.saturating_sub(filled_quantity);
    }

    /// Nodes from oldest to newest
    pub fn iter<'a>(&self, slab: &'a Slab<OrderNode>) -> LevelIter<'a> {
        LevelIter {
            slab,
            cursor: self.head,
            forward: true,
        }
    }

    /// Nodes from newest to oldest
    pub fn iter_rev<'a>(&self, slab: &'a Slab<OrderNode>) -> LevelIter<'a> {
        LevelIter {
            slab,
            cursor: self.tail,
            forward: false,
        }
    }
}

/// Walks a price level queue in either direction.
pub struct LevelIter<'a> {
    slab: &'a Slab<OrderNode>,
    cursor: Option<usize>,
    forward: bool,
}

impl<'a> Iterator for LevelIter<'a> {
    type Item = &'a OrderNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.slab.get(self.cursor?)?;
        self.cursor = if self.forward { node.next } else { node.prev };
        Some(node)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
