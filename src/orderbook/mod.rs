//! Order book module.
//!
//! ## Architecture
//!
//! - **Slab-based storage**: O(1) order insertion, removal, and lookup
//! - **Price levels**: orders grouped by price using BTreeMap
//! - **Price-time priority**: each level is a FIFO ordered by entry tick
//!
//! ## Components
//!
//! - [`OrderNode`]: `Order` plus linked-list pointers for its price level
//! - [`PriceLevel`]: queue of orders at a single price
//! - [`OrderBook`]: bid and ask sides, uniqueness policy, snapshots
//!
//! ## Performance
//!
//! | Operation | Complexity |
//! |-----------|------------|
//! | Insert (tick order) | O(log L) |
//! | Best bid/ask | O(log L) |
//! | Reduce / pop head | O(log L) |
//! | Withdraw agent's orders | O(k log L) |
//!
//! L = number of price levels, k = orders withdrawn.

pub mod node;
pub mod level;
pub mod book;

pub use node::OrderNode;
pub use level::{LevelIter, PriceLevel};
pub use book::{BookDepth, BookEntry, BookSnapshot, DepthLevel, OrderBook, Uniqueness};
