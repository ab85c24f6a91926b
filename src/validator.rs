//! Order sanitizer.
//!
//! Turns what an agent said into an order the book can hold:
//!
//! - `direction` is mandatory
//! - a missing price takes the best price of the opposite side (a buy
//!   joins the best ask, a sell the best bid)
//! - a missing quantity is 1
//!
//! When the price must be defaulted and the opposite side is empty there is
//! nothing to default to: the outcome is [`Sanitized::NoReferencePrice`] and
//! the order must not reach the book.

use crate::error::OrderError;
use crate::orderbook::OrderBook;
use crate::types::{AgentId, Order, RawOrder, Side};

/// Outcome of sanitizing a well-formed raw order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sanitized {
    /// Complete order, ready for the book
    Ready(Order),
    /// Price left open and nothing rests on the opposite side
    NoReferencePrice { side: Side },
}

/// Complete `raw` against the current book
///
/// The order is stamped with `sequence` and attributed to the agent carried
/// by `raw`, or `agent` when it carries none.
///
/// # Errors
///
/// `MissingField("direction")` for an order without a side,
/// `NonPositive` for an explicit zero price or quantity. Both mean the
/// agent is broken.
pub fn sanitize(
    raw: &RawOrder,
    agent: AgentId,
    book: &OrderBook,
    sequence: u64,
) -> Result<Sanitized, OrderError> {
    let side = raw.direction.ok_or(OrderError::MissingField("direction"))?;

    let price = match raw.price {
        Some(0) => return Err(OrderError::NonPositive("price")),
        Some(price) => price,
        None => match book.best_price(side.opposite()) {
            Some(price) => price,
            None => return Ok(Sanitized::NoReferencePrice { side }),
        },
    };

    let quantity = match raw.quantity {
        Some(0) => return Err(OrderError::NonPositive("quantity")),
        Some(quantity) => quantity,
        None => 1,
    };

    let owner = raw.agent.unwrap_or(agent);
    Ok(Sanitized::Ready(Order::new(0, owner, side, price, quantity, sequence)))
}

// ============================================================================
// Unit Tests
// ============================================================================
