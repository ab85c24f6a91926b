//! Crossing drain shared by every clearing policy.
//!
//! Both auctions execute the same way once a price rule is fixed: match the
//! best bid against the best ask while they cross, trade the smaller of the
//! two remaining quantities, shrink or remove the heads, repeat.

use log::debug;

use crate::engine::MarketSession;
use crate::orderbook::OrderBook;
use crate::types::price::format_2dp;
use crate::types::{Order, Trade};

/// Execute every crossing pair at the price chosen by `price_rule`
///
/// `price_rule` receives the best bid and the best ask of each pair.
///
/// # Returns
///
/// The executed trades, in execution order. Empty when the book does not
/// cross, so calling this twice in a row is harmless.
pub fn drain_crosses<F>(
    book: &mut OrderBook,
    session: &mut MarketSession,
    time: u64,
    mut price_rule: F,
) -> Vec<Trade>
where
    F: FnMut(&Order, &Order) -> u64,
{
    let mut trades = Vec::new();

    loop {
        let (bid, ask) = match (book.best_bid(), book.best_ask()) {
            (Some(bid), Some(ask)) if ask.price <= bid.price => (bid, ask),
            _ => break,
        };

        let quantity = bid.remaining.min(ask.remaining);
        let price = price_rule(bid, ask);
        let trade = Trade::new(
            session.next_transaction(),
            time,
            bid.id,
            ask.id,
            bid.agent(),
            ask.agent(),
            price,
            quantity,
        );

        book.reduce_best_bid(quantity);
        book.reduce_best_ask(quantity);
        session.record_price(price);

        debug!(
            "trade #{} t={} {} x {} buyer={} seller={}",
            trade.id,
            time,
            format_2dp(price),
            quantity,
            trade.buyer_id,
            trade.seller_id
        );
        trades.push(trade);
    }

    trades
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orderbook::Uniqueness;
    use crate::types::{AgentId, Side};

    fn order(agent: u64, side: Side, price: u64, qty: u64, seq: u64) -> Order {
        Order::new(0, AgentId(agent), side, price, qty, seq)
    }

    #[test]
    fn test_no_cross_no_trades() {
        let mut book = OrderBook::new();
        let mut session = MarketSession::default();

        book.insert(order(1, Side::Buy, 250_000_000, 10, 0), Uniqueness::Disabled);
        book.insert(order(2, Side::Sell, 350_000_000, 10, 1), Uniqueness::Disabled);

        let trades = drain_crosses(&mut book, &mut session, 2, |bid, _| bid.price);
        assert!(trades.is_empty());
        assert_eq!(session.transactions(), 0);
        assert_eq!(book.order_count(), 2);
    }

    #[test]
    fn test_sweeps_several_levels() {
        let mut book = OrderBook::new();
        let mut session = MarketSession::default();

        book.insert(order(1, Side::Sell, 100_000_000, 5, 0), Uniqueness::Disabled);
        book.insert(order(2, Side::Sell, 110_000_000, 5, 1), Uniqueness::Disabled);
        book.insert(order(3, Side::Sell, 120_000_000, 5, 2), Uniqueness::Disabled);
        book.insert(order(4, Side::Buy, 115_000_000, 12, 3), Uniqueness::Disabled);

        let trades = drain_crosses(&mut book, &mut session, 3, |_, ask| ask.price);

        assert_eq!(trades.len(), 2);
        assert_eq!((trades[0].id, trades[0].quantity), (1, 5));
        assert_eq!((trades[1].id, trades[1].quantity), (2, 5));
        assert_eq!(session.last_price(), Some(110_000_000));

        // Remainder rests, no residual cross
        assert_eq!(book.best_bid().unwrap().remaining, 2);
        assert_eq!(book.best_ask_price(), Some(120_000_000));
        assert!(!book.is_crossed());
        book.assert_invariants();
    }
}
