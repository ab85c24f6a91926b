//! Uniform-price fixing auction.
//!
//! A call auction: the book accumulates orders and every clearing round
//! executes all crossing pairs at one price, the price that lets the most
//! shares trade.
//!
//! ## Price discovery
//!
//! Candidate prices are the distinct limit prices of both sides. For each
//! candidate `p`:
//!
//! ```text
//! demand(p) = Σ bid quantity with price >= p
//! supply(p) = Σ ask quantity with price <= p
//! volume(p) = min(demand(p), supply(p))
//! ```
//!
//! The fixing price maximizes `volume`. Several candidates can reach the
//! maximum (a band of prices); [`TieBreak`] chooses inside the band.

use std::fmt;
use std::str::FromStr;

use log::info;

use crate::engine::{drain_crosses, ClearingPolicy, MarketSession};
use crate::error::ConfigError;
use crate::orderbook::OrderBook;
use crate::types::price::format_2dp;
use crate::types::Trade;

/// Choice among candidate prices with the same maximal volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieBreak {
    /// Highest price of the band
    #[default]
    Highest,
    /// Lowest price of the band
    Lowest,
    /// Candidate closest to the middle of the band, the lower one on a tie
    Midpoint,
}

impl TieBreak {
    pub fn name(self) -> &'static str {
        match self {
            TieBreak::Highest => "highest",
            TieBreak::Lowest => "lowest",
            TieBreak::Midpoint => "midpoint",
        }
    }

    /// Pick from tied candidate prices, given in ascending order
    fn pick(self, tied: &[u64]) -> Option<u64> {
        let (&low, &high) = (tied.first()?, tied.last()?);
        match self {
            TieBreak::Highest => Some(high),
            TieBreak::Lowest => Some(low),
            TieBreak::Midpoint => {
                // Distance to (low + high) / 2, doubled to stay in integers
                let band = low as u128 + high as u128;
                tied.iter()
                    .copied()
                    .min_by_key(|&p| (2 * p as u128).abs_diff(band))
            }
        }
    }
}

impl FromStr for TieBreak {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "highest" => Ok(TieBreak::Highest),
            "lowest" => Ok(TieBreak::Lowest),
            "midpoint" => Ok(TieBreak::Midpoint),
            other => Err(ConfigError::InvalidValue {
                name: "tie_break".to_string(),
                reason: format!("expected highest, lowest or midpoint, got {other:?}"),
            }),
        }
    }
}

impl fmt::Display for TieBreak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Cumulative demand and supply at one candidate price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixingQuote {
    pub price: u64,
    pub demand: u64,
    pub supply: u64,
    /// Executable volume, `min(demand, supply)`; the three totals saturate
    /// at `u64::MAX`
    pub volume: u64,
}

/// Demand and supply at every candidate price, ascending by price
pub fn volume_curve(book: &OrderBook) -> Vec<FixingQuote> {
    let bids: Vec<(u64, u64)> = book
        .bid_levels_iter()
        .map(|level| (level.price, level.total_quantity))
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    let asks: Vec<(u64, u64)> = book
        .ask_levels_iter()
        .map(|level| (level.price, level.total_quantity))
        .collect();

    let mut candidates: Vec<u64> = bids.iter().chain(asks.iter()).map(|&(p, _)| p).collect();
    candidates.sort_unstable();
    candidates.dedup();

    // Sweep upwards: bids drop out below the candidate, asks join at or below it.
    // Sums run in u128 so any mix of u64 quantities fits.
    let mut demand: u128 = bids.iter().map(|&(_, q)| u128::from(q)).sum();
    let mut supply: u128 = 0;
    let (mut next_bid, mut next_ask) = (0, 0);

    candidates
        .into_iter()
        .map(|price| {
            while next_bid < bids.len() && bids[next_bid].0 < price {
                demand -= u128::from(bids[next_bid].1);
                next_bid += 1;
            }
            while next_ask < asks.len() && asks[next_ask].0 <= price {
                supply += u128::from(asks[next_ask].1);
                next_ask += 1;
            }
            FixingQuote {
                price,
                demand: saturate(demand),
                supply: saturate(supply),
                volume: saturate(demand.min(supply)),
            }
        })
        .collect()
}

fn saturate(quantity: u128) -> u64 {
    u64::try_from(quantity).unwrap_or(u64::MAX)
}

/// Clearing policy registered as `HighestQtyFixing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixingAuction {
    tie_break: TieBreak,
}

impl FixingAuction {
    pub fn new(tie_break: TieBreak) -> Self {
        Self { tie_break }
    }

    pub fn tie_break(&self) -> TieBreak {
        self.tie_break
    }

    /// The fixing price for the current book, or None when nothing can trade
    ///
    /// ```
    /// use market_sim::engine::{FixingAuction, TieBreak};
    /// use market_sim::orderbook::{OrderBook, Uniqueness};
    /// use market_sim::types::{AgentId, Order, Side};
    ///
    /// let mut book = OrderBook::new();
    /// book.insert(Order::new(0, AgentId(1), Side::Buy, 300_000_000, 60, 0), Uniqueness::Global);
    /// book.insert(Order::new(0, AgentId(2), Side::Buy, 250_000_000, 10, 1), Uniqueness::Global);
    /// book.insert(Order::new(0, AgentId(3), Side::Sell, 260_000_000, 11, 2), Uniqueness::Global);
    ///
    /// let quote = FixingAuction::new(TieBreak::Highest).quote(&book).unwrap();
    /// assert_eq!((quote.price, quote.volume), (300_000_000, 11));
    /// ```
    pub fn quote(&self, book: &OrderBook) -> Option<FixingQuote> {
        let curve = volume_curve(book);
        let best = curve.iter().map(|q| q.volume).max().filter(|&v| v > 0)?;

        let tied: Vec<u64> = curve
            .iter()
            .filter(|q| q.volume == best)
            .map(|q| q.price)
            .collect();
        let price = self.tie_break.pick(&tied)?;

        curve.into_iter().find(|q| q.price == price)
    }
}

impl ClearingPolicy for FixingAuction {
    fn name(&self) -> &'static str {
        "HighestQtyFixing"
    }

    fn clear(&mut self, book: &mut OrderBook, session: &mut MarketSession, time: u64) -> Vec<Trade> {
        let Some(quote) = self.quote(book) else {
            return Vec::new();
        };

        info!(
            "fixing price {} for {} shares (demand {}, supply {})",
            format_2dp(quote.price),
            quote.volume,
            quote.demand,
            quote.supply
        );
        drain_crosses(book, session, time, |_, _| quote.price)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orderbook::Uniqueness;
    use crate::types::price::to_fixed;
    use crate::types::{AgentId, Order, Side};

    fn px(s: &str) -> u64 {
        to_fixed(s).unwrap()
    }

    fn book_with(orders: &[(Side, &str, u64)]) -> OrderBook {
        let mut book = OrderBook::new();
        for (i, &(side, price, qty)) in orders.iter().enumerate() {
            let agent = AgentId(i as u64 + 1);
            book.insert(Order::new(0, agent, side, px(price), qty, i as u64), Uniqueness::Global);
        }
        book
    }

    #[test]
    fn test_tie_break_parse() {
        assert_eq!("highest".parse::<TieBreak>().unwrap(), TieBreak::Highest);
        assert_eq!("Lowest".parse::<TieBreak>().unwrap(), TieBreak::Lowest);
        assert_eq!("midpoint".parse::<TieBreak>().unwrap(), TieBreak::Midpoint);
        assert!(matches!(
            "first".parse::<TieBreak>(),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert_eq!(TieBreak::default(), TieBreak::Highest);
    }

    #[test]
    fn test_tie_break_pick() {
        let band = [100, 200, 300, 400];
        assert_eq!(TieBreak::Highest.pick(&band), Some(400));
        assert_eq!(TieBreak::Lowest.pick(&band), Some(100));
        // Middle is 250: 200 and 300 are equally close, lower wins
        assert_eq!(TieBreak::Midpoint.pick(&band), Some(200));
        assert_eq!(TieBreak::Midpoint.pick(&[100, 300, 310]), Some(300));
        assert_eq!(TieBreak::Highest.pick(&[]), None);
    }

    #[test]
    fn test_volume_curve() {
        let book = book_with(&[
            (Side::Buy, "3.0", 60),
            (Side::Buy, "2.5", 10),
            (Side::Sell, "2.6", 11),
        ]);

        let curve = volume_curve(&book);
        let rows: Vec<(u64, u64, u64)> =
            curve.iter().map(|q| (q.price, q.demand, q.supply)).collect();
        assert_eq!(
            rows,
            vec![(px("2.5"), 70, 0), (px("2.6"), 60, 11), (px("3.0"), 60, 11)]
        );
    }

    #[test]
    fn test_fixing_scenario_single_price() {
        let mut book = book_with(&[
            (Side::Buy, "3.0", 60),
            (Side::Buy, "2.5", 10),
            (Side::Sell, "2.6", 11),
        ]);
        let mut session = MarketSession::default();
        let mut policy = FixingAuction::default();

        let trades = policy.clear(&mut book, &mut session, 5);

        assert_eq!(trades.iter().map(|t| t.quantity).sum::<u64>(), 11);
        assert!(trades.iter().all(|t| t.price == px("3.0")));
        assert_eq!(session.last_price(), Some(px("3.0")));
        assert!(!book.is_crossed());
        assert_eq!(book.best_bid().unwrap().remaining, 49);
    }

    #[test]
    fn test_tie_break_changes_price_only() {
        for (tie_break, expected) in [
            (TieBreak::Highest, "3.0"),
            (TieBreak::Lowest, "2.6"),
            (TieBreak::Midpoint, "2.6"),
        ] {
            let mut book = book_with(&[
                (Side::Buy, "3.0", 60),
                (Side::Buy, "2.5", 10),
                (Side::Sell, "2.6", 11),
            ]);
            let mut session = MarketSession::default();
            let trades = FixingAuction::new(tie_break).clear(&mut book, &mut session, 0);

            assert_eq!(trades.len(), 1, "{tie_break}");
            assert_eq!(trades[0].price, px(expected), "{tie_break}");
            assert_eq!(trades[0].quantity, 11, "{tie_break}");
        }
    }

    #[test]
    fn test_fixing_many_pairs_share_price() {
        let mut book = book_with(&[
            (Side::Buy, "10.5", 3),
            (Side::Buy, "10.2", 4),
            (Side::Buy, "10.0", 5),
            (Side::Sell, "9.8", 2),
            (Side::Sell, "10.1", 6),
            (Side::Sell, "10.4", 8),
        ]);
        let mut session = MarketSession::default();
        let mut policy = FixingAuction::default();

        let quote = policy.quote(&book).unwrap();
        for other in volume_curve(&book) {
            assert!(quote.volume >= other.volume);
        }

        let trades = policy.clear(&mut book, &mut session, 0);
        assert!(trades.len() > 1);
        assert!(trades.iter().all(|t| t.price == quote.price));
        assert_eq!(trades.iter().map(|t| t.quantity).sum::<u64>(), quote.volume);
        assert!(!book.is_crossed());
    }

    #[test]
    fn test_no_cross_no_fixing() {
        let mut book = book_with(&[(Side::Buy, "2.0", 5), (Side::Sell, "3.0", 5)]);
        let mut session = MarketSession::default();

        assert!(FixingAuction::default().quote(&book).is_none());
        assert!(FixingAuction::default().clear(&mut book, &mut session, 0).is_empty());
        assert_eq!(session.last_price(), None);
    }

    #[test]
    fn test_one_sided_book() {
        let book = book_with(&[(Side::Buy, "2.0", 5), (Side::Buy, "2.1", 5)]);
        assert!(FixingAuction::default().quote(&book).is_none());
        assert!(FixingAuction::default().quote(&OrderBook::new()).is_none());
    }

    #[test]
    fn test_curve_sums_past_u64() {
        let huge = u64::MAX / 2 + 1;
        let book = book_with(&[
            (Side::Buy, "3.0", huge),
            (Side::Buy, "2.9", huge),
            (Side::Sell, "2.5", 10),
        ]);

        let curve = volume_curve(&book);
        assert_eq!(curve[0].price, px("2.5"));
        assert_eq!(curve[0].demand, u64::MAX);
        assert_eq!(curve[0].volume, 10);

        let quote = FixingAuction::default().quote(&book).unwrap();
        assert_eq!((quote.price, quote.demand, quote.volume), (px("3.0"), huge, 10));
    }

    #[test]
    fn test_fixing_volume_saturates() {
        let huge = u64::MAX / 2 + 1;
        let mut book = book_with(&[
            (Side::Buy, "3.0", huge),
            (Side::Buy, "2.9", huge),
            (Side::Sell, "2.0", huge),
            (Side::Sell, "2.1", huge),
        ]);
        let mut session = MarketSession::default();
        let mut policy = FixingAuction::default();

        assert_eq!(policy.quote(&book).unwrap().volume, u64::MAX);

        let trades = policy.clear(&mut book, &mut session, 0);
        assert_eq!(trades.len(), 2);
        assert!(trades.iter().all(|t| t.quantity == huge));
        assert!(book.is_empty());
    }
}
