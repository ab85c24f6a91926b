//! Tick-driving scheduler.
//!
//! ## Per tick
//!
//! 1. Pick an agent uniformly at random, with replacement
//! 2. Ask it for an order
//! 3. Sanitize against the current book
//! 4. Check validity with the market policy
//! 5. Log the order, rest it in the book
//! 6. Run the market's clearing policy
//! 7. Advance the clock
//!
//! A sanitized order with no reference price is deferred (dropped), an
//! invalid one is rejected (dropped); neither stops the run. A malformed
//! order or a failing agent is fatal.
//!
//! At the end of each day the books are optionally emptied and the journal
//! is flushed.

use std::fmt;
use std::io::Write;
use std::str::FromStr;

use log::{debug, info, log_enabled, Level};
use rand::{Rng, RngCore};

use crate::agents::{speak, AgentPool};
use crate::engine::Market;
use crate::error::{ConfigError, SimError, SimResult};
use crate::journal::Journal;
use crate::orderbook::Uniqueness;
use crate::types::price::format_2dp;
use crate::types::{Trade, TradeDigest};
use crate::validator::{sanitize, Sanitized};
use crate::world::World;

/// Book levels shown per side with `show_books`
const SHOWN_LEVELS: usize = 5;

// ============================================================================
// PhaseReport
// ============================================================================

/// Counters of one engine phase (or of a whole run, once merged).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseReport {
    pub ticks: u64,
    pub orders_accepted: u64,
    /// Dropped by the market's validity check
    pub orders_rejected: u64,
    /// Dropped for lack of a reference price
    pub orders_deferred: u64,
    pub trades: u64,
    pub volume: u64,
}

impl PhaseReport {
    pub fn merge(&mut self, other: &PhaseReport) {
        self.ticks += other.ticks;
        self.orders_accepted += other.orders_accepted;
        self.orders_rejected += other.orders_rejected;
        self.orders_deferred += other.orders_deferred;
        self.trades += other.trades;
        self.volume = self.volume.saturating_add(other.volume);
    }

    fn record_trade(&mut self, trade: &Trade) {
        self.trades += 1;
        self.volume = self.volume.saturating_add(trade.quantity);
    }
}

impl fmt::Display for PhaseReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ticks, {} orders ({} rejected, {} deferred), {} trades, volume {}",
            self.ticks,
            self.orders_accepted,
            self.orders_rejected,
            self.orders_deferred,
            self.trades,
            self.volume
        )
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Lifecycle of an engine phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineState {
    #[default]
    Idle,
    Running { day: u64 },
    ClearingDayEnd { day: u64 },
    Finished,
}

/// Asynchronous scheduler: random sampling of agents with replacement,
/// clearing after every accepted order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Engine {
    days: u64,
    ticks_per_day: u64,
    clear_books_at_eod: bool,
    uniqueness: Uniqueness,
    show_books: bool,
    state: EngineState,
}

impl Engine {
    /// Engine clearing books at end of day, with global uniqueness
    pub fn new(days: u64, ticks_per_day: u64) -> Self {
        Self {
            days,
            ticks_per_day,
            clear_books_at_eod: true,
            uniqueness: Uniqueness::default(),
            show_books: false,
            state: EngineState::Idle,
        }
    }

    pub fn with_clear_books_at_eod(mut self, clear: bool) -> Self {
        self.clear_books_at_eod = clear;
        self
    }

    pub fn with_uniqueness(mut self, uniqueness: Uniqueness) -> Self {
        self.uniqueness = uniqueness;
        self
    }

    pub fn with_show_books(mut self, show: bool) -> Self {
        self.show_books = show;
        self
    }

    pub fn days(&self) -> u64 {
        self.days
    }

    pub fn ticks_per_day(&self) -> u64 {
        self.ticks_per_day
    }

    pub fn total_ticks(&self) -> u64 {
        self.days * self.ticks_per_day
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Run every tick of the phase
    ///
    /// The market book is seeded from `world` and the final book and clock
    /// are recorded back into it. Every trade is written to `journal` and
    /// absorbed into `digest`.
    ///
    /// # Errors
    ///
    /// A configuration error if `agents` is empty; otherwise agent
    /// failures, malformed orders and output failures.
    pub fn run<W: Write>(
        &mut self,
        market: &mut Market,
        agents: &mut AgentPool,
        world: &mut dyn World,
        rng: &mut dyn RngCore,
        journal: &mut Journal<W>,
        digest: &mut TradeDigest,
    ) -> SimResult<PhaseReport> {
        if agents.is_empty() {
            return Err(ConfigError::MissingParameter("agents".to_string()).into());
        }

        market.book_mut().load_snapshot(&world.snapshot());
        let mut clock = world.clock();
        let mut report = PhaseReport::default();

        info!(
            "phase start: {} days of {} ticks on {} ({} agents, {} resting orders)",
            self.days,
            self.ticks_per_day,
            market.name(),
            agents.len(),
            market.book().order_count()
        );

        for day in 0..self.days {
            self.state = EngineState::Running { day };
            for _ in 0..self.ticks_per_day {
                self.tick(clock, market, agents, rng, journal, digest, &mut report)?;
                report.ticks += 1;
                clock += 1;
            }

            self.state = EngineState::ClearingDayEnd { day };
            if self.clear_books_at_eod {
                market.clear_books();
            }
            journal.flush()?;
            info!(
                "day {}/{} done at tick {}: {} trades so far, last price {}",
                day + 1,
                self.days,
                clock,
                report.trades,
                market.last_price().map_or_else(|| "none".to_string(), format_2dp)
            );
        }

        world.record(market.book().snapshot(), clock);
        self.state = EngineState::Finished;
        info!("phase end: {report}");
        Ok(report)
    }

    #[allow(clippy::too_many_arguments)]
    fn tick<W: Write>(
        &self,
        clock: u64,
        market: &mut Market,
        agents: &mut AgentPool,
        rng: &mut dyn RngCore,
        journal: &mut Journal<W>,
        digest: &mut TradeDigest,
        report: &mut PhaseReport,
    ) -> SimResult<()> {
        let pick = rng.gen_range(0..agents.len());
        let view = market.view();
        let agent = agents
            .at_mut(pick)
            .expect("agent index drawn within pool bounds");
        let agent_id = agent.id();

        let raw = speak(&mut *agent, rng, &view).map_err(|source| SimError::Agent {
            agent: agent_id,
            source,
        })?;

        let order = match sanitize(&raw, agent_id, market.book(), clock)? {
            Sanitized::Ready(order) => order,
            Sanitized::NoReferencePrice { side } => {
                debug!("tick {clock}: agent {agent_id} {side:?} order has no reference price");
                report.orders_deferred += 1;
                return Ok(());
            }
        };

        if !market.is_valid(agent.account(), &order) {
            debug!("tick {clock}: agent {agent_id} order rejected");
            report.orders_rejected += 1;
            return Ok(());
        }

        journal.record_order(&order)?;
        let (side, price, quantity) = (order.side(), order.price, order.quantity);
        let order_id = market.insert(order, self.uniqueness);
        report.orders_accepted += 1;
        debug!(
            "tick {clock}: agent {agent_id} order #{order_id} {side:?} {quantity} @ {}",
            format_2dp(price)
        );

        if self.show_books && log_enabled!(Level::Debug) {
            debug!("book at tick {clock}\n{}", market.book().depth(SHOWN_LEVELS));
        }

        for trade in market.clear(clock) {
            journal.record_trade(&trade)?;
            digest.push(&trade)?;
            if !market.is_replay() {
                agents.settle(&trade);
            }
            report.record_trade(&trade);
        }
        Ok(())
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Known engine classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    AsynchronousRandWReplace,
}

impl EngineKind {
    pub const ALL: [EngineKind; 1] = [EngineKind::AsynchronousRandWReplace];

    pub fn name(self) -> &'static str {
        match self {
            EngineKind::AsynchronousRandWReplace => "AsynchronousRandWReplace",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, ConfigError> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == name)
            .ok_or_else(|| ConfigError::UnknownClass {
                kind: "engine",
                name: name.to_string(),
            })
    }

    pub fn build(self, days: u64, ticks_per_day: u64) -> Engine {
        match self {
            EngineKind::AsynchronousRandWReplace => Engine::new(days, ticks_per_day),
        }
    }
}

impl FromStr for EngineKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{Account, Agent, MarketView};
    use crate::engine::{ClearingPolicy, ContinuousDoubleAuction, MarketKind, MarketSession};
    use crate::error::{AgentError, OrderError};
    use crate::orderbook::OrderBook;
    use crate::types::Order;
    use crate::types::{AgentId, RawOrder, Side};
    use crate::world::NullWorld;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use rust_decimal_macros::dec;
    use serde_json::Value;
    use std::collections::VecDeque;

    /// Agent replaying a fixed list of orders
    struct Script {
        id: AgentId,
        account: Account,
        orders: VecDeque<RawOrder>,
    }

    impl Agent for Script {
        fn id(&self) -> AgentId {
            self.id
        }
        fn kind(&self) -> &'static str {
            "Script"
        }
        fn account(&self) -> &Account {
            &self.account
        }
        fn account_mut(&mut self) -> &mut Account {
            &mut self.account
        }
        fn produce_order(&mut self, _: &mut dyn RngCore, _: &MarketView) -> Result<RawOrder, AgentError> {
            self.orders.pop_front().ok_or(AgentError::OrderLogExhausted(0))
        }
    }

    fn pool(orders: Vec<RawOrder>) -> AgentPool {
        let mut pool = AgentPool::new();
        pool.push(Box::new(Script {
            id: AgentId(1),
            account: Account::new(dec!(10000), 200),
            orders: orders.into(),
        }));
        pool
    }

    fn continuous() -> Market {
        MarketKind::ContinuousOrderDriven.build(&Value::Null).unwrap()
    }

    fn run(
        engine: &mut Engine,
        market: &mut Market,
        agents: &mut AgentPool,
        world: &mut NullWorld,
    ) -> (SimResult<PhaseReport>, String) {
        let mut journal = Journal::new(Vec::new(), ';');
        let mut digest = TradeDigest::new();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let result = engine.run(market, agents, world, &mut rng, &mut journal, &mut digest);
        let (out, _) = journal.into_inner().unwrap();
        (result, String::from_utf8(out).unwrap())
    }

    /// Continuous market refusing bids above a ceiling
    struct BidCeiling(u64);

    impl ClearingPolicy for BidCeiling {
        fn name(&self) -> &'static str {
            "BidCeiling"
        }

        fn clear(&mut self, book: &mut OrderBook, session: &mut MarketSession, time: u64) -> Vec<Trade> {
            ContinuousDoubleAuction.clear(book, session, time)
        }

        fn is_valid(&self, _account: &Account, order: &Order) -> bool {
            order.side() == Side::Sell || order.price <= self.0
        }
    }

    fn script() -> Vec<RawOrder> {
        vec![
            RawOrder::new(Side::Buy),
            RawOrder::limit(Side::Buy, 250_000_000, 10),
            RawOrder::limit(Side::Sell, 350_000_000, 20),
            RawOrder::limit(Side::Buy, 360_000_000, 15),
        ]
    }

    #[test]
    fn test_no_agents_is_config_error() {
        let mut engine = Engine::new(1, 1);
        let (result, _) = run(&mut engine, &mut continuous(), &mut AgentPool::new(), &mut NullWorld::new());
        assert!(matches!(result, Err(SimError::Config(ConfigError::MissingParameter(_)))));
        assert_eq!(engine.state(), EngineState::Idle);
    }

    #[test]
    fn test_ticks_feed_book_and_journal() {
        let mut engine = Engine::new(1, 4)
            .with_uniqueness(Uniqueness::Disabled)
            .with_clear_books_at_eod(false);
        let mut market = continuous();
        let mut agents = pool(script());
        let mut world = NullWorld::new();

        let (result, out) = run(&mut engine, &mut market, &mut agents, &mut world);
        let report = result.unwrap();

        assert_eq!(report.ticks, 4);
        assert_eq!(report.orders_deferred, 1);
        assert_eq!(report.orders_accepted, 3);
        assert_eq!(report.trades, 1);
        assert_eq!(report.volume, 15);
        assert_eq!(out.lines().last(), Some("3;1;3.50;15"));

        // Resting liquidity is handed to the world
        assert_eq!(world.clock(), 4);
        let snapshot = world.snapshot();
        assert_eq!(snapshot.asks.len(), 1);
        assert_eq!(snapshot.asks[0].quantity, 5);
        assert_eq!(snapshot.bids.len(), 1);
        assert_eq!(engine.state(), EngineState::Finished);

        // Self-trade: the account nets out
        let account = agents.get(AgentId(1)).unwrap().account();
        assert_eq!((account.cash, account.position), (dec!(10000), 200));
    }

    #[test]
    fn test_global_uniqueness_replaces_resting_orders() {
        let mut engine = Engine::new(1, 4).with_clear_books_at_eod(false);
        let mut market = continuous();
        let mut agents = pool(script());

        let (result, _) = run(&mut engine, &mut market, &mut agents, &mut NullWorld::new());
        let report = result.unwrap();

        // Each order removes the previous one: nothing ever crosses
        assert_eq!(report.trades, 0);
        assert_eq!(market.book().order_count(), 1);
        assert_eq!(market.book().best_bid_price(), Some(360_000_000));
    }

    #[test]
    fn test_books_cleared_at_end_of_day() {
        let mut engine = Engine::new(2, 2).with_uniqueness(Uniqueness::Disabled);
        let mut market = continuous();
        let mut agents = pool(script());
        let mut world = NullWorld::new();

        let (result, out) = run(&mut engine, &mut market, &mut agents, &mut world);
        let report = result.unwrap();

        // The bid at 2.50 is gone by day two; the remainder of the ask too
        assert_eq!(report.trades, 1);
        assert_eq!(out.lines().last(), Some("3;1;3.50;15"));
        assert!(market.book().is_empty());
        assert!(world.snapshot().is_empty());
        assert_eq!(world.clock(), 4);
    }

    #[test]
    fn test_phases_chain_through_world() {
        let mut world = NullWorld::new();
        let mut first = Engine::new(1, 3)
            .with_uniqueness(Uniqueness::Disabled)
            .with_clear_books_at_eod(false);
        let mut agents = pool(script());
        run(&mut first, &mut continuous(), &mut agents, &mut world).0.unwrap();
        assert_eq!(world.snapshot().len(), 2);

        let mut second = Engine::new(1, 1).with_uniqueness(Uniqueness::Disabled);
        let mut market = continuous();
        let (result, out) = run(&mut second, &mut market, &mut agents, &mut world);

        assert_eq!(result.unwrap().trades, 1);
        assert_eq!(out.lines().last(), Some("3;1;3.50;15"));
    }

    #[test]
    fn test_replay_mode_skips_settlement() {
        let mut engine = Engine::new(1, 2).with_uniqueness(Uniqueness::Disabled);
        let mut market = continuous();
        market.set_replay(true);
        let mut agents = AgentPool::new();
        agents.push(Box::new(Script {
            id: AgentId(9),
            account: Account::new(dec!(100), 0),
            orders: vec![
                RawOrder::limit(Side::Sell, 350_000_000, 20).with_agent(AgentId(2)),
                RawOrder::limit(Side::Buy, 360_000_000, 15).with_agent(AgentId(9)),
            ]
            .into(),
        }));

        let (result, _) = run(&mut engine, &mut market, &mut agents, &mut NullWorld::new());
        assert_eq!(result.unwrap().trades, 1);

        let account = agents.get(AgentId(9)).unwrap().account();
        assert_eq!((account.cash, account.position), (dec!(100), 0));
    }

    #[test]
    fn test_show_books_does_not_change_outcome() {
        let mut plain = Engine::new(1, 4).with_uniqueness(Uniqueness::Disabled);
        let mut shown = plain.clone().with_show_books(true);

        let (a, out_a) = run(&mut plain, &mut continuous(), &mut pool(script()), &mut NullWorld::new());
        let (b, out_b) = run(&mut shown, &mut continuous(), &mut pool(script()), &mut NullWorld::new());
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(out_a, out_b);
    }

    #[test]
    fn test_agent_failure_is_fatal() {
        let mut engine = Engine::new(1, 5);
        let mut agents = pool(script());

        let (result, _) = run(&mut engine, &mut continuous(), &mut agents, &mut NullWorld::new());
        match result {
            Err(SimError::Agent { agent, source }) => {
                assert_eq!(agent, AgentId(1));
                assert_eq!(source, AgentError::OrderLogExhausted(0));
            }
            other => panic!("expected agent failure, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_order_is_fatal() {
        let mut engine = Engine::new(1, 1);
        let mut agents = pool(vec![RawOrder::default()]);

        let (result, _) = run(&mut engine, &mut continuous(), &mut agents, &mut NullWorld::new());
        assert!(matches!(
            result,
            Err(SimError::Order(OrderError::MissingField("direction")))
        ));
    }

    #[test]
    fn test_rejected_orders_never_reach_book_or_log() {
        let mut engine = Engine::new(1, 3)
            .with_uniqueness(Uniqueness::Disabled)
            .with_clear_books_at_eod(false);
        let mut market = Market::new(Box::new(BidCeiling(300_000_000)));
        let mut agents = pool(vec![
            RawOrder::limit(Side::Buy, 250_000_000, 10),
            RawOrder::limit(Side::Sell, 350_000_000, 20),
            RawOrder::limit(Side::Buy, 360_000_000, 15),
        ]);

        let mut journal = Journal::new(Vec::new(), ';').with_order_log(Vec::new());
        let mut digest = TradeDigest::new();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let report = engine
            .run(&mut market, &mut agents, &mut NullWorld::new(), &mut rng, &mut journal, &mut digest)
            .unwrap();
        let (_, orders) = journal.into_inner().unwrap();
        let orders = String::from_utf8(orders.unwrap()).unwrap();

        assert_eq!(report.ticks, 3);
        assert_eq!(report.orders_accepted, 2);
        assert_eq!(report.orders_rejected, 1);
        assert_eq!(report.trades, 0);

        // The 3.60 bid would have crossed the 3.50 ask
        assert_eq!(market.book().order_count(), 2);
        assert_eq!(market.book().best_bid_price(), Some(250_000_000));
        assert_eq!(market.book().best_ask_price(), Some(350_000_000));
        let logged: Vec<&str> = orders.lines().filter(|line| !line.starts_with('#')).collect();
        assert_eq!(logged, vec!["0;2.50;10;1", "1;3.50;20;1"]);
    }

    #[test]
    fn test_report_volume_saturates() {
        let mut report = PhaseReport::default();
        report.record_trade(&Trade::new(1, 0, 1, 2, AgentId(1), AgentId(2), 100, u64::MAX));
        report.record_trade(&Trade::new(2, 0, 3, 4, AgentId(1), AgentId(2), 100, 1));
        assert_eq!((report.trades, report.volume), (2, u64::MAX));

        let mut total = PhaseReport { volume: 5, ..PhaseReport::default() };
        total.merge(&report);
        assert_eq!(total.volume, u64::MAX);
        assert_eq!(total.trades, 2);
    }

    #[test]
    fn test_registry() {
        let engine = EngineKind::from_name("AsynchronousRandWReplace").unwrap().build(3, 10);
        assert_eq!(engine.total_ticks(), 30);
        assert!("SynchronousEngine".parse::<EngineKind>().is_err());
    }
}
