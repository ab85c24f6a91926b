//! Trading agents.
//!
//! An agent owns an [`Account`] and, when the scheduler picks it, produces
//! one [`RawOrder`]. Fills come back through [`Agent::notify_fill`]. Agents
//! never touch the book; they only see a [`MarketView`].
//!
//! ## Kinds
//!
//! | Class name | Type | Args |
//! |------------|------|------|
//! | `ZeroIntelligenceTrader` | [`ZeroIntelligenceTrader`] | `[max_price, max_buy]` |
//! | `RandomTrader` | [`RandomTrader`] | `[avg_price, max_fluct, max_buy]` |
//! | `PlayOrderLogFile` | [`ReplayAgent`] | `[filename]` |

pub mod zero_intelligence;
pub mod random_trader;
pub mod replay;

pub use random_trader::RandomTrader;
pub use replay::{OrderLogReader, ReplayAgent, ReplaySources, SharedOrderLog};
pub use zero_intelligence::ZeroIntelligenceTrader;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use log::debug;
use rand::RngCore;
use rust_decimal::Decimal;
use serde_json::Value;

use crate::error::{AgentError, ConfigError};
use crate::types::price::{decimal_to_fixed, format_decimal_2dp, notional, SCALE};
use crate::types::{AgentId, RawOrder, Side, Trade};

// ============================================================================
// Account
// ============================================================================

/// Cash and shares held by an agent.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Account {
    pub cash: Decimal,
    pub position: i64,
}

impl Account {
    pub fn new(cash: Decimal, position: i64) -> Self {
        Self { cash, position }
    }

    /// Book one leg of a trade: a buy pays the notional and receives the
    /// shares, a sell mirrors it.
    pub fn apply_fill(&mut self, side: Side, price: u64, quantity: u64) {
        let shares = i64::try_from(quantity).expect("fill quantity exceeds i64");
        let value = notional(price, quantity);
        match side {
            Side::Buy => {
                self.cash -= value;
                self.position += shares;
            }
            Side::Sell => {
                self.cash += value;
                self.position -= shares;
            }
        }
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "owns ${} and {:>6} securities",
            format_decimal_2dp(self.cash),
            self.position
        )
    }
}

/// Read-only market state offered to agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MarketView {
    pub best_bid: Option<u64>,
    pub best_ask: Option<u64>,
    pub last_price: Option<u64>,
}

// ============================================================================
// Agent trait
// ============================================================================

pub trait Agent {
    fn id(&self) -> AgentId;

    /// Class name, as used in configs
    fn kind(&self) -> &'static str;

    fn account(&self) -> &Account;

    fn account_mut(&mut self) -> &mut Account;

    /// Decide on one order. Randomness must come from `rng` only.
    fn produce_order(
        &mut self,
        rng: &mut dyn RngCore,
        view: &MarketView,
    ) -> Result<RawOrder, AgentError>;

    /// One leg of an executed trade
    fn notify_fill(&mut self, side: Side, price: u64, quantity: u64) {
        self.account_mut().apply_fill(side, price, quantity);
    }
}

/// Ask `agent` for an order and attribute it to the agent unless the order
/// already names its originator.
pub fn speak(
    agent: &mut dyn Agent,
    rng: &mut dyn RngCore,
    view: &MarketView,
) -> Result<RawOrder, AgentError> {
    let mut order = agent.produce_order(rng, view)?;
    if order.agent.is_none() {
        order.agent = Some(agent.id());
    }
    Ok(order)
}

// ============================================================================
// AgentPool
// ============================================================================

/// All agents of a run, in configuration order.
#[derive(Default)]
pub struct AgentPool {
    agents: Vec<Box<dyn Agent>>,
    index: HashMap<AgentId, usize>,
}

impl fmt::Debug for AgentPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentPool").field("agents", &self.agents.len()).finish()
    }
}

impl AgentPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Panics
    ///
    /// Panics if an agent with the same id is already in the pool.
    pub fn push(&mut self, agent: Box<dyn Agent>) {
        let id = agent.id();
        assert!(!self.index.contains_key(&id), "duplicate agent id {}", id);
        self.index.insert(id, self.agents.len());
        self.agents.push(agent);
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn get(&self, id: AgentId) -> Option<&dyn Agent> {
        let i = *self.index.get(&id)?;
        Some(self.agents[i].as_ref())
    }

    pub fn get_mut(&mut self, id: AgentId) -> Option<&mut (dyn Agent + 'static)> {
        let i = *self.index.get(&id)?;
        Some(self.agents[i].as_mut())
    }

    /// Agent at a position in configuration order
    pub fn at_mut(&mut self, position: usize) -> Option<&mut (dyn Agent + 'static)> {
        self.agents.get_mut(position).map(|agent| agent.as_mut())
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Agent> + '_ {
        self.agents.iter().map(|agent| agent.as_ref())
    }

    /// Notify buyer and seller of a trade
    pub fn settle(&mut self, trade: &Trade) {
        for (id, side) in [(trade.buyer(), Side::Buy), (trade.seller(), Side::Sell)] {
            match self.get_mut(id) {
                Some(agent) => agent.notify_fill(side, trade.price, trade.quantity),
                None => debug!("trade #{} names unknown agent {}", trade.id, id),
            }
        }
    }

    pub fn total_cash(&self) -> Decimal {
        self.agents.iter().map(|a| a.account().cash).sum()
    }

    pub fn total_position(&self) -> i64 {
        self.agents.iter().map(|a| a.account().position).sum()
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Known agent classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentKind {
    ZeroIntelligenceTrader,
    RandomTrader,
    PlayOrderLogFile,
}

impl AgentKind {
    pub const ALL: [AgentKind; 3] = [
        AgentKind::ZeroIntelligenceTrader,
        AgentKind::RandomTrader,
        AgentKind::PlayOrderLogFile,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AgentKind::ZeroIntelligenceTrader => "ZeroIntelligenceTrader",
            AgentKind::RandomTrader => "RandomTrader",
            AgentKind::PlayOrderLogFile => "PlayOrderLogFile",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, ConfigError> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == name)
            .ok_or_else(|| ConfigError::UnknownClass {
                kind: "agent",
                name: name.to_string(),
            })
    }

    /// Replay agents put markets in replay mode
    pub fn is_replay(self) -> bool {
        self == AgentKind::PlayOrderLogFile
    }

    /// Instantiate one agent from its positional `args`
    pub fn build(
        self,
        id: AgentId,
        account: Account,
        args: &Value,
        sources: &mut ReplaySources,
    ) -> Result<Box<dyn Agent>, ConfigError> {
        Ok(match self {
            AgentKind::ZeroIntelligenceTrader => {
                Box::new(ZeroIntelligenceTrader::from_args(id, account, args)?)
            }
            AgentKind::RandomTrader => Box::new(RandomTrader::from_args(id, account, args)?),
            AgentKind::PlayOrderLogFile => {
                let filename = arg_str(args, 0, "filename")?;
                Box::new(ReplayAgent::new(id, account, sources.open(filename)?))
            }
        })
    }
}

impl FromStr for AgentKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

// ============================================================================
// Positional argument helpers
// ============================================================================

fn positional<'a>(args: &'a Value, index: usize, name: &str) -> Result<&'a Value, ConfigError> {
    args.as_array()
        .and_then(|list| list.get(index))
        .filter(|value| !value.is_null())
        .ok_or_else(|| ConfigError::MissingParameter(name.to_string()))
}

fn invalid(name: &str, value: &Value, expected: &str) -> ConfigError {
    ConfigError::InvalidValue {
        name: name.to_string(),
        reason: format!("expected {expected}, got {value}"),
    }
}

/// Highest price an agent may be configured with (1,000,000.00)
pub const MAX_AGENT_PRICE: u64 = 1_000_000 * SCALE;

/// Largest order size an agent may be configured with
pub const MAX_AGENT_QUANTITY: u64 = 1_000_000_000;

/// Positional price argument, converted to fixed-point, at most
/// [`MAX_AGENT_PRICE`]
pub(crate) fn arg_price(args: &Value, index: usize, name: &str) -> Result<u64, ConfigError> {
    let value = positional(args, index, name)?;
    let parsed = match value {
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        _ => None,
    };
    parsed
        .and_then(decimal_to_fixed)
        .filter(|&price| price <= MAX_AGENT_PRICE)
        .ok_or_else(|| invalid(name, value, "a price between 0 and 1000000"))
}

/// Positional share count, at most [`MAX_AGENT_QUANTITY`]
pub(crate) fn arg_quantity(args: &Value, index: usize, name: &str) -> Result<u64, ConfigError> {
    let value = positional(args, index, name)?;
    value
        .as_u64()
        .filter(|&quantity| quantity <= MAX_AGENT_QUANTITY)
        .ok_or_else(|| invalid(name, value, "a share count up to 1000000000"))
}

pub(crate) fn arg_u64(args: &Value, index: usize, name: &str) -> Result<u64, ConfigError> {
    let value = positional(args, index, name)?;
    value
        .as_u64()
        .ok_or_else(|| invalid(name, value, "a non-negative integer"))
}

pub(crate) fn arg_str<'a>(args: &'a Value, index: usize, name: &str) -> Result<&'a str, ConfigError> {
    let value = positional(args, index, name)?;
    value.as_str().ok_or_else(|| invalid(name, value, "a string"))
}

// ============================================================================
// Unit Tests
// ============================================================================
