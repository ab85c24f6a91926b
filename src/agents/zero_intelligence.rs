//! Zero-intelligence trader: uniform random orders within budget-free bounds.
//!
//! - direction: buy or sell with equal odds, always buy when holding no shares
//! - price: uniform in whole cents over `[0.01, max_price]`
//! - quantity: uniform over `[1, max_buy]` for a buy, `[1, position]` for a sell
//!
//! Sells never exceed the shares held, so the trader cannot go short.

use rand::{Rng, RngCore};
use serde_json::Value;

use crate::agents::{arg_price, arg_quantity, Account, Agent, MarketView};
use crate::error::{AgentError, ConfigError};
use crate::types::price::{cents_to_fixed, fixed_to_cents};
use crate::types::{AgentId, RawOrder, Side};

#[derive(Debug, Clone)]
pub struct ZeroIntelligenceTrader {
    id: AgentId,
    account: Account,
    max_price_cents: u64,
    max_buy: u64,
}

impl ZeroIntelligenceTrader {
    /// `max_price` is fixed-point and is truncated to whole cents
    pub fn new(id: AgentId, account: Account, max_price: u64, max_buy: u64) -> Self {
        Self {
            id,
            account,
            max_price_cents: (max_price / cents_to_fixed(1)).max(1),
            max_buy: max_buy.max(1),
        }
    }

    /// Build from `[max_price, max_buy]`
    pub fn from_args(id: AgentId, account: Account, args: &Value) -> Result<Self, ConfigError> {
        let max_price = arg_price(args, 0, "maxprice")?;
        let max_buy = arg_quantity(args, 1, "maxbuy")?;

        if fixed_to_cents(max_price) == 0 {
            return Err(ConfigError::InvalidValue {
                name: "maxprice".to_string(),
                reason: "must be at least 0.01".to_string(),
            });
        }
        if max_buy == 0 {
            return Err(ConfigError::InvalidValue {
                name: "maxbuy".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(Self::new(id, account, max_price, max_buy))
    }
}

impl Agent for ZeroIntelligenceTrader {
    fn id(&self) -> AgentId {
        self.id
    }

    fn kind(&self) -> &'static str {
        "ZeroIntelligenceTrader"
    }

    fn account(&self) -> &Account {
        &self.account
    }

    fn account_mut(&mut self) -> &mut Account {
        &mut self.account
    }

    fn produce_order(
        &mut self,
        rng: &mut dyn RngCore,
        _view: &MarketView,
    ) -> Result<RawOrder, AgentError> {
        let side = if self.account.position > 0 && rng.gen::<bool>() {
            Side::Sell
        } else {
            Side::Buy
        };

        let price = cents_to_fixed(rng.gen_range(1..=self.max_price_cents));
        let quantity = match side {
            Side::Sell => rng.gen_range(1..=self.account.position as u64),
            Side::Buy => rng.gen_range(1..=self.max_buy),
        };

        Ok(RawOrder::limit(side, price, quantity))
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
