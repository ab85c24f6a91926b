//! Random trader: random orders around an average price, within means.
//!
//! The price is uniform in whole cents over
//! `[avg * (1 - fluct%), avg * (1 + fluct%)]`. With an average of 0 the
//! trader follows the market: it quotes around the last trade price, or
//! around 100 until something has traded.
//!
//! Quantities never exceed the shares held (sell) or what the cash can pay
//! at the quoted price (buy); when nothing fits the quantity is 1.

use log::warn;
use rand::{Rng, RngCore};
use rust_decimal::prelude::ToPrimitive;
use serde_json::Value;

use crate::agents::{arg_price, arg_quantity, arg_u64, Account, Agent, MarketView};
use crate::error::{AgentError, ConfigError};
use crate::types::price::{cents_to_fixed, fixed_to_cents, fixed_to_decimal, SCALE};
use crate::types::{AgentId, RawOrder, Side};

/// Fallback average when following a market that has not traded yet
const DEFAULT_AVG_PRICE: u64 = 100 * SCALE;

#[derive(Debug, Clone)]
pub struct RandomTrader {
    id: AgentId,
    account: Account,
    /// None: follow the last trade price
    avg_price: Option<u64>,
    max_fluct: u64,
    max_buy: u64,
    warned: bool,
}

impl RandomTrader {
    /// `avg_price` of 0 follows the market; `max_fluct` is a percentage
    pub fn new(id: AgentId, account: Account, avg_price: u64, max_fluct: u64, max_buy: u64) -> Self {
        Self {
            id,
            account,
            avg_price: (avg_price > 0).then_some(avg_price),
            max_fluct: max_fluct.min(100),
            max_buy,
            warned: false,
        }
    }

    /// Build from `[avg_price, max_fluct, max_buy]`
    pub fn from_args(id: AgentId, account: Account, args: &Value) -> Result<Self, ConfigError> {
        let avg_price = arg_price(args, 0, "avgprice")?;
        let max_fluct = arg_u64(args, 1, "maxfluct")?;
        let max_buy = arg_quantity(args, 2, "maxbuy")?;

        if max_fluct > 100 {
            return Err(ConfigError::InvalidValue {
                name: "maxfluct".to_string(),
                reason: format!("{max_fluct}% would allow negative prices"),
            });
        }
        Ok(Self::new(id, account, avg_price, max_fluct, max_buy))
    }

    fn reference_price(&mut self, view: &MarketView) -> u64 {
        if let Some(avg) = self.avg_price {
            return avg;
        }
        match view.last_price {
            Some(last) => last,
            None => {
                if !self.warned {
                    warn!("agent {}: no trade yet, average price set to 100", self.id);
                    self.warned = true;
                }
                DEFAULT_AVG_PRICE
            }
        }
    }

    /// Inclusive cent bounds of the quote
    fn price_band(&self, avg: u64) -> (u64, u64) {
        let avg_cents = fixed_to_cents(avg);
        let low = (avg_cents.saturating_mul(100 - self.max_fluct) / 100).max(1);
        let high = (avg_cents.saturating_mul(100 + self.max_fluct) / 100).max(low);
        (low, high)
    }

    fn max_quantity(&self, side: Side, price: u64) -> u64 {
        match side {
            Side::Sell => self.account.position.max(0) as u64,
            Side::Buy => {
                let affordable = (self.account.cash / fixed_to_decimal(price))
                    .floor()
                    .to_u64()
                    .unwrap_or(0);
                self.max_buy.min(affordable)
            }
        }
    }
}

impl Agent for RandomTrader {
    fn id(&self) -> AgentId {
        self.id
    }

    fn kind(&self) -> &'static str {
        "RandomTrader"
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
        view: &MarketView,
    ) -> Result<RawOrder, AgentError> {
        let side = if self.account.position > 0 && rng.gen::<bool>() {
            Side::Sell
        } else {
            Side::Buy
        };

        let avg = self.reference_price(view);
        let (low, high) = self.price_band(avg);
        let price = cents_to_fixed(rng.gen_range(low..=high));

        let max_quantity = self.max_quantity(side, price);
        let quantity = if max_quantity >= 1 {
            rng.gen_range(1..=max_quantity)
        } else {
            1
        };

        Ok(RawOrder::limit(side, price, quantity))
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
