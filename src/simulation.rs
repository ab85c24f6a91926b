//! Run context: everything a simulation run owns.
//!
//! [`Simulation::new`] builds the world, the agent population and one
//! (engine, market) phase per configured engine. Any structural problem is
//! reported here, before the first tick. [`Simulation::run`] then plays the
//! phases in order, chaining them through the world, and returns a
//! [`RunReceipt`].
//!
//! ## Determinism
//!
//! A single ChaCha8 stream seeded from `random_seed` drives agent selection
//! and every agent decision, so the same seed and config always give the
//! same logs and the same receipt.

use std::io::Write;

use log::{debug, info};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::agents::{Account, AgentKind, AgentPool, ReplaySources};
use crate::config::SimulationConfig;
use crate::engine::{Market, MarketKind};
use crate::error::{ConfigError, SimResult};
use crate::journal::Journal;
use crate::scheduler::{Engine, EngineKind, PhaseReport};
use crate::types::price::format_2dp;
use crate::types::{AgentId, RunReceipt, TradeDigest};
use crate::world::{World, WorldKind};

fn missing(name: &str) -> ConfigError {
    ConfigError::MissingParameter(name.to_string())
}

/// One engine with the market it drives.
#[derive(Debug)]
pub struct Phase {
    pub engine: Engine,
    pub market: Market,
}

pub struct Simulation {
    name: String,
    seed: u64,
    rng: ChaCha8Rng,
    world: Box<dyn World>,
    agents: AgentPool,
    phases: Vec<Phase>,
    replay: bool,
    report: PhaseReport,
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("name", &self.name)
            .field("seed", &self.seed)
            .field("agents", &self.agents.len())
            .field("phases", &self.phases)
            .field("replay", &self.replay)
            .finish()
    }
}

impl Simulation {
    /// Build a run from `config`, drawing a seed if it has none
    pub fn new(config: &SimulationConfig) -> SimResult<Self> {
        let seed = match config.random_seed {
            Some(seed) => seed,
            None => {
                let seed = rand::random();
                info!("no random seed configured, using {seed}");
                seed
            }
        };
        Self::with_seed(config, seed)
    }

    /// Build a run from `config` with an explicit seed
    pub fn with_seed(config: &SimulationConfig, seed: u64) -> SimResult<Self> {
        config.validate()?;
        let delimiter = config.delimiter();

        let world_config = config.world.as_ref().ok_or_else(|| missing("world"))?;
        let world = WorldKind::from_name(
            world_config
                .classname
                .as_deref()
                .ok_or_else(|| missing("world classname"))?,
        )?
        .build(&world_config.args);

        let mut sources = ReplaySources::new(config.base_dir(), delimiter);
        let mut agents = AgentPool::new();
        let mut replay = false;
        let mut next_id = 1;
        for agent_config in config.agents.as_deref().ok_or_else(|| missing("agents"))? {
            let kind = AgentKind::from_name(
                agent_config
                    .classname
                    .as_deref()
                    .ok_or_else(|| missing("agent classname"))?,
            )?;
            replay |= kind.is_replay();

            for _ in 0..agent_config.number {
                let account = Account::new(agent_config.money, agent_config.stocks);
                agents.push(kind.build(AgentId(next_id), account, &agent_config.args, &mut sources)?);
                next_id += 1;
            }
            info!(
                "{} {} with ${} and {} stocks",
                agent_config.number,
                kind.name(),
                agent_config.money,
                agent_config.stocks
            );
        }

        let mut phases = Vec::new();
        for engine_config in config.engines.as_deref().ok_or_else(|| missing("engines"))? {
            let kind = EngineKind::from_name(
                engine_config
                    .classname
                    .as_deref()
                    .ok_or_else(|| missing("engine classname"))?,
            )?;
            let market_config = engine_config.market.as_ref().ok_or_else(|| missing("market"))?;
            let mut market = MarketKind::from_name(
                market_config
                    .classname
                    .as_deref()
                    .ok_or_else(|| missing("market classname"))?,
            )?
            .build(&market_config.args)?;
            market.set_replay(replay);

            let engine = kind
                .build(engine_config.days, engine_config.daylength)
                .with_clear_books_at_eod(engine_config.clear_books_at_eod)
                .with_uniqueness(config.uniqueness())
                .with_show_books(config.show_books);
            phases.push(Phase { engine, market });
        }

        Ok(Self {
            name: config.name().to_string(),
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
            world,
            agents,
            phases,
            replay,
            report: PhaseReport::default(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn is_replay(&self) -> bool {
        self.replay
    }

    pub fn agents(&self) -> &AgentPool {
        &self.agents
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    pub fn world(&self) -> &dyn World {
        self.world.as_ref()
    }

    /// Counters accumulated over every phase run so far
    pub fn report(&self) -> &PhaseReport {
        &self.report
    }

    /// Play every phase in order
    ///
    /// Headers are written first; the journal is flushed at every day end
    /// and once more before returning.
    pub fn run<W: Write>(&mut self, journal: &mut Journal<W>) -> SimResult<RunReceipt> {
        info!("== {} == (seed {})", self.name, self.seed);
        journal.write_headers(&self.name)?;

        let mut digest = TradeDigest::new();
        let mut last_price = None;
        let phase_count = self.phases.len();

        for (i, phase) in self.phases.iter_mut().enumerate() {
            info!("phase {}/{}: {}", i + 1, phase_count, phase.market.name());
            let report = phase.engine.run(
                &mut phase.market,
                &mut self.agents,
                self.world.as_mut(),
                &mut self.rng,
                journal,
                &mut digest,
            )?;
            self.report.merge(&report);
            last_price = phase.market.last_price().or(last_price);
        }
        journal.flush()?;

        for agent in self.agents.iter() {
            debug!("agent {} ({}) {}", agent.id(), agent.kind(), agent.account());
        }

        let book_root = match self.phases.last() {
            Some(phase) => phase.market.book().compute_state_root()?,
            None => [0u8; 32],
        };
        let receipt = RunReceipt::new(
            self.report.ticks,
            self.report.orders_accepted,
            self.report.trades,
            self.report.volume,
            last_price.unwrap_or(0),
            digest.finalize(),
            book_root,
        );

        info!(
            "run done: {}, last price {}, trade root {}",
            self.report,
            receipt.last_price().map_or_else(|| "none".to_string(), format_2dp),
            receipt.trade_root_hex()
        );
        Ok(receipt)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
