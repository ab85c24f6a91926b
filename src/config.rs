//! Simulation config: a JSON document describing the world, the engine
//! phases and the agent population.
//!
//! ```json
//! {
//!   "name": "Two traders",
//!   "random_seed": 42,
//!   "world": { "classname": "NullWorld" },
//!   "engines": [
//!     { "classname": "AsynchronousRandWReplace", "days": 1, "daylength": 10,
//!       "market": { "classname": "ContinuousOrderDriven" } }
//!   ],
//!   "agents": [
//!     { "classname": "ZeroIntelligenceTrader", "number": 100,
//!       "money": 10000, "stocks": 1000, "args": [100, 10] }
//!   ]
//! }
//! ```
//!
//! Structural fields (`world`, `engines`, `agents`, every `classname`, each
//! engine's `market`) are optional in the serde model and checked by
//! [`SimulationConfig::validate`], so a missing one is reported as
//! [`ConfigError::MissingParameter`] rather than as a parse error.

use std::fs;
use std::path::{Path, PathBuf};

use log::warn;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::agents::AgentKind;
use crate::engine::MarketKind;
use crate::error::ConfigError;
use crate::journal::DEFAULT_DELIMITER;
use crate::orderbook::Uniqueness;
use crate::scheduler::EngineKind;
use crate::world::WorldKind;

/// Delimiters accepted for the output files
pub const CSV_DELIMITERS: [char; 9] = [';', ',', '\t', ' ', ':', '|', '-', '!', '/'];

fn default_true() -> bool {
    true
}

fn default_one() -> u64 {
    1
}

fn default_money() -> Decimal {
    Decimal::ONE
}

fn default_stocks() -> i64 {
    1
}

fn default_repeat() -> u32 {
    1
}

fn default_delimiter() -> String {
    DEFAULT_DELIMITER.to_string()
}

fn required<'a, T>(value: &'a Option<T>, name: &str) -> Result<&'a T, ConfigError> {
    value
        .as_ref()
        .ok_or_else(|| ConfigError::MissingParameter(name.to_string()))
}

// ============================================================================
// Sections
// ============================================================================

/// Scope of the one-order-per-agent rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UniqueScope {
    #[default]
    Global,
    PerSide,
}

/// A class name with free-form args (world, market).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassConfig {
    #[serde(default)]
    pub classname: Option<String>,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub classname: Option<String>,
    #[serde(default = "default_one")]
    pub days: u64,
    /// Ticks per day
    #[serde(default = "default_one")]
    pub daylength: u64,
    #[serde(default = "default_true")]
    pub clear_books_at_eod: bool,
    #[serde(default)]
    pub market: Option<ClassConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub classname: Option<String>,
    /// Agents of this class to create
    #[serde(default = "default_one")]
    pub number: u64,
    /// Starting cash of each agent
    #[serde(default = "default_money")]
    pub money: Decimal,
    /// Starting shares of each agent
    #[serde(default = "default_stocks")]
    pub stocks: i64,
    #[serde(default)]
    pub args: Value,
}

// ============================================================================
// SimulationConfig
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default)]
    pub name: Option<String>,
    /// Drawn at startup when absent
    #[serde(default)]
    pub random_seed: Option<u64>,
    #[serde(default = "default_delimiter")]
    pub csv_delimiter: String,
    #[serde(default = "default_true")]
    pub unique_by_agent: bool,
    #[serde(default)]
    pub unique_scope: UniqueScope,
    /// Transaction log; stdout when absent
    #[serde(default)]
    pub output_filename: Option<String>,
    #[serde(default)]
    pub orders_log_filename: Option<String>,
    #[serde(default = "default_repeat")]
    pub repeat: u32,
    #[serde(default)]
    pub show_books: bool,
    #[serde(default)]
    pub world: Option<ClassConfig>,
    #[serde(default)]
    pub engines: Option<Vec<EngineConfig>>,
    #[serde(default)]
    pub agents: Option<Vec<AgentConfig>>,

    /// File the config was read from
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl SimulationConfig {
    /// Read and validate a config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;

        let mut config = Self::from_json_str(&text)?;
        if config.name.is_none() {
            config.name = Some(format!("{} experiment", path.display()));
        }
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    /// Parse and validate a config document
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: SimulationConfig =
            serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every structural field is present and every class known
    pub fn validate(&self) -> Result<(), ConfigError> {
        let world = required(&self.world, "world")?;
        WorldKind::from_name(required(&world.classname, "world classname")?)?;

        let engines = required(&self.engines, "engines")?;
        if engines.is_empty() {
            return Err(ConfigError::MissingParameter("engines".to_string()));
        }
        for engine in engines {
            EngineKind::from_name(required(&engine.classname, "engine classname")?)?;
            let market = required(&engine.market, "market")?;
            MarketKind::from_name(required(&market.classname, "market classname")?)?;
        }

        let agents = required(&self.agents, "agents")?;
        if agents.iter().map(|agent| agent.number).sum::<u64>() == 0 {
            return Err(ConfigError::MissingParameter("agents".to_string()));
        }
        for agent in agents {
            AgentKind::from_name(required(&agent.classname, "agent classname")?)?;
        }

        if self.repeat == 0 {
            return Err(ConfigError::InvalidValue {
                name: "repeat".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("unnamed experiment")
    }

    /// Output delimiter; unsupported values fall back to `;`
    pub fn delimiter(&self) -> char {
        let mut chars = self.csv_delimiter.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if CSV_DELIMITERS.contains(&c) => c,
            _ => {
                warn!(
                    "unsupported csv delimiter {:?}, using {:?}",
                    self.csv_delimiter, DEFAULT_DELIMITER
                );
                DEFAULT_DELIMITER
            }
        }
    }

    pub fn uniqueness(&self) -> Uniqueness {
        Uniqueness::from_flags(self.unique_by_agent, self.unique_scope == UniqueScope::PerSide)
    }

    /// Directory relative file names resolve against
    pub fn base_dir(&self) -> PathBuf {
        self.source
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }

    /// Order log a replay run reads: the configured one, or the config
    /// file name with a `.log` extension
    pub fn replay_log_path(&self) -> Option<PathBuf> {
        match (&self.orders_log_filename, &self.source) {
            (Some(file), _) => Some(self.base_dir().join(file)),
            (None, Some(source)) => Some(source.with_extension("log")),
            (None, None) => None,
        }
    }

    /// Replace the agent population by a single replay agent reading
    /// `log_path`
    ///
    /// The first agent's cash and shares are kept. The order log output is
    /// disabled so the replayed file is not overwritten.
    pub fn into_replay(mut self, log_path: impl AsRef<Path>) -> Self {
        let template = self
            .agents
            .as_ref()
            .and_then(|agents| agents.first())
            .cloned();
        let (money, stocks) = template.map_or((default_money(), default_stocks()), |agent| {
            (agent.money, agent.stocks)
        });

        self.agents = Some(vec![AgentConfig {
            classname: Some(AgentKind::PlayOrderLogFile.name().to_string()),
            number: 1,
            money,
            stocks,
            args: Value::Array(vec![Value::String(
                log_path.as_ref().display().to_string(),
            )]),
        }]);
        self.orders_log_filename = None;
        self
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
