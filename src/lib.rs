//! # Market Sim
//!
//! Discrete-event simulator of an artificial stock market: agents submit
//! limit orders one tick at a time and a clearing engine matches them.
//!
//! ## Architecture
//!
//! - **Types**: Order, Trade, RunReceipt, fixed-point prices
//! - **OrderBook**: bid and ask sides with slab-based storage
//! - **Engine**: clearing policies (continuous double auction, fixing auction)
//! - **Validator**: completes raw agent orders against the book
//! - **Scheduler**: the tick loop feeding agent orders into a market
//! - **Agents / World**: the collaborators the scheduler drives
//!
//! ## Design Principles
//!
//! 1. **Determinism**: one seeded ChaCha8 stream drives every random choice
//! 2. **No Floating Point**: prices are fixed-point (10^8 scaling), cash is decimal
//! 3. **Price-Time Priority**: best price first, then earliest tick
//! 4. **Single-Threaded**: matching is serialized tick by tick
//!
//! ## Example
//!
//! ```
//! use market_sim::config::SimulationConfig;
//! use market_sim::journal::Journal;
//! use market_sim::simulation::Simulation;
//!
//! let config = SimulationConfig::from_json_str(r#"{
//!     "random_seed": 1,
//!     "world": { "classname": "NullWorld" },
//!     "engines": [{ "classname": "AsynchronousRandWReplace", "daylength": 100,
//!                   "market": { "classname": "ContinuousOrderDriven" } }],
//!     "agents": [{ "classname": "ZeroIntelligenceTrader", "number": 10,
//!                  "money": 1000, "stocks": 10, "args": [10, 5] }]
//! }"#).unwrap();
//!
//! let mut sim = Simulation::new(&config).unwrap();
//! let mut journal = Journal::new(Vec::new(), config.delimiter());
//! let receipt = sim.run(&mut journal).unwrap();
//! assert_eq!(receipt.ticks, 100);
//! ```

// ============================================================================
// Module declarations
// ============================================================================

/// Error taxonomy
pub mod error;

/// Core data types: Order, Trade, RunReceipt
pub mod types;

/// Order book: price levels over slab storage
pub mod orderbook;

/// Clearing policies and markets
pub mod engine;

/// Raw order completion
pub mod validator;

/// Trading agents
pub mod agents;

/// State carried between engine phases
pub mod world;

/// Tick-driving scheduler
pub mod scheduler;

/// Transaction and order logs
pub mod journal;

/// JSON simulation config
pub mod config;

/// Run context
pub mod simulation;

// ============================================================================
// Re-exports for convenience
// ============================================================================

pub use error::{ConfigError, SimError, SimResult};
pub use types::{AgentId, Order, RawOrder, RunReceipt, Side, Trade};
pub use orderbook::{OrderBook, Uniqueness};
pub use engine::{ClearingPolicy, Market, MarketKind};
pub use scheduler::{Engine, PhaseReport};
pub use simulation::Simulation;
