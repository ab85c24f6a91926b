//! Error taxonomy for the simulator.
//!
//! Configuration problems and malformed agent output are fatal and travel
//! through these types. Invalid orders are not errors: the scheduler drops
//! them and keeps ticking. Book invariants are asserted, not reported.

use thiserror::Error;

/// Problems found while reading or validating a simulation config.
///
/// All of them abort a run before the first tick.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    #[error("Unknown {kind} class: {name}")]
    UnknownClass { kind: &'static str, name: String },

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },

    #[error("Cannot parse config: {0}")]
    Parse(String),

    #[error("Cannot read {path}: {error}")]
    Io { path: String, error: String },
}

/// A raw order that cannot be turned into a book order.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    #[error("Missing order field: {0}")]
    MissingField(&'static str),

    #[error("Order {0} must be positive")]
    NonPositive(&'static str),
}

/// Failures raised by an agent while producing an order.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AgentError {
    #[error("Order log exhausted after {0} lines")]
    OrderLogExhausted(usize),

    #[error("Malformed order log line {line}: {reason}")]
    MalformedLine { line: usize, reason: String },

    #[error("Order log read failed: {0}")]
    Io(String),
}

/// Umbrella error returned by the scheduler and the run context.
#[derive(Error, Debug)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error("Agent {agent} failed: {source}")]
    Agent {
        agent: crate::types::AgentId,
        #[source]
        source: AgentError,
    },

    #[error("Output failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encoding failed: {0}")]
    Encoding(String),
}

pub type SimResult<T> = std::result::Result<T, SimError>;
