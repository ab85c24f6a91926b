//! World: state carried between engine phases.
//!
//! A run may chain several engine phases. Each phase seeds its market book
//! from [`World::snapshot`] and starts its clock at [`World::clock`]; when it
//! ends it records the final book and clock back, so the next phase resumes
//! where this one stopped.

use std::str::FromStr;

use serde_json::Value;

use crate::error::ConfigError;
use crate::orderbook::BookSnapshot;

pub trait World {
    /// Book state to seed the next phase with
    fn snapshot(&self) -> BookSnapshot;

    /// Simulated time reached so far
    fn clock(&self) -> u64;

    /// Store the state at the end of a phase
    fn record(&mut self, snapshot: BookSnapshot, clock: u64);
}

/// World that only remembers the last book and the clock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NullWorld {
    last_book: BookSnapshot,
    clock: u64,
}

impl NullWorld {
    pub fn new() -> Self {
        Self::default()
    }
}

impl World for NullWorld {
    fn snapshot(&self) -> BookSnapshot {
        self.last_book.clone()
    }

    fn clock(&self) -> u64 {
        self.clock
    }

    fn record(&mut self, snapshot: BookSnapshot, clock: u64) {
        self.last_book = snapshot;
        self.clock = clock;
    }
}

/// Known world classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorldKind {
    NullWorld,
}

impl WorldKind {
    pub const ALL: [WorldKind; 1] = [WorldKind::NullWorld];

    pub fn name(self) -> &'static str {
        match self {
            WorldKind::NullWorld => "NullWorld",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, ConfigError> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == name)
            .ok_or_else(|| ConfigError::UnknownClass {
                kind: "world",
                name: name.to_string(),
            })
    }

    /// `NullWorld` takes no args
    pub fn build(self, _args: &Value) -> Box<dyn World> {
        match self {
            WorldKind::NullWorld => Box::new(NullWorld::new()),
        }
    }
}

impl FromStr for WorldKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}
