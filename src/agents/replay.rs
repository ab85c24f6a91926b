//! Replay agent: plays back a recorded order log.
//!
//! Every `PlayOrderLogFile` agent of a run that names the same file reads
//! from one shared [`OrderLogReader`], so the log is consumed one line per
//! tick whichever replay agent the scheduler picks. The readers are owned by
//! [`ReplaySources`] in the run context and handed to each agent as an
//! [`Rc`] handle.
//!
//! Replayed orders carry their historical agent id. Logs written by other
//! tools may name agents instead; each distinct name is given an id from
//! [`NAMED_AGENT_BASE`] upwards, in order of first appearance. Markets run in
//! replay mode, so fills never touch the replay agents' accounts.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use log::debug;
use rand::RngCore;

use crate::agents::{Account, Agent, MarketView};
use crate::error::{AgentError, ConfigError};
use crate::journal::{parse_order_line, DEFAULT_DELIMITER};
use crate::types::{AgentId, RawOrder};

/// Reader handle shared by all replay agents of one file
pub type SharedOrderLog = Rc<RefCell<OrderLogReader>>;

/// First id handed to a named agent; numeric ids below it pass through
pub const NAMED_AGENT_BASE: u64 = 1 << 63;

// ============================================================================
// OrderLogReader
// ============================================================================

/// Sequential reader of an order log.
pub struct OrderLogReader {
    lines: Box<dyn BufRead>,
    delimiter: char,
    /// Lines consumed so far, comments included
    line_no: usize,
    orders_read: usize,
    source: String,
    names: BTreeMap<String, AgentId>,
}

impl fmt::Debug for OrderLogReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderLogReader")
            .field("source", &self.source)
            .field("line_no", &self.line_no)
            .field("orders_read", &self.orders_read)
            .field("names", &self.names.len())
            .finish()
    }
}

impl OrderLogReader {
    pub fn open(path: &Path, delimiter: char) -> Result<Self, ConfigError> {
        let file = File::open(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Ok(Self::from_reader(
            BufReader::new(file),
            delimiter,
            path.display().to_string(),
        ))
    }

    pub fn from_reader(
        reader: impl BufRead + 'static,
        delimiter: char,
        source: impl Into<String>,
    ) -> Self {
        Self {
            lines: Box::new(reader),
            delimiter,
            line_no: 0,
            orders_read: 0,
            source: source.into(),
            names: BTreeMap::new(),
        }
    }

    pub fn shared(self) -> SharedOrderLog {
        Rc::new(RefCell::new(self))
    }

    pub fn orders_read(&self) -> usize {
        self.orders_read
    }

    fn intern(&mut self, name: &str) -> AgentId {
        if let Some(&id) = self.names.get(name) {
            return id;
        }
        let id = AgentId(NAMED_AGENT_BASE + self.names.len() as u64);
        debug!("{}: agent {name:?} replays as {id}", self.source);
        self.names.insert(name.to_string(), id);
        id
    }

    /// Next order, skipping comments and blank lines
    ///
    /// # Errors
    ///
    /// `OrderLogExhausted` at end of input, `MalformedLine` for a line that
    /// does not parse, `Io` if reading fails.
    pub fn next_order(&mut self) -> Result<RawOrder, AgentError> {
        let mut line = String::new();
        loop {
            line.clear();
            let read = self
                .lines
                .read_line(&mut line)
                .map_err(|e| AgentError::Io(format!("{}: {e}", self.source)))?;
            if read == 0 {
                return Err(AgentError::OrderLogExhausted(self.orders_read));
            }
            self.line_no += 1;

            match parse_order_line(&line, self.delimiter) {
                Ok(Some(logged)) => {
                    let mut order = logged.order;
                    if let Some(name) = logged.label {
                        order = order.with_agent(self.intern(name));
                    }
                    self.orders_read += 1;
                    return Ok(order);
                }
                Ok(None) => continue,
                Err(reason) => {
                    return Err(AgentError::MalformedLine {
                        line: self.line_no,
                        reason,
                    })
                }
            }
        }
    }
}

// ============================================================================
// ReplaySources
// ============================================================================

/// Open order logs of a run, one reader per file.
#[derive(Debug)]
pub struct ReplaySources {
    base_dir: PathBuf,
    delimiter: char,
    readers: BTreeMap<PathBuf, SharedOrderLog>,
}

impl Default for ReplaySources {
    fn default() -> Self {
        Self::new(".", DEFAULT_DELIMITER)
    }
}

impl ReplaySources {
    /// Relative file names resolve against `base_dir`
    pub fn new(base_dir: impl Into<PathBuf>, delimiter: char) -> Self {
        Self {
            base_dir: base_dir.into(),
            delimiter,
            readers: BTreeMap::new(),
        }
    }

    /// Reader for `file`, opened on first request
    pub fn open(&mut self, file: &str) -> Result<SharedOrderLog, ConfigError> {
        let path = self.base_dir.join(file);
        if let Some(reader) = self.readers.get(&path) {
            return Ok(Rc::clone(reader));
        }

        debug!("opening order log {}", path.display());
        let reader = OrderLogReader::open(&path, self.delimiter)?.shared();
        self.readers.insert(path, Rc::clone(&reader));
        Ok(reader)
    }

    /// Register an already open reader under `file`
    pub fn insert(&mut self, file: &str, reader: OrderLogReader) -> SharedOrderLog {
        let shared = reader.shared();
        self.readers.insert(self.base_dir.join(file), Rc::clone(&shared));
        shared
    }

    pub fn len(&self) -> usize {
        self.readers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readers.is_empty()
    }
}

// ============================================================================
// ReplayAgent
// ============================================================================

#[derive(Debug)]
pub struct ReplayAgent {
    id: AgentId,
    account: Account,
    log: SharedOrderLog,
}

impl ReplayAgent {
    pub fn new(id: AgentId, account: Account, log: SharedOrderLog) -> Self {
        Self { id, account, log }
    }
}

impl Agent for ReplayAgent {
    fn id(&self) -> AgentId {
        self.id
    }

    fn kind(&self) -> &'static str {
        "PlayOrderLogFile"
    }

    fn account(&self) -> &Account {
        &self.account
    }

    fn account_mut(&mut self) -> &mut Account {
        &mut self.account
    }

    fn produce_order(
        &mut self,
        _rng: &mut dyn RngCore,
        _view: &MarketView,
    ) -> Result<RawOrder, AgentError> {
        self.log.borrow_mut().next_order()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
