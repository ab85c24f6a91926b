//! Output journals: the transaction log and the optional order log.
//!
//! ## Formats
//!
//! Transaction log, one line per trade:
//!
//! ```text
//! # <experiment name>
//! time;transaction;price;volume
//! 4;1;3.50;15
//! ```
//!
//! Order log, one line per accepted order, written before matching:
//!
//! ```text
//! # <experiment name> orders log
//! # direction : buy=0, sell=1
//! # direction;price;volume;agent
//! 0;3.60;15;1
//! ```
//!
//! The order log doubles as replay input, see [`parse_order_line`].
//!
//! Both writers are buffered. They are flushed at day boundaries and at the
//! end of a run, never per tick.

use std::io::{self, BufWriter, Write};

use crate::types::price::{format_2dp, to_fixed};
use crate::types::{AgentId, Order, RawOrder, Side, Trade};

/// Delimiter used when none is configured
pub const DEFAULT_DELIMITER: char = ';';

fn into_inner<W: Write>(out: BufWriter<W>) -> io::Result<W> {
    out.into_inner().map_err(|e| e.into_error())
}

// ============================================================================
// TransactionLog
// ============================================================================

/// Writer of executed trades.
#[derive(Debug)]
pub struct TransactionLog<W: Write> {
    out: BufWriter<W>,
    delimiter: char,
}

impl<W: Write> TransactionLog<W> {
    pub fn new(out: W, delimiter: char) -> Self {
        Self {
            out: BufWriter::new(out),
            delimiter,
        }
    }

    pub fn write_header(&mut self, name: &str) -> io::Result<()> {
        let d = self.delimiter;
        writeln!(self.out, "# {name}")?;
        writeln!(self.out, "time{d}transaction{d}price{d}volume")
    }

    pub fn record(&mut self, trade: &Trade) -> io::Result<()> {
        let d = self.delimiter;
        writeln!(
            self.out,
            "{}{d}{}{d}{}{d}{}",
            trade.time,
            trade.id,
            format_2dp(trade.price),
            trade.quantity
        )
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    /// Flush and hand back the underlying writer
    pub fn into_inner(self) -> io::Result<W> {
        into_inner(self.out)
    }
}

// ============================================================================
// OrderLog
// ============================================================================

/// Writer of accepted orders, in a format [`parse_order_line`] reads back.
#[derive(Debug)]
pub struct OrderLog<W: Write> {
    out: BufWriter<W>,
    delimiter: char,
}

impl<W: Write> OrderLog<W> {
    pub fn new(out: W, delimiter: char) -> Self {
        Self {
            out: BufWriter::new(out),
            delimiter,
        }
    }

    pub fn write_header(&mut self, name: &str) -> io::Result<()> {
        let d = self.delimiter;
        writeln!(self.out, "# {name} orders log")?;
        writeln!(self.out, "# direction : buy=0, sell=1")?;
        writeln!(self.out, "# direction{d}price{d}volume{d}agent")
    }

    pub fn record(&mut self, order: &Order) -> io::Result<()> {
        let d = self.delimiter;
        writeln!(
            self.out,
            "{}{d}{}{d}{}{d}{}",
            order.side_raw,
            format_2dp(order.price),
            order.quantity,
            order.agent()
        )
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    pub fn into_inner(self) -> io::Result<W> {
        into_inner(self.out)
    }
}

// ============================================================================
// Journal
// ============================================================================

/// Every output of a run: the transaction log and, optionally, the order log.
#[derive(Debug)]
pub struct Journal<W: Write> {
    transactions: TransactionLog<W>,
    orders: Option<OrderLog<W>>,
}

impl<W: Write> Journal<W> {
    pub fn new(transactions: W, delimiter: char) -> Self {
        Self {
            transactions: TransactionLog::new(transactions, delimiter),
            orders: None,
        }
    }

    /// Also log every accepted order to `orders`
    pub fn with_order_log(mut self, orders: W) -> Self {
        let delimiter = self.transactions.delimiter;
        self.orders = Some(OrderLog::new(orders, delimiter));
        self
    }

    pub fn has_order_log(&self) -> bool {
        self.orders.is_some()
    }

    pub fn write_headers(&mut self, name: &str) -> io::Result<()> {
        self.transactions.write_header(name)?;
        if let Some(orders) = self.orders.as_mut() {
            orders.write_header(name)?;
        }
        Ok(())
    }

    pub fn record_trade(&mut self, trade: &Trade) -> io::Result<()> {
        self.transactions.record(trade)
    }

    /// No-op without an order log
    pub fn record_order(&mut self, order: &Order) -> io::Result<()> {
        match self.orders.as_mut() {
            Some(orders) => orders.record(order),
            None => Ok(()),
        }
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.transactions.flush()?;
        if let Some(orders) = self.orders.as_mut() {
            orders.flush()?;
        }
        Ok(())
    }

    /// Flush everything and return the transaction and order writers
    pub fn into_inner(self) -> io::Result<(W, Option<W>)> {
        let transactions = self.transactions.into_inner()?;
        let orders = self.orders.map(OrderLog::into_inner).transpose()?;
        Ok((transactions, orders))
    }
}

// ============================================================================
// Order log parsing
// ============================================================================

/// One parsed order log line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedOrder<'a> {
    /// Carries the agent id when the agent column is numeric
    pub order: RawOrder,
    /// Non-numeric agent column, unquoted
    pub label: Option<&'a str>,
}

impl LoggedOrder<'_> {
    fn numbered(order: RawOrder) -> Self {
        Self { order, label: None }
    }
}

/// Parse one order log line
///
/// Returns `Ok(None)` for blank lines and `#` comments. The agent column may
/// be quoted and may be absent (three-column logs). A numeric agent becomes
/// the order's id; any other name is handed back as `label` for the caller
/// to map. Prices are not range checked here; a zero price is rejected by the
/// sanitizer.
///
/// ```
/// use market_sim::journal::parse_order_line;
/// use market_sim::types::{AgentId, Side};
///
/// let logged = parse_order_line("1;3.50;20;'2'", ';').unwrap().unwrap();
/// assert_eq!(logged.order.direction, Some(Side::Sell));
/// assert_eq!(logged.order.price, Some(350_000_000));
/// assert_eq!(logged.order.agent, Some(AgentId(2)));
///
/// let logged = parse_order_line("0;3.60;15;\"bob\"", ';').unwrap().unwrap();
/// assert_eq!((logged.order.agent, logged.label), (None, Some("bob")));
///
/// assert_eq!(parse_order_line("# direction;price;volume;agent", ';'), Ok(None));
/// ```
pub fn parse_order_line(line: &str, delimiter: char) -> Result<Option<LoggedOrder<'_>>, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let fields: Vec<&str> = line.split(delimiter).map(str::trim).collect();
    if fields.len() != 3 && fields.len() != 4 {
        return Err(format!("expected 3 or 4 fields, found {}", fields.len()));
    }

    let direction = fields[0]
        .parse::<u8>()
        .ok()
        .and_then(Side::from_u8)
        .ok_or_else(|| format!("bad direction {:?}", fields[0]))?;
    let price = to_fixed(fields[1]).ok_or_else(|| format!("bad price {:?}", fields[1]))?;
    let quantity = fields[2]
        .parse::<u64>()
        .map_err(|_| format!("bad volume {:?}", fields[2]))?;

    let order = RawOrder::limit(direction, price, quantity);
    let Some(agent) = fields.get(3) else {
        return Ok(Some(LoggedOrder::numbered(order)));
    };

    let unquoted = agent.trim_matches(|c| c == '\'' || c == '"').trim();
    if unquoted.is_empty() {
        return Err(format!("empty agent {agent:?}"));
    }
    match unquoted.parse::<u64>() {
        Ok(id) => Ok(Some(LoggedOrder::numbered(order.with_agent(AgentId(id))))),
        Err(_) => Ok(Some(LoggedOrder {
            order,
            label: Some(unquoted),
        })),
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
