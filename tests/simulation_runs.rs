//! Whole runs built from JSON configs: determinism, conservation, replay.

use std::fs;
use std::path::PathBuf;

use market_sim::agents::replay::NAMED_AGENT_BASE;
use market_sim::agents::Agent;
use market_sim::config::SimulationConfig;
use market_sim::error::AgentError;
use market_sim::journal::Journal;
use market_sim::simulation::Simulation;
use market_sim::world::World;
use market_sim::types::price::to_fixed;
use market_sim::{AgentId, RunReceipt, SimError};

use serde_json::{json, Value};

fn config(value: Value) -> SimulationConfig {
    SimulationConfig::from_json_str(&value.to_string()).unwrap()
}

fn zi_market(seed: u64, ticks: u64) -> SimulationConfig {
    config(json!({
        "name": "zi market",
        "random_seed": seed,
        "world": { "classname": "NullWorld" },
        "engines": [{
            "classname": "AsynchronousRandWReplace",
            "days": 1,
            "daylength": ticks,
            "market": { "classname": "ContinuousOrderDriven" }
        }],
        "agents": [
            { "classname": "ZeroIntelligenceTrader", "number": 20,
              "money": 10000, "stocks": 100, "args": [10, 20] }
        ]
    }))
}

/// Transactions, order log and receipt of one run
fn run(config: &SimulationConfig) -> (String, String, RunReceipt) {
    let mut sim = Simulation::new(config).unwrap();
    let mut journal = Journal::new(Vec::new(), config.delimiter()).with_order_log(Vec::new());
    let receipt = sim.run(&mut journal).unwrap();

    let (transactions, orders) = journal.into_inner().unwrap();
    (
        String::from_utf8(transactions).unwrap(),
        String::from_utf8(orders.unwrap()).unwrap(),
        receipt,
    )
}

fn scratch_file(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("market-sim-{}-{name}", std::process::id()))
}

/// Record lines of a log, without comments and column headers
fn records(log: &str) -> Vec<&str> {
    log.lines()
        .filter(|line| !line.starts_with('#') && !line.starts_with("time"))
        .collect()
}

/// Rejected while parsing or while building the run
fn rejected(value: Value) -> bool {
    match SimulationConfig::from_json_str(&value.to_string()) {
        Err(_) => true,
        Ok(config) => Simulation::new(&config).is_err(),
    }
}

#[test]
fn same_seed_same_run() {
    let (transactions_a, orders_a, receipt_a) = run(&zi_market(11, 500));
    let (transactions_b, orders_b, receipt_b) = run(&zi_market(11, 500));

    assert!(receipt_a.trades_executed > 0);
    assert_eq!(transactions_a, transactions_b);
    assert_eq!(orders_a, orders_b);
    assert_eq!(receipt_a, receipt_b);

    let (transactions_c, _, receipt_c) = run(&zi_market(12, 500));
    assert_ne!(transactions_a, transactions_c);
    assert_ne!(receipt_a.trade_root, receipt_c.trade_root);
}

#[test]
fn mixed_population_conserves_cash_and_shares() {
    let config = config(json!({
        "random_seed": 3,
        "unique_scope": "per_side",
        "world": { "classname": "NullWorld" },
        "engines": [
            { "classname": "AsynchronousRandWReplace", "days": 3, "daylength": 200,
              "market": { "classname": "ContinuousOrderDriven" } },
            { "classname": "AsynchronousRandWReplace", "days": 1, "daylength": 100,
              "market": { "classname": "HighestQtyFixing", "args": { "tie_break": "midpoint" } } }
        ],
        "agents": [
            { "classname": "ZeroIntelligenceTrader", "number": 10, "money": 5000, "stocks": 50, "args": [8, 10] },
            { "classname": "RandomTrader", "number": 10, "money": 5000, "stocks": 50, "args": [4, 25, 10] }
        ]
    }));

    let mut sim = Simulation::new(&config).unwrap();
    let cash = sim.agents().total_cash();
    let shares = sim.agents().total_position();

    let mut journal = Journal::new(Vec::new(), ';');
    let receipt = sim.run(&mut journal).unwrap();

    assert_eq!(receipt.ticks, 700);
    assert!(receipt.trades_executed > 0);
    assert_eq!(sim.agents().total_cash(), cash);
    assert_eq!(sim.agents().total_position(), shares);
    assert_eq!(sim.world().clock(), 700);
    // Books are cleared at every day end, so nothing carries over
    assert!(sim.world().snapshot().is_empty());
}

#[test]
fn books_carry_into_the_next_phase() {
    let config = config(json!({
        "random_seed": 5,
        "world": { "classname": "NullWorld" },
        "engines": [
            { "classname": "AsynchronousRandWReplace", "daylength": 50, "clear_books_at_eod": false,
              "market": { "classname": "ContinuousOrderDriven" } },
            { "classname": "AsynchronousRandWReplace", "daylength": 1, "clear_books_at_eod": false,
              "market": { "classname": "HighestQtyFixing" } }
        ],
        "agents": [
            { "classname": "ZeroIntelligenceTrader", "number": 30, "money": 5000, "stocks": 50, "args": [8, 10] }
        ]
    }));

    let mut sim = Simulation::new(&config).unwrap();
    sim.run(&mut Journal::new(Vec::new(), ';')).unwrap();

    // 30 agents quoting one order each over 50 ticks
    let carried = sim.world().snapshot();
    assert!(!carried.is_empty());
    assert_eq!(sim.world().clock(), 51);
    assert!(!sim.phases()[1].market.book().is_crossed());
}

#[test]
fn replayed_log_reproduces_every_print() {
    let original = zi_market(21, 400);
    let (transactions, orders, receipt) = run(&original);
    assert_eq!(records(&orders).len() as u64, receipt.orders_accepted);

    let log_path = scratch_file("replay.log");
    fs::write(&log_path, &orders).unwrap();

    // Every ZI order is accepted, so the log holds exactly one line per tick
    let replay = original.clone().into_replay(&log_path);
    let mut sim = Simulation::new(&replay).unwrap();
    assert!(sim.is_replay());
    assert_eq!(sim.agents().len(), 1);

    let mut journal = Journal::new(Vec::new(), ';');
    let replayed = sim.run(&mut journal).unwrap();
    let (replayed_transactions, _) = journal.into_inner().unwrap();
    let replayed_transactions = String::from_utf8(replayed_transactions).unwrap();

    assert_eq!(records(&replayed_transactions), records(&transactions));
    assert_eq!(replayed.trade_root, receipt.trade_root);
    assert_eq!(replayed.last_price, receipt.last_price);

    // Fills are not settled in replay mode
    let agent = sim.agents().iter().next().unwrap();
    assert_eq!(agent.account().position, 100);

    fs::remove_file(&log_path).unwrap();
}

#[test]
fn replay_accepts_named_agents() {
    let log_path = scratch_file("named.log");
    fs::write(
        &log_path,
        "# named orders log\n\
         # direction;price;volume;agent\n\
         0;3.60;15;\"bob\"\n\
         1;3.50;20;\"smith\"\n\
         0;3.55;5;bob\n\
         1;3.70;4;'alice'\n",
    )
    .unwrap();

    let replay = config(json!({
        "random_seed": 1,
        "world": { "classname": "NullWorld" },
        "engines": [{
            "classname": "AsynchronousRandWReplace",
            "daylength": 4,
            "clear_books_at_eod": false,
            "market": { "classname": "ContinuousOrderDriven" }
        }],
        "agents": [{ "classname": "ZeroIntelligenceTrader", "args": [10, 5] }]
    }))
    .into_replay(&log_path);

    let mut sim = Simulation::new(&replay).unwrap();
    let mut journal = Journal::new(Vec::new(), ';');
    let receipt = sim.run(&mut journal).unwrap();
    let (transactions, _) = journal.into_inner().unwrap();
    let transactions = String::from_utf8(transactions).unwrap();

    // bob buys 15 from smith, then 5 more from smith's remainder
    let prints: Vec<(&str, &str)> = records(&transactions)
        .into_iter()
        .map(|line| {
            let fields: Vec<&str> = line.split(';').collect();
            (fields[2], fields[3])
        })
        .collect();
    assert_eq!(prints, vec![("3.60", "15"), ("3.50", "5")]);
    assert_eq!(receipt.trades_executed, 2);
    assert_eq!(receipt.last_price(), to_fixed("3.50"));

    // alice is the third name read
    let resting = sim.phases()[0].market.book().best_ask().unwrap();
    assert_eq!(resting.agent(), AgentId(NAMED_AGENT_BASE + 2));
    assert_eq!(resting.remaining, 4);

    fs::remove_file(&log_path).unwrap();
}

#[test]
fn replay_past_the_end_of_the_log_fails() {
    let (_, orders, receipt) = run(&zi_market(8, 30));

    let log_path = scratch_file("short.log");
    fs::write(&log_path, &orders).unwrap();

    let replay = zi_market(8, 31).into_replay(&log_path);
    let result = Simulation::new(&replay).unwrap().run(&mut Journal::new(Vec::new(), ';'));

    match result {
        Err(SimError::Agent { source: AgentError::OrderLogExhausted(read), .. }) => {
            assert_eq!(read as u64, receipt.orders_accepted)
        }
        other => panic!("expected an exhausted log, got {other:?}"),
    }
    fs::remove_file(&log_path).unwrap();
}

#[test]
fn config_file_names_and_relative_paths() {
    let path = scratch_file("experiment.json");
    let value = json!({
        "world": { "classname": "NullWorld" },
        "orders_log_filename": "orders.log",
        "engines": [{ "classname": "AsynchronousRandWReplace",
                      "market": { "classname": "ContinuousOrderDriven" } }],
        "agents": [{ "classname": "ZeroIntelligenceTrader", "args": [10, 5] }]
    });
    fs::write(&path, value.to_string()).unwrap();

    let config = SimulationConfig::from_file(&path).unwrap();
    assert_eq!(config.name(), format!("{} experiment", path.display()));
    assert_eq!(config.base_dir(), std::env::temp_dir());
    assert_eq!(config.replay_log_path(), Some(std::env::temp_dir().join("orders.log")));

    fs::remove_file(&path).unwrap();
    assert!(SimulationConfig::from_file(&path).is_err());
}

#[test]
fn structural_errors_are_reported_before_running() {
    let no_world = json!({
        "engines": [{ "classname": "AsynchronousRandWReplace",
                      "market": { "classname": "ContinuousOrderDriven" } }],
        "agents": [{ "classname": "ZeroIntelligenceTrader", "args": [10, 5] }]
    });
    assert!(rejected(no_world));

    let unknown_market = json!({
        "world": { "classname": "NullWorld" },
        "engines": [{ "classname": "AsynchronousRandWReplace",
                      "market": { "classname": "DarkPool" } }],
        "agents": [{ "classname": "ZeroIntelligenceTrader", "args": [10, 5] }]
    });
    assert!(rejected(unknown_market));

    let no_agents = json!({
        "world": { "classname": "NullWorld" },
        "engines": [{ "classname": "AsynchronousRandWReplace",
                      "market": { "classname": "ContinuousOrderDriven" } }],
        "agents": [{ "classname": "ZeroIntelligenceTrader", "number": 0, "args": [10, 5] }]
    });
    assert!(rejected(no_agents));

    let bad_tie_break = json!({
        "world": { "classname": "NullWorld" },
        "engines": [{ "classname": "AsynchronousRandWReplace",
                      "market": { "classname": "HighestQtyFixing", "args": { "tie_break": "random" } } }],
        "agents": [{ "classname": "ZeroIntelligenceTrader", "args": [10, 5] }]
    });
    assert!(rejected(bad_tie_break));
}
