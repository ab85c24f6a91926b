//! Market Sim - Binary Entry Point
//!
//! Reads a JSON simulation config and either checks it or runs it, writing
//! the transaction log (and optionally the order log) to files or stdout.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use log::{info, LevelFilter};

use market_sim::config::SimulationConfig;
use market_sim::journal::Journal;
use market_sim::simulation::Simulation;
use market_sim::SimError;

fn print_help() {
    eprintln!(
        r#"Market Sim - artificial stock market simulator

USAGE:
    market-sim [OPTIONS] <run|check> <config.json>

COMMANDS:
    run                       Run the simulation
    check                     Build everything from the config, do not run

OPTIONS:
    -L, --loglevel <LEVEL>    error, warn, info, debug or trace (default: error)
    -v, --verbose             Same as --loglevel info
    --show-books              Log the top of the books after every order
    -r, --replay              Replay the orders log instead of running agents
    --unique-by-agent         At most one resting order per agent
    --no-unique-by-agent      Agents may stack orders
    --orders-log <FILE>       Orders log file
    -o, --output <FILE>       Transactions file (default: stdout)
    --random-seed <N>         Seed of the random stream
    --csv-delimiter <C>       Output delimiter
    --repeat <N>              Run the experiment N times
    -h, --help                Print this help message

ENVIRONMENT VARIABLES:
    RUST_LOG                  Log filter, overrides --loglevel
"#
    );
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Run,
    Check,
}

#[derive(Debug, Default)]
struct Options {
    command: Option<Command>,
    config: Option<PathBuf>,
    log_level: Option<LevelFilter>,
    show_books: bool,
    replay: bool,
    unique_by_agent: Option<bool>,
    orders_log: Option<PathBuf>,
    output: Option<PathBuf>,
    random_seed: Option<u64>,
    csv_delimiter: Option<String>,
    repeat: Option<u32>,
}

fn usage(message: impl Into<String>) -> SimError {
    SimError::Config(market_sim::ConfigError::InvalidValue {
        name: "command line".to_string(),
        reason: message.into(),
    })
}

fn parse_args(args: &[String]) -> Result<Option<Options>, SimError> {
    let mut opts = Options::default();
    let mut i = 1;

    let value = |i: &mut usize, flag: &str| -> Result<String, SimError> {
        *i += 1;
        args.get(*i)
            .cloned()
            .ok_or_else(|| usage(format!("{flag} requires a value")))
    };

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                return Ok(None);
            }
            "-v" | "--verbose" => opts.log_level = Some(LevelFilter::Info),
            "-L" | "--loglevel" => {
                let level = value(&mut i, "--loglevel")?;
                opts.log_level = Some(
                    level
                        .parse()
                        .map_err(|_| usage(format!("unknown log level {level}")))?,
                );
            }
            "--show-books" => opts.show_books = true,
            "-r" | "--replay" => opts.replay = true,
            "--unique-by-agent" => opts.unique_by_agent = Some(true),
            "--no-unique-by-agent" => opts.unique_by_agent = Some(false),
            "--orders-log" => opts.orders_log = Some(value(&mut i, "--orders-log")?.into()),
            "-o" | "--output" => opts.output = Some(value(&mut i, "--output")?.into()),
            "--random-seed" => {
                let seed = value(&mut i, "--random-seed")?;
                opts.random_seed = Some(
                    seed.parse()
                        .map_err(|_| usage(format!("bad random seed {seed}")))?,
                );
            }
            "--csv-delimiter" => opts.csv_delimiter = Some(value(&mut i, "--csv-delimiter")?),
            "--repeat" => {
                let repeat = value(&mut i, "--repeat")?;
                opts.repeat = Some(
                    repeat
                        .parse()
                        .map_err(|_| usage(format!("bad repeat count {repeat}")))?,
                );
            }
            "run" if opts.command.is_none() => opts.command = Some(Command::Run),
            "check" if opts.command.is_none() => opts.command = Some(Command::Check),
            arg if arg.starts_with('-') => return Err(usage(format!("unknown option {arg}"))),
            arg if opts.config.is_none() && opts.command.is_some() => {
                opts.config = Some(arg.into())
            }
            arg => return Err(usage(format!("unexpected argument {arg}"))),
        }
        i += 1;
    }

    if opts.command.is_none() || opts.config.is_none() {
        return Err(usage("expected <run|check> <config.json>"));
    }
    Ok(Some(opts))
}

fn init_logging(level: LevelFilter) {
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

/// `trades.csv` becomes `trades-003.csv` for turn 3
fn numbered(path: &Path, turn: u32) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}-{turn:03}.{}", ext.to_string_lossy()),
        None => format!("{stem}-{turn:03}"),
    };
    path.with_file_name(name)
}

fn create(path: &Path) -> Result<Box<dyn Write>, SimError> {
    info!("creating {}", path.display());
    Ok(Box::new(File::create(path)?))
}

fn execute(opts: Options) -> Result<(), SimError> {
    let config_path = opts.config.unwrap_or_default();
    info!("reading config file {}", config_path.display());
    let mut config = SimulationConfig::from_file(&config_path)?;
    let base_dir = config.base_dir();

    if let Some(unique) = opts.unique_by_agent {
        config.unique_by_agent = unique;
    }
    if let Some(seed) = opts.random_seed {
        config.random_seed = Some(seed);
    }
    if let Some(delimiter) = opts.csv_delimiter {
        config.csv_delimiter = delimiter;
    }
    if let Some(repeat) = opts.repeat {
        config.repeat = repeat.max(1);
    }
    config.show_books |= opts.show_books;

    let output = opts
        .output
        .or_else(|| config.output_filename.as_ref().map(|file| base_dir.join(file)));
    let mut orders_log = opts
        .orders_log
        .or_else(|| config.orders_log_filename.as_ref().map(|file| base_dir.join(file)));

    if opts.replay {
        let log_path = orders_log
            .take()
            .or_else(|| config.replay_log_path())
            .ok_or_else(|| usage("replay needs an orders log"))?;
        let log_path = std::env::current_dir()?.join(log_path);
        info!("replaying {}", log_path.display());
        config = config.into_replay(log_path);
    }

    let base_seed = match config.random_seed {
        Some(seed) => seed,
        None => {
            let seed = rand::random();
            info!("no random seed configured, using {seed}");
            seed
        }
    };

    if opts.command == Some(Command::Check) {
        let sim = Simulation::with_seed(&config, base_seed)?;
        println!(
            "{}: {} agents, {} phases, seed {}",
            sim.name(),
            sim.agents().len(),
            sim.phases().len(),
            sim.seed()
        );
        return Ok(());
    }

    let delimiter = config.delimiter();
    for turn in 0..config.repeat {
        let name_for = |path: &Path| {
            if config.repeat > 1 {
                numbered(path, turn)
            } else {
                path.to_path_buf()
            }
        };

        let transactions: Box<dyn Write> = match &output {
            Some(path) => create(&name_for(path))?,
            None => Box::new(io::stdout()),
        };
        let mut journal = Journal::new(transactions, delimiter);
        if let Some(path) = &orders_log {
            journal = journal.with_order_log(create(&name_for(path))?);
        }

        let mut sim = Simulation::with_seed(&config, base_seed.wrapping_add(u64::from(turn)))?;
        let receipt = sim.run(&mut journal)?;
        journal.flush()?;

        info!(
            "turn {}/{}: {} trades, volume {}, trade root {}, book root {}",
            turn + 1,
            config.repeat,
            receipt.trades_executed,
            receipt.volume,
            receipt.trade_root_hex(),
            receipt.book_root_hex()
        );
    }
    Ok(())
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let opts = match parse_args(&args) {
        Ok(Some(opts)) => opts,
        Ok(None) => return ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            print_help();
            return ExitCode::from(2);
        }
    };

    init_logging(opts.log_level.unwrap_or(LevelFilter::Error));

    match execute(opts) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(2)
        }
    }
}
