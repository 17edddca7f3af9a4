//! Two-party command-line demonstrator for Secure EpiLinker.
//!
//! Since the shipped circuit backend ([`epilink_core::backend::local`])
//! materialises both parties in one process, this binary plays both roles
//! locally: it reads a public [`epilink_types::CircuitConfig`], a client
//! record batch, and a server database from JSON files, runs them through
//! [`epilink_driver::EpilinkDriver`], and prints the revealed result(s) as
//! JSON.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use epilink_driver::{AbyConfig, EpilinkDriver, Mode, StatsPrinter};
use epilink_types::{CircuitConfig, Database, Record};

/// Which side of the protocol this invocation plays, for the `AbyConfig`
/// printed alongside results; the local backend runs both sides regardless.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum RoleArg {
    /// The party supplying the client record(s).
    Client,
    /// The party supplying the database.
    Server,
}

impl From<RoleArg> for epilink_core::share::Role {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Client => epilink_core::share::Role::Client,
            RoleArg::Server => epilink_core::share::Role::Server,
        }
    }
}

#[derive(Clone, Debug, Subcommand)]
enum Command {
    /// Links every client record against the database and prints the
    /// winning index plus the two threshold flags per record.
    Linkage {
        /// Also reveal the winning numerator/denominator.
        #[arg(long)]
        debug: bool,
    },
    /// Counts how many client records clear each threshold against the
    /// database, without revealing any row indices.
    Count,
}

/// Runs one local two-party EpiLink session.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Path to the JSON-encoded `CircuitConfig` both parties agreed on.
    #[arg(long, env = "EPILINK_CONFIG")]
    config: PathBuf,

    /// Path to the JSON-encoded client record batch (`Vec<Record>`).
    #[arg(long, env = "EPILINK_RECORDS")]
    records: PathBuf,

    /// Path to the JSON-encoded server `Database`.
    #[arg(long, env = "EPILINK_DATABASE")]
    database: PathBuf,

    /// Which role to report in the printed `AbyConfig` (cosmetic only; the
    /// local backend always runs both sides).
    #[arg(long, value_enum, default_value = "client")]
    role: RoleArg,

    /// Peer host, for the `AbyConfig` the driver is constructed with.
    #[arg(long, default_value = "127.0.0.1")]
    remote_host: String,

    /// Peer port.
    #[arg(long, default_value_t = 7766)]
    port: u16,

    /// Worker thread count reported to the (local, single-threaded) backend.
    #[arg(long, default_value_t = 1)]
    nthreads: usize,

    /// Deterministic seed for the local reference backend's randomness.
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Print gate-count/timing statistics to stderr after execution.
    #[arg(long)]
    stats: bool,

    #[command(subcommand)]
    command: Command,
}

fn load_json<T: serde::de::DeserializeOwned>(path: &PathBuf) -> Result<T, String> {
    let bytes = fs::read(path).map_err(|e| format!("reading {}: {e}", path.display()))?;
    serde_json::from_slice(&bytes).map_err(|e| format!("parsing {}: {e}", path.display()))
}

fn run(cli: Cli) -> Result<(), String> {
    let cfg: CircuitConfig = load_json(&cli.config)?;
    let records: Vec<Record> = load_json(&cli.records)?;
    let db: Database = load_json(&cli.database)?;

    let aby = AbyConfig { role: cli.role.into(), remote_host: cli.remote_host, port: cli.port, nthreads: cli.nthreads };
    let mode = match cli.command {
        Command::Linkage { debug } => Mode::Linkage { debug },
        Command::Count => Mode::Count,
    };

    let mut driver = EpilinkDriver::new(cfg, aby, mode, cli.seed);
    driver.connect().map_err(|e| e.to_string())?;
    driver.run_local(records, db).map_err(|e| e.to_string())?;

    match mode {
        Mode::Linkage { .. } => {
            let results = driver.run_linkage().map_err(|e| e.to_string())?;
            println!("{}", serde_json::to_string_pretty(&results).map_err(|e| e.to_string())?);
        }
        Mode::Count => {
            let result = driver.run_count().map_err(|e| e.to_string())?;
            println!("{}", serde_json::to_string_pretty(&result).map_err(|e| e.to_string())?);
        }
    }

    if cli.stats {
        let mut printer = StatsPrinter::new();
        printer.mark("online", driver.stats());
        eprint!("{}", printer.render());
    }

    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "epilink_cli=info,epilink_driver=info".into()))
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
