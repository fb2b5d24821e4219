//! tgdmine CLI - Discover tuple-generating dependencies in a SQLite database
//!
//! Usage:
//!   tgdmine discover <db.sqlite> [--strategy dfs] [--min-support 0.1]
//!   tgdmine inspect <db.sqlite>
//!
//! Examples:
//!   tgdmine discover data/bupa.sqlite --strategy bfs --limit 50
//!   tgdmine discover data/claims.sqlite --results-dir out/ --timeout-secs 60
//!   tgdmine inspect data/bupa.sqlite
//!
//! Exit codes: 0 success (including empty results), 1 configuration error,
//! 2 backend failure before any rule was produced, 3 cancelled by timeout.

use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tgdmine::config::{ConfigError, DiscoveryConfig, HeuristicKind, StrategyKind};
use tgdmine::discovery::{DiscoveryContext, DiscoveryError, RunOutcome};
use tgdmine::inspector::{Inspector, SqliteInspector};
use tgdmine::traverse::CancelToken;

#[derive(Parser)]
#[command(name = "tgdmine")]
#[command(about = "Discovers tuple-generating dependencies from relational data")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run rule discovery against a SQLite database
    Discover {
        /// Path to the SQLite database file
        db: PathBuf,

        /// Optional TOML config file; command-line flags override it
        #[arg(long)]
        config: Option<PathBuf>,

        /// Traversal strategy (dfs, bfs, astar)
        #[arg(long)]
        strategy: Option<String>,

        /// Heuristic for astar (naive, table-size, join-selectivity, hybrid)
        #[arg(long)]
        heuristic: Option<String>,

        /// Maximum table occurrences per rule (N)
        #[arg(long)]
        max_tables: Option<usize>,

        /// Maximum variables per rule
        #[arg(long)]
        max_vars: Option<usize>,

        /// Maximum occurrences of one table per rule
        #[arg(long)]
        max_occurrence: Option<usize>,

        /// Minimum support threshold
        #[arg(long)]
        min_support: Option<f64>,

        /// Minimum confidence threshold
        #[arg(long)]
        min_confidence: Option<f64>,

        /// Minimum value-overlap ratio for attribute compatibility
        #[arg(long)]
        tau_overlap: Option<f64>,

        /// Directory for side files (compatibility, CG metrics, timings)
        #[arg(long)]
        results_dir: Option<PathBuf>,

        /// Stop after this many emitted rules
        #[arg(long)]
        limit: Option<usize>,

        /// Cancel the run after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// Print the schema and compatibility summary without discovering rules
    Inspect {
        /// Path to the SQLite database file
        db: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Discover {
            db,
            config,
            strategy,
            heuristic,
            max_tables,
            max_vars,
            max_occurrence,
            min_support,
            min_confidence,
            tau_overlap,
            results_dir,
            limit,
            timeout_secs,
        } => {
            let config = match build_config(
                config,
                strategy,
                heuristic,
                max_tables,
                max_vars,
                max_occurrence,
                min_support,
                min_confidence,
                tau_overlap,
                results_dir,
            ) {
                Ok(config) => config,
                Err(err) => {
                    eprintln!("error: {err}");
                    return ExitCode::from(1);
                }
            };
            cmd_discover(&db, config, limit, timeout_secs)
        }
        Commands::Inspect { db } => cmd_inspect(&db),
    }
}

#[allow(clippy::too_many_arguments)]
fn build_config(
    file: Option<PathBuf>,
    strategy: Option<String>,
    heuristic: Option<String>,
    max_tables: Option<usize>,
    max_vars: Option<usize>,
    max_occurrence: Option<usize>,
    min_support: Option<f64>,
    min_confidence: Option<f64>,
    tau_overlap: Option<f64>,
    results_dir: Option<PathBuf>,
) -> Result<DiscoveryConfig, ConfigError> {
    let mut config = match file {
        Some(path) => DiscoveryConfig::load(&path)?,
        None => DiscoveryConfig::default(),
    };
    if let Some(s) = strategy {
        config.strategy = StrategyKind::from_str(&s)?;
    }
    if let Some(h) = heuristic {
        config.heuristic = HeuristicKind::from_str(&h)?;
    }
    if let Some(n) = max_tables {
        config.max_tables = n;
    }
    if let Some(n) = max_vars {
        config.max_vars = n;
    }
    if let Some(n) = max_occurrence {
        config.max_occurrence = n;
    }
    if let Some(t) = min_support {
        config.tau_support = t;
    }
    if let Some(t) = min_confidence {
        config.tau_confidence = t;
    }
    if let Some(t) = tau_overlap {
        config.tau_overlap = t;
    }
    if let Some(dir) = results_dir {
        config.results_dir = Some(dir);
    }
    config.validate()?;
    Ok(config)
}

fn cmd_discover(
    db: &std::path::Path,
    config: DiscoveryConfig,
    limit: Option<usize>,
    timeout_secs: Option<u64>,
) -> ExitCode {
    let inspector = match SqliteInspector::open(db) {
        Ok(inspector) => inspector,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::from(2);
        }
    };

    let ctx = match DiscoveryContext::initialize(config, &inspector) {
        Ok(ctx) => ctx,
        Err(err @ DiscoveryError::Config(_)) | Err(err @ DiscoveryError::Schema(_)) => {
            eprintln!("error: {err}");
            return ExitCode::from(1);
        }
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::from(2);
        }
    };

    if let Err(err) = ctx.write_side_files() {
        tracing::warn!(error = %err, "failed to write side files, continuing");
    }

    let cancel = CancelToken::new();
    if let Some(secs) = timeout_secs {
        let token = cancel.clone();
        std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_secs(secs));
            token.cancel();
        });
    }

    let mut stream = ctx.rules(&inspector, cancel.clone());
    let mut emitted = 0usize;
    for tgd in &mut stream {
        match serde_json::to_string(&tgd) {
            Ok(line) => println!("{line}"),
            Err(err) => {
                tracing::warn!(error = %err, "failed to serialize rule record");
            }
        }
        emitted += 1;
        if limit.is_some_and(|n| emitted >= n) {
            cancel.cancel();
        }
    }

    let summary = stream.into_summary();
    match serde_json::to_string(&summary) {
        Ok(line) => eprintln!("{line}"),
        Err(err) => eprintln!("error: failed to serialize summary: {err}"),
    }

    // A user-imposed emission limit is a normal completion, not a timeout.
    let timed_out = summary.outcome == RunOutcome::Cancelled
        && timeout_secs.is_some()
        && !limit.is_some_and(|n| emitted >= n);
    if timed_out {
        return ExitCode::from(3);
    }
    ExitCode::SUCCESS
}

fn cmd_inspect(db: &std::path::Path) -> ExitCode {
    let inspector = match SqliteInspector::open(db) {
        Ok(inspector) => inspector,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::from(2);
        }
    };

    let ctx = match DiscoveryContext::initialize(DiscoveryConfig::default(), &inspector) {
        Ok(ctx) => ctx,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::from(2);
        }
    };

    let tables = match inspector.list_tables() {
        Ok(tables) => tables,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::from(2);
        }
    };
    println!("database: {}", inspector.source_name());
    println!("tables: {}", tables.len());
    for table in &tables {
        let rows = inspector.row_count(table).unwrap_or(0);
        println!("  {table} ({rows} rows)");
    }
    println!(
        "compatible attribute pairs: {}",
        ctx.compatibility().pair_count()
    );
    let metrics = ctx.graph_metrics();
    println!(
        "constraint graph: {} nodes, {} edges, {} roots",
        metrics.nodes, metrics.edges, metrics.roots
    );
    ExitCode::SUCCESS
}
