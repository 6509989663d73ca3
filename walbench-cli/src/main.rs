//! walbench - time concurrent SQLite inserts under a chosen journal mode

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use walbench_core::{DurabilityMode, Pragma, StoreConfig, StoreHandle, WorkloadReport};

#[derive(Parser, Debug)]
#[command(name = "walbench")]
#[command(about = "Benchmark concurrent SQLite writers in DELETE or WAL journal mode", version)]
struct Cli {
    /// Database file; every file sharing this prefix is deleted on open and close
    #[arg(short, long, default_value = "test.db")]
    path: PathBuf,

    /// Journal mode (delete or wal)
    #[arg(short, long, default_value = "wal")]
    mode: DurabilityMode,

    /// Maximum concurrent writers
    #[arg(short, long, default_value_t = walbench_core::config::DEFAULT_MAX_WRITERS as i64)]
    writers: i64,

    /// Records inserted per iteration
    #[arg(short = 'n', long, default_value_t = walbench_core::config::DEFAULT_INSERTS)]
    inserts: usize,

    /// Number of timed iterations
    #[arg(short, long, default_value_t = 1)]
    iterations: usize,

    /// Pragma applied to every connection, as setting=value (repeatable, order kept)
    #[arg(long = "pragma", value_name = "SETTING=VALUE")]
    pragmas: Vec<Pragma>,

    /// Print reports as JSON
    #[arg(long)]
    json: bool,

    /// Leave the database files on disk
    #[arg(long)]
    keep: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = StoreConfig::builder()
        .max_writers(cli.writers)
        .pragmas(cli.pragmas.clone())
        .try_build()
        .context("invalid configuration")?;

    info!("walbench {}", walbench_core::VERSION);
    info!("Database: {:?}", cli.path);

    let mut store = StoreHandle::open(&cli.path, config)
        .with_context(|| format!("failed to open {:?}", cli.path))?;
    store.set_mode(cli.mode).context("failed to set journal mode")?;

    let mut reports = Vec::with_capacity(cli.iterations);
    for iteration in 1..=cli.iterations {
        let report = store
            .insert_n(cli.inserts)
            .with_context(|| format!("iteration {} failed", iteration))?;
        print_report(&report, cli.json)?;
        reports.push(report);
    }

    if reports.len() > 1 {
        let total: f64 = reports.iter().map(WorkloadReport::ops_per_sec).sum();
        let mean = total / reports.len() as f64;
        info!("Mean over {} iterations: {:.0} ops/s", reports.len(), mean);
    }

    if cli.keep {
        store.release().context("failed to close store")?;
        info!("Kept {:?}", cli.path);
    } else {
        store.close().context("failed to close store")?;
    }

    Ok(())
}

fn print_report(report: &WorkloadReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", report.to_json()?);
    } else {
        println!("{}", report);
    }
    Ok(())
}
