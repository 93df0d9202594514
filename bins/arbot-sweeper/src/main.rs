//! Arbot settlement sweeper binary.
//!
//! Opens the RocksDB settlement store and runs periodic sweeps over all
//! eligible users, settling every cycle that has come due. Run with
//! `--once` for a single sweep (cron-style deployments) or let the
//! built-in interval loop drive it.

use std::path::PathBuf;
use std::process;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};

use arbot_engine::{SystemClock, TierCurve};
use arbot_runner::{RocksStore, RunnerConfig, SettlementRunner};

/// Arbot settlement sweeper.
#[derive(Parser, Debug)]
#[command(
    name = "arbot-sweeper",
    version,
    about = "Sweeps all eligible users and settles due profit cycles"
)]
struct Args {
    /// Data directory for settlement storage
    #[arg(long, default_value = None)]
    data_dir: Option<PathBuf>,

    /// Seconds between sweeps
    #[arg(long, default_value_t = 300)]
    interval_secs: u64,

    /// Run exactly one sweep and exit
    #[arg(long)]
    once: bool,

    /// Maximum users settled concurrently
    #[arg(long, default_value_t = 8)]
    max_concurrency: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log output format ("text" or "json")
    #[arg(long, default_value = "text")]
    log_format: String,
}

impl Args {
    /// Convert CLI args into a RunnerConfig.
    fn into_config(self) -> (RunnerConfig, u64, bool, String) {
        let defaults = RunnerConfig::default();
        let config = RunnerConfig {
            data_dir: self.data_dir.unwrap_or(defaults.data_dir.clone()),
            max_concurrency: self.max_concurrency,
            log_level: self.log_level,
            ..defaults
        };
        (config, self.interval_secs, self.once, self.log_format)
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let (config, interval_secs, once, log_format) = args.into_config();

    init_logging(&config.log_level, &log_format);

    info!("Arbot sweeper v{}", env!("CARGO_PKG_VERSION"));
    info!("data_dir: {:?}", config.data_dir);
    info!("interval_secs: {interval_secs}, once: {once}");

    if let Err(err) = run(config, interval_secs, once).await {
        error!("sweeper failed: {err:#}");
        process::exit(1);
    }
}

async fn run(config: RunnerConfig, interval_secs: u64, once: bool) -> anyhow::Result<()> {
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("creating data_dir {:?}", config.data_dir))?;

    let store = RocksStore::open_with_lock_timeout(config.db_path(), config.lock_timeout)
        .with_context(|| format!("opening settlement store at {:?}", config.db_path()))?;

    let runner = SettlementRunner::new(
        Arc::new(store),
        Arc::new(TierCurve::new()),
        Arc::new(SystemClock::new()),
        config,
    );

    // Ctrl+C flips the shared flag; an in-progress sweep stops between
    // users and the loop exits after the current sweep.
    let cancel = runner.cancel_flag();
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
        info!("received Ctrl+C, finishing current sweep");
        cancel.store(true, Ordering::SeqCst);
    });

    let cancel = runner.cancel_flag();
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    loop {
        interval.tick().await;

        let batch = runner.run_for_all_active().await?;
        if batch.users_failed > 0 {
            warn!(
                processed = batch.users_processed,
                failed = batch.users_failed,
                cycles = batch.total_cycles_applied,
                "sweep finished with failures"
            );
        } else {
            info!(
                processed = batch.users_processed,
                cycles = batch.total_cycles_applied,
                "sweep finished"
            );
        }

        if once || cancel.load(Ordering::SeqCst) {
            break;
        }
    }

    info!("sweeper shutdown complete");
    Ok(())
}

/// Initialize tracing subscriber with the given log level and output format.
///
/// Pass `format = "json"` for structured JSON output (suitable for log
/// aggregation pipelines). Any other value defaults to human-readable text.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true))
            .init();
    }
}
