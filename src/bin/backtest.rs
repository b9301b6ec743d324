//! tradecore backtest runner.
//!
//! Replays a signal plus its historical candle sequence through the same
//! confirmation and exit rules used live, applying slippage instead of a
//! real broker round-trip, and persists the resulting trade to SQLite.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing::{info, Level};
use tracing_subscriber::prelude::*;

use tradecore::application::backtest::{BacktestEngine, SlippageConfig};
use tradecore::config::Config;
use tradecore::domain::ports::BacktestRepository;
use tradecore::domain::trading::{Candle, Signal};
use tradecore::infrastructure::persistence::{Database, SqliteBacktestRepository};

#[derive(Parser)]
#[command(author, version, about = "Backtest engine runner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay one signal against a historical candle sequence
    Run {
        /// Path to a JSON-encoded `Signal`
        #[arg(long)]
        signal_file: PathBuf,

        /// Path to a JSON array of `Candle`, in chronological order
        #[arg(long)]
        candles_file: PathBuf,

        /// Daily pivot level for the signal's instrument, if known
        #[arg(long)]
        pivot: Option<Decimal>,

        /// SQLite database path for the result
        #[arg(long, default_value = "tradecore_backtest.db")]
        db: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Commands::Run { signal_file, candles_file, pivot, db } => {
            let signal: Signal = serde_json::from_str(
                &fs::read_to_string(&signal_file).context("reading signal file")?,
            )
            .context("parsing signal file")?;
            let candles: Vec<Candle> = serde_json::from_str(
                &fs::read_to_string(&candles_file).context("reading candles file")?,
            )
            .context("parsing candles file")?;

            if candles.is_empty() {
                anyhow::bail!("candles file contains no candles");
            }

            info!(instrument = %signal.scrip_code, candles = candles.len(), "running backtest");

            let engine = BacktestEngine::new(
                SlippageConfig {
                    entry_bps: config.risk.slippage_entry_bps,
                    exit_stop_multiplier: config.risk.slippage_exit_stop_multiplier,
                },
                config.trading.volume_gate_multiplier,
                config.trading.stop_buffer_pct,
                config.trading.trailing_percent_equity,
                config.trading.early_trailing_activation_percent,
            );

            let signal_time = signal.origin_timestamp;
            let Some(result) = engine.run(signal, signal_time, pivot, &candles) else {
                info!("no entry confirmed over the supplied candle sequence");
                return Ok(());
            };

            info!(
                exit_reason = ?result.exit_reason,
                pnl = %result.realized_pnl,
                "backtest produced a terminal result"
            );

            let database = Database::new(&format!("sqlite://{db}")).await?;
            let repository = SqliteBacktestRepository::new(database);
            repository.save(&result).await?;

            info!(db = %db, "result persisted");
            Ok(())
        }
    }
}
