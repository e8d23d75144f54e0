//! Snapper CLI: replay bars through a strategy, export indicators, manage config.
//!
//! Commands:
//! - `replay`: warm up on history, trade the rest through a paper gateway
//! - `indicators`: compute the indicator surface without trading
//! - `check-config`: validate a TOML config and print its fingerprint
//! - `sample-config`: print the default configuration as TOML

mod logging;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;

use snapper_core::config::SnapperConfig;
use snapper_core::data::{load_bars_csv, synthetic_bars};
use snapper_core::divergence::DivergenceDetector;
use snapper_core::domain::{PriceBar, TradeState};
use snapper_core::engine::{export_outputs_csv, run_replay, BarOutput, ReplayResult, Session};
use snapper_core::gateway::PaperGateway;
use snapper_core::indicators::IndicatorEngine;
use snapper_core::notify::LogNotifier;
use snapper_core::strategy::TradeCommand;

#[derive(Parser)]
#[command(
    name = "snapper",
    about = "Snapper: streaming RSI signals and single-position trading"
)]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay bars through the configured strategy with a paper gateway.
    Replay {
        /// Path to a TOML config file. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// CSV file with timestamp,open,high,low,close,volume rows.
        #[arg(long, conflicts_with = "synthetic")]
        bars: Option<PathBuf>,

        /// Generate this many synthetic hourly bars instead of reading a file.
        #[arg(long)]
        synthetic: Option<usize>,

        /// Starting balance of the paper account.
        #[arg(long, default_value_t = 10_000.0)]
        balance: f64,

        /// Write the per-bar output surface to this CSV file.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Compute RSI, envelope and divergence markers for every bar, no trading.
    Indicators {
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long)]
        bars: PathBuf,

        /// Output CSV. Prints to stdout when omitted.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Validate a config file and print its fingerprint.
    CheckConfig {
        path: PathBuf,
    },
    /// Print the default configuration as TOML.
    SampleConfig,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.json_logs);

    match cli.command {
        Commands::Replay {
            config,
            bars,
            synthetic,
            balance,
            output,
        } => run_replay_cmd(config.as_deref(), bars.as_deref(), synthetic, balance, output.as_deref()),
        Commands::Indicators {
            config,
            bars,
            output,
        } => run_indicators_cmd(config.as_deref(), &bars, output.as_deref()),
        Commands::CheckConfig { path } => run_check_config(&path),
        Commands::SampleConfig => {
            print!("{}", SnapperConfig::default().to_toml()?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<SnapperConfig> {
    match path {
        Some(p) => SnapperConfig::from_file(p)
            .with_context(|| format!("failed to load config {}", p.display())),
        None => Ok(SnapperConfig::default()),
    }
}

fn load_bars(path: Option<&Path>, synthetic: Option<usize>, instrument: &str) -> Result<Vec<PriceBar>> {
    match (path, synthetic) {
        (Some(p), _) => {
            load_bars_csv(p).with_context(|| format!("failed to load bars from {}", p.display()))
        }
        (None, Some(n)) => Ok(synthetic_bars(instrument, n)),
        (None, None) => bail!("one of --bars or --synthetic is required"),
    }
}

fn write_output(rows: &[BarOutput], path: Option<&Path>) -> Result<()> {
    let csv = export_outputs_csv(rows)?;
    match path {
        Some(p) => {
            std::fs::write(p, csv).with_context(|| format!("failed to write {}", p.display()))?;
            info!(path = %p.display(), rows = rows.len(), "output written");
        }
        None => print!("{csv}"),
    }
    Ok(())
}

fn run_replay_cmd(
    config_path: Option<&Path>,
    bars_path: Option<&Path>,
    synthetic: Option<usize>,
    balance: f64,
    output: Option<&Path>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let bars = load_bars(bars_path, synthetic, &config.instrument)?;
    if bars.len() <= config.warmup_bars {
        bail!(
            "{} bars cannot cover {} warm-up bars plus live trading",
            bars.len(),
            config.warmup_bars
        );
    }

    let mut session = Session::new(config, PaperGateway::new(balance), LogNotifier)?;
    let result = run_replay(&mut session, &bars);

    print_summary(&result, session.gateway());
    if let Some(path) = output {
        write_output(&result.outputs, Some(path))?;
    }
    Ok(())
}

fn run_indicators_cmd(config_path: Option<&Path>, bars_path: &Path, output: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let bars = load_bars(Some(bars_path), None, &config.instrument)?;

    let mut engine = IndicatorEngine::from_config(&config)?;
    let mut detector = DivergenceDetector::new(&config.divergence)?;
    let rows: Vec<BarOutput> = bars
        .iter()
        .map(|bar| {
            let snapshot = engine.update(bar);
            let divergence = detector.on_bar(bar, &snapshot);
            BarOutput::new(bar, &snapshot, divergence.as_ref(), TradeState::Flat, None)
        })
        .collect();

    write_output(&rows, output)
}

fn run_check_config(path: &Path) -> Result<()> {
    let config = load_config(Some(path))?;
    println!("Config OK: {}", path.display());
    println!("Instrument:   {}", config.instrument);
    println!("Strategy id:  {}", config.strategy_id);
    println!("Policy:       {}", config.policy.name());
    println!("Fingerprint:  {}", config.fingerprint().short());
    Ok(())
}

fn print_summary(result: &ReplayResult, gateway: &PaperGateway) {
    let closes = result
        .commands
        .iter()
        .filter_map(|c| match c {
            TradeCommand::Close { realized_pnl, .. } => Some(*realized_pnl),
            TradeCommand::Open { .. } => None,
        })
        .collect::<Vec<_>>();
    let wins = closes.iter().filter(|p| **p > 0.0).count();

    println!();
    println!("=== Replay Result ===");
    println!(
        "Bars:           {} ({} warmup)",
        result.outputs.len() + result.warmup_bars,
        result.warmup_bars
    );
    println!("Commands:       {}", result.commands.len());
    println!("Round trips:    {}", closes.len());
    if !closes.is_empty() {
        println!("Win Rate:       {:.1}%", wins as f64 / closes.len() as f64 * 100.0);
    }
    println!("Realized P/L:   {:.2}", closes.iter().sum::<f64>());
    println!("Balance:        {:.2}", gateway.balance());
    println!("Heartbeats:     {}", result.heartbeats);
    println!("Final State:    {}", result.final_state);
}
