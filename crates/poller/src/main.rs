//! cefi-pnl: poll Bybit, Binance and OKX once and publish a PnL snapshot.
//!
//! Loads configuration, runs a single sequential polling pass and writes the
//! report as JSON lines to stdout or `--output`. Exits non-zero when any
//! exchange failed, after the partial report has been published.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{error, info};

use cefi_core::config::AppConfig;
use cefi_poller::poll::{build_sources, run_pass};
use cefi_poller::report::{JsonLinesSink, Report, ReportSink};

/// CeFi PnL poller
#[derive(Parser, Debug)]
#[command(name = "cefi-pnl", about = "Poll exchange positions and publish a PnL snapshot")]
struct Args {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the report here instead of stdout (overrides `report.output`).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Human-readable logs instead of JSON.
    #[arg(long, default_value_t = false)]
    pretty_logs: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    cefi_core::logging::init_tracing(!args.pretty_logs)?;

    let config = AppConfig::load(args.config).context("pre-flight configuration check failed")?;
    info!(
        bybit_symbol = %config.bybit.symbol,
        binance_symbol = %config.binance.symbol,
        okx_enabled = config.okx.enabled(),
        "starting cefi-pnl"
    );

    let sources = build_sources(&config)?;
    let outcome = run_pass(&sources).await?;

    let report = Report::build(outcome.rows, chrono::Utc::now());
    let output = args.output.or(config.report.output);
    let mut sink: Box<dyn ReportSink> = match &output {
        Some(path) => Box::new(JsonLinesSink::create(path)?),
        None => Box::new(JsonLinesSink::stdout()),
    };
    sink.publish(&report)?;
    info!(rows = report.rows.len(), run_time = %report.run_time, "report published");

    if !outcome.failures.is_empty() {
        for (exchange, err) in &outcome.failures {
            error!(%exchange, error = %err, "exchange failed during pass");
        }
        bail!("{} exchange(s) failed", outcome.failures.len());
    }
    Ok(())
}
