//! The polling pass.
//!
//! Every source's pre-flight check runs before the first request; any
//! failure there aborts the pass. Exchanges are then fetched one after
//! another. A fetch failure is contained to its exchange: its rows become
//! `Null` with an `error: ...` status and the pass continues.

use tracing::{error, info};

use cefi_core::config::AppConfig;
use cefi_core::types::{Exchange, PositionMetric};
use cefi_core::PollError;
use cefi_execution::gateway::{BinanceSource, BybitSource, MetricSource, OkxSource};
use cefi_execution::normalize::failure_metrics;

/// Rows of one pass, in call order, plus the exchanges that failed.
#[derive(Debug)]
pub struct PollOutcome {
    pub rows: Vec<PositionMetric>,
    pub failures: Vec<(Exchange, PollError)>,
}

impl PollOutcome {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Sources in polling order: Bybit, Binance, then OKX when configured.
pub fn build_sources(cfg: &AppConfig) -> Result<Vec<Box<dyn MetricSource>>, PollError> {
    let mut sources: Vec<Box<dyn MetricSource>> = vec![
        Box::new(BybitSource::from_config(&cfg.bybit)?),
        Box::new(BinanceSource::from_config(&cfg.binance)?),
    ];
    if cfg.okx.enabled() {
        sources.push(Box::new(OkxSource::from_config(&cfg.okx)?));
    } else {
        info!("OKX credentials not set, skipping OKX");
    }
    Ok(sources)
}

/// Run one pass. Returns `Err` only for pre-flight failures.
pub async fn run_pass(sources: &[Box<dyn MetricSource>]) -> Result<PollOutcome, PollError> {
    for source in sources {
        source.preflight()?;
    }

    let mut rows = Vec::new();
    let mut failures = Vec::new();

    for source in sources {
        let exchange = source.exchange();
        match source.fetch_metrics().await {
            Ok(metrics) => rows.extend(metrics),
            Err(e) if e.is_preflight() => return Err(e),
            Err(e) => {
                error!(%exchange, error = %e, "exchange fetch failed");
                rows.extend(failure_metrics(
                    exchange,
                    source.symbol(),
                    source.metric_names(),
                    &e,
                ));
                failures.push((exchange, e));
            }
        }
    }

    info!(rows = rows.len(), failed = failures.len(), "polling pass complete");
    Ok(PollOutcome { rows, failures })
}
