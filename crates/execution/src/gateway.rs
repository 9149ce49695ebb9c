//! Per-exchange metric sources.
//!
//! The [`MetricSource`] trait is what the poller drives: one implementor per
//! exchange, each pairing a REST client with its normalization and target
//! instrument.

use async_trait::async_trait;
use tracing::{debug, info};

use cefi_core::config::{BinanceConfig, BybitConfig, OkxConfig};
use cefi_core::types::{Exchange, PositionMetric};
use cefi_core::PollError;

use crate::binance_rest::{BinanceRestClient, IncomeQuery};
use crate::bybit_rest::{BybitPosition, BybitRestClient, PositionQuery};
use crate::normalize::{
    binance_metrics, bybit_metrics, find_by_symbol, okx_metrics, BINANCE_METRICS, BYBIT_METRICS,
    OKX_METRICS,
};
use crate::okx_rest::OkxRestClient;

/// Upper bound on Bybit position pages followed while looking for the target.
pub const MAX_BYBIT_PAGES: usize = 10;

/// One exchange's contribution to a polling pass.
#[async_trait]
pub trait MetricSource: Send + Sync {
    fn exchange(&self) -> Exchange;

    /// Target instrument, used for rows of a failed fetch.
    fn symbol(&self) -> &str;

    /// Metric names this source emits, excluding `status`.
    fn metric_names(&self) -> &'static [&'static str];

    /// Local parameter checks. Runs for every source before any request.
    fn preflight(&self) -> Result<(), PollError> {
        Ok(())
    }

    /// Fetch and normalize.
    async fn fetch_metrics(&self) -> Result<Vec<PositionMetric>, PollError>;
}

/// Bybit linear positions.
pub struct BybitSource {
    client: BybitRestClient,
    query: PositionQuery,
    symbol: String,
}

impl BybitSource {
    pub fn new(client: BybitRestClient, query: PositionQuery, symbol: impl Into<String>) -> Self {
        Self {
            client,
            query,
            symbol: symbol.into(),
        }
    }

    pub fn from_config(cfg: &BybitConfig) -> Result<Self, PollError> {
        let client = BybitRestClient::new(
            &cfg.rest_url,
            cfg.credential(),
            cfg.recv_window_ms,
            cfg.timeout_ms,
        )?;
        let query = PositionQuery {
            symbol: Some(cfg.symbol.clone()),
            base_coin: cfg.base_coin.clone(),
            settle_coin: cfg.settle_coin.clone(),
            limit: cfg.limit,
            cursor: None,
        };
        Ok(Self::new(client, query, &cfg.symbol))
    }
}

#[async_trait]
impl MetricSource for BybitSource {
    fn exchange(&self) -> Exchange {
        Exchange::Bybit
    }

    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn metric_names(&self) -> &'static [&'static str] {
        BYBIT_METRICS
    }

    /// Follows `nextPageCursor` until the target shows up or pages run out.
    async fn fetch_metrics(&self) -> Result<Vec<PositionMetric>, PollError> {
        let mut query = self.query.clone();
        let mut seen: Vec<BybitPosition> = Vec::new();

        for page in 0..MAX_BYBIT_PAGES {
            let list = self.client.get_positions(&query).await?;
            debug!(page, positions = list.list.len(), "Bybit position page");
            seen.extend(list.list);

            if find_by_symbol(&seen, &self.symbol, |p| p.symbol.as_str()).is_some() {
                break;
            }
            match list.next_page_cursor.filter(|c| !c.is_empty()) {
                Some(cursor) => query.cursor = Some(cursor),
                None => break,
            }
        }

        let rows = bybit_metrics(&seen, &self.symbol);
        info!(symbol = %self.symbol, positions = seen.len(), "Bybit metrics collected");
        Ok(rows)
    }
}

/// Binance funding income plus account position amount.
pub struct BinanceSource {
    client: BinanceRestClient,
    income: IncomeQuery,
    symbol: String,
}

impl BinanceSource {
    pub fn new(client: BinanceRestClient, income: IncomeQuery, symbol: impl Into<String>) -> Self {
        Self {
            client,
            income,
            symbol: symbol.into(),
        }
    }

    pub fn from_config(cfg: &BinanceConfig) -> Result<Self, PollError> {
        let client = BinanceRestClient::new(
            &cfg.rest_url,
            cfg.credential(),
            cfg.recv_window_ms,
            cfg.timeout_ms,
        )?;
        let income = IncomeQuery {
            symbol: None,
            income_type: Some(cfg.income_type.clone()),
            start_time_ms: cfg.income_start_ms,
            end_time_ms: cfg.income_end_ms,
            page: None,
            limit: cfg.income_limit,
        };
        Ok(Self::new(client, income, &cfg.symbol))
    }
}

#[async_trait]
impl MetricSource for BinanceSource {
    fn exchange(&self) -> Exchange {
        Exchange::Binance
    }

    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn metric_names(&self) -> &'static [&'static str] {
        BINANCE_METRICS
    }

    fn preflight(&self) -> Result<(), PollError> {
        self.income.validate()
    }

    async fn fetch_metrics(&self) -> Result<Vec<PositionMetric>, PollError> {
        let income = self.client.get_income(&self.income).await?;
        let account = self.client.get_account().await?;
        let rows = binance_metrics(&income, &account, &self.symbol)?;
        info!(
            symbol = %self.symbol,
            income_rows = income.len(),
            positions = account.positions.len(),
            "Binance metrics collected"
        );
        Ok(rows)
    }
}

/// OKX account positions.
pub struct OkxSource {
    client: OkxRestClient,
    inst_type: String,
    inst_id: String,
}

impl OkxSource {
    pub fn new(client: OkxRestClient, inst_type: impl Into<String>, inst_id: impl Into<String>) -> Self {
        Self {
            client,
            inst_type: inst_type.into(),
            inst_id: inst_id.into(),
        }
    }

    pub fn from_config(cfg: &OkxConfig) -> Result<Self, PollError> {
        let client = OkxRestClient::new(&cfg.rest_url, cfg.credential(), cfg.timeout_ms)?;
        Ok(Self::new(client, &cfg.inst_type, &cfg.inst_id))
    }
}

#[async_trait]
impl MetricSource for OkxSource {
    fn exchange(&self) -> Exchange {
        Exchange::Okx
    }

    fn symbol(&self) -> &str {
        &self.inst_id
    }

    fn metric_names(&self) -> &'static [&'static str] {
        OKX_METRICS
    }

    async fn fetch_metrics(&self) -> Result<Vec<PositionMetric>, PollError> {
        let inst_type = Some(self.inst_type.as_str()).filter(|s| !s.is_empty());
        let positions = self
            .client
            .get_positions(inst_type, Some(&self.inst_id))
            .await?;
        let rows = okx_metrics(&positions, &self.inst_id);
        info!(inst_id = %self.inst_id, positions = positions.len(), "OKX metrics collected");
        Ok(rows)
    }
}
