//! Report assembly and sinks.
//!
//! A [`Report`] is the ordered row list of one pass, stamped with the run
//! time, and closed by a `script_run_time` meta row. Sinks decide where it
//! goes; [`JsonLinesSink`] writes one JSON object per row.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use cefi_core::types::{MetricValue, PositionMetric};

/// Metric name of the trailing meta row.
pub const RUN_TIME_METRIC: &str = "script_run_time";

/// One output row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub timestamp_ms: i64,
    pub exchange: String,
    pub symbol: String,
    pub metric: String,
    pub value: MetricValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

/// Rows of one polling pass plus its run timestamp.
#[derive(Debug, Clone)]
pub struct Report {
    pub timestamp_ms: i64,
    /// `%Y-%m-%d %H:%M:%S UTC`.
    pub run_time: String,
    pub rows: Vec<ReportRow>,
}

impl Report {
    /// Stamp `metrics` with `now` and append the meta row. Row order is the
    /// input order.
    pub fn build(metrics: Vec<PositionMetric>, now: DateTime<Utc>) -> Self {
        let timestamp_ms = now.timestamp_millis();
        let run_time = now.format("%Y-%m-%d %H:%M:%S UTC").to_string();

        let mut rows: Vec<ReportRow> = metrics
            .into_iter()
            .map(|m| ReportRow {
                timestamp_ms,
                exchange: m.exchange.as_str().to_string(),
                symbol: m.symbol,
                metric: m.metric,
                value: m.value,
                last_updated: None,
            })
            .collect();
        rows.push(ReportRow {
            timestamp_ms,
            exchange: String::new(),
            symbol: String::new(),
            metric: RUN_TIME_METRIC.to_string(),
            value: MetricValue::Null,
            last_updated: Some(run_time.clone()),
        });

        Self {
            timestamp_ms,
            run_time,
            rows,
        }
    }
}

/// Destination for a finished report.
pub trait ReportSink {
    fn publish(&mut self, report: &Report) -> Result<()>;
}

/// Writes each row as one JSON line.
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl JsonLinesSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl JsonLinesSink<BufWriter<File>> {
    /// Create (truncate) `path`. Each run replaces the previous snapshot.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("failed to create report file {}", path.display()))?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> ReportSink for JsonLinesSink<W> {
    fn publish(&mut self, report: &Report) -> Result<()> {
        for row in &report.rows {
            serde_json::to_writer(&mut self.writer, row).context("failed to serialize report row")?;
            self.writer.write_all(b"\n").context("failed to write report row")?;
        }
        self.writer.flush().context("failed to flush report")?;
        Ok(())
    }
}
