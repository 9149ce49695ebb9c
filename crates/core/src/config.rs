//! Layered configuration for the CeFi PnL poller.
//!
//! Configuration is loaded in layers with increasing priority:
//! 1. Compiled-in defaults (production URLs, target symbols, timeouts)
//! 2. TOML configuration file (if provided)
//! 3. Environment variable overrides (prefix `CEFI_PNL_`, nested with `__`)
//! 4. Dedicated env vars for credentials (`BYBIT_API_KEY`, etc.)
//!
//! Credentials **must** come from environment variables, never from
//! configuration files. The struct is built once at startup and passed down;
//! nothing below this module reads the environment.

use std::path::PathBuf;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::PollError;
use crate::types::Credential;

/// Bybit production REST host.
pub const BYBIT_REST_URL: &str = "https://api.bybit.com";
/// Binance USD-M futures production REST host.
pub const BINANCE_REST_URL: &str = "https://fapi.binance.com";
/// OKX production REST host.
pub const OKX_REST_URL: &str = "https://www.okx.com";

/// 2025-12-15T00:00:00Z, start of the funding-fee accounting window.
pub const DEFAULT_INCOME_START_MS: i64 = 1_765_756_800_000;

// ── Default value functions ────────────────────────────────────────────

/// Default receive window: 5 000 ms.
fn default_recv_window_ms() -> u64 {
    5_000
}

/// Default Bybit/OKX request timeout: 10 000 ms.
fn default_short_timeout_ms() -> u64 {
    10_000
}

/// Default Binance request timeout: 20 000 ms.
fn default_long_timeout_ms() -> u64 {
    20_000
}

fn default_income_limit() -> i64 {
    1_000
}

// ── Configuration structs ──────────────────────────────────────────────

/// Top-level application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub bybit: BybitConfig,
    pub binance: BinanceConfig,
    pub okx: OkxConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

/// Bybit connection and position-query settings.
#[derive(Debug, Clone, Deserialize)]
pub struct BybitConfig {
    /// Loaded from `BYBIT_API_KEY`.
    #[serde(default)]
    pub api_key: String,
    /// Loaded from `BYBIT_API_SECRET`.
    #[serde(default)]
    pub api_secret: String,
    pub rest_url: String,
    #[serde(default = "default_short_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_recv_window_ms")]
    pub recv_window_ms: u64,
    /// Target linear contract, e.g. `NIGHTUSDT`.
    pub symbol: String,
    #[serde(default)]
    pub base_coin: Option<String>,
    #[serde(default)]
    pub settle_coin: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
}

/// Binance USD-M futures settings.
#[derive(Debug, Clone, Deserialize)]
pub struct BinanceConfig {
    /// Loaded from `BINANCE_API_KEY`.
    #[serde(default)]
    pub api_key: String,
    /// Loaded from `BINANCE_API_SECRET`.
    #[serde(default)]
    pub api_secret: String,
    pub rest_url: String,
    #[serde(default = "default_long_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_recv_window_ms")]
    pub recv_window_ms: u64,
    /// Symbol whose `positionAmt` is reported from the account snapshot.
    pub symbol: String,
    /// Income type filter, e.g. `FUNDING_FEE`.
    pub income_type: String,
    #[serde(default)]
    pub income_start_ms: Option<i64>,
    #[serde(default)]
    pub income_end_ms: Option<i64>,
    /// Rows per income page, 1..=1000 (checked by the client).
    #[serde(default = "default_income_limit")]
    pub income_limit: i64,
}

/// OKX settings. Polled only when all three credentials are present.
#[derive(Debug, Clone, Deserialize)]
pub struct OkxConfig {
    /// Loaded from `OKX_API_KEY`.
    #[serde(default)]
    pub api_key: String,
    /// Loaded from `OKX_API_SECRET`.
    #[serde(default)]
    pub api_secret: String,
    /// Loaded from `OKX_PASSPHRASE`.
    #[serde(default)]
    pub passphrase: String,
    pub rest_url: String,
    #[serde(default = "default_short_timeout_ms")]
    pub timeout_ms: u64,
    /// Instrument type filter, e.g. `SWAP`.
    pub inst_type: String,
    /// Target instrument, e.g. `NIGHT-USDT-SWAP`.
    pub inst_id: String,
}

/// Report sink settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportConfig {
    /// JSON-lines output file; stdout when unset.
    #[serde(default)]
    pub output: Option<PathBuf>,
}

impl BybitConfig {
    pub fn credential(&self) -> Credential {
        Credential::new(&self.api_key, &self.api_secret)
    }
}

impl BinanceConfig {
    pub fn credential(&self) -> Credential {
        Credential::new(&self.api_key, &self.api_secret)
    }
}

impl OkxConfig {
    pub fn credential(&self) -> Credential {
        Credential::with_passphrase(&self.api_key, &self.api_secret, &self.passphrase)
    }

    /// True when every OKX credential is non-empty.
    pub fn enabled(&self) -> bool {
        !self.api_key.is_empty() && !self.api_secret.is_empty() && !self.passphrase.is_empty()
    }
}

fn config_err(e: impl std::fmt::Display) -> PollError {
    PollError::Config(e.to_string())
}

impl AppConfig {
    /// Load configuration using layered sources.
    ///
    /// 1. Compiled-in defaults.
    /// 2. TOML file at `config_path` (if `Some`).
    /// 3. Environment variable overrides with prefix `CEFI_PNL_` and `__` as
    ///    the nesting separator (e.g., `CEFI_PNL_BYBIT__SYMBOL=BTCUSDT`).
    /// 4. Credentials from `BYBIT_API_KEY`, `BYBIT_API_SECRET`,
    ///    `BINANCE_API_KEY`, `BINANCE_API_SECRET`, `OKX_API_KEY`,
    ///    `OKX_API_SECRET`, `OKX_PASSPHRASE`.
    ///
    /// Any failure is a [`PollError::Config`], raised before any network call.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, PollError> {
        let mut builder = Config::builder()
            // ── Layer 1: compiled-in defaults ───────────────────────
            // Bybit
            .set_default("bybit.rest_url", BYBIT_REST_URL)
            .map_err(config_err)?
            .set_default("bybit.timeout_ms", 10_000i64)
            .map_err(config_err)?
            .set_default("bybit.recv_window_ms", 5_000i64)
            .map_err(config_err)?
            .set_default("bybit.symbol", "NIGHTUSDT")
            .map_err(config_err)?
            .set_default("bybit.settle_coin", "USDT")
            .map_err(config_err)?
            // Binance
            .set_default("binance.rest_url", BINANCE_REST_URL)
            .map_err(config_err)?
            .set_default("binance.timeout_ms", 20_000i64)
            .map_err(config_err)?
            .set_default("binance.recv_window_ms", 5_000i64)
            .map_err(config_err)?
            .set_default("binance.symbol", "NIGHTUSDT")
            .map_err(config_err)?
            .set_default("binance.income_type", "FUNDING_FEE")
            .map_err(config_err)?
            .set_default("binance.income_start_ms", DEFAULT_INCOME_START_MS)
            .map_err(config_err)?
            .set_default("binance.income_limit", 1_000i64)
            .map_err(config_err)?
            // OKX
            .set_default("okx.rest_url", OKX_REST_URL)
            .map_err(config_err)?
            .set_default("okx.timeout_ms", 10_000i64)
            .map_err(config_err)?
            .set_default("okx.inst_type", "SWAP")
            .map_err(config_err)?
            .set_default("okx.inst_id", "NIGHT-USDT-SWAP")
            .map_err(config_err)?;

        // ── Layer 2: TOML file ─────────────────────────────────────
        if let Some(path) = config_path {
            let path_str = path
                .to_str()
                .ok_or_else(|| PollError::Config("config path is not valid UTF-8".into()))?;
            builder = builder.add_source(File::with_name(path_str).required(true));
        }

        // ── Layer 3: env var overrides (CEFI_PNL_ prefix) ─────────
        // The prefix separator is set explicitly; otherwise the `config`
        // crate reuses `__` for it.
        builder = builder.add_source(
            Environment::with_prefix("CEFI_PNL")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut cfg: AppConfig = builder
            .build()
            .map_err(|e| PollError::Config(format!("failed to build configuration: {}", e)))?
            .try_deserialize()
            .map_err(|e| PollError::Config(format!("failed to deserialize configuration: {}", e)))?;

        // ── Layer 4: dedicated credential env vars ─────────────────
        if let Ok(v) = std::env::var("BYBIT_API_KEY") {
            cfg.bybit.api_key = v;
        }
        if let Ok(v) = std::env::var("BYBIT_API_SECRET") {
            cfg.bybit.api_secret = v;
        }
        if let Ok(v) = std::env::var("BINANCE_API_KEY") {
            cfg.binance.api_key = v;
        }
        if let Ok(v) = std::env::var("BINANCE_API_SECRET") {
            cfg.binance.api_secret = v;
        }
        if let Ok(v) = std::env::var("OKX_API_KEY") {
            cfg.okx.api_key = v;
        }
        if let Ok(v) = std::env::var("OKX_API_SECRET") {
            cfg.okx.api_secret = v;
        }
        if let Ok(v) = std::env::var("OKX_PASSPHRASE") {
            cfg.okx.passphrase = v;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Validate configuration invariants.
    ///
    /// Bybit and Binance credentials are required. OKX credentials are
    /// all-or-nothing. Timeouts must be non-zero.
    pub fn validate(&self) -> Result<(), PollError> {
        require("BYBIT_API_KEY", &self.bybit.api_key)?;
        require("BYBIT_API_SECRET", &self.bybit.api_secret)?;
        require("BINANCE_API_KEY", &self.binance.api_key)?;
        require("BINANCE_API_SECRET", &self.binance.api_secret)?;

        let okx_set = [
            ("OKX_API_KEY", &self.okx.api_key),
            ("OKX_API_SECRET", &self.okx.api_secret),
            ("OKX_PASSPHRASE", &self.okx.passphrase),
        ];
        if okx_set.iter().any(|(_, v)| !v.is_empty()) {
            for (name, v) in okx_set {
                require(name, v)?;
            }
        }

        for (name, ms) in [
            ("bybit.timeout_ms", self.bybit.timeout_ms),
            ("binance.timeout_ms", self.binance.timeout_ms),
            ("okx.timeout_ms", self.okx.timeout_ms),
        ] {
            if ms == 0 {
                return Err(PollError::Config(format!("{} must be greater than zero", name)));
            }
        }
        Ok(())
    }
}

fn require(name: &str, value: &str) -> Result<(), PollError> {
    if value.is_empty() {
        return Err(PollError::Config(format!(
            "Missing required env var: {}",
            name
        )));
    }
    Ok(())
}
