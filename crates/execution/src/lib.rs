//! # cefi-execution
//!
//! Exchange request signing and REST clients for Bybit, Binance USD-M
//! futures and OKX. Each exchange has its own signing strategy behind the
//! [`signer::Signer`] trait, a client that checks transport and envelope
//! errors separately, and a [`gateway::MetricSource`] that normalizes its
//! responses into report rows.

pub mod binance_rest;
pub mod bybit_rest;
pub mod gateway;
pub mod http;
pub mod normalize;
pub mod okx_rest;
pub mod request;
pub mod signer;
pub mod signing;
