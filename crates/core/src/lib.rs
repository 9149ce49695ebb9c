//! # cefi-core
//!
//! Shared building blocks for the CeFi PnL poller: exchange identifiers,
//! credentials, normalized metric rows, the error taxonomy, layered
//! configuration and the logging setup.

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use error::PollError;
