//! Core types shared by the signing, fetch and report layers.

pub mod credential;
pub mod exchange;
pub mod metric;

// Re-export primary types for convenient access via `cefi_core::types::*`.
pub use credential::Credential;
pub use exchange::Exchange;
pub use metric::{MetricValue, PositionMetric, NOT_FOUND};
