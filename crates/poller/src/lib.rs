//! # cefi-poller
//!
//! One polling pass over the configured exchanges: pre-flight checks, a
//! sequential fetch per exchange, and an ordered report handed to a
//! [`report::ReportSink`].

pub mod poll;
pub mod report;
