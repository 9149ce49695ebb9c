//! Exchange identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported exchanges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Exchange {
    /// Bybit unified trading (linear contracts).
    Bybit,
    /// Binance USD-M futures.
    Binance,
    /// OKX unified account.
    Okx,
}

impl Exchange {
    /// Lowercase identifier used in report rows.
    pub fn as_str(&self) -> &'static str {
        match self {
            Exchange::Bybit => "bybit",
            Exchange::Binance => "binance",
            Exchange::Okx => "okx",
        }
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exchange::Bybit => write!(f, "Bybit"),
            Exchange::Binance => write!(f, "Binance"),
            Exchange::Okx => write!(f, "OKX"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_identifiers() {
        assert_eq!(Exchange::Bybit.as_str(), "bybit");
        assert_eq!(Exchange::Binance.as_str(), "binance");
        assert_eq!(Exchange::Okx.as_str(), "okx");
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&Exchange::Okx).unwrap();
        assert_eq!(json, "\"okx\"");
    }
}
