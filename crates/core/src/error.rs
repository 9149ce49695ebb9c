//! Error taxonomy for a polling pass.
//!
//! `Config` and `Validation` are raised before any request leaves the
//! process. The remaining variants come from the network or from an exchange
//! and keep the raw status, code and body for diagnostics. Nothing here is
//! retried.

use crate::types::Exchange;

/// Every failure a polling pass can surface.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    /// Missing, empty or malformed configuration / credential.
    #[error("configuration error: {0}")]
    Config(String),

    /// A caller-supplied parameter is outside the range the exchange accepts.
    #[error("validation error: {0}")]
    Validation(String),

    /// Network failure, timeout, or a body that is not JSON.
    #[error("{exchange} transport error: {message}")]
    Transport {
        exchange: Exchange,
        message: String,
    },

    /// Non-2xx HTTP status.
    #[error("{exchange} HTTP {status}: {body}")]
    ExchangeHttp {
        exchange: Exchange,
        status: u16,
        body: String,
    },

    /// 2xx transport with an application-level error code in the envelope.
    #[error("{exchange} API error {code}: {msg}")]
    ExchangeApi {
        exchange: Exchange,
        code: String,
        msg: String,
        body: String,
    },

    /// Status or JSON shape not what the endpoint documents.
    #[error("{exchange} unexpected response (HTTP {status}): {payload}")]
    ResponseShape {
        exchange: Exchange,
        status: u16,
        payload: String,
    },
}

impl PollError {
    /// Shorthand for a transport failure.
    pub fn transport(exchange: Exchange, message: impl Into<String>) -> Self {
        PollError::Transport {
            exchange,
            message: message.into(),
        }
    }

    /// Whether this error was raised before any network traffic.
    pub fn is_preflight(&self) -> bool {
        matches!(self, PollError::Config(_) | PollError::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preflight_classification() {
        assert!(PollError::Config("x".into()).is_preflight());
        assert!(PollError::Validation("x".into()).is_preflight());
        assert!(!PollError::transport(Exchange::Okx, "timeout").is_preflight());
    }

    #[test]
    fn test_api_error_display_keeps_code() {
        let err = PollError::ExchangeApi {
            exchange: Exchange::Okx,
            code: "1".into(),
            msg: "error".into(),
            body: r#"{"code":"1","msg":"error"}"#.into(),
        };
        assert_eq!(err.to_string(), "OKX API error 1: error");
    }

    #[test]
    fn test_http_error_display() {
        let err = PollError::ExchangeHttp {
            exchange: Exchange::Bybit,
            status: 403,
            body: "forbidden".into(),
        };
        assert_eq!(err.to_string(), "Bybit HTTP 403: forbidden");
    }
}
