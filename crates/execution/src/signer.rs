//! Per-exchange signing strategies behind one [`Signer`] capability.
//!
//! The three algorithms share no code beyond the HMAC primitive. Each
//! strategy owns its credential and turns a [`SignedRequest`] into the
//! headers and final query the exchange expects. Every REST client holds
//! its own concrete strategy, so a client cannot be paired with the wrong one.

use chrono::{DateTime, Utc};

use cefi_core::types::{Credential, Exchange};

use crate::request::{AuthParts, Method, SignedRequest};
use crate::signing::{
    okx_request_path, okx_timestamp, sign_binance_request, sign_bybit_request, sign_okx_request,
};

/// Default receive window in milliseconds.
pub const DEFAULT_RECV_WINDOW_MS: u64 = 5_000;

/// Authenticates a request for one exchange.
pub trait Signer {
    /// Exchange this signer authenticates for.
    fn exchange(&self) -> Exchange;

    /// Sign using an explicit instant.
    fn sign_at(&self, req: &SignedRequest, now: DateTime<Utc>) -> AuthParts;

    /// Sign at the current instant. Every call produces a new signature.
    fn sign(&self, req: &SignedRequest) -> AuthParts {
        self.sign_at(req, Utc::now())
    }

    /// Key fingerprint for diagnostics.
    fn key_fingerprint(&self) -> String;
}

/// Bybit v5: `X-BAPI-*` headers over `timestamp + key + recvWindow + payload`.
#[derive(Debug, Clone)]
pub struct BybitSigner {
    credential: Credential,
    recv_window_ms: u64,
}

impl BybitSigner {
    pub fn new(credential: Credential, recv_window_ms: u64) -> Self {
        Self {
            credential,
            recv_window_ms,
        }
    }

    pub fn recv_window_ms(&self) -> u64 {
        self.recv_window_ms
    }
}

impl Signer for BybitSigner {
    fn exchange(&self) -> Exchange {
        Exchange::Bybit
    }

    fn sign_at(&self, req: &SignedRequest, now: DateTime<Utc>) -> AuthParts {
        let timestamp = now.timestamp_millis().max(0) as u64;
        let payload = match req.method {
            Method::Get => req.query.encode(),
            Method::Post => req.body_str().to_string(),
        };
        let signature = sign_bybit_request(
            self.credential.api_secret(),
            timestamp,
            self.credential.api_key(),
            self.recv_window_ms,
            &payload,
        );

        AuthParts {
            headers: vec![
                ("X-BAPI-API-KEY", self.credential.api_key().to_string()),
                ("X-BAPI-TIMESTAMP", timestamp.to_string()),
                ("X-BAPI-SIGN", signature.clone()),
                ("X-BAPI-RECV-WINDOW", self.recv_window_ms.to_string()),
            ],
            query: req.query.clone(),
            timestamp: timestamp.to_string(),
            signature,
        }
    }

    fn key_fingerprint(&self) -> String {
        self.credential.fingerprint()
    }
}

/// Binance: `timestamp`, `recvWindow` and `signature` travel in the query;
/// only the API key is a header.
#[derive(Debug, Clone)]
pub struct BinanceSigner {
    credential: Credential,
    recv_window_ms: u64,
}

impl BinanceSigner {
    pub fn new(credential: Credential, recv_window_ms: u64) -> Self {
        Self {
            credential,
            recv_window_ms,
        }
    }

    pub fn recv_window_ms(&self) -> u64 {
        self.recv_window_ms
    }
}

impl Signer for BinanceSigner {
    fn exchange(&self) -> Exchange {
        Exchange::Binance
    }

    /// Fills `recvWindow` and `timestamp` only when the caller has not set
    /// them, then appends `signature` last over everything before it.
    fn sign_at(&self, req: &SignedRequest, now: DateTime<Utc>) -> AuthParts {
        let mut query = req.query.clone();
        query.remove("signature");
        if !query.contains_key("recvWindow") {
            query.push("recvWindow", self.recv_window_ms);
        }
        if !query.contains_key("timestamp") {
            query.push("timestamp", now.timestamp_millis());
        }
        let timestamp = query.get("timestamp").unwrap_or_default().to_string();

        let signature = sign_binance_request(self.credential.api_secret(), &query.encode());
        query.push("signature", &signature);

        AuthParts {
            headers: vec![("X-MBX-APIKEY", self.credential.api_key().to_string())],
            query,
            timestamp,
            signature,
        }
    }

    fn key_fingerprint(&self) -> String {
        self.credential.fingerprint()
    }
}

/// OKX v5: base64 HMAC over `timestamp + METHOD + requestPath + body`.
#[derive(Debug, Clone)]
pub struct OkxSigner {
    credential: Credential,
}

impl OkxSigner {
    pub fn new(credential: Credential) -> Self {
        Self { credential }
    }
}

impl Signer for OkxSigner {
    fn exchange(&self) -> Exchange {
        Exchange::Okx
    }

    fn sign_at(&self, req: &SignedRequest, now: DateTime<Utc>) -> AuthParts {
        let timestamp = okx_timestamp(now);
        let request_path = okx_request_path(&req.path, &req.query.encode());
        let signature = sign_okx_request(
            self.credential.api_secret(),
            &timestamp,
            req.method.as_str(),
            &request_path,
            req.body_str(),
        );

        AuthParts {
            headers: vec![
                ("OK-ACCESS-KEY", self.credential.api_key().to_string()),
                ("OK-ACCESS-SIGN", signature.clone()),
                ("OK-ACCESS-TIMESTAMP", timestamp.clone()),
                ("OK-ACCESS-PASSPHRASE", self.credential.passphrase().to_string()),
            ],
            query: req.query.clone(),
            timestamp,
            signature,
        }
    }

    fn key_fingerprint(&self) -> String {
        self.credential.fingerprint()
    }
}
