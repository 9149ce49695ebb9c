//! API credentials.
//!
//! Secrets never appear in `Debug` output. Diagnostics may show the length of
//! a value and a short SHA-256 fingerprint, nothing more.

use std::fmt;

use ring::digest;

/// Key/secret pair scoped to one exchange, plus the OKX passphrase.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    api_key: String,
    api_secret: String,
    passphrase: Option<String>,
}

impl Credential {
    /// Build a key/secret credential (Bybit, Binance).
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            passphrase: None,
        }
    }

    /// Build a key/secret/passphrase credential (OKX).
    pub fn with_passphrase(
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        passphrase: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            passphrase: Some(passphrase.into()),
        }
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn api_secret(&self) -> &str {
        &self.api_secret
    }

    /// OKX passphrase; empty for exchanges that do not use one.
    pub fn passphrase(&self) -> &str {
        self.passphrase.as_deref().unwrap_or("")
    }

    /// First 8 hex chars of SHA-256(api_key). Safe to log.
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.api_key)
    }
}

/// First 8 hex chars of SHA-256(value).
pub fn fingerprint(value: &str) -> String {
    let d = digest::digest(&digest::SHA256, value.as_bytes());
    hex::encode(&d.as_ref()[..4])
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("api_key", &format_args!("[{} chars, {}]", self.api_key.len(), self.fingerprint()))
            .field("api_secret", &format_args!("[REDACTED {} chars]", self.api_secret.len()))
            .field("passphrase", &self.passphrase.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}
