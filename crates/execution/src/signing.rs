//! HMAC-SHA256 request signing for exchange APIs.
//!
//! Uses the `ring` crate for HMAC computation, avoiding OpenSSL
//! dependencies. Secrets are never logged or included in error messages.
//!
//! Bybit and Binance send the digest as lowercase hex. OKX sends it as
//! standard base64.

use base64::Engine;
use chrono::{DateTime, Utc};
use ring::hmac;

fn hmac_sha256(secret: &str, payload: &str) -> hmac::Tag {
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
    hmac::sign(&key, payload.as_bytes())
}

/// Sign a Binance REST API request.
///
/// Binance signs the query string: `HMAC-SHA256(secret, query_string)`.
/// The resulting hex-encoded signature is appended as `&signature=...`.
pub fn sign_binance_request(secret: &str, query_string: &str) -> String {
    hex::encode(hmac_sha256(secret, query_string).as_ref())
}

/// Bybit v5 pre-sign string: `timestamp + api_key + recv_window + payload`.
///
/// `payload` is the encoded query string for GET and the JSON body for POST.
pub fn bybit_pre_sign(timestamp: u64, api_key: &str, recv_window: u64, payload: &str) -> String {
    format!("{}{}{}{}", timestamp, api_key, recv_window, payload)
}

/// Sign a Bybit REST API v5 request.
///
/// The resulting hex-encoded signature is sent in the `X-BAPI-SIGN` header.
pub fn sign_bybit_request(
    secret: &str,
    timestamp: u64,
    api_key: &str,
    recv_window: u64,
    payload: &str,
) -> String {
    let pre_sign = bybit_pre_sign(timestamp, api_key, recv_window, payload);
    hex::encode(hmac_sha256(secret, &pre_sign).as_ref())
}

/// OKX timestamp: ISO-8601 UTC, exactly three fractional digits, literal `Z`.
pub fn okx_timestamp(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// OKX `requestPath`: the path, plus `?query` when there is a query.
pub fn okx_request_path(path: &str, encoded_query: &str) -> String {
    if encoded_query.is_empty() {
        path.to_string()
    } else {
        format!("{}?{}", path, encoded_query)
    }
}

/// OKX pre-sign string: `timestamp + METHOD + requestPath + body`.
pub fn okx_pre_sign(timestamp: &str, method: &str, request_path: &str, body: &str) -> String {
    format!(
        "{}{}{}{}",
        timestamp,
        method.to_ascii_uppercase(),
        request_path,
        body
    )
}

/// Sign an OKX v5 REST request. Returns the base64 digest for `OK-ACCESS-SIGN`.
pub fn sign_okx_request(
    secret: &str,
    timestamp: &str,
    method: &str,
    request_path: &str,
    body: &str,
) -> String {
    let pre_sign = okx_pre_sign(timestamp, method, request_path, body);
    base64::engine::general_purpose::STANDARD.encode(hmac_sha256(secret, &pre_sign).as_ref())
}
