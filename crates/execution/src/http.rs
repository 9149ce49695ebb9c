//! Shared HTTP plumbing for the REST clients.
//!
//! Builds a `reqwest::Client` with a hard per-exchange timeout and sends a
//! signed request exactly as signed. Status and body interpretation is left
//! to each exchange client.

use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use cefi_core::types::Exchange;
use cefi_core::PollError;

use crate::request::{AuthParts, Method, SignedRequest};

/// Status and raw body of a completed exchange call.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parse the body as JSON; a non-JSON body is a transport failure.
    pub fn json(&self, exchange: Exchange) -> Result<serde_json::Value, PollError> {
        serde_json::from_str(&self.body).map_err(|e| {
            PollError::transport(
                exchange,
                format!("non-JSON response (HTTP {}): {}: {}", self.status, e, self.body),
            )
        })
    }
}

/// Build a client whose every request fails after `timeout_ms`.
pub fn build_client(exchange: Exchange, timeout_ms: u64) -> Result<Client, PollError> {
    Client::builder()
        .timeout(Duration::from_millis(timeout_ms))
        .build()
        .map_err(|e| PollError::transport(exchange, format!("failed to build HTTP client: {}", e)))
}

/// Send `req` with the headers and query produced by its signer.
pub async fn send_signed(
    client: &Client,
    exchange: Exchange,
    req: &SignedRequest,
    auth: &AuthParts,
) -> Result<RawResponse, PollError> {
    let url = req.url_with(&auth.query);
    debug!(%exchange, method = %req.method, path = %req.path, "signed request");

    let mut builder = client.request(req.method.into(), &url);
    for (name, value) in &auth.headers {
        builder = builder.header(*name, value);
    }
    if req.method == Method::Post {
        builder = builder
            .header("Content-Type", "application/json")
            .body(req.body_str().to_string());
    }

    let resp = builder.send().await.map_err(|e| {
        let message = if e.is_timeout() {
            format!("{} {} timed out", req.method, req.path)
        } else {
            format!("{} {} request failed: {}", req.method, req.path, e)
        };
        PollError::transport(exchange, message)
    })?;

    let status = resp.status().as_u16();
    let body = resp
        .text()
        .await
        .map_err(|e| PollError::transport(exchange, format!("failed to read response body: {}", e)))?;

    debug!(%exchange, path = %req.path, status, "response received");
    Ok(RawResponse { status, body })
}
