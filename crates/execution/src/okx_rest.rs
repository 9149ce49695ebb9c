//! OKX REST API v5 client for account positions.
//!
//! Responses go through two separate checks: the HTTP status
//! ([`PollError::ExchangeHttp`]), then the envelope `code`, which must be the
//! string `"0"` ([`PollError::ExchangeApi`]). A 200 with a non-zero code is
//! a failure.

use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;

use cefi_core::types::{Credential, Exchange};
use cefi_core::PollError;

use crate::http::{build_client, send_signed, RawResponse};
use crate::request::{QueryParams, SignedRequest};
use crate::signer::{OkxSigner, Signer};

/// Account positions endpoint.
pub const POSITIONS_PATH: &str = "/api/v5/account/positions";

/// OKX REST API v5 client.
pub struct OkxRestClient {
    base_url: String,
    signer: OkxSigner,
    client: Client,
}

/// One entry of `/api/v5/account/positions`.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct OkxPosition {
    #[serde(rename = "instId")]
    pub inst_id: String,
    #[serde(rename = "instType", default)]
    pub inst_type: String,
    #[serde(rename = "posSide", default)]
    pub pos_side: String,
    #[serde(default)]
    pub pos: Option<String>,
    #[serde(rename = "realizedPnl", default)]
    pub realized_pnl: Option<String>,
    #[serde(rename = "deltaPA", default)]
    pub delta_pa: Option<String>,
    #[serde(default)]
    pub upl: Option<String>,
}

impl OkxRestClient {
    /// Create a client against `base_url` with a hard request timeout.
    pub fn new(
        base_url: impl Into<String>,
        credential: Credential,
        timeout_ms: u64,
    ) -> Result<Self, PollError> {
        Ok(Self {
            base_url: base_url.into(),
            signer: OkxSigner::new(credential),
            client: build_client(Exchange::Okx, timeout_ms)?,
        })
    }

    /// Get open positions.
    ///
    /// GET `/api/v5/account/positions`.
    pub async fn get_positions(
        &self,
        inst_type: Option<&str>,
        inst_id: Option<&str>,
    ) -> Result<Vec<OkxPosition>, PollError> {
        let mut q = QueryParams::new();
        q.push_opt("instType", inst_type).push_opt("instId", inst_id);
        self.sign_and_send_get(POSITIONS_PATH, q).await
    }

    async fn sign_and_send_get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: QueryParams,
    ) -> Result<T, PollError> {
        let req = SignedRequest::get(self.base_url.clone(), path, query);
        let auth = self.signer.sign(&req);
        debug!(
            path,
            key_fingerprint = %self.signer.key_fingerprint(),
            "OKX GET request"
        );

        let raw = send_signed(&self.client, Exchange::Okx, &req, &auth).await?;
        let data = check_transport(raw).and_then(check_envelope)?;
        serde_json::from_value(data.clone()).map_err(|e| PollError::ResponseShape {
            exchange: Exchange::Okx,
            status: 200,
            payload: format!("{}: {}", e, data),
        })
    }
}

/// Step 1: HTTP status and JSON body.
fn check_transport(raw: RawResponse) -> Result<(serde_json::Value, String), PollError> {
    if !raw.is_success() {
        return Err(PollError::ExchangeHttp {
            exchange: Exchange::Okx,
            status: raw.status,
            body: raw.body,
        });
    }
    let value = raw.json(Exchange::Okx)?;
    Ok((value, raw.body))
}

/// Step 2: envelope `code` must be `"0"`. Returns `data`.
fn check_envelope((value, body): (serde_json::Value, String)) -> Result<serde_json::Value, PollError> {
    let code = match value.get("code") {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => {
            return Err(PollError::ResponseShape {
                exchange: Exchange::Okx,
                status: 200,
                payload: body,
            })
        }
    };

    if code != "0" {
        let msg = value
            .get("msg")
            .and_then(|m| m.as_str())
            .unwrap_or_default()
            .to_string();
        return Err(PollError::ExchangeApi {
            exchange: Exchange::Okx,
            code,
            msg,
            body,
        });
    }

    Ok(value
        .get("data")
        .cloned()
        .unwrap_or(serde_json::Value::Array(Vec::new())))
}
