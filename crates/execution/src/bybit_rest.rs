//! Bybit REST API v5 client for position queries.
//!
//! All authenticated requests carry `X-BAPI-*` headers (see
//! [`BybitSigner`]). Responses are checked in two steps: HTTP status, then
//! the `retCode` of the v5 envelope.

use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;

use cefi_core::types::{Credential, Exchange};
use cefi_core::PollError;

use crate::http::{build_client, send_signed, RawResponse};
use crate::request::{QueryParams, SignedRequest};
use crate::signer::{BybitSigner, Signer};

/// Position list endpoint.
pub const POSITION_LIST_PATH: &str = "/v5/position/list";

/// Category for USDT/USDC linear contracts.
pub const LINEAR_CATEGORY: &str = "linear";

/// Bybit REST API v5 client.
pub struct BybitRestClient {
    base_url: String,
    signer: BybitSigner,
    client: Client,
}

/// Filters for `GET /v5/position/list`. Category is always `linear`.
#[derive(Debug, Clone, Default)]
pub struct PositionQuery {
    pub symbol: Option<String>,
    pub base_coin: Option<String>,
    pub settle_coin: Option<String>,
    pub limit: Option<u32>,
    /// `nextPageCursor` exactly as Bybit returned it (already percent-encoded).
    pub cursor: Option<String>,
}

impl PositionQuery {
    /// Query parameters in wire (and signing) order; absent filters are omitted.
    pub fn to_params(&self) -> QueryParams {
        let mut q = QueryParams::new();
        q.push("category", LINEAR_CATEGORY)
            .push_opt("symbol", self.symbol.as_deref())
            .push_opt("baseCoin", self.base_coin.as_deref())
            .push_opt("settleCoin", self.settle_coin.as_deref())
            .push_opt("limit", self.limit);
        if let Some(cursor) = self.cursor.as_deref().filter(|c| !c.is_empty()) {
            q.push_raw("cursor", cursor);
        }
        q
    }
}

/// Bybit v5 generic response wrapper.
#[derive(Debug, serde::Deserialize)]
pub struct BybitResponse<T> {
    /// Return code (0 = success).
    #[serde(rename = "retCode")]
    pub ret_code: i64,
    /// Return message.
    #[serde(rename = "retMsg", default)]
    pub ret_msg: String,
    /// Response payload (present on success).
    pub result: Option<T>,
}

/// Bybit position entry.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct BybitPosition {
    pub symbol: String,
    /// "Buy", "Sell", or "" for an empty slot.
    #[serde(default)]
    pub side: String,
    /// 0 one-way, 1 hedge-mode buy leg, 2 hedge-mode sell leg.
    #[serde(rename = "positionIdx", default)]
    pub position_idx: Option<i64>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(rename = "avgPrice", default)]
    pub avg_price: Option<String>,
    #[serde(rename = "unrealisedPnl", default)]
    pub unrealised_pnl: Option<String>,
    #[serde(rename = "cumRealisedPnl", default)]
    pub cum_realised_pnl: Option<String>,
}

/// Bybit position list wrapper.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct BybitPositionList {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub list: Vec<BybitPosition>,
    /// Empty when there is no further page.
    #[serde(rename = "nextPageCursor", default)]
    pub next_page_cursor: Option<String>,
}

impl BybitRestClient {
    /// Create a client against `base_url` with a hard request timeout.
    pub fn new(
        base_url: impl Into<String>,
        credential: Credential,
        recv_window_ms: u64,
        timeout_ms: u64,
    ) -> Result<Self, PollError> {
        Ok(Self {
            base_url: base_url.into(),
            signer: BybitSigner::new(credential, recv_window_ms),
            client: build_client(Exchange::Bybit, timeout_ms)?,
        })
    }

    /// Get linear positions.
    ///
    /// GET `/v5/position/list`.
    pub async fn get_positions(&self, query: &PositionQuery) -> Result<BybitPositionList, PollError> {
        self.sign_and_send_get(POSITION_LIST_PATH, query.to_params())
            .await
    }

    /// Internal helper: sign and send a GET request with query string.
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
            recv_window = self.signer.recv_window_ms(),
            "Bybit GET request"
        );

        let raw = send_signed(&self.client, Exchange::Bybit, &req, &auth).await?;
        parse_response(path, raw)
    }
}

/// Status check, then envelope check, then payload decode.
fn parse_response<T: DeserializeOwned>(path: &str, raw: RawResponse) -> Result<T, PollError> {
    if !raw.is_success() {
        return Err(PollError::ExchangeHttp {
            exchange: Exchange::Bybit,
            status: raw.status,
            body: raw.body,
        });
    }

    let value = raw.json(Exchange::Bybit)?;
    let wrapper: BybitResponse<serde_json::Value> =
        serde_json::from_value(value).map_err(|e| PollError::ResponseShape {
            exchange: Exchange::Bybit,
            status: raw.status,
            payload: format!("{}: {}", e, raw.body),
        })?;

    if wrapper.ret_code != 0 {
        return Err(PollError::ExchangeApi {
            exchange: Exchange::Bybit,
            code: wrapper.ret_code.to_string(),
            msg: wrapper.ret_msg,
            body: raw.body,
        });
    }

    let result = wrapper.result.ok_or_else(|| PollError::ResponseShape {
        exchange: Exchange::Bybit,
        status: raw.status,
        payload: format!("{} returned null result: {}", path, raw.body),
    })?;

    serde_json::from_value(result).map_err(|e| PollError::ResponseShape {
        exchange: Exchange::Bybit,
        status: raw.status,
        payload: format!("{}: {}", e, raw.body),
    })
}
