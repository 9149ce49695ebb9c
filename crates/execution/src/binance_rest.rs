//! Binance USD-M futures REST client for income and account queries.
//!
//! Signed parameters (`recvWindow`, `timestamp`, `signature`) travel in the
//! query string; only the API key is a header. See [`BinanceSigner`].

use reqwest::Client;
use tracing::{debug, warn};

use cefi_core::types::{Credential, Exchange};
use cefi_core::PollError;

use crate::http::{build_client, send_signed, RawResponse};
use crate::request::{QueryParams, SignedRequest};
use crate::signer::{BinanceSigner, Signer};

/// Income history endpoint.
pub const INCOME_PATH: &str = "/fapi/v1/income";
/// Account snapshot endpoint.
pub const ACCOUNT_PATH: &str = "/fapi/v3/account";

/// Accepted range for the income `limit` parameter.
pub const INCOME_LIMIT_RANGE: std::ops::RangeInclusive<i64> = 1..=1000;

/// Binance USD-M futures REST client.
pub struct BinanceRestClient {
    base_url: String,
    signer: BinanceSigner,
    client: Client,
}

/// Filters for `GET /fapi/v1/income`.
#[derive(Debug, Clone)]
pub struct IncomeQuery {
    pub symbol: Option<String>,
    pub income_type: Option<String>,
    pub start_time_ms: Option<i64>,
    pub end_time_ms: Option<i64>,
    pub page: Option<u32>,
    pub limit: i64,
}

impl Default for IncomeQuery {
    fn default() -> Self {
        Self {
            symbol: None,
            income_type: None,
            start_time_ms: None,
            end_time_ms: None,
            page: None,
            limit: 100,
        }
    }
}

impl IncomeQuery {
    /// Reject a `limit` outside 1..=1000 before anything is sent.
    pub fn validate(&self) -> Result<(), PollError> {
        if !INCOME_LIMIT_RANGE.contains(&self.limit) {
            return Err(PollError::Validation(format!(
                "Binance income limit must be between 1 and 1000, got {}",
                self.limit
            )));
        }
        Ok(())
    }

    /// Parameters in signing order, `recvWindow` first.
    fn to_params(&self, recv_window_ms: u64) -> QueryParams {
        let mut q = QueryParams::new();
        q.push("recvWindow", recv_window_ms)
            .push("limit", self.limit)
            .push_opt("symbol", self.symbol.as_deref().filter(|s| !s.is_empty()))
            .push_opt("incomeType", self.income_type.as_deref().filter(|s| !s.is_empty()))
            .push_opt("startTime", self.start_time_ms)
            .push_opt("endTime", self.end_time_ms)
            .push_opt("page", self.page);
        q
    }
}

/// One income history row.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct BinanceIncome {
    #[serde(default)]
    pub symbol: String,
    #[serde(rename = "incomeType", default)]
    pub income_type: String,
    /// Signed decimal string.
    #[serde(default)]
    pub income: Option<String>,
    #[serde(default)]
    pub asset: String,
    #[serde(default)]
    pub time: i64,
}

/// Futures account snapshot (only the fields the poller reads).
#[derive(Debug, Clone, serde::Deserialize)]
pub struct BinanceAccount {
    #[serde(rename = "totalWalletBalance", default)]
    pub total_wallet_balance: Option<String>,
    #[serde(rename = "totalUnrealizedProfit", default)]
    pub total_unrealized_profit: Option<String>,
    #[serde(default)]
    pub positions: Vec<BinanceAccountPosition>,
}

/// One position entry of the account snapshot.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct BinanceAccountPosition {
    pub symbol: String,
    #[serde(rename = "positionSide", default)]
    pub position_side: String,
    #[serde(rename = "positionAmt", default)]
    pub position_amt: Option<String>,
    #[serde(rename = "unrealizedProfit", default)]
    pub unrealized_profit: Option<String>,
}

/// Expected top-level JSON shape of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    List,
    Object,
}

impl BinanceRestClient {
    /// Create a client against `base_url` with a hard request timeout.
    pub fn new(
        base_url: impl Into<String>,
        credential: Credential,
        recv_window_ms: u64,
        timeout_ms: u64,
    ) -> Result<Self, PollError> {
        Ok(Self {
            base_url: base_url.into(),
            signer: BinanceSigner::new(credential, recv_window_ms),
            client: build_client(Exchange::Binance, timeout_ms)?,
        })
    }

    /// Get income history.
    ///
    /// GET `/fapi/v1/income`. The `limit` is validated before any request.
    pub async fn get_income(&self, query: &IncomeQuery) -> Result<Vec<BinanceIncome>, PollError> {
        query.validate()?;
        let params = query.to_params(self.signer.recv_window_ms());
        let value = self.signed_get(INCOME_PATH, params, Shape::List).await?;
        let rows: Vec<BinanceIncome> = decode(value)?;

        if rows.len() as i64 == query.limit {
            warn!(
                rows = rows.len(),
                "Binance income page is full; older rows may be missing"
            );
        }
        Ok(rows)
    }

    /// Get the futures account snapshot.
    ///
    /// GET `/fapi/v3/account`.
    pub async fn get_account(&self) -> Result<BinanceAccount, PollError> {
        let mut params = QueryParams::new();
        params.push("recvWindow", self.signer.recv_window_ms());
        let value = self.signed_get(ACCOUNT_PATH, params, Shape::Object).await?;
        decode(value)
    }

    async fn signed_get(
        &self,
        path: &str,
        params: QueryParams,
        shape: Shape,
    ) -> Result<serde_json::Value, PollError> {
        let req = SignedRequest::get(self.base_url.clone(), path, params);
        let auth = self.signer.sign(&req);
        debug!(
            path,
            key_fingerprint = %self.signer.key_fingerprint(),
            "Binance signed GET request"
        );

        let raw = send_signed(&self.client, Exchange::Binance, &req, &auth).await?;
        check_response(raw, shape)
    }
}

/// JSON first, then status, then shape.
fn check_response(raw: RawResponse, shape: Shape) -> Result<serde_json::Value, PollError> {
    let value = match raw.json(Exchange::Binance) {
        Ok(v) => v,
        Err(_) if !raw.is_success() => {
            return Err(PollError::ExchangeHttp {
                exchange: Exchange::Binance,
                status: raw.status,
                body: raw.body,
            })
        }
        Err(e) => return Err(e),
    };

    let shape_ok = match shape {
        Shape::List => value.is_array(),
        Shape::Object => value.is_object(),
    };
    if raw.status != 200 || !shape_ok {
        return Err(PollError::ResponseShape {
            exchange: Exchange::Binance,
            status: raw.status,
            payload: raw.body,
        });
    }
    Ok(value)
}

fn decode<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> Result<T, PollError> {
    let payload = value.to_string();
    serde_json::from_value(value).map_err(|e| PollError::ResponseShape {
        exchange: Exchange::Binance,
        status: 200,
        payload: format!("{}: {}", e, payload),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::stub::StubServer;

    fn client(base_url: &str) -> BinanceRestClient {
        BinanceRestClient::new(base_url, Credential::new("bn_key", "bn_secret"), 5000, 5_000).unwrap()
    }

    /// A base URL nothing listens on; reaching the network would fail with a
    /// transport error instead of a validation error.
    const UNREACHABLE: &str = "http://127.0.0.1:9";

    #[tokio::test]
    async fn test_limit_out_of_range_rejected_before_network() {
        let c = client(UNREACHABLE);
        for limit in [0, 1001, -5] {
            let q = IncomeQuery { limit, ..Default::default() };
            let err = c.get_income(&q).await.unwrap_err();
            assert!(matches!(err, PollError::Validation(_)), "limit {limit}: {err:?}");
        }
    }

    #[test]
    fn test_limit_bounds_accepted() {
        for limit in [1, 1000] {
            let q = IncomeQuery { limit, ..Default::default() };
            assert!(q.validate().is_ok());
        }
    }

    #[test]
    fn test_income_params_order_and_omission() {
        let q = IncomeQuery {
            symbol: None,
            income_type: Some("FUNDING_FEE".into()),
            start_time_ms: Some(1765756800000),
            end_time_ms: None,
            page: None,
            limit: 1000,
        };
        assert_eq!(
            q.to_params(5000).encode(),
            "recvWindow=5000&limit=1000&incomeType=FUNDING_FEE&startTime=1765756800000"
        );
    }

    #[test]
    fn test_income_deserialization() {
        let json = r#"[
            {"symbol": "NIGHTUSDT", "incomeType": "FUNDING_FEE", "income": "-0.01250000", "asset": "USDT", "info": "", "time": 1765843200000, "tranId": 1, "tradeId": ""},
            {"symbol": "BTCUSDT", "incomeType": "FUNDING_FEE", "income": "0.50000000", "asset": "USDT", "time": 1765872000000}
        ]"#;
        let rows: Vec<BinanceIncome> = serde_json::from_str(json).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].income.as_deref(), Some("-0.01250000"));
        assert_eq!(rows[1].symbol, "BTCUSDT");
    }

    #[tokio::test]
    async fn test_get_income_sends_signed_query() {
        let server = StubServer::respond(200, "[]").await;
        let q = IncomeQuery {
            income_type: Some("FUNDING_FEE".into()),
            limit: 1000,
            ..Default::default()
        };
        let rows = client(&server.base_url).get_income(&q).await.unwrap();
        assert!(rows.is_empty());

        let head = server.request().await;
        let request_line = head.lines().next().unwrap();
        assert!(request_line.starts_with(
            "GET /fapi/v1/income?recvWindow=5000&limit=1000&incomeType=FUNDING_FEE&timestamp="
        ));
        assert!(request_line.contains("&signature="));
        assert!(head.to_ascii_lowercase().contains("x-mbx-apikey: bn_key"));
    }

    #[tokio::test]
    async fn test_income_object_body_is_shape_error() {
        let server = StubServer::respond(200, r#"{"rows": []}"#).await;
        let err = client(&server.base_url)
            .get_income(&IncomeQuery::default())
            .await
            .unwrap_err();
        match err {
            PollError::ResponseShape { payload, .. } => assert!(payload.contains("rows")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_account_list_body_is_shape_error() {
        let server = StubServer::respond(200, "[]").await;
        let err = client(&server.base_url).get_account().await.unwrap_err();
        assert!(matches!(err, PollError::ResponseShape { .. }));
    }

    #[tokio::test]
    async fn test_non_200_json_is_shape_error_with_payload() {
        let body = r#"{"code": -1021, "msg": "Timestamp for this request is outside of the recvWindow."}"#;
        let server = StubServer::respond(400, body).await;
        let err = client(&server.base_url).get_account().await.unwrap_err();
        match err {
            PollError::ResponseShape { status, payload, .. } => {
                assert_eq!(status, 400);
                assert!(payload.contains("-1021"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_json_body_is_transport_error() {
        let server = StubServer::respond(200, "<html>maintenance</html>").await;
        let err = client(&server.base_url).get_account().await.unwrap_err();
        assert!(matches!(err, PollError::Transport { .. }));
    }

    #[tokio::test]
    async fn test_account_decodes_positions() {
        let body = r#"{
            "totalWalletBalance": "103.12",
            "positions": [
                {"symbol": "BTCUSDT", "positionSide": "BOTH", "positionAmt": "0.000", "unrealizedProfit": "0"},
                {"symbol": "NIGHTUSDT", "positionSide": "BOTH", "positionAmt": "-1500", "unrealizedProfit": "2.1"}
            ]
        }"#;
        let server = StubServer::respond(200, body).await;
        let account = client(&server.base_url).get_account().await.unwrap();
        assert_eq!(account.positions.len(), 2);
        assert_eq!(account.positions[1].position_amt.as_deref(), Some("-1500"));
        assert_eq!(account.total_wallet_balance.as_deref(), Some("103.12"));
    }
}
