//! Flatten exchange responses into [`PositionMetric`] rows.
//!
//! The target position is always located by an explicit symbol /
//! instrument-id match. When it is absent every per-position metric is
//! [`MetricValue::NotFound`] and the exchange `status` row says so; the first
//! element of a list is never taken as a fallback.
//!
//! In hedge mode an exchange returns one entry per side for the same symbol.
//! The one-way entry wins when there is exactly one; otherwise the match is
//! ambiguous, the metrics are `Null` and the status row names the count.

use cefi_core::types::{Exchange, MetricValue, PositionMetric};
use cefi_core::PollError;

use crate::binance_rest::{BinanceAccount, BinanceAccountPosition, BinanceIncome};
use crate::bybit_rest::BybitPosition;
use crate::okx_rest::OkxPosition;

/// Name of the per-exchange status row.
pub const STATUS_METRIC: &str = "status";
pub const STATUS_OK: &str = "ok";
pub const STATUS_NOT_FOUND: &str = "not_found";

pub const BYBIT_METRICS: &[&str] = &["cumRealisedPnl", "size"];
pub const BINANCE_METRICS: &[&str] = &["total_income_funding_fees", "positionAmt", "open_positions"];
pub const OKX_METRICS: &[&str] = &["deltaPA", "realizedPnl", "pos"];

/// First item whose key equals `target` (ASCII case-insensitive).
pub fn find_by_symbol<'a, T, F>(items: &'a [T], target: &str, key: F) -> Option<&'a T>
where
    F: Fn(&T) -> &str,
{
    items.iter().find(|item| key(item).eq_ignore_ascii_case(target))
}

/// Outcome of locating the target position.
#[derive(Debug)]
pub enum Selection<'a, T> {
    Found(&'a T),
    NotFound,
    /// Several entries for the symbol and no single one-way entry.
    Ambiguous(usize),
}

/// Entry for `target`: the only match, or else the only one-way match.
pub fn select_position<'a, T, K, W>(items: &'a [T], target: &str, key: K, one_way: W) -> Selection<'a, T>
where
    K: Fn(&T) -> &str,
    W: Fn(&T) -> bool,
{
    let matches: Vec<&T> = items
        .iter()
        .filter(|item| key(*item).eq_ignore_ascii_case(target))
        .collect();
    match matches.as_slice() {
        [] => Selection::NotFound,
        [only] => Selection::Found(*only),
        all => {
            let mut one_way_hits = all.iter().filter(|item| one_way(**item));
            match (one_way_hits.next(), one_way_hits.next()) {
                (Some(hit), None) => Selection::Found(*hit),
                _ => Selection::Ambiguous(all.len()),
            }
        }
    }
}

fn bybit_one_way(p: &BybitPosition) -> bool {
    p.position_idx.unwrap_or(0) == 0
}

fn binance_one_way(p: &BinanceAccountPosition) -> bool {
    p.position_side.is_empty() || p.position_side.eq_ignore_ascii_case("BOTH")
}

fn okx_one_way(p: &OkxPosition) -> bool {
    p.pos_side.is_empty() || p.pos_side.eq_ignore_ascii_case("net")
}

fn status_row<T>(exchange: Exchange, symbol: &str, sel: &Selection<'_, T>) -> PositionMetric {
    let status = match sel {
        Selection::Found(_) => STATUS_OK.to_string(),
        Selection::NotFound => STATUS_NOT_FOUND.to_string(),
        Selection::Ambiguous(n) => format!("ambiguous: {} positions", n),
    };
    PositionMetric::new(exchange, symbol, STATUS_METRIC, MetricValue::Text(status))
}

fn field<'a, T, F>(sel: &Selection<'a, T>, get: F) -> MetricValue
where
    F: Fn(&'a T) -> Option<&'a String>,
{
    match sel {
        Selection::Found(p) => get(*p).cloned().into(),
        Selection::NotFound => MetricValue::NotFound,
        Selection::Ambiguous(_) => MetricValue::Null,
    }
}

/// Bybit: `cumRealisedPnl` and `size` of the position matching `symbol`.
pub fn bybit_metrics(positions: &[BybitPosition], symbol: &str) -> Vec<PositionMetric> {
    let sel = select_position(positions, symbol, |p| p.symbol.as_str(), bybit_one_way);
    vec![
        PositionMetric::new(
            Exchange::Bybit,
            symbol,
            "cumRealisedPnl",
            field(&sel, |p| p.cum_realised_pnl.as_ref()),
        ),
        PositionMetric::new(Exchange::Bybit, symbol, "size", field(&sel, |p| p.size.as_ref())),
        status_row(Exchange::Bybit, symbol, &sel),
    ]
}

/// Binance: summed income across every returned row (account-wide, empty
/// symbol), `positionAmt` of the position matching `symbol`, and the number
/// of positions with a non-zero amount.
///
/// An `income` value that is not a number is a [`PollError::ResponseShape`].
pub fn binance_metrics(
    income: &[BinanceIncome],
    account: &BinanceAccount,
    symbol: &str,
) -> Result<Vec<PositionMetric>, PollError> {
    let mut total = 0.0;
    for row in income {
        if let Some(raw) = &row.income {
            total += raw.parse::<f64>().map_err(|e| PollError::ResponseShape {
                exchange: Exchange::Binance,
                status: 200,
                payload: format!("income {:?} is not a number: {}", raw, e),
            })?;
        }
    }

    let open_positions = account
        .positions
        .iter()
        .filter(|p| {
            p.position_amt
                .as_deref()
                .and_then(|a| a.parse::<f64>().ok())
                .map(|a| a != 0.0)
                .unwrap_or(false)
        })
        .count();

    let sel = select_position(&account.positions, symbol, |p| p.symbol.as_str(), binance_one_way);

    Ok(vec![
        PositionMetric::new(
            Exchange::Binance,
            "",
            "total_income_funding_fees",
            MetricValue::Number(total),
        ),
        PositionMetric::new(
            Exchange::Binance,
            symbol,
            "positionAmt",
            field(&sel, |p| p.position_amt.as_ref()),
        ),
        PositionMetric::new(
            Exchange::Binance,
            "",
            "open_positions",
            MetricValue::Number(open_positions as f64),
        ),
        status_row(Exchange::Binance, symbol, &sel),
    ])
}

/// OKX: `deltaPA`, `realizedPnl` and `pos` of the position matching `inst_id`.
pub fn okx_metrics(positions: &[OkxPosition], inst_id: &str) -> Vec<PositionMetric> {
    let sel = select_position(positions, inst_id, |p| p.inst_id.as_str(), okx_one_way);
    vec![
        PositionMetric::new(Exchange::Okx, inst_id, "deltaPA", field(&sel, |p| p.delta_pa.as_ref())),
        PositionMetric::new(
            Exchange::Okx,
            inst_id,
            "realizedPnl",
            field(&sel, |p| p.realized_pnl.as_ref()),
        ),
        PositionMetric::new(Exchange::Okx, inst_id, "pos", field(&sel, |p| p.pos.as_ref())),
        status_row(Exchange::Okx, inst_id, &sel),
    ]
}

/// Rows for an exchange whose fetch failed: every metric `Null`, then a
/// `status` row carrying the error.
pub fn failure_metrics(
    exchange: Exchange,
    symbol: &str,
    metrics: &[&str],
    err: &PollError,
) -> Vec<PositionMetric> {
    let mut rows: Vec<PositionMetric> = metrics
        .iter()
        .map(|m| PositionMetric::new(exchange, symbol, *m, MetricValue::Null))
        .collect();
    rows.push(PositionMetric::new(
        exchange,
        symbol,
        STATUS_METRIC,
        MetricValue::Text(format!("error: {}", err)),
    ));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bybit_rest::BybitPositionList;

    fn bybit(symbol: &str, size: &str, pnl: &str) -> BybitPosition {
        BybitPosition {
            symbol: symbol.into(),
            side: "Buy".into(),
            position_idx: Some(0),
            size: Some(size.into()),
            avg_price: None,
            unrealised_pnl: None,
            cum_realised_pnl: Some(pnl.into()),
        }
    }

    fn okx(inst_id: &str, pos: &str) -> OkxPosition {
        OkxPosition {
            inst_id: inst_id.into(),
            inst_type: "SWAP".into(),
            pos_side: "net".into(),
            pos: Some(pos.into()),
            realized_pnl: Some("1.5".into()),
            delta_pa: Some("0.2".into()),
            upl: None,
        }
    }

    fn value_of<'a>(rows: &'a [PositionMetric], metric: &str) -> &'a MetricValue {
        &rows.iter().find(|r| r.metric == metric).unwrap().value
    }

    #[test]
    fn test_find_by_symbol_never_falls_back_to_first() {
        let positions = vec![bybit("BTCUSDT", "1", "0"), bybit("ETHUSDT", "2", "0")];
        assert!(find_by_symbol(&positions, "NIGHTUSDT", |p| p.symbol.as_str()).is_none());
    }

    #[test]
    fn test_find_by_symbol_empty_list() {
        let positions: Vec<BybitPosition> = vec![];
        assert!(find_by_symbol(&positions, "NIGHTUSDT", |p| p.symbol.as_str()).is_none());
    }

    #[test]
    fn test_bybit_selects_matching_second_position() {
        let json = r#"{"list": [
            {"symbol": "BTCUSDT", "size": "0.010", "cumRealisedPnl": "-3.5"},
            {"symbol": "NIGHTUSDT", "size": "1200", "cumRealisedPnl": "87.25"}
        ]}"#;
        let list: BybitPositionList = serde_json::from_str(json).unwrap();
        let rows = bybit_metrics(&list.list, "NIGHTUSDT");

        assert_eq!(*value_of(&rows, "cumRealisedPnl"), MetricValue::Text("87.25".into()));
        assert_eq!(*value_of(&rows, "size"), MetricValue::Text("1200".into()));
        assert_eq!(*value_of(&rows, "status"), MetricValue::Text("ok".into()));
        assert!(rows.iter().all(|r| !r.value.is_not_found()));
    }

    #[test]
    fn test_bybit_not_found_only_non_matching() {
        let positions = vec![bybit("BTCUSDT", "1", "5"), bybit("ETHUSDT", "2", "6")];
        let rows = bybit_metrics(&positions, "NIGHTUSDT");
        assert_eq!(*value_of(&rows, "cumRealisedPnl"), MetricValue::NotFound);
        assert_eq!(*value_of(&rows, "size"), MetricValue::NotFound);
        assert_eq!(*value_of(&rows, "status"), MetricValue::Text("not_found".into()));
    }

    #[test]
    fn test_found_but_missing_field_is_null_not_not_found() {
        let mut p = bybit("NIGHTUSDT", "1", "0");
        p.cum_realised_pnl = None;
        let rows = bybit_metrics(&[p], "NIGHTUSDT");
        assert_eq!(*value_of(&rows, "cumRealisedPnl"), MetricValue::Null);
        assert_eq!(*value_of(&rows, "size"), MetricValue::Text("1".into()));
    }

    #[test]
    fn test_binance_sums_income_and_matches_symbol() {
        let income: Vec<BinanceIncome> = serde_json::from_str(
            r#"[{"income": "0.25"}, {"income": "-0.05"}, {"symbol": "X"}, {"income": "1"}]"#,
        )
        .unwrap();
        let account = BinanceAccount {
            total_wallet_balance: None,
            total_unrealized_profit: None,
            positions: vec![
                BinanceAccountPosition {
                    symbol: "BTCUSDT".into(),
                    position_side: "BOTH".into(),
                    position_amt: Some("0.000".into()),
                    unrealized_profit: None,
                },
                BinanceAccountPosition {
                    symbol: "NIGHTUSDT".into(),
                    position_side: "BOTH".into(),
                    position_amt: Some("-1500".into()),
                    unrealized_profit: None,
                },
            ],
        };

        let rows = binance_metrics(&income, &account, "NIGHTUSDT").unwrap();
        match value_of(&rows, "total_income_funding_fees") {
            MetricValue::Number(n) => assert!((n - 1.2).abs() < 1e-9),
            other => panic!("unexpected value: {other:?}"),
        }
        assert_eq!(*value_of(&rows, "positionAmt"), MetricValue::Text("-1500".into()));
        assert_eq!(*value_of(&rows, "open_positions"), MetricValue::Number(1.0));
        assert_eq!(rows[0].symbol, "");
    }

    #[test]
    fn test_binance_symbol_absent_is_not_found_even_with_positions() {
        let account = BinanceAccount {
            total_wallet_balance: None,
            total_unrealized_profit: None,
            positions: vec![BinanceAccountPosition {
                symbol: "BTCUSDT".into(),
                position_side: "BOTH".into(),
                position_amt: Some("0.5".into()),
                unrealized_profit: None,
            }],
        };
        let rows = binance_metrics(&[], &account, "NIGHTUSDT").unwrap();
        assert_eq!(*value_of(&rows, "positionAmt"), MetricValue::NotFound);
        assert_eq!(*value_of(&rows, "total_income_funding_fees"), MetricValue::Number(0.0));
        assert_eq!(*value_of(&rows, "status"), MetricValue::Text("not_found".into()));
    }

    #[test]
    fn test_binance_bad_income_is_shape_error() {
        let income: Vec<BinanceIncome> = serde_json::from_str(r#"[{"income": "abc"}]"#).unwrap();
        let account = BinanceAccount {
            total_wallet_balance: None,
            total_unrealized_profit: None,
            positions: vec![],
        };
        let err = binance_metrics(&income, &account, "NIGHTUSDT").unwrap_err();
        assert!(matches!(err, PollError::ResponseShape { .. }));
    }

    #[test]
    fn test_okx_metrics_match_inst_id() {
        let positions = vec![okx("BTC-USDT-SWAP", "1"), okx("NIGHT-USDT-SWAP", "-30")];
        let rows = okx_metrics(&positions, "NIGHT-USDT-SWAP");
        assert_eq!(rows.len(), 4);
        assert_eq!(*value_of(&rows, "pos"), MetricValue::Text("-30".into()));
        assert_eq!(*value_of(&rows, "realizedPnl"), MetricValue::Text("1.5".into()));
        assert_eq!(*value_of(&rows, "deltaPA"), MetricValue::Text("0.2".into()));
    }

    fn binance_leg(symbol: &str, side: &str, amt: &str) -> BinanceAccountPosition {
        BinanceAccountPosition {
            symbol: symbol.into(),
            position_side: side.into(),
            position_amt: Some(amt.into()),
            unrealized_profit: None,
        }
    }

    #[test]
    fn test_bybit_hedge_legs_are_ambiguous() {
        let mut long = bybit("NIGHTUSDT", "100", "1");
        long.position_idx = Some(1);
        let mut short = bybit("NIGHTUSDT", "40", "2");
        short.position_idx = Some(2);

        let rows = bybit_metrics(&[long, short], "NIGHTUSDT");
        assert_eq!(*value_of(&rows, "size"), MetricValue::Null);
        assert_eq!(*value_of(&rows, "cumRealisedPnl"), MetricValue::Null);
        assert_eq!(
            *value_of(&rows, "status"),
            MetricValue::Text("ambiguous: 2 positions".into())
        );
    }

    #[test]
    fn test_binance_one_way_entry_wins_over_hedge_legs() {
        let account = BinanceAccount {
            total_wallet_balance: None,
            total_unrealized_profit: None,
            positions: vec![
                binance_leg("NIGHTUSDT", "LONG", "0"),
                binance_leg("NIGHTUSDT", "BOTH", "-1500"),
                binance_leg("NIGHTUSDT", "SHORT", "0"),
            ],
        };
        let rows = binance_metrics(&[], &account, "NIGHTUSDT").unwrap();
        assert_eq!(*value_of(&rows, "positionAmt"), MetricValue::Text("-1500".into()));
        assert_eq!(*value_of(&rows, "status"), MetricValue::Text("ok".into()));
    }

    #[test]
    fn test_binance_hedge_legs_without_one_way_are_ambiguous() {
        let account = BinanceAccount {
            total_wallet_balance: None,
            total_unrealized_profit: None,
            positions: vec![
                binance_leg("NIGHTUSDT", "LONG", "200"),
                binance_leg("NIGHTUSDT", "SHORT", "-50"),
            ],
        };
        let rows = binance_metrics(&[], &account, "NIGHTUSDT").unwrap();
        assert_eq!(*value_of(&rows, "positionAmt"), MetricValue::Null);
        assert_eq!(*value_of(&rows, "open_positions"), MetricValue::Number(2.0));
        assert_eq!(
            *value_of(&rows, "status"),
            MetricValue::Text("ambiguous: 2 positions".into())
        );
    }

    #[test]
    fn test_okx_long_short_legs_are_ambiguous() {
        let mut long = okx("NIGHT-USDT-SWAP", "30");
        long.pos_side = "long".into();
        let mut short = okx("NIGHT-USDT-SWAP", "10");
        short.pos_side = "short".into();
        let rows = okx_metrics(&[long, short], "NIGHT-USDT-SWAP");
        assert_eq!(*value_of(&rows, "pos"), MetricValue::Null);
    }

    #[test]
    fn test_select_single_match_ignores_side() {
        let legs = vec![binance_leg("NIGHTUSDT", "LONG", "5")];
        match select_position(&legs, "nightusdt", |p| p.symbol.as_str(), binance_one_way) {
            Selection::Found(p) => assert_eq!(p.position_amt.as_deref(), Some("5")),
            other => panic!("unexpected selection: {other:?}"),
        }
    }

    #[test]
    fn test_okx_not_found() {
        let rows = okx_metrics(&[okx("BTC-USDT-SWAP", "1")], "NIGHT-USDT-SWAP");
        assert_eq!(*value_of(&rows, "pos"), MetricValue::NotFound);
    }

    #[test]
    fn test_failure_metrics_carry_error() {
        let err = PollError::ExchangeHttp {
            exchange: Exchange::Bybit,
            status: 500,
            body: "down".into(),
        };
        let rows = failure_metrics(Exchange::Bybit, "NIGHTUSDT", BYBIT_METRICS, &err);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].value, MetricValue::Null);
        assert_eq!(
            rows[2].value,
            MetricValue::Text("error: Bybit HTTP 500: down".into())
        );
    }
}
