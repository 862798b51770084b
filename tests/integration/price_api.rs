//! Yahoo chart client against a local mock server

use pretty_assertions::assert_eq;
use serde_json::json;
use stocks_etl::api::{PriceHistoryProvider, YahooClient};
use stocks_etl::frame::ColumnLabel;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{logging, test_data};

/// Chart body for bars at 13:00 UTC (10:00 in Sao Paulo) on each day
fn chart_body(days: &[&str], close: f64) -> serde_json::Value {
    let timestamps: Vec<i64> = days
        .iter()
        .map(|d| {
            test_data::date(d)
                .and_hms_opt(13, 0, 0)
                .unwrap()
                .and_utc()
                .timestamp()
        })
        .collect();
    let series: Vec<f64> = days.iter().map(|_| close).collect();

    json!({
        "chart": {
            "result": [{
                "meta": { "gmtoffset": -10800 },
                "timestamp": timestamps,
                "indicators": {
                    "quote": [{
                        "open": series, "high": series, "low": series,
                        "close": series, "volume": series
                    }],
                    "adjclose": [{ "adjclose": series }]
                }
            }],
            "error": null
        }
    })
}

#[test_log::test(tokio::test)]
async fn test_multi_ticker_download_skips_unknown_symbol() {
    logging::init_test_logging();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v8/finance/chart/PETR4.SA"))
        .and(query_param("interval", "1d"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(chart_body(&["2024-01-02", "2024-01-03"], 37.0)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v8/finance/chart/VALE3.SA"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chart_body(&["2024-01-03"], 68.0)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v8/finance/chart/GONE3.SA"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "chart": { "result": null, "error": { "code": "Not Found", "description": "No data found" } }
        })))
        .mount(&server)
        .await;

    let client = YahooClient::with_base_url(&server.uri(), 6000).unwrap();
    let tickers: Vec<String> = ["PETR4.SA", "VALE3.SA", "GONE3.SA"]
        .iter()
        .map(|t| t.to_string())
        .collect();
    let frame = client
        .fetch_daily_history(&tickers, test_data::date("2024-01-01"))
        .await
        .unwrap();

    assert_eq!(frame.tickers(), vec!["PETR4.SA", "VALE3.SA"]);
    assert_eq!(frame.row_count(), 2);
    assert_eq!(
        frame.column_values(&ColumnLabel::pair("Close", "VALE3.SA")).unwrap(),
        &[None, Some(68.0)]
    );
}

#[test_log::test(tokio::test)]
async fn test_single_ticker_download_has_no_ticker_level() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v8/finance/chart/PETR4.SA"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chart_body(&["2024-01-02"], 37.0)))
        .mount(&server)
        .await;

    let client = YahooClient::with_base_url(&server.uri(), 6000).unwrap();
    let frame = client
        .fetch_daily_history(&["PETR4.SA".to_string()], test_data::date("2024-01-01"))
        .await
        .unwrap();

    assert!(!frame.has_ticker_level());
    assert_eq!(
        frame.field_labels(),
        vec!["Open", "High", "Low", "Close", "Adj Close", "Volume"]
    );
}

#[test_log::test(tokio::test)]
async fn test_nothing_found_gives_empty_table() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = YahooClient::with_base_url(&server.uri(), 6000).unwrap();
    let frame = client
        .fetch_daily_history(&["NOPE.SA".to_string()], test_data::date("2024-01-01"))
        .await
        .unwrap();

    assert!(frame.is_empty());
}
