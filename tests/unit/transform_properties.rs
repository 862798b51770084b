//! Reconciliation and reshape tests

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use stocks_etl::errors::TransformError;
use stocks_etl::frame::{ColumnLabel, WideFrame};
use stocks_etl::models::{MatchPolicy, Stock};
use stocks_etl::transform::PriceTransformer;
use test_log::test;

use crate::common::{logging, test_data};

fn known(entries: &[(i64, &str)]) -> Vec<Stock> {
    entries
        .iter()
        .map(|(id, ticker)| Stock {
            id: *id,
            ticker: ticker.to_string(),
            company_name: None,
        })
        .collect()
}

fn requested(tickers: &[&str]) -> Vec<String> {
    tickers.iter().map(|t| t.to_string()).collect()
}

#[test]
fn test_two_tickers_two_dates_give_four_rows() {
    logging::init_test_logging();
    logging::log_test_step("Transforming the AAA/BBB fixture");

    let frame = test_data::create_multi_ticker_frame(&["AAA", "BBB"], &["2024-01-02", "2024-01-03"]);
    let stocks = known(&[(1, "AAA"), (2, "BBB")]);

    let output = PriceTransformer::default()
        .transform(frame, &stocks, &requested(&["AAA", "BBB"]))
        .unwrap();
    logging::log_test_data("Transformed rows", &output.prices);

    let keys: Vec<(i64, String)> = output
        .prices
        .iter()
        .map(|p| (p.stock_id, p.date.to_string()))
        .collect();
    assert_eq!(
        keys,
        vec![
            (1, "2024-01-02".to_string()),
            (2, "2024-01-02".to_string()),
            (1, "2024-01-03".to_string()),
            (2, "2024-01-03".to_string()),
        ]
    );
    // BBB carries the +10 offset, the second date the +1 offset
    assert_eq!(output.prices[3].close, 111.0);
    assert_eq!(output.prices[3].volume, 111);
}

#[test]
fn test_matching_ignores_ticker_case() {
    let frame = test_data::create_multi_ticker_frame(&["petr4.sa"], &["2024-01-02"]);
    let stocks = known(&[(7, "PETR4.SA")]);

    let output = PriceTransformer::default()
        .transform(frame, &stocks, &requested(&["petr4.sa"]))
        .unwrap();

    assert_eq!(output.prices.len(), 1);
    assert_eq!(output.prices[0].stock_id, 7);
}

#[test]
fn test_single_level_download_matches_multi_level_shape() {
    let dates = ["2024-01-02", "2024-01-03"];
    let stocks = known(&[(1, "AAA")]);
    let transformer = PriceTransformer::default();

    let single = transformer
        .transform(
            test_data::create_single_level_frame(&dates),
            &stocks,
            &requested(&["AAA"]),
        )
        .unwrap();
    let multi = transformer
        .transform(
            test_data::create_multi_ticker_frame(&["AAA"], &dates),
            &stocks,
            &requested(&["AAA"]),
        )
        .unwrap();

    assert_eq!(single.prices, multi.prices);
}

#[test]
fn test_unmatched_ticker_does_not_affect_others() {
    let dates = ["2024-01-02", "2024-01-03"];
    let stocks = known(&[(1, "AAA")]);

    let alone = PriceTransformer::default()
        .transform(
            test_data::create_multi_ticker_frame(&["AAA"], &dates),
            &stocks,
            &requested(&["AAA"]),
        )
        .unwrap();
    let with_stranger = PriceTransformer::default()
        .transform(
            test_data::create_multi_ticker_frame(&["AAA", "ZZZ"], &dates),
            &stocks,
            &requested(&["AAA", "ZZZ"]),
        )
        .unwrap();

    assert_eq!(with_stranger.prices, alone.prices);
    assert_eq!(with_stranger.report.unmatched_rows, 2);
    assert_eq!(with_stranger.report.unmatched_tickers, vec!["ZZZ".to_string()]);
}

#[test]
fn test_strict_policy_names_unmatched_tickers() {
    let frame = test_data::create_multi_ticker_frame(&["AAA", "ZZZ", "YYY"], &["2024-01-02"]);
    let transformer = PriceTransformer::new(Default::default(), MatchPolicy::Strict);

    let result = transformer.transform(frame, &known(&[(1, "AAA")]), &requested(&["AAA"]));
    assert_matches!(
        result,
        Err(TransformError::UnmatchedTickers(t)) if t == vec!["YYY".to_string(), "ZZZ".to_string()]
    );
}

#[test]
fn test_zero_matches_is_fatal() {
    let frame = test_data::create_multi_ticker_frame(&["ZZZ"], &["2024-01-02"]);

    let result = PriceTransformer::default().transform(
        frame,
        &known(&[(1, "AAA")]),
        &requested(&["AAA"]),
    );
    assert_matches!(result, Err(TransformError::NoMatches));
}

#[test]
fn test_timestamps_with_offsets_become_plain_dates() {
    let index = vec![
        stocks_etl::frame::parse_index_label("2024-01-02 00:00:00-03:00").unwrap(),
        stocks_etl::frame::parse_index_label("2024-01-03T15:30:00Z").unwrap(),
    ];
    let mut frame = WideFrame::new(index);
    for field in ["Open", "High", "Low", "Close", "Volume"] {
        frame
            .push_column(ColumnLabel::pair(field, "AAA"), vec![Some(1.0), Some(2.0)])
            .unwrap();
    }

    let output = PriceTransformer::default()
        .transform(frame, &known(&[(1, "AAA")]), &requested(&["AAA"]))
        .unwrap();
    let dates: Vec<String> = output.prices.iter().map(|p| p.date.to_string()).collect();
    assert_eq!(dates, vec!["2024-01-02", "2024-01-03"]);
}
