//! End-to-end runs against a real database file

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use stocks_etl::api::{CsvPriceSource, PriceHistoryProvider};
use stocks_etl::errors::{EtlError, ProviderError, TransformError};
use stocks_etl::frame::WideFrame;
use stocks_etl::models::MatchPolicy;
use stocks_etl::pipeline::{EtlPipeline, EtlSettings};
use stocks_etl::schema::FieldMapping;

use crate::common::{database, logging, test_data};

/// Serves a fixed table and counts the calls
struct FixedProvider {
    frame: WideFrame,
    calls: AtomicUsize,
}

impl FixedProvider {
    fn new(frame: WideFrame) -> Self {
        Self {
            frame,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PriceHistoryProvider for FixedProvider {
    async fn fetch_daily_history(
        &self,
        _tickers: &[String],
        _start: NaiveDate,
    ) -> Result<WideFrame, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.frame.clone())
    }
}

fn settings(policy: MatchPolicy) -> EtlSettings {
    EtlSettings {
        start_date: test_data::date("2024-01-01"),
        chunk_size: 2,
        policy,
        mapping: FieldMapping::default(),
    }
}

#[test_log::test(tokio::test)]
async fn test_full_run_then_rerun() {
    logging::init_test_logging();
    logging::log_test_step("Running the ETL twice over the same day");

    let db = database::init_fresh_test_database().await.unwrap();
    database::insert_sample_stocks(&db.manager).await.unwrap();

    let frame = test_data::create_multi_ticker_frame(
        &["PETR4.SA", "VALE3.SA", "BBAS3.SA"],
        &["2024-01-02", "2024-01-03"],
    );
    let provider = FixedProvider::new(frame);
    let pipeline = EtlPipeline::new(&db.manager, &provider, settings(MatchPolicy::Lenient));

    let summary = pipeline.run().await.unwrap();
    logging::log_test_data("Run summary", &summary);
    assert_eq!(summary.tickers_requested, 3);
    assert_eq!(summary.rows_loaded, 4);
    assert_eq!(summary.report.unmatched_tickers, vec!["BBAS3.SA".to_string()]);

    let before = db.manager.get_prices_for_stock(1).await.unwrap();
    let err = pipeline.run().await.unwrap_err();
    assert!(err.is_benign());
    assert_eq!(db.manager.get_prices_for_stock(1).await.unwrap(), before);
    assert_eq!(db.manager.get_stats().await.unwrap().total_price_records, 4);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
}

#[test_log::test(tokio::test)]
async fn test_empty_store_skips_download() {
    let db = database::init_fresh_test_database().await.unwrap();
    let provider = FixedProvider::new(test_data::create_single_level_frame(&["2024-01-02"]));

    let result = EtlPipeline::new(&db.manager, &provider, settings(MatchPolicy::Lenient))
        .run()
        .await;

    assert_matches!(result, Err(EtlError::NoTickers));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}

#[test_log::test(tokio::test)]
async fn test_no_matching_ticker_writes_nothing() {
    let db = database::init_fresh_test_database().await.unwrap();
    database::insert_sample_stocks(&db.manager).await.unwrap();
    let provider = FixedProvider::new(test_data::create_multi_ticker_frame(
        &["AAPL"],
        &["2024-01-02"],
    ));

    let result = EtlPipeline::new(&db.manager, &provider, settings(MatchPolicy::Lenient))
        .run()
        .await;

    assert_matches!(result, Err(EtlError::Transform(TransformError::NoMatches)));
    assert_eq!(db.manager.get_stats().await.unwrap().total_price_records, 0);
}

#[test_log::test(tokio::test)]
async fn test_run_from_csv_export() {
    let db = database::init_fresh_test_database().await.unwrap();
    database::insert_sample_stocks(&db.manager).await.unwrap();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        "\
Price,Open,Open,High,High,Low,Low,Close,Close,Volume,Volume
Ticker,PETR4.SA,VALE3.SA,PETR4.SA,VALE3.SA,PETR4.SA,VALE3.SA,PETR4.SA,VALE3.SA,PETR4.SA,VALE3.SA
Date,,,,,,,,,,
2023-12-28,1,1,1,1,1,1,1,1,1,1
2024-01-02,37.5,68.1,38.0,69.0,37.1,67.5,37.9,68.8,1200,3400
"
    )
    .unwrap();

    let source = CsvPriceSource::new(file.path());
    let summary = EtlPipeline::new(&db.manager, &source, settings(MatchPolicy::Strict))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.rows_loaded, 2);
    let vale = db.manager.get_prices_for_stock(2).await.unwrap();
    assert_eq!(vale.len(), 1);
    assert_eq!(vale[0].date, test_data::date("2024-01-02"));
    assert_eq!(vale[0].close, 68.8);
    assert_eq!(vale[0].volume, 3400);
}

#[test_log::test(tokio::test)]
async fn test_single_level_csv_with_many_stored_tickers_is_rejected() {
    logging::init_test_logging();
    logging::log_test_step("Loading a single-level export into a multi-ticker store");

    let db = database::init_fresh_test_database().await.unwrap();
    database::insert_sample_stocks(&db.manager).await.unwrap();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        "\
Date,Open,High,Low,Close,Volume
2024-01-02,68.1,69.0,67.5,68.8,3400
"
    )
    .unwrap();

    let source = CsvPriceSource::new(file.path());
    let result = EtlPipeline::new(&db.manager, &source, settings(MatchPolicy::Strict))
        .run()
        .await;

    assert_matches!(
        result,
        Err(EtlError::Transform(TransformError::AmbiguousTickerLevel(3)))
    );
    assert_eq!(db.manager.get_stats().await.unwrap().total_price_records, 0);
}
