//! Wide CSV parsing tests

use pretty_assertions::assert_eq;
use stocks_etl::frame::{ColumnLabel, WideFrame};
use test_log::test;

#[test]
fn test_two_level_csv_export() {
    let text = "\
Price,Close,Close,Volume,Volume
Ticker,AAA,BBB,AAA,BBB
Date,,,,
2024-01-02,10.5,20.5,100,200
2024-01-03,11.0,,110,nan
";
    let frame = WideFrame::from_csv_reader(text.as_bytes()).unwrap();

    assert_eq!(frame.row_count(), 2);
    assert_eq!(frame.tickers(), vec!["AAA", "BBB"]);
    assert_eq!(
        frame.column_values(&ColumnLabel::pair("Close", "BBB")).unwrap(),
        &[Some(20.5), None]
    );
    assert_eq!(
        frame.column_values(&ColumnLabel::pair("Volume", "BBB")).unwrap(),
        &[Some(200.0), None]
    );
}

#[test]
fn test_single_level_csv_export() {
    let text = "\
Date,Open,High,Low,Close,Volume
2024-01-02 00:00:00-03:00,1,2,0.5,1.5,1000
";
    let frame = WideFrame::from_csv_reader(text.as_bytes()).unwrap();

    assert!(!frame.has_ticker_level());
    assert_eq!(frame.field_labels(), vec!["Open", "High", "Low", "Close", "Volume"]);
    assert_eq!(frame.index()[0].to_rfc3339(), "2024-01-02T00:00:00-03:00");
}

#[test]
fn test_row_with_bad_date_is_rejected() {
    let text = "Date,Close\nyesterday,1.0\n";
    assert!(WideFrame::from_csv_reader(text.as_bytes()).is_err());
}
