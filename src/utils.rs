use chrono::{DateTime, FixedOffset, NaiveDate};
use tracing_subscriber::EnvFilter;

/// Calendar-date format used for every persisted price date
pub const PRICE_DATE_FORMAT: &str = "%Y-%m-%d";

/// Install the global fmt subscriber. Call once, at binary start-up.
///
/// `RUST_LOG` wins when set; otherwise `default_directive` is used
/// (e.g. `"stocks_etl=info"`).
pub fn init_logging(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Canonical form used when comparing ticker symbols
pub fn canonical_ticker(ticker: &str) -> String {
    ticker.trim().to_uppercase()
}

/// Calendar date of a timestamp, read in the timestamp's own offset
pub fn normalize_price_date(timestamp: &DateTime<FixedOffset>) -> NaiveDate {
    timestamp.date_naive()
}

/// Render a date the way `daily_prices.date` stores it
pub fn format_price_date(date: NaiveDate) -> String {
    date.format(PRICE_DATE_FORMAT).to_string()
}
