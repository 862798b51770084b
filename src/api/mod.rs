use async_trait::async_trait;
use chrono::NaiveDate;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;

use crate::errors::ProviderError;
use crate::frame::WideFrame;
use crate::models::ListedInstrument;

pub mod csv_source;
pub mod instruments_client;
pub mod yahoo_client;

pub use csv_source::CsvPriceSource;
pub use instruments_client::InstrumentListClient;
pub use yahoo_client::YahooClient;

/// Evenly paced rate limiter for API requests
pub struct ApiRateLimiter {
    limiter: DefaultDirectRateLimiter,
}

impl ApiRateLimiter {
    pub fn new(requests_per_minute: u32) -> Self {
        let per_minute = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_minute(per_minute).allow_burst(NonZeroU32::MIN);

        Self {
            limiter: RateLimiter::direct(quota),
        }
    }

    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }
}

/// Upstream daily price history (OHLCV per ticker per date)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceHistoryProvider: Send + Sync {
    /// Wide table of every ticker's bars from `start` onwards
    async fn fetch_daily_history(
        &self,
        tickers: &[String],
        start: NaiveDate,
    ) -> Result<WideFrame, ProviderError>;
}

/// Upstream reference data listing tradable instruments per country
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InstrumentSource: Send + Sync {
    async fn list_stocks(&self, country: &str) -> Result<Vec<ListedInstrument>, ProviderError>;
}
