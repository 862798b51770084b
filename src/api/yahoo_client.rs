//! Yahoo Finance v8 chart client.
//!
//! Fetches one ticker per request and assembles the results into a single
//! wide table, the way the upstream download library shapes them: a
//! multi-ticker request gets (field, ticker) columns, a single-ticker
//! request gets plain field columns.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::{ApiRateLimiter, PriceHistoryProvider};
use crate::errors::ProviderError;
use crate::frame::{date_index, ColumnLabel, WideFrame};
use crate::models::Config;

pub const DEFAULT_PRICE_API_URL: &str = "https://query1.finance.yahoo.com";

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko)";

/// Column order of the assembled table
const FIELDS: [&str; 6] = ["Open", "High", "Low", "Close", "Adj Close", "Volume"];

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    meta: ChartMeta,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Default, Deserialize)]
struct ChartMeta {
    /// Exchange offset from UTC, in seconds
    gmtoffset: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

/// One ticker's bars keyed by exchange-local calendar date
type TickerSeries = BTreeMap<NaiveDate, [Option<f64>; 6]>;

pub struct YahooClient {
    client: Client,
    base_url: Url,
    rate_limiter: ApiRateLimiter,
}

impl YahooClient {
    pub fn new(config: &Config) -> Result<Self, ProviderError> {
        Self::with_base_url(&config.price_api_url, config.rate_limit_per_minute)
    }

    pub fn with_base_url(base_url: &str, requests_per_minute: u32) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()?;

        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(ProviderError::BaseUrl(base_url.to_string()));
        }

        Ok(Self {
            client,
            base_url,
            rate_limiter: ApiRateLimiter::new(requests_per_minute),
        })
    }

    fn chart_url(&self, ticker: &str, start: NaiveDate) -> Result<Url, ProviderError> {
        let period1 = date_index(start)
            .map(|ts| ts.timestamp())
            .ok_or_else(|| ProviderError::ResponseFormat(format!("invalid start date {}", start)))?;
        let period2 = Utc::now().timestamp();

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ProviderError::BaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["v8", "finance", "chart", ticker]);
        url.query_pairs_mut()
            .append_pair("period1", &period1.to_string())
            .append_pair("period2", &period2.to_string())
            .append_pair("interval", "1d")
            .append_pair("events", "history")
            .append_pair("includeAdjustedClose", "true");

        Ok(url)
    }

    /// Bars for one ticker; `Ok(None)` when the provider has nothing for it
    async fn fetch_ticker(
        &self,
        ticker: &str,
        start: NaiveDate,
    ) -> Result<Option<TickerSeries>, ProviderError> {
        let url = self.chart_url(ticker, start)?;

        self.rate_limiter.wait().await;
        debug!("Making request to: {}", url);

        let response = self.client.get(url).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            warn!("{}: no price data found, symbol may be delisted", ticker);
            return Ok(None);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!("{}: request failed with status {}: {}", ticker, status, message);
            return Ok(None);
        }

        let chart: ChartResponse = response.json().await?;
        parse_chart(ticker, chart)
    }
}

#[async_trait]
impl PriceHistoryProvider for YahooClient {
    async fn fetch_daily_history(
        &self,
        tickers: &[String],
        start: NaiveDate,
    ) -> Result<WideFrame, ProviderError> {
        let mut downloaded: Vec<(String, TickerSeries)> = Vec::with_capacity(tickers.len());

        for ticker in tickers {
            if let Some(series) = self.fetch_ticker(ticker, start).await? {
                downloaded.push((ticker.clone(), series));
            }
        }

        info!(
            "Downloaded bars for {} of {} tickers",
            downloaded.len(),
            tickers.len()
        );

        assemble_frame(&downloaded, tickers.len() > 1, start)
    }
}

fn parse_chart(ticker: &str, chart: ChartResponse) -> Result<Option<TickerSeries>, ProviderError> {
    if let Some(error) = chart.chart.error {
        warn!(
            "{}: {} {}",
            ticker,
            error.code,
            error.description.unwrap_or_default()
        );
        return Ok(None);
    }

    let Some(data) = chart.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(None);
    };
    let Some(timestamps) = data.timestamp else {
        return Ok(None);
    };

    let offset_seconds = data.meta.gmtoffset.unwrap_or(0);
    let offset = FixedOffset::east_opt(offset_seconds).ok_or_else(|| {
        ProviderError::ResponseFormat(format!("invalid gmtoffset {} for {}", offset_seconds, ticker))
    })?;

    let quote = data.indicators.quote.into_iter().next().unwrap_or_default();
    let adj_close = data
        .indicators
        .adjclose
        .and_then(|a| a.into_iter().next())
        .map(|a| a.adjclose)
        .unwrap_or_default();

    let at = |values: &[Option<f64>], i: usize| values.get(i).copied().flatten();

    let mut series = TickerSeries::new();
    for (i, &ts) in timestamps.iter().enumerate() {
        let date = DateTime::from_timestamp(ts, 0)
            .map(|utc| utc.with_timezone(&offset).date_naive())
            .ok_or_else(|| {
                ProviderError::ResponseFormat(format!("invalid timestamp {} for {}", ts, ticker))
            })?;

        series.insert(
            date,
            [
                at(&quote.open, i),
                at(&quote.high, i),
                at(&quote.low, i),
                at(&quote.close, i),
                at(&adj_close, i),
                at(&quote.volume, i),
            ],
        );
    }

    Ok(Some(series))
}

/// Align every ticker on the union of dates
fn assemble_frame(
    downloaded: &[(String, TickerSeries)],
    multi_level: bool,
    start: NaiveDate,
) -> Result<WideFrame, ProviderError> {
    let dates: BTreeSet<NaiveDate> = downloaded
        .iter()
        .flat_map(|(_, series)| series.keys().copied())
        .filter(|date| *date >= start)
        .collect();

    let index = dates
        .iter()
        .map(|date| {
            date_index(*date)
                .ok_or_else(|| ProviderError::ResponseFormat(format!("invalid date {}", date)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut frame = WideFrame::new(index);
    if dates.is_empty() {
        return Ok(frame);
    }

    for (field_pos, field) in FIELDS.iter().enumerate() {
        for (ticker, series) in downloaded {
            let values = dates
                .iter()
                .map(|date| series.get(date).and_then(|bar| bar[field_pos]))
                .collect();
            let label = if multi_level {
                ColumnLabel::pair(field, ticker)
            } else {
                ColumnLabel::field(field)
            };
            frame.push_column(label, values)?;
        }
    }

    Ok(frame)
}
