//! One ETL run: read the ticker list, download prices, reshape, append.

use chrono::NaiveDate;
use std::collections::HashSet;
use tracing::info;

use crate::api::PriceHistoryProvider;
use crate::database::DatabaseManager;
use crate::errors::EtlError;
use crate::models::{Config, MatchPolicy};
use crate::schema::FieldMapping;
use crate::transform::{PriceTransformer, TransformReport};
use crate::utils::canonical_ticker;

/// Knobs of a single run
#[derive(Debug, Clone)]
pub struct EtlSettings {
    pub start_date: NaiveDate,
    pub chunk_size: usize,
    pub policy: MatchPolicy,
    pub mapping: FieldMapping,
}

impl EtlSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            start_date: config.start_date,
            chunk_size: config.load_chunk_size,
            policy: config.match_policy,
            mapping: FieldMapping::default(),
        }
    }
}

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub tickers_requested: usize,
    pub report: TransformReport,
    pub rows_loaded: u64,
}

pub struct EtlPipeline<'a> {
    database: &'a DatabaseManager,
    provider: &'a dyn PriceHistoryProvider,
    settings: EtlSettings,
}

impl<'a> EtlPipeline<'a> {
    pub fn new(
        database: &'a DatabaseManager,
        provider: &'a dyn PriceHistoryProvider,
        settings: EtlSettings,
    ) -> Self {
        Self {
            database,
            provider,
            settings,
        }
    }

    /// Run every step in order; the first failure ends the run.
    ///
    /// Nothing is written unless the transform succeeds, and the append is
    /// all-or-nothing.
    pub async fn run(&self) -> Result<RunSummary, EtlError> {
        let stocks = self.database.get_stocks().await?;
        let tickers = request_tickers(stocks.iter().map(|s| s.ticker.as_str()));
        if tickers.is_empty() {
            return Err(EtlError::NoTickers);
        }
        info!("📋 Found {} tickers in the database", tickers.len());

        info!(
            "📈 Downloading daily prices since {}",
            self.settings.start_date
        );
        let frame = self
            .provider
            .fetch_daily_history(&tickers, self.settings.start_date)
            .await?;
        if frame.is_empty() {
            return Err(EtlError::EmptyFetch);
        }
        info!("✅ Download complete: {} rows", frame.row_count());

        let transformer = PriceTransformer::new(self.settings.mapping.clone(), self.settings.policy);
        let output = transformer.transform(frame, &stocks, &tickers)?;
        info!(
            "🔄 Data transformed. {} rows ready for loading",
            output.prices.len()
        );

        let rows_loaded = self
            .database
            .append_daily_prices(&output.prices, self.settings.chunk_size)
            .await?;
        info!("💾 Loaded {} rows into daily_prices", rows_loaded);

        Ok(RunSummary {
            tickers_requested: tickers.len(),
            report: output.report,
            rows_loaded,
        })
    }
}

/// Canonical, de-duplicated download list in database order
fn request_tickers<'t>(raw: impl Iterator<Item = &'t str>) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.map(canonical_ticker)
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.clone()))
        .collect()
}
