//! Fills the `stocks` table from the instrument listing of one country.

use std::collections::HashSet;
use tracing::{info, warn};

use crate::api::InstrumentSource;
use crate::database::DatabaseManager;
use crate::errors::SeedError;
use crate::models::{Config, NewStock};
use crate::utils::canonical_ticker;

/// Counts of one seeding run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub found: usize,
    pub inserted: u64,
}

pub struct StockSeeder<'a> {
    database: &'a DatabaseManager,
    source: &'a dyn InstrumentSource,
    country: String,
    ticker_suffix: String,
}

impl<'a> StockSeeder<'a> {
    pub fn new(
        database: &'a DatabaseManager,
        source: &'a dyn InstrumentSource,
        country: &str,
        ticker_suffix: &str,
    ) -> Self {
        Self {
            database,
            source,
            country: country.to_string(),
            ticker_suffix: ticker_suffix.to_string(),
        }
    }

    pub fn from_config(
        database: &'a DatabaseManager,
        source: &'a dyn InstrumentSource,
        config: &Config,
    ) -> Self {
        Self::new(database, source, &config.market_country, &config.ticker_suffix)
    }

    /// Insert every listed ticker not stored yet. Existing rows are left alone.
    pub async fn run(&self) -> Result<SeedSummary, SeedError> {
        info!("🔍 Fetching stock list for {}...", self.country);
        let instruments = self.source.list_stocks(&self.country).await?;
        if instruments.is_empty() {
            return Err(SeedError::NoInstruments(self.country.clone()));
        }

        let mut seen = HashSet::new();
        let mut stocks = Vec::with_capacity(instruments.len());
        for instrument in &instruments {
            let ticker = derive_ticker(&instrument.symbol, &self.ticker_suffix);
            if ticker.is_empty() {
                continue;
            }
            if !seen.insert(ticker.clone()) {
                warn!("⚠️ Duplicate listing for {}, keeping the first", ticker);
                continue;
            }

            let name = instrument.display_name();
            stocks.push(NewStock {
                ticker,
                company_name: (!name.is_empty()).then(|| name.to_string()),
            });
        }
        info!("📋 Found {} stocks", stocks.len());

        let inserted = self.database.insert_stocks_ignore(&stocks).await?;
        info!(
            "✅ {} new stocks inserted, {} already present",
            inserted,
            stocks.len() as u64 - inserted
        );

        Ok(SeedSummary {
            found: stocks.len(),
            inserted,
        })
    }
}

/// Exchange ticker for a listing symbol: uppercased, suffix appended once
pub fn derive_ticker(symbol: &str, suffix: &str) -> String {
    let symbol = canonical_ticker(symbol);
    if symbol.is_empty() {
        return symbol;
    }

    let suffix = canonical_ticker(suffix);
    if suffix.is_empty() || symbol.ends_with(&suffix) {
        symbol
    } else {
        format!("{}{}", symbol, suffix)
    }
}
