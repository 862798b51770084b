use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::api::instruments_client::DEFAULT_INSTRUMENTS_URL;
use crate::api::yahoo_client::DEFAULT_PRICE_API_URL;
use crate::errors::ConfigError;
use crate::utils::PRICE_DATE_FORMAT;

/// A row of the `stocks` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stock {
    pub id: i64,
    pub ticker: String,
    pub company_name: Option<String>,
}

/// A ticker waiting to be inserted; the store assigns the id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewStock {
    pub ticker: String,
    pub company_name: Option<String>,
}

/// One OHLCV observation, keyed by (stock_id, date)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPrice {
    pub stock_id: i64,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

/// Instrument record from the reference-data listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListedInstrument {
    pub country: String,
    pub name: String,
    #[serde(default)]
    pub full_name: String,
    pub symbol: String,
}

impl ListedInstrument {
    /// Full name when the listing has one, short name otherwise
    pub fn display_name(&self) -> &str {
        let full = self.full_name.trim();
        if full.is_empty() {
            self.name.trim()
        } else {
            full
        }
    }
}

/// Row counts of the two tables
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseStats {
    pub total_stocks: i64,
    pub total_price_records: i64,
    pub latest_price_date: Option<NaiveDate>,
}

/// What to do with fetched rows whose ticker is not in the `stocks` table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum MatchPolicy {
    /// Any unmatched ticker fails the run
    Strict,
    /// Unmatched rows are dropped and counted
    #[default]
    Lenient,
}

impl FromStr for MatchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(MatchPolicy::Strict),
            "lenient" => Ok(MatchPolicy::Lenient),
            other => Err(format!("expected 'strict' or 'lenient', got '{}'", other)),
        }
    }
}

/// Configuration for the pipeline and the seeding utility
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database_path: String,
    pub start_date: NaiveDate,
    pub market_country: String,
    pub ticker_suffix: String,
    pub load_chunk_size: usize,
    pub match_policy: MatchPolicy,
    pub rate_limit_per_minute: u32,
    pub price_api_url: String,
    pub instruments_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_path: "stocks.db".to_string(),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or(NaiveDate::MIN),
            market_country: "brazil".to_string(),
            ticker_suffix: ".SA".to_string(),
            load_chunk_size: 1000,
            match_policy: MatchPolicy::Lenient,
            rate_limit_per_minute: 120,
            price_api_url: DEFAULT_PRICE_API_URL.to_string(),
            instruments_url: DEFAULT_INSTRUMENTS_URL.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from any key lookup, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let start_date = match get("ETL_START_DATE") {
            Some(value) => parse_date("ETL_START_DATE", &value)?,
            None => defaults.start_date,
        };

        let load_chunk_size = match get("LOAD_CHUNK_SIZE") {
            Some(value) => parse_positive("LOAD_CHUNK_SIZE", &value)?,
            None => defaults.load_chunk_size,
        };

        let rate_limit_per_minute = match get("RATE_LIMIT_PER_MINUTE") {
            Some(value) => parse_positive("RATE_LIMIT_PER_MINUTE", &value)?,
            None => defaults.rate_limit_per_minute,
        };

        let match_policy = match get("MATCH_POLICY") {
            Some(value) => value.parse().map_err(|reason| ConfigError::InvalidValue {
                key: "MATCH_POLICY",
                value: value.clone(),
                reason,
            })?,
            None => defaults.match_policy,
        };

        Ok(Config {
            database_path: get("DATABASE_PATH").unwrap_or(defaults.database_path),
            start_date,
            market_country: get("MARKET_COUNTRY").unwrap_or(defaults.market_country),
            ticker_suffix: get("TICKER_SUFFIX").unwrap_or(defaults.ticker_suffix),
            load_chunk_size,
            match_policy,
            rate_limit_per_minute,
            price_api_url: get("PRICE_API_URL").unwrap_or(defaults.price_api_url),
            instruments_url: get("INSTRUMENTS_URL").unwrap_or(defaults.instruments_url),
        })
    }

    /// Override the load chunk size; zero is rejected like `LOAD_CHUNK_SIZE=0`
    pub fn set_load_chunk_size(&mut self, chunk_size: usize) -> Result<(), ConfigError> {
        if chunk_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "--chunk-size",
                value: chunk_size.to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        self.load_chunk_size = chunk_size;
        Ok(())
    }
}

/// Parse a `YYYY-MM-DD` configuration value
pub fn parse_date(key: &'static str, value: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(value.trim(), PRICE_DATE_FORMAT).map_err(|e| {
        ConfigError::InvalidValue {
            key,
            value: value.to_string(),
            reason: e.to_string(),
        }
    })
}

fn parse_positive<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr + PartialEq + Default,
    T::Err: std::fmt::Display,
{
    let parsed: T = value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
        reason: e.to_string(),
    })?;

    if parsed == T::default() {
        return Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }

    Ok(parsed)
}
