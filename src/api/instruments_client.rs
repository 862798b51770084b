use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::InstrumentSource;
use crate::errors::ProviderError;
use crate::models::{Config, ListedInstrument};

/// Public listing of stocks per country (country,name,full_name,isin,currency,symbol)
pub const DEFAULT_INSTRUMENTS_URL: &str =
    "https://raw.githubusercontent.com/alvarobartt/investpy/master/investpy/resources/stocks.csv";

/// Downloads the instrument listing CSV and filters it by country
pub struct InstrumentListClient {
    client: Client,
    url: String,
}

impl InstrumentListClient {
    pub fn new(config: &Config) -> Result<Self, ProviderError> {
        Self::with_url(&config.instruments_url)
    }

    pub fn with_url(url: &str) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl InstrumentSource for InstrumentListClient {
    async fn list_stocks(&self, country: &str) -> Result<Vec<ListedInstrument>, ProviderError> {
        info!("🌐 Fetching instrument list from {}", self.url);

        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let csv_text = response.text().await?;
        let instruments = parse_instruments_csv(&csv_text, country)?;
        debug!("{} instruments listed for {}", instruments.len(), country);

        Ok(instruments)
    }
}

/// Parse the listing and keep the rows of `country` (case-insensitive).
///
/// Rows without a symbol are skipped.
pub fn parse_instruments_csv(
    csv_text: &str,
    country: &str,
) -> Result<Vec<ListedInstrument>, ProviderError> {
    let mut reader = csv::Reader::from_reader(csv_text.as_bytes());
    let wanted = country.trim();
    let mut instruments = Vec::new();

    for result in reader.deserialize::<ListedInstrument>() {
        let instrument = result?;
        if !instrument.country.trim().eq_ignore_ascii_case(wanted) {
            continue;
        }
        if instrument.symbol.trim().is_empty() {
            warn!("⚠️ Skipping listing without a symbol: {}", instrument.name);
            continue;
        }
        instruments.push(instrument);
    }

    Ok(instruments)
}
