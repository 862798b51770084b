use async_trait::async_trait;
use chrono::NaiveDate;
use std::path::PathBuf;
use tracing::info;

use super::PriceHistoryProvider;
use crate::errors::ProviderError;
use crate::frame::WideFrame;

/// Offline price source reading a previously exported wide CSV table
pub struct CsvPriceSource {
    path: PathBuf,
}

impl CsvPriceSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl PriceHistoryProvider for CsvPriceSource {
    /// The file is taken as-is; `tickers` only matters to the caller when the
    /// table has a single column level.
    async fn fetch_daily_history(
        &self,
        _tickers: &[String],
        start: NaiveDate,
    ) -> Result<WideFrame, ProviderError> {
        info!("📂 Reading price table from {}", self.path.display());

        let mut frame = WideFrame::from_csv_path(&self.path)?;
        frame.retain_from(start);

        Ok(frame)
    }
}
