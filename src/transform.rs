use std::collections::{BTreeSet, HashMap};
use tracing::{debug, error, warn};

use crate::errors::TransformError;
use crate::frame::{LongRow, WideFrame};
use crate::models::{DailyPrice, MatchPolicy, Stock};
use crate::schema::{FieldMapping, PriceField};
use crate::utils::{canonical_ticker, normalize_price_date};

/// Counts collected while reconciling a download against the `stocks` table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformReport {
    pub stacked_rows: usize,
    pub matched_rows: usize,
    pub unmatched_rows: usize,
    pub incomplete_rows: usize,
    pub unmatched_tickers: Vec<String>,
    pub missing_fields: Vec<PriceField>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransformOutput {
    pub prices: Vec<DailyPrice>,
    pub report: TransformReport,
}

/// Turns a wide (field, ticker) download into `daily_prices` rows
#[derive(Debug, Clone, Default)]
pub struct PriceTransformer {
    mapping: FieldMapping,
    policy: MatchPolicy,
}

impl PriceTransformer {
    pub fn new(mapping: FieldMapping, policy: MatchPolicy) -> Self {
        Self { mapping, policy }
    }

    /// Reshape `frame` into long rows and swap tickers for stock ids.
    ///
    /// `requested` is the ticker list the download was made for; when the
    /// frame has no ticker level its first entry names the columns.
    pub fn transform(
        &self,
        mut frame: WideFrame,
        known: &[Stock],
        requested: &[String],
    ) -> Result<TransformOutput, TransformError> {
        if !frame.has_ticker_level() {
            let [single] = requested else {
                error!(
                    "❌ Download has no ticker level but {} tickers were requested",
                    requested.len()
                );
                return Err(TransformError::AmbiguousTickerLevel(requested.len()));
            };
            frame.ensure_ticker_level(single)?;
        }

        let missing_fields = self.mapping.missing_fields(frame.field_labels());
        if !missing_fields.is_empty() {
            let names: Vec<&str> = missing_fields.iter().map(|f| f.column_name()).collect();
            warn!("⚠️  Expected columns missing after transform: {:?}", names);
        }

        let ids = ticker_ids(known);
        let stacked = frame.stack_tickers()?;

        let mut report = TransformReport {
            stacked_rows: stacked.len(),
            missing_fields,
            ..TransformReport::default()
        };
        let mut unmatched: BTreeSet<String> = BTreeSet::new();
        let mut prices = Vec::with_capacity(stacked.len());

        for row in &stacked {
            let ticker = canonical_ticker(&row.ticker);
            let Some(&stock_id) = ids.get(&ticker) else {
                report.unmatched_rows += 1;
                unmatched.insert(ticker);
                continue;
            };
            report.matched_rows += 1;

            match self.to_daily_price(stock_id, row) {
                Some(price) => prices.push(price),
                None => report.incomplete_rows += 1,
            }
        }
        report.unmatched_tickers = unmatched.into_iter().collect();

        if report.matched_rows == 0 {
            error!("❌ Merge failed: no matching tickers between the price data and the database");
            return Err(TransformError::NoMatches);
        }

        if !report.unmatched_tickers.is_empty() {
            match self.policy {
                MatchPolicy::Strict => {
                    return Err(TransformError::UnmatchedTickers(report.unmatched_tickers));
                }
                MatchPolicy::Lenient => warn!(
                    "⚠️  Dropped {} rows for {} unmatched tickers: {}",
                    report.unmatched_rows,
                    report.unmatched_tickers.len(),
                    report.unmatched_tickers.join(", ")
                ),
            }
        }

        if report.incomplete_rows > 0 {
            warn!(
                "⚠️  Dropped {} rows missing one of {:?}",
                report.incomplete_rows,
                PriceField::ALL.map(|f| f.column_name())
            );
        }
        if prices.is_empty() {
            return Err(TransformError::NoCompleteRows(report.matched_rows));
        }

        debug!(
            "Transform: {} stacked, {} matched, {} kept",
            report.stacked_rows,
            report.matched_rows,
            prices.len()
        );

        Ok(TransformOutput { prices, report })
    }

    /// Map a long row onto the storage schema; `None` if a field is missing
    fn to_daily_price(&self, stock_id: i64, row: &LongRow) -> Option<DailyPrice> {
        let mut values: [Option<f64>; 5] = [None; 5];
        for (label, value) in &row.fields {
            if let Some(field) = self.mapping.resolve(label) {
                values[field.position()] = Some(*value);
            }
        }

        let [open, high, low, close, volume] = values;
        Some(DailyPrice {
            stock_id,
            date: normalize_price_date(&row.timestamp),
            open: open?,
            high: high?,
            low: low?,
            close: close?,
            volume: volume?.round() as i64,
        })
    }
}

/// Canonical ticker → stock id. The first id wins if two rows collide.
fn ticker_ids(known: &[Stock]) -> HashMap<String, i64> {
    let mut ids = HashMap::with_capacity(known.len());
    for stock in known {
        let ticker = canonical_ticker(&stock.ticker);
        if let Some(existing) = ids.get(&ticker) {
            warn!(
                "Ticker {} is stored twice (ids {} and {}), using {}",
                ticker, existing, stock.id, existing
            );
            continue;
        }
        ids.insert(ticker, stock.id);
    }
    ids
}
