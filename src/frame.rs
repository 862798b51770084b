//! Wide-format price tables.
//!
//! A [`WideFrame`] has one row per timestamp and one column per
//! (field, ticker) pair, which is the shape a multi-ticker price download
//! comes back in. A single-ticker download usually omits the ticker level;
//! [`WideFrame::ensure_ticker_level`] restores it before
//! [`WideFrame::stack_tickers`] turns the table into long rows.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use csv::StringRecord;
use std::collections::BTreeSet;
use std::fmt;
use std::io::Read;
use std::path::Path;

use crate::errors::FrameError;
use crate::utils::{normalize_price_date, PRICE_DATE_FORMAT};

/// Column label; `ticker` is `None` on a single-level table
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnLabel {
    pub field: String,
    pub ticker: Option<String>,
}

impl ColumnLabel {
    pub fn field(field: &str) -> Self {
        ColumnLabel {
            field: field.to_string(),
            ticker: None,
        }
    }

    pub fn pair(field: &str, ticker: &str) -> Self {
        ColumnLabel {
            field: field.to_string(),
            ticker: Some(ticker.to_string()),
        }
    }
}

impl fmt::Display for ColumnLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.ticker {
            Some(ticker) => write!(f, "({}, {})", self.field, ticker),
            None => f.write_str(&self.field),
        }
    }
}

/// One (timestamp, ticker) observation after stacking
#[derive(Debug, Clone, PartialEq)]
pub struct LongRow {
    pub timestamp: DateTime<FixedOffset>,
    pub ticker: String,
    /// Present values only, in column order
    pub fields: Vec<(String, f64)>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WideFrame {
    index: Vec<DateTime<FixedOffset>>,
    columns: Vec<ColumnLabel>,
    values: Vec<Vec<Option<f64>>>,
}

impl WideFrame {
    pub fn new(index: Vec<DateTime<FixedOffset>>) -> Self {
        WideFrame {
            index,
            columns: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Append a column. Non-finite values are stored as missing.
    pub fn push_column(
        &mut self,
        label: ColumnLabel,
        values: Vec<Option<f64>>,
    ) -> Result<(), FrameError> {
        if values.len() != self.index.len() {
            return Err(FrameError::LengthMismatch {
                column: label.to_string(),
                expected: self.index.len(),
                actual: values.len(),
            });
        }
        if self.columns.contains(&label) {
            return Err(FrameError::DuplicateColumn(label.to_string()));
        }

        let values = values
            .into_iter()
            .map(|v| v.filter(|x| x.is_finite()))
            .collect();

        self.columns.push(label);
        self.values.push(values);
        Ok(())
    }

    pub fn index(&self) -> &[DateTime<FixedOffset>] {
        &self.index
    }

    pub fn columns(&self) -> &[ColumnLabel] {
        &self.columns
    }

    pub fn column_values(&self, label: &ColumnLabel) -> Option<&[Option<f64>]> {
        self.columns
            .iter()
            .position(|c| c == label)
            .map(|i| self.values[i].as_slice())
    }

    pub fn row_count(&self) -> usize {
        self.index.len()
    }

    /// True when the table has no rows or no columns
    pub fn is_empty(&self) -> bool {
        self.index.is_empty() || self.columns.is_empty()
    }

    /// Distinct field labels, in column order
    pub fn field_labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = Vec::new();
        for column in &self.columns {
            if !labels.contains(&column.field.as_str()) {
                labels.push(column.field.as_str());
            }
        }
        labels
    }

    /// Distinct tickers, sorted
    pub fn tickers(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter_map(|c| c.ticker.as_deref())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn has_ticker_level(&self) -> bool {
        !self.columns.is_empty() && self.columns.iter().all(|c| c.ticker.is_some())
    }

    /// Attach `ticker` as the second column level of a single-level table.
    ///
    /// A table that already has the level is left alone; a table mixing
    /// labelled and unlabelled columns is rejected.
    pub fn ensure_ticker_level(&mut self, ticker: &str) -> Result<(), FrameError> {
        if self.has_ticker_level() {
            return Ok(());
        }
        if self.columns.iter().any(|c| c.ticker.is_some()) {
            return Err(FrameError::TickerLevel(
                "table mixes single-level and (field, ticker) columns".to_string(),
            ));
        }
        if ticker.trim().is_empty() {
            return Err(FrameError::TickerLevel("no ticker to attach".to_string()));
        }

        for column in &mut self.columns {
            column.ticker = Some(ticker.to_string());
        }
        Ok(())
    }

    /// Drop rows dated before `start`
    pub fn retain_from(&mut self, start: NaiveDate) {
        let keep: Vec<bool> = self
            .index
            .iter()
            .map(|ts| normalize_price_date(ts) >= start)
            .collect();

        let mut flags = keep.iter();
        self.index.retain(|_| *flags.next().unwrap_or(&false));
        for column in &mut self.values {
            let mut flags = keep.iter();
            column.retain(|_| *flags.next().unwrap_or(&false));
        }
    }

    /// Move the ticker level into the row index.
    ///
    /// Rows come out ordered by timestamp, then ticker. A (timestamp, ticker)
    /// pair with no values at all is skipped.
    pub fn stack_tickers(&self) -> Result<Vec<LongRow>, FrameError> {
        if !self.columns.is_empty() && !self.has_ticker_level() {
            return Err(FrameError::TickerLevel(
                "cannot stack a table without a ticker level".to_string(),
            ));
        }

        let groups: Vec<(&str, Vec<usize>)> = self
            .tickers()
            .into_iter()
            .map(|ticker| {
                let positions = self
                    .columns
                    .iter()
                    .enumerate()
                    .filter(|(_, c)| c.ticker.as_deref() == Some(ticker))
                    .map(|(i, _)| i)
                    .collect();
                (ticker, positions)
            })
            .collect();

        let mut rows = Vec::new();
        for (row, timestamp) in self.index.iter().enumerate() {
            for (ticker, positions) in &groups {
                let fields: Vec<(String, f64)> = positions
                    .iter()
                    .filter_map(|&col| {
                        self.values[col][row].map(|v| (self.columns[col].field.clone(), v))
                    })
                    .collect();

                if fields.is_empty() {
                    continue;
                }

                rows.push(LongRow {
                    timestamp: *timestamp,
                    ticker: ticker.to_string(),
                    fields,
                });
            }
        }

        Ok(rows)
    }

    /// Read a wide CSV table.
    ///
    /// The first row holds the index name followed by field labels. An
    /// optional second row starting with `Ticker` holds the ticker level,
    /// and an optional `Date` row with no other content is skipped.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, FrameError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let records = reader
            .records()
            .collect::<Result<Vec<StringRecord>, csv::Error>>()?;
        let mut records = records.into_iter().peekable();

        let header = records
            .next()
            .ok_or_else(|| FrameError::Header("file is empty".to_string()))?;
        if header.len() < 2 {
            return Err(FrameError::Header(
                "expected an index column and at least one field".to_string(),
            ));
        }
        let fields: Vec<String> = header.iter().skip(1).map(str::to_string).collect();

        let mut tickers: Option<Vec<String>> = None;
        if records.peek().map_or(false, |r| first_cell_is(r, "ticker")) {
            if let Some(record) = records.next() {
                let level: Vec<String> = record.iter().skip(1).map(str::to_string).collect();
                if level.iter().any(|t| t.is_empty()) {
                    return Err(FrameError::Header("blank ticker in ticker row".to_string()));
                }
                tickers = Some(level);
            }
        }

        if records
            .peek()
            .map_or(false, |r| first_cell_is(r, "date") && r.iter().skip(1).all(str::is_empty))
        {
            records.next();
        }

        let mut index = Vec::new();
        let mut columns: Vec<Vec<Option<f64>>> = vec![Vec::new(); fields.len()];
        for record in records {
            let label = record.get(0).unwrap_or_default();
            index.push(parse_index_label(label)?);

            for (col, raw) in record.iter().skip(1).enumerate() {
                let column = columns.get_mut(col).ok_or_else(|| {
                    FrameError::Header(format!("row '{}' has more cells than the header", label))
                })?;
                column.push(parse_cell(&fields[col], raw)?);
            }
        }

        let mut frame = WideFrame::new(index);
        for (col, values) in columns.into_iter().enumerate() {
            let label = match &tickers {
                Some(level) => ColumnLabel::pair(&fields[col], &level[col]),
                None => ColumnLabel::field(&fields[col]),
            };
            frame.push_column(label, values)?;
        }

        Ok(frame)
    }

    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> Result<Self, FrameError> {
        let file = std::fs::File::open(path)?;
        Self::from_csv_reader(file)
    }
}

/// Parse a row label into a timestamp.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS[+HH:MM]` and plain `YYYY-MM-DD`.
/// Labels without an offset are read as UTC.
pub fn parse_index_label(label: &str) -> Result<DateTime<FixedOffset>, FrameError> {
    let label = label.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(label) {
        return Ok(ts);
    }
    for format in ["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M:%S%z"] {
        if let Ok(ts) = DateTime::parse_from_str(label, format) {
            return Ok(ts);
        }
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(label, format) {
            return Ok(naive.and_utc().fixed_offset());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(label, PRICE_DATE_FORMAT) {
        return date_index(date).ok_or_else(|| FrameError::InvalidDate(label.to_string()));
    }

    Err(FrameError::InvalidDate(label.to_string()))
}

/// Midnight UTC of `date`, the index value used for daily bars
pub fn date_index(date: NaiveDate) -> Option<DateTime<FixedOffset>> {
    date.and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc().fixed_offset())
}

fn first_cell_is(record: &StringRecord, expected: &str) -> bool {
    record
        .get(0)
        .map_or(false, |cell| cell.eq_ignore_ascii_case(expected))
}

fn parse_cell(column: &str, raw: &str) -> Result<Option<f64>, FrameError> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("nan") || raw.eq_ignore_ascii_case("null") {
        return Ok(None);
    }
    raw.parse::<f64>()
        .map(Some)
        .map_err(|_| FrameError::InvalidValue {
            column: column.to_string(),
            value: raw.to_string(),
        })
}
