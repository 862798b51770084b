//! Declared mapping between upstream field labels and `daily_prices` columns.
//!
//! The price provider labels its series `Open`, `High`, `Low`, `Close`,
//! `Adj Close` and `Volume`. Only labels present in a [`FieldMapping`] reach
//! the store; everything else is dropped during the transform.

use std::fmt;

/// A price column of the `daily_prices` table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PriceField {
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl PriceField {
    /// Every field a stored row needs, in table order
    pub const ALL: [PriceField; 5] = [
        PriceField::Open,
        PriceField::High,
        PriceField::Low,
        PriceField::Close,
        PriceField::Volume,
    ];

    pub fn column_name(&self) -> &'static str {
        match self {
            PriceField::Open => "open",
            PriceField::High => "high",
            PriceField::Low => "low",
            PriceField::Close => "close",
            PriceField::Volume => "volume",
        }
    }

    pub(crate) fn position(&self) -> usize {
        match self {
            PriceField::Open => 0,
            PriceField::High => 1,
            PriceField::Low => 2,
            PriceField::Close => 3,
            PriceField::Volume => 4,
        }
    }
}

impl fmt::Display for PriceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

/// Source label → storage field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMapping {
    entries: Vec<(String, PriceField)>,
}

impl Default for FieldMapping {
    /// The labels used by the Yahoo chart API and its CSV exports
    fn default() -> Self {
        FieldMapping::empty()
            .with("Open", PriceField::Open)
            .with("High", PriceField::High)
            .with("Low", PriceField::Low)
            .with("Close", PriceField::Close)
            .with("Volume", PriceField::Volume)
    }
}

impl FieldMapping {
    pub fn empty() -> Self {
        FieldMapping { entries: Vec::new() }
    }

    /// Add or replace the mapping for `label`
    pub fn with(mut self, label: &str, field: PriceField) -> Self {
        let label = label.trim().to_string();
        self.entries.retain(|(existing, _)| *existing != label);
        self.entries.push((label, field));
        self
    }

    /// Storage field for a source label. Exact match first, then ASCII case-insensitive.
    pub fn resolve(&self, label: &str) -> Option<PriceField> {
        let label = label.trim();
        self.entries
            .iter()
            .find(|(source, _)| source == label)
            .or_else(|| {
                self.entries
                    .iter()
                    .find(|(source, _)| source.eq_ignore_ascii_case(label))
            })
            .map(|(_, field)| *field)
    }

    /// Required fields that none of `labels` resolves to
    pub fn missing_fields<'a, I>(&self, labels: I) -> Vec<PriceField>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let present: Vec<PriceField> = labels
            .into_iter()
            .filter_map(|label| self.resolve(label))
            .collect();

        PriceField::ALL
            .iter()
            .copied()
            .filter(|field| !present.contains(field))
            .collect()
    }
}
