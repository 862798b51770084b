use thiserror::Error;

/// Invalid configuration value from the environment or command line
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}' ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Errors raised while building or reshaping a wide price table
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("column {column} has {actual} values but the index has {expected} rows")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("duplicate column {0}")]
    DuplicateColumn(String),

    #[error("cannot attach ticker level: {0}")]
    TickerLevel(String),

    #[error("invalid date label '{0}'")]
    InvalidDate(String),

    #[error("invalid value '{value}' in column {column}")]
    InvalidValue { column: String, value: String },

    #[error("malformed CSV header: {0}")]
    Header(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur inside a market-data or reference-data provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network failure, timeout or undecodable body.
    #[error("API request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The provider answered, but not in the shape we expect.
    #[error("unexpected response format: {0}")]
    ResponseFormat(String),

    #[error("invalid base URL: {0}")]
    BaseUrl(String),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Failures of the reconciliation step
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("no matching tickers were found between the price data and the database")]
    NoMatches,

    #[error("{} ticker(s) have no match in the database: {}", .0.len(), .0.join(", "))]
    UnmatchedTickers(Vec<String>),

    /// A table without ticker columns can only belong to a single requested ticker.
    #[error("price table has no ticker level but {0} tickers were requested")]
    AmbiguousTickerLevel(usize),

    #[error("all {0} matched rows are missing required price fields")]
    NoCompleteRows(usize),

    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Failures of the batched append into `daily_prices`
#[derive(Debug, Error)]
pub enum LoadError {
    /// A row collided with an existing (stock_id, date) pair.
    #[error("UNIQUE constraint rejected the batch: {0}")]
    Duplicate(String),

    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for LoadError {
    fn from(err: sqlx::Error) -> Self {
        let is_unique = err
            .as_database_error()
            .map(|db_err| db_err.is_unique_violation())
            .unwrap_or(false);

        if is_unique {
            LoadError::Duplicate(err.to_string())
        } else {
            LoadError::Database(err)
        }
    }
}

/// Everything that can stop an ETL run.
///
/// Each variant maps onto one failure class of the run; all of them end the
/// process with a non-zero exit code, but only [`EtlError::AlreadyLoaded`]
/// is an expected outcome.
#[derive(Debug, Error)]
pub enum EtlError {
    #[error("no tickers found in the database")]
    NoTickers,

    #[error("error fetching price data: {0}")]
    Fetch(#[from] ProviderError),

    #[error("no price data downloaded; tickers may be invalid or the provider may be down")]
    EmptyFetch,

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error("data for this day may already exist ({0})")]
    AlreadyLoaded(String),

    #[error("error loading data: {0}")]
    Load(sqlx::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl EtlError {
    /// True for the re-run case where the store already holds the rows.
    pub fn is_benign(&self) -> bool {
        matches!(self, EtlError::AlreadyLoaded(_))
    }

    /// True when no fetched ticker could be reconciled at all.
    pub fn is_critical(&self) -> bool {
        matches!(self, EtlError::Transform(TransformError::NoMatches))
    }
}

impl From<LoadError> for EtlError {
    fn from(err: LoadError) -> Self {
        match err {
            LoadError::Duplicate(message) => EtlError::AlreadyLoaded(message),
            LoadError::Database(e) => EtlError::Load(e),
        }
    }
}

/// Everything that can stop a seeding run
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("error fetching instrument list: {0}")]
    Fetch(#[from] ProviderError),

    #[error("no instruments listed for country '{0}'")]
    NoInstruments(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}
