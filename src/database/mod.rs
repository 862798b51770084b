use chrono::NaiveDate;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::time::Duration;
use tracing::{debug, info};

use crate::errors::LoadError;
use crate::models::{DailyPrice, DatabaseStats, NewStock, Stock};
use crate::utils::format_price_date;

/// SQLite's default limit on bound parameters per statement
const SQLITE_MAX_BINDS: usize = 32_766;
const PRICE_COLUMNS: usize = 7;
/// Largest multi-row INSERT that stays under the bind limit
pub const MAX_ROWS_PER_INSERT: usize = SQLITE_MAX_BINDS / PRICE_COLUMNS;

/// SQLite store holding `stocks` and `daily_prices`
#[derive(Clone)]
pub struct DatabaseManager {
    pool: SqlitePool,
}

impl DatabaseManager {
    /// Open (creating if needed) the database file and make sure the schema exists
    pub async fn new(database_path: &str) -> Result<Self, sqlx::Error> {
        let filename = database_path
            .strip_prefix("sqlite://")
            .or_else(|| database_path.strip_prefix("sqlite:"))
            .unwrap_or(database_path);

        let options = SqliteConnectOptions::new()
            .filename(filename)
            .create_if_missing(true)
            .foreign_keys(true);

        // One connection: the run is sequential and `:memory:` must stay a single database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.create_schema().await?;
        info!("Database initialized at {}", filename);

        Ok(db)
    }

    /// Create both tables if they do not exist yet
    pub async fn create_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS stocks (
                id INTEGER PRIMARY KEY,
                ticker TEXT UNIQUE NOT NULL,
                company_name TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS daily_prices (
                id INTEGER PRIMARY KEY,
                stock_id INTEGER NOT NULL,
                date TEXT NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                volume INTEGER NOT NULL,
                FOREIGN KEY (stock_id) REFERENCES stocks (id),
                UNIQUE(stock_id, date)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        debug!("Schema ready");
        Ok(())
    }

    /// Close the pool; the manager is consumed
    pub async fn close(self) {
        self.pool.close().await;
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// All known tickers, in insertion order
    pub async fn get_stocks(&self) -> Result<Vec<Stock>, sqlx::Error> {
        let rows = sqlx::query("SELECT id, ticker, company_name FROM stocks ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(|r| stock_from_row(&r)).collect()
    }

    /// Look up a stock by ticker, ignoring case
    pub async fn get_stock_by_ticker(&self, ticker: &str) -> Result<Option<Stock>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT id, ticker, company_name FROM stocks WHERE UPPER(ticker) = UPPER(?) ORDER BY id LIMIT 1",
        )
        .bind(ticker.trim())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| stock_from_row(&r)).transpose()
    }

    /// Insert tickers, skipping any already present. Returns the number of new rows.
    pub async fn insert_stocks_ignore(&self, stocks: &[NewStock]) -> Result<u64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for stock in stocks {
            let result = sqlx::query("INSERT OR IGNORE INTO stocks (ticker, company_name) VALUES (?, ?)")
                .bind(&stock.ticker)
                .bind(&stock.company_name)
                .execute(&mut *tx)
                .await?;
            inserted += result.rows_affected();
        }

        tx.commit().await?;
        debug!("Inserted {} of {} tickers", inserted, stocks.len());
        Ok(inserted)
    }

    /// Append price rows in chunks of `chunk_size`, capped at
    /// [`MAX_ROWS_PER_INSERT`] rows per statement.
    ///
    /// All chunks share one transaction: a rejected row rolls back the whole
    /// batch and existing rows are never touched.
    pub async fn append_daily_prices(
        &self,
        prices: &[DailyPrice],
        chunk_size: usize,
    ) -> Result<u64, LoadError> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for chunk in prices.chunks(chunk_size.clamp(1, MAX_ROWS_PER_INSERT)) {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO daily_prices (stock_id, date, open, high, low, close, volume) ",
            );
            builder.push_values(chunk, |mut row, price| {
                row.push_bind(price.stock_id)
                    .push_bind(format_price_date(price.date))
                    .push_bind(price.open)
                    .push_bind(price.high)
                    .push_bind(price.low)
                    .push_bind(price.close)
                    .push_bind(price.volume);
            });

            let result = builder.build().execute(&mut *tx).await?;
            inserted += result.rows_affected();
            debug!("Wrote chunk of {} rows", chunk.len());
        }

        tx.commit().await?;
        Ok(inserted)
    }

    /// Stored prices of one stock, oldest first
    pub async fn get_prices_for_stock(&self, stock_id: i64) -> Result<Vec<DailyPrice>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT stock_id, date, open, high, low, close, volume
            FROM daily_prices
            WHERE stock_id = ?
            ORDER BY date
            "#,
        )
        .bind(stock_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| {
                Ok(DailyPrice {
                    stock_id: r.try_get("stock_id")?,
                    date: r.try_get::<NaiveDate, _>("date")?,
                    open: r.try_get("open")?,
                    high: r.try_get("high")?,
                    low: r.try_get("low")?,
                    close: r.try_get("close")?,
                    volume: r.try_get("volume")?,
                })
            })
            .collect()
    }

    /// Get database statistics
    pub async fn get_stats(&self) -> Result<DatabaseStats, sqlx::Error> {
        let total_stocks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stocks")
            .fetch_one(&self.pool)
            .await?;
        let total_price_records: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM daily_prices")
            .fetch_one(&self.pool)
            .await?;
        let latest_price_date: Option<NaiveDate> =
            sqlx::query_scalar("SELECT MAX(date) FROM daily_prices")
                .fetch_one(&self.pool)
                .await?;

        Ok(DatabaseStats {
            total_stocks,
            total_price_records,
            latest_price_date,
        })
    }
}

fn stock_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Stock, sqlx::Error> {
    Ok(Stock {
        id: row.try_get("id")?,
        ticker: row.try_get("ticker")?,
        company_name: row.try_get("company_name")?,
    })
}
