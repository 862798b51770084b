use anyhow::Result;
use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};

use stocks_etl::api::{CsvPriceSource, PriceHistoryProvider, YahooClient};
use stocks_etl::database::DatabaseManager;
use stocks_etl::errors::{EtlError, TransformError};
use stocks_etl::models::{Config, MatchPolicy};
use stocks_etl::pipeline::{EtlPipeline, EtlSettings, RunSummary};
use stocks_etl::utils::init_logging;

/// Download daily prices for every stored ticker and append them to the database
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// SQLite database file (overrides DATABASE_PATH)
    #[arg(long)]
    database: Option<String>,

    /// First date to download, YYYY-MM-DD (overrides ETL_START_DATE)
    #[arg(long)]
    start_date: Option<NaiveDate>,

    /// Rows per INSERT statement (overrides LOAD_CHUNK_SIZE)
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Handling of downloaded tickers missing from the database (overrides MATCH_POLICY)
    #[arg(long, value_enum)]
    match_policy: Option<MatchPolicy>,

    /// Read prices from a wide CSV export instead of the price API
    #[arg(long)]
    from_csv: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging("stocks_etl=info");
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("❌ ETL run failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::from_env()?;
    if let Some(path) = cli.database {
        config.database_path = path;
    }
    if let Some(start) = cli.start_date {
        config.start_date = start;
    }
    if let Some(chunk_size) = cli.chunk_size {
        config.set_load_chunk_size(chunk_size)?;
    }
    if let Some(policy) = cli.match_policy {
        config.match_policy = policy;
    }

    info!("🚀 Starting ETL run");
    let database = DatabaseManager::new(&config.database_path).await?;

    let provider: Box<dyn PriceHistoryProvider> = match cli.from_csv {
        Some(path) => Box::new(CsvPriceSource::new(path)),
        None => Box::new(YahooClient::new(&config)?),
    };

    let settings = EtlSettings::from_config(&config);
    let result = EtlPipeline::new(&database, provider.as_ref(), settings)
        .run()
        .await;

    database.close().await;
    info!("🔒 Database connection closed");

    match result {
        Ok(summary) => {
            report_success(&summary);
            Ok(())
        }
        Err(e) => {
            explain_failure(&e);
            Err(e.into())
        }
    }
}

fn report_success(summary: &RunSummary) {
    let report = &summary.report;
    if report.unmatched_rows > 0 || report.incomplete_rows > 0 {
        warn!(
            "⚠️  {} rows dropped ({} unmatched, {} incomplete)",
            report.unmatched_rows + report.incomplete_rows,
            report.unmatched_rows,
            report.incomplete_rows
        );
    }
    info!(
        "✅ Successfully loaded {} rows for {} tickers.",
        summary.rows_loaded, summary.tickers_requested
    );
    println!("Successfully loaded {} rows into daily_prices.", summary.rows_loaded);
}

/// Operator-facing hint for each failure class
fn explain_failure(err: &EtlError) {
    match err {
        EtlError::NoTickers => warn!("No tickers found in the database. Exiting."),
        EtlError::EmptyFetch => warn!(
            "No data was downloaded. Check that the tickers are valid or that the price API is available."
        ),
        EtlError::Transform(TransformError::NoMatches) => error!(
            "❌ Merge failed: no matching tickers found between the downloaded data and the database. This is a critical error."
        ),
        EtlError::AlreadyLoaded(_) => warn!(
            "This may be due to the UNIQUE constraint (stock_id, date). This is normal if data for today already exists."
        ),
        _ => {}
    }
}
