use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};

use stocks_etl::database::DatabaseManager;
use stocks_etl::models::Config;
use stocks_etl::utils::init_logging;

/// Create the `stocks` and `daily_prices` tables if they do not exist
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// SQLite database file (overrides DATABASE_PATH)
    #[arg(long)]
    database: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging("stocks_etl=info,setup_database=info");
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("❌ Database setup failed: {:#}", e);
            eprintln!("❌ Database setup failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::from_env()?;
    let path = cli.database.unwrap_or(config.database_path);

    let database = DatabaseManager::new(&path).await?;
    let stats = database.get_stats().await?;
    database.close().await;

    info!(
        "✅ Database '{}' is ready ({} stocks, {} price records)",
        path, stats.total_stocks, stats.total_price_records
    );
    println!("stocks: {}", stats.total_stocks);
    println!("daily_prices: {}", stats.total_price_records);
    Ok(())
}
