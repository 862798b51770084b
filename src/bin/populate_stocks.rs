use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};

use stocks_etl::api::InstrumentListClient;
use stocks_etl::database::DatabaseManager;
use stocks_etl::models::Config;
use stocks_etl::seeder::StockSeeder;
use stocks_etl::utils::init_logging;

/// Seed the `stocks` table with the listed stocks of one country
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// SQLite database file (overrides DATABASE_PATH)
    #[arg(long)]
    database: Option<String>,

    /// Country whose listing is loaded (overrides MARKET_COUNTRY)
    #[arg(long)]
    country: Option<String>,

    /// Exchange suffix appended to each symbol (overrides TICKER_SUFFIX)
    #[arg(long)]
    suffix: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging("stocks_etl=info,populate_stocks=info");
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("❌ Error populating stocks: {:#}", e);
            eprintln!("❌ Error populating stocks: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::from_env()?;
    if let Some(path) = cli.database {
        config.database_path = path;
    }
    if let Some(country) = cli.country {
        config.market_country = country;
    }
    if let Some(suffix) = cli.suffix {
        config.ticker_suffix = suffix;
    }

    let database = DatabaseManager::new(&config.database_path).await?;
    let source = InstrumentListClient::new(&config)?;

    let result = StockSeeder::from_config(&database, &source, &config).run().await;
    database.close().await;

    let summary = result?;
    info!(
        "📊 {} stocks listed, {} inserted into '{}'",
        summary.found, summary.inserted, config.database_path
    );
    println!("{} new stocks inserted.", summary.inserted);
    Ok(())
}
