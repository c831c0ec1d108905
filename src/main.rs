use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use statement_crawler::api::{MopsClient, RemoteStore, StatementSource, StockerClient};
use statement_crawler::batch_driver::BatchDriver;
use statement_crawler::models::{Config, Season, StatementKind};
use statement_crawler::normalize::StatementProfile;
use statement_crawler::updater::StatementUpdater;
use statement_crawler::utils::{Pacer, TokioPacer};

/// Crawl balance sheets from MOPS and forward them to the stocker server
#[derive(Parser)]
#[command(name = "statement-crawler")]
#[command(version)]
#[command(about = "Update balance sheets of all listed and OTC companies for one quarter")]
struct Args {
    /// Western calendar year of the report (e.g. 2019)
    year: i32,

    /// Fiscal quarter of the report
    #[arg(value_parser = clap::value_parser!(u8).range(1..=4))]
    season: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("statement_crawler=info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };
    info!("📋 Stocker server at {}", config.stocker_url);

    let season = Season::try_from(args.season)?;

    let source: Arc<dyn StatementSource> = Arc::new(MopsClient::new(&config)?);
    let store: Arc<dyn RemoteStore> = Arc::new(StockerClient::new(&config)?);
    let pacer: Arc<dyn Pacer> = Arc::new(TokioPacer);

    let updater = StatementUpdater::new(
        source.clone(),
        store.clone(),
        StatementProfile::for_kind(StatementKind::BalanceSheet),
    );
    let driver = BatchDriver::new(updater, source, store, pacer, config);

    let summary = driver.run(args.year, season).await?;
    if !summary.abandoned.is_empty() {
        info!("Abandoned this run: {:?}", summary.abandoned);
    }

    Ok(())
}
