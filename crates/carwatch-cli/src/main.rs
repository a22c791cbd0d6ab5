use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use carwatch_core::AppConfig;
use carwatch_db::PgListingStore;
use carwatch_scraper::{FetchPolicy, HttpFetcher, Pipeline, PipelineConfig};

#[derive(Debug, Parser)]
#[command(name = "carwatch-cli")]
#[command(about = "One-off carwatch operations")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create the listings table if it does not exist.
    InitDb,
    /// Crawl once and store new listings.
    Scrape {
        /// Stop after this many search pages (0 = no limit).
        #[arg(long)]
        max_pages: Option<usize>,
    },
    /// Write a pg_dump archive into the dumps directory.
    Dump,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let mut config = carwatch_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match cli.command {
        Commands::InitDb => {
            connect_store(&config).await?;
            println!("car_listings is ready");
        }
        Commands::Scrape { max_pages } => {
            if let Some(max_pages) = max_pages {
                tracing::info!(max_pages, "cli: page limit overridden");
                config.scraper.max_pages = max_pages;
            }
            run_scrape(&config).await?;
        }
        Commands::Dump => {
            let path = carwatch_db::create_dump(&config.database_url, &config.dumps_dir)
                .await
                .inspect_err(|e| tracing::error!(error = %e, "cli: dump failed"))?;
            tracing::info!(path = %path.display(), "cli: dump written");
            println!("dump written to {}", path.display());
        }
    }

    Ok(())
}

async fn connect_store(config: &AppConfig) -> anyhow::Result<PgListingStore> {
    let pool_config = carwatch_db::PoolConfig::from_app_config(config);
    let pool = carwatch_db::connect_pool(&config.database_url, pool_config).await?;
    let store = PgListingStore::new(pool);
    store.init().await?;
    Ok(store)
}

async fn run_scrape(config: &AppConfig) -> anyhow::Result<()> {
    let store = connect_store(config).await?;
    let fetcher = HttpFetcher::new(FetchPolicy::from_settings(&config.scraper))?;
    let summary = Pipeline::new(&fetcher, &store, PipelineConfig::from_settings(&config.scraper))
        .run()
        .await
        .inspect_err(|e| tracing::error!(error = %e, "cli: scrape failed"))?;

    if summary.dropped > 0 {
        tracing::warn!(dropped = summary.dropped, "cli: some listings were dropped");
    }
    tracing::info!(
        pages = summary.pages,
        stored = summary.stored,
        flushes = summary.flushes,
        "cli: scrape finished"
    );
    println!(
        "pages: {}  discovered: {}  stored: {}  dropped: {}  skipped (known): {}",
        summary.pages, summary.discovered, summary.stored, summary.dropped, summary.skipped_known
    );
    Ok(())
}
