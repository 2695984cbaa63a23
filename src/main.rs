use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use repack_watcher::config::AppConfig;
use repack_watcher::extractor::PriceExtractor;
use repack_watcher::identity::IdentityResolver;
use repack_watcher::marketplace::MarketplaceCatalog;
use repack_watcher::price_fetcher::PriceFetcher;
use repack_watcher::scraper::ChromeLauncher;
use repack_watcher::store::JsonFileStore;
use repack_watcher::utils::logging;
use repack_watcher::PriceChecker;

#[derive(Parser)]
#[command(name = "repack-watcher", version, about = "Watches purchased items for price drops before the return deadline")]
struct Cli {
    /// Directory holding default.toml and per-environment overrides
    #[arg(long, default_value = "config", global = true)]
    config_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one price check over every tracked item
    Check {
        /// Tracked items JSON file (overrides store.path)
        #[arg(long)]
        store: Option<PathBuf>,
    },
    /// Resolve a product URL to its item id and marketplace
    Resolve { url: String },
    /// Fetch the current price of one item through the browser
    Price {
        item_id: String,
        #[arg(long)]
        marketplace: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = AppConfig::load(&cli.config_dir).context("Failed to load configuration")?;
    let _guard = logging::init(&config.logging);

    match cli.command {
        Command::Check { store } => check(&config, store).await,
        Command::Resolve { url } => resolve(&config, &url),
        Command::Price { item_id, marketplace } => price(&config, &item_id, marketplace).await,
    }
}

async fn check(config: &AppConfig, store: Option<PathBuf>) -> Result<()> {
    config.require_telegram()?;

    let path = store.unwrap_or_else(|| PathBuf::from(&config.store.path));
    info!("Starting Repack Watcher check with store {}", path.display());

    let store = Arc::new(JsonFileStore::new(path));
    let checker = PriceChecker::from_config(config, store)?;
    let summary = checker.run().await;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn resolve(config: &AppConfig, url: &str) -> Result<()> {
    let resolver = IdentityResolver::new(MarketplaceCatalog::from_config(&config.marketplaces));
    let item = resolver.resolve(url)?;

    println!("Item id:     {}", item.item_id);
    println!("Marketplace: {}", item.marketplace);
    println!("URL:         {}", resolver.catalog().product_url(&item.item_id, &item.marketplace));
    Ok(())
}

async fn price(config: &AppConfig, item_id: &str, marketplace: Option<String>) -> Result<()> {
    let catalog = MarketplaceCatalog::from_config(&config.marketplaces);
    let marketplace = marketplace.unwrap_or_else(|| catalog.default_code().to_string());
    let fetcher = PriceFetcher::new(
        Arc::new(ChromeLauncher::from_config(&config.scraper)),
        PriceExtractor::new(&config.scraper.price_selectors)?,
        catalog,
        config.scraper.selector_timeout(),
    );

    match fetcher.fetch_one_price(item_id, &marketplace).await? {
        Some(price) => println!("{}@{}: €{:.2}", item_id, marketplace, price),
        None => println!("{}@{}: price not available", item_id, marketplace),
    }
    Ok(())
}
