mod analysis;
mod cleaning;
mod config;
mod models;
mod reconcile;
mod scrapers;
mod storage;

use anyhow::{bail, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use cleaning::{clean_records, CategoryProfile};
use config::AppConfig;
use models::{Category, Listing, Platform};
use reconcile::fuzzy::{apply_standardized_titles, STANDARDIZED_TITLE};
use reconcile::{reconcile, ReconcileOptions};
use scrapers::{build_fetcher, ScrapeParams, ScraperTrait, SelectorScraper};
use std::path::PathBuf;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "price-scout", about = "Scrape, clean and compare marketplace prices")]
struct Cli {
    /// JSON configuration file; defaults are used when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scrape one configured marketplace search into a raw CSV
    Scrape {
        #[arg(long)]
        platform: Platform,
        #[arg(long)]
        category: Category,
        /// Override the configured search terms
        #[arg(long)]
        query: Option<String>,
        #[arg(long)]
        max_pages: Option<u32>,
    },
    /// Clean raw CSVs into typed, deduplicated CSVs
    Clean {
        #[arg(long)]
        platform: Option<Platform>,
        #[arg(long)]
        category: Option<Category>,
    },
    /// Match cleaned listings across marketplaces and write price reports
    Reconcile {
        #[arg(long)]
        category: Category,
        /// Also match on similar titles
        #[arg(long)]
        fuzzy_titles: bool,
        /// Comparisons to print; the configured value when omitted
        #[arg(long)]
        top: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config = AppConfig::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Command::Scrape {
            platform,
            category,
            query,
            max_pages,
        } => run_scrape(&config, platform, category, query, max_pages).await,
        Command::Clean { platform, category } => run_clean(&config, platform, category),
        Command::Reconcile {
            category,
            fuzzy_titles,
            top,
        } => run_reconcile(&config, category, fuzzy_titles, top),
    }
}

async fn run_scrape(
    config: &AppConfig,
    platform: Platform,
    category: Category,
    query: Option<String>,
    max_pages: Option<u32>,
) -> Result<()> {
    let Some(source) = config.source(platform, category) else {
        bail!("No source configured for {} {}", platform, category);
    };

    let mut params = ScrapeParams::from_source(source);
    if let Some(q) = query {
        params.query = q;
    }
    if let Some(n) = max_pages {
        params.max_pages = n.max(1);
    }

    let fetcher = build_fetcher(source.fetcher, &config.http)?;
    let scraper = SelectorScraper::new(source.clone(), fetcher, config.http.concurrency);

    info!("Scraping {} {} for '{}'", platform, category, params.query);
    let listings = scraper.scrape(&params).await?;
    if listings.is_empty() {
        warn!("No listings scraped from {}", scraper.source_name());
        return Ok(());
    }

    let dir = storage::data_dir(&config.raw_dir, platform, category);
    let number = storage::next_scrape_number(&dir, category)?;
    let path = dir.join(storage::scrape_file_name(
        category,
        Local::now().date_naive(),
        number,
    ));
    storage::write_raw_listings(&path, &listings)?;
    info!("Saved {} listings to {}", listings.len(), path.display());
    Ok(())
}

fn run_clean(config: &AppConfig, platform: Option<Platform>, category: Option<Category>) -> Result<()> {
    let platforms = platform.map_or_else(|| Platform::ALL.to_vec(), |p| vec![p]);
    let categories = category.map_or_else(|| Category::ALL.to_vec(), |c| vec![c]);
    let mut cleaned_files = 0;

    for category in &categories {
        let profile = CategoryProfile::for_category(*category);
        for platform in &platforms {
            let raw_dir = storage::data_dir(&config.raw_dir, *platform, *category);
            let out_dir = storage::data_dir(&config.cleaned_dir, *platform, *category);

            for file in storage::csv_files(&raw_dir)? {
                let result = storage::read_records(&file).and_then(|records| {
                    let outcome =
                        clean_records(&records, &profile, *platform, &config.exchange_rates);
                    let out = out_dir.join(storage::cleaned_file_name(&file));
                    storage::write_cleaned(&out, &outcome.listings, &profile)?;
                    Ok((out, outcome.report))
                });
                match result {
                    Ok((out, report)) => {
                        info!("{} -> {}: {}", file.display(), out.display(), report);
                        cleaned_files += 1;
                    }
                    Err(e) => error!("Failed to clean {}: {:#}", file.display(), e),
                }
            }
        }
    }

    if cleaned_files == 0 {
        warn!("No raw CSV files found under {}", config.raw_dir.display());
    }
    Ok(())
}

fn load_cleaned(config: &AppConfig, profile: &CategoryProfile) -> Result<Vec<Listing>> {
    let mut listings = Vec::new();
    for platform in Platform::ALL {
        let dir = storage::data_dir(&config.cleaned_dir, platform, profile.category);
        for file in storage::csv_files(&dir)? {
            match storage::read_cleaned(&file, profile, platform) {
                Ok(loaded) => {
                    info!("Loaded {} {} listings from {}", loaded.len(), platform, file.display());
                    listings.extend(loaded);
                }
                Err(e) => warn!("Skipping {}: {:#}", file.display(), e),
            }
        }
    }
    Ok(listings)
}

fn run_reconcile(
    config: &AppConfig,
    category: Category,
    fuzzy_titles: bool,
    top: Option<usize>,
) -> Result<()> {
    let profile = CategoryProfile::for_category(category);
    let mut listings = load_cleaned(config, &profile)?;
    if listings.is_empty() {
        warn!("No cleaned {} listings to reconcile", category);
        return Ok(());
    }

    let mut options = ReconcileOptions::for_profile(&profile, &config.reconcile);
    if fuzzy_titles {
        apply_standardized_titles(&mut listings, config.reconcile.fuzzy_threshold);
        options = options.with_leading_key(STANDARDIZED_TITLE);
    }

    let groups = reconcile(&listings, &options);
    info!(
        "Reconciled {} {} listings into {} groups",
        listings.len(),
        category,
        groups.len()
    );

    for group in &groups {
        debug!("{} seen on {:?}", group.key, group.platforms());
    }

    let comparisons = analysis::compare_prices(&groups);
    let trends = analysis::price_trends(&listings, &groups, &options);

    let out_dir = config.results_dir.join(category.as_str());
    let differences = out_dir.join("price_differences.csv");
    analysis::write_comparisons(&differences, &comparisons)?;
    let trends_path = out_dir.join("price_trends.csv");
    analysis::write_trends(&trends_path, &trends)?;
    info!("💾 Saved {} and {}", differences.display(), trends_path.display());

    let n = top.unwrap_or(config.reconcile.top_n);
    for (i, c) in analysis::top_n(&comparisons, n).iter().enumerate() {
        println!("{}. {}", i + 1, c.key);
        println!(
            "   ${:.2} - ${:.2} (diff ${:.2}, {:.1}%)",
            c.min, c.max, c.price_diff, c.price_diff_pct
        );
        println!("   Cheapest on {}", c.cheapest);
        println!();
    }
    Ok(())
}
