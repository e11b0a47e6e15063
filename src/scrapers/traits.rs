use crate::scrapers::types::{RawListing, ScrapeParams};
use anyhow::Result;
use async_trait::async_trait;

/// Common trait for all marketplace scrapers
#[async_trait]
pub trait ScraperTrait: Send + Sync {
    /// Scrape listings for the given search
    async fn scrape(&self, params: &ScrapeParams) -> Result<Vec<RawListing>>;

    /// Get the name of the scraper source
    fn source_name(&self) -> &'static str;
}

/// Turns a URL into page HTML
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}
