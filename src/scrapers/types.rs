use crate::config::SourceConfig;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What to search for in one scrape run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeParams {
    /// Search terms substituted into the `{query}` placeholder
    pub query: String,
    /// Listing pages to crawl before stopping
    pub max_pages: u32,
}

impl Default for ScrapeParams {
    fn default() -> Self {
        Self {
            query: String::new(),
            max_pages: 1,
        }
    }
}

impl ScrapeParams {
    pub fn from_source(source: &SourceConfig) -> Self {
        Self {
            query: source.query.clone(),
            max_pages: source.max_pages.max(1),
        }
    }
}

/// One product as scraped, before any cleaning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawListing {
    pub title: String,
    /// Price text exactly as shown on the page
    pub price: String,
    pub url: String,
    /// Detail-page label/value pairs
    pub specs: BTreeMap<String, String>,
    pub collected_at: NaiveDateTime,
}
