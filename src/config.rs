use crate::models::{Category, Platform};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// Top-level configuration, loaded from a JSON file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Root of raw scraped CSVs (`<raw_dir>/<platform>/<category>/*.csv`)
    pub raw_dir: PathBuf,
    /// Root of cleaned CSVs, same layout as `raw_dir`
    pub cleaned_dir: PathBuf,
    /// Where reconciliation reports are written
    pub results_dir: PathBuf,
    /// Currency code (`INR`, `MAD`, ...) to USD multiplier
    pub exchange_rates: HashMap<String, f64>,
    pub http: HttpConfig,
    pub reconcile: ReconcileConfig,
    pub sources: Vec<SourceConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("data/raw"),
            cleaned_dir: PathBuf::from("data/cleaned"),
            results_dir: PathBuf::from("results"),
            exchange_rates: HashMap::new(),
            http: HttpConfig::default(),
            reconcile: ReconcileConfig::default(),
            sources: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: AppConfig = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load from `path` when given, otherwise fall back to defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn source(&self, platform: Platform, category: Category) -> Option<&SourceConfig> {
        self.sources
            .iter()
            .find(|s| s.platform == platform && s.category == category)
    }
}

/// HTTP fetching behaviour shared by all scrapers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agents: Vec<String>,
    pub max_retries: u32,
    /// Linear backoff step: attempt `n` waits `n * backoff_ms`
    pub backoff_ms: u64,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Concurrent detail-page fetches
    pub concurrency: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agents: vec![
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36".to_string(),
                "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/118.0.0.0 Safari/537.36".to_string(),
            ],
            max_retries: 3,
            backoff_ms: 1000,
            min_delay_ms: 2000,
            max_delay_ms: 5000,
            concurrency: 2,
        }
    }
}

/// Cross-platform matching settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    pub min_platforms: usize,
    /// Require exactly `min_platforms` instead of at least
    pub exact: bool,
    /// When non-empty, a group must be seen on every one of these
    pub required_platforms: Vec<Platform>,
    pub fuzzy_threshold: u8,
    pub top_n: usize,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            min_platforms: 2,
            exact: false,
            required_platforms: Vec::new(),
            fuzzy_threshold: 80,
            top_n: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetcherKind {
    #[default]
    Http,
    Browser,
}

/// One scrape target: a marketplace search for one category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub platform: Platform,
    pub category: Category,
    /// Used to resolve relative product links
    pub base_url: String,
    /// Search URL with `{query}` and `{page}` placeholders
    pub search_url: String,
    pub query: String,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    #[serde(default)]
    pub fetcher: FetcherKind,
    pub selectors: SelectorConfig,
}

fn default_max_pages() -> u32 {
    1
}

/// CSS selectors for listing and detail pages
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// One element per product card on a listing page
    pub item: String,
    pub title: String,
    pub price: String,
    pub link: String,
    /// Pagination link; when set, crawling stops on a page without one
    #[serde(default)]
    pub next: Option<String>,
    /// Spec label cells on a detail page
    #[serde(default)]
    pub spec_label: Option<String>,
    /// Spec value cells, paired with labels in document order
    #[serde(default)]
    pub spec_value: Option<String>,
    /// Table rows holding a label cell and a value cell
    #[serde(default)]
    pub spec_row: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_yields_defaults() {
        let config: AppConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.raw_dir, PathBuf::from("data/raw"));
        assert_eq!(config.http.max_retries, 3);
        assert_eq!(config.http.concurrency, 2);
        assert_eq!(config.reconcile.min_platforms, 2);
        assert_eq!(config.reconcile.fuzzy_threshold, 80);
        assert!(config.exchange_rates.is_empty());
    }

    #[test]
    fn parses_source_with_selectors() {
        let json = r#"{
            "exchange_rates": { "INR": 0.0125 },
            "sources": [{
                "platform": "ebay",
                "category": "graphics_cards",
                "base_url": "https://www.ebay.com",
                "search_url": "https://www.ebay.com/sch/i.html?_nkw={query}&_pgn={page}",
                "query": "graphics card",
                "max_pages": 3,
                "selectors": {
                    "item": "div.s-item__wrapper",
                    "title": "div.s-item__title",
                    "price": "span.s-item__price",
                    "link": "a.s-item__link",
                    "spec_label": "div.ux-labels-values__labels",
                    "spec_value": "div.ux-labels-values__values"
                }
            }]
        }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.exchange_rates.get("INR"), Some(&0.0125));
        let source = config.source(Platform::Ebay, Category::GraphicsCards).unwrap();
        assert_eq!(source.max_pages, 3);
        assert_eq!(source.fetcher, FetcherKind::Http);
        assert!(config.source(Platform::Ebay, Category::Laptops).is_none());
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let result = AppConfig::load(Path::new("/nonexistent/price-scout.json"));
        assert!(result.is_err());
    }
}
