pub mod browser;
pub mod http;
pub mod selector;
pub mod traits;
pub mod types;

pub use browser::BrowserFetcher;
pub use http::HttpFetcher;
pub use selector::SelectorScraper;
pub use traits::{PageFetcher, ScraperTrait};
pub use types::{RawListing, ScrapeParams};

use crate::config::{FetcherKind, HttpConfig};
use anyhow::Result;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::sync::Arc;
use std::time::Duration;

const BROWSER_SETTLE: Duration = Duration::from_secs(3);

static CAPTCHA_MARKERS: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(
        "iframe[src*='captcha'], form[action*='captcha'], form[action*='Captcha'], #captcha-form",
    )
    .unwrap()
});

/// Whether the page is a bot challenge instead of content
pub fn is_captcha_page(html: &str) -> bool {
    Html::parse_document(html)
        .select(&CAPTCHA_MARKERS)
        .next()
        .is_some()
}

pub fn build_fetcher(kind: FetcherKind, http: &HttpConfig) -> Result<Arc<dyn PageFetcher>> {
    Ok(match kind {
        FetcherKind::Http => Arc::new(HttpFetcher::new(http.clone())?),
        FetcherKind::Browser => Arc::new(BrowserFetcher::new(BROWSER_SETTLE)?),
    })
}
