use crate::config::{SelectorConfig, SourceConfig};
use crate::scrapers::traits::{PageFetcher, ScraperTrait};
use crate::scrapers::types::{RawListing, ScrapeParams};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{Local, NaiveDateTime};
use futures::future::join_all;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// A product card from a search results page
#[derive(Debug, Clone, PartialEq)]
pub struct ListingCard {
    pub title: String,
    pub price: String,
    pub link: Option<String>,
}

fn parse_selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("Invalid selector '{}': {:?}", css, e))
}

fn element_text(element: ElementRef) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_text(scope: ElementRef, selector: &Selector) -> String {
    scope.select(selector).next().map(element_text).unwrap_or_default()
}

/// Product cards on a listing page. Cards without a title are skipped.
pub fn extract_listings(html: &str, selectors: &SelectorConfig) -> Result<Vec<ListingCard>> {
    let item = parse_selector(&selectors.item)?;
    let title = parse_selector(&selectors.title)?;
    let price = parse_selector(&selectors.price)?;
    let link = parse_selector(&selectors.link)?;

    let document = Html::parse_document(html);
    let cards = document
        .select(&item)
        .filter_map(|card| {
            let title_text = first_text(card, &title);
            if title_text.is_empty() {
                return None;
            }
            let href = card
                .select(&link)
                .next()
                .and_then(|a| a.value().attr("href"))
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty());
            Some(ListingCard {
                title: title_text,
                price: first_text(card, &price),
                link: href,
            })
        })
        .collect();
    Ok(cards)
}

/// Whether the page links to a following results page
pub fn has_next_page(html: &str, selectors: &SelectorConfig) -> Result<bool> {
    match &selectors.next {
        Some(css) => {
            let next = parse_selector(css)?;
            Ok(Html::parse_document(html).select(&next).next().is_some())
        }
        None => Ok(true),
    }
}

fn clean_label(label: &str) -> String {
    label.trim().trim_end_matches(':').trim().to_string()
}

/// Label/value pairs from a product detail page.
///
/// With `spec_row`, each row contributes its label and value cells (`th`/`td`
/// unless `spec_label`/`spec_value` say otherwise). Without it, label and value
/// cells are paired in document order. The first occurrence of a label wins.
pub fn extract_specs(html: &str, selectors: &SelectorConfig) -> Result<BTreeMap<String, String>> {
    let document = Html::parse_document(html);
    let label = parse_selector(selectors.spec_label.as_deref().unwrap_or("th"))?;
    let value = parse_selector(selectors.spec_value.as_deref().unwrap_or("td"))?;

    let pairs: Vec<(String, String)> = match &selectors.spec_row {
        Some(row_css) => {
            let row = parse_selector(row_css)?;
            document
                .select(&row)
                .filter_map(|r| {
                    let l = r.select(&label).next().map(element_text)?;
                    let v = r.select(&value).next().map(element_text)?;
                    Some((l, v))
                })
                .collect()
        }
        None if selectors.spec_label.is_some() && selectors.spec_value.is_some() => document
            .select(&label)
            .map(element_text)
            .zip(document.select(&value).map(element_text))
            .collect(),
        None => Vec::new(),
    };

    let mut specs = BTreeMap::new();
    for (l, v) in pairs {
        let l = clean_label(&l);
        if !l.is_empty() {
            specs.entry(l).or_insert(v);
        }
    }
    Ok(specs)
}

/// Absolute form of `link` relative to `base`
pub fn resolve_link(base: &str, link: &str) -> Option<String> {
    let base = Url::parse(base).ok()?;
    base.join(link).ok().map(String::from)
}

/// Fill the `{query}` and `{page}` placeholders of a search URL.
/// Query words are percent-encoded and joined with `+`.
pub fn search_url(template: &str, query: &str, page: u32) -> String {
    let encoded = query
        .split_whitespace()
        .map(|word| urlencoding::encode(word).into_owned())
        .collect::<Vec<_>>()
        .join("+");
    template
        .replace("{query}", &encoded)
        .replace("{page}", &page.to_string())
}

/// Configurable scraper for one marketplace and category
pub struct SelectorScraper {
    source: SourceConfig,
    fetcher: Arc<dyn PageFetcher>,
    concurrency: usize,
}

impl SelectorScraper {
    pub fn new(source: SourceConfig, fetcher: Arc<dyn PageFetcher>, concurrency: usize) -> Self {
        Self {
            source,
            fetcher,
            concurrency: concurrency.max(1),
        }
    }

    /// Crawl search result pages in order until `max_pages`, an empty page, or no next link
    async fn collect_cards(&self, params: &ScrapeParams) -> Result<Vec<(ListingCard, NaiveDateTime)>> {
        let mut cards = Vec::new();

        for page in 1..=params.max_pages {
            let url = search_url(&self.source.search_url, &params.query, page);
            info!("Fetching {} listing page {}: {}", self.source_name(), page, url);

            let html = match self.fetcher.fetch(&url).await {
                Ok(html) => html,
                Err(e) => {
                    warn!("Skipping listing page {}: {:#}", url, e);
                    continue;
                }
            };
            let collected_at = Local::now().naive_local();

            let page_cards = extract_listings(&html, &self.source.selectors)?;
            if page_cards.is_empty() {
                info!("No listings on page {}, stopping", page);
                break;
            }
            debug!("Found {} cards on page {}", page_cards.len(), page);
            cards.extend(page_cards.into_iter().map(|c| (c, collected_at)));

            if !has_next_page(&html, &self.source.selectors)? {
                break;
            }
        }
        Ok(cards)
    }

    async fn fetch_details(
        &self,
        card: ListingCard,
        collected_at: NaiveDateTime,
        semaphore: Arc<Semaphore>,
    ) -> Result<RawListing> {
        let url = card
            .link
            .as_deref()
            .and_then(|l| resolve_link(&self.source.base_url, l))
            .unwrap_or_default();

        let mut specs = BTreeMap::new();
        if !url.is_empty() && self.has_spec_selectors() {
            let _permit = semaphore.acquire_owned().await?;
            match self.fetcher.fetch(&url).await {
                Ok(html) => specs = extract_specs(&html, &self.source.selectors)?,
                Err(e) => warn!("No details for {}: {:#}", url, e),
            }
        }

        Ok(RawListing {
            title: card.title,
            price: card.price,
            url,
            specs,
            collected_at,
        })
    }

    fn has_spec_selectors(&self) -> bool {
        let s = &self.source.selectors;
        s.spec_row.is_some() || (s.spec_label.is_some() && s.spec_value.is_some())
    }
}

#[async_trait]
impl ScraperTrait for SelectorScraper {
    async fn scrape(&self, params: &ScrapeParams) -> Result<Vec<RawListing>> {
        let cards = self.collect_cards(params).await?;
        info!("Collected {} cards, fetching details", cards.len());

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let tasks = cards
            .into_iter()
            .map(|(card, at)| self.fetch_details(card, at, semaphore.clone()));

        let mut listings = Vec::new();
        for result in join_all(tasks).await {
            match result {
                Ok(listing) => listings.push(listing),
                Err(e) => warn!("Dropping listing: {:#}", e),
            }
        }
        info!("Scraped {} listings from {}", listings.len(), self.source_name());
        Ok(listings)
    }

    fn source_name(&self) -> &'static str {
        self.source.platform.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FetcherKind;
    use crate::models::{Category, Platform};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const LISTING_PAGE: &str = r#"
        <html><body>
          <ul>
            <li class="item">
              <h3 class="title">MSI GeForce   RTX 3060 Ventus</h3>
              <span class="price">$289.99</span>
              <a class="link" href="/itm/1">view</a>
            </li>
            <li class="item">
              <h3 class="title">Sapphire Pulse RX 6600</h3>
              <span class="price">$199.00</span>
              <a class="link" href="https://shop.example.com/itm/2">view</a>
            </li>
            <li class="item"><span class="price">$5.00</span></li>
          </ul>
          <a class="next" href="?page=2">Next</a>
        </body></html>
    "#;

    const DETAIL_PAGE: &str = r#"
        <table>
          <tr class="spec"><th>Memory Size:</th><td>12 GB</td></tr>
          <tr class="spec"><th>Memory Type</th><td>GDDR6</td></tr>
          <tr class="spec"><th>Memory Type</th><td>GDDR5</td></tr>
          <tr class="spec"><th>Orphan</th></tr>
        </table>
    "#;

    fn selectors() -> SelectorConfig {
        SelectorConfig {
            item: "li.item".into(),
            title: ".title".into(),
            price: ".price".into(),
            link: "a.link".into(),
            next: Some("a.next".into()),
            spec_label: None,
            spec_value: None,
            spec_row: Some("tr.spec".into()),
        }
    }

    fn source() -> SourceConfig {
        SourceConfig {
            platform: Platform::Ebay,
            category: Category::GraphicsCards,
            base_url: "https://shop.example.com/".into(),
            search_url: "https://shop.example.com/search?q={query}&page={page}".into(),
            query: "graphics card".into(),
            max_pages: 3,
            fetcher: FetcherKind::Http,
            selectors: selectors(),
        }
    }

    /// Serves canned pages; anything else is an error
    struct FixtureFetcher(HashMap<String, String>);

    #[async_trait]
    impl PageFetcher for FixtureFetcher {
        async fn fetch(&self, url: &str) -> Result<String> {
            self.0
                .get(url)
                .cloned()
                .ok_or_else(|| anyhow!("unexpected url {}", url))
        }
    }

    #[test]
    fn extracts_cards_with_titles() {
        let cards = extract_listings(LISTING_PAGE, &selectors()).unwrap();
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].title, "MSI GeForce RTX 3060 Ventus");
        assert_eq!(cards[0].price, "$289.99");
        assert_eq!(cards[0].link.as_deref(), Some("/itm/1"));
        assert!(has_next_page(LISTING_PAGE, &selectors()).unwrap());
        assert!(!has_next_page("<p>end</p>", &selectors()).unwrap());
    }

    #[test]
    fn extracts_spec_rows_first_label_wins() {
        let specs = extract_specs(DETAIL_PAGE, &selectors()).unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs["Memory Size"], "12 GB");
        assert_eq!(specs["Memory Type"], "GDDR6");
    }

    #[test]
    fn pairs_label_and_value_cells_without_rows() {
        let html = r#"<dl><dt>Brand</dt><dd>Acer</dd><dt>Refresh Rate</dt><dd>144 Hz</dd></dl>"#;
        let config = SelectorConfig {
            spec_row: None,
            spec_label: Some("dt".into()),
            spec_value: Some("dd".into()),
            ..selectors()
        };
        let specs = extract_specs(html, &config).unwrap();
        assert_eq!(specs["Brand"], "Acer");
        assert_eq!(specs["Refresh Rate"], "144 Hz");
    }

    #[test]
    fn builds_urls() {
        assert_eq!(
            search_url("https://x.com/s?k={query}&p={page}", "gaming  laptop", 2),
            "https://x.com/s?k=gaming+laptop&p=2"
        );
        assert_eq!(
            search_url("https://x.com/s?k={query}&p={page}", "M&M #1 100% a+b", 1),
            "https://x.com/s?k=M%26M+%231+100%25+a%2Bb&p=1"
        );
        assert_eq!(
            resolve_link("https://x.com/a/", "/itm/1").as_deref(),
            Some("https://x.com/itm/1")
        );
        assert_eq!(
            resolve_link("https://x.com/", "https://y.com/p").as_deref(),
            Some("https://y.com/p")
        );
        assert!(extract_listings("<p></p>", &SelectorConfig { item: "[".into(), ..selectors() }).is_err());
    }

    #[tokio::test]
    async fn scrapes_pages_until_empty_and_fetches_details() {
        let pages = HashMap::from([
            (
                "https://shop.example.com/search?q=graphics+card&page=1".to_string(),
                LISTING_PAGE.to_string(),
            ),
            (
                "https://shop.example.com/search?q=graphics+card&page=2".to_string(),
                "<html><body><ul></ul></body></html>".to_string(),
            ),
            ("https://shop.example.com/itm/1".to_string(), DETAIL_PAGE.to_string()),
        ]);
        let scraper = SelectorScraper::new(source(), Arc::new(FixtureFetcher(pages)), 2);
        let params = ScrapeParams::from_source(&source());

        let listings = scraper.scrape(&params).await.unwrap();

        assert_eq!(scraper.source_name(), "ebay");
        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].url, "https://shop.example.com/itm/1");
        assert_eq!(listings[0].specs["Memory Size"], "12 GB");
        // detail fetch failed, listing kept without specs
        assert_eq!(listings[1].url, "https://shop.example.com/itm/2");
        assert!(listings[1].specs.is_empty());
    }

    /// Tracks how many detail fetches run at once
    #[derive(Default)]
    struct CountingFetcher {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl PageFetcher for CountingFetcher {
        async fn fetch(&self, url: &str) -> Result<String> {
            if url.contains("/search") {
                let cards: String = (1..=6)
                    .map(|i| {
                        format!(
                            r#"<li class="item"><h3 class="title">Card {i}</h3><a class="link" href="/itm/{i}">view</a></li>"#
                        )
                    })
                    .collect();
                return Ok(format!("<ul>{}</ul>", cards));
            }
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(DETAIL_PAGE.to_string())
        }
    }

    #[tokio::test]
    async fn detail_fetches_respect_concurrency_limit() {
        let fetcher = Arc::new(CountingFetcher::default());
        let scraper = SelectorScraper::new(source(), fetcher.clone(), 2);
        let params = ScrapeParams::from_source(&source());

        let listings = scraper.scrape(&params).await.unwrap();

        assert_eq!(listings.len(), 6);
        assert!(listings.iter().all(|l| l.specs["Memory Type"] == "GDDR6"));
        assert_eq!(fetcher.peak.load(Ordering::SeqCst), 2);
    }
}
