use crate::scrapers::is_captcha_page;
use crate::scrapers::traits::PageFetcher;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

/// Fetcher for JavaScript-rendered pages using headless Chrome
pub struct BrowserFetcher {
    browser: Browser,
    /// Extra time for client-side rendering after navigation
    settle: Duration,
}

impl BrowserFetcher {
    /// Launch a headless browser shared by every fetch
    pub fn new(settle: Duration) -> Result<Self> {
        info!("Launching headless Chrome...");

        let options = LaunchOptions::default_builder()
            .headless(true)
            .idle_browser_timeout(Duration::from_secs(300))
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(options).context("Failed to launch Chrome browser")?;

        Ok(Self { browser, settle })
    }
}

fn read_rendered(tab: &Tab, url: &str, settle: Duration) -> Result<String> {
    tab.navigate_to(url)
        .with_context(|| format!("Failed to navigate to {}", url))?;
    tab.wait_until_navigated()?;
    thread::sleep(settle);

    // Accept cookies if present
    let _ = tab.evaluate(
        r#"
        const button = document.querySelector('button[id*="accept"], button[id*="consent"]');
        if (button) button.click();
        "#,
        false,
    );

    tab.get_content()
        .with_context(|| format!("Failed to read rendered HTML of {}", url))
}

/// Render `url` in a fresh tab. The tab is closed whether or not rendering succeeded.
fn render_page(browser: &Browser, url: &str, settle: Duration) -> Result<String> {
    let tab = browser.new_tab().context("Failed to open browser tab")?;
    let rendered = read_rendered(&tab, url, settle);
    if let Err(e) = tab.close(true) {
        debug!("Failed to close tab for {}: {:#}", url, e);
    }
    let html = rendered?;

    if is_captcha_page(&html) {
        bail!("CAPTCHA challenge rendered for {}", url);
    }
    debug!("Rendered {} ({} bytes)", url, html.len());
    Ok(html)
}

#[async_trait]
impl PageFetcher for BrowserFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let browser = self.browser.clone();
        let settle = self.settle;
        let url = url.to_string();

        tokio::task::spawn_blocking(move || render_page(&browser, &url, settle))
            .await
            .context("Browser task panicked")?
    }
}
