use crate::config::HttpConfig;
use crate::scrapers::is_captcha_page;
use crate::scrapers::traits::PageFetcher;
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::Client;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

const FALLBACK_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Plain HTTP fetcher with user-agent rotation, politeness delays and retries
pub struct HttpFetcher {
    client: Client,
    config: HttpConfig,
}

impl HttpFetcher {
    pub fn new(config: HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, config })
    }

    fn pick_user_agent(&self) -> String {
        self.config
            .user_agents
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_else(|| FALLBACK_USER_AGENT.to_string())
    }

    async fn fetch_once(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, self.pick_user_agent())
            .header(
                ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;

        let status = response.status();
        if !status.is_success() {
            bail!("{} returned status {}", url, status);
        }

        let body = response
            .text()
            .await
            .with_context(|| format!("Failed to read body of {}", url))?;
        if is_captcha_page(&body) {
            bail!("CAPTCHA challenge served for {}", url);
        }
        Ok(body)
    }
}

/// Random pause in `[min_ms, max_ms]`
pub fn politeness_delay(min_ms: u64, max_ms: u64) -> Duration {
    if max_ms <= min_ms {
        return Duration::from_millis(min_ms);
    }
    Duration::from_millis(rand::thread_rng().gen_range(min_ms..=max_ms))
}

/// Wait after failed attempt `attempt` (1-based): `attempt * backoff_ms`
pub fn backoff_delay(attempt: u32, backoff_ms: u64) -> Duration {
    Duration::from_millis(backoff_ms * u64::from(attempt))
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let attempts = self.config.max_retries.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            sleep(politeness_delay(self.config.min_delay_ms, self.config.max_delay_ms)).await;
            debug!("GET {} (attempt {}/{})", url, attempt, attempts);

            match self.fetch_once(url).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    warn!("Attempt {}/{} for {} failed: {:#}", attempt, attempts, url, e);
                    last_error = Some(e);
                }
            }

            if attempt < attempts {
                sleep(backoff_delay(attempt, self.config.backoff_ms)).await;
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow!("No attempts made"))
            .context(format!("Giving up on {} after {} attempts", url, attempts)))
    }
}
