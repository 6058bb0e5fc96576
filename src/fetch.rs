use crate::error::CrawlError;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use std::time::Instant;
use tokio::time::Duration;
use tracing::{debug, error, warn};

pub const SITE_ROOT: &str = "https://www.ddproperty.com/";

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                          AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Pause after the cookie warm-up request.
const WARMUP_DELAY: Duration = Duration::from_secs(2);
/// Courtesy delay between successive page fetches.
const REQUEST_DELAY: Duration = Duration::from_secs(2);

fn spoofed_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        "Accept",
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(
        "Accept-Language",
        HeaderValue::from_static("en-US,en;q=0.9"),
    );
    headers.insert("Referer", HeaderValue::from_static(SITE_ROOT));
    headers.insert(
        "Origin",
        HeaderValue::from_static("https://www.ddproperty.com"),
    );
    headers.insert(
        "sec-ch-ua",
        HeaderValue::from_static(
            r#""Not_A Brand";v="8", "Chromium";v="120", "Google Chrome";v="120""#,
        ),
    );
    headers.insert("sec-ch-ua-mobile", HeaderValue::from_static("?0"));
    headers.insert("sec-ch-ua-platform", HeaderValue::from_static(r#""macOS""#));
    headers.insert("Sec-Fetch-Dest", HeaderValue::from_static("document"));
    headers.insert("Sec-Fetch-Mode", HeaderValue::from_static("navigate"));
    headers.insert("Sec-Fetch-Site", HeaderValue::from_static("same-origin"));
    headers
}

/// HTTP GET with a fixed Chrome-on-macOS fingerprint and a warmed-up
/// cookie session. Requests are spaced by a courtesy delay.
pub struct PageFetcher {
    client: Client,
    site_root: String,
    warmed_up: bool,
    last_request: Option<Instant>,
}

impl PageFetcher {
    pub fn new() -> Result<PageFetcher, CrawlError> {
        Self::with_site_root(SITE_ROOT)
    }

    pub fn with_site_root(site_root: &str) -> Result<PageFetcher, CrawlError> {
        let client = Client::builder()
            .cookie_store(true)
            .user_agent(USER_AGENT)
            .default_headers(spoofed_headers())
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(PageFetcher {
            client,
            site_root: site_root.to_string(),
            warmed_up: false,
            last_request: None,
        })
    }

    /// Fetch one page as text. A non-success status or a network failure
    /// is logged and propagated; this is the one failure mode that aborts
    /// a scrape.
    pub async fn fetch(&mut self, url: &str) -> Result<String, CrawlError> {
        if !self.warmed_up {
            self.warm_up().await?;
        }

        if let Some(last_request) = self.last_request.take() {
            let elapsed = last_request.elapsed();
            if elapsed < REQUEST_DELAY {
                tokio::time::sleep(REQUEST_DELAY - elapsed).await;
            }
        }

        debug!("Fetch {}", url);
        let response = self.client.get(url).send().await.map_err(|e| {
            error!("Request to {} failed: {}", url, e);
            e
        })?;
        self.last_request = Some(Instant::now());

        let status = response.status();
        if !status.is_success() {
            warn!("Unexpected status {} from {}", status, url);
            return Err(CrawlError::BadStatus {
                status,
                url: url.to_string(),
            });
        }

        Ok(response.text().await?)
    }

    /// One GET against the site root to pick up session cookies, then a
    /// fixed pause before the first real request.
    async fn warm_up(&mut self) -> Result<(), CrawlError> {
        debug!("Warming up session at {}", self.site_root);
        self.client.get(&self.site_root).send().await.map_err(|e| {
            error!("Warm-up request failed: {}", e);
            e
        })?;
        tokio::time::sleep(WARMUP_DELAY).await;
        self.warmed_up = true;
        Ok(())
    }
}
