use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client, StatusCode};
use std::time::Duration;

use super::models::FeedEntry;
use super::parser::parse_entries;
use crate::config::AppConfig;
use crate::{Error, Result};

const MAX_FEED_BYTES: usize = 5 * 1024 * 1024;
const MAX_RETRIES: u32 = 3;
const INITIAL_RETRY_DELAY_MS: u64 = 500;
const DEFAULT_USER_AGENT: &str = concat!("rsshub/", env!("CARGO_PKG_VERSION"));

/// Anything that can turn a feed URL into raw entries.
///
/// The worker pool only sees this trait; [`FeedFetcher`] is the HTTP
/// implementation.
#[async_trait]
pub trait FeedSource: Send + Sync + 'static {
    async fn fetch_entries(&self, url: &str) -> Result<Vec<FeedEntry>>;
}

/// HTTP feed fetcher with retry and a body size cap
pub struct FeedFetcher {
    client: Client,
}

impl FeedFetcher {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = Self::build_client(config.fetch.request_timeout_secs)?;
        Ok(Self { client })
    }

    fn build_client(timeout_secs: u64) -> Result<Client> {
        Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(Error::Http)
    }

    fn build_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "application/rss+xml,application/atom+xml,application/xml;q=0.9,text/xml;q=0.8,*/*;q=0.5",
            ),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
        headers
    }

    /// Fetch with retry and exponential backoff on 429/503 and transport errors
    async fn fetch_with_retry(&self, url: &str) -> Result<(StatusCode, Bytes)> {
        let mut last_error = None;
        let mut delay_ms = INITIAL_RETRY_DELAY_MS;

        for attempt in 0..MAX_RETRIES {
            tracing::debug!(url, attempt = attempt + 1, "Fetching feed");

            match self.client.get(url).headers(Self::build_headers()).send().await {
                Ok(response) => {
                    let status = response.status();

                    if status == StatusCode::TOO_MANY_REQUESTS
                        || status == StatusCode::SERVICE_UNAVAILABLE
                    {
                        tracing::warn!("Received {} for {}, retrying after {}ms", status, url, delay_ms);
                        last_error = Some(Error::FeedParse(format!("HTTP {} for URL: {}", status, url)));
                    } else {
                        match response.bytes().await {
                            Ok(bytes) => return Ok((status, bytes)),
                            Err(e) => {
                                tracing::warn!("Failed to read response body from {}: {}", url, e);
                                last_error = Some(Error::Http(e));
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!("Request failed for {} (attempt {}): {}", url, attempt + 1, e);
                    last_error = Some(Error::Http(e));
                }
            }

            if attempt < MAX_RETRIES - 1 {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                delay_ms *= 2;
            }
        }

        Err(last_error.unwrap_or_else(|| {
            Error::FeedParse(format!("Failed to fetch URL after {} retries: {}", MAX_RETRIES, url))
        }))
    }

    fn ensure_content_size(size: usize, url: &str) -> Result<()> {
        if size > MAX_FEED_BYTES {
            return Err(Error::FeedParse(format!(
                "Feed too large ({} bytes) for URL: {}",
                size, url
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl FeedSource for FeedFetcher {
    async fn fetch_entries(&self, url: &str) -> Result<Vec<FeedEntry>> {
        url::Url::parse(url)?;

        let (status, content) = self.fetch_with_retry(url).await?;
        Self::ensure_content_size(content.len(), url)?;

        if !status.is_success() {
            return Err(Error::FeedParse(format!("HTTP {} for URL: {}", status, url)));
        }

        parse_entries(&content)
    }
}
