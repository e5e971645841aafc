use anyhow::{Context, Result};
use common::{Article, PolitenessConfig};
use reqwest::Client;
use std::time::Duration;

use crate::parser;

/// Source of raw feed documents. The HTTP implementation is used in production; tests and
/// tools can substitute their own.
#[async_trait::async_trait]
pub trait FeedFetcher: Send + Sync {
    /// Fetch the raw body of a feed URL. Non-2xx responses are errors.
    async fn fetch(&self, url: &str) -> Result<String>;

    /// Upper bound on one `fetch` call, retries included. Callers enforce it.
    fn deadline(&self) -> Duration;
}

/// reqwest-backed fetcher sharing one connection pool across all sources.
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
    max_retries: u32,
}

impl HttpFetcher {
    pub fn new(politeness: &PolitenessConfig) -> Result<Self> {
        let timeout = politeness.fetch_timeout();
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(politeness.user_agent())
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            client,
            timeout,
            max_retries: politeness.max_retries(),
        })
    }
}

#[async_trait::async_trait]
impl FeedFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let parsed = url::Url::parse(url).with_context(|| format!("invalid feed URL: {}", url))?;
        let host = parsed.host_str().unwrap_or("unknown").to_string();

        let max_attempts = self.max_retries + 1;
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                let backoff = Duration::from_secs(2u64.pow(attempt - 2)); // 1s, 2s, 4s...
                tracing::info!("Retrying feed fetch for {} (attempt {}/{}) after {:?}...", url, attempt, max_attempts, backoff);
                tokio::time::sleep(backoff).await;
            }

            match self.client.get(parsed.clone()).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        // Content-Type is ignored; the parser sniffs the document structure
                        let bytes = response.bytes().await.context("failed to read response body")?;
                        tracing::debug!(host = %host, bytes = bytes.len(), "fetched feed");
                        return Ok(String::from_utf8_lossy(&bytes).into_owned());
                    } else if status.is_server_error() { // 5xx
                        last_error = Some(anyhow::anyhow!("server error: {}", status));
                        continue; // Retry
                    } else if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        last_error = Some(anyhow::anyhow!("rate limited: {}", status));
                        continue; // Retry
                    } else {
                        // Client error (4xx) - likely permanent, don't retry
                        return Err(anyhow::anyhow!("feed fetch failed with status: {}", status));
                    }
                }
                Err(e) => {
                    // Network error - retry
                    last_error = Some(anyhow::Error::new(e).context("network error during fetch"));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("unknown error after retries")))
    }

    fn deadline(&self) -> Duration {
        // Every attempt may use the full request timeout, plus the 1s, 2s, 4s... backoffs
        let attempts = self.max_retries + 1;
        let backoff_secs: u64 = (2..=attempts).map(|a| 2u64.pow(a - 2)).sum();
        self.timeout * attempts + Duration::from_secs(backoff_secs)
    }
}

/// Fetches a feed with the given fetcher and parses it into articles.
pub async fn fetch_and_parse_feed(
    fetcher: &dyn FeedFetcher,
    url: &str,
    source_name: &str,
) -> Result<Vec<Article>> {
    let body = tokio::time::timeout(fetcher.deadline(), fetcher.fetch(url))
        .await
        .context("feed fetch timed out")??;
    Ok(parser::parse_feed(&body, source_name))
}
