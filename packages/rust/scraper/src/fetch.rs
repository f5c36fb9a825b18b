//! HTML fetcher for source pages.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};
use url::Url;

use drugwatch_shared::{DrugwatchError, Result, ScrapeConfig};

/// A fetched source page.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: Url,
    pub status: u16,
    pub body: String,
    /// SHA-256 of the body, hex encoded.
    pub content_hash: String,
    pub fetched_at: DateTime<Utc>,
}

/// HTTP client for source pages. One instance is shared by every source.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(config: &ScrapeConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(config.timeout)
            .build()
            .map_err(|e| DrugwatchError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            timeout: config.timeout,
        })
    }

    /// GET `url`. Transport failures, timeouts and non-2xx responses are
    /// all [`DrugwatchError::Network`].
    #[instrument(skip_all, fields(url = %url))]
    pub async fn fetch(&self, url: &Url) -> Result<FetchedPage> {
        debug!("fetching source page");

        let response = self.client.get(url.as_str()).send().await.map_err(|e| {
            if e.is_timeout() {
                DrugwatchError::Network(format!(
                    "{url}: timed out after {}s",
                    self.timeout.as_secs_f32()
                ))
            } else {
                DrugwatchError::Network(format!("{url}: {e}"))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DrugwatchError::Network(format!("{url}: HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| DrugwatchError::Network(format!("{url}: body read failed: {e}")))?;

        debug!(status = status.as_u16(), bytes = body.len(), "source page fetched");

        Ok(FetchedPage {
            url: url.clone(),
            status: status.as_u16(),
            content_hash: compute_hash(&body),
            body,
            fetched_at: Utc::now(),
        })
    }
}

/// Compute SHA-256 hash of content.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
