//! Per-source retrieval with a hard deadline and error containment.

use super::parse::{ParseError, parse_feed};
use crate::models::{FeedSource, RawEntry};
use reqwest::Client;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

const USER_AGENT: &str = concat!("feed_digest/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server answered {0}")]
    Status(reqwest::StatusCode),
    #[error("malformed feed: {0}")]
    Parse(#[from] ParseError),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Retrieves and parses one feed.
///
/// Implementations report failures through [`FetchError`]; turning them into
/// an empty result is the job of [`fetch_source`].
pub trait FetchFeed {
    async fn fetch(&self, source: &FeedSource) -> Result<Vec<RawEntry>, FetchError>;
}

/// HTTP fetcher backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Build a client whose every request is bounded by `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl FetchFeed for HttpFetcher {
    #[instrument(level = "debug", skip_all, fields(source = %source.name, url = %source.url))]
    async fn fetch(&self, source: &FeedSource) -> Result<Vec<RawEntry>, FetchError> {
        let response = self.client.get(&source.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }
        let body = response.bytes().await?;
        debug!(bytes = body.len(), "Downloaded feed");
        Ok(parse_feed(&body)?)
    }
}

/// Fetch one source, never failing.
///
/// The whole call is capped at `timeout` regardless of what the fetcher does
/// internally, and only the first `limit` entries of the feed are returned.
/// Any failure is logged and becomes an empty list.
#[instrument(level = "info", skip_all, fields(source = %source.name))]
pub async fn fetch_source<F: FetchFeed>(
    fetcher: &F,
    source: &FeedSource,
    limit: usize,
    timeout: Duration,
) -> Vec<RawEntry> {
    let t0 = Instant::now();
    let result = match tokio::time::timeout(timeout, fetcher.fetch(source)).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout(timeout)),
    };
    let elapsed_ms = t0.elapsed().as_millis() as u64;

    match result {
        Ok(mut entries) => {
            let total = entries.len();
            entries.truncate(limit);
            info!(total, kept = entries.len(), elapsed_ms, "Fetched feed");
            entries
        }
        Err(e) => {
            warn!(url = %source.url, error = %e, elapsed_ms, "Feed fetch failed; skipping source");
            Vec::new()
        }
    }
}
