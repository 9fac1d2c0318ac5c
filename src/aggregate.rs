//! Concurrent fan-out of fetch → normalize → recency filter over the registry.
//!
//! Each source is handled by an independent future that owns its own result
//! list; at most `concurrency` of them are in flight at once. Results are
//! merged in completion order, so callers must not rely on the order of the
//! returned articles (the selector sorts them).

use crate::feeds::fetch::{FetchFeed, fetch_source};
use crate::models::{Article, FeedSource};
use crate::normalize::{NormalizeOptions, normalize_entry};
use crate::recency::retain_recent;
use chrono::{Duration, NaiveDateTime};
use futures::stream::{self, StreamExt};
use std::time::Duration as StdDuration;
use tracing::{debug, info, instrument};

#[derive(Debug, Clone, Copy)]
pub struct AggregateOptions {
    pub per_source_limit: usize,
    pub fetch_timeout: StdDuration,
    pub concurrency: usize,
    pub horizon: Option<Duration>,
    pub normalize: NormalizeOptions,
}

/// Fetch, normalize and filter a single source.
async fn collect_source<F: FetchFeed>(
    fetcher: &F,
    source: &FeedSource,
    opts: &AggregateOptions,
    now: NaiveDateTime,
) -> Vec<Article> {
    let raw = fetch_source(fetcher, source, opts.per_source_limit, opts.fetch_timeout).await;
    let fetched = raw.len();

    let mut articles: Vec<Article> = raw
        .iter()
        .filter_map(|entry| normalize_entry(entry, &source.name, opts.normalize))
        .collect();
    let normalized = articles.len();

    retain_recent(&mut articles, now, opts.horizon);
    debug!(
        source = %source.name,
        fetched,
        normalized,
        recent = articles.len(),
        "Source processed"
    );
    articles
}

/// Run every source concurrently and merge what comes back.
///
/// Never fails: a source that errors or times out contributes nothing. The
/// wall-clock cost is bounded by roughly `ceil(sources / concurrency)` fetch
/// timeouts.
#[instrument(level = "info", skip_all, fields(sources = sources.len(), concurrency = opts.concurrency))]
pub async fn aggregate<F: FetchFeed>(
    fetcher: &F,
    sources: &[FeedSource],
    opts: &AggregateOptions,
    now: NaiveDateTime,
) -> Vec<Article> {
    let per_source: Vec<Vec<Article>> = stream::iter(sources)
        .map(|source| collect_source(fetcher, source, opts, now))
        .buffer_unordered(opts.concurrency.max(1))
        .collect()
        .await;

    let responding = per_source.iter().filter(|a| !a.is_empty()).count();
    let articles: Vec<Article> = per_source.into_iter().flatten().collect();
    info!(
        count = articles.len(),
        sources_with_articles = responding,
        "Aggregated recent articles"
    );
    articles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TextMode;
    use crate::feeds::fetch::stub::{Reply, StubFetcher};
    use crate::models::RawEntry;
    use chrono::NaiveDate;
    use std::collections::HashSet;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 5, 6)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn opts() -> AggregateOptions {
        AggregateOptions {
            per_source_limit: 5,
            fetch_timeout: StdDuration::from_secs(5),
            concurrency: 10,
            horizon: Some(Duration::days(3)),
            normalize: NormalizeOptions {
                text_mode: TextMode::Summary,
                prefer_guid: false,
            },
        }
    }

    fn dated(link: &str, date: &str) -> RawEntry {
        RawEntry {
            title: Some(format!("Post {link}")),
            link: Some(link.to_string()),
            published: Some(date.to_string()),
            ..RawEntry::default()
        }
    }

    fn ids(articles: &[Article]) -> HashSet<String> {
        articles.iter().map(|a| a.id.clone()).collect()
    }

    #[tokio::test]
    async fn test_aggregate_merges_and_filters() {
        let fetcher = StubFetcher::default()
            .with(
                "https://a",
                Reply::Entries(vec![
                    dated("https://a/1", "2025-05-06T08:00:00Z"),
                    dated("https://a/old", "2025-04-01T08:00:00Z"),
                    RawEntry {
                        link: Some("https://a/untitled".to_string()),
                        ..RawEntry::default()
                    },
                ]),
            )
            .with(
                "https://b",
                Reply::Entries(vec![dated("https://b/1", "Mon, 05 May 2025 08:00:00 GMT")]),
            );
        let sources = vec![
            FeedSource::new("A", "https://a"),
            FeedSource::new("B", "https://b"),
        ];

        let articles = aggregate(&fetcher, &sources, &opts(), now()).await;
        assert_eq!(
            ids(&articles),
            HashSet::from(["https://a/1".to_string(), "https://b/1".to_string()])
        );
        let b = articles.iter().find(|a| a.id == "https://b/1").unwrap();
        assert_eq!(b.source, "B");
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_source_does_not_change_the_result() {
        let healthy = StubFetcher::default().with(
            "https://a",
            Reply::Entries(vec![
                dated("https://a/1", "2025-05-06T08:00:00Z"),
                dated("https://a/2", "2025-05-05T08:00:00Z"),
            ]),
        );
        let with_hang = healthy.clone().with("https://slow", Reply::Hang);

        let alone = vec![FeedSource::new("A", "https://a")];
        let mut both = alone.clone();
        both.insert(0, FeedSource::new("Slow", "https://slow"));

        let expected = aggregate(&healthy, &alone, &opts(), now()).await;
        let got = aggregate(&with_hang, &both, &opts(), now()).await;
        assert_eq!(ids(&got), ids(&expected));
        assert_eq!(got.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_registry() {
        let articles = aggregate(&StubFetcher::default(), &[], &opts(), now()).await;
        assert!(articles.is_empty());
    }

    #[tokio::test]
    async fn test_same_link_from_two_sources_is_not_merged() {
        let shared = vec![dated("https://shared/1", "2025-05-06T08:00:00Z")];
        let fetcher = StubFetcher::default()
            .with("https://a", Reply::Entries(shared.clone()))
            .with("https://b", Reply::Entries(shared));
        let sources = vec![
            FeedSource::new("A", "https://a"),
            FeedSource::new("B", "https://b"),
        ];

        let articles = aggregate(&fetcher, &sources, &opts(), now()).await;
        assert_eq!(articles.len(), 2);
        assert!(articles.iter().all(|a| a.id == "https://shared/1"));
    }
}
