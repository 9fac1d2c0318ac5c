//! One end-to-end run: aggregate, dedup, select, enrich, render, record.
//!
//! ```text
//! lock ─► load state ─► aggregate ─► filter_unseen ─► select ─► enrich? ─► render
//!                                                                             │
//!                           caller publishes the document ◄───────────────────┘
//!                                        │
//!                                        ▼
//!                              Delivery::commit (record + save)
//! ```
//!
//! Recording is split from rendering so that ids are only marked as delivered
//! once the caller has actually published the document. A [`Delivery`] that is
//! dropped without being committed leaves the state file untouched, and the
//! same articles come up again on the next run.

use crate::aggregate::{AggregateOptions, aggregate};
use crate::config::{PipelineConfig, RenderMode};
use crate::enrich::{CommandEnricher, Enricher, Enrichment, RetryEnrich, enrich_articles};
use crate::feeds::fetch::FetchFeed;
use crate::models::Article;
use crate::normalize::NormalizeOptions;
use crate::outputs::{RenderError, render};
use crate::select::select;
use crate::state::{DeliveryState, RunLock, StateError, StateStore, filter_unseen};
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, instrument};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    State(#[from] StateError),
}

/// What a run produced.
#[derive(Debug)]
pub enum RunOutcome {
    /// No unseen articles; nothing to publish and nothing recorded.
    NothingNew,
    Delivered(Delivery),
}

/// A rendered, not yet recorded delivery.
///
/// Holds the run lock until it is committed or dropped.
#[derive(Debug)]
pub struct Delivery {
    pub document: String,
    pub articles: Vec<Article>,
    state: DeliveryState,
    store: StateStore,
    _lock: Option<RunLock>,
}

impl Delivery {
    /// Mark the delivered articles as sent and persist the history.
    pub async fn commit(mut self, now: DateTime<Utc>) -> Result<(), PipelineError> {
        self.store
            .record_and_save(&self.articles, &mut self.state, now)
            .await?;
        Ok(())
    }
}

/// A configured pipeline. Fetching and enrichment are injected so tests can
/// run without a network.
pub struct Pipeline<F, E = RetryEnrich<CommandEnricher>> {
    config: PipelineConfig,
    fetcher: F,
    enrichment: Option<Enrichment<E>>,
    dry_run: bool,
}

impl<F: FetchFeed> Pipeline<F> {
    /// Build a pipeline using the enrichment commands from `config`, if any.
    pub fn new(config: PipelineConfig, fetcher: F) -> Self {
        let enrichment = Enrichment::from_config(&config.enrich);
        Self {
            config,
            fetcher,
            enrichment,
            dry_run: false,
        }
    }
}

impl<F: FetchFeed, E: Enricher> Pipeline<F, E> {
    #[cfg(test)]
    pub fn with_enrichment<E2: Enricher>(self, enrichment: Option<Enrichment<E2>>) -> Pipeline<F, E2> {
        Pipeline {
            config: self.config,
            fetcher: self.fetcher,
            enrichment,
            dry_run: self.dry_run,
        }
    }

    /// Render without taking the run lock; the caller is expected not to
    /// commit the result.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    fn aggregate_options(&self) -> AggregateOptions {
        AggregateOptions {
            per_source_limit: self.config.per_source_limit,
            fetch_timeout: self.config.fetch_timeout(),
            concurrency: self.config.concurrency,
            horizon: self.config.horizon(),
            normalize: NormalizeOptions {
                text_mode: self.config.text_mode,
                prefer_guid: self.config.prefer_guid,
            },
        }
    }

    /// Run everything up to and including rendering.
    ///
    /// Fails on lock contention or when rendering fails; in both cases the
    /// state file is not touched.
    #[instrument(level = "info", skip_all, fields(sources = self.config.sources.len(), dry_run = self.dry_run))]
    pub async fn run(&self, now: DateTime<Utc>) -> Result<RunOutcome, PipelineError> {
        let store = StateStore::new(&self.config.state_file, self.config.state_cap);
        let lock = if self.dry_run {
            None
        } else {
            Some(store.lock()?)
        };
        let state = store.load().await;

        let articles = aggregate(
            &self.fetcher,
            &self.config.sources,
            &self.aggregate_options(),
            now.naive_utc(),
        )
        .await;
        let candidates = articles.len();
        let unseen = filter_unseen(articles, &state);
        info!(candidates, unseen = unseen.len(), "Filtered delivered articles");

        let selected = select(unseen, self.config.max_items);
        if selected.is_empty() {
            info!("Nothing new to deliver");
            return Ok(RunOutcome::NothingNew);
        }

        // the message shape has nowhere to show insights
        let wants_insights = self.config.render.mode != RenderMode::Message;
        let selected = match &self.enrichment {
            Some(enrichment) if wants_insights => {
                enrich_articles(selected, enrichment, self.config.concurrency).await
            }
            _ => selected,
        };

        let document = render(&selected, now.naive_utc(), &self.config.render)?;
        info!(
            count = selected.len(),
            bytes = document.len(),
            mode = ?self.config.render.mode,
            "Rendered delivery"
        );
        Ok(RunOutcome::Delivered(Delivery {
            document,
            articles: selected,
            state,
            store,
            _lock: lock,
        }))
    }
}
