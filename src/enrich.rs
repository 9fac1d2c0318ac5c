//! Optional article enrichment through an opaque text-to-text collaborator.
//!
//! The pipeline only knows the [`Enricher`] trait: hand over some text, get
//! some text back. Production runs use [`CommandEnricher`], which pipes the
//! text through an external program, wrapped in [`RetryEnrich`] so transient
//! failures are retried with exponential backoff.
//!
//! Enrichment never blocks delivery. When every retry fails the field stays
//! empty and the document renderer falls back to the article text.

use crate::config::EnrichConfig;
use crate::models::Article;
use crate::utils::truncate_for_log;
use futures::stream::{self, StreamExt};
use rand::{Rng, rng};
use std::error::Error;
use std::fmt;
use std::process::Stdio;
use std::time::{Duration as StdDuration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

/// Turns a piece of text into another piece of text.
pub trait Enricher {
    async fn enrich(&self, text: &str) -> Result<String, Box<dyn Error>>;
}

/// Adds exponential backoff retry logic to any [`Enricher`].
///
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct RetryEnrich<T> {
    inner: T,
    max_retries: usize,
    base_delay: StdDuration,
    max_delay: StdDuration,
}

impl<T> RetryEnrich<T>
where
    T: Enricher,
{
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }
}

impl<T> fmt::Debug for RetryEnrich<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryEnrich")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> Enricher for RetryEnrich<T>
where
    T: Enricher,
{
    #[instrument(level = "debug", skip_all)]
    async fn enrich(&self, text: &str) -> Result<String, Box<dyn Error>> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            let err = match self.inner.enrich(text).await {
                Ok(resp) => return Ok(resp),
                Err(e) => e,
            };
            attempt += 1;
            let elapsed_ms_attempt = attempt_t0.elapsed().as_millis() as u64;
            let elapsed_ms_total = total_t0.elapsed().as_millis() as u64;

            if attempt > self.max_retries {
                error!(
                    attempt,
                    max = self.max_retries,
                    elapsed_ms_attempt,
                    elapsed_ms_total,
                    error = %err,
                    "enrich() exhausted retries"
                );
                return Err(err);
            }

            let delay = self
                .base_delay
                .saturating_mul(1 << (attempt - 1).min(16))
                .min(self.max_delay);
            let jitter_ms: u64 = rng().random_range(0..=250);
            let delay = delay + StdDuration::from_millis(jitter_ms);

            warn!(
                attempt,
                max = self.max_retries,
                elapsed_ms_attempt,
                elapsed_ms_total,
                ?delay,
                error = %err,
                "enrich() attempt failed; backing off"
            );
            sleep(delay).await;
        }
    }
}

/// Runs an external program with the text on stdin and reads the result from
/// stdout. A non-zero exit status, empty output or exceeding `timeout` counts
/// as a failure; a program that overruns is killed.
#[derive(Debug, Clone)]
pub struct CommandEnricher {
    program: String,
    args: Vec<String>,
    timeout: StdDuration,
}

impl CommandEnricher {
    /// Build from an argv-style list; `None` when the list is empty.
    ///
    /// # Arguments
    ///
    /// * `argv` - Program followed by its arguments
    /// * `timeout` - Upper bound on one invocation, spawn to exit
    pub fn from_argv(argv: &[String], timeout: StdDuration) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
            timeout,
        })
    }

    async fn run(&self, text: &str) -> Result<String, Box<dyn Error>> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes()).await?;
            // closing stdin signals end of input
            drop(stdin);
        }
        let output = child.wait_with_output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                truncate_for_log(stderr.trim(), 300)
            )
            .into());
        }
        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if stdout.is_empty() {
            return Err(format!("{} produced no output", self.program).into());
        }
        Ok(stdout)
    }
}

impl Enricher for CommandEnricher {
    #[instrument(level = "debug", skip_all, fields(program = %self.program))]
    async fn enrich(&self, text: &str) -> Result<String, Box<dyn Error>> {
        let t0 = Instant::now();
        // dropping the future on timeout kills the child
        let stdout = match tokio::time::timeout(self.timeout, self.run(text)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(format!("{} timed out after {:?}", self.program, self.timeout).into());
            }
        };
        let elapsed_ms = t0.elapsed().as_millis() as u64;
        debug!(elapsed_ms, bytes = stdout.len(), "Enrichment command finished");
        Ok(stdout)
    }
}

/// The collaborators used for one run. Either side may be absent.
#[derive(Debug)]
pub struct Enrichment<E> {
    pub digest: Option<E>,
    pub translate: Option<E>,
}

impl Enrichment<RetryEnrich<CommandEnricher>> {
    /// Wire up the configured commands; `None` when nothing is configured.
    pub fn from_config(config: &EnrichConfig) -> Option<Self> {
        let timeout = config.timeout();
        let build = |argv: &Option<Vec<String>>| {
            argv.as_deref()
                .and_then(|argv| CommandEnricher::from_argv(argv, timeout))
                .map(|c| RetryEnrich::new(c, config.max_retries, StdDuration::from_secs(1)))
        };
        let enrichment = Self {
            digest: build(&config.digest_command),
            translate: build(&config.translate_command),
        };
        if enrichment.digest.is_none() && enrichment.translate.is_none() {
            return None;
        }
        Some(enrichment)
    }
}

async fn ask_field<E: Enricher>(enricher: &E, text: &str, field: &str, id: &str) -> Option<String> {
    match enricher.enrich(text).await {
        Ok(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Ok(_) => {
            warn!(%id, field, "Enrichment returned nothing; leaving field empty");
            None
        }
        Err(e) => {
            warn!(%id, field, error = %e, "Enrichment failed; leaving field empty");
            None
        }
    }
}

async fn enrich_one<E: Enricher>(mut article: Article, enrichment: &Enrichment<E>) -> Article {
    let input = if article.text.is_empty() {
        article.title.clone()
    } else {
        article.text.clone()
    };

    if let Some(digest) = &enrichment.digest {
        article.insights.digest = ask_field(digest, &input, "digest", &article.id).await;
    }
    if let Some(translate) = &enrichment.translate {
        // translate the digest when there is one, it is what readers see first
        let source = article.insights.digest.as_deref().unwrap_or(&input);
        article.insights.translation = ask_field(translate, source, "translation", &article.id).await;
    }
    article
}

/// Enrich the selected articles, at most `concurrency` at a time.
///
/// # Arguments
///
/// * `articles` - Articles in delivery order
/// * `enrichment` - Digest and/or translation collaborators
/// * `concurrency` - Upper bound on articles in flight
///
/// # Returns
///
/// The same articles in the same order. Failures only ever leave
/// `insights` fields empty.
#[instrument(level = "info", skip_all, fields(count = articles.len()))]
pub async fn enrich_articles<E: Enricher>(
    articles: Vec<Article>,
    enrichment: &Enrichment<E>,
    concurrency: usize,
) -> Vec<Article> {
    let t0 = Instant::now();
    let enriched: Vec<Article> = stream::iter(articles)
        .map(|article| enrich_one(article, enrichment))
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let digests = enriched.iter().filter(|a| a.insights.digest.is_some()).count();
    let translations = enriched
        .iter()
        .filter(|a| a.insights.translation.is_some())
        .count();
    info!(
        digests,
        translations,
        elapsed_ms = t0.elapsed().as_millis() as u64,
        "Enrichment finished"
    );
    enriched
}

#[cfg(test)]
pub(crate) mod stub {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails the first `failures` calls, then answers `prefix` + input.
    #[derive(Debug, Default)]
    pub struct StubEnricher {
        pub prefix: String,
        pub failures: usize,
        pub calls: AtomicUsize,
    }

    impl StubEnricher {
        pub fn answering(prefix: &str) -> Self {
            Self {
                prefix: prefix.to_string(),
                ..Self::default()
            }
        }

        pub fn failing() -> Self {
            Self {
                failures: usize::MAX,
                ..Self::default()
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Enricher for StubEnricher {
        async fn enrich(&self, text: &str) -> Result<String, Box<dyn Error>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err("service unavailable".into());
            }
            Ok(format!("{}{}", self.prefix, text))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::stub::StubEnricher;
    use super::*;
    use crate::models::fixtures::article;

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_after_transient_failures() {
        let inner = StubEnricher {
            prefix: "ok: ".to_string(),
            failures: 2,
            ..StubEnricher::default()
        };
        let retry = RetryEnrich::new(inner, 3, StdDuration::from_secs(1));

        assert_eq!(retry.enrich("text").await.unwrap(), "ok: text");
        assert_eq!(retry.inner.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_gives_up() {
        let retry = RetryEnrich::new(StubEnricher::failing(), 2, StdDuration::from_secs(1));
        assert!(retry.enrich("text").await.is_err());
        // first try plus two retries
        assert_eq!(retry.inner.calls(), 3);
    }

    #[tokio::test]
    async fn test_enrich_articles_fills_fields_in_order() {
        let enrichment = Enrichment {
            digest: Some(StubEnricher::answering("digest: ")),
            translate: Some(StubEnricher::answering("tr: ")),
        };
        let articles = vec![
            article("https://x/1", "S", None),
            article("https://x/2", "S", None),
        ];

        let out = enrich_articles(articles, &enrichment, 4).await;
        assert_eq!(out[0].id, "https://x/1");
        assert_eq!(out[1].id, "https://x/2");
        assert_eq!(
            out[0].insights.digest.as_deref(),
            Some("digest: Text of https://x/1")
        );
        assert_eq!(
            out[1].insights.translation.as_deref(),
            Some("tr: digest: Text of https://x/2")
        );
    }

    #[tokio::test]
    async fn test_enrich_failure_leaves_fields_empty() {
        let enrichment = Enrichment {
            digest: Some(StubEnricher::failing()),
            translate: None,
        };
        let out = enrich_articles(vec![article("https://x/1", "S", None)], &enrichment, 1).await;
        assert_eq!(out.len(), 1);
        assert!(out[0].insights.is_empty());
    }

    #[test]
    fn test_from_config() {
        assert!(Enrichment::from_config(&EnrichConfig::default()).is_none());

        let config = EnrichConfig {
            digest_command: Some(vec!["summarize".to_string(), "--short".to_string()]),
            translate_command: Some(Vec::new()),
            max_retries: 1,
            timeout_secs: 30,
        };
        let enrichment = Enrichment::from_config(&config).unwrap();
        assert!(enrichment.digest.is_some());
        assert!(enrichment.translate.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_enricher_pipes_text() {
        let argv = vec!["tr".to_string(), "a-z".to_string(), "A-Z".to_string()];
        let enricher = CommandEnricher::from_argv(&argv, StdDuration::from_secs(10)).unwrap();
        assert_eq!(enricher.enrich("hello world\n").await.unwrap(), "HELLO WORLD");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_enricher_reports_failure() {
        let argv = vec!["sh".to_string(), "-c".to_string(), "exit 3".to_string()];
        let enricher = CommandEnricher::from_argv(&argv, StdDuration::from_secs(10)).unwrap();
        assert!(enricher.enrich("text").await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_enricher_kills_hung_program() {
        let argv = vec!["sleep".to_string(), "30".to_string()];
        let enricher = CommandEnricher::from_argv(&argv, StdDuration::from_millis(200)).unwrap();

        let t0 = Instant::now();
        let result = tokio::time::timeout(StdDuration::from_secs(5), enricher.enrich("x"))
            .await
            .expect("enrich() must give up on its own");
        let err = result.unwrap_err();
        assert!(err.to_string().contains("timed out"), "{err}");
        assert!(t0.elapsed() < StdDuration::from_secs(5));
    }
}
