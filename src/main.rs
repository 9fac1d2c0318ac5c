//! # feed_digest
//!
//! Polls a registry of blog feeds, keeps what is recent and not yet
//! delivered, and renders a short digest for publishing.
//!
//! ## Usage
//!
//! ```sh
//! feed_digest --preset ak-blogs > message.md
//! ```
//!
//! ## Architecture
//!
//! One run is a straight pipeline:
//! 1. **Fetching**: every feed in the registry, concurrently, each under its own timeout
//! 2. **Normalizing**: raw entries become [`models::Article`]s; stale ones are dropped
//! 3. **Dedup**: articles already in the delivery history are removed
//! 4. **Selection**: newest first, up to the per-run budget
//! 5. **Enrichment** (optional): digest/translation through external commands
//! 6. **Output**: the rendered document goes to stdout or `--output`
//! 7. **Recording**: delivered ids are persisted once the output is written
//!
//! Logs go to stderr so stdout carries nothing but the document. A run that
//! finds nothing new prints nothing and exits successfully.

use chrono::Utc;
use clap::Parser;
use std::error::Error;
use std::path::Path;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod aggregate;
mod cli;
mod config;
mod enrich;
mod feeds;
mod models;
mod normalize;
mod outputs;
mod pipeline;
mod recency;
mod registry;
mod select;
mod state;
mod utils;

use cli::Cli;
use config::{ConfigFile, PipelineConfig};
use feeds::fetch::HttpFetcher;
use pipeline::{Pipeline, RunOutcome};
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!(version = env!("CARGO_PKG_VERSION"), "feed_digest starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    // --- Configuration: preset, then file, then flags ---
    let mut config = PipelineConfig::from_preset(args.preset);
    if let Some(path) = &args.config {
        config.apply_file(ConfigFile::load(path).await?);
    }
    args.apply(&mut config);
    if let Err(e) = config.validate() {
        error!(error = %e, "Refusing to run with this configuration");
        return Err(e.into());
    }
    info!(
        preset = ?args.preset,
        sources = config.sources.len(),
        max_items = config.max_items,
        state_file = %config.state_file.display(),
        mode = ?config.render.mode,
        "Configuration resolved"
    );

    // Early check: ensure the output location is writable
    if let Some(parent) = args
        .output
        .as_deref()
        .and_then(Path::parent)
        .filter(|p| !p.as_os_str().is_empty())
    {
        if let Err(e) = ensure_writable_dir(parent).await {
            error!(
                path = %parent.display(),
                error = %e,
                "Output directory is not writable (fix perms or choose a different path)"
            );
            return Err(e);
        }
    }

    let fetcher = HttpFetcher::new(config.fetch_timeout())?;
    let pipeline = Pipeline::new(config, fetcher).dry_run(args.dry_run);
    let now = Utc::now();

    match pipeline.run(now).await? {
        RunOutcome::NothingNew => {
            info!("No new articles; nothing delivered");
        }
        RunOutcome::Delivered(delivery) => {
            publish(&delivery.document, args.output.as_deref()).await?;
            if args.dry_run {
                info!(
                    count = delivery.articles.len(),
                    "Dry run; delivery state left untouched"
                );
            } else {
                let count = delivery.articles.len();
                delivery.commit(now).await?;
                info!(count, "Recorded delivered articles");
            }
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "feed_digest finished"
    );
    Ok(())
}

/// Write the document to `output`, or to stdout when no path is given.
#[instrument(level = "info", skip_all)]
async fn publish(document: &str, output: Option<&Path>) -> Result<(), Box<dyn Error>> {
    match output {
        Some(path) => {
            tokio::fs::write(path, document).await?;
            info!(path = %path.display(), bytes = document.len(), "Wrote document");
        }
        None => println!("{document}"),
    }
    Ok(())
}
