//! Command-line interface definitions for feed_digest.
//!
//! Every option can also be supplied through an environment variable. Flags
//! that are not given leave the preset/config-file value alone.

use crate::config::{PipelineConfig, Preset, RenderMode};
use clap::Parser;
use std::path::PathBuf;

/// Poll a registry of feeds and print a digest of what has not been delivered yet.
///
/// # Examples
///
/// ```sh
/// # Popular HN blogs as a short message on stdout
/// feed_digest
///
/// # Curated blogs as a Markdown document written to a file
/// feed_digest --preset ak-blogs-doc --output ./out/digest.md
///
/// # Custom registry, preview without touching the state file
/// feed_digest --config feeds.yaml --dry-run
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML config file
    #[arg(short, long, env = "FEED_DIGEST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Built-in deployment to start from
    #[arg(short, long, value_enum, env = "FEED_DIGEST_PRESET", default_value = "ak-blogs")]
    pub preset: Preset,

    /// Delivery history file
    #[arg(short, long, env = "FEED_DIGEST_STATE_FILE")]
    pub state_file: Option<PathBuf>,

    /// Output shape
    #[arg(short, long, value_enum, env = "FEED_DIGEST_MODE")]
    pub mode: Option<RenderMode>,

    /// Articles delivered per run
    #[arg(short = 'n', long, env = "FEED_DIGEST_MAX_ITEMS")]
    pub max_items: Option<usize>,

    /// Drop articles older than this many days
    #[arg(long, env = "FEED_DIGEST_MAX_AGE_DAYS")]
    pub max_age_days: Option<u32>,

    /// Per-feed fetch timeout in seconds
    #[arg(long, env = "FEED_DIGEST_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,

    /// Entries considered from the top of each feed
    #[arg(long, env = "FEED_DIGEST_PER_SOURCE_LIMIT")]
    pub per_source_limit: Option<usize>,

    /// Delivered ids remembered in the state file
    #[arg(long, env = "FEED_DIGEST_STATE_CAP")]
    pub state_cap: Option<usize>,

    /// Feeds fetched at the same time
    #[arg(long, env = "FEED_DIGEST_CONCURRENCY")]
    pub concurrency: Option<usize>,

    /// Write the document to this file instead of stdout
    #[arg(short, long, env = "FEED_DIGEST_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Render without recording anything as delivered
    #[arg(long, env = "FEED_DIGEST_DRY_RUN")]
    pub dry_run: bool,
}

impl Cli {
    /// Overlay the flags that were given on top of `config`.
    pub fn apply(&self, config: &mut PipelineConfig) {
        if let Some(v) = &self.state_file {
            config.state_file = v.clone();
        }
        if let Some(v) = self.mode {
            config.render.mode = v;
        }
        if let Some(v) = self.max_items {
            config.max_items = v;
        }
        if let Some(v) = self.max_age_days {
            config.max_age_days = Some(v);
        }
        if let Some(v) = self.timeout_secs {
            config.fetch_timeout_secs = v;
        }
        if let Some(v) = self.per_source_limit {
            config.per_source_limit = v;
        }
        if let Some(v) = self.state_cap {
            config.state_cap = v;
        }
        if let Some(v) = self.concurrency {
            config.concurrency = v;
        }
    }
}
