//! Pipeline configuration: presets, YAML config files and validation.
//!
//! A run is configured in three layers, later layers winning:
//!
//! 1. A [`Preset`] supplies a complete [`PipelineConfig`] for one of the known
//!    deployments.
//! 2. An optional YAML file ([`ConfigFile`]) overrides any subset of fields.
//! 3. Command-line flags (see [`crate::cli`]) override individual values.
//!
//! # Example
//!
//! ```yaml
//! max_items: 3
//! max_age_days: 2
//! state_file: /var/lib/feed_digest/state.json
//! sources:
//!   - name: Julia Evans
//!     url: https://jvns.ca/atom.xml
//! render:
//!   mode: document
//!   title: Weekend reading
//! ```

use crate::models::FeedSource;
use crate::registry;
use chrono::Duration;
use clap::ValueEnum;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, instrument, warn};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Shape of the rendered output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum RenderMode {
    /// Compact numbered list for chat-style delivery.
    Message,
    /// Markdown document with one section per article.
    Document,
    /// JSON array of articles for an external processor.
    Json,
}

/// How much article text the normalizer keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum TextMode {
    /// Short extract from the entry summary.
    Summary,
    /// Long extract, preferring the full entry content.
    Content,
}

impl TextMode {
    pub fn max_chars(self) -> usize {
        match self {
            TextMode::Summary => 200,
            TextMode::Content => 5000,
        }
    }
}

/// Known deployments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Preset {
    /// Popular HN blogs, short chat message.
    AkBlogs,
    /// Curated HN blogs, long-form document with enrichment.
    AkBlogsDoc,
    /// Single curated AI feed with score annotations.
    Bestblogs,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RenderConfig {
    pub mode: RenderMode,
    pub title: String,
    #[serde(default)]
    pub footer: Option<String>,
}

/// External commands used as the opaque enrichment collaborator.
///
/// Each command receives the article text on stdin and prints its result on
/// stdout. The first element is the program, the rest are arguments.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EnrichConfig {
    #[serde(default)]
    pub digest_command: Option<Vec<String>>,
    #[serde(default)]
    pub translate_command: Option<Vec<String>>,
    #[serde(default = "default_enrich_retries")]
    pub max_retries: usize,
    /// Deadline for one command invocation; an overrunning command is killed.
    #[serde(default = "default_enrich_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_enrich_retries() -> usize {
    3
}

fn default_enrich_timeout_secs() -> u64 {
    120
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            digest_command: None,
            translate_command: None,
            max_retries: default_enrich_retries(),
            timeout_secs: default_enrich_timeout_secs(),
        }
    }
}

impl EnrichConfig {
    pub fn is_enabled(&self) -> bool {
        self.digest_command.is_some() || self.translate_command.is_some()
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }
}

/// Everything a single pipeline run needs to know.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub sources: Vec<FeedSource>,
    /// Recency horizon in days; `None` disables the filter.
    pub max_age_days: Option<u32>,
    /// Per-run delivery budget.
    pub max_items: usize,
    /// How many of each feed's first entries are considered.
    pub per_source_limit: usize,
    pub fetch_timeout_secs: u64,
    /// Upper bound on concurrent fetches.
    pub concurrency: usize,
    pub state_file: PathBuf,
    /// How many delivered ids are remembered.
    pub state_cap: usize,
    pub text_mode: TextMode,
    /// Use `<guid>`/`<id>` as the dedup key when present.
    pub prefer_guid: bool,
    pub render: RenderConfig,
    pub enrich: EnrichConfig,
}

impl PipelineConfig {
    pub fn from_preset(preset: Preset) -> Self {
        match preset {
            Preset::AkBlogs => Self {
                sources: registry::popular_blogs(),
                max_age_days: Some(3),
                max_items: 5,
                per_source_limit: 5,
                fetch_timeout_secs: 5,
                concurrency: 10,
                state_file: PathBuf::from(".ak_blogs_state.json"),
                state_cap: 200,
                text_mode: TextMode::Summary,
                prefer_guid: false,
                render: RenderConfig {
                    mode: RenderMode::Message,
                    title: "Popular Blog Picks".to_string(),
                    footer: Some("Source: popular Hacker News blogs".to_string()),
                },
                enrich: EnrichConfig::default(),
            },
            Preset::AkBlogsDoc => Self {
                sources: registry::curated_blogs(),
                max_age_days: Some(3),
                max_items: 5,
                per_source_limit: 3,
                fetch_timeout_secs: 8,
                concurrency: 8,
                state_file: PathBuf::from(".ak_blogs_doc_state.json"),
                state_cap: 200,
                text_mode: TextMode::Content,
                prefer_guid: false,
                render: RenderConfig {
                    mode: RenderMode::Document,
                    title: "Popular Blog Picks".to_string(),
                    footer: None,
                },
                enrich: EnrichConfig::default(),
            },
            Preset::Bestblogs => Self {
                sources: registry::bestblogs_ai(),
                max_age_days: None,
                max_items: 5,
                per_source_limit: 20,
                fetch_timeout_secs: 8,
                concurrency: 1,
                state_file: PathBuf::from(".bestblogs_state.json"),
                state_cap: 100,
                text_mode: TextMode::Summary,
                prefer_guid: true,
                render: RenderConfig {
                    mode: RenderMode::Message,
                    title: "AI News Picks".to_string(),
                    footer: Some("Data: BestBlogs.dev".to_string()),
                },
                enrich: EnrichConfig::default(),
            },
        }
    }

    pub fn horizon(&self) -> Option<Duration> {
        self.max_age_days.map(|d| Duration::days(i64::from(d)))
    }

    pub fn fetch_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Overlay every field the config file sets.
    pub fn apply_file(&mut self, file: ConfigFile) {
        if let Some(v) = file.sources {
            self.sources = v;
        }
        if let Some(v) = file.max_age_days {
            self.max_age_days = Some(v);
        }
        if let Some(v) = file.max_items {
            self.max_items = v;
        }
        if let Some(v) = file.per_source_limit {
            self.per_source_limit = v;
        }
        if let Some(v) = file.fetch_timeout_secs {
            self.fetch_timeout_secs = v;
        }
        if let Some(v) = file.concurrency {
            self.concurrency = v;
        }
        if let Some(v) = file.state_file {
            self.state_file = v;
        }
        if let Some(v) = file.state_cap {
            self.state_cap = v;
        }
        if let Some(v) = file.text_mode {
            self.text_mode = v;
        }
        if let Some(v) = file.prefer_guid {
            self.prefer_guid = v;
        }
        if let Some(v) = file.render {
            self.render = v;
        }
        if let Some(v) = file.enrich {
            self.enrich = v;
        }
    }

    /// Reject configurations that cannot produce a meaningful run.
    ///
    /// An empty source list is allowed; such a run reports nothing new.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_items == 0 {
            return Err(ConfigError::Invalid("max_items must be at least 1".into()));
        }
        if self.per_source_limit == 0 {
            return Err(ConfigError::Invalid(
                "per_source_limit must be at least 1".into(),
            ));
        }
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid("concurrency must be at least 1".into()));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "fetch_timeout_secs must be at least 1".into(),
            ));
        }
        if self.state_cap < self.max_items {
            return Err(ConfigError::Invalid(format!(
                "state_cap ({}) must not be smaller than max_items ({})",
                self.state_cap, self.max_items
            )));
        }
        if self.enrich.is_enabled() && self.enrich.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "enrich.timeout_secs must be at least 1".into(),
            ));
        }
        for source in &self.sources {
            if source.name.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "source {} has an empty name",
                    source.url
                )));
            }
            match url::Url::parse(&source.url) {
                Ok(u) if matches!(u.scheme(), "http" | "https") => {}
                Ok(u) => {
                    return Err(ConfigError::Invalid(format!(
                        "source {} uses unsupported scheme {}",
                        source.name,
                        u.scheme()
                    )));
                }
                Err(e) => {
                    return Err(ConfigError::Invalid(format!(
                        "source {} has an invalid url {}: {}",
                        source.name, source.url, e
                    )));
                }
            }
        }
        for name in self.sources.iter().map(|s| s.name.as_str()).duplicates() {
            warn!(%name, "Source name appears more than once in the registry");
        }
        Ok(())
    }
}

/// Partial configuration read from YAML; every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub sources: Option<Vec<FeedSource>>,
    pub max_age_days: Option<u32>,
    pub max_items: Option<usize>,
    pub per_source_limit: Option<usize>,
    pub fetch_timeout_secs: Option<u64>,
    pub concurrency: Option<usize>,
    pub state_file: Option<PathBuf>,
    pub state_cap: Option<usize>,
    pub text_mode: Option<TextMode>,
    pub prefer_guid: Option<bool>,
    pub render: Option<RenderConfig>,
    pub enrich: Option<EnrichConfig>,
}

impl ConfigFile {
    #[instrument(level = "info", fields(path = %path.display()))]
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let file = Self::parse(&raw).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loaded configuration file");
        Ok(file)
    }

    pub fn parse(raw: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(raw)
    }
}
