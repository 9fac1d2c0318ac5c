//! Data models shared by every stage of the digest pipeline.
//!
//! This module defines the core data structures used throughout the application:
//! - [`FeedSource`]: One entry of the source registry
//! - [`RawEntry`]: A feed entry as parsed from XML, before any cleanup
//! - [`Article`]: The canonical record every source normalizes into
//! - [`Insights`]: Optional enrichment attached to an article before rendering

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A syndication endpoint polled on every run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FeedSource {
    /// Display name, shown next to every article from this feed.
    pub name: String,
    /// Atom or RSS endpoint.
    pub url: String,
}

impl FeedSource {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// A feed entry exactly as the XML reader found it.
///
/// Every field is optional because feeds in the wild omit almost anything.
/// Text fields have had one level of XML escaping resolved, so `summary` and
/// `content` hold HTML markup ready for [`crate::normalize::clean_text`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEntry {
    /// `<guid>` (RSS) or `<id>` (Atom).
    pub guid: Option<String>,
    pub title: Option<String>,
    pub link: Option<String>,
    /// `<pubDate>` / `<published>` / `<issued>`.
    pub published: Option<String>,
    /// `<updated>` / `<modified>` / `<dc:date>`.
    pub updated: Option<String>,
    /// `<created>` / `<dcterms:created>`.
    pub created: Option<String>,
    /// `<description>` / `<summary>`.
    pub summary: Option<String>,
    /// `<content:encoded>` / `<content>`.
    pub content: Option<String>,
}

/// The canonical, normalized article.
///
/// # Invariants
///
/// - `id`, `title` and `link` are never empty.
/// - `id` is stable across runs for the same upstream entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    /// Dedup key: the entry's guid when configured and present, else its link.
    pub id: String,
    pub title: String,
    pub link: String,
    /// Display name of the feed this came from.
    pub source: String,
    /// Cleaned plain text, truncated to the configured extract length.
    pub text: String,
    /// Publication time in UTC; `None` when the feed gave nothing parsable.
    pub published_at: Option<NaiveDateTime>,
    /// Curator score embedded in annotated descriptions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
    /// Original publisher named in annotated descriptions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default, skip_serializing_if = "Insights::is_empty")]
    pub insights: Insights,
}

/// Output of the optional enrichment collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insights {
    /// Short digest of the key points.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    /// Translation of the article text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
}

impl Insights {
    pub fn is_empty(&self) -> bool {
        self.digest.is_none() && self.translation.is_none()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::NaiveDate;

    /// Build an article with an optional `(y, m, d, h)` publication time.
    pub fn article(id: &str, source: &str, at: Option<(i32, u32, u32, u32)>) -> Article {
        Article {
            id: id.to_string(),
            title: format!("Title {id}"),
            link: id.to_string(),
            source: source.to_string(),
            text: format!("Text of {id}"),
            published_at: at.map(|(y, m, d, h)| {
                NaiveDate::from_ymd_opt(y, m, d)
                    .unwrap()
                    .and_hms_opt(h, 0, 0)
                    .unwrap()
            }),
            score: None,
            origin: None,
            insights: Insights::default(),
        }
    }
}
