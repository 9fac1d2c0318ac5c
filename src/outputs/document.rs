//! Structured Markdown document, one section per article.
//!
//! Enrichment output is rendered as sub-sections when present. An article
//! without any enrichment shows its text extract instead so the section is
//! never empty.

use super::RenderError;
use crate::config::RenderConfig;
use crate::models::Article;
use chrono::NaiveDateTime;
use std::fmt::Write;

/// Render the Markdown document.
///
/// # Arguments
///
/// * `articles` - Selected articles, already in delivery order
/// * `run_at` - Run timestamp; only its date appears in the title
/// * `config` - Title, and the footer which doubles as the byline
///
/// # Returns
///
/// One `##` section per article, each followed by a `---` separator.
pub fn render_document(
    articles: &[Article],
    run_at: NaiveDateTime,
    config: &RenderConfig,
) -> Result<String, RenderError> {
    let mut doc = String::new();
    writeln!(doc, "# {} ({})", config.title, run_at.format("%Y-%m-%d"))?;
    writeln!(doc)?;
    match &config.footer {
        Some(footer) => writeln!(doc, "> {footer} | {} articles", articles.len())?,
        None => writeln!(doc, "> {} articles", articles.len())?,
    }
    writeln!(doc)?;
    writeln!(doc, "---")?;
    writeln!(doc)?;

    for (i, article) in articles.iter().enumerate() {
        writeln!(doc, "## {}. {}", i + 1, article.title)?;
        writeln!(doc)?;
        write!(doc, "**Source**: {} | **Link**: {}", article.source, article.link)?;
        if let Some(at) = article.published_at {
            write!(doc, " | **Published**: {}", at.format("%Y-%m-%d %H:%M"))?;
        }
        writeln!(doc)?;
        writeln!(doc)?;

        if let Some(digest) = &article.insights.digest {
            writeln!(doc, "### Key points")?;
            writeln!(doc)?;
            writeln!(doc, "{digest}")?;
            writeln!(doc)?;
        }
        if let Some(translation) = &article.insights.translation {
            writeln!(doc, "### Translation")?;
            writeln!(doc)?;
            writeln!(doc, "{translation}")?;
            writeln!(doc)?;
        }
        if article.insights.is_empty() && !article.text.is_empty() {
            writeln!(doc, "{}", article.text)?;
            writeln!(doc)?;
        }

        writeln!(doc, "---")?;
        writeln!(doc)?;
    }

    Ok(doc)
}
