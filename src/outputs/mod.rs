//! Renderers turning the selected articles into one publishable document.
//!
//! # Submodules
//!
//! - [`message`]: compact numbered list for chat-style delivery
//! - [`document`]: Markdown document with a section per article and optional
//!   enrichment sub-sections
//! - [`json`]: JSON array for an external processor
//!
//! Rendering is a pure function of the articles, the run time and the render
//! configuration. Optional fields that are missing are left out; they never
//! cause an error. The only failures are formatter/serializer errors and an
//! empty selection, which callers are expected to report as "nothing new"
//! before getting here.

pub mod document;
pub mod json;
pub mod message;

use crate::config::{RenderConfig, RenderMode};
use crate::models::Article;
use chrono::NaiveDateTime;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("nothing to render")]
    Empty,
    #[error("formatting failed: {0}")]
    Fmt(#[from] std::fmt::Error),
    #[error("serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Render `articles` in the configured shape.
///
/// # Errors
///
/// [`RenderError::Empty`] for an empty selection, otherwise only formatter
/// or serializer failures.
pub fn render(
    articles: &[Article],
    run_at: NaiveDateTime,
    config: &RenderConfig,
) -> Result<String, RenderError> {
    if articles.is_empty() {
        return Err(RenderError::Empty);
    }
    match config.mode {
        RenderMode::Message => message::render_message(articles, run_at, config),
        RenderMode::Document => document::render_document(articles, run_at, config),
        RenderMode::Json => json::render_json(articles),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::article;

    #[test]
    fn test_render_rejects_empty_selection() {
        let config = RenderConfig {
            mode: RenderMode::Message,
            title: "t".to_string(),
            footer: None,
        };
        let now = chrono::Utc::now().naive_utc();
        assert!(matches!(render(&[], now, &config), Err(RenderError::Empty)));
        assert!(render(&[article("a", "S", None)], now, &config).is_ok());
    }
}
