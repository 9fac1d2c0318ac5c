//! Compact delivery message.
//!
//! ```text
//! **Popular Blog Picks** (2025-05-06)
//!
//! **1. Post title** [score 92]
//!    by Example Blog
//!    First hundred characters of the summary...
//!    Origin: Original Publisher
//!    https://example.com/post
//!
//! ---
//! _Source: popular Hacker News blogs_
//! ```

use super::RenderError;
use crate::config::RenderConfig;
use crate::models::Article;
use crate::normalize::truncate_text;
use chrono::NaiveDateTime;
use std::fmt::Write;

/// Characters of article text shown per entry.
const LINE_CHARS: usize = 100;

/// Scores at or above this get a highlight marker.
const HOT_SCORE: u32 = 90;

/// Render the compact numbered message.
///
/// Each entry shows the title (with `[score N]` when the feed annotated one),
/// the source, a one-line extract and the link. The footer line is only
/// written when configured.
///
/// # Arguments
///
/// * `articles` - Selected articles, already in delivery order
/// * `run_at` - Run timestamp; only its date appears in the header
/// * `config` - Title and optional footer
///
/// # Returns
///
/// The message text without a trailing newline.
pub fn render_message(
    articles: &[Article],
    run_at: NaiveDateTime,
    config: &RenderConfig,
) -> Result<String, RenderError> {
    let mut out = String::new();
    writeln!(out, "**{}** ({})", config.title, run_at.format("%Y-%m-%d"))?;
    writeln!(out)?;

    for (i, article) in articles.iter().enumerate() {
        write!(out, "**{}. {}**", i + 1, article.title)?;
        if let Some(score) = article.score {
            let marker = if score >= HOT_SCORE { " 🔥" } else { "" };
            write!(out, " [score {score}]{marker}")?;
        }
        writeln!(out)?;
        writeln!(out, "   by {}", article.source)?;
        if !article.text.is_empty() {
            writeln!(out, "   {}", truncate_text(&article.text, LINE_CHARS))?;
        }
        if let Some(origin) = &article.origin {
            writeln!(out, "   Origin: {origin}")?;
        }
        writeln!(out, "   {}", article.link)?;
        writeln!(out)?;
    }

    if let Some(footer) = &config.footer {
        writeln!(out, "---")?;
        writeln!(out, "_{footer}_")?;
    }
    Ok(out.trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenderMode;
    use crate::models::fixtures::article;
    use chrono::NaiveDate;

    fn config(footer: Option<&str>) -> RenderConfig {
        RenderConfig {
            mode: RenderMode::Message,
            title: "Popular Blog Picks".to_string(),
            footer: footer.map(str::to_string),
        }
    }

    fn run_at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 5, 6)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_render_message_numbered_entries() {
        let mut first = article("https://x/1", "Julia Evans", None);
        first.text = "a".repeat(150);
        let mut second = article("https://x/2", "matklad", None);
        second.text = String::new();

        let msg = render_message(&[first, second], run_at(), &config(Some("Source: blogs"))).unwrap();

        assert!(msg.starts_with("**Popular Blog Picks** (2025-05-06)\n\n"));
        assert!(msg.contains("**1. Title https://x/1**\n   by Julia Evans\n"));
        assert!(msg.contains(&format!("   {}...\n", "a".repeat(100))));
        assert!(msg.contains("**2. Title https://x/2**\n   by matklad\n   https://x/2\n"));
        assert!(msg.ends_with("---\n_Source: blogs_"));
    }

    #[test]
    fn test_render_message_score_and_origin() {
        let mut hot = article("https://x/1", "BestBlogs", None);
        hot.score = Some(93);
        hot.origin = Some("Example Labs".to_string());
        let mut warm = article("https://x/2", "BestBlogs", None);
        warm.score = Some(86);

        let msg = render_message(&[hot, warm], run_at(), &config(None)).unwrap();
        assert!(msg.contains("**1. Title https://x/1** [score 93] 🔥\n"));
        assert!(msg.contains("   Origin: Example Labs\n"));
        assert!(msg.contains("**2. Title https://x/2** [score 86]\n"));
        assert!(!msg.contains("---"));
    }

    #[test]
    fn test_short_text_is_not_marked() {
        let mut a = article("https://x/1", "S", None);
        a.text = "Short summary.".to_string();
        let msg = render_message(&[a], run_at(), &config(None)).unwrap();
        assert!(msg.contains("   Short summary.\n"));
    }
}
