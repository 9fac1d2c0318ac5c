//! JSON hand-off for external processing.
//!
//! The selected articles are emitted as a pretty-printed array so a
//! downstream step (summarizer, document writer) can pick them up:
//!
//! ```text
//! [
//!   {
//!     "id": "https://example.com/post",
//!     "title": "...",
//!     "link": "https://example.com/post",
//!     "source": "Example",
//!     "text": "...",
//!     "published_at": "2025-05-06T14:30:00"
//!   }
//! ]
//! ```

use super::RenderError;
use crate::models::Article;

pub fn render_json(articles: &[Article]) -> Result<String, RenderError> {
    Ok(serde_json::to_string_pretty(articles)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::article;

    #[test]
    fn test_render_json_is_an_array_of_articles() {
        let mut a = article("https://x/1", "Example", Some((2025, 5, 6, 14)));
        a.insights.digest = Some("Key point".to_string());
        let json = render_json(&[a, article("https://x/2", "Example", None)]).unwrap();

        let parsed: Vec<Article> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].insights.digest.as_deref(), Some("Key point"));
        assert_eq!(parsed[1].published_at, None);
    }
}
