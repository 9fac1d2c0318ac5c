//! Recency horizon filter.
//!
//! Articles with a known publication time older than `now - horizon` are
//! dropped. Articles without a date are always kept: they cannot be shown to
//! be old, and losing them silently is worse than delivering one late.

use crate::models::Article;
use chrono::{Duration, NaiveDateTime};

/// `true` when the article falls inside the horizon.
///
/// The boundary itself is inside: an article published exactly `horizon`
/// before `now` is kept. A horizon reaching past the representable date
/// range keeps everything.
pub fn is_recent(article: &Article, now: NaiveDateTime, horizon: Duration) -> bool {
    match (article.published_at, now.checked_sub_signed(horizon)) {
        (Some(at), Some(cutoff)) => at >= cutoff,
        _ => true,
    }
}

/// Keep only recent articles, preserving order. `None` keeps everything.
pub fn retain_recent(articles: &mut Vec<Article>, now: NaiveDateTime, horizon: Option<Duration>) {
    if let Some(horizon) = horizon {
        articles.retain(|a| is_recent(a, now, horizon));
    }
}
