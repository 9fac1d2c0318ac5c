//! Ranking and per-run budget.

use crate::models::Article;

/// Newest first; undated articles last, in the order they arrived.
///
/// The sort is stable, so articles with equal timestamps (including two
/// undated ones) keep their merge order.
pub fn rank(articles: &mut [Article]) {
    articles.sort_by(|a, b| b.published_at.cmp(&a.published_at));
}

/// Rank and keep the first `budget` articles.
///
/// Whatever is cut here is not recorded as delivered and stays eligible for
/// the next run.
pub fn select(mut articles: Vec<Article>, budget: usize) -> Vec<Article> {
    rank(&mut articles);
    articles.truncate(budget);
    articles
}
