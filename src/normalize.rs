//! Raw feed entry → canonical [`Article`].
//!
//! Normalization never fails: an entry either becomes an article or is
//! silently dropped (missing title or link). Everything else degrades:
//! unparsable dates become `None`, broken markup is stripped as well as it can
//! be, and missing text becomes an empty string.

use crate::config::TextMode;
use crate::models::{Article, Insights, RawEntry};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

/// Appended to text that was cut short.
pub const TRUNCATION_MARKER: &str = "...";

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());
static WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

// Annotated descriptions from curated feeds, e.g.
// `<span>AI Score</span><span>92</span>` and `<h3>One-Sentence Summary</h3><p>..</p>`.
static ONE_SENTENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"One-Sentence Summary[^<]*</h3>\s*<p[^>]*>([^<]+)").unwrap());
static SUMMARY_SECTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Summary[^<]*</h3>\s*<p[^>]*>([^<]+)").unwrap());
static SCORE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"AI Score[^<]*</span>\s*<span[^>]*>(\d+)").unwrap());
static ORIGIN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Source[^<]*</span>\s*<span[^>]*>([^<]+)").unwrap());

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Per-registry knobs for [`normalize_entry`].
#[derive(Debug, Clone, Copy)]
pub struct NormalizeOptions {
    /// Which entry field feeds `text`, and how long the extract may be.
    pub text_mode: TextMode,
    /// Use the entry's guid/id as the dedup key when it has one.
    pub prefer_guid: bool,
}

/// Turn one raw entry into an article, or drop it.
///
/// # Arguments
///
/// * `raw` - Entry as parsed from the feed
/// * `source` - Display name of the feed, copied into the article
/// * `opts` - Id and text extraction settings
///
/// # Returns
///
/// `None` when the entry has no title or no link; otherwise the article
/// with cleaned text, an optional date and any curator annotations.
pub fn normalize_entry(raw: &RawEntry, source: &str, opts: NormalizeOptions) -> Option<Article> {
    let title = non_empty(raw.title.as_deref())?;
    let link = non_empty(raw.link.as_deref())?;
    let title = WS_RE.replace_all(title, " ").into_owned();

    let id = if opts.prefer_guid {
        non_empty(raw.guid.as_deref()).unwrap_or(link)
    } else {
        link
    };

    let markup = match opts.text_mode {
        TextMode::Summary => raw.summary.as_deref().or(raw.content.as_deref()),
        TextMode::Content => raw.content.as_deref().or(raw.summary.as_deref()),
    }
    .unwrap_or_default();

    let limit = opts.text_mode.max_chars();
    let text = match ONE_SENTENCE_RE.captures(markup) {
        Some(c) => clean_text(&c[1]),
        None => {
            let body = SUMMARY_SECTION_RE
                .captures(markup)
                .map(|c| clean_text(&c[1]))
                .unwrap_or_else(|| clean_text(markup));
            truncate_text(&body, limit)
        }
    };

    let score = SCORE_RE
        .captures(markup)
        .and_then(|c| c[1].parse::<u32>().ok());
    let origin = ORIGIN_RE
        .captures(markup)
        .map(|c| clean_text(&c[1]))
        .filter(|s| !s.is_empty());

    Some(Article {
        id: id.to_string(),
        title,
        link: link.to_string(),
        source: source.to_string(),
        text,
        published_at: entry_date(raw),
        score,
        origin,
        insights: Insights::default(),
    })
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

/// First of `published`, `updated`, `created` that parses.
pub fn entry_date(raw: &RawEntry) -> Option<NaiveDateTime> {
    [&raw.published, &raw.updated, &raw.created]
        .into_iter()
        .flatten()
        .find_map(|s| parse_timestamp(s))
}

/// Parse the date formats seen in feeds, normalized to naive UTC.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Strip tags, decode entities, collapse whitespace.
///
/// Works on fragments and broken markup alike: anything between `<` and the
/// next `>` goes, a lone `<` stays.
pub fn clean_text(html: &str) -> String {
    let stripped = TAG_RE.replace_all(html, " ");
    let decoded = html_escape::decode_html_entities(&stripped);
    WS_RE.replace_all(&decoded, " ").trim().to_string()
}

/// Cut `text` to `max` characters, marking the cut.
///
/// Text of at most `max` characters is returned untouched.
pub fn truncate_text(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => format!("{}{}", &text[..byte_idx], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(text_mode: TextMode) -> NormalizeOptions {
        NormalizeOptions {
            text_mode,
            prefer_guid: false,
        }
    }

    fn raw(title: &str, link: &str) -> RawEntry {
        RawEntry {
            title: Some(title.to_string()),
            link: Some(link.to_string()),
            ..RawEntry::default()
        }
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(
            clean_text("<p>Hello&nbsp;<b>world</b></p>\n\n<p>again &amp; again</p>"),
            "Hello world again & again"
        );
    }

    #[test]
    fn test_clean_text_tolerates_broken_markup() {
        assert_eq!(clean_text("a < b and <i>c"), "a c");
        assert_eq!(clean_text("1 < 2"), "1 < 2");
        assert_eq!(clean_text("<div class=\"x\"\n>text</div"), "text</div");
        assert_eq!(clean_text(""), "");
    }

    #[test]
    fn test_truncate_text_at_exact_limit_is_untouched() {
        let text = "a".repeat(200);
        assert_eq!(truncate_text(&text, 200), text);
    }

    #[test]
    fn test_truncate_text_marks_cut() {
        let text = "a".repeat(201);
        let cut = truncate_text(&text, 200);
        assert_eq!(cut, format!("{}{}", "a".repeat(200), TRUNCATION_MARKER));
    }

    #[test]
    fn test_truncate_text_counts_chars_not_bytes() {
        let text = "é".repeat(10);
        assert_eq!(truncate_text(&text, 10), text);
        assert_eq!(truncate_text(&text, 3), "ééé...");
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 5, 6)
            .unwrap()
            .and_hms_opt(14, 30, 0)
            .unwrap();
        assert_eq!(parse_timestamp("Tue, 06 May 2025 14:30:00 GMT"), Some(expected));
        assert_eq!(parse_timestamp("Tue, 06 May 2025 16:30:00 +0200"), Some(expected));
        assert_eq!(parse_timestamp("2025-05-06T14:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2025-05-06T10:30:00-04:00"), Some(expected));
        assert_eq!(parse_timestamp("2025-05-06T14:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2025-05-06 14:30:00"), Some(expected));
        assert_eq!(
            parse_timestamp("2025-05-06"),
            NaiveDate::from_ymd_opt(2025, 5, 6).unwrap().and_hms_opt(0, 0, 0)
        );
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp("  "), None);
    }

    #[test]
    fn test_entry_date_priority() {
        let mut entry = raw("t", "l");
        entry.published = Some("not a date".to_string());
        entry.updated = Some("2025-05-02T00:00:00Z".to_string());
        entry.created = Some("2025-05-01T00:00:00Z".to_string());
        assert_eq!(entry_date(&entry), parse_timestamp("2025-05-02T00:00:00Z"));

        entry.published = Some("2025-05-03T00:00:00Z".to_string());
        assert_eq!(entry_date(&entry), parse_timestamp("2025-05-03T00:00:00Z"));

        let undated = raw("t", "l");
        assert_eq!(entry_date(&undated), None);
    }

    #[test]
    fn test_normalize_drops_entries_without_title_or_link() {
        let o = opts(TextMode::Summary);
        assert!(normalize_entry(&raw("", "https://x"), "S", o).is_none());
        assert!(normalize_entry(&raw("  ", "https://x"), "S", o).is_none());
        assert!(normalize_entry(&raw("T", ""), "S", o).is_none());
        assert!(normalize_entry(&RawEntry::default(), "S", o).is_none());
    }

    #[test]
    fn test_normalize_keeps_undated_entries() {
        let article = normalize_entry(&raw("T", "https://x/1"), "S", opts(TextMode::Summary)).unwrap();
        assert_eq!(article.id, "https://x/1");
        assert_eq!(article.source, "S");
        assert_eq!(article.published_at, None);
        assert_eq!(article.text, "");
    }

    #[test]
    fn test_normalize_id_is_stable_and_guid_aware() {
        let mut entry = raw("T", "https://x/1");
        entry.guid = Some("guid-1".to_string());

        let by_link = normalize_entry(&entry, "S", opts(TextMode::Summary)).unwrap();
        assert_eq!(by_link.id, "https://x/1");
        assert_eq!(
            by_link.id,
            normalize_entry(&entry, "S", opts(TextMode::Summary)).unwrap().id
        );

        let guid_opts = NormalizeOptions {
            text_mode: TextMode::Summary,
            prefer_guid: true,
        };
        assert_eq!(normalize_entry(&entry, "S", guid_opts).unwrap().id, "guid-1");

        entry.guid = None;
        assert_eq!(normalize_entry(&entry, "S", guid_opts).unwrap().id, "https://x/1");
    }

    #[test]
    fn test_normalize_text_modes() {
        let mut entry = raw("T", "https://x/1");
        entry.summary = Some("<p>short</p>".to_string());
        entry.content = Some(format!("<p>{}</p>", "long ".repeat(100)));

        let summary = normalize_entry(&entry, "S", opts(TextMode::Summary)).unwrap();
        assert_eq!(summary.text, "short");

        let content = normalize_entry(&entry, "S", opts(TextMode::Content)).unwrap();
        assert!(content.text.starts_with("long long"));
        assert!(!content.text.ends_with(TRUNCATION_MARKER));

        entry.summary = None;
        let fallback = normalize_entry(&entry, "S", opts(TextMode::Summary)).unwrap();
        assert!(fallback.text.ends_with(TRUNCATION_MARKER));
        assert_eq!(
            fallback.text.chars().count(),
            TextMode::Summary.max_chars() + TRUNCATION_MARKER.len()
        );
    }

    #[test]
    fn test_normalize_annotated_description() {
        let mut entry = raw("Agents in production", "https://bestblogs.dev/a/1");
        entry.summary = Some(
            r#"<div><span class="k">AI Score</span><span class="v">92</span>
               <span>Source</span><span>Example &amp; Co</span>
               <h3>One-Sentence Summary</h3><p class="s">Agents need guardrails.</p>
               <h3>Summary</h3><p>Longer text.</p></div>"#
                .to_string(),
        );

        let article = normalize_entry(&entry, "BestBlogs", opts(TextMode::Summary)).unwrap();
        assert_eq!(article.score, Some(92));
        assert_eq!(article.origin.as_deref(), Some("Example & Co"));
        assert_eq!(article.text, "Agents need guardrails.");
    }

    #[test]
    fn test_normalize_summary_section_without_one_sentence() {
        let mut entry = raw("T", "https://x/1");
        entry.summary = Some("<h3>Summary</h3><p>Just this part.</p><p>Not this.</p>".to_string());

        let article = normalize_entry(&entry, "S", opts(TextMode::Summary)).unwrap();
        assert_eq!(article.text, "Just this part.");
        assert_eq!(article.score, None);
        assert_eq!(article.origin, None);
    }

    #[test]
    fn test_normalize_collapses_title_whitespace() {
        let article =
            normalize_entry(&raw("  A\n   title ", "https://x"), "S", opts(TextMode::Summary)).unwrap();
        assert_eq!(article.title, "A title");
    }
}
