//! Permissive RSS 2.0 / RSS 1.0 / Atom entry extraction on top of `quick-xml`.
//!
//! The reader walks the event stream once and collects the handful of fields
//! the normalizer cares about from every `<item>` or `<entry>`. Elements it
//! does not recognise are skipped, and markup nested inside a captured field
//! (Atom `type="xhtml"` content, stray tags in descriptions) is flattened to
//! text. A document that stops being well-formed after some entries were
//! read still yields those entries.

use crate::models::RawEntry;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("XML parse error at byte {position}: {message}")]
    Xml { position: u64, message: String },
    #[error("document is not an RSS or Atom feed")]
    NotAFeed,
}

/// Which [`RawEntry`] slot a text node belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Guid,
    Title,
    Link,
    Published,
    Updated,
    Created,
    Summary,
    Content,
}

impl Field {
    fn from_tag(name: &str) -> Option<Self> {
        let field = match name {
            "guid" | "id" => Field::Guid,
            "title" => Field::Title,
            "link" => Field::Link,
            "pubdate" | "published" | "issued" => Field::Published,
            "updated" | "modified" | "dc:date" => Field::Updated,
            "created" | "dcterms:created" => Field::Created,
            "description" | "summary" => Field::Summary,
            "content:encoded" | "content" => Field::Content,
            _ => return None,
        };
        Some(field)
    }

    /// Markup-bearing fields keep CDATA verbatim for the HTML cleaner.
    fn is_markup(self) -> bool {
        matches!(self, Field::Summary | Field::Content)
    }
}

/// The field currently being captured inside an entry.
struct Capture {
    field: Field,
    /// Nesting depth of child elements inside the captured element.
    depth: usize,
    text: String,
}

/// Extract every entry of an RSS or Atom document, in document order.
///
/// Only direct children of `<item>`/`<entry>` fill entry fields; nested
/// containers such as Atom `<source>` or `<author>` are skipped.
///
/// # Errors
///
/// [`ParseError::Xml`] when the document is broken before any entry was
/// complete, [`ParseError::NotAFeed`] when it has no feed root and no entries.
pub fn parse_feed(xml: &[u8]) -> Result<Vec<RawEntry>, ParseError> {
    // Text is trimmed per field in `store`; trimming events would eat the
    // spaces around entity references.
    let mut reader = Reader::from_reader(xml);

    let mut entries = Vec::new();
    let mut buf = Vec::new();
    let mut saw_feed_root = false;

    let mut current: Option<RawEntry> = None;
    let mut capture: Option<Capture> = None;
    // Depth of non-field elements (`<source>`, `<author>`) open inside the
    // current entry. Only direct children of the entry are captured.
    let mut foreign_depth = 0usize;

    loop {
        let event = match reader.read_event_into(&mut buf) {
            Ok(event) => event,
            Err(e) => {
                let position = reader.buffer_position() as u64;
                if entries.is_empty() {
                    return Err(ParseError::Xml {
                        position,
                        message: e.to_string(),
                    });
                }
                warn!(position, error = %e, kept = entries.len(), "Feed became malformed; keeping entries read so far");
                break;
            }
        };

        match event {
            Event::Start(e) => {
                let name = tag_name(&e);
                if matches!(name.as_str(), "rss" | "feed" | "rdf:rdf" | "channel") {
                    saw_feed_root = true;
                }
                if let Some(cap) = capture.as_mut() {
                    cap.depth += 1;
                    cap.text.push(' ');
                } else if is_entry_tag(&name) && current.is_none() {
                    current = Some(RawEntry::default());
                    foreign_depth = 0;
                } else if let Some(entry) = current.as_mut() {
                    let field = if foreign_depth == 0 {
                        Field::from_tag(&name)
                    } else {
                        None
                    };
                    match field {
                        Some(Field::Link) => {
                            // Atom carries the permalink in an attribute.
                            if let Some(href) = alternate_href(&e) {
                                entry.link.get_or_insert(href);
                            }
                            capture = Some(Capture {
                                field: Field::Link,
                                depth: 0,
                                text: String::new(),
                            });
                        }
                        Some(field) => {
                            capture = Some(Capture {
                                field,
                                depth: 0,
                                text: String::new(),
                            });
                        }
                        None => foreign_depth += 1,
                    }
                }
            }
            Event::Empty(e) => {
                let name = tag_name(&e);
                if let Some(cap) = capture.as_mut() {
                    cap.text.push(' ');
                } else if name == "link" && foreign_depth == 0 {
                    if let (Some(entry), Some(href)) = (current.as_mut(), alternate_href(&e)) {
                        entry.link.get_or_insert(href);
                    }
                }
            }
            Event::End(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_lowercase();
                let nested = capture.as_ref().is_some_and(|c| c.depth > 0);
                if nested {
                    if let Some(cap) = capture.as_mut() {
                        cap.depth -= 1;
                        cap.text.push(' ');
                    }
                } else if let Some(cap) = capture.take() {
                    if let Some(entry) = current.as_mut() {
                        store(entry, cap);
                    }
                } else if current.is_some() && foreign_depth > 0 {
                    foreign_depth -= 1;
                } else if is_entry_tag(&name) {
                    if let Some(entry) = current.take() {
                        entries.push(entry);
                    }
                }
            }
            Event::Text(t) => {
                if let Some(cap) = capture.as_mut() {
                    let raw = String::from_utf8_lossy(&t);
                    cap.text.push_str(&html_escape::decode_html_entities(&raw));
                }
            }
            Event::GeneralRef(r) => {
                if let Some(cap) = capture.as_mut() {
                    let name = String::from_utf8_lossy(&r);
                    let reference = format!("&{name};");
                    cap.text
                        .push_str(&html_escape::decode_html_entities(&reference));
                }
            }
            Event::CData(c) => {
                if let Some(cap) = capture.as_mut() {
                    let raw = String::from_utf8_lossy(&c);
                    if cap.field.is_markup() {
                        cap.text.push_str(&raw);
                    } else {
                        cap.text.push_str(&html_escape::decode_html_entities(&raw));
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !saw_feed_root && entries.is_empty() {
        return Err(ParseError::NotAFeed);
    }
    debug!(count = entries.len(), "Parsed feed entries");
    Ok(entries)
}

fn tag_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).to_lowercase()
}

fn is_entry_tag(name: &str) -> bool {
    name == "item" || name == "entry"
}

/// `href` of an Atom `<link>` that points at the entry itself.
fn alternate_href(e: &BytesStart<'_>) -> Option<String> {
    let mut href = None;
    let mut rel = None;
    for attr in e.attributes().flatten() {
        let value = String::from_utf8_lossy(&attr.value);
        let value = html_escape::decode_html_entities(&value).trim().to_string();
        match attr.key.as_ref() {
            b"href" => href = Some(value),
            b"rel" => rel = Some(value),
            _ => {}
        }
    }
    match rel.as_deref() {
        None | Some("alternate") => href.filter(|h| !h.is_empty()),
        _ => None,
    }
}

/// First non-empty value wins, so `<pubDate>` is not clobbered by `<dc:date>`.
fn store(entry: &mut RawEntry, cap: Capture) {
    let text = cap.text.trim();
    if text.is_empty() {
        return;
    }
    let slot = match cap.field {
        Field::Guid => &mut entry.guid,
        Field::Title => &mut entry.title,
        Field::Link => &mut entry.link,
        Field::Published => &mut entry.published,
        Field::Updated => &mut entry.updated,
        Field::Created => &mut entry.created,
        Field::Summary => &mut entry.summary,
        Field::Content => &mut entry.content,
    };
    if slot.is_none() {
        *slot = Some(text.to_string());
    }
}
