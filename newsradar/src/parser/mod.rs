//! Tolerant RSS 2.0 / Atom extraction.
//!
//! This is not an XML parser. Repeating blocks (`<item>`, `<entry>`) are located with
//! non-greedy scans and a fixed set of known child tags is pulled out of each block. A block
//! that does not yield a usable title is skipped; the rest of the document is still returned.

use chrono::{DateTime, NaiveDateTime, Utc};
use common::Article;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use tracing::debug;

use crate::sanitize::{decode_entities, sanitize_markup, sanitize_text, sanitize_url};

mod atom;
mod rss;

/// Maximum characters kept in `Article::content`
pub const CONTENT_MAX_CHARS: usize = 500;

/// Titles some aggregators publish for retracted items
const REMOVED_SENTINEL: &str = "[Removed]";

/// Child tags the extractors are allowed to look up.
const KNOWN_TAGS: &[&str] = &[
    "title",
    "link",
    "guid",
    "description",
    "pubDate",
    "dc:date",
    "content:encoded",
    "content",
    "dc:creator",
    "author",
    "summary",
    "published",
    "updated",
    "name",
];

const KNOWN_ATTRIBUTES: &[&str] = &["url", "href", "rel", "src", "type"];

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("feed pattern is valid")
}

static TAG_PATTERNS: Lazy<HashMap<&'static str, Regex>> = Lazy::new(|| {
    KNOWN_TAGS
        .iter()
        .map(|name| {
            let escaped = regex::escape(name);
            (
                *name,
                compile(&format!(r"(?is)<{escaped}(\s[^>]*)?>(.*?)</{escaped}\s*>")),
            )
        })
        .collect()
});

static ATTRIBUTE_PATTERNS: Lazy<HashMap<&'static str, Regex>> = Lazy::new(|| {
    KNOWN_ATTRIBUTES
        .iter()
        .map(|name| {
            (
                *name,
                compile(&format!(
                    r#"(?is)\s{name}\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#
                )),
            )
        })
        .collect()
});

static FEED_ROOT: Lazy<Regex> = Lazy::new(|| compile(r"(?i)<feed\b"));
static ENTRY_OPEN: Lazy<Regex> = Lazy::new(|| compile(r"(?i)<entry\b"));
static CDATA: Lazy<Regex> = Lazy::new(|| compile(r"(?s)<!\[CDATA\[(.*?)\]\]>"));
static MEDIA_TAG: Lazy<Regex> =
    Lazy::new(|| compile(r"(?is)<(?:media:content|media:thumbnail|enclosure)\b[^>]*>"));
static MEDIA_CONTENT_TAG: Lazy<Regex> = Lazy::new(|| compile(r"(?is)<media:content\b[^>]*>"));
static IMG_TAG: Lazy<Regex> = Lazy::new(|| compile(r"(?is)<img\b[^>]*>"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedFormat {
    Rss,
    Atom,
}

/// Structural sniffing: a `<feed>` root holding `<entry>` elements is Atom, anything else is
/// scanned for RSS `<item>`s.
pub fn detect_format(xml: &str) -> FeedFormat {
    if FEED_ROOT.is_match(xml) && ENTRY_OPEN.is_match(xml) {
        FeedFormat::Atom
    } else {
        FeedFormat::Rss
    }
}

/// Parse a feed document, using the current time for unparsable publish dates.
pub fn parse_feed(xml: &str, source_name: &str) -> Vec<Article> {
    parse_feed_at(xml, source_name, Utc::now())
}

/// Parse raw response bytes. Invalid UTF-8 is replaced rather than rejected.
pub fn parse_feed_bytes(bytes: &[u8], source_name: &str) -> Vec<Article> {
    let text = String::from_utf8_lossy(bytes);
    parse_feed(text.trim_start_matches('\u{feff}'), source_name)
}

/// Parse a feed document with an explicit fallback timestamp.
pub fn parse_feed_at(xml: &str, source_name: &str, now: DateTime<Utc>) -> Vec<Article> {
    let raw_items = match detect_format(xml) {
        FeedFormat::Atom => atom::extract_entries(xml),
        FeedFormat::Rss => rss::extract_items(xml),
    };
    let total = raw_items.len();

    let articles: Vec<Article> = raw_items
        .into_iter()
        .filter_map(|raw| raw.into_article(source_name, now))
        .collect();

    if articles.len() < total {
        debug!(
            source = source_name,
            skipped = total - articles.len(),
            "skipped feed items without a usable title"
        );
    }
    articles
}

/// Fields as found in one item/entry block, before cleaning.
#[derive(Debug, Default)]
pub(crate) struct RawItem {
    pub title: Option<String>,
    pub link: Option<String>,
    pub description: Option<String>,
    pub published: Option<String>,
    pub content: Option<String>,
    pub author: Option<String>,
    pub image: Option<String>,
}

impl RawItem {
    fn into_article(self, source_name: &str, now: DateTime<Utc>) -> Option<Article> {
        let title = clean_text(self.title.as_deref()?);
        if title.is_empty() || title == REMOVED_SENTINEL {
            return None;
        }

        let content = self
            .content
            .as_deref()
            .map(clean_text)
            .map(|c| truncate_chars(&c, CONTENT_MAX_CHARS))
            .filter(|c| !c.is_empty());

        Some(Article {
            source_name: sanitize_text(source_name),
            author: self.author.as_deref().map(clean_text).filter(|a| !a.is_empty()),
            title,
            description: self
                .description
                .as_deref()
                .map(clean_text)
                .filter(|d| !d.is_empty()),
            url: self.link.as_deref().map(clean_url).unwrap_or_default(),
            image_url: self.image.filter(|i| !i.is_empty()),
            published_at: self
                .published
                .as_deref()
                .and_then(|p| parse_date(&inner_text(p)))
                .unwrap_or(now),
            content,
        })
    }
}

/// Inner text of the first `<name>` element in `block`.
pub(crate) fn tag_text<'a>(block: &'a str, name: &str) -> Option<&'a str> {
    let pattern = TAG_PATTERNS.get(name)?;
    pattern
        .captures_iter(block)
        .find(|caps| {
            // `<link href="..."/>` followed by a later `</link>` is not an element body
            caps.get(1)
                .map(|attrs| !attrs.as_str().trim_end().ends_with('/'))
                .unwrap_or(true)
        })
        .and_then(|caps| caps.get(2))
        .map(|m| m.as_str())
}

/// Inner text of the first `<name>` element whose body is not blank.
pub(crate) fn first_non_empty<'a>(block: &'a str, names: &[&str]) -> Option<&'a str> {
    names
        .iter()
        .filter_map(|name| tag_text(block, name))
        .find(|text| !inner_text(text).trim().is_empty())
}

/// Value of attribute `name` inside a single start tag.
pub(crate) fn attribute(tag: &str, name: &str) -> Option<String> {
    let pattern = ATTRIBUTE_PATTERNS.get(name)?;
    let caps = pattern.captures(tag)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .or_else(|| caps.get(3))
        .map(|m| m.as_str().trim().to_string())
}

/// CDATA sections take precedence over the surrounding element text.
pub(crate) fn inner_text(raw: &str) -> String {
    let sections: Vec<&str> = CDATA
        .captures_iter(raw)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect();
    if sections.is_empty() {
        raw.to_string()
    } else {
        sections.concat()
    }
}

/// Markup sanitation, then entity decoding, then tag stripping. Sanitizing before decoding
/// keeps double-encoded payloads (`&amp;lt;script&amp;gt;`) inert.
pub(crate) fn clean_text(raw: &str) -> String {
    let sanitized = sanitize_markup(&inner_text(raw));
    let decoded = decode_entities(&sanitized);
    // Entity-escaped HTML only becomes markup after decoding; sanitize it before stripping
    sanitize_text(&sanitize_markup(&decoded))
}

pub(crate) fn clean_url(raw: &str) -> String {
    sanitize_url(&sanitize_text(&decode_entities(&inner_text(raw))))
}

/// Image discovery: explicit media/enclosure tags in the block, then the first `<img src>` in
/// the item HTML, then the first `media:content` inside that HTML. Unsafe candidates are
/// skipped.
pub(crate) fn discover_image(block: &str, html_fields: &[Option<&str>]) -> Option<String> {
    // CDATA bodies are item HTML, not feed-level media elements
    let outside_cdata = CDATA.replace_all(block, "");
    let explicit = MEDIA_TAG
        .find_iter(&outside_cdata)
        .filter(|tag| is_image_type(tag.as_str()))
        .filter_map(|tag| attribute(tag.as_str(), "url"));

    let html: String = html_fields
        .iter()
        .flatten()
        .map(|raw| decode_entities(&inner_text(raw)))
        .collect::<Vec<_>>()
        .join("\n");
    let inline_img = IMG_TAG
        .find_iter(&html)
        .filter_map(|tag| attribute(tag.as_str(), "src"));
    let inline_media = MEDIA_CONTENT_TAG
        .find_iter(&html)
        .filter_map(|tag| attribute(tag.as_str(), "url"));

    explicit
        .chain(inline_img)
        .chain(inline_media)
        .map(|candidate| sanitize_url(&decode_entities(&candidate)))
        .find(|url| !url.is_empty())
}

fn is_image_type(tag: &str) -> bool {
    match attribute(tag, "type") {
        Some(mime) => mime.to_ascii_lowercase().starts_with("image"),
        None => true,
    }
}

/// RFC 2822, RFC 3339 and a few loose formats seen in the wild.
pub(crate) fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%a, %d %b %Y %H:%M:%S %z", "%Y-%m-%d %H:%M:%S %z"] {
        if let Ok(dt) = DateTime::parse_from_str(value, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%a, %d %b %Y %H:%M:%S",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(naive.and_utc());
        }
    }
    None
}

fn truncate_chars(input: &str, max_chars: usize) -> String {
    match input.char_indices().nth(max_chars) {
        Some((idx, _)) => input[..idx].trim_end().to_string(),
        None => input.to_string(),
    }
}
