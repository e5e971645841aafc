use once_cell::sync::Lazy;
use regex::Regex;

use super::{attribute, discover_image, first_non_empty, inner_text, tag_text, RawItem};

static ENTRY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<entry(?:\s[^>]*)?>(.*?)</entry\s*>").expect("entry pattern is valid")
});
static LINK_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<link\b[^>]*>").expect("link pattern is valid"));

/// Extract every `<entry>` block of an Atom document.
pub(crate) fn extract_entries(xml: &str) -> Vec<RawItem> {
    ENTRY
        .captures_iter(xml)
        .filter_map(|caps| caps.get(1))
        .map(|block| extract_entry(block.as_str()))
        .collect()
}

fn extract_entry(block: &str) -> RawItem {
    let summary = tag_text(block, "summary");
    let content = tag_text(block, "content");

    RawItem {
        title: tag_text(block, "title").map(str::to_string),
        link: entry_link(block),
        description: first_non_empty(block, &["summary", "content"]).map(str::to_string),
        published: first_non_empty(block, &["published", "updated"]).map(str::to_string),
        content: content.map(str::to_string),
        author: entry_author(block),
        image: discover_image(block, &[content, summary]),
    }
}

/// `rel="alternate"` wins; otherwise the first link carrying an href.
fn entry_link(block: &str) -> Option<String> {
    let links: Vec<(Option<String>, String)> = LINK_TAG
        .find_iter(block)
        .filter_map(|tag| {
            let href = attribute(tag.as_str(), "href").filter(|h| !h.is_empty())?;
            Some((attribute(tag.as_str(), "rel"), href))
        })
        .collect();

    links
        .iter()
        .find(|(rel, _)| {
            rel.as_deref()
                .map(|r| r.eq_ignore_ascii_case("alternate"))
                .unwrap_or(false)
        })
        .or_else(|| links.first())
        .map(|(_, href)| href.clone())
}

fn entry_author(block: &str) -> Option<String> {
    let author = tag_text(block, "author")?;
    tag_text(author, "name")
        .map(str::to_string)
        .filter(|name| !inner_text(name).trim().is_empty())
}
