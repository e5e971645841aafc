use once_cell::sync::Lazy;
use regex::Regex;

use super::{attribute, discover_image, first_non_empty, tag_text, RawItem};

static ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<item(?:\s[^>]*)?>(.*?)</item\s*>").expect("item pattern is valid"));
static LINK_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<link\b[^>]*>").expect("link pattern is valid"));

/// Extract every `<item>` block of an RSS 2.0 document.
pub(crate) fn extract_items(xml: &str) -> Vec<RawItem> {
    ITEM.captures_iter(xml)
        .filter_map(|caps| caps.get(1))
        .map(|block| extract_item(block.as_str()))
        .collect()
}

fn extract_item(block: &str) -> RawItem {
    let description = tag_text(block, "description");
    let content = first_non_empty(block, &["content:encoded", "content"]);

    RawItem {
        title: tag_text(block, "title").map(str::to_string),
        link: item_link(block),
        description: description.map(str::to_string),
        published: first_non_empty(block, &["pubDate", "dc:date"]).map(str::to_string),
        content: content.map(str::to_string),
        author: first_non_empty(block, &["dc:creator", "author"]).map(str::to_string),
        image: discover_image(block, &[content, description]),
    }
}

/// `<link>` text, then a `<link href>` attribute, then `<guid>`.
fn item_link(block: &str) -> Option<String> {
    if let Some(text) = first_non_empty(block, &["link"]) {
        return Some(text.to_string());
    }
    if let Some(href) = LINK_TAG
        .find_iter(block)
        .filter_map(|tag| attribute(tag.as_str(), "href"))
        .find(|href| !href.is_empty())
    {
        return Some(href);
    }
    first_non_empty(block, &["guid"]).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_encoded_content_and_dc_creator() {
        let block = r#"
            <title>Headline</title>
            <link></link>
            <guid isPermaLink="true">https://news.example/1</guid>
            <dc:creator><![CDATA[Jane Roe]]></dc:creator>
            <author>desk@news.example</author>
            <content:encoded><![CDATA[<p>Full <img src="https://img.example/in.jpg"> body</p>]]></content:encoded>
            <content>short</content>
        "#;
        let raw = extract_item(block);
        assert_eq!(raw.link.as_deref(), Some("https://news.example/1"));
        assert_eq!(raw.author.as_deref(), Some("<![CDATA[Jane Roe]]>"));
        assert!(raw.content.unwrap().contains("Full"));
        assert_eq!(raw.image.as_deref(), Some("https://img.example/in.jpg"));
    }

    #[test]
    fn enclosure_beats_inline_image_and_audio_is_ignored() {
        let block = r#"
            <title>Pod</title>
            <enclosure url="https://cdn.example/ep.mp3" type="audio/mpeg"/>
            <media:thumbnail url="https://cdn.example/thumb.jpg"/>
            <description>&lt;img src="https://cdn.example/inline.jpg"&gt;</description>
        "#;
        let raw = extract_item(block);
        assert_eq!(raw.image.as_deref(), Some("https://cdn.example/thumb.jpg"));
    }

    #[test]
    fn unsafe_image_candidates_are_skipped() {
        let block = r#"
            <title>X</title>
            <media:content url="javascript:alert(1)" medium="image"/>
            <description><![CDATA[<img src="https://cdn.example/ok.png">]]></description>
        "#;
        let raw = extract_item(block);
        assert_eq!(raw.image.as_deref(), Some("https://cdn.example/ok.png"));
    }
}
