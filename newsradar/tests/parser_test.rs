use chrono::{DateTime, TimeZone, Utc};
use newsradar::aggregator::merge_articles;
use newsradar::parser::{self, detect_format, parse_feed_at, FeedFormat};

const RSS_FIXTURE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:media="http://search.yahoo.com/mrss/">
<channel>
  <title>Example Wire</title>
  <link>https://wire.example/</link>
  <item>
    <title>Markets rally as &lt;b&gt;Fed&lt;/b&gt; pauses</title>
    <link>https://wire.example/markets?id=1&amp;ref=rss</link>
    <description><![CDATA[<p onclick="steal()">Stocks <a href="javascript:alert(1)">rose</a> sharply.</p><img src="https://img.wire.example/1.jpg">]]></description>
    <pubDate>Tue, 05 Mar 2024 14:30:00 +0000</pubDate>
    <dc:creator>Jane Roe</dc:creator>
  </item>
  <item>
    <title>[Removed]</title>
    <link>https://wire.example/2</link>
  </item>
  <item>
    <title>Podcast: weekly outlook</title>
    <link>javascript:alert(document.cookie)</link>
    <enclosure url="https://cdn.wire.example/ep.mp3" type="audio/mpeg" length="1"/>
    <media:thumbnail url="https://cdn.wire.example/ep.jpg"/>
    <pubDate>not a date</pubDate>
  </item>
  <item><description>no title here</description></item>
</channel>
</rss>"#;

const ATOM_FIXTURE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Dev Blog</title>
  <link href="https://blog.example/"/>
  <updated>2024-03-01T00:00:00Z</updated>
  <entry>
    <title type="html">Release 2.0 &amp; beyond</title>
    <link rel="self" href="https://blog.example/entries/2.atom"/>
    <link rel="alternate" type="text/html" href="https://blog.example/2024/release-2"/>
    <updated>2024-03-02T08:00:00Z</updated>
    <published>2024-03-01T09:15:00+01:00</published>
    <author><name>Ada</name></author>
    <summary>Short &lt;i&gt;summary&lt;/i&gt;</summary>
    <content type="html">&lt;p&gt;Long body&lt;/p&gt;&lt;img src="https://blog.example/hero.png"&gt;</content>
  </entry>
</feed>"#;

fn fallback_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 6, 0, 0, 0).unwrap()
}

#[test]
fn test_rss_fixture() {
    assert_eq!(detect_format(RSS_FIXTURE), FeedFormat::Rss);
    let articles = parse_feed_at(RSS_FIXTURE, "Example Wire", fallback_now());
    assert_eq!(articles.len(), 2, "sentinel and untitled items are dropped");

    let first = &articles[0];
    assert_eq!(first.title, "Markets rally as Fed pauses");
    assert_eq!(first.url, "https://wire.example/markets?id=1&ref=rss");
    assert_eq!(first.description.as_deref(), Some("Stocks rose sharply."));
    assert_eq!(first.author.as_deref(), Some("Jane Roe"));
    assert_eq!(first.image_url.as_deref(), Some("https://img.wire.example/1.jpg"));
    assert_eq!(first.published_at, Utc.with_ymd_and_hms(2024, 3, 5, 14, 30, 0).unwrap());
    assert_eq!(first.source_name, "Example Wire");

    let podcast = &articles[1];
    assert_eq!(podcast.title, "Podcast: weekly outlook");
    assert_eq!(podcast.url, "", "script links are blanked, the article is kept");
    assert_eq!(podcast.image_url.as_deref(), Some("https://cdn.wire.example/ep.jpg"));
    assert_eq!(podcast.published_at, fallback_now());
}

#[test]
fn test_atom_fixture() {
    assert_eq!(detect_format(ATOM_FIXTURE), FeedFormat::Atom);
    let articles = parse_feed_at(ATOM_FIXTURE, "Dev Blog", fallback_now());
    assert_eq!(articles.len(), 1);

    let entry = &articles[0];
    assert_eq!(entry.title, "Release 2.0 & beyond");
    assert_eq!(entry.url, "https://blog.example/2024/release-2");
    assert_eq!(entry.author.as_deref(), Some("Ada"));
    assert_eq!(entry.description.as_deref(), Some("Short summary"));
    assert_eq!(entry.content.as_deref(), Some("Long body"));
    assert_eq!(entry.image_url.as_deref(), Some("https://blog.example/hero.png"));
    assert_eq!(entry.published_at, Utc.with_ymd_and_hms(2024, 3, 1, 8, 15, 0).unwrap());
}

#[test]
fn test_serialized_article_uses_camel_case() {
    let articles = parse_feed_at(RSS_FIXTURE, "Example Wire", fallback_now());
    let json = serde_json::to_value(&articles[0]).unwrap();
    assert_eq!(json["sourceName"], "Example Wire");
    assert_eq!(json["imageUrl"], "https://img.wire.example/1.jpg");
    assert!(json["publishedAt"].as_str().unwrap().starts_with("2024-03-05T14:30:00"));
}

#[test]
fn test_hostile_inputs_never_panic() {
    let inputs = [
        "",
        "<rss><channel><item><title>unterminated",
        "<item><title><![CDATA[open cdata</title></item>",
        "<feed><entry><title>x</title><link href=\"",
        "<item><title>\u{0}\u{0}</title></item>",
        "<<<<>>>>&&&&;;;;",
        "<item><title>ok</title><pubDate>Mon, 99 Foo 9999 99:99:99 +9999</pubDate></item>",
    ];
    for input in inputs {
        let _ = parse_feed_at(input, "fuzz", fallback_now());
    }
    let _ = parser::parse_feed_bytes(&[0xff, 0xfe, b'<', b'i', 0x80], "bytes");
}

#[test]
fn test_bom_and_invalid_utf8_are_tolerated() {
    let mut bytes = "\u{feff}<rss><channel><item><title>Caf".as_bytes().to_vec();
    bytes.push(0xe9); // latin-1 é
    bytes.extend_from_slice(b" opens</title></item></channel></rss>");

    let articles = parser::parse_feed_bytes(&bytes, "Local");
    assert_eq!(articles.len(), 1);
    assert!(articles[0].title.starts_with("Caf"));
    assert!(articles[0].title.ends_with("opens"));
}

#[test]
fn test_near_duplicate_articles_dedupe_to_newer() {
    let early = r#"<rss><channel><item>
        <title>Oil giant reports record quarterly profit amid soaring energy prices worldwide</title>
        <pubDate>Mon, 04 Mar 2024 08:00:00 GMT</pubDate>
    </item></channel></rss>"#;
    let late = r#"<rss><channel><item>
        <title>OIL GIANT REPORTS RECORD QUARTERLY PROFIT AMID SOARING ENERGY PRICES - UPDATED</title>
        <pubDate>Mon, 04 Mar 2024 11:00:00 GMT</pubDate>
    </item></channel></rss>"#;

    let mut all = parse_feed_at(early, "Wire A", fallback_now());
    all.extend(parse_feed_at(late, "Wire B", fallback_now()));
    assert_eq!(all.len(), 2);

    let merged = merge_articles(all, None);
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].source_name, "Wire B");
}

#[test]
fn test_unterminated_tag_in_description_is_stripped() {
    let feed = r#"<rss><channel><item>
        <title>Chip stocks</title>
        <description><![CDATA[<p>hi <img src=x onerror=alert(1)]]></description>
    </item></channel></rss>"#;

    let articles = parse_feed_at(feed, "Wire", fallback_now());
    assert_eq!(articles.len(), 1);
    assert_eq!(articles[0].description.as_deref(), Some("hi"));
}
