use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of leading title characters used to detect near-duplicate articles.
pub const DEDUPE_PREFIX_CHARS: usize = 60;

/// Canonical, sanitized article produced by the feed parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub source_name: String,
    pub author: Option<String>,
    pub title: String,
    pub description: Option<String>,
    /// Sanitized link; empty when the original was unsafe
    pub url: String,
    pub image_url: Option<String>,
    pub published_at: DateTime<Utc>,
    pub content: Option<String>,
}

impl Article {
    /// Lowercased first 60 characters of the title.
    pub fn dedupe_key(&self) -> String {
        self.title
            .chars()
            .take(DEDUPE_PREFIX_CHARS)
            .collect::<String>()
            .to_lowercase()
    }

    /// Case-insensitive substring match against title and description.
    pub fn matches_query(&self, query: &str) -> bool {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        self.title.to_lowercase().contains(&needle)
            || self
                .description
                .as_deref()
                .map(|d| d.to_lowercase().contains(&needle))
                .unwrap_or(false)
    }
}

/// Static feed descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSource {
    pub url: String,
    pub display_name: String,
    /// Lowercase ISO country code (e.g. "us")
    pub country: String,
    pub category: String,
    pub language: String,
}

/// One entry of a user's ticker watchlist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchlistItem {
    pub ticker: String,
    pub display_name: String,
    #[serde(default)]
    pub localized_name: Option<String>,
    #[serde(default)]
    pub exchange: Option<String>,
}

/// Article field a watchdog term matched in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchField {
    Title,
    LocalizedTitle,
    Summary,
    Tags,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchReason {
    pub field: MatchField,
    pub ticker: String,
    pub matched_keyword: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(title: &str, description: Option<&str>) -> Article {
        Article {
            source_name: "Test".into(),
            author: None,
            title: title.into(),
            description: description.map(Into::into),
            url: String::new(),
            image_url: None,
            published_at: Utc::now(),
            content: None,
        }
    }

    #[test]
    fn dedupe_key_counts_chars_not_bytes() {
        let a = article(&"é".repeat(80), None);
        assert_eq!(a.dedupe_key().chars().count(), 60);

        let b = article("Markets Rally As Fed Signals Pause", None);
        assert_eq!(b.dedupe_key(), "markets rally as fed signals pause");
    }

    #[test]
    fn query_matches_title_or_description() {
        let a = article("Oil prices climb", Some("OPEC cuts output again"));
        assert!(a.matches_query("OIL"));
        assert!(a.matches_query("opec"));
        assert!(!a.matches_query("bitcoin"));
        assert!(a.matches_query("  "));
    }

    #[test]
    fn article_serializes_camel_case() {
        let a = article("Title", None);
        let json = serde_json::to_value(&a).unwrap();
        assert!(json.get("sourceName").is_some());
        assert!(json.get("publishedAt").is_some());
        assert!(json.get("imageUrl").is_some());
    }
}
