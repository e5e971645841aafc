use common::{Config, FeedSource};

/// Category every country is expected to carry; used when a requested category has no feeds.
pub const GENERAL_CATEGORY: &str = "general";

// (url, display name, country, category, language)
const BUILTIN_FEEDS: &[(&str, &str, &str, &str, &str)] = &[
    ("https://feeds.npr.org/1001/rss.xml", "NPR News", "us", "general", "en"),
    ("https://rss.nytimes.com/services/xml/rss/nyt/HomePage.xml", "New York Times", "us", "general", "en"),
    ("https://feeds.npr.org/1006/rss.xml", "NPR Business", "us", "business", "en"),
    ("https://www.cnbc.com/id/100003114/device/rss/rss.html", "CNBC", "us", "business", "en"),
    ("https://feeds.arstechnica.com/arstechnica/index", "Ars Technica", "us", "technology", "en"),
    ("https://www.theverge.com/rss/index.xml", "The Verge", "us", "technology", "en"),
    ("https://feeds.bbci.co.uk/news/rss.xml", "BBC News", "gb", "general", "en"),
    ("https://www.theguardian.com/uk/rss", "The Guardian", "gb", "general", "en"),
    ("https://feeds.bbci.co.uk/news/business/rss.xml", "BBC Business", "gb", "business", "en"),
    ("https://feeds.bbci.co.uk/news/technology/rss.xml", "BBC Technology", "gb", "technology", "en"),
    ("https://www.lemonde.fr/rss/une.xml", "Le Monde", "fr", "general", "fr"),
    ("https://www.lemonde.fr/economie/rss_full.xml", "Le Monde Économie", "fr", "business", "fr"),
    ("https://www.tagesschau.de/xml/rss2", "Tagesschau", "de", "general", "de"),
    ("https://www.chinadaily.com.cn/rss/china_rss.xml", "China Daily", "cn", "general", "zh"),
    ("https://www.chinadaily.com.cn/rss/bizchina_rss.xml", "China Daily Business", "cn", "business", "zh"),
    ("https://www3.nhk.or.jp/rss/news/cat0.xml", "NHK", "jp", "general", "ja"),
];

/// Static set of feed descriptors the aggregator can fan out to.
#[derive(Debug, Clone)]
pub struct SourceCatalog {
    sources: Vec<FeedSource>,
}

impl SourceCatalog {
    pub fn new(sources: Vec<FeedSource>) -> Self {
        Self { sources }
    }

    pub fn builtin() -> Self {
        Self::new(
            BUILTIN_FEEDS
                .iter()
                .map(|(url, name, country, category, language)| FeedSource {
                    url: url.to_string(),
                    display_name: name.to_string(),
                    country: country.to_string(),
                    category: category.to_string(),
                    language: language.to_string(),
                })
                .collect(),
        )
    }

    /// `[[feeds]]` from the config replace the built-in catalog entirely.
    pub fn from_config(config: &Config) -> Self {
        if config.feeds.is_empty() {
            Self::builtin()
        } else {
            Self::new(config.feeds.clone())
        }
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn all(&self) -> &[FeedSource] {
        &self.sources
    }

    /// Feeds for a country, optionally narrowed to a category.
    ///
    /// An unknown category falls back to the country's general feeds rather than nothing.
    pub fn select(&self, country: &str, category: Option<&str>) -> Vec<FeedSource> {
        let in_country: Vec<&FeedSource> = self
            .sources
            .iter()
            .filter(|s| s.country.eq_ignore_ascii_case(country.trim()))
            .collect();

        let Some(category) = category.map(str::trim).filter(|c| !c.is_empty()) else {
            return in_country.into_iter().cloned().collect();
        };

        let exact: Vec<FeedSource> = in_country
            .iter()
            .filter(|s| s.category.eq_ignore_ascii_case(category))
            .map(|s| (*s).clone())
            .collect();
        if !exact.is_empty() {
            return exact;
        }

        in_country
            .into_iter()
            .filter(|s| s.category.eq_ignore_ascii_case(GENERAL_CATEGORY))
            .cloned()
            .collect()
    }
}

impl Default for SourceCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
