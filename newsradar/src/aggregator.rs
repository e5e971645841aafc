use std::collections::HashSet;
use std::sync::Arc;

use common::{Article, CacheConfig, FeedSource};
use futures::future::join_all;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::ingestion::{self, FeedFetcher};
use crate::resilience::TtlCache;
use crate::sources::SourceCatalog;

/// What a caller wants to read: a country's feeds, optionally narrowed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewsQuery {
    pub country: String,
    #[serde(default)]
    pub category: Option<String>,
    /// Free-text filter on title and description
    #[serde(default)]
    pub query: Option<String>,
}

impl NewsQuery {
    pub fn headlines(country: impl Into<String>) -> Self {
        Self {
            country: country.into(),
            category: None,
            query: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    fn search_text(&self) -> Option<&str> {
        self.query.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }

    fn category(&self) -> Option<&str> {
        self.category.as_deref().map(str::trim).filter(|c| !c.is_empty())
    }

    pub fn cache_key(&self) -> String {
        format!(
            "{}|{}|{}",
            self.country.trim().to_lowercase(),
            self.category().unwrap_or("").to_lowercase(),
            self.search_text().unwrap_or("").to_lowercase()
        )
    }
}

/// Entry counts of the two result caches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSizes {
    pub headlines: usize,
    pub search: usize,
}

/// Fans out to every selected source, merges what comes back and caches the result.
pub struct NewsAggregator {
    catalog: SourceCatalog,
    fetcher: Arc<dyn FeedFetcher>,
    headlines: TtlCache<Arc<Vec<Article>>>,
    search: TtlCache<Arc<Vec<Article>>>,
}

impl NewsAggregator {
    pub fn new(
        catalog: SourceCatalog,
        fetcher: Arc<dyn FeedFetcher>,
        cache: &CacheConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            catalog,
            fetcher,
            headlines: TtlCache::new("headlines", cache.headlines_ttl(), cache.max_entries(), clock.clone()),
            search: TtlCache::new("search", cache.search_ttl(), cache.max_entries(), clock),
        }
    }

    pub fn catalog(&self) -> &SourceCatalog {
        &self.catalog
    }

    pub fn cache_sizes(&self) -> CacheSizes {
        CacheSizes {
            headlines: self.headlines.len(),
            search: self.search.len(),
        }
    }

    /// Cached read-through fetch. Never fails: sources that error or time out contribute nothing.
    pub async fn fetch_news(&self, query: &NewsQuery) -> Arc<Vec<Article>> {
        let key = query.cache_key();
        if let Some(hit) = self.cache_for(query).get(&key) {
            debug!(key = %key, articles = hit.len(), "news cache hit");
            return hit;
        }
        self.refresh(query).await
    }

    /// Fetch bypassing the cache lookup. The result replaces the cached entry unless every
    /// source failed.
    pub async fn refresh(&self, query: &NewsQuery) -> Arc<Vec<Article>> {
        let sources = self.catalog.select(&query.country, query.category());
        if sources.is_empty() {
            info!(country = %query.country, category = ?query.category, "no sources configured for query");
        }

        let fetched = join_all(sources.iter().map(|source| self.fetch_source(source))).await;
        let succeeded = fetched.iter().filter(|result| result.is_some()).count();
        let merged: Vec<Article> = fetched.into_iter().flatten().flatten().collect();
        let articles = Arc::new(merge_articles(merged, query.search_text()));

        info!(
            country = %query.country,
            sources = sources.len(),
            succeeded,
            articles = articles.len(),
            "aggregated news"
        );
        // Only cache batches backed by at least one answering source
        if succeeded > 0 {
            self.cache_for(query).set(query.cache_key(), articles.clone());
        }
        articles
    }

    /// `None` when the source failed or timed out.
    async fn fetch_source(&self, source: &FeedSource) -> Option<Vec<Article>> {
        match ingestion::fetch_and_parse_feed(self.fetcher.as_ref(), &source.url, &source.display_name).await {
            Ok(articles) => {
                debug!(source = %source.display_name, articles = articles.len(), "fetched source");
                Some(articles)
            }
            Err(e) => {
                warn!(source = %source.display_name, url = %source.url, error = %e, "source fetch failed");
                None
            }
        }
    }

    fn cache_for(&self, query: &NewsQuery) -> &TtlCache<Arc<Vec<Article>>> {
        if query.search_text().is_some() {
            &self.search
        } else {
            &self.headlines
        }
    }
}

/// Filter, order newest first and drop near-duplicate titles (the newest copy is kept).
pub fn merge_articles(mut articles: Vec<Article>, query: Option<&str>) -> Vec<Article> {
    if let Some(q) = query {
        articles.retain(|a| a.matches_query(q));
    }
    // Stable sort keeps source order among equal timestamps
    articles.sort_by(|a, b| b.published_at.cmp(&a.published_at));

    let mut seen = HashSet::new();
    articles.retain(|a| seen.insert(a.dedupe_key()));
    articles
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn article(title: &str, description: &str, hour: u32, source: &str) -> Article {
        Article {
            source_name: source.to_string(),
            author: None,
            title: title.to_string(),
            description: Some(description.to_string()),
            url: String::new(),
            image_url: None,
            published_at: Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap(),
            content: None,
        }
    }

    #[test]
    fn near_duplicates_keep_the_newest() {
        let base = "Central bank announces a surprise interest rate decision for the quarter";
        let older = article(&format!("{} (update)", base), "", 8, "A");
        let newer = article(&format!("{} - live", base.to_uppercase()), "", 10, "B");
        let other = article("Unrelated story", "", 9, "C");

        let merged = merge_articles(vec![older, other, newer], None);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].source_name, "B");
        assert_eq!(merged[1].source_name, "C");
    }

    #[test]
    fn short_titles_differing_within_sixty_chars_are_kept() {
        let merged = merge_articles(
            vec![
                article("Markets rally as Fed signals pause", "", 8, "A"),
                article("Markets rally as Fed signals a pause today", "", 10, "B"),
            ],
            None,
        );
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn query_filters_before_dedupe() {
        let merged = merge_articles(
            vec![
                article("Oil climbs", "OPEC output", 1, "A"),
                article("Stocks slide", "Tech selloff", 2, "B"),
            ],
            Some("opec"),
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].title, "Oil climbs");
    }

    #[test]
    fn cache_key_normalizes_case_and_blanks() {
        let a = NewsQuery::headlines("US").with_category("Business").with_query(" Fed ");
        let b = NewsQuery::headlines("us").with_category("business").with_query("fed");
        assert_eq!(a.cache_key(), b.cache_key());

        let blank = NewsQuery::headlines("us").with_query("  ");
        assert_eq!(blank.cache_key(), NewsQuery::headlines("us").cache_key());
        assert!(blank.search_text().is_none());
    }
}
