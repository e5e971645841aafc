use std::collections::{BTreeSet, HashSet};

use common::{Article, MatchField, MatchReason, WatchlistItem};
use serde::Serialize;

/// An article as seen by the watchdog, with the optional extras some callers attach.
#[derive(Debug, Clone)]
pub struct WatchdogSubject {
    pub article: Article,
    pub localized_title: Option<String>,
    pub tags: Vec<String>,
}

impl From<Article> for WatchdogSubject {
    fn from(article: Article) -> Self {
        Self {
            article,
            localized_title: None,
            tags: Vec::new(),
        }
    }
}

/// A subject that matched at least one watchlist term. Built per request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchdogArticle {
    #[serde(flatten)]
    pub article: Article,
    pub localized_title: Option<String>,
    pub tags: Vec<String>,
    pub matched_tickers: BTreeSet<String>,
    pub match_reasons: Vec<MatchReason>,
}

/// Terms a watchlist entry is searched by: ticker, display name and localized name,
/// blanks dropped and case-insensitive repeats removed.
pub fn search_terms(item: &WatchlistItem) -> Vec<String> {
    let mut seen = HashSet::new();
    [
        Some(item.ticker.as_str()),
        Some(item.display_name.as_str()),
        item.localized_name.as_deref(),
    ]
    .into_iter()
    .flatten()
    .map(str::trim)
    .filter(|t| !t.is_empty())
    .filter(|t| seen.insert(t.to_lowercase()))
    .map(str::to_string)
    .collect()
}

/// Subjects mentioning at least one watchlist term, in input order, with every
/// (field, term) hit recorded as a reason.
///
/// Matching is plain case-insensitive substring search, so short tickers can hit inside
/// longer words.
pub fn match_articles(watchlist: &[WatchlistItem], subjects: &[WatchdogSubject]) -> Vec<WatchdogArticle> {
    let terms: Vec<(&WatchlistItem, Vec<(String, String)>)> = watchlist
        .iter()
        .map(|item| {
            let terms = search_terms(item)
                .into_iter()
                .map(|t| {
                    let lowered = t.to_lowercase();
                    (t, lowered)
                })
                .collect();
            (item, terms)
        })
        .collect();

    subjects
        .iter()
        .filter_map(|subject| {
            let title = subject.article.title.to_lowercase();
            let localized = subject.localized_title.as_deref().map(str::to_lowercase);
            let summary = subject.article.description.as_deref().map(str::to_lowercase);
            let tags: Vec<String> = subject.tags.iter().map(|t| t.to_lowercase()).collect();

            let mut reasons = Vec::new();
            let mut tickers = BTreeSet::new();
            for (item, item_terms) in &terms {
                for (term, needle) in item_terms {
                    let hits = [
                        (MatchField::Title, title.contains(needle.as_str())),
                        (
                            MatchField::LocalizedTitle,
                            localized.as_deref().is_some_and(|l| l.contains(needle.as_str())),
                        ),
                        (
                            MatchField::Summary,
                            summary.as_deref().is_some_and(|s| s.contains(needle.as_str())),
                        ),
                        (MatchField::Tags, tags.iter().any(|t| t.contains(needle.as_str()))),
                    ];
                    for (field, hit) in hits {
                        if hit {
                            tickers.insert(item.ticker.clone());
                            reasons.push(MatchReason {
                                field,
                                ticker: item.ticker.clone(),
                                matched_keyword: term.clone(),
                            });
                        }
                    }
                }
            }

            if reasons.is_empty() {
                return None;
            }
            Some(WatchdogArticle {
                article: subject.article.clone(),
                localized_title: subject.localized_title.clone(),
                tags: subject.tags.clone(),
                matched_tickers: tickers,
                match_reasons: reasons,
            })
        })
        .collect()
}
