use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{Days, NaiveDate};
use common::Article;
use serde::Serialize;
use tracing::debug;

use crate::clock::Clock;

/// Days of history kept, today included
pub const RETENTION_DAYS: u32 = 30;

const MIN_TOKEN_CHARS: usize = 3;

const STOP_WORDS: &[&str] = &[
    "about", "after", "again", "against", "all", "also", "and", "any", "are", "around", "because",
    "been", "before", "being", "between", "both", "but", "can", "could", "did", "does", "doing",
    "down", "during", "each", "few", "for", "from", "further", "had", "has", "have", "having",
    "her", "here", "hers", "him", "his", "how", "into", "its", "just", "last", "many", "more",
    "most", "new", "news", "not", "now", "off", "once", "only", "other", "our", "ours", "out",
    "over", "own", "said", "same", "says", "she", "should", "since", "some", "still", "such",
    "than", "that", "the", "their", "theirs", "them", "then", "there", "these", "they", "this",
    "those", "through", "under", "until", "very", "was", "were", "what", "when", "where",
    "which", "while", "who", "whom", "why", "will", "with", "would", "year", "years", "yet",
    "you", "your", "yours",
];

/// Keyword counts observed on one day
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendDataPoint {
    pub date: NaiveDate,
    pub counts: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: u32,
}

/// A ranked keyword with its per-day series, oldest day first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordTrend {
    pub keyword: String,
    pub total: u32,
    pub series: Vec<DailyCount>,
}

#[derive(Debug, Default)]
struct DayBucket {
    counts: HashMap<String, u32>,
    /// Dedupe keys of articles already counted on this day
    seen: HashSet<String>,
}

/// In-memory daily keyword counter fed with every article the service hands out.
pub struct TrendTracker {
    clock: Arc<dyn Clock>,
    days: Mutex<BTreeMap<NaiveDate, DayBucket>>,
}

/// Lowercased alphanumeric tokens of `text`, without short, numeric or stop-word tokens.
/// Each token appears once, in first-occurrence order.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let mut seen = HashSet::new();
    lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= MIN_TOKEN_CHARS)
        .filter(|t| !t.chars().all(|c| c.is_numeric()))
        .filter(|t| !STOP_WORDS.contains(t))
        .filter(|t| seen.insert(*t))
        .map(str::to_string)
        .collect()
}

impl TrendTracker {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            days: Mutex::new(BTreeMap::new()),
        }
    }

    /// Count the keywords of `articles` under today's date. Returns how many articles were new
    /// for today; an article seen earlier the same day is skipped.
    pub fn record(&self, articles: &[Article]) -> usize {
        let today = self.clock.today();
        let mut days = self.lock();

        let bucket = days.entry(today).or_default();
        let mut counted = 0;
        for article in articles {
            if !bucket.seen.insert(article.dedupe_key()) {
                continue;
            }
            counted += 1;
            let text = match &article.description {
                Some(d) => format!("{} {}", article.title, d),
                None => article.title.clone(),
            };
            for token in tokenize(&text) {
                *bucket.counts.entry(token).or_insert(0) += 1;
            }
        }

        if let Some(cutoff) = today.checked_sub_days(Days::new(RETENTION_DAYS as u64)) {
            let before = days.len();
            days.retain(|date, _| *date > cutoff);
            if days.len() < before {
                debug!(dropped = before - days.len(), "expired trend days");
            }
        }
        counted
    }

    /// Most frequent keywords over the trailing `days` (today included, clamped to 1..=30).
    /// Ties rank alphabetically. Each series has exactly one point per day.
    pub fn top_keywords(&self, days: u32, limit: usize) -> Vec<KeywordTrend> {
        let days = days.clamp(1, RETENTION_DAYS);
        let today = self.clock.today();
        let window: Vec<NaiveDate> = (0..days)
            .rev()
            .filter_map(|back| today.checked_sub_days(Days::new(back as u64)))
            .collect();

        let store = self.lock();
        let mut totals: HashMap<&str, u32> = HashMap::new();
        for date in &window {
            if let Some(bucket) = store.get(date) {
                for (keyword, count) in &bucket.counts {
                    *totals.entry(keyword.as_str()).or_insert(0) += count;
                }
            }
        }

        let mut ranked: Vec<(&str, u32)> = totals.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(limit);

        ranked
            .into_iter()
            .map(|(keyword, total)| KeywordTrend {
                keyword: keyword.to_string(),
                total,
                series: window
                    .iter()
                    .map(|date| DailyCount {
                        date: *date,
                        count: store
                            .get(date)
                            .and_then(|b| b.counts.get(keyword))
                            .copied()
                            .unwrap_or(0),
                    })
                    .collect(),
            })
            .collect()
    }

    /// One point per tracked day, oldest first.
    pub fn snapshot(&self) -> Vec<TrendDataPoint> {
        self.lock()
            .iter()
            .map(|(date, bucket)| TrendDataPoint {
                date: *date,
                counts: bucket.counts.iter().map(|(k, v)| (k.clone(), *v)).collect(),
            })
            .collect()
    }

    pub fn tracked_days(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<NaiveDate, DayBucket>> {
        self.days.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{Duration, TimeZone, Utc};

    fn article(title: &str, description: Option<&str>) -> Article {
        Article {
            source_name: "Wire".into(),
            author: None,
            title: title.into(),
            description: description.map(Into::into),
            url: String::new(),
            image_url: None,
            published_at: Utc::now(),
            content: None,
        }
    }

    fn tracker() -> (Arc<ManualClock>, TrendTracker) {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap()));
        let tracker = TrendTracker::new(clock.clone());
        (clock, tracker)
    }

    #[test]
    fn tokenize_drops_noise() {
        assert_eq!(
            tokenize("The Fed and ECB: rates at 5.25%, says the 2024 outlook. Fed!"),
            vec!["fed", "ecb", "rates", "outlook"]
        );
        assert_eq!(tokenize("AI is up"), Vec::<String>::new());
        assert_eq!(tokenize("Q3 results"), vec!["results"]);
    }

    #[test]
    fn counts_once_per_article_and_day() {
        let (_clock, tracker) = tracker();
        let batch = vec![
            article("Nvidia earnings beat", Some("Nvidia shares jump")),
            article("Tesla recall", Some("Nvidia supplier hit")),
        ];
        assert_eq!(tracker.record(&batch), 2);
        // Same articles again on the same day are not recounted
        assert_eq!(tracker.record(&batch), 0);

        let top = tracker.top_keywords(1, 1);
        assert_eq!(top[0].keyword, "nvidia");
        assert_eq!(top[0].total, 2);
    }

    #[test]
    fn dense_series_over_window() {
        let (clock, tracker) = tracker();
        tracker.record(&[article("Bitcoin rallies", None)]);
        clock.advance(Duration::days(3));
        tracker.record(&[article("Bitcoin slips", None), article("Gold steady", None)]);

        let top = tracker.top_keywords(7, 5);
        assert_eq!(top[0].keyword, "bitcoin");
        assert_eq!(top[0].total, 2);
        for trend in &top {
            assert_eq!(trend.series.len(), 7);
            assert!(trend.series.windows(2).all(|w| w[0].date < w[1].date));
        }
        assert_eq!(top[0].series.last().unwrap().date, clock.today());
        let counts: Vec<u32> = top[0].series.iter().map(|p| p.count).collect();
        assert_eq!(counts, vec![0, 0, 0, 1, 0, 0, 1]);
        // Ties broken alphabetically
        let tied: Vec<&str> = top[1..].iter().map(|t| t.keyword.as_str()).collect();
        assert_eq!(tied, vec!["gold", "rallies", "slips", "steady"]);
    }

    #[test]
    fn days_are_clamped() {
        let (_clock, tracker) = tracker();
        tracker.record(&[article("Inflation cools", None)]);
        assert_eq!(tracker.top_keywords(0, 10)[0].series.len(), 1);
        assert_eq!(tracker.top_keywords(365, 10)[0].series.len(), 30);
        assert!(tracker.top_keywords(7, 0).is_empty());
    }

    #[test]
    fn old_days_expire() {
        let (clock, tracker) = tracker();
        tracker.record(&[article("Election results", None)]);
        clock.advance(Duration::days(29));
        tracker.record(&[article("Election recount", None)]);
        assert_eq!(tracker.tracked_days(), 2);

        clock.advance(Duration::days(1));
        tracker.record(&[article("Budget vote", None)]);
        assert_eq!(tracker.tracked_days(), 2);
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot[0].counts.get("election"), Some(&1));
        assert_eq!(snapshot[1].counts.get("budget"), Some(&1));
    }
}
