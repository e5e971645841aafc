use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use common::{Config, FeedSource, RateLimitConfig, RateLimitQuotaConfig};
use newsradar::clock::ManualClock;
use newsradar::ingestion::FeedFetcher;
use newsradar::server::{build_rocket, AppState};
use rocket::http::{ContentType, Status};
use rocket::local::asynchronous::Client;
use serde_json::Value;

const FEED: &str = r#"<rss><channel>
  <item><title>Apple shares climb after iPhone launch</title><description>AAPL gains 3%</description><pubDate>Mon, 04 Mar 2024 09:00:00 GMT</pubDate></item>
  <item><title>Tesla deliveries disappoint</title><description>Shares slide premarket</description><pubDate>Mon, 04 Mar 2024 10:00:00 GMT</pubDate></item>
  <item><title>Weather delays harvest</title><pubDate>Mon, 04 Mar 2024 08:00:00 GMT</pubDate></item>
</channel></rss>"#;

struct FixtureFetcher;

#[async_trait::async_trait]
impl FeedFetcher for FixtureFetcher {
    async fn fetch(&self, _url: &str) -> anyhow::Result<String> {
        Ok(FEED.to_string())
    }

    fn deadline(&self) -> Duration {
        Duration::from_secs(1)
    }
}

fn test_config(rate_limit: Option<RateLimitConfig>) -> Config {
    Config {
        rate_limit,
        feeds: vec![FeedSource {
            url: "https://wire.example/rss".into(),
            display_name: "Wire".into(),
            country: "us".into(),
            category: "general".into(),
            language: "en".into(),
        }],
        ..Config::default()
    }
}

async fn client(config: Config) -> Client {
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 4, 12, 0, 0).unwrap()));
    let state = AppState::new(Arc::new(config), Arc::new(FixtureFetcher), clock);
    Client::tracked(build_rocket(state)).await.expect("valid rocket instance")
}

#[tokio::test]
async fn test_health_and_status() {
    let client = client(test_config(None)).await;

    let health = client.get("/health").dispatch().await;
    assert_eq!(health.status(), Status::Ok);
    assert_eq!(health.into_string().await.as_deref(), Some("OK"));

    let status: Value = client.get("/api/v1/status").dispatch().await.into_json().await.unwrap();
    assert_eq!(status["status"], "ok");
    assert_eq!(status["sourcesCount"], 1);
    assert_eq!(status["headlinesCached"], 0);
}

#[tokio::test]
async fn test_news_page_feeds_trends() {
    let client = client(test_config(None)).await;

    let page: Value = client
        .get("/api/v1/news?country=us&page=1&page_size=2")
        .dispatch()
        .await
        .into_json()
        .await
        .unwrap();
    assert_eq!(page["total"], 3);
    assert_eq!(page["totalPages"], 2);
    assert_eq!(page["items"].as_array().unwrap().len(), 2);
    assert_eq!(page["items"][0]["title"], "Tesla deliveries disappoint");

    let filtered: Value = client
        .get("/api/v1/news?q=harvest")
        .dispatch()
        .await
        .into_json()
        .await
        .unwrap();
    assert_eq!(filtered["total"], 1);

    let trends: Value = client
        .get("/api/v1/trends?days=7&limit=3")
        .dispatch()
        .await
        .into_json()
        .await
        .unwrap();
    let trends = trends.as_array().unwrap();
    assert_eq!(trends.len(), 3);
    assert_eq!(trends[0]["keyword"], "shares");
    assert_eq!(trends[0]["total"], 2);
    assert_eq!(trends[0]["series"].as_array().unwrap().len(), 7);
}

#[tokio::test]
async fn test_watchdog_matches_watchlist() {
    let client = client(test_config(None)).await;

    let response = client
        .post("/api/v1/watchdog")
        .header(ContentType::JSON)
        .body(r#"{"tickers":[{"ticker":"TSLA","displayName":"Tesla"}],"country":"us","pageSize":10}"#)
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);

    let page: Value = response.into_json().await.unwrap();
    assert_eq!(page["total"], 1);
    let item = &page["items"][0];
    assert_eq!(item["title"], "Tesla deliveries disappoint");
    assert_eq!(item["matchedTickers"][0], "TSLA");
    assert_eq!(item["matchReasons"][0]["field"], "title");
    assert_eq!(item["matchReasons"][0]["matchedKeyword"], "Tesla");
}

#[tokio::test]
async fn test_ticker_lookup_and_rate_limit() {
    let limits = RateLimitConfig {
        ai: None,
        standard: None,
        cached: Some(RateLimitQuotaConfig {
            max_requests: 2,
            window_seconds: Some(60),
        }),
    };
    let client = client(test_config(Some(limits))).await;

    let found: Value = client
        .get("/api/v1/tickers/lookup?text=new%20iPhone%20and%20%E7%89%B9%E6%96%AF%E6%8B%89")
        .dispatch()
        .await
        .into_json()
        .await
        .unwrap();
    assert_eq!(found[0]["symbol"], "AAPL");
    assert_eq!(found[1]["symbol"], "TSLA");
    assert_eq!(found[1]["keyword"], "特斯拉");

    let second = client.get("/api/v1/tickers/lookup?text=nothing").dispatch().await;
    assert_eq!(second.status(), Status::Ok);

    let denied = client.get("/api/v1/tickers/lookup?text=apple").dispatch().await;
    assert_eq!(denied.status(), Status::TooManyRequests);
    assert_eq!(denied.headers().get_one("Retry-After"), Some("60"));
    let body: Value = denied.into_json().await.unwrap();
    assert_eq!(body["error"], "rate_limited");
    assert_eq!(body["retryAfterSeconds"], 60);

    // Other routes have their own buckets
    let trends = client.get("/api/v1/trends").dispatch().await;
    assert_eq!(trends.status(), Status::Ok);
}

#[tokio::test]
async fn test_malformed_watchdog_body_counts_against_quota() {
    let limits = RateLimitConfig {
        ai: None,
        standard: Some(RateLimitQuotaConfig {
            max_requests: 1,
            window_seconds: Some(60),
        }),
        cached: None,
    };
    let client = client(test_config(Some(limits))).await;

    let rejected = client
        .post("/api/v1/watchdog")
        .header(ContentType::JSON)
        .body("{not json")
        .dispatch()
        .await;
    assert_eq!(rejected.status(), Status::UnprocessableEntity);
    let body: Value = rejected.into_json().await.unwrap();
    assert_eq!(body["error"], "invalid_request");

    let limited = client
        .post("/api/v1/watchdog")
        .header(ContentType::JSON)
        .body(r#"{"tickers":[{"ticker":"TSLA","displayName":"Tesla"}]}"#)
        .dispatch()
        .await;
    assert_eq!(limited.status(), Status::TooManyRequests);
}
