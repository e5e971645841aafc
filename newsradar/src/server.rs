use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rocket::data::{Data, ToByteUnit};
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use rocket::response::{self, Responder, Response};
use rocket::serde::json::Json;
use rocket::{get, post, routes, Build, Rocket, State};
use serde::{Deserialize, Serialize};
use tracing::info;

use common::{Article, Config, WatchlistItem};

use crate::aggregator::{NewsAggregator, NewsQuery};
use crate::clock::Clock;
use crate::ingestion::FeedFetcher;
use crate::resilience::{RateLimitDecision, RateLimitPolicy, RateLimiter};
use crate::sources::SourceCatalog;
use crate::tickers::{self, TickerMatch};
use crate::trends::{KeywordTrend, TrendTracker};
use crate::watchdog::{self, WatchdogArticle, WatchdogSubject};

pub const DEFAULT_COUNTRY: &str = "us";
pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;
const DEFAULT_TREND_DAYS: u32 = 7;
const DEFAULT_TREND_LIMIT: usize = 10;
const MAX_TREND_LIMIT: usize = 50;
const WATCHDOG_BODY_LIMIT_KIB: u64 = 256;

/// Application state stored inside Rocket managed state.
#[derive(Clone)]
pub struct AppState {
    pub started_at: DateTime<Utc>,
    pub config: Arc<Config>,
    pub clock: Arc<dyn Clock>,
    pub aggregator: Arc<NewsAggregator>,
    pub limiter: Arc<RateLimiter>,
    pub trends: Arc<TrendTracker>,
}

impl AppState {
    /// Wire every shared component from the configuration. Built once per process.
    pub fn new(config: Arc<Config>, fetcher: Arc<dyn FeedFetcher>, clock: Arc<dyn Clock>) -> Self {
        let aggregator = NewsAggregator::new(
            SourceCatalog::from_config(&config),
            fetcher,
            &config.cache(),
            clock.clone(),
        );
        let mut limiter = RateLimiter::new(clock.clone());
        if let Some(rate_limit) = &config.rate_limit {
            limiter = limiter.with_config(rate_limit);
        }

        Self {
            started_at: clock.now(),
            config,
            aggregator: Arc::new(aggregator),
            limiter: Arc::new(limiter),
            trends: Arc::new(TrendTracker::new(clock.clone())),
            clock,
        }
    }
}

/// Who is calling which route; the rate limiter key.
pub struct ClientIdentity {
    pub ip: String,
    pub path: String,
}

impl ClientIdentity {
    pub fn key(&self) -> String {
        format!("{}:{}", self.ip, self.path)
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ClientIdentity {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        Outcome::Success(ClientIdentity {
            ip: req
                .client_ip()
                .map(|ip| ip.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
            path: req.uri().path().to_string(),
        })
    }
}

/// 429 with a `Retry-After` header and a JSON body.
#[derive(Debug)]
pub struct RateLimited(pub RateLimitDecision);

impl<'r> Responder<'r, 'static> for RateLimited {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        let retry_after = self.0.retry_after_secs();
        let body = Json(serde_json::json!({
            "error": "rate_limited",
            "message": "Too many requests, please retry later",
            "retryAfterSeconds": retry_after,
        }));
        Response::build_from(body.respond_to(req)?)
            .status(Status::TooManyRequests)
            .raw_header("Retry-After", retry_after.to_string())
            .ok()
    }
}

/// Why a watchdog request was turned away. The body is only read once the request is admitted,
/// so malformed payloads still count against the caller's quota.
#[derive(Debug, rocket::Responder)]
pub enum WatchdogRejection {
    Limited(RateLimited),
    #[response(status = 422)]
    Invalid(Json<serde_json::Value>),
}

impl WatchdogRejection {
    fn invalid(message: impl std::fmt::Display) -> Self {
        WatchdogRejection::Invalid(Json(serde_json::json!({
            "error": "invalid_request",
            "message": message.to_string(),
        })))
    }
}

fn admit(state: &AppState, policy: RateLimitPolicy, client: &ClientIdentity) -> Result<(), RateLimited> {
    let decision = state.limiter.check(policy, &client.key());
    if decision.allowed {
        Ok(())
    } else {
        Err(RateLimited(decision))
    }
}

/// One page of a result list. `page` is 1-based.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
    pub total_pages: usize,
}

impl<T: Clone> Page<T> {
    pub fn slice(all: &[T], page: Option<usize>, page_size: Option<usize>) -> Self {
        let page = page.unwrap_or(1).max(1);
        let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let total = all.len();
        let items = all
            .iter()
            .skip((page - 1).saturating_mul(page_size))
            .take(page_size)
            .cloned()
            .collect();
        Page {
            items,
            page,
            page_size,
            total,
            total_pages: total.div_ceil(page_size),
        }
    }
}

/// Response structure for `/api/v1/status`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    status: &'static str,
    uptime_seconds: i64,
    sources_count: usize,
    headlines_cached: usize,
    search_cached: usize,
    rate_limit_keys: usize,
    trend_days: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WatchdogRequest {
    tickers: Vec<WatchlistItem>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    page: Option<usize>,
    #[serde(default, alias = "page_size")]
    page_size: Option<usize>,
}

#[get("/health")]
async fn health() -> &'static str {
    "OK"
}

/// Status endpoint returning simple JSON with uptime and component sizes.
#[get("/api/v1/status")]
async fn status(state: &State<AppState>) -> Json<StatusResponse> {
    let uptime = (state.clock.now() - state.started_at).num_seconds();
    let caches = state.aggregator.cache_sizes();

    Json(StatusResponse {
        status: "ok",
        uptime_seconds: uptime,
        sources_count: state.aggregator.catalog().len(),
        headlines_cached: caches.headlines,
        search_cached: caches.search,
        rate_limit_keys: state.limiter.tracked_keys(),
        trend_days: state.trends.tracked_days(),
    })
}

#[get("/api/v1/news?<country>&<category>&<q>&<page>&<page_size>")]
async fn news(
    state: &State<AppState>,
    client: ClientIdentity,
    country: Option<String>,
    category: Option<String>,
    q: Option<String>,
    page: Option<usize>,
    page_size: Option<usize>,
) -> Result<Json<Page<Article>>, RateLimited> {
    admit(state, RateLimitPolicy::Standard, &client)?;

    let query = NewsQuery {
        country: country.unwrap_or_else(|| DEFAULT_COUNTRY.to_string()),
        category,
        query: q,
    };
    let articles = state.aggregator.fetch_news(&query).await;
    state.trends.record(&articles);

    Ok(Json(Page::slice(articles.as_slice(), page, page_size)))
}

#[get("/api/v1/trends?<days>&<limit>")]
async fn trends(
    state: &State<AppState>,
    client: ClientIdentity,
    days: Option<u32>,
    limit: Option<usize>,
) -> Result<Json<Vec<KeywordTrend>>, RateLimited> {
    admit(state, RateLimitPolicy::Cached, &client)?;

    let limit = limit.unwrap_or(DEFAULT_TREND_LIMIT).min(MAX_TREND_LIMIT);
    Ok(Json(state.trends.top_keywords(days.unwrap_or(DEFAULT_TREND_DAYS), limit)))
}

#[post("/api/v1/watchdog", data = "<body>")]
async fn watchdog_feed(
    state: &State<AppState>,
    client: ClientIdentity,
    body: Data<'_>,
) -> Result<Json<Page<WatchdogArticle>>, WatchdogRejection> {
    admit(state, RateLimitPolicy::Standard, &client).map_err(WatchdogRejection::Limited)?;

    let raw = body
        .open(WATCHDOG_BODY_LIMIT_KIB.kibibytes())
        .into_string()
        .await
        .map_err(WatchdogRejection::invalid)?;
    if !raw.is_complete() {
        return Err(WatchdogRejection::invalid("request body too large"));
    }
    let body: WatchdogRequest = serde_json::from_str(&raw).map_err(WatchdogRejection::invalid)?;
    let query = NewsQuery {
        country: body.country.unwrap_or_else(|| DEFAULT_COUNTRY.to_string()),
        category: body.category,
        query: None,
    };
    let articles = state.aggregator.fetch_news(&query).await;
    let subjects: Vec<WatchdogSubject> = articles.iter().cloned().map(WatchdogSubject::from).collect();
    let matched = watchdog::match_articles(&body.tickers, &subjects);

    Ok(Json(Page::slice(&matched, body.page, body.page_size)))
}

#[get("/api/v1/tickers/lookup?<text>")]
async fn ticker_lookup(
    state: &State<AppState>,
    client: ClientIdentity,
    text: Option<String>,
) -> Result<Json<Vec<TickerMatch>>, RateLimited> {
    admit(state, RateLimitPolicy::Cached, &client)?;
    Ok(Json(tickers::lookup_tickers(text.as_deref().unwrap_or(""))))
}

/// Build the Rocket instance with managed state, applying `[server]` bind/port when present.
pub fn build_rocket(state: AppState) -> Rocket<Build> {
    let mut fig = rocket::Config::figment();
    if let Some(server) = &state.config.server {
        if let Some(bind) = &server.bind {
            fig = fig.merge(("address", bind.clone()));
        }
        if let Some(port) = server.port {
            fig = fig.merge(("port", port));
        }
    }

    rocket::custom(fig).manage(state).mount(
        "/",
        routes![health, status, news, trends, watchdog_feed, ticker_lookup],
    )
}

/// Build and launch the Rocket server. Blocks until Rocket shuts down.
pub async fn launch_rocket(state: AppState) -> Result<()> {
    let rocket = build_rocket(state)
        .ignite()
        .await
        .map_err(|e| anyhow!("Rocket failed to ignite: {}", e))?;

    info!("Starting Rocket HTTP server");
    rocket
        .launch()
        .await
        .map_err(|e| anyhow!("Rocket failed: {}", e))?;

    info!("Rocket HTTP server has shut down");
    Ok(())
}
