use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use common::RateLimitConfig;
use serde::Serialize;
use tracing::debug;

use crate::clock::Clock;

/// Lower bound on the retry hint handed to denied callers
pub const MIN_RETRY_AFTER_MS: i64 = 1_000;

/// How often an admission call also sweeps every bucket
pub const SWEEP_INTERVAL_MS: i64 = 60_000;

const DEFAULT_WINDOW_MS: i64 = 60_000;

/// Named admission budgets for the different classes of endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitPolicy {
    /// Expensive upstream calls (AI summarisation etc.)
    Ai,
    /// Uncached data fetches
    Standard,
    /// Cheap, cache-backed reads
    Cached,
}

impl RateLimitPolicy {
    pub fn name(&self) -> &'static str {
        match self {
            RateLimitPolicy::Ai => "ai",
            RateLimitPolicy::Standard => "standard",
            RateLimitPolicy::Cached => "cached",
        }
    }

    pub fn default_quota(&self) -> RateLimitQuota {
        let max_requests = match self {
            RateLimitPolicy::Ai => 10,
            RateLimitPolicy::Standard => 30,
            RateLimitPolicy::Cached => 60,
        };
        RateLimitQuota {
            max_requests,
            window_ms: DEFAULT_WINDOW_MS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitQuota {
    pub max_requests: usize,
    pub window_ms: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: usize,
    pub retry_after_ms: i64,
}

impl RateLimitDecision {
    /// Value for a `Retry-After` header, rounded up to whole seconds.
    pub fn retry_after_secs(&self) -> u64 {
        ((self.retry_after_ms.max(0) + 999) / 1000) as u64
    }
}

#[derive(Debug)]
struct Bucket {
    timestamps: VecDeque<i64>,
    window_ms: i64,
}

impl Bucket {
    fn prune(&mut self, now: i64) {
        let cutoff = now - self.window_ms;
        while self.timestamps.front().is_some_and(|&t| t <= cutoff) {
            self.timestamps.pop_front();
        }
    }
}

#[derive(Debug, Default)]
struct LimiterState {
    buckets: HashMap<String, Bucket>,
    last_sweep_ms: i64,
}

/// Sliding-window request counter keyed by an arbitrary string (client identity + route).
///
/// State is process-local and in-memory only; each call is applied atomically under one lock.
pub struct RateLimiter {
    clock: Arc<dyn Clock>,
    quotas: HashMap<RateLimitPolicy, RateLimitQuota>,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let quotas = [
            RateLimitPolicy::Ai,
            RateLimitPolicy::Standard,
            RateLimitPolicy::Cached,
        ]
        .into_iter()
        .map(|p| (p, p.default_quota()))
        .collect();

        let last_sweep_ms = clock.now_millis();
        Self {
            clock,
            quotas,
            state: Mutex::new(LimiterState {
                buckets: HashMap::new(),
                last_sweep_ms,
            }),
        }
    }

    /// Apply per-policy overrides from the `[rate_limit]` config section.
    pub fn with_config(mut self, config: &RateLimitConfig) -> Self {
        let overrides = [
            (RateLimitPolicy::Ai, &config.ai),
            (RateLimitPolicy::Standard, &config.standard),
            (RateLimitPolicy::Cached, &config.cached),
        ];
        for (policy, quota) in overrides {
            if let Some(q) = quota {
                self.quotas.insert(
                    policy,
                    RateLimitQuota {
                        max_requests: q.max_requests,
                        window_ms: q
                            .window_seconds
                            .map(|s| s as i64 * 1000)
                            .unwrap_or(DEFAULT_WINDOW_MS),
                    },
                );
            }
        }
        self
    }

    pub fn quota(&self, policy: RateLimitPolicy) -> RateLimitQuota {
        self.quotas
            .get(&policy)
            .copied()
            .unwrap_or_else(|| policy.default_quota())
    }

    /// Check a key against a named policy. Policies have separate buckets for the same key.
    pub fn check(&self, policy: RateLimitPolicy, key: &str) -> RateLimitDecision {
        let quota = self.quota(policy);
        let bucket_key = format!("{}:{}", policy.name(), key);
        self.check_and_consume(&bucket_key, quota.max_requests, quota.window_ms)
    }

    /// Admit and record the request if fewer than `max_requests` fall inside the trailing
    /// `window_ms`; otherwise deny with the time until the oldest request leaves the window.
    pub fn check_and_consume(&self, key: &str, max_requests: usize, window_ms: i64) -> RateLimitDecision {
        let now = self.clock.now_millis();
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        if now - state.last_sweep_ms >= SWEEP_INTERVAL_MS {
            sweep(&mut state.buckets, now);
            state.last_sweep_ms = now;
        }

        let bucket = state.buckets.entry(key.to_string()).or_insert_with(|| Bucket {
            timestamps: VecDeque::new(),
            window_ms,
        });
        bucket.window_ms = window_ms;
        bucket.prune(now);

        if bucket.timestamps.len() >= max_requests {
            let retry_after_ms = bucket
                .timestamps
                .front()
                .map(|oldest| oldest + window_ms - now)
                .unwrap_or(window_ms)
                .max(MIN_RETRY_AFTER_MS);
            if bucket.timestamps.is_empty() {
                state.buckets.remove(key);
            }
            debug!(key, retry_after_ms, "rate limit exceeded");
            return RateLimitDecision {
                allowed: false,
                remaining: 0,
                retry_after_ms,
            };
        }

        bucket.timestamps.push_back(now);
        RateLimitDecision {
            allowed: true,
            remaining: max_requests - bucket.timestamps.len(),
            retry_after_ms: 0,
        }
    }

    /// Number of live buckets
    pub fn tracked_keys(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .buckets
            .len()
    }
}

fn sweep(buckets: &mut HashMap<String, Bucket>, now: i64) {
    let before = buckets.len();
    buckets.retain(|_, bucket| {
        bucket.prune(now);
        !bucket.timestamps.is_empty()
    });
    if buckets.len() < before {
        debug!(evicted = before - buckets.len(), "rate limiter sweep");
    }
}
