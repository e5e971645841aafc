//! Process-wide, in-memory admission control and caching shared by every fetch path.

pub mod cache;
pub mod rate_limit;

pub use cache::{CacheEntry, TtlCache};
pub use rate_limit::{RateLimitDecision, RateLimitPolicy, RateLimitQuota, RateLimiter};
