//! Resilience layer for the Coda client.
//!
//! Provides the retry policy and the sliding-window rate limiter used by the
//! request executor.

mod rate_limit;
mod retry;

pub use rate_limit::{RateLimitConfig, RateLimitStats, RateLimiter, TrafficClass};
pub use retry::{RetryConfig, RetryPolicy};
