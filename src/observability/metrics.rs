//! Metrics collection for the Coda client.
//!
//! Response-time statistics come from a bounded ring buffer of the most
//! recent samples, so a long-lived client never grows its history.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;

use crate::errors::CodaResult;

/// Number of response times kept for statistics.
pub const RESPONSE_TIME_HISTORY: usize = 100;

/// Number of response times reported by [`MetricsCollector::detailed`].
pub const RECENT_RESPONSE_TIMES: usize = 10;

/// Metrics collector interface.
pub trait MetricsCollector: Send + Sync {
    /// Records the outcome of one logical request.
    ///
    /// A cache hit only counts towards `total_requests` and `cache_hits`.
    fn record_request(&self, duration: Duration, success: bool, from_cache: bool);

    /// Records a rate-limit (HTTP 429) response.
    fn record_rate_limit(&self);

    /// Returns a snapshot of the counters.
    fn snapshot(&self) -> RequestMetrics;

    /// Returns the snapshot with derived rates and recent response times.
    fn detailed(&self) -> DetailedMetrics;

    /// Serializes the detailed metrics as JSON for external monitoring.
    fn export(&self) -> CodaResult<String> {
        Ok(serde_json::to_string_pretty(&self.detailed())?)
    }

    /// Resets all metrics.
    fn reset(&self);
}

/// Request metrics snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMetrics {
    /// Requests recorded, cache hits included.
    pub total_requests: u64,
    /// Network requests that succeeded.
    pub successful_requests: u64,
    /// Network requests that failed.
    pub failed_requests: u64,
    /// Rate-limit responses observed.
    pub rate_limit_hits: u64,
    /// Requests served from the cache.
    pub cache_hits: u64,
    /// Mean response time over the trailing history, in milliseconds.
    pub avg_response_time_ms: f64,
    /// Minimum response time over the trailing history (+∞ when empty).
    pub min_response_time_ms: f64,
    /// Maximum response time over the trailing history (0 when empty).
    pub max_response_time_ms: f64,
    /// When the last request was recorded.
    pub last_request_time: Option<DateTime<Utc>>,
}

impl Default for RequestMetrics {
    fn default() -> Self {
        Self {
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            rate_limit_hits: 0,
            cache_hits: 0,
            avg_response_time_ms: 0.0,
            min_response_time_ms: f64::INFINITY,
            max_response_time_ms: 0.0,
            last_request_time: None,
        }
    }
}

/// Metrics snapshot with derived rates.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedMetrics {
    /// Raw counters.
    #[serde(flatten)]
    pub metrics: RequestMetrics,
    /// `successful_requests / total_requests`.
    pub success_rate: f64,
    /// `failed_requests / total_requests`.
    pub error_rate: f64,
    /// `cache_hits / total_requests`.
    pub cache_hit_rate: f64,
    /// The most recent response times in milliseconds, oldest first.
    pub recent_response_times_ms: Vec<f64>,
}

fn ratio(count: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

#[derive(Debug)]
struct MetricsState {
    metrics: RequestMetrics,
    response_times: VecDeque<f64>,
}

impl MetricsState {
    fn new() -> Self {
        Self {
            metrics: RequestMetrics::default(),
            response_times: VecDeque::with_capacity(RESPONSE_TIME_HISTORY),
        }
    }

    fn recompute(&mut self) {
        let samples = &self.response_times;
        if samples.is_empty() {
            self.metrics.avg_response_time_ms = 0.0;
            self.metrics.min_response_time_ms = f64::INFINITY;
            self.metrics.max_response_time_ms = 0.0;
            return;
        }
        let sum: f64 = samples.iter().sum();
        self.metrics.avg_response_time_ms = sum / samples.len() as f64;
        self.metrics.min_response_time_ms = samples.iter().copied().fold(f64::INFINITY, f64::min);
        self.metrics.max_response_time_ms = samples.iter().copied().fold(0.0, f64::max);
    }
}

/// Default metrics collector implementation.
pub struct DefaultMetricsCollector {
    state: Mutex<MetricsState>,
}

impl DefaultMetricsCollector {
    /// Creates a new metrics collector.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MetricsState::new()),
        }
    }
}

impl Default for DefaultMetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector for DefaultMetricsCollector {
    fn record_request(&self, duration: Duration, success: bool, from_cache: bool) {
        let mut state = self.state.lock();
        state.metrics.total_requests += 1;
        state.metrics.last_request_time = Some(Utc::now());

        if from_cache {
            state.metrics.cache_hits += 1;
            return;
        }

        if success {
            state.metrics.successful_requests += 1;
        } else {
            state.metrics.failed_requests += 1;
        }

        if state.response_times.len() == RESPONSE_TIME_HISTORY {
            state.response_times.pop_front();
        }
        state.response_times.push_back(duration.as_secs_f64() * 1000.0);
        state.recompute();
    }

    fn record_rate_limit(&self) {
        self.state.lock().metrics.rate_limit_hits += 1;
    }

    fn snapshot(&self) -> RequestMetrics {
        self.state.lock().metrics.clone()
    }

    fn detailed(&self) -> DetailedMetrics {
        let state = self.state.lock();
        let metrics = state.metrics.clone();
        let total = metrics.total_requests;
        let skip = state.response_times.len().saturating_sub(RECENT_RESPONSE_TIMES);

        DetailedMetrics {
            success_rate: ratio(metrics.successful_requests, total),
            error_rate: ratio(metrics.failed_requests, total),
            cache_hit_rate: ratio(metrics.cache_hits, total),
            recent_response_times_ms: state.response_times.iter().skip(skip).copied().collect(),
            metrics,
        }
    }

    fn reset(&self) {
        *self.state.lock() = MetricsState::new();
    }
}

impl std::fmt::Debug for DefaultMetricsCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("DefaultMetricsCollector")
            .field("total_requests", &state.metrics.total_requests)
            .field("successful_requests", &state.metrics.successful_requests)
            .field("failed_requests", &state.metrics.failed_requests)
            .finish()
    }
}
