//! Observability module for the Coda client.
//!
//! Provides request metrics and logging setup.

mod logging;
mod metrics;

pub use logging::{init_logging, redact_secrets, LogLevel};
pub use metrics::{
    DefaultMetricsCollector, DetailedMetrics, MetricsCollector, RequestMetrics,
    RECENT_RESPONSE_TIMES, RESPONSE_TIME_HISTORY,
};

use std::time::Duration;
use tokio::time::Instant;

/// Request timer for measuring operation duration.
#[derive(Debug)]
pub struct RequestTimer {
    start: Instant,
    operation: String,
}

impl RequestTimer {
    /// Starts a timer for `operation`.
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            operation: operation.into(),
        }
    }

    /// Returns the elapsed time.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Returns the operation name.
    pub fn operation(&self) -> &str {
        &self.operation
    }
}
