//! Exponential backoff for transient Coda failures.
//!
//! Only errors reporting [`CodaError::is_retryable`] are retried: server
//! errors and network failures. Rate limiting, auth failures, validation
//! errors and missing resources surface on the first attempt.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::instrument;

use crate::errors::CodaError;

/// Upper bound on the random stretch added to each delay when jitter is on.
const JITTER_FRACTION: f64 = 0.25;

/// How many times, and how patiently, a failed call is repeated.
///
/// Retry `n` (zero-based) waits `initial_delay * multiplier^n`, never more
/// than `max_delay`. With the defaults that is 1s, 2s, 4s.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    /// Wait before the first retry.
    pub initial_delay: Duration,
    /// Ceiling for any single wait.
    pub max_delay: Duration,
    /// Growth factor between consecutive waits.
    pub multiplier: f64,
    /// Stretch each wait by a random amount of up to a quarter.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
            jitter: false,
        }
    }
}

impl RetryConfig {
    /// Default configuration: three retries starting at one second.
    pub fn new() -> Self {
        Self::default()
    }

    /// A configuration that makes exactly one attempt.
    pub fn no_retries() -> Self {
        Self::default().max_retries(0)
    }

    /// Sets [`RetryConfig::max_retries`].
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Sets [`RetryConfig::initial_delay`].
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets [`RetryConfig::max_delay`].
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets [`RetryConfig::multiplier`].
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Sets [`RetryConfig::jitter`].
    pub fn jitter(mut self, enabled: bool) -> Self {
        self.jitter = enabled;
        self
    }

    /// Waits before each retry, in order, without jitter.
    fn schedule(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.max_retries).map(move |retry| self.base_delay(retry))
    }

    fn base_delay(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let scaled = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = scaled.min(self.max_delay.as_secs_f64());
        if capped.is_finite() && capped > 0.0 {
            Duration::from_secs_f64(capped)
        } else {
            Duration::ZERO
        }
    }
}

/// Runs fallible calls under a [`RetryConfig`].
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Creates a policy from `config`.
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// The configuration in force.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Runs `operation` until it succeeds, fails permanently, or the retry
    /// budget is spent.
    ///
    /// `operation` receives the zero-based attempt number, so it can be
    /// called at most `max_retries + 1` times. The error of the last attempt
    /// is returned.
    #[instrument(skip(self, operation), fields(max_retries = self.config.max_retries))]
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T, CodaError>
    where
        F: Fn(u32) -> Fut,
        Fut: Future<Output = Result<T, CodaError>>,
    {
        let mut waits = self.config.schedule().map(|base| self.with_jitter(base));
        let mut attempt = 0u32;

        loop {
            let err = match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) => err,
            };

            let Some(wait) = waits.next() else {
                tracing::debug!(attempts = attempt + 1, "Retry budget exhausted");
                return Err(err);
            };

            tracing::warn!(
                attempt = attempt + 1,
                wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                error = %err,
                "Transient failure, retrying"
            );
            tokio::time::sleep(wait).await;
            attempt += 1;
        }
    }

    /// The wait before retry number `attempt` (zero-based), jitter included
    /// when enabled.
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        self.with_jitter(self.config.base_delay(attempt))
    }

    fn with_jitter(&self, base: Duration) -> Duration {
        if !self.config.jitter {
            return base;
        }
        let stretch = rand::thread_rng().gen_range(0.0..=JITTER_FRACTION);
        base.mul_f64(1.0 + stretch)
    }
}
