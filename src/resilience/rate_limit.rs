//! Client-side rate limiting over a sliding time window.
//!
//! Coda budgets reads and writes separately: by default 100 reads and 10
//! writes per 6 second window. [`RateLimiter::acquire_slot`] never rejects a
//! call; it only delays it until admission fits inside the window.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Traffic class used for independent rate-limit budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrafficClass {
    /// Reads (GET).
    Read,
    /// Writes (everything else).
    Write,
}

/// Rate limiter configuration.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Length of the sliding window.
    pub window: Duration,
    /// Admissions allowed per window for reads.
    pub read_limit: usize,
    /// Admissions allowed per window for writes.
    pub write_limit: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(6),
            read_limit: 100,
            write_limit: 10,
        }
    }
}

impl RateLimitConfig {
    /// Returns the per-window limit for a traffic class.
    pub fn limit_for(&self, class: TrafficClass) -> usize {
        match class {
            TrafficClass::Read => self.read_limit,
            TrafficClass::Write => self.write_limit,
        }
    }
}

/// A past admission.
#[derive(Debug, Clone, Copy)]
struct WindowEntry {
    at: Instant,
    class: TrafficClass,
}

#[derive(Debug, Default)]
struct WindowState {
    entries: VecDeque<WindowEntry>,
    total_admissions: u64,
}

impl WindowState {
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(front) = self.entries.front() {
            if now.duration_since(front.at) >= window {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }

    fn count(&self, class: TrafficClass) -> usize {
        self.entries.iter().filter(|e| e.class == class).count()
    }

    fn oldest(&self, class: TrafficClass) -> Option<Instant> {
        self.entries.iter().find(|e| e.class == class).map(|e| e.at)
    }
}

/// Rate limiter statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitStats {
    /// Admissions recorded since creation or the last reset.
    pub total_admissions: u64,
    /// Read admissions inside the current window.
    pub reads_in_window: usize,
    /// Write admissions inside the current window.
    pub writes_in_window: usize,
}

/// Sliding-window rate limiter keyed by traffic class.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    state: Mutex<WindowState>,
}

impl RateLimiter {
    /// Creates a rate limiter with the given configuration.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            state: Mutex::new(WindowState::default()),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Waits until a call of `class` may proceed, then records it.
    ///
    /// The prune, check and record steps run under one lock that is never
    /// held across the wait, so interleaved callers each recompute against
    /// the latest window.
    pub async fn acquire_slot(&self, class: TrafficClass) {
        let limit = self.config.limit_for(class);
        loop {
            let wait = {
                let mut state = self.state.lock();
                let now = Instant::now();
                state.prune(now, self.config.window);

                if state.count(class) < limit {
                    state.entries.push_back(WindowEntry { at: now, class });
                    state.total_admissions += 1;
                    return;
                }

                match state.oldest(class) {
                    Some(oldest) => self
                        .config
                        .window
                        .saturating_sub(now.duration_since(oldest)),
                    // A zero limit admits nothing within a window.
                    None => self.config.window,
                }
            };

            tracing::debug!(
                class = ?class,
                wait_ms = wait.as_millis() as u64,
                "Rate limit reached, delaying request"
            );
            tokio::time::sleep(wait).await;
        }
    }

    /// Returns admission statistics for the current window.
    pub fn stats(&self) -> RateLimitStats {
        let mut state = self.state.lock();
        state.prune(Instant::now(), self.config.window);
        RateLimitStats {
            total_admissions: state.total_admissions,
            reads_in_window: state.count(TrafficClass::Read),
            writes_in_window: state.count(TrafficClass::Write),
        }
    }

    /// Clears all admission history.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.total_admissions = 0;
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_admissions_within_limit_do_not_wait() {
        let limiter = RateLimiter::default();
        let start = Instant::now();

        for _ in 0..10 {
            limiter.acquire_slot(TrafficClass::Write).await;
        }

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(limiter.stats().writes_in_window, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_extra_admission_waits_for_oldest_to_leave_window() {
        let limiter = RateLimiter::default();
        let start = Instant::now();

        limiter.acquire_slot(TrafficClass::Write).await;
        tokio::time::advance(Duration::from_secs(2)).await;
        for _ in 0..9 {
            limiter.acquire_slot(TrafficClass::Write).await;
        }

        limiter.acquire_slot(TrafficClass::Write).await;

        // Oldest admission was at t=0, so the 11th waits until t=6.
        assert!(start.elapsed() >= Duration::from_secs(6));
        let stats = limiter.stats();
        assert_eq!(stats.total_admissions, 11);
        assert_eq!(stats.writes_in_window, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_saturation_never_delays_writes() {
        let config = RateLimitConfig {
            read_limit: 3,
            ..Default::default()
        };
        let limiter = RateLimiter::new(config);

        for _ in 0..3 {
            limiter.acquire_slot(TrafficClass::Read).await;
        }

        let start = Instant::now();
        limiter.acquire_slot(TrafficClass::Write).await;
        assert_eq!(start.elapsed(), Duration::ZERO);

        limiter.acquire_slot(TrafficClass::Read).await;
        assert!(start.elapsed() >= Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_each_recompute() {
        let config = RateLimitConfig {
            write_limit: 2,
            ..Default::default()
        };
        let limiter = Arc::new(RateLimiter::new(config));
        let start = Instant::now();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                tokio::spawn(async move {
                    limiter.acquire_slot(TrafficClass::Write).await;
                    Instant::now()
                })
            })
            .collect();

        let mut admitted = Vec::new();
        for handle in handles {
            admitted.push(handle.await.unwrap().duration_since(start));
        }
        admitted.sort();

        assert_eq!(admitted[0], Duration::ZERO);
        assert_eq!(admitted[1], Duration::ZERO);
        assert!(admitted[2] >= Duration::from_secs(6));
        assert!(admitted[3] >= Duration::from_secs(6));
        assert_eq!(limiter.stats().total_admissions, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_old_entries_are_pruned_and_reset_clears() {
        let limiter = RateLimiter::default();
        limiter.acquire_slot(TrafficClass::Read).await;
        limiter.acquire_slot(TrafficClass::Write).await;

        tokio::time::advance(Duration::from_secs(7)).await;
        let stats = limiter.stats();
        assert_eq!(stats.reads_in_window, 0);
        assert_eq!(stats.writes_in_window, 0);
        assert_eq!(stats.total_admissions, 2);

        limiter.reset();
        assert_eq!(limiter.stats().total_admissions, 0);
    }
}
