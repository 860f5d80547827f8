//! Mutation status service.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::instrument;

use crate::client::{CallDescriptor, RequestExecutor};
use crate::errors::{CodaError, CodaResult};
use crate::types::{MutationHandle, MutationStatusResponse};

/// Polling options for [`MutationsService::wait_for_mutation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Give up once this much time has elapsed without a terminal state.
    pub max_wait: Duration,
    /// Delay between status queries.
    pub poll_interval: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            max_wait: Duration::from_secs(30),
            poll_interval: Duration::from_secs(1),
        }
    }
}

impl WaitOptions {
    /// Sets the maximum wait.
    pub fn max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Sets the poll interval.
    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

/// Tracks asynchronous writes until they are applied.
#[derive(Debug, Clone)]
pub struct MutationsService {
    executor: Arc<RequestExecutor>,
}

impl MutationsService {
    /// Creates a new mutations service.
    pub fn new(executor: Arc<RequestExecutor>) -> Self {
        Self { executor }
    }

    /// Queries the current state of a mutation. Never served from cache.
    #[instrument(skip(self))]
    pub async fn status(&self, request_id: &str) -> CodaResult<MutationHandle> {
        let descriptor = CallDescriptor::get(["mutationStatus", request_id]).no_cache();
        let response: MutationStatusResponse = self.executor.execute(&descriptor).await?;
        Ok(response.into_handle(request_id))
    }

    /// Polls until the mutation completes or fails.
    ///
    /// A failed mutation is returned as a handle, not an error. Returns
    /// [`CodaError::Timeout`] when `max_wait` elapses first.
    #[instrument(skip(self, options), fields(max_wait_ms = options.max_wait.as_millis() as u64))]
    pub async fn wait_for_mutation(
        &self,
        request_id: &str,
        options: WaitOptions,
    ) -> CodaResult<MutationHandle> {
        let start = Instant::now();
        let mut polls = 0u32;

        loop {
            let handle = self.status(request_id).await?;
            polls += 1;

            if handle.is_terminal() {
                tracing::debug!(polls, status = ?handle.status, "Mutation reached terminal state");
                return Ok(handle);
            }

            let elapsed = start.elapsed();
            if elapsed > options.max_wait {
                return Err(CodaError::timeout(format!(
                    "mutation {} still in progress after {:?} ({} polls)",
                    request_id, elapsed, polls
                )));
            }

            tokio::time::sleep(options.poll_interval).await;
        }
    }
}
