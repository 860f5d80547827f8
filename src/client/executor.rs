//! Request execution pipeline.
//!
//! Every API call flows through [`RequestExecutor::execute_raw`]: rate-limit
//! admission, cache lookup, the transport call under the retry policy, cache
//! store and metrics.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;
use url::Url;

use super::descriptor::CallDescriptor;
use crate::auth::AuthProvider;
use crate::cache::ResponseCache;
use crate::config::CodaConfig;
use crate::errors::{ApiErrorResponse, CodaError, CodaResult};
use crate::observability::{redact_secrets, MetricsCollector, RequestTimer};
use crate::resilience::{RateLimiter, RetryPolicy};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};

/// Parsed response body.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// Body of a JSON response; an empty body parses as `null`.
    Json(Value),
    /// Body of any other response, decoded lossily as UTF-8.
    Text(String),
}

impl ResponseBody {
    /// Deserializes the body into `T`.
    ///
    /// Text bodies deserialize as a JSON string.
    pub fn into_typed<T: DeserializeOwned>(self) -> CodaResult<T> {
        let value = match self {
            ResponseBody::Json(value) => value,
            ResponseBody::Text(text) => Value::String(text),
        };
        serde_json::from_value(value).map_err(|e| {
            CodaError::serialization(format!("Failed to deserialize response: {}", e))
        })
    }

    /// Returns the JSON value, if this is a JSON body.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseBody::Json(value) => Some(value),
            ResponseBody::Text(_) => None,
        }
    }
}

/// Executes API calls with rate limiting, caching, retries and metrics.
pub struct RequestExecutor {
    config: CodaConfig,
    transport: Arc<dyn HttpTransport>,
    auth: Arc<dyn AuthProvider>,
    retry: RetryPolicy,
    rate_limiter: Option<Arc<RateLimiter>>,
    cache: Option<ResponseCache<ResponseBody>>,
    metrics: Option<Arc<dyn MetricsCollector>>,
}

impl RequestExecutor {
    /// Creates an executor.
    ///
    /// Pass `None` for a governance component to disable it.
    pub fn new(
        config: CodaConfig,
        transport: Arc<dyn HttpTransport>,
        auth: Arc<dyn AuthProvider>,
        retry: RetryPolicy,
        rate_limiter: Option<Arc<RateLimiter>>,
        cache: Option<ResponseCache<ResponseBody>>,
        metrics: Option<Arc<dyn MetricsCollector>>,
    ) -> Self {
        Self {
            config,
            transport,
            auth,
            retry,
            rate_limiter,
            cache,
            metrics,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &CodaConfig {
        &self.config
    }

    /// Returns the retry policy.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Returns the rate limiter, if enabled.
    pub fn rate_limiter(&self) -> Option<&Arc<RateLimiter>> {
        self.rate_limiter.as_ref()
    }

    /// Returns the response cache, if enabled.
    pub fn cache(&self) -> Option<&ResponseCache<ResponseBody>> {
        self.cache.as_ref()
    }

    /// Returns the metrics collector, if enabled.
    pub fn metrics(&self) -> Option<&Arc<dyn MetricsCollector>> {
        self.metrics.as_ref()
    }

    /// Executes a call and deserializes the response into `T`.
    pub async fn execute<T: DeserializeOwned>(&self, descriptor: &CallDescriptor) -> CodaResult<T> {
        self.execute_raw(descriptor).await?.into_typed()
    }

    /// Executes a call and returns the parsed body.
    #[instrument(
        skip(self, descriptor),
        fields(method = %descriptor.method(), path = %descriptor.path())
    )]
    pub async fn execute_raw(&self, descriptor: &CallDescriptor) -> CodaResult<ResponseBody> {
        if let Some(limiter) = &self.rate_limiter {
            limiter.acquire_slot(descriptor.class()).await;
        }

        let cache_key = match &self.cache {
            Some(cache) if descriptor.is_cacheable() => {
                let key = descriptor.cache_key();
                if let Some(hit) = cache.get(&key) {
                    tracing::debug!(key = %key, "Serving response from cache");
                    self.record(Duration::ZERO, true, true);
                    return Ok(hit);
                }
                Some(key)
            }
            _ => None,
        };

        let request = self.build_request(descriptor)?;
        let timer = RequestTimer::new(descriptor.path());

        let result = self
            .retry
            .execute(|attempt| {
                let request = request.clone();
                async move {
                    if attempt > 0 {
                        tracing::debug!(attempt, "Retrying request");
                    }
                    self.send_once(request).await
                }
            })
            .await;

        let elapsed = timer.elapsed();
        self.record(elapsed, result.is_ok(), false);

        match &result {
            Ok(body) => {
                if let (Some(cache), Some(key)) = (&self.cache, cache_key) {
                    let ttl = descriptor.ttl_override().unwrap_or(cache.default_ttl());
                    cache.set_with_ttl(key, body.clone(), ttl);
                }
                tracing::debug!(
                    operation = timer.operation(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Request completed"
                );
            }
            Err(err) => {
                tracing::warn!(
                    operation = timer.operation(),
                    error_kind = err.kind(),
                    error = %redact_secrets(&err.to_string()),
                    "Request failed"
                );
            }
        }

        result
    }

    async fn send_once(&self, request: HttpRequest) -> CodaResult<ResponseBody> {
        let response = self.transport.send(request).await?;

        if response.is_success() {
            return parse_body(&response);
        }

        let error = classify_error(&response);
        if matches!(error, CodaError::RateLimited { .. }) {
            if let Some(metrics) = &self.metrics {
                metrics.record_rate_limit();
            }
        }
        Err(error)
    }

    fn build_request(&self, descriptor: &CallDescriptor) -> CodaResult<HttpRequest> {
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        headers.insert("User-Agent".to_string(), self.config.user_agent.clone());
        self.auth.apply_auth(&mut headers);

        let mut request = HttpRequest::new(descriptor.method(), self.build_url(descriptor)?)
            .with_timeout(self.config.timeout);
        request.headers = headers;

        if let Some(body) = descriptor.body() {
            request = request.with_body(serde_json::to_vec(body)?);
        }

        Ok(request)
    }

    fn build_url(&self, descriptor: &CallDescriptor) -> CodaResult<String> {
        let mut url = Url::parse(&self.config.base_url)?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| CodaError::configuration("Base URL cannot have a path"))?;
            segments.pop_if_empty().extend(descriptor.segments());
        }

        if !descriptor.query().is_empty() {
            url.query_pairs_mut().extend_pairs(
                descriptor
                    .query()
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str())),
            );
        }

        Ok(url.into())
    }

    fn record(&self, duration: Duration, success: bool, from_cache: bool) {
        if let Some(metrics) = &self.metrics {
            metrics.record_request(duration, success, from_cache);
        }
    }
}

impl std::fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("config", &self.config)
            .field("retry", self.retry.config())
            .field("rate_limit", &self.rate_limiter.is_some())
            .field("cache", &self.cache.is_some())
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}

fn parse_body(response: &HttpResponse) -> CodaResult<ResponseBody> {
    if !response.is_json() {
        return Ok(ResponseBody::Text(
            String::from_utf8_lossy(&response.body).into_owned(),
        ));
    }

    if response.body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ResponseBody::Json(Value::Null));
    }

    serde_json::from_slice(&response.body)
        .map(ResponseBody::Json)
        .map_err(|e| CodaError::serialization(format!("Failed to parse response body: {}", e)))
}

fn classify_error(response: &HttpResponse) -> CodaError {
    let details = if response.is_json() {
        serde_json::from_slice::<Value>(&response.body).ok()
    } else {
        None
    };

    let message = details
        .as_ref()
        .and_then(|body| serde_json::from_value::<ApiErrorResponse>(body.clone()).ok())
        .and_then(|body| body.message);

    CodaError::from_status(response.status, message, details, response.retry_after())
}
