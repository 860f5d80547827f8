//! Coda API client.
//!
//! Provides the main client interface for interacting with the Coda API.

mod descriptor;
mod executor;

pub use descriptor::CallDescriptor;
pub use executor::{RequestExecutor, ResponseBody};

use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

use crate::auth::{AuthProvider, TokenAuth};
use crate::cache::{CacheStats, ResponseCache};
use crate::config::{CodaConfig, CodaConfigBuilder};
use crate::errors::{CodaError, CodaResult};
use crate::observability::{
    init_logging, DefaultMetricsCollector, DetailedMetrics, LogLevel, MetricsCollector,
    RequestMetrics,
};
use crate::resilience::{RateLimitConfig, RateLimitStats, RateLimiter, RetryConfig, RetryPolicy};
use crate::services::{DocsService, MutationsService, RowsService, TablesService};
use crate::transport::{HttpTransport, ReqwestTransport};
use crate::types::User;

/// The main Coda client.
///
/// Provides access to docs, tables, rows and mutation tracking, plus the
/// governance state (metrics, cache, rate limiter) shared by every call.
///
/// # Example
///
/// ```rust,no_run
/// use coda_client::{CodaClient, ListRowsParams};
/// use futures::TryStreamExt;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = CodaClient::builder()
///         .api_token("your-api-token")
///         .build()?;
///
///     let rows: Vec<_> = client
///         .rows()
///         .stream("doc-id", "grid-id", ListRowsParams::default())
///         .try_collect()
///         .await?;
///     println!("{} rows", rows.len());
///     Ok(())
/// }
/// ```
pub struct CodaClient {
    executor: Arc<RequestExecutor>,
    docs_service: DocsService,
    tables_service: TablesService,
    rows_service: RowsService,
    mutations_service: MutationsService,
}

impl CodaClient {
    /// Creates a new client builder.
    pub fn builder() -> CodaClientBuilder {
        CodaClientBuilder::new()
    }

    /// Creates a client from environment variables.
    ///
    /// Reads `CODA_API_TOKEN` and optionally `CODA_BASE_URL`, `CODA_TIMEOUT`,
    /// `CODA_MAX_RETRIES` and `CODA_LOG_LEVEL`.
    pub fn from_env() -> CodaResult<Self> {
        let config = CodaConfig::from_env()?;
        CodaClientBuilder::new().config(config).build()
    }

    /// Creates a client from an API token.
    pub fn from_token(api_token: impl Into<String>) -> CodaResult<Self> {
        CodaClientBuilder::new().api_token(api_token).build()
    }

    /// Returns the docs service.
    pub fn docs(&self) -> &DocsService {
        &self.docs_service
    }

    /// Returns the tables service.
    pub fn tables(&self) -> &TablesService {
        &self.tables_service
    }

    /// Returns the rows service.
    pub fn rows(&self) -> &RowsService {
        &self.rows_service
    }

    /// Returns the mutations service.
    pub fn mutations(&self) -> &MutationsService {
        &self.mutations_service
    }

    /// Returns the configuration.
    pub fn config(&self) -> &CodaConfig {
        self.executor.config()
    }

    /// Returns the request executor shared by all services.
    pub fn executor(&self) -> &Arc<RequestExecutor> {
        &self.executor
    }

    /// Returns the user that owns the API token.
    #[instrument(skip(self))]
    pub async fn whoami(&self) -> CodaResult<User> {
        self.executor.execute(&CallDescriptor::get(["whoami"])).await
    }

    /// Returns a snapshot of the request metrics, if metrics are enabled.
    pub fn metrics(&self) -> Option<RequestMetrics> {
        self.executor.metrics().map(|m| m.snapshot())
    }

    /// Returns the metrics with derived rates, if metrics are enabled.
    pub fn detailed_metrics(&self) -> Option<DetailedMetrics> {
        self.executor.metrics().map(|m| m.detailed())
    }

    /// Exports the detailed metrics as JSON.
    pub fn export_metrics(&self) -> CodaResult<String> {
        self.executor
            .metrics()
            .ok_or_else(|| CodaError::configuration("Metrics are disabled"))?
            .export()
    }

    /// Resets the request metrics.
    pub fn reset_metrics(&self) {
        if let Some(metrics) = self.executor.metrics() {
            metrics.reset();
        }
    }

    /// Returns cache statistics, if caching is enabled.
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.executor.cache().map(ResponseCache::stats)
    }

    /// Drops every cached response and resets the cache counters.
    pub fn clear_cache(&self) {
        if let Some(cache) = self.executor.cache() {
            cache.clear();
        }
    }

    /// Removes expired cache entries and returns how many were removed.
    pub fn cleanup_cache(&self) -> usize {
        self.executor.cache().map_or(0, ResponseCache::cleanup)
    }

    /// Returns rate limiter statistics, if rate limiting is enabled.
    pub fn rate_limit_stats(&self) -> Option<RateLimitStats> {
        self.executor.rate_limiter().map(|limiter| limiter.stats())
    }
}

impl std::fmt::Debug for CodaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodaClient")
            .field("executor", &self.executor)
            .finish()
    }
}

/// Builder for the Coda client.
pub struct CodaClientBuilder {
    config_builder: CodaConfigBuilder,
    config: Option<CodaConfig>,
    transport: Option<Arc<dyn HttpTransport>>,
    auth: Option<Arc<dyn AuthProvider>>,
    retry_config: Option<RetryConfig>,
    rate_limit_config: RateLimitConfig,
    metrics: Option<Arc<dyn MetricsCollector>>,
    install_logging: bool,
}

impl CodaClientBuilder {
    /// Creates a new client builder.
    pub fn new() -> Self {
        Self {
            config_builder: CodaConfigBuilder::new(),
            config: None,
            transport: None,
            auth: None,
            retry_config: None,
            rate_limit_config: RateLimitConfig::default(),
            metrics: None,
            install_logging: false,
        }
    }

    /// Uses a prebuilt configuration; individual config setters are ignored.
    pub fn config(mut self, config: CodaConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the API token.
    pub fn api_token(mut self, api_token: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.api_token(api_token);
        self
    }

    /// Sets the API token from an environment variable.
    pub fn api_token_from_env(mut self, var_name: &str) -> CodaResult<Self> {
        self.config_builder = self.config_builder.api_token_from_env(var_name)?;
        Ok(self)
    }

    /// Sets the base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.base_url(base_url);
        self
    }

    /// Sets the per-attempt request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config_builder = self.config_builder.timeout(timeout);
        self
    }

    /// Sets the maximum retry attempts.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config_builder = self.config_builder.max_retries(retries);
        self
    }

    /// Enables or disables response caching.
    pub fn enable_cache(mut self, enabled: bool) -> Self {
        self.config_builder = self.config_builder.enable_cache(enabled);
        self
    }

    /// Enables or disables client-side rate limiting.
    pub fn enable_rate_limit(mut self, enabled: bool) -> Self {
        self.config_builder = self.config_builder.enable_rate_limit(enabled);
        self
    }

    /// Enables or disables metrics collection.
    pub fn enable_metrics(mut self, enabled: bool) -> Self {
        self.config_builder = self.config_builder.enable_metrics(enabled);
        self
    }

    /// Sets the default cache time-to-live.
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.config_builder = self.config_builder.cache_ttl(ttl);
        self
    }

    /// Sets the diagnostic verbosity.
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config_builder = self.config_builder.log_level(level);
        self
    }

    /// Sets a custom transport.
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets a custom auth provider.
    pub fn auth(mut self, auth: Arc<dyn AuthProvider>) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Sets the retry configuration. Overrides `max_retries`.
    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry_config = Some(config);
        self
    }

    /// Sets the rate limiter budgets.
    pub fn rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.rate_limit_config = config;
        self
    }

    /// Sets a custom metrics collector.
    pub fn metrics(mut self, metrics: Arc<dyn MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Installs a global `tracing` subscriber at the configured log level
    /// when the client is built.
    pub fn install_logging(mut self, install: bool) -> Self {
        self.install_logging = install;
        self
    }

    /// Builds the client.
    pub fn build(self) -> CodaResult<CodaClient> {
        let config = match self.config {
            Some(config) => config,
            None => self.config_builder.build()?,
        };

        if self.install_logging {
            init_logging(config.log_level);
        }

        let transport: Arc<dyn HttpTransport> = match self.transport {
            Some(t) => t,
            None => Arc::new(
                ReqwestTransport::new(config.timeout)
                    .map_err(|e| CodaError::configuration(e.to_string()))?,
            ),
        };

        let auth: Arc<dyn AuthProvider> = match self.auth {
            Some(a) => a,
            None => Arc::new(TokenAuth::new(config.api_token.clone())),
        };
        auth.validate()?;

        let retry = RetryPolicy::new(
            self.retry_config
                .unwrap_or_else(|| RetryConfig::default().max_retries(config.max_retries)),
        );

        let rate_limiter = config
            .enable_rate_limit
            .then(|| Arc::new(RateLimiter::new(self.rate_limit_config)));

        let cache = config
            .enable_cache
            .then(|| ResponseCache::new(config.cache_ttl));

        let metrics = if config.enable_metrics {
            Some(
                self.metrics
                    .unwrap_or_else(|| Arc::new(DefaultMetricsCollector::new())),
            )
        } else {
            None
        };

        tracing::debug!(
            base_url = %config.base_url,
            token = %config.api_token_hint(),
            cache = config.enable_cache,
            rate_limit = config.enable_rate_limit,
            metrics = config.enable_metrics,
            "Coda client initialized"
        );

        let executor = Arc::new(RequestExecutor::new(
            config,
            transport,
            auth,
            retry,
            rate_limiter,
            cache,
            metrics,
        ));

        Ok(CodaClient {
            docs_service: DocsService::new(Arc::clone(&executor)),
            tables_service: TablesService::new(Arc::clone(&executor)),
            rows_service: RowsService::new(Arc::clone(&executor)),
            mutations_service: MutationsService::new(Arc::clone(&executor)),
            executor,
        })
    }
}

impl Default for CodaClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MockAuthProvider;
    use crate::mocks::{mock_client, mock_client_builder, MockTransport, TEST_TOKEN};
    use serde_json::json;

    #[test]
    fn test_builder_rejects_malformed_token() {
        let result = CodaClientBuilder::new().api_token("not-a-token").build();
        assert!(matches!(result, Err(CodaError::Unauthorized { .. })));
    }

    #[test]
    fn test_builder_uses_max_retries_from_config() {
        let client = CodaClient::builder()
            .api_token(TEST_TOKEN)
            .max_retries(5)
            .transport(Arc::new(MockTransport::new()))
            .build()
            .unwrap();

        assert_eq!(client.executor().retry_policy().config().max_retries, 5);
    }

    #[test]
    fn test_custom_auth_provider_is_validated() {
        let mut auth = MockAuthProvider::new();
        auth.expect_validate()
            .times(1)
            .returning(|| Err(CodaError::unauthorized("revoked")));

        let result = mock_client_builder(Arc::new(MockTransport::new()))
            .auth(Arc::new(auth))
            .build();
        assert!(matches!(result, Err(CodaError::Unauthorized { .. })));
    }

    #[tokio::test]
    async fn test_whoami() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_json(&json!({
            "name": "Ada Lovelace",
            "loginId": "ada@example.com",
            "scoped": false,
            "tokenName": "ci"
        }));
        let client = mock_client(Arc::clone(&transport)).unwrap();

        let user = client.whoami().await.unwrap();

        assert_eq!(user.name, "Ada Lovelace");
        assert_eq!(user.token_name.as_deref(), Some("ci"));
        assert_eq!(transport.last_request().unwrap().path(), "/apis/v1/whoami");
    }

    #[tokio::test]
    async fn test_governance_accessors() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_json(&json!({"name": "Ada", "loginId": "ada@example.com"}));
        let client = mock_client(Arc::clone(&transport)).unwrap();

        client.whoami().await.unwrap();
        client.whoami().await.unwrap();

        let metrics = client.metrics().unwrap();
        assert_eq!(metrics.total_requests, 2);
        assert_eq!(metrics.cache_hits, 1);
        assert_eq!(client.cache_stats().unwrap().size, 1);
        assert_eq!(client.rate_limit_stats().unwrap().reads_in_window, 2);

        let exported: serde_json::Value =
            serde_json::from_str(&client.export_metrics().unwrap()).unwrap();
        assert_eq!(exported["totalRequests"], json!(2));

        client.clear_cache();
        client.reset_metrics();
        assert_eq!(client.cache_stats().unwrap().size, 0);
        assert_eq!(client.metrics().unwrap().total_requests, 0);
        assert_eq!(client.cleanup_cache(), 0);
    }

    #[test]
    fn test_disabled_components() {
        let client = mock_client_builder(Arc::new(MockTransport::new()))
            .enable_cache(false)
            .enable_rate_limit(false)
            .enable_metrics(false)
            .build()
            .unwrap();

        assert!(client.metrics().is_none());
        assert!(client.cache_stats().is_none());
        assert!(client.rate_limit_stats().is_none());
        assert!(client.export_metrics().is_err());
        assert_eq!(client.cleanup_cache(), 0);
    }
}
