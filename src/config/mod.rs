//! Configuration module for the Coda client.
//!
//! Configuration is explicit: a [`CodaConfig`] is built once and handed to
//! the client. The environment is only consulted as a named fallback for the
//! API token when the builder was not given one, or through
//! [`CodaConfig::from_env`].

use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use url::Url;

use crate::auth::validate_token_shape;
use crate::errors::{CodaError, CodaResult};
use crate::observability::LogLevel;

/// Default base URL for the Coda API.
pub const DEFAULT_BASE_URL: &str = "https://coda.io/apis/v1";

/// Default per-attempt request timeout (30 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default maximum retry attempts.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default time-to-live for cached responses (5 minutes).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Environment variable holding the API token.
pub const TOKEN_ENV_VAR: &str = "CODA_API_TOKEN";

/// Default `User-Agent` sent with every request.
pub fn default_user_agent() -> String {
    format!("coda-client-rust/{}", env!("CARGO_PKG_VERSION"))
}

/// Configuration for the Coda client.
#[derive(Clone)]
pub struct CodaConfig {
    /// API token (stored securely).
    pub(crate) api_token: SecretString,
    /// Base URL for API requests, without a trailing slash.
    pub base_url: String,
    /// Per-attempt request timeout.
    pub timeout: Duration,
    /// Maximum retry attempts after the first one.
    pub max_retries: u32,
    /// Cache GET responses.
    pub enable_cache: bool,
    /// Throttle outgoing calls client-side.
    pub enable_rate_limit: bool,
    /// Collect request metrics.
    pub enable_metrics: bool,
    /// Default time-to-live for cached responses.
    pub cache_ttl: Duration,
    /// Verbosity of diagnostic output.
    pub log_level: LogLevel,
    /// `User-Agent` header value.
    pub user_agent: String,
}

impl CodaConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> CodaConfigBuilder {
        CodaConfigBuilder::new()
    }

    /// Creates a configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `CODA_API_TOKEN` (required): API token
    /// - `CODA_BASE_URL` (optional): Custom base URL
    /// - `CODA_TIMEOUT` (optional): Request timeout in seconds
    /// - `CODA_MAX_RETRIES` (optional): Maximum retry attempts
    /// - `CODA_LOG_LEVEL` (optional): `none`, `error`, `warn`, `info` or `debug`
    pub fn from_env() -> CodaResult<Self> {
        let mut builder = CodaConfigBuilder::new().api_token_from_env(TOKEN_ENV_VAR)?;

        if let Ok(base_url) = std::env::var("CODA_BASE_URL") {
            builder = builder.base_url(base_url);
        }
        if let Some(secs) = env_parse::<u64>("CODA_TIMEOUT") {
            builder = builder.timeout_secs(secs);
        }
        if let Some(retries) = env_parse::<u32>("CODA_MAX_RETRIES") {
            builder = builder.max_retries(retries);
        }
        if let Some(level) = env_parse::<LogLevel>("CODA_LOG_LEVEL") {
            builder = builder.log_level(level);
        }

        builder.build()
    }

    /// Returns the token hint (last 4 characters) for debugging.
    pub fn api_token_hint(&self) -> String {
        let chars: Vec<char> = self.api_token.expose_secret().chars().collect();
        match chars.len() {
            0..=4 => "****".to_string(),
            n => format!("...{}", chars[n - 4..].iter().collect::<String>()),
        }
    }
}

impl std::fmt::Debug for CodaConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodaConfig")
            .field("api_token", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("enable_cache", &self.enable_cache)
            .field("enable_rate_limit", &self.enable_rate_limit)
            .field("enable_metrics", &self.enable_metrics)
            .field("cache_ttl", &self.cache_ttl)
            .field("log_level", &self.log_level)
            .finish()
    }
}

/// Builder for `CodaConfig`.
#[derive(Default)]
pub struct CodaConfigBuilder {
    api_token: Option<String>,
    base_url: Option<String>,
    timeout: Option<Duration>,
    max_retries: Option<u32>,
    enable_cache: Option<bool>,
    enable_rate_limit: Option<bool>,
    enable_metrics: Option<bool>,
    cache_ttl: Option<Duration>,
    log_level: Option<LogLevel>,
    user_agent: Option<String>,
}

impl CodaConfigBuilder {
    /// Creates a new configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API token.
    pub fn api_token(mut self, api_token: impl Into<String>) -> Self {
        self.api_token = Some(api_token.into());
        self
    }

    /// Sets the API token from an environment variable.
    pub fn api_token_from_env(mut self, var_name: &str) -> CodaResult<Self> {
        let api_token = std::env::var(var_name).map_err(|_| {
            CodaError::unauthorized(format!("Environment variable {} not set", var_name))
        })?;
        self.api_token = Some(api_token);
        Ok(self)
    }

    /// Sets the base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the per-attempt request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the timeout in seconds.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = Some(Duration::from_secs(secs));
        self
    }

    /// Sets the maximum retry attempts.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Enables or disables response caching.
    pub fn enable_cache(mut self, enabled: bool) -> Self {
        self.enable_cache = Some(enabled);
        self
    }

    /// Enables or disables client-side rate limiting.
    pub fn enable_rate_limit(mut self, enabled: bool) -> Self {
        self.enable_rate_limit = Some(enabled);
        self
    }

    /// Enables or disables metrics collection.
    pub fn enable_metrics(mut self, enabled: bool) -> Self {
        self.enable_metrics = Some(enabled);
        self
    }

    /// Sets the default cache time-to-live.
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// Sets the diagnostic verbosity.
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.log_level = Some(level);
        self
    }

    /// Overrides the `User-Agent` header.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Builds the configuration.
    ///
    /// Falls back to `CODA_API_TOKEN` when no token was set. A missing or
    /// malformed token is an [`CodaError::Unauthorized`] error.
    pub fn build(self) -> CodaResult<CodaConfig> {
        let api_token = match self.api_token {
            Some(token) => token,
            None => std::env::var(TOKEN_ENV_VAR).map_err(|_| {
                CodaError::unauthorized(format!(
                    "API token is required (set it explicitly or via {})",
                    TOKEN_ENV_VAR
                ))
            })?,
        };
        let api_token = api_token.trim().to_string();
        validate_token_shape(&api_token)?;

        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        validate_base_url(&base_url)?;

        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT);
        if timeout.is_zero() {
            return Err(CodaError::configuration("Timeout must be greater than zero"));
        }

        Ok(CodaConfig {
            api_token: SecretString::new(api_token),
            base_url,
            timeout,
            max_retries: self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            enable_cache: self.enable_cache.unwrap_or(true),
            enable_rate_limit: self.enable_rate_limit.unwrap_or(true),
            enable_metrics: self.enable_metrics.unwrap_or(true),
            cache_ttl: self.cache_ttl.unwrap_or(DEFAULT_CACHE_TTL),
            log_level: self.log_level.unwrap_or_default(),
            user_agent: self.user_agent.unwrap_or_else(default_user_agent),
        })
    }
}

/// Reads and parses `name`. Unset or unparsable values count as absent.
fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(variable = name, "Ignoring unparsable environment value");
            None
        }
    }
}

/// HTTPS is required except for loopback hosts used by local test servers.
fn validate_base_url(base_url: &str) -> CodaResult<()> {
    let url = Url::parse(base_url)?;
    match url.scheme() {
        "https" => Ok(()),
        "http" if matches!(url.host_str(), Some("localhost" | "127.0.0.1" | "[::1]")) => Ok(()),
        _ => Err(CodaError::configuration("Base URL must use HTTPS")),
    }
}
