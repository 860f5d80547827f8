//! Error types for the Coda client.
//!
//! Every failure surfaces to the caller as a [`CodaError`]. Variants derived
//! from an HTTP response carry the status code and, when the server sent a
//! JSON error body, that body as structured `details`.

use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for Coda operations.
pub type CodaResult<T> = Result<T, CodaError>;

/// Retry-after hint used when a 429 response carries no `retry-after` header.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Error type for Coda client operations.
#[derive(Debug, Error)]
pub enum CodaError {
    /// Missing, malformed or rejected credentials (HTTP 401, or at construction).
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// Error message.
        message: String,
        /// HTTP status code, absent for construction-time failures.
        status: Option<u16>,
        /// Structured error body from the server.
        details: Option<Value>,
    },

    /// The credential is valid but lacks access (HTTP 403).
    #[error("Forbidden: {message}")]
    Forbidden {
        /// Error message.
        message: String,
        /// Structured error body from the server.
        details: Option<Value>,
    },

    /// The request was rejected as malformed (HTTP 400 or 422).
    #[error("Invalid request (HTTP {status}): {message}")]
    InvalidRequest {
        /// Error message.
        message: String,
        /// HTTP status code.
        status: u16,
        /// Structured error body from the server.
        details: Option<Value>,
    },

    /// The addressed resource does not exist (HTTP 404).
    #[error("Not found: {message}")]
    NotFound {
        /// Error message.
        message: String,
        /// Structured error body from the server.
        details: Option<Value>,
    },

    /// The server throttled the request (HTTP 429).
    #[error("Rate limited: {message} (retry after {retry_after:?})")]
    RateLimited {
        /// Error message.
        message: String,
        /// How long the server asked the caller to back off.
        retry_after: Duration,
        /// Structured error body from the server.
        details: Option<Value>,
    },

    /// Any other non-success response, 5xx included.
    #[error("Server error (HTTP {status}): {message}")]
    Server {
        /// Error message.
        message: String,
        /// HTTP status code.
        status: u16,
        /// Structured error body from the server.
        details: Option<Value>,
    },

    /// The transport failed before a response was received.
    #[error("Network error: {message}")]
    Network {
        /// Error message.
        message: String,
        /// Underlying cause.
        cause: Option<String>,
    },

    /// A transport attempt or a mutation wait ran past its deadline.
    #[error("Timeout: {message}")]
    Timeout {
        /// Error message.
        message: String,
    },

    /// A batch chunk's mutation finished in the failed state.
    #[error("Mutation {request_id} failed: {message}")]
    MutationFailed {
        /// Request id of the failed mutation.
        request_id: String,
        /// Description including the server-reported error.
        message: String,
    },

    /// Invalid client configuration.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message.
        message: String,
    },

    /// A payload could not be serialized or deserialized.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message.
        message: String,
    },
}

impl CodaError {
    /// Returns true if the request engine may retry after this error.
    ///
    /// Rate-limit errors are deliberately not retryable: the caller is
    /// expected to have been throttled already, so a 429 is surfaced.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CodaError::Server { .. } | CodaError::Network { .. } | CodaError::Timeout { .. }
        )
    }

    /// Returns the retry-after hint of a rate-limit error.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            CodaError::RateLimited { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }

    /// Returns the HTTP status code behind this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            CodaError::Unauthorized { status, .. } => *status,
            CodaError::Forbidden { .. } => Some(403),
            CodaError::InvalidRequest { status, .. } | CodaError::Server { status, .. } => {
                Some(*status)
            }
            CodaError::NotFound { .. } => Some(404),
            CodaError::RateLimited { .. } => Some(429),
            _ => None,
        }
    }

    /// Returns the structured error body sent by the server, if any.
    pub fn details(&self) -> Option<&Value> {
        match self {
            CodaError::Unauthorized { details, .. }
            | CodaError::Forbidden { details, .. }
            | CodaError::InvalidRequest { details, .. }
            | CodaError::NotFound { details, .. }
            | CodaError::RateLimited { details, .. }
            | CodaError::Server { details, .. } => details.as_ref(),
            _ => None,
        }
    }

    /// Short, stable name of the error kind for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            CodaError::Unauthorized { .. } => "unauthorized",
            CodaError::Forbidden { .. } => "forbidden",
            CodaError::InvalidRequest { .. } => "invalid_request",
            CodaError::NotFound { .. } => "not_found",
            CodaError::RateLimited { .. } => "rate_limited",
            CodaError::Server { .. } => "server",
            CodaError::Network { .. } => "network",
            CodaError::Timeout { .. } => "timeout",
            CodaError::MutationFailed { .. } => "mutation_failed",
            CodaError::Configuration { .. } => "configuration",
            CodaError::Serialization { .. } => "serialization",
        }
    }

    /// Creates a construction-time credential error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        CodaError::Unauthorized {
            message: message.into(),
            status: None,
            details: None,
        }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        CodaError::Configuration {
            message: message.into(),
        }
    }

    /// Creates a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        CodaError::Serialization {
            message: message.into(),
        }
    }

    /// Creates a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        CodaError::Timeout {
            message: message.into(),
        }
    }

    /// Classifies a non-success HTTP response.
    ///
    /// `message` is the server-provided message when the body had one,
    /// `retry_after` the parsed `retry-after` header.
    pub fn from_status(
        status: u16,
        message: Option<String>,
        details: Option<Value>,
        retry_after: Option<Duration>,
    ) -> Self {
        let message = message.unwrap_or_else(|| format!("HTTP {}", status));
        match status {
            400 | 422 => CodaError::InvalidRequest {
                message,
                status,
                details,
            },
            401 => CodaError::Unauthorized {
                message,
                status: Some(status),
                details,
            },
            403 => CodaError::Forbidden { message, details },
            404 => CodaError::NotFound { message, details },
            429 => CodaError::RateLimited {
                message,
                retry_after: retry_after.unwrap_or(DEFAULT_RETRY_AFTER),
                details,
            },
            _ => CodaError::Server {
                message,
                status,
                details,
            },
        }
    }
}

/// Error body returned by the Coda API.
#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorResponse {
    /// HTTP status code echoed by the server.
    pub status_code: Option<u16>,
    /// HTTP status text echoed by the server.
    pub status_message: Option<String>,
    /// Human readable error message.
    pub message: Option<String>,
}

impl From<serde_json::Error> for CodaError {
    fn from(err: serde_json::Error) -> Self {
        CodaError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<url::ParseError> for CodaError {
    fn from(err: url::ParseError) -> Self {
        CodaError::Configuration {
            message: format!("Invalid URL: {}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_error_is_retryable() {
        assert!(CodaError::Server {
            message: "test".to_string(),
            status: 503,
            details: None,
        }
        .is_retryable());

        assert!(CodaError::Network {
            message: "reset".to_string(),
            cause: None,
        }
        .is_retryable());

        assert!(!CodaError::RateLimited {
            message: "test".to_string(),
            retry_after: Duration::from_secs(1),
            details: None,
        }
        .is_retryable());

        assert!(!CodaError::unauthorized("bad token").is_retryable());
    }

    #[test_case(400, "invalid_request", false; "bad request")]
    #[test_case(401, "unauthorized", false; "unauthorized")]
    #[test_case(403, "forbidden", false; "forbidden")]
    #[test_case(404, "not_found", false; "not found")]
    #[test_case(422, "invalid_request", false; "unprocessable")]
    #[test_case(429, "rate_limited", false; "too many requests")]
    #[test_case(500, "server", true; "internal error")]
    #[test_case(502, "server", true; "bad gateway")]
    #[test_case(409, "server", true; "conflict")]
    fn test_from_status_classification(status: u16, kind: &str, retryable: bool) {
        let error = CodaError::from_status(status, None, None, None);
        assert_eq!(error.kind(), kind);
        assert_eq!(error.is_retryable(), retryable);
        assert_eq!(error.status(), Some(status));
    }

    #[test]
    fn test_generic_message_when_server_sent_none() {
        let error = CodaError::from_status(503, None, None, None);
        assert!(error.to_string().contains("HTTP 503"));
    }

    #[test]
    fn test_rate_limited_defaults_retry_after() {
        let error = CodaError::from_status(429, None, None, None);
        assert_eq!(error.retry_after(), Some(DEFAULT_RETRY_AFTER));

        let error = CodaError::from_status(429, None, None, Some(Duration::from_secs(7)));
        assert_eq!(error.retry_after(), Some(Duration::from_secs(7)));
    }

    #[test]
    fn test_details_are_kept() {
        let body = serde_json::json!({"statusCode": 400, "message": "Bad row"});
        let error = CodaError::from_status(400, Some("Bad row".into()), Some(body.clone()), None);
        assert_eq!(error.details(), Some(&body));
        assert!(error.to_string().contains("Bad row"));
    }
}
