//! HTTP transport layer for the Coda client.
//!
//! The transport is a black box to the rest of the crate: it sends one
//! fully-formed request and returns the status, headers and body, or a
//! [`TransportError`] when no response was received.

mod http;

pub use http::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};

use std::time::Duration;

use crate::errors::CodaError;

/// Transport error types.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// Connection error.
    #[error("Connection error: {message}")]
    Connection {
        /// Error message.
        message: String,
    },

    /// Timeout error.
    #[error("Timeout after {timeout:?}")]
    Timeout {
        /// Timeout duration.
        timeout: Duration,
    },

    /// The response could not be read.
    #[error("Invalid response: {message}")]
    InvalidResponse {
        /// Error message.
        message: String,
    },
}

impl From<TransportError> for CodaError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout { timeout } => CodaError::Timeout {
                message: format!("request timed out after {:?}", timeout),
            },
            other => CodaError::Network {
                message: other.to_string(),
                cause: None,
            },
        }
    }
}
