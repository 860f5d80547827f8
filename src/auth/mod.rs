//! Authentication module for the Coda client.
//!
//! Coda authenticates every call with a bearer API token.

use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;

use crate::errors::{CodaError, CodaResult};

/// Minimum number of token characters once separators are stripped.
pub const MIN_TOKEN_LENGTH: usize = 32;

/// Authentication provider trait.
///
/// Implementations add credentials to the headers of every request.
#[cfg_attr(test, mockall::automock)]
pub trait AuthProvider: Send + Sync {
    /// Apply authentication to request headers.
    fn apply_auth(&self, headers: &mut HashMap<String, String>);

    /// Get the authentication scheme name.
    fn scheme(&self) -> &str;

    /// Validate the credentials.
    fn validate(&self) -> CodaResult<()>;
}

/// Checks the basic shape of an API token.
///
/// The token must be non-empty and, after stripping `-` separators, consist
/// of at least [`MIN_TOKEN_LENGTH`] ASCII alphanumeric characters.
pub fn validate_token_shape(token: &str) -> CodaResult<()> {
    if token.is_empty() {
        return Err(CodaError::unauthorized("API token cannot be empty"));
    }

    let stripped: String = token.chars().filter(|c| *c != '-').collect();
    if stripped.len() < MIN_TOKEN_LENGTH {
        return Err(CodaError::unauthorized(format!(
            "API token is too short (expected at least {} characters)",
            MIN_TOKEN_LENGTH
        )));
    }
    if !stripped.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(CodaError::unauthorized(
            "API token contains unexpected characters",
        ));
    }

    Ok(())
}

/// Bearer token authentication provider.
pub struct TokenAuth {
    api_token: SecretString,
}

impl TokenAuth {
    /// Creates a new token authentication provider.
    pub fn new(api_token: SecretString) -> Self {
        Self { api_token }
    }

    /// Creates from a plain string token.
    pub fn from_string(api_token: impl Into<String>) -> Self {
        Self {
            api_token: SecretString::new(api_token.into()),
        }
    }

    /// Gets a hint of the token for debugging (last 4 characters).
    pub fn token_hint(&self) -> String {
        let token = self.api_token.expose_secret();
        if token.len() > 4 {
            format!("...{}", &token[token.len() - 4..])
        } else {
            "****".to_string()
        }
    }
}

impl AuthProvider for TokenAuth {
    fn apply_auth(&self, headers: &mut HashMap<String, String>) {
        headers.insert(
            "Authorization".to_string(),
            format!("Bearer {}", self.api_token.expose_secret()),
        );
    }

    fn scheme(&self) -> &str {
        "Bearer"
    }

    fn validate(&self) -> CodaResult<()> {
        validate_token_shape(self.api_token.expose_secret())
    }
}

impl std::fmt::Debug for TokenAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAuth")
            .field("api_token", &"[REDACTED]")
            .field("token_hint", &self.token_hint())
            .finish()
    }
}
