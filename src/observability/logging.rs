//! Logging configuration and utilities.
//!
//! The crate logs through `tracing`. [`init_logging`] is a convenience for
//! binaries that want a subscriber matching the configured verbosity.

use regex::Regex;
use std::str::FromStr;
use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;

use crate::errors::CodaError;

/// Diagnostic verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LogLevel {
    /// No output.
    None,
    /// Errors only.
    Error,
    /// Errors and warnings.
    Warn,
    /// Informational messages.
    #[default]
    Info,
    /// Everything, including per-request detail.
    Debug,
}

impl LogLevel {
    /// Returns the `tracing` filter directive for this level.
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::None => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }
}

impl FromStr for LogLevel {
    type Err = CodaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "off" => Ok(LogLevel::None),
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" | "trace" => Ok(LogLevel::Debug),
            other => Err(CodaError::configuration(format!(
                "Unknown log level '{}'",
                other
            ))),
        }
    }
}

/// Installs a global `tracing` subscriber filtered to `level`.
///
/// `RUST_LOG` overrides the level when set. Returns false if a global
/// subscriber was already installed.
pub fn init_logging(level: LogLevel) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("coda_client={}", level.as_directive())));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}

fn redaction_patterns() -> &'static [(Regex, &'static str)] {
    static PATTERNS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (r"Bearer [A-Za-z0-9_\-\.]+", "Bearer ***"),
            (r"(?i)authorization[=:]\s*[^\s,}]+", "authorization=***"),
            (r"(?i)api[_-]?token[=:]\s*[^\s,}]+", "api_token=***"),
        ]
        .into_iter()
        .filter_map(|(pattern, replacement)| {
            Regex::new(pattern).ok().map(|re| (re, replacement))
        })
        .collect()
    })
}

/// Redacts credentials from text before it is logged.
pub fn redact_secrets(text: &str) -> String {
    redaction_patterns()
        .iter()
        .fold(text.to_string(), |acc, (re, replacement)| {
            re.replace_all(&acc, *replacement).into_owned()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::None < LogLevel::Error);
        assert!(LogLevel::Error < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Debug);
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!("DEBUG".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("none".parse::<LogLevel>().unwrap(), LogLevel::None);
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("loud".parse::<LogLevel>().is_err());
        assert_eq!(LogLevel::None.as_directive(), "off");
    }

    #[test]
    fn test_redaction() {
        let redacted = redact_secrets("Authorization: Bearer a1b2c3d4-e5f6-7890");
        assert!(!redacted.contains("a1b2c3d4"));

        let redacted = redact_secrets("config api_token=secret123 base=x");
        assert!(!redacted.contains("secret123"));
        assert!(redacted.contains("base=x"));
    }
}
