//! Error types and retry classification for the market data crate.
//!
//! This module provides:
//! - [`MarketDataError`]: The main error enum for all market data operations
//! - [`RetryClass`]: Classification for determining retry behavior

mod retry;

pub use retry::RetryClass;

use std::time::Duration;

use thiserror::Error;

use crate::registry::ProviderAttempt;

/// Errors that can occur during market data operations.
///
/// Each variant is classified into a [`RetryClass`] via the [`retry_class`](Self::retry_class)
/// method, which tells callers whether to skip, retry or abort.
///
/// An unknown symbol is not an error: providers return `Ok(None)` for it.
#[derive(Error, Debug)]
pub enum MarketDataError {
    /// Could not establish or maintain the session to the external source.
    #[error("Connection failed: {provider} - {message}")]
    Connection {
        /// The provider whose session failed
        provider: String,
        /// The original error message
        message: String,
    },

    /// The operation is outside the provider's declared capability set.
    #[error("Not supported: {provider} does not provide {operation}")]
    NotSupported {
        /// The operation that was requested (e.g., "historical data")
        operation: String,
        /// The provider that lacks the capability
        provider: String,
    },

    /// Malformed input: empty symbol, unknown period/timeframe token, zero timeout.
    #[error("Validation failed: {message}")]
    ValidationFailed {
        /// Description of the validation failure
        message: String,
    },

    /// The external call exceeded the caller-specified duration.
    #[error("Timeout after {timeout:?}: {provider}")]
    Timeout {
        /// The provider that timed out
        provider: String,
        /// The deadline that expired
        timeout: Duration,
    },

    /// The selector probed every candidate and none was reachable.
    #[error("No provider available: {}", summarize(.attempts))]
    NoProviderAvailable {
        /// Every attempted candidate, in probe order, with its failure reason.
        attempts: Vec<ProviderAttempt>,
    },

    /// A provider-specific failure that maps to no other kind.
    #[error("Provider error: {provider} - {message}")]
    ProviderError {
        /// The provider that returned the error
        provider: String,
        /// The error message from the provider
        message: String,
    },

    /// Provider construction parameters are missing or malformed.
    #[error("Configuration error: {0}")]
    Config(String),
}

fn summarize(attempts: &[ProviderAttempt]) -> String {
    if attempts.is_empty() {
        return "no candidates".to_string();
    }
    attempts
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

impl MarketDataError {
    /// Shorthand for a validation failure.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            message: message.into(),
        }
    }

    /// Shorthand for a capability gap.
    pub fn not_supported(provider: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::NotSupported {
            operation: operation.into(),
            provider: provider.into(),
        }
    }

    /// Returns the retry classification for this error.
    ///
    /// - [`RetryClass::Never`]: Don't retry, the error is terminal
    /// - [`RetryClass::Retry`]: Retry, possibly with a longer timeout
    /// - [`RetryClass::Reselect`]: Retry or select a different provider
    /// - [`RetryClass::SkipProvider`]: Permanent capability gap for this provider
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use brokerdata_market_data::errors::{MarketDataError, RetryClass};
    ///
    /// let error = MarketDataError::Timeout {
    ///     provider: "IBKR".to_string(),
    ///     timeout: Duration::from_secs(5),
    /// };
    /// assert_eq!(error.retry_class(), RetryClass::Retry);
    ///
    /// let error = MarketDataError::not_supported("TASTYTRADE", "historical data");
    /// assert_eq!(error.retry_class(), RetryClass::SkipProvider);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::ValidationFailed { .. }
            | Self::Config(_)
            | Self::ProviderError { .. }
            | Self::NoProviderAvailable { .. } => RetryClass::Never,

            Self::Timeout { .. } => RetryClass::Retry,

            Self::Connection { .. } => RetryClass::Reselect,

            Self::NotSupported { .. } => RetryClass::SkipProvider,
        }
    }

    /// True for a declared capability gap.
    pub fn is_not_supported(&self) -> bool {
        matches!(self, Self::NotSupported { .. })
    }

    /// True when the caller's deadline expired.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ProbeState;

    #[test]
    fn test_validation_never_retries() {
        let error = MarketDataError::validation("symbol must not be empty");
        assert_eq!(error.retry_class(), RetryClass::Never);
    }

    #[test]
    fn test_config_never_retries() {
        let error = MarketDataError::Config("BD_IBKR_PORT is not a number".to_string());
        assert_eq!(error.retry_class(), RetryClass::Never);
    }

    #[test]
    fn test_unmapped_provider_error_never_retries() {
        let error = MarketDataError::ProviderError {
            provider: "IBKR".to_string(),
            message: "unexpected payload".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::Never);
    }

    #[test]
    fn test_timeout_retries() {
        let error = MarketDataError::Timeout {
            provider: "IBKR".to_string(),
            timeout: Duration::from_millis(250),
        };
        assert_eq!(error.retry_class(), RetryClass::Retry);
        assert!(error.is_timeout());
    }

    #[test]
    fn test_connection_reselects() {
        let error = MarketDataError::Connection {
            provider: "TASTYTRADE".to_string(),
            message: "login rejected".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::Reselect);
    }

    #[test]
    fn test_not_supported_skips_provider() {
        let error = MarketDataError::not_supported("TASTYTRADE", "historical data");
        assert_eq!(error.retry_class(), RetryClass::SkipProvider);
        assert!(error.is_not_supported());
        assert!(!error.is_timeout());
    }

    #[test]
    fn test_no_provider_available_never_retries() {
        let error = MarketDataError::NoProviderAvailable {
            attempts: Vec::new(),
        };
        assert_eq!(error.retry_class(), RetryClass::Never);
        assert_eq!(
            format!("{}", error),
            "No provider available: no candidates"
        );
    }

    #[test]
    fn test_no_provider_available_lists_attempts() {
        let error = MarketDataError::NoProviderAvailable {
            attempts: vec![
                ProviderAttempt::unreachable("IBKR", "connection refused"),
                ProviderAttempt::unreachable("TASTYTRADE", "login rejected"),
            ],
        };
        let text = format!("{}", error);
        assert!(text.contains("IBKR: UNREACHABLE (connection refused)"));
        assert!(text.contains("TASTYTRADE: UNREACHABLE (login rejected)"));
        assert!(text.find("IBKR").unwrap() < text.find("TASTYTRADE").unwrap());

        if let MarketDataError::NoProviderAvailable { attempts } = error {
            assert!(attempts.iter().all(|a| a.state == ProbeState::Unreachable));
        }
    }

    #[test]
    fn test_error_display() {
        let error = MarketDataError::not_supported("TASTYTRADE", "historical data");
        assert_eq!(
            format!("{}", error),
            "Not supported: TASTYTRADE does not provide historical data"
        );

        let error = MarketDataError::Connection {
            provider: "IBKR".to_string(),
            message: "gateway session is not authenticated".to_string(),
        };
        assert_eq!(
            format!("{}", error),
            "Connection failed: IBKR - gateway session is not authenticated"
        );
    }
}
