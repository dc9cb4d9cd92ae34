//! Error types and retry classification for the market data crate.
//!
//! This module provides:
//! - [`MarketDataError`]: The main error enum for all market data operations
//! - [`RetryClass`]: Classification for determining waterfall behavior

mod retry;

pub use retry::RetryClass;

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during market data operations.
///
/// Every provider-level variant is converted into a waterfall continuation by
/// the resolver. Only exhaustion of all providers reaches the caller, and then
/// as [`MarketDataError::NotFound`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarketDataError {
    /// Token refresh failed. The provider is unusable until the next attempt.
    #[error("Authentication failed: {provider} - {message}")]
    AuthError {
        /// The provider whose credentials could not be refreshed
        provider: String,
        /// Description of the failure
        message: String,
    },

    /// A cooldown is active or the provider answered with a throttle response.
    #[error("Throttled: {provider}")]
    Throttled {
        /// The throttled provider
        provider: String,
        /// Remaining cooldown, when known
        retry_after: Option<Duration>,
    },

    /// The local sliding window is full. The request was never sent.
    #[error("Request window exceeded: {provider} ({limit}/min)")]
    WindowExceeded {
        /// The provider whose window is full
        provider: String,
        /// Effective per-window limit
        limit: u32,
    },

    /// Non-2xx response, transport error, or malformed payload.
    #[error("Upstream error: {provider} ({status:?}) - {message}")]
    UpstreamError {
        /// The provider that failed
        provider: String,
        /// HTTP status, if a response was received
        status: Option<u16>,
        /// Error detail
        message: String,
    },

    /// The provider did not answer within the per-tier deadline.
    #[error("Timeout: {provider}")]
    Timeout {
        /// The provider that timed out
        provider: String,
    },

    /// The provider does not serve the requested resource.
    #[error("Operation '{operation}' not supported by {provider}")]
    NotSupported {
        /// The operation that was requested
        operation: String,
        /// The provider that doesn't support it
        provider: String,
    },

    /// No provider could satisfy the request.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The fetched series is too short for the indicator lookback windows.
    #[error("Insufficient data: need {required} bars, have {available}")]
    InsufficientData {
        /// Minimum number of bars needed
        required: usize,
        /// Number of bars actually available
        available: usize,
    },
}

impl MarketDataError {
    /// Returns the retry classification for this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use optionscope_market_data::errors::{MarketDataError, RetryClass};
    ///
    /// let error = MarketDataError::WindowExceeded { provider: "TRADIER".to_string(), limit: 108 };
    /// assert_eq!(error.retry_class(), RetryClass::SkipProvider);
    ///
    /// let error = MarketDataError::NotFound("AAPL".to_string());
    /// assert_eq!(error.retry_class(), RetryClass::Terminal);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::AuthError { .. } | Self::Throttled { .. } | Self::WindowExceeded { .. } => {
                RetryClass::SkipProvider
            }

            Self::UpstreamError { .. } | Self::Timeout { .. } | Self::NotSupported { .. } => {
                RetryClass::NextProvider
            }

            Self::NotFound(_) | Self::InsufficientData { .. } => RetryClass::Terminal,
        }
    }

    /// Shorthand for a payload that could not be decoded.
    pub(crate) fn malformed(provider: &str, message: impl std::fmt::Display) -> Self {
        Self::UpstreamError {
            provider: provider.to_string(),
            status: None,
            message: format!("Malformed payload: {}", message),
        }
    }

    pub(crate) fn not_supported(provider: &str, operation: &str) -> Self {
        Self::NotSupported {
            operation: operation.to_string(),
            provider: provider.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_refusals_skip_provider() {
        let errors = [
            MarketDataError::AuthError {
                provider: "SCHWAB".to_string(),
                message: "refresh token revoked".to_string(),
            },
            MarketDataError::Throttled {
                provider: "TRADIER".to_string(),
                retry_after: Some(Duration::from_secs(60)),
            },
            MarketDataError::WindowExceeded {
                provider: "ALPACA".to_string(),
                limit: 180,
            },
        ];

        for error in errors {
            assert_eq!(error.retry_class(), RetryClass::SkipProvider, "{}", error);
        }
    }

    #[test]
    fn test_upstream_failures_try_next_provider() {
        let error = MarketDataError::UpstreamError {
            provider: "YAHOO".to_string(),
            status: Some(500),
            message: "Internal server error".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::NextProvider);

        let error = MarketDataError::Timeout {
            provider: "SCHWAB".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::NextProvider);

        let error = MarketDataError::not_supported("ALPACA", "option_chain");
        assert_eq!(error.retry_class(), RetryClass::NextProvider);
    }

    #[test]
    fn test_terminal_errors() {
        assert_eq!(
            MarketDataError::NotFound("ZZZZ".to_string()).retry_class(),
            RetryClass::Terminal
        );
        assert_eq!(
            MarketDataError::InsufficientData {
                required: 26,
                available: 3
            }
            .retry_class(),
            RetryClass::Terminal
        );
    }

    #[test]
    fn test_error_display() {
        let error = MarketDataError::NotFound("AAPL".to_string());
        assert_eq!(format!("{}", error), "Not found: AAPL");

        let error = MarketDataError::Throttled {
            provider: "TRADIER".to_string(),
            retry_after: None,
        };
        assert_eq!(format!("{}", error), "Throttled: TRADIER");

        let error = MarketDataError::UpstreamError {
            provider: "FINNHUB".to_string(),
            status: Some(401),
            message: "Invalid API key".to_string(),
        };
        assert_eq!(
            format!("{}", error),
            "Upstream error: FINNHUB (Some(401)) - Invalid API key"
        );
    }
}
