//! Per-request record of what each provider tier did.

use crate::errors::{MarketDataError, RetryClass};
use crate::models::ProviderId;

/// Why a provider was skipped without an upstream call.
#[derive(Clone, Debug, PartialEq)]
pub enum SkipReason {
    /// Provider doesn't serve this resource.
    ResourceNotSupported,

    /// Cooldown active after a throttle response.
    CoolingDown,

    /// Local sliding window is full.
    WindowFull,

    /// Token refresh failed.
    AuthFailed { message: String },
}

impl SkipReason {
    /// Map a locally refused call to a skip reason.
    pub fn from_error(error: &MarketDataError) -> Option<Self> {
        if error.retry_class() != RetryClass::SkipProvider {
            return None;
        }
        match error {
            MarketDataError::Throttled { .. } => Some(Self::CoolingDown),
            MarketDataError::WindowExceeded { .. } => Some(Self::WindowFull),
            MarketDataError::AuthError { message, .. } => Some(Self::AuthFailed {
                message: message.clone(),
            }),
            _ => None,
        }
    }
}

/// Record of a single provider attempt.
#[derive(Clone, Debug)]
pub struct ProviderAttempt {
    pub provider_id: ProviderId,
    pub skipped: Option<SkipReason>,
    pub error: Option<String>,
    pub success: bool,
}

/// Every tier visited by one waterfall run, in order.
#[derive(Clone, Debug, Default)]
pub struct FetchDiagnostics {
    pub attempts: Vec<ProviderAttempt>,
}

impl FetchDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_skip(&mut self, provider_id: ProviderId, reason: SkipReason) {
        self.attempts.push(ProviderAttempt {
            provider_id,
            skipped: Some(reason),
            error: None,
            success: false,
        });
    }

    pub fn record_error(&mut self, provider_id: ProviderId, error: String) {
        self.attempts.push(ProviderAttempt {
            provider_id,
            skipped: None,
            error: Some(error),
            success: false,
        });
    }

    /// Record a failure as a skip when it was refused locally, as an error otherwise.
    pub fn record_failure(&mut self, provider_id: ProviderId, error: &MarketDataError) {
        match SkipReason::from_error(error) {
            Some(reason) => self.record_skip(provider_id, reason),
            None => self.record_error(provider_id, error.to_string()),
        }
    }

    pub fn record_success(&mut self, provider_id: ProviderId) {
        self.attempts.push(ProviderAttempt {
            provider_id,
            skipped: None,
            error: None,
            success: true,
        });
    }

    /// One-line summary, e.g. `TRADIER: ERROR (...) -> SCHWAB: SUCCESS`.
    pub fn summary(&self) -> String {
        self.attempts
            .iter()
            .map(|a| {
                if a.success {
                    format!("{}: SUCCESS", a.provider_id)
                } else if let Some(skip) = &a.skipped {
                    format!("{}: SKIPPED ({:?})", a.provider_id, skip)
                } else if let Some(err) = &a.error {
                    format!("{}: ERROR ({})", a.provider_id, err)
                } else {
                    format!("{}: UNKNOWN", a.provider_id)
                }
            })
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    pub fn has_success(&self) -> bool {
        self.attempts.iter().any(|a| a.success)
    }

    /// Providers that were actually asked over the wire (errors and successes).
    pub fn attempted(&self) -> Vec<&str> {
        self.attempts
            .iter()
            .filter(|a| a.skipped.is_none())
            .map(|a| a.provider_id.as_ref())
            .collect()
    }

    pub fn skip_reasons(&self) -> Vec<(&ProviderId, &SkipReason)> {
        self.attempts
            .iter()
            .filter_map(|a| a.skipped.as_ref().map(|s| (&a.provider_id, s)))
            .collect()
    }
}
