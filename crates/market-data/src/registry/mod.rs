//! Provider orchestration.
//!
//! This module provides:
//! - Sliding-window rate limiting with cooldown, one limiter per client
//! - Payload validation
//! - The deterministic waterfall across providers
//! - Diagnostic tracking of every tier a request visited

mod diagnostics;
mod rate_limiter;
mod validator;
mod waterfall;

pub use diagnostics::{FetchDiagnostics, ProviderAttempt, SkipReason};
pub use rate_limiter::{Denial, RateLimitConfig, RateLimiter, DEFAULT_WINDOW};
pub use validator::{DataValidator, ValidationIssue, ValidationSeverity};
pub use waterfall::{WaterfallResolver, DEFAULT_TIER_TIMEOUT};
