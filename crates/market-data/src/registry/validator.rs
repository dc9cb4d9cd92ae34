//! Payload validation.
//!
//! Runs on every successful provider answer before it is returned or cached:
//! - Quotes need a finite, positive price
//! - Bars with non-finite or non-positive prices, or high < low, are dropped
//! - Bars are sorted ascending and de-duplicated by timestamp
//! - Option chains must contain at least one contract

use log::warn;

use crate::errors::MarketDataError;
use crate::models::{Bar, OptionChain, Quote};

/// Validation severity levels.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValidationSeverity {
    /// Reject the payload, try the next provider.
    Hard,
    /// Drop the offending item and keep the rest.
    Soft,
}

#[derive(Clone, Debug)]
pub struct ValidationIssue {
    pub severity: ValidationSeverity,
    pub message: String,
}

fn reject(provider: &str, message: impl Into<String>) -> MarketDataError {
    MarketDataError::UpstreamError {
        provider: provider.to_string(),
        status: None,
        message: format!("Validation failed: {}", message.into()),
    }
}

fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// Validator shared by the waterfall.
#[derive(Clone, Debug, Default)]
pub struct DataValidator;

impl DataValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate_quote(&self, provider: &str, quote: &Quote) -> Result<(), MarketDataError> {
        if !positive(quote.price) {
            return Err(reject(
                provider,
                format!("{} price {} is not a positive number", quote.symbol, quote.price),
            ));
        }
        if !quote.change.is_finite() {
            warn!(
                "Quote validation warning for {} from {}: non-finite change",
                quote.symbol, provider
            );
        }
        Ok(())
    }

    /// Check a single bar, returning the first problem found.
    pub fn check_bar(&self, bar: &Bar) -> Option<ValidationIssue> {
        let prices = [bar.open, bar.high, bar.low, bar.close];
        if let Some(bad) = prices.iter().find(|p| !positive(**p)) {
            return Some(ValidationIssue {
                severity: ValidationSeverity::Soft,
                message: format!("Invalid price {} at {}", bad, bar.timestamp),
            });
        }
        if bar.high < bar.low {
            return Some(ValidationIssue {
                severity: ValidationSeverity::Soft,
                message: format!(
                    "High {} below low {} at {}",
                    bar.high, bar.low, bar.timestamp
                ),
            });
        }
        if !bar.volume.is_finite() || bar.volume < 0.0 {
            return Some(ValidationIssue {
                severity: ValidationSeverity::Soft,
                message: format!("Invalid volume {} at {}", bar.volume, bar.timestamp),
            });
        }
        None
    }

    /// Drop invalid bars, sort ascending, de-duplicate timestamps (last one wins).
    ///
    /// An empty input is returned as-is; a non-empty input with no valid bars
    /// is a hard failure.
    pub fn clean_bars(&self, provider: &str, bars: Vec<Bar>) -> Result<Vec<Bar>, MarketDataError> {
        let original_count = bars.len();
        let mut valid: Vec<Bar> = Vec::with_capacity(original_count);

        for bar in bars {
            match self.check_bar(&bar) {
                Some(issue) => warn!("Bar dropped from {}: {}", provider, issue.message),
                None => valid.push(bar),
            }
        }

        if valid.is_empty() && original_count > 0 {
            warn!("All {} bars from '{}' failed validation", original_count, provider);
            return Err(reject(provider, "all bars failed validation"));
        }

        // Stable sort keeps provider order for equal timestamps, so the later duplicate survives.
        valid.sort_by_key(|b| b.timestamp);
        let mut deduped: Vec<Bar> = Vec::with_capacity(valid.len());
        for bar in valid {
            match deduped.last_mut() {
                Some(last) if last.timestamp == bar.timestamp => *last = bar,
                _ => deduped.push(bar),
            }
        }
        Ok(deduped)
    }

    pub fn validate_chain(&self, provider: &str, chain: &OptionChain) -> Result<(), MarketDataError> {
        if chain.is_empty() {
            return Err(reject(provider, format!("empty option chain for {}", chain.symbol)));
        }
        Ok(())
    }
}
