use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{Bar, Fundamentals, OptionChain, Quote, Sentiment, Timeframe};
use crate::errors::MarketDataError;

/// Resource families a provider may serve.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceKind {
    Quote,
    Bars,
    OptionChain,
    Fundamentals,
    Sentiment,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quote => "quote",
            Self::Bars => "bars",
            Self::OptionChain => "option_chain",
            Self::Fundamentals => "fundamentals",
            Self::Sentiment => "sentiment",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of work for the waterfall.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum ResourceRequest {
    Quote {
        symbol: String,
    },
    Bars {
        symbol: String,
        timeframe: Timeframe,
    },
    OptionChain {
        symbol: String,
        expiry: Option<NaiveDate>,
    },
    Fundamentals {
        symbol: String,
    },
    Sentiment {
        symbol: String,
    },
}

impl ResourceRequest {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Quote { .. } => ResourceKind::Quote,
            Self::Bars { .. } => ResourceKind::Bars,
            Self::OptionChain { .. } => ResourceKind::OptionChain,
            Self::Fundamentals { .. } => ResourceKind::Fundamentals,
            Self::Sentiment { .. } => ResourceKind::Sentiment,
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            Self::Quote { symbol }
            | Self::Bars { symbol, .. }
            | Self::OptionChain { symbol, .. }
            | Self::Fundamentals { symbol }
            | Self::Sentiment { symbol } => symbol,
        }
    }
}

impl fmt::Display for ResourceRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bars { symbol, timeframe } => write!(f, "bars {} {}", symbol, timeframe),
            Self::OptionChain {
                symbol,
                expiry: Some(expiry),
            } => write!(f, "option_chain {} {}", symbol, expiry),
            other => write!(f, "{} {}", other.kind(), other.symbol()),
        }
    }
}

/// Successful answer to a [`ResourceRequest`].
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    Quote(Quote),
    Bars(Vec<Bar>),
    OptionChain(OptionChain),
    Fundamentals(Fundamentals),
    Sentiment(Sentiment),
}

fn mismatch(expected: ResourceKind, got: &Payload) -> MarketDataError {
    MarketDataError::UpstreamError {
        provider: "RESOLVER".to_string(),
        status: None,
        message: format!("Expected {} payload, got {}", expected, got.kind()),
    }
}

impl Payload {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Quote(_) => ResourceKind::Quote,
            Self::Bars(_) => ResourceKind::Bars,
            Self::OptionChain(_) => ResourceKind::OptionChain,
            Self::Fundamentals(_) => ResourceKind::Fundamentals,
            Self::Sentiment(_) => ResourceKind::Sentiment,
        }
    }

    pub fn into_quote(self) -> Result<Quote, MarketDataError> {
        match self {
            Self::Quote(q) => Ok(q),
            other => Err(mismatch(ResourceKind::Quote, &other)),
        }
    }

    pub fn into_bars(self) -> Result<Vec<Bar>, MarketDataError> {
        match self {
            Self::Bars(b) => Ok(b),
            other => Err(mismatch(ResourceKind::Bars, &other)),
        }
    }

    pub fn into_option_chain(self) -> Result<OptionChain, MarketDataError> {
        match self {
            Self::OptionChain(c) => Ok(c),
            other => Err(mismatch(ResourceKind::OptionChain, &other)),
        }
    }

    pub fn into_fundamentals(self) -> Result<Fundamentals, MarketDataError> {
        match self {
            Self::Fundamentals(f) => Ok(f),
            other => Err(mismatch(ResourceKind::Fundamentals, &other)),
        }
    }

    pub fn into_sentiment(self) -> Result<Sentiment, MarketDataError> {
        match self {
            Self::Sentiment(s) => Ok(s),
            other => Err(mismatch(ResourceKind::Sentiment, &other)),
        }
    }
}

/// How a served value was obtained.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Freshness {
    /// Fetched from upstream for this request
    Live,
    /// Served from cache within its TTL
    Cached,
    /// Served from an expired cache entry because every provider failed
    Stale,
}

/// Source tag attached to every served value.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSource {
    pub provider: String,
    pub freshness: Freshness,
}

impl DataSource {
    pub fn live(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            freshness: Freshness::Live,
        }
    }

    pub fn with_freshness(&self, freshness: Freshness) -> Self {
        Self {
            provider: self.provider.clone(),
            freshness,
        }
    }

    pub fn is_stale(&self) -> bool {
        self.freshness == Freshness::Stale
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.freshness {
            Freshness::Live => write!(f, "{}", self.provider),
            Freshness::Cached => write!(f, "{} (cached)", self.provider),
            Freshness::Stale => write!(f, "{} (stale)", self.provider),
        }
    }
}

/// A value plus where it came from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sourced<T> {
    pub data: T,
    pub source: DataSource,
}

impl<T> Sourced<T> {
    pub fn new(data: T, source: DataSource) -> Self {
        Self { data, source }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Sourced<U> {
        Sourced {
            data: f(self.data),
            source: self.source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_extractors_reject_wrong_kind() {
        let payload = Payload::Bars(vec![]);
        assert!(payload.clone().into_bars().is_ok());
        let err = payload.into_quote().unwrap_err();
        assert!(err.to_string().contains("Expected quote payload, got bars"));
    }

    #[test]
    fn test_request_display() {
        let req = ResourceRequest::Bars {
            symbol: "AAPL".to_string(),
            timeframe: Timeframe::OneHour,
        };
        assert_eq!(req.to_string(), "bars AAPL 1h");
        assert_eq!(req.kind(), ResourceKind::Bars);

        let req = ResourceRequest::Quote {
            symbol: "MSFT".to_string(),
        };
        assert_eq!(req.to_string(), "quote MSFT");
    }

    #[test]
    fn test_source_display_marks_stale() {
        let source = DataSource::live("TRADIER");
        assert_eq!(source.to_string(), "TRADIER");
        let stale = source.with_freshness(Freshness::Stale);
        assert!(stale.is_stale());
        assert_eq!(stale.to_string(), "TRADIER (stale)");
    }
}
