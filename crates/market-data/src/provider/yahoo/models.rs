//! Yahoo Finance API response models.
//!
//! Chart responses carry parallel arrays with `null` holes; quoteSummary
//! values arrive as `{"raw": .., "fmt": ..}` objects or `{}` when absent.

use serde::Deserialize;

// ============================================================================
// Chart API (/v8/finance/chart)
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct YahooChartResponse {
    pub chart: YahooChart,
}

#[derive(Debug, Deserialize)]
pub struct YahooChart {
    pub result: Option<Vec<YahooChartResult>>,
    pub error: Option<YahooApiError>,
}

#[derive(Debug, Deserialize)]
pub struct YahooApiError {
    pub code: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct YahooChartResult {
    pub meta: YahooChartMeta,
    #[serde(default)]
    pub timestamp: Vec<i64>,
    pub indicators: Option<YahooIndicators>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YahooChartMeta {
    pub symbol: String,
    pub regular_market_price: Option<f64>,
    pub chart_previous_close: Option<f64>,
    pub previous_close: Option<f64>,
    pub regular_market_volume: Option<u64>,
    /// Unix seconds
    pub regular_market_time: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct YahooIndicators {
    #[serde(default)]
    pub quote: Vec<YahooOhlcv>,
}

#[derive(Debug, Default, Deserialize)]
pub struct YahooOhlcv {
    #[serde(default)]
    pub open: Vec<Option<f64>>,
    #[serde(default)]
    pub high: Vec<Option<f64>>,
    #[serde(default)]
    pub low: Vec<Option<f64>>,
    #[serde(default)]
    pub close: Vec<Option<f64>>,
    #[serde(default)]
    pub volume: Vec<Option<f64>>,
}

// ============================================================================
// quoteSummary API (/v10/finance/quoteSummary)
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YahooQuoteSummaryResponse {
    pub quote_summary: YahooQuoteSummary,
}

#[derive(Debug, Deserialize)]
pub struct YahooQuoteSummary {
    pub result: Option<Vec<YahooQuoteSummaryResult>>,
    pub error: Option<YahooApiError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YahooQuoteSummaryResult {
    pub summary_detail: Option<YahooSummaryDetail>,
    pub default_key_statistics: Option<YahooKeyStatistics>,
}

/// Value with raw and formatted forms
#[derive(Debug, Deserialize, Clone)]
pub struct YahooValue {
    pub raw: Option<f64>,
}

/// Helper for `Option<YahooValue>` fields.
pub fn raw(value: &Option<YahooValue>) -> Option<f64> {
    value.as_ref().and_then(|v| v.raw)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YahooSummaryDetail {
    pub market_cap: Option<YahooValue>,
    #[serde(rename = "trailingPE")]
    pub trailing_pe: Option<YahooValue>,
    pub dividend_yield: Option<YahooValue>,
    pub beta: Option<YahooValue>,
    pub fifty_two_week_high: Option<YahooValue>,
    pub fifty_two_week_low: Option<YahooValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YahooKeyStatistics {
    pub beta: Option<YahooValue>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_value_empty_object() {
        let detail: YahooSummaryDetail = serde_json::from_str(
            r#"{"marketCap": {"raw": 2800000000000, "fmt": "2.8T"}, "dividendYield": {}}"#,
        )
        .unwrap();
        assert_eq!(raw(&detail.market_cap), Some(2800000000000.0));
        assert_eq!(raw(&detail.dividend_yield), None);
        assert_eq!(raw(&detail.beta), None);
    }

    #[test]
    fn test_deserialize_chart_with_null_holes() {
        let json = r#"{"chart":{"result":[{
            "meta":{"symbol":"AAPL","regularMarketPrice":173.2,"chartPreviousClose":172.0,"regularMarketTime":1710273600},
            "timestamp":[1710163800,1710250200],
            "indicators":{"quote":[{"open":[171.0,null],"high":[172.5,null],"low":[170.2,null],"close":[172.0,null],"volume":[1400000,null]}]}
        }],"error":null}}"#;
        let response: YahooChartResponse = serde_json::from_str(json).unwrap();
        let result = &response.chart.result.unwrap()[0];
        assert_eq!(result.timestamp.len(), 2);
        let quote = &result.indicators.as_ref().unwrap().quote[0];
        assert_eq!(quote.close, vec![Some(172.0), None]);
    }

    #[test]
    fn test_deserialize_chart_error() {
        let json = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let response: YahooChartResponse = serde_json::from_str(json).unwrap();
        assert!(response.chart.result.is_none());
        assert_eq!(
            response.chart.error.unwrap().code.as_deref(),
            Some("Not Found")
        );
    }
}
