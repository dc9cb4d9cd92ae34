use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OptionType {
    Call,
    Put,
}

/// Option sensitivities. Implied volatility is a decimal (0.35 = 35%).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Greeks {
    pub delta: f64,
    pub gamma: f64,
    pub theta: f64,
    pub vega: f64,
    pub rho: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub implied_volatility: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionContract {
    /// Underlying symbol
    pub root: String,
    pub strike: f64,
    pub expiry: NaiveDate,
    pub option_type: OptionType,
    pub bid: f64,
    pub ask: f64,
    pub last: f64,
    pub volume: u64,
    pub open_interest: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub greeks: Option<Greeks>,
}

impl OptionContract {
    /// Bid/ask midpoint, falling back to the last trade.
    pub fn mid(&self) -> Option<f64> {
        if self.bid > 0.0 && self.ask > 0.0 {
            Some((self.bid + self.ask) / 2.0)
        } else if self.last > 0.0 {
            Some(self.last)
        } else {
            None
        }
    }

    pub fn implied_volatility(&self) -> Option<f64> {
        self.greeks
            .as_ref()
            .and_then(|g| g.implied_volatility)
            .filter(|iv| iv.is_finite() && *iv > 0.0)
    }
}

/// Call and put at one strike. At least one side is always present.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrikeRow {
    pub strike: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call: Option<OptionContract>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub put: Option<OptionContract>,
}

impl StrikeRow {
    pub fn side(&self, option_type: OptionType) -> Option<&OptionContract> {
        match option_type {
            OptionType::Call => self.call.as_ref(),
            OptionType::Put => self.put.as_ref(),
        }
    }
}

/// Option chain for one underlying: expiry -> strike -> {call, put}.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionChain {
    pub symbol: String,
    /// Ascending
    pub expirations: Vec<NaiveDate>,
    /// Ascending, union across expirations
    pub strikes: Vec<f64>,
    pub chain: BTreeMap<NaiveDate, Vec<StrikeRow>>,
}

/// Strike key with sub-cent resolution so float noise doesn't split a row.
fn strike_key(strike: f64) -> i64 {
    (strike * 1000.0).round() as i64
}

impl OptionChain {
    /// Group flat contracts into the expiry/strike map.
    ///
    /// Rows are only created for contracts that exist, so every key in the
    /// map has at least one side. Contracts with non-finite or non-positive
    /// strikes are dropped. A duplicate side keeps the later contract.
    pub fn from_contracts(symbol: impl Into<String>, contracts: Vec<OptionContract>) -> Self {
        let mut grouped: BTreeMap<NaiveDate, BTreeMap<i64, StrikeRow>> = BTreeMap::new();

        for contract in contracts {
            if !contract.strike.is_finite() || contract.strike <= 0.0 {
                continue;
            }
            let row = grouped
                .entry(contract.expiry)
                .or_default()
                .entry(strike_key(contract.strike))
                .or_insert_with(|| StrikeRow {
                    strike: contract.strike,
                    call: None,
                    put: None,
                });
            match contract.option_type {
                OptionType::Call => row.call = Some(contract),
                OptionType::Put => row.put = Some(contract),
            }
        }

        let mut strike_keys: Vec<i64> = grouped
            .values()
            .flat_map(|rows| rows.keys().copied())
            .collect();
        strike_keys.sort_unstable();
        strike_keys.dedup();

        let chain: BTreeMap<NaiveDate, Vec<StrikeRow>> = grouped
            .into_iter()
            .map(|(expiry, rows)| (expiry, rows.into_values().collect()))
            .collect();

        Self {
            symbol: symbol.into(),
            expirations: chain.keys().copied().collect(),
            strikes: strike_keys.into_iter().map(|k| k as f64 / 1000.0).collect(),
            chain,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn rows(&self, expiry: NaiveDate) -> &[StrikeRow] {
        self.chain.get(&expiry).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every contract in the chain, both sides, all expirations.
    pub fn contracts(&self) -> impl Iterator<Item = &OptionContract> {
        self.chain
            .values()
            .flat_map(|rows| rows.iter())
            .flat_map(|row| row.call.iter().chain(row.put.iter()))
    }

    /// Expiration closest to `target` by calendar distance; ties go to the earlier date.
    pub fn nearest_expiry(&self, target: NaiveDate) -> Option<NaiveDate> {
        self.expirations
            .iter()
            .copied()
            .min_by_key(|expiry| ((*expiry - target).num_days().abs(), *expiry))
    }

    /// Contract of `option_type` at the strike closest to `strike` for `expiry`.
    pub fn nearest_contract(
        &self,
        expiry: NaiveDate,
        strike: f64,
        option_type: OptionType,
    ) -> Option<&OptionContract> {
        self.rows(expiry)
            .iter()
            .filter_map(|row| row.side(option_type))
            .min_by(|a, b| {
                (a.strike - strike)
                    .abs()
                    .total_cmp(&(b.strike - strike).abs())
            })
    }
}
