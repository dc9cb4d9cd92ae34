use optionscope_market_data::{OptionChain, OptionType};
use serde::{Deserialize, Serialize};

/// Volume put/call ratio below this leans bullish.
pub const BULLISH_PCR: f64 = 0.6;
/// Volume put/call ratio above this leans bearish.
pub const BEARISH_PCR: f64 = 1.0;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Bias {
    Bullish,
    Bearish,
    Neutral,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PutCallRatio {
    /// Put volume / call volume, 0 without call volume
    pub volume_ratio: f64,
    /// Put OI / call OI, 0 without call open interest
    pub oi_ratio: f64,
    pub total_calls: u64,
    pub total_puts: u64,
    pub call_open_interest: u64,
    pub put_open_interest: u64,
    pub bias: Bias,
}

fn ratio(puts: u64, calls: u64) -> f64 {
    if calls == 0 {
        0.0
    } else {
        puts as f64 / calls as f64
    }
}

/// Sums volume and open interest across every strike and expiration.
pub fn put_call_ratio(chain: &OptionChain) -> PutCallRatio {
    let (mut total_calls, mut total_puts) = (0u64, 0u64);
    let (mut call_oi, mut put_oi) = (0u64, 0u64);

    for contract in chain.contracts() {
        match contract.option_type {
            OptionType::Call => {
                total_calls += contract.volume;
                call_oi += contract.open_interest;
            }
            OptionType::Put => {
                total_puts += contract.volume;
                put_oi += contract.open_interest;
            }
        }
    }

    let volume_ratio = ratio(total_puts, total_calls);
    let bias = if total_calls == 0 {
        Bias::Neutral
    } else if volume_ratio < BULLISH_PCR {
        Bias::Bullish
    } else if volume_ratio > BEARISH_PCR {
        Bias::Bearish
    } else {
        Bias::Neutral
    };

    PutCallRatio {
        volume_ratio,
        oi_ratio: ratio(put_oi, call_oi),
        total_calls,
        total_puts,
        call_open_interest: call_oi,
        put_open_interest: put_oi,
        bias,
    }
}
