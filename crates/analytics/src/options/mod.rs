//! Options signals: directional recommendation, put/call ratio and the
//! gamma squeeze heuristic.

mod gamma;
mod pcr;
mod recommend;
mod strikes;

pub use gamma::{
    gamma_squeeze_score, GammaComponents, GammaSqueezeInput, GammaSqueezeScore, MAX_SCORE,
    NEAR_MONEY_BAND,
};
pub use pcr::{put_call_ratio, Bias, PutCallRatio, BEARISH_PCR, BULLISH_PCR};
pub use recommend::{
    confidence, recommend, Confirmations, ContractPick, Direction, Recommendation,
    RecommendationContext, RecommendationInput, BASE_CONFIDENCE, MAX_CONFIDENCE,
    MIN_CONTRACT_VOLUME, MIN_DIRECTION_SCORE, MIN_OPEN_INTEREST, TARGET_DAYS_OUT,
};
pub use strikes::{round_to_strike, strike_increment};
