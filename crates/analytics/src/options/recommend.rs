//! Directional option recommendation.
//!
//! Five technical signals vote bull or bear with fixed weights. The winning
//! side needs at least [`MIN_DIRECTION_SCORE`] points; the contract is then
//! picked from the chain near `price ± ATR/2` about a month out. Anything
//! that cannot be backed by a real, liquid contract becomes WAIT.

use chrono::{Duration, NaiveDate};
use optionscope_market_data::{
    Fundamentals, MarketSession, OptionChain, OptionContract, OptionType, Sentiment,
};
use serde::{Deserialize, Serialize};

use super::strikes::round_to_strike;
use crate::indicators::IndicatorSnapshot;
use crate::trend::Trend;

pub const MIN_DIRECTION_SCORE: u32 = 20;
pub const BASE_CONFIDENCE: u32 = 60;
pub const MAX_CONFIDENCE: u32 = 95;
pub const CONFIRMATION_WEIGHT: u32 = 5;
pub const TARGET_DAYS_OUT: i64 = 30;
pub const MIN_CONTRACT_VOLUME: u64 = 10;
pub const MIN_OPEN_INTEREST: u64 = 100;
pub const STOP_ATR_MULTIPLE: f64 = 1.5;
pub const TARGET_ATR_MULTIPLE: f64 = 2.0;

const TREND_POINTS: u32 = 20;
const STACK_POINTS: u32 = 20;
const RSI_MOMENTUM_POINTS: u32 = 15;
const RSI_EXTREME_POINTS: u32 = 10;
const MACD_POINTS: u32 = 15;
const BAND_POINTS: u32 = 10;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Call,
    Put,
    Wait,
}

impl Direction {
    fn option_type(&self) -> Option<OptionType> {
        match self {
            Self::Call => Some(OptionType::Call),
            Self::Put => Some(OptionType::Put),
            Self::Wait => None,
        }
    }
}

/// Technical state the scorer reads. Build it from the latest snapshot with
/// [`RecommendationInput::from_snapshot`].
#[derive(Clone, Debug, PartialEq)]
pub struct RecommendationInput {
    pub price: f64,
    pub atr: Option<f64>,
    pub trend: Trend,
    pub rsi: Option<f64>,
    /// +1 for EMA9 > EMA21 > EMA50, -1 for the reverse, 0 otherwise
    pub ema_stack: i8,
    /// +1 MACD above signal, -1 below, 0 unknown
    pub macd_side: i8,
    pub percent_b: Option<f64>,
}

impl RecommendationInput {
    /// `price` overrides the snapshot close when a live price is known.
    pub fn from_snapshot(snapshot: &IndicatorSnapshot, price: Option<f64>) -> Self {
        Self {
            price: price.unwrap_or(snapshot.bar.close),
            atr: snapshot.atr,
            trend: snapshot.trend,
            rsi: snapshot.rsi,
            ema_stack: snapshot.ema_stack(),
            macd_side: snapshot.macd.map(|m| m.crossover_side()).unwrap_or(0),
            percent_b: snapshot.bollinger.map(|b| b.percent_b),
        }
    }
}

/// Everything outside the indicators that shapes the pick.
#[derive(Clone, Copy, Debug)]
pub struct RecommendationContext<'a> {
    pub today: NaiveDate,
    pub session: MarketSession,
    pub fundamentals: Option<&'a Fundamentals>,
    pub sentiment: Option<&'a Sentiment>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractPick {
    pub root: String,
    pub option_type: OptionType,
    pub strike: f64,
    pub expiry: NaiveDate,
    /// Bid/ask mid, falling back to last
    pub price: Option<f64>,
    pub volume: u64,
    pub open_interest: u64,
    pub delta: Option<f64>,
    pub implied_volatility: Option<f64>,
    /// |delta| as a rough in-the-money probability
    pub probability_itm: Option<f64>,
}

impl From<&OptionContract> for ContractPick {
    fn from(contract: &OptionContract) -> Self {
        let delta = contract.greeks.as_ref().map(|g| g.delta);
        Self {
            root: contract.root.clone(),
            option_type: contract.option_type,
            strike: contract.strike,
            expiry: contract.expiry,
            price: contract.mid(),
            volume: contract.volume,
            open_interest: contract.open_interest,
            delta,
            implied_volatility: contract.implied_volatility(),
            probability_itm: delta.map(f64::abs),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Confirmations {
    pub technical: u32,
    pub fundamental: u32,
    pub social: u32,
}

impl Confirmations {
    pub fn total(&self) -> u32 {
        self.technical + self.fundamental + self.social
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub direction: Direction,
    /// 0 for WAIT, otherwise 60..=95
    pub confidence: u32,
    pub bull_score: u32,
    pub bear_score: u32,
    pub signals: Vec<String>,
    pub confirmations: Confirmations,
    /// Underlying price at evaluation
    pub entry: f64,
    pub target_strike: Option<f64>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub contract: Option<ContractPick>,
    /// Why the recommendation is WAIT
    pub reason: Option<String>,
}

struct Score {
    bull: u32,
    bear: u32,
    bull_signals: Vec<String>,
    bear_signals: Vec<String>,
}

impl Score {
    fn bull(&mut self, points: u32, signal: String) {
        self.bull += points;
        self.bull_signals.push(signal);
    }

    fn bear(&mut self, points: u32, signal: String) {
        self.bear += points;
        self.bear_signals.push(signal);
    }
}

fn score(input: &RecommendationInput) -> Score {
    let mut s = Score {
        bull: 0,
        bear: 0,
        bull_signals: Vec::new(),
        bear_signals: Vec::new(),
    };

    match input.trend {
        Trend::Bullish => s.bull(TREND_POINTS, "Price above EMA50".to_string()),
        Trend::Bearish => s.bear(TREND_POINTS, "Price below EMA50".to_string()),
        Trend::Neutral => {}
    }

    match input.ema_stack {
        1 => s.bull(STACK_POINTS, "EMA9 > EMA21 > EMA50".to_string()),
        -1 => s.bear(STACK_POINTS, "EMA9 < EMA21 < EMA50".to_string()),
        _ => {}
    }

    if let Some(rsi) = input.rsi.filter(|r| r.is_finite()) {
        if rsi <= 30.0 {
            s.bull(RSI_EXTREME_POINTS, format!("RSI {:.1} oversold", rsi));
        } else if rsi < 50.0 {
            s.bear(RSI_MOMENTUM_POINTS, format!("RSI {:.1} below 50", rsi));
        } else if rsi < 70.0 {
            s.bull(RSI_MOMENTUM_POINTS, format!("RSI {:.1} above 50", rsi));
        } else {
            s.bear(RSI_EXTREME_POINTS, format!("RSI {:.1} overbought", rsi));
        }
    }

    match input.macd_side {
        1 => s.bull(MACD_POINTS, "MACD above signal".to_string()),
        -1 => s.bear(MACD_POINTS, "MACD below signal".to_string()),
        _ => {}
    }

    if let Some(b) = input.percent_b.filter(|b| b.is_finite()) {
        if b < 0.2 {
            s.bull(BAND_POINTS, format!("Near lower Bollinger band (%B {:.2})", b));
        } else if b > 0.8 {
            s.bear(BAND_POINTS, format!("Near upper Bollinger band (%B {:.2})", b));
        }
    }

    s
}

fn fundamental_confirmations(direction: Direction, price: f64, f: &Fundamentals) -> u32 {
    let mut count = 0;
    match direction {
        Direction::Call => {
            if f.week52_high.is_some_and(|high| high > 0.0 && price >= high * 0.9) {
                count += 1;
            }
            if f.pe_ratio.is_some_and(|pe| pe > 0.0 && pe < 40.0) {
                count += 1;
            }
        }
        Direction::Put => {
            if f.week52_low.is_some_and(|low| low > 0.0 && price <= low * 1.1) {
                count += 1;
            }
        }
        Direction::Wait => {}
    }
    count
}

fn social_confirmations(direction: Direction, s: &Sentiment) -> u32 {
    if s.article_count < 5 {
        return 0;
    }
    let agrees = match direction {
        Direction::Call => s.bullish_percent >= 0.6,
        Direction::Put => s.bearish_percent >= 0.6,
        Direction::Wait => false,
    };
    u32::from(agrees)
}

fn is_liquid(contract: &OptionContract, session: MarketSession) -> bool {
    if session.is_active() {
        contract.volume >= MIN_CONTRACT_VOLUME
    } else {
        contract.volume >= MIN_CONTRACT_VOLUME || contract.open_interest >= MIN_OPEN_INTEREST
    }
}

pub fn confidence(confirmations: &Confirmations) -> u32 {
    (BASE_CONFIDENCE + CONFIRMATION_WEIGHT * confirmations.total()).min(MAX_CONFIDENCE)
}

pub fn recommend(
    input: &RecommendationInput,
    chain: Option<&OptionChain>,
    context: &RecommendationContext<'_>,
) -> Recommendation {
    let s = score(input);
    let direction = if s.bull > s.bear && s.bull >= MIN_DIRECTION_SCORE {
        Direction::Call
    } else if s.bear > s.bull && s.bear >= MIN_DIRECTION_SCORE {
        Direction::Put
    } else {
        Direction::Wait
    };

    let mut rec = Recommendation {
        direction: Direction::Wait,
        confidence: 0,
        bull_score: s.bull,
        bear_score: s.bear,
        signals: Vec::new(),
        confirmations: Confirmations::default(),
        entry: input.price,
        target_strike: None,
        stop_loss: None,
        take_profit: None,
        contract: None,
        reason: None,
    };

    let Some(option_type) = direction.option_type() else {
        rec.signals = s.bull_signals.into_iter().chain(s.bear_signals).collect();
        rec.reason = Some(format!(
            "No clear directional edge (bull {}, bear {})",
            s.bull, s.bear
        ));
        return rec;
    };
    rec.signals = match direction {
        Direction::Put => s.bear_signals,
        _ => s.bull_signals,
    };

    if !(input.price.is_finite() && input.price > 0.0) {
        rec.reason = Some("No valid underlying price".to_string());
        return rec;
    }

    let sign = if direction == Direction::Call { 1.0 } else { -1.0 };
    let atr = input.atr.filter(|a| a.is_finite() && *a > 0.0);
    let target_strike = round_to_strike(input.price + sign * atr.unwrap_or(0.0) / 2.0);
    rec.target_strike = Some(target_strike);

    let Some(chain) = chain.filter(|c| !c.is_empty()) else {
        rec.reason = Some("No option chain available".to_string());
        return rec;
    };
    let target_date = context.today + Duration::days(TARGET_DAYS_OUT);
    let contract = chain
        .nearest_expiry(target_date)
        .and_then(|expiry| chain.nearest_contract(expiry, target_strike, option_type));
    let Some(contract) = contract else {
        rec.reason = Some(format!(
            "No {:?} contract near strike {:.2}",
            option_type, target_strike
        ));
        return rec;
    };

    if !is_liquid(contract, context.session) {
        rec.reason = Some(format!(
            "{} {:.2} {:?} is illiquid (volume {}, open interest {})",
            contract.expiry, contract.strike, option_type, contract.volume, contract.open_interest
        ));
        rec.contract = Some(ContractPick::from(contract));
        return rec;
    }

    let confirmations = Confirmations {
        technical: rec.signals.len() as u32,
        fundamental: context
            .fundamentals
            .map(|f| fundamental_confirmations(direction, input.price, f))
            .unwrap_or(0),
        social: context
            .sentiment
            .map(|s| social_confirmations(direction, s))
            .unwrap_or(0),
    };

    rec.direction = direction;
    rec.confidence = confidence(&confirmations);
    rec.confirmations = confirmations;
    rec.stop_loss = atr.map(|a| input.price - sign * STOP_ATR_MULTIPLE * a);
    rec.take_profit = atr.map(|a| input.price + sign * TARGET_ATR_MULTIPLE * a);
    rec.contract = Some(ContractPick::from(contract));
    rec
}

#[cfg(test)]
mod tests {
    use super::*;
    use optionscope_market_data::Greeks;
    use proptest::prelude::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 12).unwrap()
    }

    fn contract(
        strike: f64,
        days_out: i64,
        option_type: OptionType,
        volume: u64,
        open_interest: u64,
    ) -> OptionContract {
        let delta = if option_type == OptionType::Call { 0.55 } else { -0.45 };
        OptionContract {
            root: "AAPL".to_string(),
            strike,
            expiry: today() + Duration::days(days_out),
            option_type,
            bid: 4.0,
            ask: 4.5,
            last: 4.2,
            volume,
            open_interest,
            greeks: Some(Greeks {
                delta,
                implied_volatility: Some(0.28),
                ..Default::default()
            }),
        }
    }

    fn chain() -> OptionChain {
        let mut contracts = Vec::new();
        for days in [28, 35] {
            for strike in [180.0, 185.0, 190.0, 195.0] {
                contracts.push(contract(strike, days, OptionType::Call, 250, 1_000));
                contracts.push(contract(strike, days, OptionType::Put, 150, 800));
            }
        }
        OptionChain::from_contracts("AAPL", contracts)
    }

    fn bullish() -> RecommendationInput {
        RecommendationInput {
            price: 187.3,
            atr: Some(4.0),
            trend: Trend::Bullish,
            rsi: Some(60.0),
            ema_stack: 1,
            macd_side: 1,
            percent_b: Some(0.5),
        }
    }

    fn context<'a>(
        fundamentals: Option<&'a Fundamentals>,
        sentiment: Option<&'a Sentiment>,
    ) -> RecommendationContext<'a> {
        RecommendationContext {
            today: today(),
            session: MarketSession::Regular,
            fundamentals,
            sentiment,
        }
    }

    #[test]
    fn test_bullish_setup_picks_call_near_target() {
        let fundamentals = Fundamentals {
            symbol: "AAPL".to_string(),
            week52_high: Some(199.6),
            pe_ratio: Some(28.4),
            ..Default::default()
        };
        let chain = chain();
        let rec = recommend(&bullish(), Some(&chain), &context(Some(&fundamentals), None));

        assert_eq!(rec.direction, Direction::Call);
        assert_eq!(rec.bull_score, 70);
        assert_eq!(rec.target_strike, Some(190.0));
        assert_eq!(
            rec.confirmations,
            Confirmations {
                technical: 4,
                fundamental: 2,
                social: 0,
            }
        );
        assert_eq!(rec.confidence, 90);

        let pick = rec.contract.unwrap();
        assert_eq!(pick.strike, 190.0);
        assert_eq!(pick.expiry, today() + Duration::days(28));
        assert_eq!(pick.price, Some(4.25));
        assert_eq!(pick.probability_itm, Some(0.55));
        assert!((rec.stop_loss.unwrap() - 181.3).abs() < 1e-9);
        assert!((rec.take_profit.unwrap() - 195.3).abs() < 1e-9);
    }

    #[test]
    fn test_bearish_setup_picks_put() {
        let input = RecommendationInput {
            price: 187.3,
            atr: Some(4.0),
            trend: Trend::Bearish,
            rsi: Some(42.0),
            ema_stack: -1,
            macd_side: -1,
            percent_b: Some(0.9),
        };
        let sentiment = Sentiment {
            symbol: "AAPL".to_string(),
            bullish_percent: 0.2,
            bearish_percent: 0.7,
            article_count: 12,
        };
        let chain = chain();
        let rec = recommend(&input, Some(&chain), &context(None, Some(&sentiment)));

        assert_eq!(rec.direction, Direction::Put);
        assert_eq!(rec.bear_score, 80);
        assert_eq!(rec.target_strike, Some(185.0));
        assert_eq!(rec.confirmations.technical, 5);
        assert_eq!(rec.confirmations.social, 1);
        assert_eq!(rec.confidence, 90);
        assert_eq!(rec.contract.unwrap().option_type, OptionType::Put);
    }

    #[test]
    fn test_weak_signals_wait() {
        let input = RecommendationInput {
            trend: Trend::Neutral,
            ema_stack: 0,
            macd_side: 0,
            rsi: Some(55.0),
            ..bullish()
        };
        let chain = chain();
        let rec = recommend(&input, Some(&chain), &context(None, None));

        assert_eq!(rec.direction, Direction::Wait);
        assert_eq!(rec.confidence, 0);
        assert_eq!(rec.bull_score, 15);
        assert!(rec.contract.is_none());
        assert!(rec.reason.unwrap().contains("No clear directional edge"));
    }

    #[test]
    fn test_missing_chain_is_wait_with_reason() {
        let rec = recommend(&bullish(), None, &context(None, None));
        assert_eq!(rec.direction, Direction::Wait);
        assert_eq!(rec.reason.as_deref(), Some("No option chain available"));
        assert_eq!(rec.target_strike, Some(190.0));
    }

    #[test]
    fn test_missing_side_is_wait_not_fabricated() {
        let calls_only = OptionChain::from_contracts(
            "AAPL",
            vec![contract(185.0, 30, OptionType::Call, 500, 500)],
        );
        let input = RecommendationInput {
            trend: Trend::Bearish,
            ema_stack: -1,
            macd_side: -1,
            rsi: Some(40.0),
            ..bullish()
        };
        let rec = recommend(&input, Some(&calls_only), &context(None, None));
        assert_eq!(rec.direction, Direction::Wait);
        assert!(rec.reason.unwrap().starts_with("No Put contract"));
    }

    #[test]
    fn test_liquidity_relaxed_outside_session() {
        let thin = OptionChain::from_contracts(
            "AAPL",
            vec![contract(190.0, 30, OptionType::Call, 2, 5_000)],
        );

        let during = recommend(&bullish(), Some(&thin), &context(None, None));
        assert_eq!(during.direction, Direction::Wait);
        assert!(during.reason.unwrap().contains("illiquid"));

        let mut after_hours = context(None, None);
        after_hours.session = MarketSession::Post;
        let planned = recommend(&bullish(), Some(&thin), &after_hours);
        assert_eq!(planned.direction, Direction::Call);
    }

    fn any_trend() -> impl Strategy<Value = Trend> {
        prop_oneof![
            Just(Trend::Bullish),
            Just(Trend::Bearish),
            Just(Trend::Neutral)
        ]
    }

    proptest! {
        #[test]
        fn prop_confidence_bounds(
            trend in any_trend(),
            rsi in prop::option::of(0.0f64..100.0),
            ema_stack in -1i8..=1,
            macd_side in -1i8..=1,
            percent_b in prop::option::of(-0.5f64..1.5),
            price in 150.0f64..220.0,
            atr in prop::option::of(0.1f64..10.0),
            bullish_percent in 0.0f64..1.0,
            article_count in 0u32..50,
        ) {
            let input = RecommendationInput { price, atr, trend, rsi, ema_stack, macd_side, percent_b };
            let fundamentals = Fundamentals {
                symbol: "AAPL".to_string(),
                week52_high: Some(200.0),
                week52_low: Some(150.0),
                pe_ratio: Some(25.0),
                ..Default::default()
            };
            let sentiment = Sentiment {
                symbol: "AAPL".to_string(),
                bullish_percent,
                bearish_percent: 1.0 - bullish_percent,
                article_count,
            };
            let chain = chain();
            let rec = recommend(&input, Some(&chain), &context(Some(&fundamentals), Some(&sentiment)));

            if rec.direction == Direction::Wait {
                prop_assert_eq!(rec.confidence, 0);
            } else {
                prop_assert!((BASE_CONFIDENCE..=MAX_CONFIDENCE).contains(&rec.confidence));
            }
            if rec.bull_score < MIN_DIRECTION_SCORE && rec.bear_score < MIN_DIRECTION_SCORE {
                prop_assert_eq!(rec.direction, Direction::Wait);
            }
        }
    }
}
