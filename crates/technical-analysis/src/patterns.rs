use analysis_core::{Bias, Candle};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::chart_patterns::{detect_chart_patterns, ChartPattern, ChartPatternConfig, PatternDirection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandlestickPattern {
    BullishEngulfing,
    Hammer,
    MorningStar,
    PiercingLine,
    ThreeWhiteSoldiers,
    BearishEngulfing,
    ShootingStar,
    EveningStar,
    DarkCloudCover,
    ThreeBlackCrows,
    Doji,
    InsideBar,
}

impl CandlestickPattern {
    pub const ALL: [CandlestickPattern; 12] = [
        CandlestickPattern::BullishEngulfing,
        CandlestickPattern::Hammer,
        CandlestickPattern::MorningStar,
        CandlestickPattern::PiercingLine,
        CandlestickPattern::ThreeWhiteSoldiers,
        CandlestickPattern::BearishEngulfing,
        CandlestickPattern::ShootingStar,
        CandlestickPattern::EveningStar,
        CandlestickPattern::DarkCloudCover,
        CandlestickPattern::ThreeBlackCrows,
        CandlestickPattern::Doji,
        CandlestickPattern::InsideBar,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CandlestickPattern::BullishEngulfing => "bullish_engulfing",
            CandlestickPattern::Hammer => "hammer",
            CandlestickPattern::MorningStar => "morning_star",
            CandlestickPattern::PiercingLine => "piercing_line",
            CandlestickPattern::ThreeWhiteSoldiers => "three_white_soldiers",
            CandlestickPattern::BearishEngulfing => "bearish_engulfing",
            CandlestickPattern::ShootingStar => "shooting_star",
            CandlestickPattern::EveningStar => "evening_star",
            CandlestickPattern::DarkCloudCover => "dark_cloud_cover",
            CandlestickPattern::ThreeBlackCrows => "three_black_crows",
            CandlestickPattern::Doji => "doji",
            CandlestickPattern::InsideBar => "inside_bar",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            CandlestickPattern::BullishEngulfing => "Bullish Engulfing",
            CandlestickPattern::Hammer => "Hammer",
            CandlestickPattern::MorningStar => "Morning Star",
            CandlestickPattern::PiercingLine => "Piercing Line",
            CandlestickPattern::ThreeWhiteSoldiers => "Three White Soldiers",
            CandlestickPattern::BearishEngulfing => "Bearish Engulfing",
            CandlestickPattern::ShootingStar => "Shooting Star",
            CandlestickPattern::EveningStar => "Evening Star",
            CandlestickPattern::DarkCloudCover => "Dark Cloud Cover",
            CandlestickPattern::ThreeBlackCrows => "Three Black Crows",
            CandlestickPattern::Doji => "Doji",
            CandlestickPattern::InsideBar => "Inside Bar",
        }
    }

    /// Doji and inside bar are indecision/continuation signals and count for neither side.
    pub fn direction(&self) -> PatternDirection {
        match self {
            CandlestickPattern::BullishEngulfing
            | CandlestickPattern::Hammer
            | CandlestickPattern::MorningStar
            | CandlestickPattern::PiercingLine
            | CandlestickPattern::ThreeWhiteSoldiers => PatternDirection::Bullish,
            CandlestickPattern::BearishEngulfing
            | CandlestickPattern::ShootingStar
            | CandlestickPattern::EveningStar
            | CandlestickPattern::DarkCloudCover
            | CandlestickPattern::ThreeBlackCrows => PatternDirection::Bearish,
            CandlestickPattern::Doji | CandlestickPattern::InsideBar => PatternDirection::Neutral,
        }
    }

    /// Evaluate this pattern at the latest bar.
    pub fn detect(&self, candles: &[Candle]) -> PatternResult {
        match self {
            CandlestickPattern::BullishEngulfing => bullish_engulfing(candles),
            CandlestickPattern::Hammer => hammer(candles),
            CandlestickPattern::MorningStar => morning_star(candles),
            CandlestickPattern::PiercingLine => piercing_line(candles),
            CandlestickPattern::ThreeWhiteSoldiers => three_white_soldiers(candles),
            CandlestickPattern::BearishEngulfing => bearish_engulfing(candles),
            CandlestickPattern::ShootingStar => shooting_star(candles),
            CandlestickPattern::EveningStar => evening_star(candles),
            CandlestickPattern::DarkCloudCover => dark_cloud_cover(candles),
            CandlestickPattern::ThreeBlackCrows => three_black_crows(candles),
            CandlestickPattern::Doji => doji(candles),
            CandlestickPattern::InsideBar => inside_bar(candles),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PatternResult {
    pub detected: bool,
    pub confidence: f64,
}

impl PatternResult {
    fn none() -> Self {
        Self {
            detected: false,
            confidence: 0.0,
        }
    }

    fn hit(confidence: f64) -> Self {
        Self {
            detected: true,
            confidence: confidence.min(0.95),
        }
    }
}

/// Moves in the requested direction among consecutive closes.
fn count_moves(closes: &[f64], falling: bool) -> usize {
    closes
        .windows(2)
        .filter(|w| if falling { w[0] > w[1] } else { w[0] < w[1] })
        .count()
}

/// Prior trend over `closes[len-from .. len-to]`; assumed present when history is shorter.
fn prior_trend(candles: &[Candle], from: usize, to: usize, falling: bool) -> bool {
    if candles.len() < from {
        return true;
    }
    let closes: Vec<f64> = candles[candles.len() - from..candles.len() - to]
        .iter()
        .map(|c| c.close)
        .collect();
    count_moves(&closes, falling) >= 3
}

fn last_n(candles: &[Candle], n: usize) -> Option<&[Candle]> {
    if candles.len() < n {
        None
    } else {
        Some(&candles[candles.len() - n..])
    }
}

fn engulfing_confidence(prev: &Candle, curr: &Candle) -> f64 {
    let size_ratio = curr.body() / prev.body().max(0.001);
    (0.7 + 0.25 * (size_ratio - 1.0).min(1.0)).min(0.95)
}

fn bullish_engulfing(candles: &[Candle]) -> PatternResult {
    let Some([prev, curr]) = last_n(candles, 2) else {
        return PatternResult::none();
    };
    let engulfs = curr.open <= prev.close && curr.close >= prev.open;
    if prev.is_bearish() && curr.is_bullish() && engulfs {
        PatternResult::hit(engulfing_confidence(prev, curr))
    } else {
        PatternResult::none()
    }
}

fn bearish_engulfing(candles: &[Candle]) -> PatternResult {
    let Some([prev, curr]) = last_n(candles, 2) else {
        return PatternResult::none();
    };
    let engulfs = curr.open >= prev.close && curr.close <= prev.open;
    if prev.is_bullish() && curr.is_bearish() && engulfs {
        PatternResult::hit(engulfing_confidence(prev, curr))
    } else {
        PatternResult::none()
    }
}

fn hammer(candles: &[Candle]) -> PatternResult {
    let Some(curr) = candles.last() else {
        return PatternResult::none();
    };
    let downtrend = prior_trend(candles, 6, 1, true);
    let body = curr.body();
    let range = curr.range();
    if range <= 0.0 {
        return PatternResult::none();
    }

    let shape = body <= range / 3.0
        && curr.upper_shadow() <= body / 2.0
        && curr.lower_shadow() >= body * 2.0;
    if !(shape && downtrend) {
        return PatternResult::none();
    }

    let mut confidence = 0.7;
    if curr.close >= curr.open {
        confidence += 0.15;
    }
    if curr.lower_shadow() >= body * 3.0 {
        confidence += 0.1;
    }
    PatternResult::hit(confidence)
}

fn shooting_star(candles: &[Candle]) -> PatternResult {
    let Some(curr) = candles.last() else {
        return PatternResult::none();
    };
    let uptrend = prior_trend(candles, 6, 1, false);
    let body = curr.body();
    let range = curr.range();
    if range <= 0.0 {
        return PatternResult::none();
    }

    let shape = body <= range / 3.0
        && curr.upper_shadow() >= body * 2.0
        && curr.lower_shadow() <= body / 2.0;
    if !(shape && uptrend) {
        return PatternResult::none();
    }

    let mut confidence = 0.7;
    if curr.close <= curr.open {
        confidence += 0.15;
    }
    if curr.upper_shadow() >= body * 3.0 {
        confidence += 0.1;
    }
    PatternResult::hit(confidence)
}

fn doji(candles: &[Candle]) -> PatternResult {
    let Some(curr) = candles.last() else {
        return PatternResult::none();
    };
    let range = curr.range();
    let body = curr.body();
    if range > 0.0 && body <= range * 0.1 && curr.upper_shadow() > 0.0 && curr.lower_shadow() > 0.0 {
        PatternResult::hit(0.7 + 0.25 * (1.0 - body / (range * 0.1)))
    } else {
        PatternResult::none()
    }
}

fn inside_bar(candles: &[Candle]) -> PatternResult {
    let Some([prev, curr]) = last_n(candles, 2) else {
        return PatternResult::none();
    };
    if curr.high < prev.high && curr.low > prev.low {
        let size_ratio = curr.range() / prev.range();
        PatternResult::hit(0.7 + 0.25 * (1.0 - size_ratio.min(1.0)))
    } else {
        PatternResult::none()
    }
}

fn morning_star(candles: &[Candle]) -> PatternResult {
    let Some([first, second, third]) = last_n(candles, 3) else {
        return PatternResult::none();
    };
    let downtrend = prior_trend(candles, 8, 3, true);
    let second_small = second.body() < first.body() * 0.5;
    if !(first.is_bearish() && second_small && third.is_bullish() && downtrend) {
        return PatternResult::none();
    }

    let mut confidence = 0.7;
    if second.open.max(second.close) < first.close {
        confidence += 0.1;
    }
    if third.close > (first.open + first.close) / 2.0 {
        confidence += 0.15;
    }
    PatternResult::hit(confidence)
}

fn evening_star(candles: &[Candle]) -> PatternResult {
    let Some([first, second, third]) = last_n(candles, 3) else {
        return PatternResult::none();
    };
    let uptrend = prior_trend(candles, 8, 3, false);
    let second_small = second.body() < first.body() * 0.5;
    if !(first.is_bullish() && second_small && third.is_bearish() && uptrend) {
        return PatternResult::none();
    }

    let mut confidence = 0.7;
    if second.open.min(second.close) > first.close {
        confidence += 0.1;
    }
    if third.close < (first.open + first.close) / 2.0 {
        confidence += 0.15;
    }
    PatternResult::hit(confidence)
}

fn piercing_line(candles: &[Candle]) -> PatternResult {
    let Some([prev, curr]) = last_n(candles, 2) else {
        return PatternResult::none();
    };
    let downtrend = prior_trend(candles, 7, 2, true);
    let midpoint = (prev.open + prev.close) / 2.0;
    let valid = prev.is_bearish()
        && curr.is_bullish()
        && curr.close > midpoint
        && curr.close < prev.open
        && downtrend;
    if !valid {
        return PatternResult::none();
    }

    let mut confidence = 0.7;
    if curr.open < prev.low {
        confidence += 0.15;
    }
    let penetration = (curr.close - prev.close) / (prev.open - prev.close);
    if penetration > 0.8 {
        confidence += 0.1;
    }
    PatternResult::hit(confidence)
}

fn dark_cloud_cover(candles: &[Candle]) -> PatternResult {
    let Some([prev, curr]) = last_n(candles, 2) else {
        return PatternResult::none();
    };
    let uptrend = prior_trend(candles, 7, 2, false);
    let midpoint = (prev.open + prev.close) / 2.0;
    let valid = prev.is_bullish()
        && curr.is_bearish()
        && curr.close < midpoint
        && curr.close > prev.open
        && uptrend;
    if !valid {
        return PatternResult::none();
    }

    let mut confidence = 0.7;
    if curr.open > prev.high {
        confidence += 0.15;
    }
    let penetration = (prev.close - curr.close) / (prev.close - prev.open);
    if penetration > 0.8 {
        confidence += 0.1;
    }
    PatternResult::hit(confidence)
}

fn three_white_soldiers(candles: &[Candle]) -> PatternResult {
    let Some([c1, c2, c3]) = last_n(candles, 3) else {
        return PatternResult::none();
    };
    let all_bullish = c1.is_bullish() && c2.is_bullish() && c3.is_bullish();
    let progressive = c2.close > c1.close && c3.close > c2.close;
    if !(all_bullish && progressive) {
        return PatternResult::none();
    }

    let opens_within = c2.open > c1.open && c2.open < c1.close && c3.open > c2.open && c3.open < c2.close;
    let small_shadows = [c1, c2, c3]
        .iter()
        .all(|c| c.high - c.close < (c.close - c.open) / 2.0);

    let mut confidence = 0.6;
    if opens_within {
        confidence += 0.2;
    }
    if small_shadows {
        confidence += 0.15;
    }
    PatternResult::hit(confidence)
}

fn three_black_crows(candles: &[Candle]) -> PatternResult {
    let Some([c1, c2, c3]) = last_n(candles, 3) else {
        return PatternResult::none();
    };
    let all_bearish = c1.is_bearish() && c2.is_bearish() && c3.is_bearish();
    let progressive = c2.close < c1.close && c3.close < c2.close;
    if !(all_bearish && progressive) {
        return PatternResult::none();
    }

    let opens_within = c2.open < c1.open && c2.open > c1.close && c3.open < c2.open && c3.open > c2.close;
    let small_shadows = [c1, c2, c3]
        .iter()
        .all(|c| c.close - c.low < (c.open - c.close) / 2.0);

    let mut confidence = 0.6;
    if opens_within {
        confidence += 0.2;
    }
    if small_shadows {
        confidence += 0.15;
    }
    PatternResult::hit(confidence)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternConfig {
    /// Candles required before any pattern is evaluated
    pub min_bars: usize,
    /// Prior bars compared against the latest bar for support/resistance proximity
    pub zone_lookback: usize,
    /// Proximity band for the support/resistance zone check
    pub zone_tolerance: f64,
    /// Weight of each chart pattern relative to a candlestick pattern
    pub chart_weight: i32,
    /// `|overall score|` at or above which the bias is "strongly"
    pub strong_threshold: i32,
    pub chart: ChartPatternConfig,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            min_bars: 10,
            zone_lookback: 9,
            zone_tolerance: 0.01,
            chart_weight: 2,
            strong_threshold: 2,
            chart: ChartPatternConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternZone {
    SupportBounce,
    ResistanceRejection,
    AtSupport,
    AtResistance,
    Neutral,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternSummary {
    pub bullish_patterns: Vec<String>,
    pub bearish_patterns: Vec<String>,
    pub neutral_patterns: Vec<String>,
    pub pattern_bias: Bias,
    /// 0-100, 25 points per detected directional pattern
    pub pattern_strength: f64,
    pub pattern_zone: PatternZone,
    pub pattern_age_bars: usize,
    pub candlestick_score: i32,
    pub chart_score: i32,
    pub overall_pattern_score: i32,
    pub individual_patterns: BTreeMap<CandlestickPattern, PatternResult>,
    pub chart_patterns: Vec<ChartPattern>,
    pub at_support: bool,
    pub at_resistance: bool,
    pub insufficient_data: bool,
    pub error: Option<String>,
}

impl PatternSummary {
    fn insufficient(message: &str) -> Self {
        Self {
            bullish_patterns: Vec::new(),
            bearish_patterns: Vec::new(),
            neutral_patterns: Vec::new(),
            pattern_bias: Bias::Neutral,
            pattern_strength: 0.0,
            pattern_zone: PatternZone::Neutral,
            pattern_age_bars: 0,
            candlestick_score: 0,
            chart_score: 0,
            overall_pattern_score: 0,
            individual_patterns: BTreeMap::new(),
            chart_patterns: Vec::new(),
            at_support: false,
            at_resistance: false,
            insufficient_data: true,
            error: Some(message.to_string()),
        }
    }

    /// Every detected pattern label, bullish first
    pub fn patterns_detected(&self) -> Vec<String> {
        self.bullish_patterns
            .iter()
            .chain(&self.bearish_patterns)
            .chain(&self.neutral_patterns)
            .cloned()
            .collect()
    }
}

/// Bias from a weighted pattern score.
pub fn score_to_bias(score: i32, strong_threshold: i32) -> Bias {
    if score >= strong_threshold {
        Bias::StronglyBullish
    } else if score > 0 {
        Bias::Bullish
    } else if score <= -strong_threshold {
        Bias::StronglyBearish
    } else if score < 0 {
        Bias::Bearish
    } else {
        Bias::Neutral
    }
}

/// Run every candlestick detector plus chart-pattern detection and aggregate.
pub fn detect_patterns(candles: &[Candle], config: &PatternConfig) -> PatternSummary {
    if candles.len() < config.min_bars.max(2) {
        return PatternSummary::insufficient("Insufficient data for pattern detection");
    }

    let mut individual_patterns = BTreeMap::new();
    let mut bullish_patterns = Vec::new();
    let mut bearish_patterns = Vec::new();
    let mut neutral_patterns = Vec::new();
    let mut candlestick_score = 0;

    for pattern in CandlestickPattern::ALL {
        let result = pattern.detect(candles);
        if result.detected {
            let label = format!("{} ({:.2})", pattern.title(), result.confidence);
            match pattern.direction() {
                PatternDirection::Bullish => {
                    candlestick_score += 1;
                    bullish_patterns.push(label);
                }
                PatternDirection::Bearish => {
                    candlestick_score -= 1;
                    bearish_patterns.push(label);
                }
                PatternDirection::Neutral => neutral_patterns.push(label),
            }
        }
        individual_patterns.insert(pattern, result);
    }

    let chart_patterns = detect_chart_patterns(candles, &config.chart);
    let mut chart_score = 0;
    for chart in &chart_patterns {
        match chart.direction {
            PatternDirection::Bullish => {
                chart_score += 1;
                bullish_patterns.push(chart.label());
            }
            PatternDirection::Bearish => {
                chart_score -= 1;
                bearish_patterns.push(chart.label());
            }
            PatternDirection::Neutral => neutral_patterns.push(chart.label()),
        }
    }

    let overall_pattern_score = candlestick_score + config.chart_weight * chart_score;
    let pattern_bias = score_to_bias(overall_pattern_score, config.strong_threshold);
    let directional = bullish_patterns.len() + bearish_patterns.len();
    let pattern_strength = (directional as f64 * 25.0).min(100.0);

    let last = candles[candles.len() - 1];
    let prior = &candles[candles.len() - 1 - config.zone_lookback.min(candles.len() - 1)..candles.len() - 1];
    let prior_low = prior.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
    let prior_high = prior.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
    let at_support = last.low <= prior_low * (1.0 + config.zone_tolerance);
    let at_resistance = last.high >= prior_high * (1.0 - config.zone_tolerance);

    let pattern_zone = if at_support && pattern_bias.to_score() > 0 {
        PatternZone::SupportBounce
    } else if at_resistance && pattern_bias.to_score() < 0 {
        PatternZone::ResistanceRejection
    } else if at_support {
        PatternZone::AtSupport
    } else if at_resistance {
        PatternZone::AtResistance
    } else {
        PatternZone::Neutral
    };

    PatternSummary {
        bullish_patterns,
        bearish_patterns,
        neutral_patterns,
        pattern_bias,
        pattern_strength,
        pattern_zone,
        pattern_age_bars: 1,
        candlestick_score,
        chart_score,
        overall_pattern_score,
        individual_patterns,
        chart_patterns,
        at_support,
        at_resistance,
        insufficient_data: false,
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle::new(0, open, high, low, close, 1000.0)
    }

    fn with_timestamps(mut candles: Vec<Candle>) -> Vec<Candle> {
        for (i, candle) in candles.iter_mut().enumerate() {
            candle.timestamp = 1_700_000_000 + i as i64 * 300;
        }
        candles
    }

    fn falling_prefix(count: usize, start: f64) -> Vec<Candle> {
        (0..count)
            .map(|i| {
                let open = start - i as f64 * 2.0;
                c(open, open + 0.5, open - 2.5, open - 2.0)
            })
            .collect()
    }

    fn rising_prefix(count: usize, start: f64) -> Vec<Candle> {
        (0..count)
            .map(|i| {
                let open = start + i as f64 * 2.0;
                c(open, open + 2.5, open - 0.5, open + 2.0)
            })
            .collect()
    }

    #[test]
    fn test_insufficient_history() {
        let summary = detect_patterns(&falling_prefix(9, 100.0), &PatternConfig::default());
        assert!(summary.insufficient_data);
        assert_eq!(summary.pattern_bias, Bias::Neutral);
        assert_eq!(summary.pattern_strength, 0.0);
    }

    #[test]
    fn test_bullish_engulfing_confidence() {
        let candles = vec![c(105.0, 106.0, 99.0, 100.0), c(99.0, 108.0, 98.5, 107.0)];
        let result = bullish_engulfing(&candles);
        assert!(result.detected);
        // body ratio 8/5 -> 0.7 + 0.25 * 0.6
        assert!((result.confidence - 0.85).abs() < 1e-9);
        assert!(!bearish_engulfing(&candles).detected);
    }

    #[test]
    fn test_hammer_after_decline() {
        let mut candles = falling_prefix(6, 120.0);
        candles.push(c(108.0, 108.3, 100.0, 108.2));
        let result = hammer(&candles);
        assert!(result.detected);
        assert!((result.confidence - 0.95).abs() < 1e-9);
    }

    #[test]
    fn test_hammer_needs_prior_decline() {
        let mut candles = rising_prefix(6, 100.0);
        candles.push(c(112.0, 112.3, 104.0, 112.2));
        assert!(!hammer(&candles).detected);
    }

    #[test]
    fn test_flat_candle_triggers_nothing() {
        let candles = vec![c(100.0, 100.0, 100.0, 100.0); 12];
        for pattern in CandlestickPattern::ALL {
            assert!(!pattern.detect(&candles).detected, "{:?}", pattern);
        }
    }

    #[test]
    fn test_shooting_star() {
        let mut candles = rising_prefix(6, 100.0);
        candles.push(c(112.2, 120.0, 111.9, 112.0));
        let result = shooting_star(&candles);
        assert!(result.detected);
        assert!(result.confidence >= 0.85);
    }

    #[test]
    fn test_doji_confidence_scales_with_body() {
        let perfect = doji(&[c(100.0, 105.0, 95.0, 100.0)]);
        assert!((perfect.confidence - 0.95).abs() < 1e-9);
        let loose = doji(&[c(100.0, 105.0, 95.0, 100.5)]);
        assert!(loose.detected);
        assert!((loose.confidence - 0.825).abs() < 1e-9);
        assert!(!doji(&[c(100.0, 105.0, 95.0, 102.0)]).detected);
    }

    #[test]
    fn test_inside_bar() {
        let candles = vec![c(100.0, 110.0, 90.0, 105.0), c(101.0, 105.0, 95.0, 102.0)];
        let result = inside_bar(&candles);
        assert!(result.detected);
        assert!((result.confidence - 0.825).abs() < 1e-9);
    }

    #[test]
    fn test_morning_star() {
        let mut candles = falling_prefix(5, 130.0);
        candles.push(c(120.0, 120.5, 109.5, 110.0));
        candles.push(c(108.0, 109.0, 106.5, 107.5));
        candles.push(c(108.0, 117.5, 107.5, 117.0));
        let result = morning_star(&candles);
        assert!(result.detected);
        assert!((result.confidence - 0.95).abs() < 1e-9);
    }

    #[test]
    fn test_three_white_soldiers_full_confidence() {
        let candles = vec![
            c(100.0, 104.5, 99.8, 104.0),
            c(102.0, 107.5, 101.8, 107.0),
            c(105.0, 110.5, 104.8, 110.0),
        ];
        let result = three_white_soldiers(&candles);
        assert!(result.detected);
        assert!((result.confidence - 0.95).abs() < 1e-9);
    }

    #[test]
    fn test_dark_cloud_cover() {
        let mut candles = rising_prefix(5, 100.0);
        candles.push(c(110.0, 120.5, 109.5, 120.0));
        candles.push(c(121.0, 121.5, 111.0, 111.5));
        let result = dark_cloud_cover(&candles);
        assert!(result.detected);
        // gap up (+0.15) and penetration 0.85 (+0.1)
        assert!((result.confidence - 0.95).abs() < 1e-9);
    }

    #[test]
    fn test_score_to_bias_thresholds() {
        assert_eq!(score_to_bias(2, 2), Bias::StronglyBullish);
        assert_eq!(score_to_bias(1, 2), Bias::Bullish);
        assert_eq!(score_to_bias(0, 2), Bias::Neutral);
        assert_eq!(score_to_bias(-1, 2), Bias::Bearish);
        assert_eq!(score_to_bias(-3, 2), Bias::StronglyBearish);
    }

    #[test]
    fn test_summary_marks_support_bounce() {
        let mut candles = falling_prefix(10, 140.0);
        let last_close = candles.last().unwrap().close;
        candles.push(c(last_close - 1.0, last_close + 6.0, last_close - 1.5, last_close + 5.0));
        let summary = detect_patterns(&with_timestamps(candles), &PatternConfig::default());
        assert!(!summary.insufficient_data);
        assert!(summary.at_support);
        assert!(summary
            .bullish_patterns
            .iter()
            .any(|p| p.starts_with("Bullish Engulfing")));
        assert!(summary.overall_pattern_score > 0);
        assert_eq!(summary.pattern_zone, PatternZone::SupportBounce);
        assert_eq!(summary.individual_patterns.len(), 12);
        assert!(summary.pattern_strength >= 25.0);
    }
}
