use analysis_core::{stats, Bias, Candle};
use serde::{Deserialize, Serialize};

use crate::indicators::{resolve_session_grouping, session_ids, vwap};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpeningRangeConfig {
    /// Bars that make up the opening range
    pub bars: usize,
    /// Close position within the range (0 = low, 1 = high) that marks a strong open
    pub strong_close_position: f64,
    /// Close within this fraction of the high (or low) also marks a strong open
    pub extreme_tolerance: f64,
    pub session_utc_offset_secs: i32,
    pub fallback_group: usize,
    /// Relative volume above which the opening counts as high-volume
    pub high_volume_ratio: f64,
}

impl Default for OpeningRangeConfig {
    fn default() -> Self {
        Self {
            bars: 3,
            strong_close_position: 0.75,
            extreme_tolerance: 0.0025,
            session_utc_offset_secs: 19_800,
            fallback_group: 75,
            high_volume_ratio: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VwapRelation {
    Above,
    Below,
    At,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpeningRange {
    pub opening_high: f64,
    pub opening_low: f64,
    pub opening_open: f64,
    pub opening_close: f64,
    /// (high - low) / low in percent
    pub range_pct: f64,
    pub open_close_change_pct: f64,
    pub opening_direction: Bias,
    /// Opening bars' average volume relative to the whole series
    pub volume_ratio: f64,
    pub high_volume_opening: bool,
    pub vwap: f64,
    pub vwap_relation: VwapRelation,
    pub vwap_distance_pct: f64,
    /// Index of the first opening bar in the input
    pub start_index: usize,
    pub insufficient_data: bool,
    pub error: Option<String>,
}

impl OpeningRange {
    fn insufficient() -> Self {
        Self {
            opening_high: f64::NAN,
            opening_low: f64::NAN,
            opening_open: f64::NAN,
            opening_close: f64::NAN,
            range_pct: f64::NAN,
            open_close_change_pct: f64::NAN,
            opening_direction: Bias::Neutral,
            volume_ratio: f64::NAN,
            high_volume_opening: false,
            vwap: f64::NAN,
            vwap_relation: VwapRelation::At,
            vwap_distance_pct: f64::NAN,
            start_index: 0,
            insufficient_data: true,
            error: Some("Insufficient data for opening range analysis".to_string()),
        }
    }
}

/// Direction of an opening range from its open, close and extremes.
///
/// The strong variants also need the close on the matching side of the open:
/// a close near the high below the open still reads bearish.
pub fn classify_opening(open: f64, close: f64, high: f64, low: f64, config: &OpeningRangeConfig) -> Bias {
    let range = high - low;
    let position = if range > 0.0 { (close - low) / range } else { 0.5 };

    if close > open {
        if close >= high * (1.0 - config.extreme_tolerance) || position >= config.strong_close_position {
            Bias::StronglyBullish
        } else {
            Bias::Bullish
        }
    } else if close < open {
        if close <= low * (1.0 + config.extreme_tolerance) || 1.0 - position >= config.strong_close_position {
            Bias::StronglyBearish
        } else {
            Bias::Bearish
        }
    } else {
        Bias::Neutral
    }
}

/// First bar of the most recent session holding at least `bars` bars.
/// Daily bars each form their own session, so the whole series is used then.
fn opening_start(sessions: &[i64], bars: usize) -> usize {
    let mut end = sessions.len();
    while end > 0 {
        let session = sessions[end - 1];
        let start = sessions[..end]
            .iter()
            .rposition(|s| *s != session)
            .map(|p| p + 1)
            .unwrap_or(0);
        if end - start >= bars {
            return start;
        }
        end = start;
    }
    0
}

/// Opening range of the latest session.
pub fn analyze_opening_range(candles: &[Candle], config: &OpeningRangeConfig) -> OpeningRange {
    let bars = config.bars.max(1);
    if candles.len() < bars {
        return OpeningRange::insufficient();
    }

    let grouping = resolve_session_grouping(candles, config.session_utc_offset_secs, config.fallback_group);
    let sessions = session_ids(candles, grouping);
    let start = opening_start(&sessions, bars);
    let opening = &candles[start..start + bars];

    let opening_high = opening.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
    let opening_low = opening.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
    let opening_open = opening[0].open;
    let opening_close = opening[bars - 1].close;

    let range_pct = if opening_low > 0.0 {
        (opening_high - opening_low) / opening_low * 100.0
    } else {
        f64::NAN
    };
    let open_close_change_pct = stats::pct_change(opening_open, opening_close);

    let volumes: Vec<f64> = candles.iter().map(|c| c.volume).collect();
    let opening_volumes: Vec<f64> = opening.iter().map(|c| c.volume).collect();
    let overall_avg = stats::mean(&volumes);
    let volume_ratio = if overall_avg > 0.0 {
        stats::mean(&opening_volumes) / overall_avg
    } else {
        f64::NAN
    };
    let high_volume_opening = volume_ratio.is_finite() && volume_ratio > config.high_volume_ratio;

    let vwap_series = vwap(candles, grouping);
    let vwap_now = vwap_series[start + bars - 1];
    let vwap_distance_pct = stats::pct_change(vwap_now, opening_close);
    let vwap_relation = if opening_close > vwap_now {
        VwapRelation::Above
    } else if opening_close < vwap_now {
        VwapRelation::Below
    } else {
        VwapRelation::At
    };

    OpeningRange {
        opening_high,
        opening_low,
        opening_open,
        opening_close,
        range_pct,
        open_close_change_pct,
        opening_direction: classify_opening(opening_open, opening_close, opening_high, opening_low, config),
        volume_ratio,
        high_volume_opening,
        vwap: vwap_now,
        vwap_relation,
        vwap_distance_pct,
        start_index: start,
        insufficient_data: false,
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 09:15 IST on 2024-01-15
    const OPEN_TS: i64 = 1_705_290_300;

    fn bar(ts: i64, o: f64, h: f64, l: f64, c: f64, v: f64) -> Candle {
        Candle::new(ts, o, h, l, c, v)
    }

    #[test]
    fn test_three_ascending_bars_open_strongly_bullish() {
        let candles = vec![
            bar(OPEN_TS, 100.0, 105.0, 99.0, 104.0, 1000.0),
            bar(OPEN_TS + 300, 104.0, 110.0, 103.0, 108.0, 1000.0),
            bar(OPEN_TS + 600, 108.0, 115.0, 107.0, 112.0, 1000.0),
        ];
        let range = analyze_opening_range(&candles, &OpeningRangeConfig::default());
        assert!(!range.insufficient_data);
        assert_eq!(range.opening_direction, Bias::StronglyBullish);
        assert_eq!(range.opening_high, 115.0);
        assert_eq!(range.opening_low, 99.0);
        assert!((range.open_close_change_pct - 12.0).abs() < 1e-9);
        assert!(!range.high_volume_opening);
    }

    #[test]
    fn test_two_bars_is_insufficient() {
        let candles = vec![
            bar(OPEN_TS, 100.0, 105.0, 99.0, 104.0, 1000.0),
            bar(OPEN_TS + 300, 104.0, 110.0, 103.0, 108.0, 1000.0),
        ];
        let range = analyze_opening_range(&candles, &OpeningRangeConfig::default());
        assert!(range.insufficient_data);
        assert_eq!(range.opening_direction, Bias::Neutral);
    }

    #[test]
    fn test_uses_latest_session() {
        let mut candles = Vec::new();
        for i in 0..5 {
            candles.push(bar(OPEN_TS + i * 300, 100.0, 101.0, 99.0, 100.5, 500.0));
        }
        let next_day = OPEN_TS + 86_400;
        candles.push(bar(next_day, 200.0, 201.0, 194.0, 195.0, 3000.0));
        candles.push(bar(next_day + 300, 195.0, 196.0, 190.0, 191.0, 3000.0));
        candles.push(bar(next_day + 600, 191.0, 192.0, 185.0, 186.0, 3000.0));

        let range = analyze_opening_range(&candles, &OpeningRangeConfig::default());
        assert_eq!(range.start_index, 5);
        assert_eq!(range.opening_high, 201.0);
        assert_eq!(range.opening_low, 185.0);
        assert_eq!(range.opening_direction, Bias::StronglyBearish);
        assert!(range.high_volume_opening);
        assert_eq!(range.vwap_relation, VwapRelation::Below);
    }

    #[test]
    fn test_classify_opening_mild_moves() {
        let config = OpeningRangeConfig::default();
        assert_eq!(classify_opening(100.0, 102.0, 110.0, 95.0, &config), Bias::Bullish);
        assert_eq!(classify_opening(100.0, 98.0, 106.0, 90.0, &config), Bias::Bearish);
        assert_eq!(classify_opening(100.0, 100.0, 106.0, 90.0, &config), Bias::Neutral);
    }

    #[test]
    fn test_close_near_high_below_open_is_not_strongly_bullish() {
        let config = OpeningRangeConfig::default();
        assert_eq!(classify_opening(105.5, 105.0, 105.6, 100.0, &config), Bias::Bearish);
        assert_eq!(classify_opening(100.5, 105.0, 105.6, 100.0, &config), Bias::StronglyBullish);
    }

    #[test]
    fn test_short_latest_session_falls_back_to_previous() {
        let mut candles = Vec::new();
        for i in 0..3 {
            candles.push(bar(OPEN_TS + i * 300, 100.0, 102.0, 99.0, 101.0, 500.0));
        }
        candles.push(bar(OPEN_TS + 86_400, 101.0, 103.0, 100.0, 102.0, 500.0));
        let range = analyze_opening_range(&candles, &OpeningRangeConfig::default());
        assert_eq!(range.start_index, 0);
        assert!(!range.insufficient_data);
    }
}
