use analysis_core::{stats, Bias, Candle};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::indicators::{ewm, roc, rolling_rsi, sma};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MomentumConfig {
    pub min_bars: usize,
    pub roc_periods: Vec<usize>,
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub volume_window: usize,
    /// Volume relative to its average that counts as a surge
    pub volume_surge_ratio: f64,
    /// Bars used for the raw price-change component
    pub change_lookback: usize,
    pub strong_change_pct: f64,
    pub mild_change_pct: f64,
}

impl Default for MomentumConfig {
    fn default() -> Self {
        Self {
            min_bars: 14,
            roc_periods: vec![5, 10, 20],
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            volume_window: 20,
            volume_surge_ratio: 2.0,
            change_lookback: 10,
            strong_change_pct: 5.0,
            mild_change_pct: 2.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MomentumSummary {
    /// Rate of change in percent keyed by period; NaN when history is too short
    pub roc: BTreeMap<usize, f64>,
    pub rsi: f64,
    pub macd_histogram: f64,
    pub price_change_pct: f64,
    pub volume_ratio: f64,
    pub volume_surge: bool,
    /// 0-100, 50 is neutral
    pub momentum_score: f64,
    pub momentum: Bias,
    pub insufficient_data: bool,
}

impl MomentumSummary {
    fn insufficient() -> Self {
        Self {
            roc: BTreeMap::new(),
            rsi: f64::NAN,
            macd_histogram: f64::NAN,
            price_change_pct: f64::NAN,
            volume_ratio: f64::NAN,
            volume_surge: false,
            momentum_score: 50.0,
            momentum: Bias::Neutral,
            insufficient_data: true,
        }
    }
}

pub fn momentum_label(score: f64) -> Bias {
    if score >= 80.0 {
        Bias::StronglyBullish
    } else if score >= 60.0 {
        Bias::Bullish
    } else if score <= 20.0 {
        Bias::StronglyBearish
    } else if score <= 40.0 {
        Bias::Bearish
    } else {
        Bias::Neutral
    }
}

pub fn analyze_momentum(candles: &[Candle], config: &MomentumConfig) -> MomentumSummary {
    let n = candles.len();
    if n < config.min_bars.max(2) {
        return MomentumSummary::insufficient();
    }
    let last = n - 1;
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let volumes: Vec<f64> = candles.iter().map(|c| c.volume).collect();

    let roc_values: BTreeMap<usize, f64> = config
        .roc_periods
        .iter()
        .map(|&p| (p, roc(&closes, p)[last]))
        .collect();

    let rsi = rolling_rsi(&closes, config.rsi_period)[last];

    let fast = ewm(&closes, config.macd_fast);
    let slow = ewm(&closes, config.macd_slow);
    let line: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
    let signal = ewm(&line, config.macd_signal);
    let macd_histogram = line[last] - signal[last];

    let change_from = last.saturating_sub(config.change_lookback);
    let price_change_pct = stats::pct_change(closes[change_from], closes[last]);

    let volume_avg = stats::finite_at(&sma(&volumes, config.volume_window), last)
        .unwrap_or_else(|| stats::mean(&volumes));
    let volume_ratio = if volume_avg > 0.0 {
        volumes[last] / volume_avg
    } else {
        f64::NAN
    };
    let volume_surge = volume_ratio.is_finite() && volume_ratio > config.volume_surge_ratio;

    let mut score: f64 = 50.0;
    if macd_histogram > 0.0 {
        score += 15.0;
    } else if macd_histogram < 0.0 {
        score -= 15.0;
    }

    if rsi.is_finite() {
        if rsi > 70.0 {
            score += 20.0;
        } else if rsi > 60.0 {
            score += 10.0;
        } else if rsi < 30.0 {
            score -= 20.0;
        } else if rsi < 40.0 {
            score -= 10.0;
        }
    }

    if price_change_pct.is_finite() {
        if price_change_pct > config.strong_change_pct {
            score += 10.0;
        } else if price_change_pct > config.mild_change_pct {
            score += 5.0;
        } else if price_change_pct < -config.strong_change_pct {
            score -= 10.0;
        } else if price_change_pct < -config.mild_change_pct {
            score -= 5.0;
        }
    }

    if volume_surge {
        if closes[last] > closes[last - 1] {
            score += 5.0;
        } else if closes[last] < closes[last - 1] {
            score -= 5.0;
        }
    }

    let momentum_score = score.clamp(0.0, 100.0);

    MomentumSummary {
        roc: roc_values,
        rsi,
        macd_histogram,
        price_change_pct,
        volume_ratio,
        volume_surge,
        momentum_score,
        momentum: momentum_label(momentum_score),
        insufficient_data: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candles(closes: &[f64], volumes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .zip(volumes)
            .enumerate()
            .map(|(i, (&c, &v))| Candle::new(1_700_000_000 + i as i64 * 300, c, c + 0.5, c - 0.5, c, v))
            .collect()
    }

    #[test]
    fn test_short_history_is_neutral() {
        let closes = vec![100.0; 13];
        let summary = analyze_momentum(&candles(&closes, &[1000.0; 13]), &MomentumConfig::default());
        assert!(summary.insufficient_data);
        assert_eq!(summary.momentum_score, 50.0);
        assert_eq!(summary.momentum, Bias::Neutral);
    }

    #[test]
    fn test_strong_rally_with_volume() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        let mut volumes = vec![1000.0; 40];
        volumes[39] = 5000.0;
        let summary = analyze_momentum(&candles(&closes, &volumes), &MomentumConfig::default());
        // MACD +15, RSI 100 +20, 10-bar change 7.6% +10, surge +5
        assert_eq!(summary.momentum_score, 100.0);
        assert_eq!(summary.momentum, Bias::StronglyBullish);
        assert!(summary.volume_surge);
        assert!((summary.roc[&5] - 5.0 / 134.0 * 100.0).abs() < 1e-9);
        assert!(summary.roc[&20].is_finite());
    }

    #[test]
    fn test_selloff_is_bearish() {
        let closes: Vec<f64> = (0..40).map(|i| 200.0 - 2.0 * i as f64).collect();
        let summary = analyze_momentum(&candles(&closes, &[1000.0; 40]), &MomentumConfig::default());
        // MACD -15, RSI 0 -20, change -10
        assert_eq!(summary.momentum_score, 5.0);
        assert_eq!(summary.momentum, Bias::StronglyBearish);
        assert!(!summary.volume_surge);
    }

    #[test]
    fn test_flat_market_is_neutral() {
        let summary = analyze_momentum(&candles(&[100.0; 30], &[1000.0; 30]), &MomentumConfig::default());
        assert_eq!(summary.momentum_score, 50.0);
        assert_eq!(summary.momentum, Bias::Neutral);
        assert!((summary.rsi - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_label_thresholds() {
        assert_eq!(momentum_label(80.0), Bias::StronglyBullish);
        assert_eq!(momentum_label(65.0), Bias::Bullish);
        assert_eq!(momentum_label(50.0), Bias::Neutral);
        assert_eq!(momentum_label(40.0), Bias::Bearish);
        assert_eq!(momentum_label(20.0), Bias::StronglyBearish);
    }
}
