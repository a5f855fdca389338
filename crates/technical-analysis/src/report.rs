//! One-call technical analysis over a candle snapshot.

use analysis_core::{Candle, TradingMode};
use serde::{Deserialize, Serialize};

use crate::indicator_set::{calculate_all, IndicatorConfig, IndicatorSet, IndicatorSnapshot};
use crate::levels::{fibonacci_levels, support_resistance, FibonacciLevels, LevelConfig, SupportResistance};
use crate::momentum::{analyze_momentum, MomentumConfig, MomentumSummary};
use crate::opening_range::{analyze_opening_range, OpeningRange, OpeningRangeConfig};
use crate::patterns::{detect_patterns, PatternConfig, PatternSummary};
use crate::trend::{detect_trend, TrendConfig, TrendSummary};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TechnicalConfig {
    pub indicators: IndicatorConfig,
    pub patterns: PatternConfig,
    pub trend: TrendConfig,
    pub levels: LevelConfig,
    pub momentum: MomentumConfig,
    pub opening_range: OpeningRangeConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct TechnicalReport {
    pub mode: TradingMode,
    pub indicators: IndicatorSnapshot,
    pub patterns: PatternSummary,
    pub trend: TrendSummary,
    pub support_resistance: SupportResistance,
    pub fibonacci: FibonacciLevels,
    pub momentum: MomentumSummary,
    pub opening_range: OpeningRange,
    #[serde(skip)]
    pub indicator_set: IndicatorSet,
}

/// Run every technical analyzer over the same snapshot.
///
/// The analyzers only read `candles`, so the independent ones run on the rayon pool.
pub fn analyze_technicals(candles: &[Candle], mode: TradingMode, config: &TechnicalConfig) -> TechnicalReport {
    let ((indicator_set, patterns), ((trend, (support_resistance, fibonacci)), (momentum, opening_range))) =
        rayon::join(
            || {
                rayon::join(
                    || calculate_all(candles, &config.indicators),
                    || detect_patterns(candles, &config.patterns),
                )
            },
            || {
                rayon::join(
                    || {
                        rayon::join(
                            || detect_trend(candles, &config.trend),
                            || {
                                (
                                    support_resistance(candles, &config.levels),
                                    fibonacci_levels(candles, mode),
                                )
                            },
                        )
                    },
                    || {
                        (
                            analyze_momentum(candles, &config.momentum),
                            analyze_opening_range(candles, &config.opening_range),
                        )
                    },
                )
            },
        );

    TechnicalReport {
        mode,
        indicators: IndicatorSnapshot::from_set(&indicator_set, candles, &config.indicators),
        patterns,
        trend,
        support_resistance,
        fibonacci,
        momentum,
        opening_range,
        indicator_set,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wave(count: usize) -> Vec<Candle> {
        (0..count)
            .map(|i| {
                let base = 22_000.0 + (i as f64 * 0.3).sin() * 80.0 + i as f64 * 1.5;
                Candle::new(
                    1_705_290_300 + i as i64 * 300,
                    base,
                    base + 12.0,
                    base - 10.0,
                    base + 4.0,
                    50_000.0,
                )
            })
            .collect()
    }

    #[test]
    fn test_report_covers_every_analyzer() {
        let candles = wave(150);
        let report = analyze_technicals(&candles, TradingMode::Scalp, &TechnicalConfig::default());
        assert_eq!(report.indicator_set.len(), 150);
        assert!(!report.patterns.insufficient_data);
        assert!(!report.trend.insufficient_data);
        assert!(!report.momentum.insufficient_data);
        assert!(!report.opening_range.insufficient_data);
        assert_eq!(report.fibonacci.window, 30);
        assert_eq!(report.indicators.close, Some(candles[149].close));
    }

    #[test]
    fn test_report_on_tiny_history() {
        let candles = wave(2);
        let report = analyze_technicals(&candles, TradingMode::Swing, &TechnicalConfig::default());
        assert!(report.patterns.insufficient_data);
        assert!(report.trend.insufficient_data);
        assert!(report.momentum.insufficient_data);
        assert!(report.opening_range.insufficient_data);
        assert!(report.support_resistance.insufficient_data);
    }

    #[test]
    fn test_report_is_deterministic() {
        let candles = wave(120);
        let config = TechnicalConfig::default();
        let a = analyze_technicals(&candles, TradingMode::Swing, &config);
        let b = analyze_technicals(&candles, TradingMode::Swing, &config);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }
}
