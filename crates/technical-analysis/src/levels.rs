use analysis_core::stats::round_to;
use analysis_core::{Candle, TradingMode};
use serde::{Deserialize, Serialize};

/// Centered-window extrema flags.
///
/// Bar `i` is flagged when its value equals the extreme of the full window
/// around it (`[i - window/2, i + (window-1)/2]`) and differs from the bar before.
/// Bars without a full window are never flagged.
pub fn centered_extrema(values: &[f64], window: usize, find_min: bool) -> Vec<bool> {
    let n = values.len();
    let mut flags = vec![false; n];
    if window < 2 || n < window {
        return flags;
    }
    let before = window / 2;
    let after = window - 1 - before;

    for i in before..n.saturating_sub(after) {
        let slice = &values[i - before..=i + after];
        let extreme = if find_min {
            slice.iter().copied().fold(f64::INFINITY, f64::min)
        } else {
            slice.iter().copied().fold(f64::NEG_INFINITY, f64::max)
        };
        flags[i] = values[i] == extreme && values[i] != values[i - 1];
    }
    flags
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelConfig {
    /// Candles required before any level is reported
    pub min_bars: usize,
    /// Upper bound on the extrema window; shorter series use a third of their length
    pub max_window: usize,
    /// Levels within this percent of a cluster's running mean are merged
    pub cluster_pct: f64,
    /// Fallback distance (fraction of price) when no level exists on one side
    pub fallback_offset: f64,
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            min_bars: 10,
            max_window: 10,
            cluster_pct: 0.5,
            fallback_offset: 0.01,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportResistance {
    pub support: Vec<f64>,
    pub resistance: Vec<f64>,
    pub current_price: Option<f64>,
    pub nearest_support: Option<f64>,
    pub nearest_resistance: Option<f64>,
    pub insufficient_data: bool,
    pub error: Option<String>,
}

impl SupportResistance {
    fn insufficient(message: &str) -> Self {
        Self {
            support: Vec::new(),
            resistance: Vec::new(),
            current_price: None,
            nearest_support: None,
            nearest_resistance: None,
            insufficient_data: true,
            error: Some(message.to_string()),
        }
    }
}

/// Flags bars that equal their centered rolling extreme and differ from the bar
/// `window / 2` positions earlier.
fn rolling_extrema_levels(values: &[f64], window: usize, find_min: bool) -> Vec<f64> {
    let n = values.len();
    let before = window / 2;
    let after = window - 1 - before;
    let mut levels = Vec::new();
    if n < window {
        return levels;
    }

    for i in before..n - after {
        let slice = &values[i - before..=i + after];
        let extreme = if find_min {
            slice.iter().copied().fold(f64::INFINITY, f64::min)
        } else {
            slice.iter().copied().fold(f64::NEG_INFINITY, f64::max)
        };
        let shifted_differs = i < before || values[i - before] != values[i];
        if values[i] == extreme && shifted_differs {
            levels.push(values[i]);
        }
    }
    levels
}

fn dedup_sorted_rounded(levels: Vec<f64>) -> Vec<f64> {
    let mut rounded: Vec<f64> = levels.into_iter().map(|l| round_to(l, 2)).collect();
    rounded.sort_by(|a, b| a.total_cmp(b));
    rounded.dedup();
    rounded
}

/// Merge sorted levels lying within `threshold_pct` percent of the running cluster mean.
pub fn cluster_levels(levels: &[f64], threshold_pct: f64) -> Vec<f64> {
    let mut sorted: Vec<f64> = levels.iter().copied().filter(|l| l.is_finite()).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mut clusters: Vec<Vec<f64>> = Vec::new();
    for level in sorted {
        if let Some(last) = clusters.last_mut() {
            let avg = last.iter().sum::<f64>() / last.len() as f64;
            if avg != 0.0 && ((level - avg) / avg).abs() * 100.0 <= threshold_pct {
                last.push(level);
                continue;
            }
        }
        clusters.push(vec![level]);
    }

    clusters
        .iter()
        .map(|c| c.iter().sum::<f64>() / c.len() as f64)
        .collect()
}

/// Highest level below `price` (or lowest above); falls back to a fixed offset from price.
pub fn nearest_level(levels: &[f64], price: f64, below: bool, fallback_offset: f64) -> f64 {
    if below {
        levels
            .iter()
            .copied()
            .filter(|&l| l < price)
            .fold(None, |best: Option<f64>, l| Some(best.map_or(l, |b| b.max(l))))
            .unwrap_or(price * (1.0 - fallback_offset))
    } else {
        levels
            .iter()
            .copied()
            .filter(|&l| l > price)
            .fold(None, |best: Option<f64>, l| Some(best.map_or(l, |b| b.min(l))))
            .unwrap_or(price * (1.0 + fallback_offset))
    }
}

/// Support and resistance from local extrema of lows and highs.
pub fn support_resistance(candles: &[Candle], config: &LevelConfig) -> SupportResistance {
    if candles.len() < config.min_bars.max(1) {
        return SupportResistance::insufficient("Insufficient data for support/resistance analysis");
    }

    let window = config.max_window.min(candles.len() / 3).max(2);
    let lows: Vec<f64> = candles.iter().map(|c| c.low).collect();
    let highs: Vec<f64> = candles.iter().map(|c| c.high).collect();

    let support = cluster_levels(
        &dedup_sorted_rounded(rolling_extrema_levels(&lows, window, true)),
        config.cluster_pct,
    );
    let resistance = cluster_levels(
        &dedup_sorted_rounded(rolling_extrema_levels(&highs, window, false)),
        config.cluster_pct,
    );

    let price = candles[candles.len() - 1].close;
    SupportResistance {
        nearest_support: Some(nearest_level(&support, price, true, config.fallback_offset)),
        nearest_resistance: Some(nearest_level(&resistance, price, false, config.fallback_offset)),
        current_price: Some(price),
        support,
        resistance,
        insufficient_data: false,
        error: None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwingDirection {
    Uptrend,
    Downtrend,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FibLevel {
    /// Retracement ratio in percent (0.0, 23.6, ... 100.0)
    pub ratio: f64,
    pub price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FibonacciLevels {
    pub trend: SwingDirection,
    pub swing_high: f64,
    pub swing_low: f64,
    pub window: usize,
    /// Ordered from the 0% anchor to the 100% anchor
    pub retracement_levels: Vec<FibLevel>,
    pub nearest_level: Option<FibLevel>,
    pub insufficient_data: bool,
}

pub const FIB_RATIOS: [f64; 7] = [0.0, 0.236, 0.382, 0.5, 0.618, 0.786, 1.0];

/// Trailing window for swing detection: 30 bars intraday, 100 otherwise.
pub fn fib_window(mode: TradingMode) -> usize {
    if mode.is_intraday() {
        30
    } else {
        100
    }
}

/// Fibonacci retracements of the trailing swing, oriented by swing direction.
///
/// An uptrend anchors 0% at the swing high and walks down; a downtrend anchors
/// 0% at the swing low and walks up.
pub fn fibonacci_levels(candles: &[Candle], mode: TradingMode) -> FibonacciLevels {
    let window = fib_window(mode);
    if candles.len() < 2 {
        return FibonacciLevels {
            trend: SwingDirection::Uptrend,
            swing_high: f64::NAN,
            swing_low: f64::NAN,
            window,
            retracement_levels: Vec::new(),
            nearest_level: None,
            insufficient_data: true,
        };
    }

    let tail = &candles[candles.len().saturating_sub(window)..];
    let swing_high = tail.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
    let swing_low = tail.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
    let trend = if swing_high > tail[0].high {
        SwingDirection::Uptrend
    } else {
        SwingDirection::Downtrend
    };

    let diff = swing_high - swing_low;
    let retracement_levels: Vec<FibLevel> = FIB_RATIOS
        .iter()
        .map(|&r| {
            let price = match trend {
                SwingDirection::Uptrend => swing_high - r * diff,
                SwingDirection::Downtrend => swing_low + r * diff,
            };
            FibLevel {
                ratio: round_to(r * 100.0, 1),
                price: round_to(price, 2),
            }
        })
        .collect();

    let close = candles[candles.len() - 1].close;
    let nearest_level = retracement_levels
        .iter()
        .min_by(|a, b| (a.price - close).abs().total_cmp(&(b.price - close).abs()))
        .cloned();

    FibonacciLevels {
        trend,
        swing_high,
        swing_low,
        window,
        retracement_levels,
        nearest_level,
        insufficient_data: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wave_candles(count: usize) -> Vec<Candle> {
        (0..count)
            .map(|i| {
                let phase = (i as f64 / 6.0) * std::f64::consts::PI;
                let mid = 100.0 + 5.0 * phase.sin() + i as f64 * 0.05;
                Candle::new(i as i64 * 60 + 60, mid, mid + 1.0, mid - 1.0, mid + 0.2, 500.0)
            })
            .collect()
    }

    #[test]
    fn test_insufficient_history() {
        let result = support_resistance(&wave_candles(9), &LevelConfig::default());
        assert!(result.insufficient_data);
        assert!(result.support.is_empty());
        assert!(result.error.is_some());
    }

    #[test]
    fn test_wave_produces_levels_on_both_sides() {
        let candles = wave_candles(60);
        let result = support_resistance(&candles, &LevelConfig::default());
        assert!(!result.insufficient_data);
        assert!(!result.support.is_empty());
        assert!(!result.resistance.is_empty());
        let price = result.current_price.unwrap();
        assert!(result.nearest_support.unwrap() < price);
        assert!(result.nearest_resistance.unwrap() > price);
    }

    #[test]
    fn test_cluster_merges_close_levels() {
        let clustered = cluster_levels(&[100.0, 100.3, 100.4, 105.0], 0.5);
        assert_eq!(clustered.len(), 2);
        assert!((clustered[0] - 100.233333).abs() < 1e-4);
        assert_eq!(clustered[1], 105.0);
    }

    #[test]
    fn test_nearest_level_fallback() {
        assert!((nearest_level(&[], 200.0, true, 0.01) - 198.0).abs() < 1e-9);
        assert!((nearest_level(&[150.0], 200.0, false, 0.01) - 202.0).abs() < 1e-9);
        assert_eq!(nearest_level(&[150.0, 190.0, 210.0], 200.0, true, 0.01), 190.0);
        assert_eq!(nearest_level(&[150.0, 230.0, 210.0], 200.0, false, 0.01), 210.0);
    }

    #[test]
    fn test_centered_extrema_flags_valley() {
        let values = [5.0, 4.0, 3.0, 2.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let flags = centered_extrema(&values, 4, true);
        assert!(flags[4]);
        assert_eq!(flags.iter().filter(|f| **f).count(), 1);
    }

    fn assert_monotone(levels: &[FibLevel]) {
        let prices: Vec<f64> = levels.iter().map(|l| l.price).collect();
        let descending = prices.windows(2).all(|w| w[0] >= w[1]);
        let ascending = prices.windows(2).all(|w| w[0] <= w[1]);
        assert!(descending || ascending, "{:?}", prices);
    }

    #[test]
    fn test_fib_uptrend_orientation() {
        let candles: Vec<Candle> = (0..40)
            .map(|i| {
                let p = 100.0 + i as f64;
                Candle::new(i as i64 + 1, p, p + 1.0, p - 1.0, p + 0.5, 100.0)
            })
            .collect();
        let fib = fibonacci_levels(&candles, TradingMode::Scalp);
        assert_eq!(fib.trend, SwingDirection::Uptrend);
        assert_eq!(fib.window, 30);
        assert_eq!(fib.retracement_levels.len(), 7);
        assert_eq!(fib.retracement_levels[0].price, round_to(fib.swing_high, 2));
        assert_eq!(fib.retracement_levels[6].price, round_to(fib.swing_low, 2));
        assert_monotone(&fib.retracement_levels);
    }

    #[test]
    fn test_fib_downtrend_orientation() {
        let candles: Vec<Candle> = (0..120)
            .map(|i| {
                let p = 300.0 - i as f64;
                Candle::new(i as i64 + 1, p, p + 1.0, p - 1.0, p - 0.5, 100.0)
            })
            .collect();
        let fib = fibonacci_levels(&candles, TradingMode::Swing);
        assert_eq!(fib.trend, SwingDirection::Downtrend);
        assert_eq!(fib.retracement_levels[0].price, round_to(fib.swing_low, 2));
        assert_monotone(&fib.retracement_levels);
        for level in &fib.retracement_levels {
            assert!(level.price >= fib.swing_low - 0.01 && level.price <= fib.swing_high + 0.01);
        }
    }

    #[test]
    fn test_fib_single_candle_is_insufficient() {
        let fib = fibonacci_levels(&wave_candles(1), TradingMode::Swing);
        assert!(fib.insufficient_data);
        assert!(fib.retracement_levels.is_empty());
    }
}
