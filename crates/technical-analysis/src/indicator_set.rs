use analysis_core::stats::{finite_at, last_finite};
use analysis_core::Candle;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::indicators::*;
use crate::levels::centered_extrema;

/// Parameters for `calculate_all`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorConfig {
    pub rsi_period: usize,
    pub rsi_fast_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub atr_period: usize,
    pub bb_period: usize,
    pub bb_std_dev: f64,
    pub keltner_ema_period: usize,
    pub keltner_atr_period: usize,
    pub keltner_multiplier: f64,
    pub stoch_k: usize,
    pub stoch_smooth: usize,
    pub stoch_d: usize,
    pub adx_period: usize,
    pub mfi_period: usize,
    pub cci_period: usize,
    pub williams_period: usize,
    pub cmf_period: usize,
    pub volume_sma_period: usize,
    pub ichimoku_conversion: usize,
    pub ichimoku_base: usize,
    pub ichimoku_span_b: usize,
    pub ichimoku_displacement: usize,
    pub fisher_period: usize,
    pub overbought: f64,
    pub oversold: f64,
    /// ADX level above which a stacked MA alignment counts as a strong regime
    pub regime_adx_threshold: f64,
    /// Offset applied to epoch timestamps before splitting into calendar sessions (IST by default)
    pub session_utc_offset_secs: i32,
    /// Bars per synthetic session when timestamps cannot define sessions
    pub vwap_fallback_group: usize,
    /// Window for local extrema flags
    pub extrema_window: usize,
    /// Proximity (fraction of level) for at_support / at_resistance flags
    pub level_proximity: f64,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            rsi_fast_period: 2,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            atr_period: 14,
            bb_period: 20,
            bb_std_dev: 2.0,
            keltner_ema_period: 20,
            keltner_atr_period: 10,
            keltner_multiplier: 2.0,
            stoch_k: 14,
            stoch_smooth: 3,
            stoch_d: 3,
            adx_period: 14,
            mfi_period: 14,
            cci_period: 14,
            williams_period: 14,
            cmf_period: 20,
            volume_sma_period: 20,
            ichimoku_conversion: 9,
            ichimoku_base: 26,
            ichimoku_span_b: 52,
            ichimoku_displacement: 26,
            fisher_period: 10,
            overbought: 70.0,
            oversold: 30.0,
            regime_adx_threshold: 25.0,
            session_utc_offset_secs: 19_800,
            vwap_fallback_group: 75,
            extrema_window: 10,
            level_proximity: 0.02,
        }
    }
}

impl IndicatorConfig {
    /// Name of a series computed over `period` bars, e.g. `rsi_14`
    pub fn series_name(base: &str, period: usize) -> String {
        format!("{}_{}", base, period)
    }
}

/// Five-way regime from price against SMA 20/50/200 and ADX
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketRegime {
    StrongUptrend,
    Uptrend,
    Neutral,
    Downtrend,
    StrongDowntrend,
}

impl MarketRegime {
    pub fn classify(close: f64, sma20: f64, sma50: f64, sma200: f64, adx: f64, adx_threshold: f64) -> Self {
        let strong = adx > adx_threshold;
        if close > sma20 && sma20 > sma50 && sma50 > sma200 && strong {
            MarketRegime::StrongUptrend
        } else if close < sma20 && sma20 < sma50 && sma50 < sma200 && strong {
            MarketRegime::StrongDowntrend
        } else if close > sma50 && sma50 > sma200 {
            MarketRegime::Uptrend
        } else if close < sma50 && sma50 < sma200 {
            MarketRegime::Downtrend
        } else {
            // NaN comparisons are false, so short history lands here too.
            MarketRegime::Neutral
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MarketRegime::StrongUptrend => "strong_uptrend",
            MarketRegime::Uptrend => "uptrend",
            MarketRegime::Neutral => "neutral",
            MarketRegime::Downtrend => "downtrend",
            MarketRegime::StrongDowntrend => "strong_downtrend",
        }
    }
}

/// Named per-bar series, each aligned index-for-index with the input candles
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorSet {
    len: usize,
    series: BTreeMap<String, Vec<f64>>,
    pub regime: Vec<MarketRegime>,
}

impl IndicatorSet {
    fn new(len: usize) -> Self {
        Self {
            len,
            series: BTreeMap::new(),
            regime: Vec::with_capacity(len),
        }
    }

    fn insert(&mut self, name: &str, values: Vec<f64>) {
        debug_assert_eq!(values.len(), self.len, "series {} is misaligned", name);
        self.series.insert(name.to_string(), values);
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.series.get(name).map(|v| v.as_slice())
    }

    /// Value at the final bar, if defined
    pub fn latest(&self, name: &str) -> Option<f64> {
        self.get(name)
            .and_then(|s| s.len().checked_sub(1).and_then(|i| finite_at(s, i)))
    }

    /// Value at the second-to-last bar, if defined
    pub fn previous(&self, name: &str) -> Option<f64> {
        self.get(name)
            .and_then(|s| s.len().checked_sub(2).and_then(|i| finite_at(s, i)))
    }

    /// Most recent defined value anywhere in the series
    pub fn last_defined(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(last_finite)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(|k| k.as_str())
    }

    pub fn latest_regime(&self) -> MarketRegime {
        self.regime.last().copied().unwrap_or(MarketRegime::Neutral)
    }
}

fn cross_above(a: &[f64], b: &[f64]) -> Vec<f64> {
    (0..a.len())
        .map(|i| {
            if i > 0 && a[i] > b[i] && a[i - 1] <= b[i - 1] {
                1.0
            } else {
                0.0
            }
        })
        .collect()
}

fn cross_below(a: &[f64], b: &[f64]) -> Vec<f64> {
    cross_above(b, a)
}

fn flag(values: impl Iterator<Item = bool>) -> Vec<f64> {
    values.map(|b| if b { 1.0 } else { 0.0 }).collect()
}

/// Compute the full indicator set for a candle series.
pub fn calculate_all(candles: &[Candle], config: &IndicatorConfig) -> IndicatorSet {
    let n = candles.len();
    let mut set = IndicatorSet::new(n);
    let named = IndicatorConfig::series_name;

    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let highs: Vec<f64> = candles.iter().map(|c| c.high).collect();
    let lows: Vec<f64> = candles.iter().map(|c| c.low).collect();
    let volumes: Vec<f64> = candles.iter().map(|c| c.volume).collect();

    // Trend
    let sma_20 = sma(&closes, 20);
    let sma_50 = sma(&closes, 50);
    let sma_200 = sma(&closes, 200);
    let ema_9 = ema(&closes, 9);
    let ema_21 = ema(&closes, 21);
    let ema_50 = ema(&closes, 50);
    set.insert("ema_55", ema(&closes, 55));
    set.insert("tema_9", tema(&closes, 9));
    set.insert("dema_21", dema(&closes, 21));

    // Volatility
    let atr_values = atr(candles, config.atr_period);
    let bb = bollinger_bands(&closes, config.bb_period, config.bb_std_dev);
    let kc = keltner_channels(
        candles,
        config.keltner_ema_period,
        config.keltner_atr_period,
        config.keltner_multiplier,
    );
    set.insert("bb_width", bb.width());
    set.insert("bb_kc_squeeze", squeeze(&bb, &kc));

    // Momentum
    let rsi_values = rsi(&closes, config.rsi_period);
    set.insert(&named("rsi", config.rsi_fast_period), rsi(&closes, config.rsi_fast_period));
    let stoch = stochastic(candles, config.stoch_k, config.stoch_smooth, config.stoch_d);
    let macd_result = macd(&closes, config.macd_fast, config.macd_slow, config.macd_signal);
    set.insert(&named("cci", config.cci_period), cci(candles, config.cci_period));
    set.insert(&named("williams_r", config.williams_period), williams_r(candles, config.williams_period));
    let adx_result = adx(candles, config.adx_period);
    set.insert(&named("mfi", config.mfi_period), mfi(candles, config.mfi_period));

    // Volume
    let grouping = resolve_session_grouping(candles, config.session_utc_offset_secs, config.vwap_fallback_group);
    set.insert("vwap", vwap(candles, grouping));
    set.insert("obv", obv(candles));
    set.insert(&named("cmf", config.cmf_period), cmf(candles, config.cmf_period));
    set.insert("adl", adl(candles));
    let volume_sma = sma(&volumes, config.volume_sma_period);
    let rel_volume = volumes
        .iter()
        .zip(&volume_sma)
        .map(|(v, avg)| if *avg > 0.0 { v / avg } else { f64::NAN })
        .collect();
    set.insert("rel_volume", rel_volume);

    // Advanced
    let ha = heikin_ashi(candles);
    set.insert("ha_open", ha.open);
    set.insert("ha_high", ha.high);
    set.insert("ha_low", ha.low);
    set.insert("ha_close", ha.close);
    let ichimoku = ichimoku_cloud(
        candles,
        config.ichimoku_conversion,
        config.ichimoku_base,
        config.ichimoku_span_b,
        config.ichimoku_displacement,
    );
    set.insert("ichimoku_conversion", ichimoku.conversion);
    set.insert("ichimoku_base", ichimoku.base);
    set.insert("ichimoku_span_a", ichimoku.span_a);
    set.insert("ichimoku_span_b", ichimoku.span_b);
    set.insert("ichimoku_lagging", ichimoku.lagging);
    set.insert(&named("fisher", config.fisher_period), fisher_transform(candles, config.fisher_period));

    // Signals
    set.insert("ema_cross_buy", cross_above(&ema_9, &ema_21));
    set.insert("ema_cross_sell", cross_below(&ema_9, &ema_21));
    set.insert(
        "macd_cross_buy",
        cross_above(&macd_result.macd_line, &macd_result.signal_line),
    );
    set.insert(
        "macd_cross_sell",
        cross_below(&macd_result.macd_line, &macd_result.signal_line),
    );
    set.insert(
        "rsi_overbought",
        flag(rsi_values.iter().map(|r| *r > config.overbought)),
    );
    set.insert(
        "rsi_oversold",
        flag(rsi_values.iter().map(|r| *r < config.oversold)),
    );

    // Local extrema and proximity flags
    let local_min = centered_extrema(&lows, config.extrema_window, true);
    let local_max = centered_extrema(&highs, config.extrema_window, false);
    let supports: Vec<f64> = (0..n).filter(|&i| local_min[i]).map(|i| lows[i]).collect();
    let resistances: Vec<f64> = (0..n).filter(|&i| local_max[i]).map(|i| highs[i]).collect();
    let near = |price: f64, levels: &[f64]| {
        levels
            .iter()
            .any(|&l| l != 0.0 && ((price - l) / l).abs() < config.level_proximity)
    };
    set.insert("local_min", flag(local_min.iter().copied()));
    set.insert("local_max", flag(local_max.iter().copied()));
    set.insert("at_support", flag(lows.iter().map(|&l| near(l, &supports))));
    set.insert(
        "at_resistance",
        flag(highs.iter().map(|&h| near(h, &resistances))),
    );

    // Regime and composite strength
    for i in 0..n {
        set.regime.push(MarketRegime::classify(
            closes[i],
            sma_20[i],
            sma_50[i],
            sma_200[i],
            adx_result.adx[i],
            config.regime_adx_threshold,
        ));
    }
    let trend_strength = (0..n)
        .map(|i| {
            composite_trend_strength(
                closes[i],
                adx_result.adx[i],
                ema_9[i],
                ema_21[i],
                ema_50[i],
                rsi_values[i],
                config,
            )
        })
        .collect();
    set.insert("trend_strength", trend_strength);

    set.insert("sma_20", sma_20);
    set.insert("sma_50", sma_50);
    set.insert("sma_200", sma_200);
    set.insert("ema_9", ema_9);
    set.insert("ema_21", ema_21);
    set.insert("ema_50", ema_50);
    set.insert(&named("atr", config.atr_period), atr_values);
    set.insert("bb_upper", bb.upper);
    set.insert("bb_middle", bb.middle);
    set.insert("bb_lower", bb.lower);
    set.insert("kc_upper", kc.upper);
    set.insert("kc_middle", kc.middle);
    set.insert("kc_lower", kc.lower);
    set.insert(&named("rsi", config.rsi_period), rsi_values);
    set.insert("stoch_k", stoch.k);
    set.insert("stoch_d", stoch.d);
    set.insert("macd", macd_result.macd_line);
    set.insert("macd_signal", macd_result.signal_line);
    set.insert("macd_hist", macd_result.histogram);
    set.insert(&named("adx", config.adx_period), adx_result.adx);
    set.insert(&named("plus_di", config.adx_period), adx_result.plus_di);
    set.insert(&named("minus_di", config.adx_period), adx_result.minus_di);
    set.insert(&named("volume_sma", config.volume_sma_period), volume_sma);

    set
}

/// ADX (0-40) + EMA alignment (0 or 30) + RSI extreme (0 or 30), clipped to [0, 100].
///
/// Undefined while ADX is undefined.
pub fn composite_trend_strength(
    close: f64,
    adx: f64,
    ema_fast: f64,
    ema_mid: f64,
    ema_slow: f64,
    rsi: f64,
    config: &IndicatorConfig,
) -> f64 {
    if !adx.is_finite() {
        return f64::NAN;
    }
    let mut score = adx * 0.4;

    let bullish_stack = ema_fast > ema_mid && ema_mid > ema_slow && close > ema_fast;
    let bearish_stack = ema_fast < ema_mid && ema_mid < ema_slow && close < ema_fast;
    if bullish_stack || bearish_stack {
        score += 30.0;
    }
    if rsi > config.overbought || rsi < config.oversold {
        score += 30.0;
    }
    score.clamp(0.0, 100.0)
}

/// Latest indicator readings consumed by signal fusion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub close: Option<f64>,
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_hist: Option<f64>,
    pub atr: Option<f64>,
    pub adx: Option<f64>,
    pub plus_di: Option<f64>,
    pub minus_di: Option<f64>,
    pub vwap: Option<f64>,
    pub price_above_vwap: Option<bool>,
    pub ema_9_21_cross: String,
    pub stoch_k: Option<f64>,
    pub mfi: Option<f64>,
    pub rel_volume: Option<f64>,
    pub bb_squeeze: bool,
    pub obv_trend: String,
    pub market_regime: MarketRegime,
    pub trend_strength: Option<f64>,
}

impl IndicatorSnapshot {
    /// Reads the series `calculate_all` produced under `config`.
    pub fn from_set(set: &IndicatorSet, candles: &[Candle], config: &IndicatorConfig) -> Self {
        let named = IndicatorConfig::series_name;
        let close = candles.last().map(|c| c.close);
        let vwap = set.latest("vwap");
        let ema_cross = match (set.latest("ema_9"), set.latest("ema_21")) {
            (Some(fast), Some(slow)) if fast > slow => "bullish",
            (Some(fast), Some(slow)) if fast < slow => "bearish",
            _ => "neutral",
        };
        let obv_trend = match set.get("obv") {
            Some(obv) if obv.len() > 5 => {
                let last = obv[obv.len() - 1];
                let prior = obv[obv.len() - 6];
                if last > prior {
                    "up"
                } else if last < prior {
                    "down"
                } else {
                    "flat"
                }
            }
            _ => "flat",
        };

        Self {
            close,
            rsi: set.latest(&named("rsi", config.rsi_period)),
            macd: set.latest("macd"),
            macd_signal: set.latest("macd_signal"),
            macd_hist: set.latest("macd_hist"),
            atr: set.latest(&named("atr", config.atr_period)),
            adx: set.latest(&named("adx", config.adx_period)),
            plus_di: set.latest(&named("plus_di", config.adx_period)),
            minus_di: set.latest(&named("minus_di", config.adx_period)),
            vwap,
            price_above_vwap: match (close, vwap) {
                (Some(c), Some(v)) => Some(c > v),
                _ => None,
            },
            ema_9_21_cross: ema_cross.to_string(),
            stoch_k: set.latest("stoch_k"),
            mfi: set.latest(&named("mfi", config.mfi_period)),
            rel_volume: set.latest("rel_volume"),
            bb_squeeze: set.latest("bb_kc_squeeze") == Some(1.0),
            obv_trend: obv_trend.to_string(),
            market_regime: set.latest_regime(),
            trend_strength: set.latest("trend_strength"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trending_candles(count: usize, step: f64) -> Vec<Candle> {
        (0..count)
            .map(|i| {
                let base = 1000.0 + i as f64 * step;
                let wiggle: f64 = if i % 3 == 0 { 2.0 } else { -1.0 };
                Candle::new(
                    1_700_000_000 + i as i64 * 300,
                    base,
                    base + 6.0 + wiggle.abs(),
                    base - 4.0,
                    base + step * 0.8 + wiggle,
                    10_000.0 + (i % 7) as f64 * 500.0,
                )
            })
            .collect()
    }

    #[test]
    fn test_every_series_is_aligned() {
        let candles = trending_candles(260, 2.0);
        let set = calculate_all(&candles, &IndicatorConfig::default());
        assert_eq!(set.regime.len(), candles.len());
        for name in set.names() {
            assert_eq!(set.get(name).unwrap().len(), candles.len(), "{}", name);
        }
        assert!(set.get("rsi_14").is_some());
        assert!(set.get("vwap").is_some());
        assert!(set.get("adx_14").is_some());
    }

    #[test]
    fn test_series_names_follow_configured_periods() {
        let candles = trending_candles(120, 2.0);
        let config = IndicatorConfig {
            rsi_period: 9,
            atr_period: 10,
            adx_period: 7,
            mfi_period: 21,
            ..IndicatorConfig::default()
        };
        let set = calculate_all(&candles, &config);
        for name in ["rsi_9", "atr_10", "adx_7", "plus_di_7", "minus_di_7", "mfi_21", "rsi_2"] {
            assert!(set.get(name).is_some(), "{}", name);
        }
        assert!(set.get("rsi_14").is_none());
        assert!(set.get("atr_14").is_none());

        let snap = IndicatorSnapshot::from_set(&set, &candles, &config);
        assert_eq!(snap.rsi, set.latest("rsi_9"));
        assert_eq!(snap.atr, set.latest("atr_10"));
        assert!(snap.adx.is_some());
    }

    #[test]
    fn test_short_history_is_not_an_error() {
        let candles = trending_candles(5, 1.0);
        let set = calculate_all(&candles, &IndicatorConfig::default());
        assert_eq!(set.len(), 5);
        assert!(set.latest("sma_200").is_none());
        assert!(set.latest("trend_strength").is_none());
        assert_eq!(set.latest_regime(), MarketRegime::Neutral);
    }

    #[test]
    fn test_steady_uptrend_regime() {
        let candles = trending_candles(260, 3.0);
        let set = calculate_all(&candles, &IndicatorConfig::default());
        assert_eq!(set.latest_regime(), MarketRegime::StrongUptrend);
        let strength = set.latest("trend_strength").unwrap();
        assert!((0.0..=100.0).contains(&strength));
    }

    #[test]
    fn test_regime_classification_table() {
        assert_eq!(
            MarketRegime::classify(110.0, 105.0, 100.0, 95.0, 30.0, 25.0),
            MarketRegime::StrongUptrend
        );
        assert_eq!(
            MarketRegime::classify(110.0, 105.0, 100.0, 95.0, 20.0, 25.0),
            MarketRegime::Uptrend
        );
        assert_eq!(
            MarketRegime::classify(90.0, 95.0, 100.0, 105.0, 30.0, 25.0),
            MarketRegime::StrongDowntrend
        );
        assert_eq!(
            MarketRegime::classify(100.0, 100.0, 100.0, 100.0, 40.0, 25.0),
            MarketRegime::Neutral
        );
        assert_eq!(
            MarketRegime::classify(100.0, f64::NAN, f64::NAN, f64::NAN, f64::NAN, 25.0),
            MarketRegime::Neutral
        );
    }

    #[test]
    fn test_composite_trend_strength_components() {
        let config = IndicatorConfig::default();
        // 50 * 0.4 + 30 (stacked) + 30 (rsi extreme)
        let s = composite_trend_strength(110.0, 50.0, 105.0, 100.0, 95.0, 75.0, &config);
        assert!((s - 80.0).abs() < 1e-9);
        let capped = composite_trend_strength(110.0, 100.0, 105.0, 100.0, 95.0, 75.0, &config);
        assert_eq!(capped, 100.0);
        assert!(composite_trend_strength(110.0, f64::NAN, 1.0, 1.0, 1.0, 50.0, &config).is_nan());
    }

    #[test]
    fn test_snapshot_reads_latest_values() {
        let candles = trending_candles(120, 2.0);
        let set = calculate_all(&candles, &IndicatorConfig::default());
        let snap = IndicatorSnapshot::from_set(&set, &candles, &IndicatorConfig::default());
        assert_eq!(snap.close, Some(candles[119].close));
        assert!(snap.rsi.is_some());
        assert_eq!(snap.ema_9_21_cross, "bullish");
        assert!(snap.price_above_vwap.is_some());
    }
}
