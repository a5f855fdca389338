//! Per-bar indicator functions.
//!
//! Every function returns a series with the same length as its input. Bars that
//! do not have enough history yet hold `f64::NAN`.

use analysis_core::Candle;

fn nan_series(len: usize) -> Vec<f64> {
    vec![f64::NAN; len]
}

fn first_finite_run(data: &[f64], period: usize) -> Option<usize> {
    if period == 0 || data.len() < period {
        return None;
    }
    (0..=data.len() - period).find(|&s| data[s..s + period].iter().all(|v| v.is_finite()))
}

/// Simple Moving Average
pub fn sma(data: &[f64], period: usize) -> Vec<f64> {
    let mut result = nan_series(data.len());
    if period == 0 || data.len() < period {
        return result;
    }

    for i in period - 1..data.len() {
        let sum: f64 = data[i + 1 - period..=i].iter().sum();
        result[i] = sum / period as f64;
    }
    result
}

/// Exponential Moving Average, seeded with the SMA of the first full window.
///
/// Leading NaN input (e.g. smoothing another indicator) is skipped before seeding.
pub fn ema(data: &[f64], period: usize) -> Vec<f64> {
    let mut result = nan_series(data.len());
    let Some(start) = first_finite_run(data, period) else {
        return result;
    };

    let multiplier = 2.0 / (period as f64 + 1.0);
    let seed_idx = start + period - 1;
    let mut prev = data[start..=seed_idx].iter().sum::<f64>() / period as f64;
    result[seed_idx] = prev;

    for i in seed_idx + 1..data.len() {
        if data[i].is_finite() {
            prev = (data[i] - prev) * multiplier + prev;
            result[i] = prev;
        }
    }
    result
}

/// Recursive exponential average seeded with the first value (no warm-up gap).
pub fn ewm(data: &[f64], span: usize) -> Vec<f64> {
    let mut result = nan_series(data.len());
    let Some(start) = data.iter().position(|v| v.is_finite()) else {
        return result;
    };

    let alpha = 2.0 / (span.max(1) as f64 + 1.0);
    let mut prev = data[start];
    result[start] = prev;
    for i in start + 1..data.len() {
        if data[i].is_finite() {
            prev = alpha * data[i] + (1.0 - alpha) * prev;
            result[i] = prev;
        }
    }
    result
}

/// Double Exponential Moving Average
pub fn dema(data: &[f64], period: usize) -> Vec<f64> {
    let e1 = ema(data, period);
    let e2 = ema(&e1, period);
    e1.iter().zip(&e2).map(|(a, b)| 2.0 * a - b).collect()
}

/// Triple Exponential Moving Average
pub fn tema(data: &[f64], period: usize) -> Vec<f64> {
    let e1 = ema(data, period);
    let e2 = ema(&e1, period);
    let e3 = ema(&e2, period);
    (0..data.len())
        .map(|i| 3.0 * e1[i] - 3.0 * e2[i] + e3[i])
        .collect()
}

/// Trailing rolling maximum
pub fn rolling_max(data: &[f64], period: usize) -> Vec<f64> {
    let mut result = nan_series(data.len());
    if period == 0 || data.len() < period {
        return result;
    }
    for i in period - 1..data.len() {
        result[i] = data[i + 1 - period..=i]
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
    }
    result
}

/// Trailing rolling minimum
pub fn rolling_min(data: &[f64], period: usize) -> Vec<f64> {
    let mut result = nan_series(data.len());
    if period == 0 || data.len() < period {
        return result;
    }
    for i in period - 1..data.len() {
        result[i] = data[i + 1 - period..=i]
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min);
    }
    result
}

/// Rate of change in percent over `period` bars
pub fn roc(data: &[f64], period: usize) -> Vec<f64> {
    let mut result = nan_series(data.len());
    for i in period..data.len() {
        let base = data[i - period];
        if base != 0.0 {
            result[i] = (data[i] - base) / base * 100.0;
        }
    }
    result
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        // Flat stretch: no gains and no losses reads as neutral, pure gains saturate.
        if avg_gain == 0.0 {
            50.0
        } else {
            100.0
        }
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - (100.0 / (1.0 + rs))
    }
}

/// Relative Strength Index (Wilder smoothing). First value at index `period`.
pub fn rsi(data: &[f64], period: usize) -> Vec<f64> {
    let mut result = nan_series(data.len());
    if period == 0 || data.len() < period + 1 {
        return result;
    }

    let mut gains = Vec::with_capacity(data.len() - 1);
    let mut losses = Vec::with_capacity(data.len() - 1);
    for i in 1..data.len() {
        let change = data[i] - data[i - 1];
        gains.push(change.max(0.0));
        losses.push((-change).max(0.0));
    }

    let mut avg_gain = gains[..period].iter().sum::<f64>() / period as f64;
    let mut avg_loss = losses[..period].iter().sum::<f64>() / period as f64;
    result[period] = rsi_from_averages(avg_gain, avg_loss);

    for i in period..gains.len() {
        avg_gain = (avg_gain * (period - 1) as f64 + gains[i]) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + losses[i]) / period as f64;
        result[i + 1] = rsi_from_averages(avg_gain, avg_loss);
    }

    result
}

/// RSI using plain rolling means of gains and losses instead of Wilder smoothing.
pub fn rolling_rsi(data: &[f64], period: usize) -> Vec<f64> {
    let mut result = nan_series(data.len());
    if period == 0 || data.len() < period + 1 {
        return result;
    }
    for i in period..data.len() {
        let mut gain = 0.0;
        let mut loss = 0.0;
        for j in i + 1 - period..=i {
            let change = data[j] - data[j - 1];
            if change > 0.0 {
                gain += change;
            } else {
                loss -= change;
            }
        }
        result[i] = rsi_from_averages(gain / period as f64, loss / period as f64);
    }
    result
}

/// MACD (Moving Average Convergence Divergence)
#[derive(Debug, Clone)]
pub struct MacdResult {
    pub macd_line: Vec<f64>,
    pub signal_line: Vec<f64>,
    pub histogram: Vec<f64>,
}

pub fn macd(data: &[f64], fast_period: usize, slow_period: usize, signal_period: usize) -> MacdResult {
    let len = data.len();
    if fast_period == 0 || signal_period == 0 || slow_period < fast_period {
        return MacdResult {
            macd_line: nan_series(len),
            signal_line: nan_series(len),
            histogram: nan_series(len),
        };
    }

    let ema_fast = ema(data, fast_period);
    let ema_slow = ema(data, slow_period);
    let macd_line: Vec<f64> = ema_fast.iter().zip(&ema_slow).map(|(f, s)| f - s).collect();
    let signal_line = ema(&macd_line, signal_period);
    let histogram = macd_line.iter().zip(&signal_line).map(|(m, s)| m - s).collect();

    MacdResult {
        macd_line,
        signal_line,
        histogram,
    }
}

/// True range; the first bar uses its own high-low span.
pub fn true_range(candles: &[Candle]) -> Vec<f64> {
    candles
        .iter()
        .enumerate()
        .map(|(i, c)| {
            if i == 0 {
                c.high - c.low
            } else {
                let prev_close = candles[i - 1].close;
                (c.high - c.low)
                    .max((c.high - prev_close).abs())
                    .max((c.low - prev_close).abs())
            }
        })
        .collect()
}

/// Wilder running average seeded with the mean of the first `period` values.
fn wilder_average(data: &[f64], period: usize) -> Vec<f64> {
    let mut result = nan_series(data.len());
    let Some(start) = first_finite_run(data, period) else {
        return result;
    };
    let seed_idx = start + period - 1;
    let mut prev = data[start..=seed_idx].iter().sum::<f64>() / period as f64;
    result[seed_idx] = prev;
    for i in seed_idx + 1..data.len() {
        prev = (prev * (period - 1) as f64 + data[i]) / period as f64;
        result[i] = prev;
    }
    result
}

/// Average True Range (Wilder)
pub fn atr(candles: &[Candle], period: usize) -> Vec<f64> {
    wilder_average(&true_range(candles), period)
}

/// Bollinger Bands
#[derive(Debug, Clone)]
pub struct BollingerBands {
    pub upper: Vec<f64>,
    pub middle: Vec<f64>,
    pub lower: Vec<f64>,
}

impl BollingerBands {
    /// (upper - lower) / middle per bar
    pub fn width(&self) -> Vec<f64> {
        (0..self.middle.len())
            .map(|i| {
                if self.middle[i] == 0.0 {
                    f64::NAN
                } else {
                    (self.upper[i] - self.lower[i]) / self.middle[i]
                }
            })
            .collect()
    }
}

/// Bollinger Bands using the sample standard deviation of each window.
pub fn bollinger_bands(data: &[f64], period: usize, std_dev_multiplier: f64) -> BollingerBands {
    let middle = sma(data, period);
    let mut upper = nan_series(data.len());
    let mut lower = nan_series(data.len());

    if period >= 2 {
        for i in period - 1..data.len() {
            let window = &data[i + 1 - period..=i];
            let std = analysis_core::stats::std_dev(window);
            upper[i] = middle[i] + std_dev_multiplier * std;
            lower[i] = middle[i] - std_dev_multiplier * std;
        }
    }

    BollingerBands {
        upper,
        middle,
        lower,
    }
}

/// Keltner Channels
#[derive(Debug, Clone)]
pub struct KeltnerChannels {
    pub upper: Vec<f64>,
    pub middle: Vec<f64>,
    pub lower: Vec<f64>,
}

/// EMA of close with bands at `multiplier` ATRs.
pub fn keltner_channels(
    candles: &[Candle],
    ema_period: usize,
    atr_period: usize,
    multiplier: f64,
) -> KeltnerChannels {
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let middle = ema(&closes, ema_period);
    let atr_values = atr(candles, atr_period);
    let upper = middle
        .iter()
        .zip(&atr_values)
        .map(|(m, a)| m + multiplier * a)
        .collect();
    let lower = middle
        .iter()
        .zip(&atr_values)
        .map(|(m, a)| m - multiplier * a)
        .collect();
    KeltnerChannels {
        upper,
        middle,
        lower,
    }
}

/// 1.0 where the Bollinger Bands sit inside the Keltner Channels, else 0.0.
pub fn squeeze(bb: &BollingerBands, kc: &KeltnerChannels) -> Vec<f64> {
    (0..bb.upper.len())
        .map(|i| {
            if bb.upper[i] < kc.upper[i] && bb.lower[i] > kc.lower[i] {
                1.0
            } else {
                0.0
            }
        })
        .collect()
}

/// Stochastic oscillator (%K slowed, %D)
#[derive(Debug, Clone)]
pub struct StochasticResult {
    pub k: Vec<f64>,
    pub d: Vec<f64>,
}

/// Slow stochastic: raw %K over `k_period`, smoothed by `k_smooth`, %D over `d_period`.
pub fn stochastic(candles: &[Candle], k_period: usize, k_smooth: usize, d_period: usize) -> StochasticResult {
    let highs: Vec<f64> = candles.iter().map(|c| c.high).collect();
    let lows: Vec<f64> = candles.iter().map(|c| c.low).collect();
    let hh = rolling_max(&highs, k_period);
    let ll = rolling_min(&lows, k_period);

    let raw_k: Vec<f64> = candles
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let range = hh[i] - ll[i];
            if !range.is_finite() {
                f64::NAN
            } else if range == 0.0 {
                50.0
            } else {
                100.0 * (c.close - ll[i]) / range
            }
        })
        .collect();

    let k = smooth_defined(&raw_k, k_smooth);
    let d = smooth_defined(&k, d_period);
    StochasticResult { k, d }
}

/// SMA over a series with a NaN warm-up, starting once a full defined window exists.
fn smooth_defined(data: &[f64], period: usize) -> Vec<f64> {
    let mut result = nan_series(data.len());
    if period == 0 {
        return result;
    }
    for i in 0..data.len() {
        if i + 1 >= period {
            let window = &data[i + 1 - period..=i];
            if window.iter().all(|v| v.is_finite()) {
                result[i] = window.iter().sum::<f64>() / period as f64;
            }
        }
    }
    result
}

/// ADX (Average Directional Index) with the directional indicators
#[derive(Debug, Clone)]
pub struct AdxResult {
    pub adx: Vec<f64>,
    pub plus_di: Vec<f64>,
    pub minus_di: Vec<f64>,
}

/// Wilder ADX. DI values start at index `period`, ADX at `2 * period - 1`.
pub fn adx(candles: &[Candle], period: usize) -> AdxResult {
    let len = candles.len();
    let mut adx_values = nan_series(len);
    let mut plus_di = nan_series(len);
    let mut minus_di = nan_series(len);

    if period == 0 || len < period + 1 {
        return AdxResult {
            adx: adx_values,
            plus_di,
            minus_di,
        };
    }

    let tr = true_range(candles);
    let mut plus_dm = vec![0.0; len];
    let mut minus_dm = vec![0.0; len];
    for i in 1..len {
        let up_move = candles[i].high - candles[i - 1].high;
        let down_move = candles[i - 1].low - candles[i].low;
        if up_move > down_move && up_move > 0.0 {
            plus_dm[i] = up_move;
        }
        if down_move > up_move && down_move > 0.0 {
            minus_dm[i] = down_move;
        }
    }

    let mut s_tr: f64 = tr[1..=period].iter().sum();
    let mut s_plus: f64 = plus_dm[1..=period].iter().sum();
    let mut s_minus: f64 = minus_dm[1..=period].iter().sum();

    let mut dx = nan_series(len);
    for i in period..len {
        if i > period {
            s_tr = s_tr - s_tr / period as f64 + tr[i];
            s_plus = s_plus - s_plus / period as f64 + plus_dm[i];
            s_minus = s_minus - s_minus / period as f64 + minus_dm[i];
        }
        let (pdi, mdi) = if s_tr > 0.0 {
            (100.0 * s_plus / s_tr, 100.0 * s_minus / s_tr)
        } else {
            (0.0, 0.0)
        };
        plus_di[i] = pdi;
        minus_di[i] = mdi;
        let di_sum = pdi + mdi;
        dx[i] = if di_sum > 0.0 {
            100.0 * (pdi - mdi).abs() / di_sum
        } else {
            0.0
        };
    }

    let adx_start = 2 * period - 1;
    if len > adx_start {
        let mut prev = dx[period..=adx_start].iter().sum::<f64>() / period as f64;
        adx_values[adx_start] = prev;
        for i in adx_start + 1..len {
            prev = (prev * (period - 1) as f64 + dx[i]) / period as f64;
            adx_values[i] = prev;
        }
    }

    AdxResult {
        adx: adx_values,
        plus_di,
        minus_di,
    }
}

/// How VWAP decides where one trading session ends and the next begins
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionGrouping {
    /// Group by local calendar date at the given UTC offset.
    Calendar { utc_offset_secs: i32 },
    /// Group by fixed blocks of bars.
    FixedBars(usize),
}

/// Calendar grouping when every timestamp is a real epoch time, otherwise fixed blocks.
pub fn resolve_session_grouping(candles: &[Candle], utc_offset_secs: i32, fallback_group: usize) -> SessionGrouping {
    if !candles.is_empty() && candles.iter().all(|c| c.timestamp > 0) {
        SessionGrouping::Calendar { utc_offset_secs }
    } else {
        SessionGrouping::FixedBars(fallback_group.max(1))
    }
}

/// Session id per bar under the given grouping.
pub fn session_ids(candles: &[Candle], grouping: SessionGrouping) -> Vec<i64> {
    candles
        .iter()
        .enumerate()
        .map(|(i, c)| match grouping {
            SessionGrouping::Calendar { utc_offset_secs } => {
                (c.timestamp + utc_offset_secs as i64).div_euclid(86_400)
            }
            SessionGrouping::FixedBars(n) => (i / n.max(1)) as i64,
        })
        .collect()
}

/// Volume Weighted Average Price, reset at every session boundary.
///
/// A session with no traded volume so far (index candles) degrades to the
/// running mean of typical price.
pub fn vwap(candles: &[Candle], grouping: SessionGrouping) -> Vec<f64> {
    let sessions = session_ids(candles, grouping);
    let mut result = Vec::with_capacity(candles.len());

    let mut current: Option<i64> = None;
    let mut cum_pv = 0.0;
    let mut cum_vol = 0.0;
    let mut cum_tp = 0.0;
    let mut count = 0usize;

    for (c, &session) in candles.iter().zip(&sessions) {
        if current != Some(session) {
            current = Some(session);
            cum_pv = 0.0;
            cum_vol = 0.0;
            cum_tp = 0.0;
            count = 0;
        }
        let tp = c.typical_price();
        cum_pv += tp * c.volume;
        cum_vol += c.volume;
        cum_tp += tp;
        count += 1;

        if cum_vol > 0.0 {
            result.push(cum_pv / cum_vol);
        } else {
            result.push(cum_tp / count as f64);
        }
    }
    result
}

/// On-Balance Volume
pub fn obv(candles: &[Candle]) -> Vec<f64> {
    let mut result = Vec::with_capacity(candles.len());
    let mut running = 0.0;
    for (i, c) in candles.iter().enumerate() {
        if i == 0 {
            running = c.volume;
        } else if c.close > candles[i - 1].close {
            running += c.volume;
        } else if c.close < candles[i - 1].close {
            running -= c.volume;
        }
        result.push(running);
    }
    result
}

/// Money Flow Index. First value at index `period`.
pub fn mfi(candles: &[Candle], period: usize) -> Vec<f64> {
    let mut result = nan_series(candles.len());
    if period == 0 || candles.len() < period + 1 {
        return result;
    }
    let tp: Vec<f64> = candles.iter().map(|c| c.typical_price()).collect();

    for i in period..candles.len() {
        let mut positive = 0.0;
        let mut negative = 0.0;
        for j in i + 1 - period..=i {
            let flow = tp[j] * candles[j].volume;
            if tp[j] > tp[j - 1] {
                positive += flow;
            } else if tp[j] < tp[j - 1] {
                negative += flow;
            }
        }
        result[i] = if negative == 0.0 {
            if positive == 0.0 {
                50.0
            } else {
                100.0
            }
        } else {
            100.0 - 100.0 / (1.0 + positive / negative)
        };
    }
    result
}

/// Commodity Channel Index
pub fn cci(candles: &[Candle], period: usize) -> Vec<f64> {
    let tp: Vec<f64> = candles.iter().map(|c| c.typical_price()).collect();
    let tp_sma = sma(&tp, period);
    let mut result = nan_series(candles.len());
    if period == 0 || candles.len() < period {
        return result;
    }
    for i in period - 1..candles.len() {
        let mean = tp_sma[i];
        let mean_dev = tp[i + 1 - period..=i]
            .iter()
            .map(|v| (v - mean).abs())
            .sum::<f64>()
            / period as f64;
        result[i] = if mean_dev == 0.0 {
            0.0
        } else {
            (tp[i] - mean) / (0.015 * mean_dev)
        };
    }
    result
}

/// Williams %R, in [-100, 0]
pub fn williams_r(candles: &[Candle], period: usize) -> Vec<f64> {
    let highs: Vec<f64> = candles.iter().map(|c| c.high).collect();
    let lows: Vec<f64> = candles.iter().map(|c| c.low).collect();
    let hh = rolling_max(&highs, period);
    let ll = rolling_min(&lows, period);
    candles
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let range = hh[i] - ll[i];
            if !range.is_finite() {
                f64::NAN
            } else if range == 0.0 {
                -50.0
            } else {
                -100.0 * (hh[i] - c.close) / range
            }
        })
        .collect()
}

fn money_flow_volume(c: &Candle) -> f64 {
    let range = c.high - c.low;
    if range == 0.0 {
        return 0.0;
    }
    ((c.close - c.low) - (c.high - c.close)) / range * c.volume
}

/// Accumulation/Distribution Line
pub fn adl(candles: &[Candle]) -> Vec<f64> {
    let mut running = 0.0;
    candles
        .iter()
        .map(|c| {
            running += money_flow_volume(c);
            running
        })
        .collect()
}

/// Chaikin Money Flow
pub fn cmf(candles: &[Candle], period: usize) -> Vec<f64> {
    let mut result = nan_series(candles.len());
    if period == 0 || candles.len() < period {
        return result;
    }
    for i in period - 1..candles.len() {
        let window = &candles[i + 1 - period..=i];
        let volume: f64 = window.iter().map(|c| c.volume).sum();
        let flow: f64 = window.iter().map(money_flow_volume).sum();
        result[i] = if volume == 0.0 { 0.0 } else { flow / volume };
    }
    result
}

/// Heikin-Ashi candles
#[derive(Debug, Clone)]
pub struct HeikinAshi {
    pub open: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
}

pub fn heikin_ashi(candles: &[Candle]) -> HeikinAshi {
    let n = candles.len();
    let mut ha = HeikinAshi {
        open: Vec::with_capacity(n),
        high: Vec::with_capacity(n),
        low: Vec::with_capacity(n),
        close: Vec::with_capacity(n),
    };

    for (i, c) in candles.iter().enumerate() {
        let close = (c.open + c.high + c.low + c.close) / 4.0;
        let open = if i == 0 {
            (c.open + c.close) / 2.0
        } else {
            (ha.open[i - 1] + ha.close[i - 1]) / 2.0
        };
        ha.high.push(c.high.max(open).max(close));
        ha.low.push(c.low.min(open).min(close));
        ha.open.push(open);
        ha.close.push(close);
    }
    ha
}

/// Ichimoku cloud lines
#[derive(Debug, Clone)]
pub struct IchimokuCloud {
    pub conversion: Vec<f64>,
    pub base: Vec<f64>,
    /// Leading span A, already shifted forward by the displacement.
    pub span_a: Vec<f64>,
    /// Leading span B, already shifted forward by the displacement.
    pub span_b: Vec<f64>,
    /// Close shifted back by the displacement.
    pub lagging: Vec<f64>,
}

fn midpoint_channel(highs: &[f64], lows: &[f64], period: usize) -> Vec<f64> {
    let hh = rolling_max(highs, period);
    let ll = rolling_min(lows, period);
    hh.iter().zip(&ll).map(|(h, l)| (h + l) / 2.0).collect()
}

fn shift_forward(data: &[f64], by: usize) -> Vec<f64> {
    let mut result = nan_series(data.len());
    for i in by..data.len() {
        result[i] = data[i - by];
    }
    result
}

pub fn ichimoku_cloud(
    candles: &[Candle],
    conversion_period: usize,
    base_period: usize,
    span_b_period: usize,
    displacement: usize,
) -> IchimokuCloud {
    let highs: Vec<f64> = candles.iter().map(|c| c.high).collect();
    let lows: Vec<f64> = candles.iter().map(|c| c.low).collect();

    let conversion = midpoint_channel(&highs, &lows, conversion_period);
    let base = midpoint_channel(&highs, &lows, base_period);
    let span_a_raw: Vec<f64> = conversion.iter().zip(&base).map(|(c, b)| (c + b) / 2.0).collect();
    let span_b_raw = midpoint_channel(&highs, &lows, span_b_period);

    let mut lagging = nan_series(candles.len());
    for i in 0..candles.len().saturating_sub(displacement) {
        lagging[i] = candles[i + displacement].close;
    }

    IchimokuCloud {
        conversion,
        base,
        span_a: shift_forward(&span_a_raw, displacement),
        span_b: shift_forward(&span_b_raw, displacement),
        lagging,
    }
}

/// Fisher transform of the median price over `period` bars.
///
/// Windows with no price range are undefined.
pub fn fisher_transform(candles: &[Candle], period: usize) -> Vec<f64> {
    let median: Vec<f64> = candles.iter().map(|c| (c.high + c.low) / 2.0).collect();
    let hh = rolling_max(&median, period);
    let ll = rolling_min(&median, period);

    median
        .iter()
        .enumerate()
        .map(|(i, &m)| {
            let range = hh[i] - ll[i];
            if !range.is_finite() || range == 0.0 {
                return f64::NAN;
            }
            let value = (2.0 * ((m - ll[i]) / range - 0.5)).clamp(-0.999, 0.999);
            0.5 * ((1.0 + value) / (1.0 - value)).ln()
        })
        .collect()
}
