//! Geometric chart patterns over a trailing window.
//!
//! Pivots come from prominence-filtered extrema of highs (peaks) and lows
//! (troughs). Trendlines are least-squares fits through pivot sequences and a
//! pattern is only confirmed when each of its lines is touched at least
//! `min_touches` times within `touch_tolerance` of the line's value and no
//! close before its last pivot breaks through it.

use analysis_core::stats::linear_fit;
use analysis_core::Candle;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartPatternConfig {
    /// Trailing bars examined
    pub window: usize,
    /// Minimum pivot prominence as a fraction of the examined price range
    pub prominence_ratio: f64,
    /// Touch band as a fraction of the line value
    pub touch_tolerance: f64,
    pub min_touches: usize,
    /// Per-bar slope (fraction of mean price) below which a line counts as flat
    pub flat_slope: f64,
    /// Relative slope difference below which two lines count as parallel
    pub parallel_tolerance: f64,
    /// Height difference allowed between matching peaks (double tops, shoulders)
    pub level_tolerance: f64,
    /// Minimum depth of the swing between matching peaks, as a fraction of price
    pub min_swing: f64,
    /// Minimum bars between the two peaks of a double top/bottom
    pub min_peak_separation: usize,
    /// Bars forming the flag/pennant pole
    pub pole_bars: usize,
    /// Minimum pole move as a fraction of the starting close
    pub pole_min_move: f64,
    /// Consolidation range allowed relative to the pole height
    pub max_consolidation_ratio: f64,
}

impl Default for ChartPatternConfig {
    fn default() -> Self {
        Self {
            window: 20,
            prominence_ratio: 0.1,
            touch_tolerance: 0.0075,
            min_touches: 2,
            flat_slope: 0.0005,
            parallel_tolerance: 0.35,
            level_tolerance: 0.015,
            min_swing: 0.01,
            min_peak_separation: 4,
            pole_bars: 7,
            pole_min_move: 0.03,
            max_consolidation_ratio: 0.6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartPatternKind {
    DoubleTop,
    DoubleBottom,
    HeadAndShoulders,
    InverseHeadAndShoulders,
    AscendingTriangle,
    DescendingTriangle,
    SymmetricalTriangle,
    AscendingChannel,
    DescendingChannel,
    HorizontalChannel,
    RisingWedge,
    FallingWedge,
    BullFlag,
    BearFlag,
    BullPennant,
    BearPennant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternDirection {
    Bullish,
    Bearish,
    Neutral,
}

impl ChartPatternKind {
    pub fn direction(&self) -> PatternDirection {
        use ChartPatternKind::*;
        match self {
            DoubleBottom | InverseHeadAndShoulders | AscendingTriangle | AscendingChannel
            | FallingWedge | BullFlag | BullPennant => PatternDirection::Bullish,
            DoubleTop | HeadAndShoulders | DescendingTriangle | DescendingChannel | RisingWedge
            | BearFlag | BearPennant => PatternDirection::Bearish,
            SymmetricalTriangle | HorizontalChannel => PatternDirection::Neutral,
        }
    }

    pub fn title(&self) -> &'static str {
        use ChartPatternKind::*;
        match self {
            DoubleTop => "Double Top",
            DoubleBottom => "Double Bottom",
            HeadAndShoulders => "Head And Shoulders",
            InverseHeadAndShoulders => "Inverse Head And Shoulders",
            AscendingTriangle => "Ascending Triangle",
            DescendingTriangle => "Descending Triangle",
            SymmetricalTriangle => "Symmetrical Triangle",
            AscendingChannel => "Ascending Channel",
            DescendingChannel => "Descending Channel",
            HorizontalChannel => "Horizontal Channel",
            RisingWedge => "Rising Wedge",
            FallingWedge => "Falling Wedge",
            BullFlag => "Bull Flag",
            BearFlag => "Bear Flag",
            BullPennant => "Bull Pennant",
            BearPennant => "Bear Pennant",
        }
    }
}

/// Straight line over absolute bar indices
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trendline {
    pub slope: f64,
    pub intercept: f64,
    pub touches: usize,
}

impl Trendline {
    pub fn value_at(&self, index: usize) -> f64 {
        self.slope * index as f64 + self.intercept
    }

    fn fit(points: &[(usize, f64)]) -> Self {
        let xy: Vec<(f64, f64)> = points.iter().map(|&(i, p)| (i as f64, p)).collect();
        let (slope, intercept) = linear_fit(&xy);
        Self {
            slope,
            intercept,
            touches: 0,
        }
    }

    fn horizontal(level: f64) -> Self {
        Self {
            slope: 0.0,
            intercept: level,
            touches: 0,
        }
    }

    fn through(a: (usize, f64), b: (usize, f64)) -> Self {
        if a.0 == b.0 {
            return Self::horizontal((a.1 + b.1) / 2.0);
        }
        let slope = (b.1 - a.1) / (b.0 as f64 - a.0 as f64);
        Self {
            slope,
            intercept: a.1 - slope * a.0 as f64,
            touches: 0,
        }
    }

    /// Points whose price sits within `tolerance` (fraction of the line value) of the line.
    fn count_touches(&self, points: &[(usize, f64)], tolerance: f64) -> usize {
        points
            .iter()
            .filter(|&&(i, p)| {
                let expected = self.value_at(i);
                expected != 0.0 && ((p - expected) / expected).abs() <= tolerance
            })
            .count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeyPoint {
    pub index: usize,
    pub price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartPattern {
    pub kind: ChartPatternKind,
    pub direction: PatternDirection,
    pub start_index: usize,
    pub end_index: usize,
    pub confidence: f64,
    pub key_points: Vec<KeyPoint>,
    pub upper_line: Option<Trendline>,
    pub lower_line: Option<Trendline>,
    pub price_target: Option<f64>,
}

impl ChartPattern {
    pub fn label(&self) -> String {
        format!("{} ({:.2})", self.kind.title(), self.confidence)
    }
}

/// Local maxima whose prominence is at least `min_prominence`.
///
/// Prominence is the height above the higher of the two lowest points reached
/// before the series climbs above the candidate on each side.
pub fn find_peaks(values: &[f64], min_prominence: f64) -> Vec<usize> {
    let n = values.len();
    let mut peaks = Vec::new();
    if n < 3 {
        return peaks;
    }

    for i in 1..n - 1 {
        if !(values[i] > values[i - 1] && values[i] >= values[i + 1]) {
            continue;
        }
        let height = values[i];

        let mut left_min = height;
        for j in (0..i).rev() {
            if values[j] > height {
                break;
            }
            left_min = left_min.min(values[j]);
        }
        let mut right_min = height;
        for &v in &values[i + 1..] {
            if v > height {
                break;
            }
            right_min = right_min.min(v);
        }

        if height - left_min.max(right_min) >= min_prominence {
            peaks.push(i);
        }
    }
    peaks
}

/// Local minima with at least `min_prominence` depth.
pub fn find_troughs(values: &[f64], min_prominence: f64) -> Vec<usize> {
    let negated: Vec<f64> = values.iter().map(|v| -v).collect();
    find_peaks(&negated, min_prominence)
}

struct Window<'a> {
    candles: &'a [Candle],
    offset: usize,
    highs: Vec<f64>,
    lows: Vec<f64>,
    mean_price: f64,
}

impl<'a> Window<'a> {
    fn new(candles: &'a [Candle], offset: usize) -> Self {
        let slice = &candles[offset..];
        let highs: Vec<f64> = slice.iter().map(|c| c.high).collect();
        let lows: Vec<f64> = slice.iter().map(|c| c.low).collect();
        let mean_price = slice.iter().map(|c| c.close).sum::<f64>() / slice.len().max(1) as f64;
        Self {
            candles,
            offset,
            highs,
            lows,
            mean_price,
        }
    }

    fn range(&self) -> f64 {
        let hi = self.highs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let lo = self.lows.iter().copied().fold(f64::INFINITY, f64::min);
        hi - lo
    }

    fn last_close(&self) -> f64 {
        self.candles[self.candles.len() - 1].close
    }

    fn end_index(&self) -> usize {
        self.candles.len() - 1
    }

    /// Pivots as absolute `(index, price)` pairs.
    fn pivots(&self, ratio: f64) -> (Vec<(usize, f64)>, Vec<(usize, f64)>) {
        let min_prominence = ratio * self.range();
        let peaks = find_peaks(&self.highs, min_prominence)
            .into_iter()
            .map(|i| (i + self.offset, self.highs[i]))
            .collect();
        let troughs = find_troughs(&self.lows, min_prominence)
            .into_iter()
            .map(|i| (i + self.offset, self.lows[i]))
            .collect();
        (peaks, troughs)
    }

    fn highs_abs(&self, from: usize, to: usize) -> Vec<(usize, f64)> {
        (from..=to).map(|i| (i, self.candles[i].high)).collect()
    }

    fn lows_abs(&self, from: usize, to: usize) -> Vec<(usize, f64)> {
        (from..=to).map(|i| (i, self.candles[i].low)).collect()
    }

    /// Whether a close in `from..=to` lies beyond `line` by more than `tolerance`.
    fn closes_break(&self, line: &Trendline, from: usize, to: usize, upper: bool, tolerance: f64) -> bool {
        (from..=to).any(|i| {
            let close = self.candles[i].close;
            let expected = line.value_at(i);
            if upper {
                close > expected * (1.0 + tolerance)
            } else {
                close < expected * (1.0 - tolerance)
            }
        })
    }

    fn normalized(&self, slope: f64) -> f64 {
        if self.mean_price == 0.0 {
            0.0
        } else {
            slope / self.mean_price
        }
    }
}

/// Least-squares boundary through `pivots`, touched by bar highs (upper) or lows
/// from `from` to the window end and never broken by a close up to `last_pivot`.
fn boundary(
    w: &Window,
    pivots: &[(usize, f64)],
    from: usize,
    last_pivot: usize,
    upper: bool,
    config: &ChartPatternConfig,
) -> Option<Trendline> {
    let mut line = Trendline::fit(pivots);
    let bars = if upper {
        w.highs_abs(from, w.end_index())
    } else {
        w.lows_abs(from, w.end_index())
    };
    line.touches = line.count_touches(&bars, config.touch_tolerance);
    if line.touches < config.min_touches
        || w.closes_break(&line, from, last_pivot, upper, config.touch_tolerance)
    {
        return None;
    }
    Some(line)
}

fn touch_bonus(line: &Trendline, min_touches: usize) -> f64 {
    0.05 * line.touches.saturating_sub(min_touches) as f64
}

/// Detect chart patterns in the trailing `config.window` bars.
///
/// Shorter series report nothing.
pub fn detect_chart_patterns(candles: &[Candle], config: &ChartPatternConfig) -> Vec<ChartPattern> {
    let mut found = Vec::new();
    if config.window < 5 || candles.len() < config.window {
        return found;
    }

    let window = Window::new(candles, candles.len() - config.window);
    if window.range() <= 0.0 {
        return found;
    }
    let (peaks, troughs) = window.pivots(config.prominence_ratio);

    found.extend(double_top(&window, &peaks, &troughs, config));
    found.extend(double_bottom(&window, &peaks, &troughs, config));
    found.extend(head_and_shoulders(&window, &peaks, &troughs, config));
    found.extend(inverse_head_and_shoulders(&window, &peaks, &troughs, config));
    found.extend(trendline_pattern(&window, &peaks, &troughs, config));
    found.extend(flag_or_pennant(&window, config));

    found
}

fn double_top(
    w: &Window,
    peaks: &[(usize, f64)],
    troughs: &[(usize, f64)],
    config: &ChartPatternConfig,
) -> Option<ChartPattern> {
    let [.., first, second] = peaks else {
        return None;
    };
    let (first, second) = (*first, *second);
    if second.0 - first.0 < config.min_peak_separation {
        return None;
    }
    let level = (first.1 + second.1) / 2.0;
    if (first.1 - second.1).abs() / first.1.max(second.1) > config.level_tolerance {
        return None;
    }

    let neckline = troughs
        .iter()
        .filter(|t| t.0 > first.0 && t.0 < second.0)
        .map(|t| t.1)
        .fold(f64::INFINITY, f64::min);
    let neckline = if neckline.is_finite() {
        neckline
    } else {
        w.lows_abs(first.0, second.0)
            .iter()
            .map(|p| p.1)
            .fold(f64::INFINITY, f64::min)
    };
    if (level - neckline) / level < config.min_swing {
        return None;
    }
    // Price must have retreated at least halfway back toward the neckline.
    let close = w.last_close();
    if close > level - 0.5 * (level - neckline) {
        return None;
    }

    let mut resistance = Trendline::horizontal(level);
    resistance.touches =
        resistance.count_touches(&w.highs_abs(first.0, w.end_index()), config.touch_tolerance);
    if resistance.touches < config.min_touches {
        return None;
    }

    let mut confidence = 0.65 + touch_bonus(&resistance, config.min_touches);
    if close < neckline {
        confidence += 0.1;
    }
    confidence += 0.1 * (1.0 - (first.1 - second.1).abs() / first.1.max(second.1) / config.level_tolerance);

    Some(ChartPattern {
        kind: ChartPatternKind::DoubleTop,
        direction: PatternDirection::Bearish,
        start_index: first.0,
        end_index: w.end_index(),
        confidence: confidence.min(0.95),
        key_points: vec![
            KeyPoint { index: first.0, price: first.1 },
            KeyPoint { index: second.0, price: second.1 },
        ],
        upper_line: Some(resistance),
        lower_line: Some(Trendline::horizontal(neckline)),
        price_target: Some(neckline - (level - neckline)),
    })
}

fn double_bottom(
    w: &Window,
    peaks: &[(usize, f64)],
    troughs: &[(usize, f64)],
    config: &ChartPatternConfig,
) -> Option<ChartPattern> {
    let [.., first, second] = troughs else {
        return None;
    };
    let (first, second) = (*first, *second);
    if second.0 - first.0 < config.min_peak_separation {
        return None;
    }
    let level = (first.1 + second.1) / 2.0;
    if (first.1 - second.1).abs() / first.1.min(second.1) > config.level_tolerance {
        return None;
    }

    let neckline = peaks
        .iter()
        .filter(|p| p.0 > first.0 && p.0 < second.0)
        .map(|p| p.1)
        .fold(f64::NEG_INFINITY, f64::max);
    let neckline = if neckline.is_finite() {
        neckline
    } else {
        w.highs_abs(first.0, second.0)
            .iter()
            .map(|p| p.1)
            .fold(f64::NEG_INFINITY, f64::max)
    };
    if (neckline - level) / level < config.min_swing {
        return None;
    }
    let close = w.last_close();
    if close < level + 0.5 * (neckline - level) {
        return None;
    }

    let mut support = Trendline::horizontal(level);
    support.touches = support.count_touches(&w.lows_abs(first.0, w.end_index()), config.touch_tolerance);
    if support.touches < config.min_touches {
        return None;
    }

    let mut confidence = 0.65 + touch_bonus(&support, config.min_touches);
    if close > neckline {
        confidence += 0.1;
    }
    confidence += 0.1 * (1.0 - (first.1 - second.1).abs() / first.1.min(second.1) / config.level_tolerance);

    Some(ChartPattern {
        kind: ChartPatternKind::DoubleBottom,
        direction: PatternDirection::Bullish,
        start_index: first.0,
        end_index: w.end_index(),
        confidence: confidence.min(0.95),
        key_points: vec![
            KeyPoint { index: first.0, price: first.1 },
            KeyPoint { index: second.0, price: second.1 },
        ],
        upper_line: Some(Trendline::horizontal(neckline)),
        lower_line: Some(support),
        price_target: Some(neckline + (neckline - level)),
    })
}

fn lowest_between(points: &[(usize, f64)], from: usize, to: usize) -> Option<(usize, f64)> {
    points
        .iter()
        .filter(|p| p.0 > from && p.0 < to)
        .copied()
        .min_by(|a, b| a.1.total_cmp(&b.1))
}

fn highest_between(points: &[(usize, f64)], from: usize, to: usize) -> Option<(usize, f64)> {
    points
        .iter()
        .filter(|p| p.0 > from && p.0 < to)
        .copied()
        .max_by(|a, b| a.1.total_cmp(&b.1))
}

fn head_and_shoulders(
    w: &Window,
    peaks: &[(usize, f64)],
    troughs: &[(usize, f64)],
    config: &ChartPatternConfig,
) -> Option<ChartPattern> {
    let [.., left, head, right] = peaks else {
        return None;
    };
    let (left, head, right) = (*left, *head, *right);
    let shoulder_max = left.1.max(right.1);
    if head.1 <= shoulder_max || (head.1 - shoulder_max) / head.1 < config.min_swing {
        return None;
    }
    if (left.1 - right.1).abs() / shoulder_max > config.level_tolerance * 2.0 {
        return None;
    }

    let t1 = lowest_between(troughs, left.0, head.0)?;
    let t2 = lowest_between(troughs, head.0, right.0)?;
    let mut neckline = Trendline::through(t1, t2);
    neckline.touches = neckline.count_touches(&w.lows_abs(left.0, w.end_index()), config.touch_tolerance);
    if neckline.touches < config.min_touches {
        return None;
    }

    let close = w.last_close();
    let neck_now = neckline.value_at(w.end_index());
    let shoulder_height = (left.1 + right.1) / 2.0 - neck_now;
    if close > neck_now + 0.5 * shoulder_height {
        return None;
    }

    let mut confidence = 0.7 + touch_bonus(&neckline, config.min_touches);
    if close < neck_now {
        confidence += 0.1;
    }
    let head_height = head.1 - neckline.value_at(head.0);

    Some(ChartPattern {
        kind: ChartPatternKind::HeadAndShoulders,
        direction: PatternDirection::Bearish,
        start_index: left.0,
        end_index: w.end_index(),
        confidence: confidence.min(0.95),
        key_points: vec![
            KeyPoint { index: left.0, price: left.1 },
            KeyPoint { index: head.0, price: head.1 },
            KeyPoint { index: right.0, price: right.1 },
            KeyPoint { index: t1.0, price: t1.1 },
            KeyPoint { index: t2.0, price: t2.1 },
        ],
        upper_line: None,
        lower_line: Some(neckline),
        price_target: Some(neck_now - head_height),
    })
}

fn inverse_head_and_shoulders(
    w: &Window,
    peaks: &[(usize, f64)],
    troughs: &[(usize, f64)],
    config: &ChartPatternConfig,
) -> Option<ChartPattern> {
    let [.., left, head, right] = troughs else {
        return None;
    };
    let (left, head, right) = (*left, *head, *right);
    let shoulder_min = left.1.min(right.1);
    if head.1 >= shoulder_min || (shoulder_min - head.1) / shoulder_min < config.min_swing {
        return None;
    }
    if (left.1 - right.1).abs() / shoulder_min > config.level_tolerance * 2.0 {
        return None;
    }

    let p1 = highest_between(peaks, left.0, head.0)?;
    let p2 = highest_between(peaks, head.0, right.0)?;
    let mut neckline = Trendline::through(p1, p2);
    neckline.touches = neckline.count_touches(&w.highs_abs(left.0, w.end_index()), config.touch_tolerance);
    if neckline.touches < config.min_touches {
        return None;
    }

    let close = w.last_close();
    let neck_now = neckline.value_at(w.end_index());
    let shoulder_depth = neck_now - (left.1 + right.1) / 2.0;
    if close < neck_now - 0.5 * shoulder_depth {
        return None;
    }

    let mut confidence = 0.7 + touch_bonus(&neckline, config.min_touches);
    if close > neck_now {
        confidence += 0.1;
    }
    let head_depth = neckline.value_at(head.0) - head.1;

    Some(ChartPattern {
        kind: ChartPatternKind::InverseHeadAndShoulders,
        direction: PatternDirection::Bullish,
        start_index: left.0,
        end_index: w.end_index(),
        confidence: confidence.min(0.95),
        key_points: vec![
            KeyPoint { index: left.0, price: left.1 },
            KeyPoint { index: head.0, price: head.1 },
            KeyPoint { index: right.0, price: right.1 },
            KeyPoint { index: p1.0, price: p1.1 },
            KeyPoint { index: p2.0, price: p2.1 },
        ],
        upper_line: Some(neckline),
        lower_line: None,
        price_target: Some(neck_now + head_depth),
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Slope {
    Rising,
    Flat,
    Falling,
}

fn slope_class(normalized: f64, flat: f64) -> Slope {
    if normalized > flat {
        Slope::Rising
    } else if normalized < -flat {
        Slope::Falling
    } else {
        Slope::Flat
    }
}

fn is_parallel(a: f64, b: f64, tolerance: f64) -> bool {
    let scale = a.abs().max(b.abs());
    scale == 0.0 || (a - b).abs() <= tolerance * scale
}

/// Classify the upper/lower line pair by slope signs and convergence.
fn classify_lines(upper: f64, lower: f64, config: &ChartPatternConfig) -> Option<ChartPatternKind> {
    use ChartPatternKind::*;
    let parallel = is_parallel(upper, lower, config.parallel_tolerance);
    match (slope_class(upper, config.flat_slope), slope_class(lower, config.flat_slope)) {
        (Slope::Flat, Slope::Flat) => Some(HorizontalChannel),
        (Slope::Flat, Slope::Rising) => Some(AscendingTriangle),
        (Slope::Falling, Slope::Flat) => Some(DescendingTriangle),
        (Slope::Falling, Slope::Rising) => Some(SymmetricalTriangle),
        (Slope::Rising, Slope::Rising) if parallel => Some(AscendingChannel),
        (Slope::Rising, Slope::Rising) if lower > upper => Some(RisingWedge),
        (Slope::Falling, Slope::Falling) if parallel => Some(DescendingChannel),
        (Slope::Falling, Slope::Falling) if upper < lower => Some(FallingWedge),
        _ => None,
    }
}

fn trendline_pattern(
    w: &Window,
    peaks: &[(usize, f64)],
    troughs: &[(usize, f64)],
    config: &ChartPatternConfig,
) -> Option<ChartPattern> {
    if peaks.len() < 2 || troughs.len() < 2 {
        return None;
    }

    let end = w.end_index();
    let start = peaks[0].0.min(troughs[0].0);
    let last_pivot = peaks[peaks.len() - 1].0.max(troughs[troughs.len() - 1].0);
    let upper = boundary(w, peaks, start, last_pivot, true, config)?;
    let lower = boundary(w, troughs, start, last_pivot, false, config)?;
    if upper.value_at(last_pivot) <= lower.value_at(last_pivot) {
        return None;
    }

    let kind = classify_lines(w.normalized(upper.slope), w.normalized(lower.slope), config)?;
    let height = upper.value_at(start) - lower.value_at(start);
    let close = w.last_close();
    let price_target = match kind.direction() {
        PatternDirection::Bullish => Some(upper.value_at(end) + height),
        PatternDirection::Bearish => Some(lower.value_at(end) - height),
        PatternDirection::Neutral => None,
    };

    let mut confidence = 0.6 + touch_bonus(&upper, config.min_touches) + touch_bonus(&lower, config.min_touches);
    if close > upper.value_at(end) || close < lower.value_at(end) {
        // Breakout in the pattern's direction confirms it.
        let confirms = match kind.direction() {
            PatternDirection::Bullish => close > upper.value_at(end),
            PatternDirection::Bearish => close < lower.value_at(end),
            PatternDirection::Neutral => false,
        };
        if confirms {
            confidence += 0.1;
        }
    }

    let key_points = peaks
        .iter()
        .chain(troughs.iter())
        .map(|&(index, price)| KeyPoint { index, price })
        .collect();

    Some(ChartPattern {
        kind,
        direction: kind.direction(),
        start_index: start,
        end_index: end,
        confidence: confidence.min(0.95),
        key_points,
        upper_line: Some(upper),
        lower_line: Some(lower),
        price_target,
    })
}

fn flag_or_pennant(w: &Window, config: &ChartPatternConfig) -> Option<ChartPattern> {
    let pole_start = w.offset;
    let pole_end = pole_start + config.pole_bars.max(2) - 1;
    let end = w.end_index();
    if end < pole_end + 5 {
        return None;
    }

    let start_close = w.candles[pole_start].close;
    let pole_close = w.candles[pole_end].close;
    if start_close == 0.0 {
        return None;
    }
    let pole_move = (pole_close - start_close) / start_close;
    if pole_move.abs() < config.pole_min_move {
        return None;
    }
    let pole_height = (pole_close - start_close).abs();
    let bullish = pole_move > 0.0;

    let consolidation = Window::new(&w.candles[..=end], pole_end + 1);
    let cons_range = consolidation.range();
    if cons_range <= 0.0 || cons_range > config.max_consolidation_ratio * pole_height {
        return None;
    }

    let (mut peaks, mut troughs) = consolidation.pivots(config.prominence_ratio);
    if peaks.len() < 2 {
        peaks = consolidation.highs_abs(pole_end + 1, end);
    }
    if troughs.len() < 2 {
        troughs = consolidation.lows_abs(pole_end + 1, end);
    }

    let last_pivot = peaks
        .iter()
        .chain(troughs.iter())
        .map(|p| p.0)
        .max()
        .unwrap_or(end);
    let upper = boundary(&consolidation, &peaks, pole_end + 1, last_pivot, true, config)?;
    let lower = boundary(&consolidation, &troughs, pole_end + 1, last_pivot, false, config)?;

    let nu = consolidation.normalized(upper.slope);
    let nl = consolidation.normalized(lower.slope);
    let flat = config.flat_slope;
    let parallel = is_parallel(nu, nl, config.parallel_tolerance);
    let converging = nu < -flat && nl > flat;

    let kind = if converging {
        if bullish {
            ChartPatternKind::BullPennant
        } else {
            ChartPatternKind::BearPennant
        }
    } else if parallel && bullish && nu <= flat && nl <= flat {
        ChartPatternKind::BullFlag
    } else if parallel && !bullish && nu >= -flat && nl >= -flat {
        ChartPatternKind::BearFlag
    } else {
        return None;
    };

    let close = w.last_close();
    let mut confidence = 0.65 + touch_bonus(&upper, config.min_touches) + touch_bonus(&lower, config.min_touches);
    if (bullish && close > upper.value_at(end)) || (!bullish && close < lower.value_at(end)) {
        confidence += 0.1;
    }

    Some(ChartPattern {
        kind,
        direction: kind.direction(),
        start_index: pole_start,
        end_index: end,
        confidence: confidence.min(0.95),
        key_points: vec![
            KeyPoint { index: pole_start, price: start_close },
            KeyPoint { index: pole_end, price: pole_close },
        ],
        upper_line: Some(upper),
        lower_line: Some(lower),
        price_target: Some(if bullish { close + pole_height } else { close - pole_height }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_closes(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                let open = if i == 0 { c } else { closes[i - 1] };
                Candle::new(1_000 + i as i64 * 60, open, c.max(open) + 0.2, c.min(open) - 0.2, c, 1000.0)
            })
            .collect()
    }

    /// Tight candles where high/low hug the close, so pivots sit exactly on closes.
    fn tight(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Candle::new(1_000 + i as i64 * 60, c, c + 0.2, c - 0.2, c, 1000.0))
            .collect()
    }

    fn kinds(patterns: &[ChartPattern]) -> Vec<ChartPatternKind> {
        patterns.iter().map(|p| p.kind).collect()
    }

    #[test]
    fn test_find_peaks_respects_prominence() {
        let values = [1.0, 3.0, 2.0, 2.2, 2.1, 5.0, 1.0];
        assert_eq!(find_peaks(&values, 0.5), vec![1, 5]);
        assert_eq!(find_peaks(&values, 0.05), vec![1, 3, 5]);
        assert_eq!(find_troughs(&values, 0.5), vec![2]);
    }

    #[test]
    fn test_short_series_reports_nothing() {
        let candles = tight(&[100.0, 101.0, 102.0]);
        assert!(detect_chart_patterns(&candles, &ChartPatternConfig::default()).is_empty());
    }

    #[test]
    fn test_double_top() {
        let closes = [
            100.0, 102.0, 104.0, 106.0, 108.0, 110.0, 108.0, 106.0, 104.0, 106.0, 108.0, 110.0,
            108.0, 106.0, 104.0, 102.0, 100.0, 99.0, 98.0, 97.0,
        ];
        let patterns = detect_chart_patterns(&tight(&closes), &ChartPatternConfig::default());
        let top = patterns
            .iter()
            .find(|p| p.kind == ChartPatternKind::DoubleTop)
            .expect("double top");
        assert_eq!(top.direction, PatternDirection::Bearish);
        assert!(top.upper_line.unwrap().touches >= 2);
        assert!(top.confidence > 0.6 && top.confidence <= 0.95);
        assert!(top.price_target.unwrap() < 103.8);
        assert!(!kinds(&patterns).contains(&ChartPatternKind::DoubleBottom));
    }

    #[test]
    fn test_head_and_shoulders() {
        let closes = [
            100.0, 103.0, 106.0, 104.0, 102.0, 105.0, 108.0, 111.0, 108.0, 105.0, 102.0, 104.0,
            106.0, 103.0, 101.0, 99.0, 98.0, 97.0, 96.0, 95.0,
        ];
        let patterns = detect_chart_patterns(&tight(&closes), &ChartPatternConfig::default());
        let hs = patterns
            .iter()
            .find(|p| p.kind == ChartPatternKind::HeadAndShoulders)
            .expect("head and shoulders");
        assert_eq!(hs.key_points[1].index, 7);
        assert!(hs.lower_line.unwrap().touches >= 2);
        assert!(!kinds(&patterns).contains(&ChartPatternKind::HorizontalChannel));
    }

    #[test]
    fn test_ascending_triangle() {
        let closes = [
            100.0, 103.0, 106.0, 110.0, 104.0, 107.0, 110.0, 106.0, 108.0, 110.0, 107.5, 109.0,
            110.0, 108.5, 109.5, 110.0, 109.0, 109.6, 110.0, 109.5,
        ];
        let patterns = detect_chart_patterns(&tight(&closes), &ChartPatternConfig::default());
        let found = kinds(&patterns);
        assert!(found.contains(&ChartPatternKind::AscendingTriangle), "{:?}", found);
        assert!(!found.contains(&ChartPatternKind::DoubleTop));
        assert!(!found.contains(&ChartPatternKind::BullPennant));
    }

    #[test]
    fn test_closes_above_two_pivot_line_reject_triangle() {
        // Peaks at 2 and 10, troughs at 7 and 12: a falling upper and rising lower line
        let tail = [100.0, 100.8, 101.4, 101.8, 102.0, 102.1, 102.2];
        let clean: Vec<f64> = [104.0, 107.0, 110.0, 108.0, 106.0, 105.0, 102.0, 98.0, 101.0, 104.0, 105.0, 102.0, 99.0]
            .iter()
            .chain(tail.iter())
            .copied()
            .collect();
        let found = kinds(&detect_chart_patterns(&tight(&clean), &ChartPatternConfig::default()));
        assert!(found.contains(&ChartPatternKind::SymmetricalTriangle), "{:?}", found);

        // Same pivots, but closes linger near 110 while the upper line falls away beneath them
        let mut lingering = clean.clone();
        lingering[3] = 109.8;
        lingering[4] = 109.6;
        lingering[5] = 109.4;
        lingering[6] = 104.0;
        let config = ChartPatternConfig::default();
        let candles = tight(&lingering);
        let window = Window::new(&candles, 0);
        let (peaks, troughs) = window.pivots(config.prominence_ratio);
        assert_eq!(peaks.iter().map(|p| p.0).collect::<Vec<_>>(), vec![2, 10]);
        assert_eq!(troughs.iter().map(|p| p.0).collect::<Vec<_>>(), vec![7, 12]);

        let found = kinds(&detect_chart_patterns(&candles, &config));
        assert!(
            !found.iter().any(|k| matches!(
                k,
                ChartPatternKind::SymmetricalTriangle
                    | ChartPatternKind::AscendingTriangle
                    | ChartPatternKind::DescendingTriangle
            )),
            "{:?}",
            found
        );
    }

    #[test]
    fn test_bull_flag() {
        let closes = [
            100.0, 102.0, 104.0, 106.0, 108.0, 110.0, 112.0, 110.5, 111.5, 110.0, 111.0, 109.5,
            110.5, 109.0, 110.0, 108.5, 109.5, 108.0, 109.0, 107.5,
        ];
        let patterns = detect_chart_patterns(&tight(&closes), &ChartPatternConfig::default());
        let found = kinds(&patterns);
        assert!(found.contains(&ChartPatternKind::BullFlag), "{:?}", found);
        assert!(!found.contains(&ChartPatternKind::DoubleTop));
        let flag = patterns.iter().find(|p| p.kind == ChartPatternKind::BullFlag).unwrap();
        assert!(flag.price_target.unwrap() > 107.5);
    }

    #[test]
    fn test_flat_series_has_no_patterns() {
        let closes = vec![100.0; 25];
        assert!(detect_chart_patterns(&from_closes(&closes), &ChartPatternConfig::default()).is_empty());
    }

    #[test]
    fn test_touch_counting_band() {
        let line = Trendline::horizontal(100.0);
        let points = [(0, 100.4), (1, 99.4), (2, 101.0), (3, 100.0)];
        assert_eq!(line.count_touches(&points, 0.0075), 3);
        assert_eq!(line.count_touches(&points, 0.005), 2);
    }

    #[test]
    fn test_classify_lines() {
        let config = ChartPatternConfig::default();
        assert_eq!(classify_lines(0.0, 0.0, &config), Some(ChartPatternKind::HorizontalChannel));
        assert_eq!(classify_lines(-0.004, 0.004, &config), Some(ChartPatternKind::SymmetricalTriangle));
        assert_eq!(classify_lines(0.004, 0.004, &config), Some(ChartPatternKind::AscendingChannel));
        assert_eq!(classify_lines(0.002, 0.006, &config), Some(ChartPatternKind::RisingWedge));
        assert_eq!(classify_lines(-0.006, -0.002, &config), Some(ChartPatternKind::FallingWedge));
        assert_eq!(classify_lines(0.004, -0.004, &config), None);
    }
}
