use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::AnalysisError;

/// OHLCV candle. `timestamp` is epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    pub fn upper_shadow(&self) -> f64 {
        self.high - self.open.max(self.close)
    }

    pub fn lower_shadow(&self) -> f64 {
        self.open.min(self.close) - self.low
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.timestamp, 0)
    }
}

/// Rejects candle sequences that are malformed rather than merely short.
///
/// Short history is never an error here; analyzers encode it as data.
pub fn validate_candles(candles: &[Candle]) -> Result<(), AnalysisError> {
    for (i, c) in candles.iter().enumerate() {
        let fields = [c.open, c.high, c.low, c.close, c.volume];
        if fields.iter().any(|v| !v.is_finite()) {
            return Err(AnalysisError::InvalidData(format!(
                "candle {} has a non-finite OHLCV field",
                i
            )));
        }
        if c.high < c.low {
            return Err(AnalysisError::InvalidData(format!(
                "candle {} has high {} below low {}",
                i, c.high, c.low
            )));
        }
        if c.volume < 0.0 {
            return Err(AnalysisError::InvalidData(format!(
                "candle {} has negative volume",
                i
            )));
        }
        if i > 0 && c.timestamp <= candles[i - 1].timestamp {
            return Err(AnalysisError::InvalidData(format!(
                "candle {} timestamp {} is not after {}",
                i,
                c.timestamp,
                candles[i - 1].timestamp
            )));
        }
    }
    Ok(())
}

/// Trading horizon a request is evaluated for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    Scalp,
    Swing,
    Longterm,
}

impl TradingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradingMode::Scalp => "scalp",
            TradingMode::Swing => "swing",
            TradingMode::Longterm => "longterm",
        }
    }

    pub fn is_intraday(&self) -> bool {
        matches!(self, TradingMode::Scalp)
    }
}

impl fmt::Display for TradingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradingMode {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scalp" | "intraday" => Ok(TradingMode::Scalp),
            "swing" => Ok(TradingMode::Swing),
            "longterm" | "long_term" | "positional" => Ok(TradingMode::Longterm),
            other => Err(AnalysisError::InvalidData(format!("unknown trading mode: {}", other))),
        }
    }
}

/// Seven-state trend classification shared by every trend method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendState {
    StrongUptrend,
    Uptrend,
    WeakUptrend,
    Neutral,
    WeakDowntrend,
    Downtrend,
    StrongDowntrend,
}

impl TrendState {
    /// Numeric value used by the weighted consolidation vote (-3..=3)
    pub fn to_score(&self) -> i32 {
        match self {
            TrendState::StrongUptrend => 3,
            TrendState::Uptrend => 2,
            TrendState::WeakUptrend => 1,
            TrendState::Neutral => 0,
            TrendState::WeakDowntrend => -1,
            TrendState::Downtrend => -2,
            TrendState::StrongDowntrend => -3,
        }
    }

    /// Buckets a weighted vote back into a state.
    ///
    /// `>= 2` strong uptrend, `[1, 2)` uptrend, `(0, 1)` weak uptrend, `0` neutral,
    /// `(-1, 0)` weak downtrend, `(-2, -1]` downtrend, `<= -2` strong downtrend.
    pub fn from_weighted_sum(sum: f64) -> TrendState {
        if !sum.is_finite() {
            TrendState::Neutral
        } else if sum >= 2.0 {
            TrendState::StrongUptrend
        } else if sum >= 1.0 {
            TrendState::Uptrend
        } else if sum > 0.0 {
            TrendState::WeakUptrend
        } else if sum == 0.0 {
            TrendState::Neutral
        } else if sum > -1.0 {
            TrendState::WeakDowntrend
        } else if sum > -2.0 {
            TrendState::Downtrend
        } else {
            TrendState::StrongDowntrend
        }
    }

    pub fn is_bullish(&self) -> bool {
        self.to_score() > 0
    }

    pub fn is_bearish(&self) -> bool {
        self.to_score() < 0
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrendState::StrongUptrend => "strong_uptrend",
            TrendState::Uptrend => "uptrend",
            TrendState::WeakUptrend => "weak_uptrend",
            TrendState::Neutral => "neutral",
            TrendState::WeakDowntrend => "weak_downtrend",
            TrendState::Downtrend => "downtrend",
            TrendState::StrongDowntrend => "strong_downtrend",
        }
    }
}

impl fmt::Display for TrendState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Five-level directional bias used by pattern, momentum and opening-range summaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bias {
    StronglyBullish,
    Bullish,
    Neutral,
    Bearish,
    StronglyBearish,
}

impl Bias {
    pub fn to_score(&self) -> i32 {
        match self {
            Bias::StronglyBullish => 2,
            Bias::Bullish => 1,
            Bias::Neutral => 0,
            Bias::Bearish => -1,
            Bias::StronglyBearish => -2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Bias::StronglyBullish => "strongly_bullish",
            Bias::Bullish => "bullish",
            Bias::Neutral => "neutral",
            Bias::Bearish => "bearish",
            Bias::StronglyBearish => "strongly_bearish",
        }
    }
}

impl fmt::Display for Bias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One strike of an option chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionChainRow {
    pub strike: f64,
    pub call_price: f64,
    pub put_price: f64,
    pub call_oi: f64,
    pub put_oi: f64,
    pub call_volume: f64,
    pub put_volume: f64,
    /// Annualized implied volatility as a fraction (0.15 = 15%)
    #[serde(default)]
    pub call_iv: Option<f64>,
    #[serde(default)]
    pub put_iv: Option<f64>,
    pub expiry_date: String,
}

/// Option chain rows plus the underlying spot price they were quoted against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionChainSnapshot {
    pub symbol: String,
    pub spot_price: f64,
    /// Quote time, epoch seconds. Used to derive time to expiry.
    pub as_of: i64,
    pub rows: Vec<OptionChainRow>,
}

impl OptionChainSnapshot {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if !self.spot_price.is_finite() || self.spot_price <= 0.0 {
            return Err(AnalysisError::InvalidData(format!(
                "spot price must be positive, got {}",
                self.spot_price
            )));
        }

        let mut seen = HashSet::new();
        for row in &self.rows {
            if !row.strike.is_finite() || row.strike <= 0.0 {
                return Err(AnalysisError::InvalidData(format!(
                    "strike must be positive, got {}",
                    row.strike
                )));
            }
            if !seen.insert(row.strike.to_bits()) {
                return Err(AnalysisError::InvalidData(format!(
                    "duplicate strike {}",
                    row.strike
                )));
            }
            let counts = [row.call_oi, row.put_oi, row.call_volume, row.put_volume];
            if counts.iter().any(|v| !v.is_finite() || *v < 0.0) {
                return Err(AnalysisError::InvalidData(format!(
                    "strike {} has negative or non-finite OI/volume",
                    row.strike
                )));
            }
        }
        Ok(())
    }
}
