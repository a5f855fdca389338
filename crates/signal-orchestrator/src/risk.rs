//! ATR-driven position sizing and risk profile for a single index.

use analysis_core::TradingMode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One value per trading mode
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModeValues {
    pub scalp: f64,
    pub swing: f64,
    pub longterm: f64,
}

impl ModeValues {
    pub const fn new(scalp: f64, swing: f64, longterm: f64) -> Self {
        Self { scalp, swing, longterm }
    }

    pub fn get(&self, mode: TradingMode) -> f64 {
        match mode {
            TradingMode::Scalp => self.scalp,
            TradingMode::Swing => self.swing,
            TradingMode::Longterm => self.longterm,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    pub capital: f64,
    /// Percent of capital risked per trade
    pub risk_per_trade_pct: ModeValues,
    pub stop_loss_atr_multiplier: ModeValues,
    pub lot_sizes: BTreeMap<String, u32>,
    pub default_lot_size: u32,
    /// Typical ATR per index; used when the candle ATR is undefined and as the volatility baseline
    pub atr_baseline: BTreeMap<String, ModeValues>,
    pub default_index: String,
    pub high_volatility_ratio: f64,
    pub low_volatility_ratio: f64,
    /// Expected drawdown as a multiple of per-trade risk
    pub drawdown_multiple: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            capital: 100_000.0,
            risk_per_trade_pct: ModeValues::new(1.0, 1.5, 2.0),
            stop_loss_atr_multiplier: ModeValues::new(1.5, 2.0, 3.0),
            lot_sizes: BTreeMap::from([("NIFTY".to_string(), 50), ("BANKNIFTY".to_string(), 25)]),
            default_lot_size: 50,
            atr_baseline: BTreeMap::from([
                ("NIFTY".to_string(), ModeValues::new(30.0, 120.0, 300.0)),
                ("BANKNIFTY".to_string(), ModeValues::new(80.0, 300.0, 700.0)),
            ]),
            default_index: "NIFTY".to_string(),
            high_volatility_ratio: 1.5,
            low_volatility_ratio: 0.7,
            drawdown_multiple: 3.0,
        }
    }
}

impl RiskConfig {
    pub fn lot_size(&self, index: &str) -> u32 {
        self.lot_sizes
            .get(&index.to_ascii_uppercase())
            .copied()
            .unwrap_or(self.default_lot_size)
    }

    pub fn baseline_atr(&self, index: &str, mode: TradingMode) -> Option<f64> {
        self.atr_baseline
            .get(&index.to_ascii_uppercase())
            .or_else(|| self.atr_baseline.get(&self.default_index))
            .map(|values| values.get(mode))
    }

    pub fn stop_distance(&self, atr: f64, mode: TradingMode) -> f64 {
        atr * self.stop_loss_atr_multiplier.get(mode)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Normal,
    Moderate,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AtrSource {
    Candles,
    Baseline,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionSizing {
    pub capital: f64,
    pub risk_per_trade_pct: f64,
    pub risk_amount: f64,
    pub stop_loss_points: f64,
    pub max_quantity: u64,
    pub suggested_lots: u64,
    pub lot_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolatilityRisk {
    pub atr: f64,
    pub atr_source: AtrSource,
    pub rank: RiskLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub overall_risk: RiskLevel,
    pub position_sizing: PositionSizing,
    pub volatility: VolatilityRisk,
    pub overnight_risk: RiskLevel,
    pub gap_risk: RiskLevel,
    pub max_drawdown_expected_pct: f64,
    pub liquidity_risk: RiskLevel,
}

/// Size a trade from the candle ATR, falling back to the per-index baseline.
pub fn evaluate_risk(atr: Option<f64>, index: &str, mode: TradingMode, config: &RiskConfig) -> RiskAssessment {
    let baseline = config.baseline_atr(index, mode);
    let (atr, atr_source) = match atr.filter(|a| a.is_finite() && *a > 0.0) {
        Some(a) => (a, AtrSource::Candles),
        None => (baseline.unwrap_or(0.0), AtrSource::Baseline),
    };

    let risk_pct = config.risk_per_trade_pct.get(mode);
    let risk_amount = config.capital * risk_pct / 100.0;
    let stop_loss_points = config.stop_distance(atr, mode);
    let lot_size = config.lot_size(index);
    let max_quantity = if stop_loss_points > 0.0 {
        (risk_amount / stop_loss_points).floor() as u64
    } else {
        0
    };
    let suggested_lots = (max_quantity / u64::from(lot_size.max(1))).max(1);

    let rank = match baseline {
        Some(b) if atr > b * config.high_volatility_ratio => RiskLevel::High,
        Some(b) if atr < b * config.low_volatility_ratio => RiskLevel::Low,
        _ => RiskLevel::Moderate,
    };
    let overall_risk = match (mode, rank) {
        (TradingMode::Swing, RiskLevel::High) => RiskLevel::High,
        _ => RiskLevel::Moderate,
    };
    let liquid = config.lot_sizes.contains_key(&index.to_ascii_uppercase());

    RiskAssessment {
        overall_risk,
        position_sizing: PositionSizing {
            capital: config.capital,
            risk_per_trade_pct: risk_pct,
            risk_amount,
            stop_loss_points,
            max_quantity,
            suggested_lots,
            lot_size,
        },
        volatility: VolatilityRisk { atr, atr_source, rank },
        overnight_risk: if mode.is_intraday() { RiskLevel::High } else { RiskLevel::Moderate },
        gap_risk: if mode.is_intraday() { RiskLevel::Low } else { RiskLevel::Moderate },
        max_drawdown_expected_pct: risk_pct * config.drawdown_multiple,
        liquidity_risk: if liquid { RiskLevel::Low } else { RiskLevel::Moderate },
    }
}
