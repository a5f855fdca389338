//! External ML predictor and LLM sanity-check seams, plus a deterministic stand-in validator.

use analysis_core::{AnalysisError, Candle, TradingMode, TrendState};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Directional call on the index option
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeSignal {
    #[serde(rename = "BUY CALL", alias = "BUY")]
    BuyCall,
    #[serde(rename = "SELL CALL", alias = "SELL")]
    SellCall,
    #[serde(rename = "HOLD")]
    Hold,
}

impl TradeSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSignal::BuyCall => "BUY CALL",
            TradeSignal::SellCall => "SELL CALL",
            TradeSignal::Hold => "HOLD",
        }
    }

    pub fn is_bullish(&self) -> bool {
        matches!(self, TradeSignal::BuyCall)
    }

    pub fn is_bearish(&self) -> bool {
        matches!(self, TradeSignal::SellCall)
    }
}

impl fmt::Display for TradeSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MlPrediction {
    pub ml_signal: TradeSignal,
    /// Probability of the predicted class
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LlmDecision {
    Agree,
    Disagree,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmValidation {
    pub decision: LlmDecision,
    pub confidence: f64,
    pub reasoning: String,
    #[serde(default)]
    pub warning: Option<String>,
}

/// Draft signal handed to the LLM for a sanity check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRequest {
    pub index: String,
    pub mode: TradingMode,
    pub signal: TradeSignal,
    pub ml_confidence: Option<f64>,
    pub trend: TrendState,
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub entry: Option<f64>,
    pub stop_loss: Option<f64>,
    pub target: Option<f64>,
    pub rrr: Option<f64>,
    /// Option-chain sentiment score, 0-100
    pub option_sentiment: Option<f64>,
    pub pattern_bias: String,
}

/// Classifier over recent candles
#[async_trait]
pub trait MlPredictor: Send + Sync {
    async fn predict(&self, candles: &[Candle]) -> Result<MlPrediction, AnalysisError>;
}

/// Second-opinion check on a drafted signal
#[async_trait]
pub trait LlmValidator: Send + Sync {
    async fn validate(&self, request: &ValidationRequest) -> Result<LlmValidation, AnalysisError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleValidatorConfig {
    pub base_confidence: f64,
    pub trend_alignment_bonus: f64,
    pub indicator_confirmation_bonus: f64,
    pub min_confidence: f64,
    pub max_confidence: f64,
    /// AGREE when confidence is strictly above this
    pub agree_above: f64,
    pub strong_agree_above: f64,
    /// Attach a warning when confidence is at or below this
    pub warn_at_or_below: f64,
}

impl Default for RuleValidatorConfig {
    fn default() -> Self {
        Self {
            base_confidence: 0.6,
            trend_alignment_bonus: 0.15,
            indicator_confirmation_bonus: 0.15,
            min_confidence: 0.4,
            max_confidence: 0.98,
            agree_above: 0.6,
            strong_agree_above: 0.75,
            warn_at_or_below: 0.7,
        }
    }
}

/// Offline validator: trend alignment and RSI/MACD confirmation, no network.
#[derive(Debug, Clone, Default)]
pub struct RuleBasedValidator {
    config: RuleValidatorConfig,
}

impl RuleBasedValidator {
    pub fn new(config: RuleValidatorConfig) -> Self {
        Self { config }
    }

    pub fn evaluate(&self, request: &ValidationRequest) -> LlmValidation {
        let c = &self.config;
        let signal = request.signal;
        let trend_aligned = (signal.is_bullish() && request.trend.is_bullish())
            || (signal.is_bearish() && request.trend.is_bearish());

        let rsi = request.rsi.unwrap_or(50.0);
        let macd = request.macd.unwrap_or(0.0);
        let confirmed = (signal.is_bullish() && rsi > 50.0 && macd > 0.0)
            || (signal.is_bearish() && rsi < 50.0 && macd < 0.0);

        let mut confidence = c.base_confidence;
        if trend_aligned {
            confidence += c.trend_alignment_bonus;
        }
        if confirmed {
            confidence += c.indicator_confirmation_bonus;
        }
        let confidence = confidence.clamp(c.min_confidence, c.max_confidence);

        let (decision, reasoning) = if confidence > c.strong_agree_above {
            (
                LlmDecision::Agree,
                format!(
                    "Strong alignment between {} signal and market conditions. Technical indicators provide confirmation with trend alignment.",
                    signal
                ),
            )
        } else if confidence > c.agree_above {
            (
                LlmDecision::Agree,
                format!(
                    "Reasonable alignment between {} signal and market conditions, though some indicators show mixed signals.",
                    signal
                ),
            )
        } else {
            (
                LlmDecision::Disagree,
                format!(
                    "Limited confirmation for {} signal. Technical indicators and market conditions show contradictory signals.",
                    signal
                ),
            )
        };

        LlmValidation {
            decision,
            confidence,
            reasoning,
            warning: (confidence <= c.warn_at_or_below)
                .then(|| "Consider waiting for stronger confirmation".to_string()),
        }
    }
}

#[async_trait]
impl LlmValidator for RuleBasedValidator {
    async fn validate(&self, request: &ValidationRequest) -> Result<LlmValidation, AnalysisError> {
        Ok(self.evaluate(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(signal: TradeSignal, trend: TrendState, rsi: f64, macd: f64) -> ValidationRequest {
        ValidationRequest {
            index: "NIFTY".to_string(),
            mode: TradingMode::Scalp,
            signal,
            ml_confidence: Some(0.7),
            trend,
            rsi: Some(rsi),
            macd: Some(macd),
            entry: Some(22_000.0),
            stop_loss: Some(21_950.0),
            target: Some(22_080.0),
            rrr: Some(1.6),
            option_sentiment: None,
            pattern_bias: "neutral".to_string(),
        }
    }

    #[test]
    fn test_fully_confirmed_buy() {
        let verdict = RuleBasedValidator::default().evaluate(&request(TradeSignal::BuyCall, TrendState::Uptrend, 62.0, 4.0));
        assert_eq!(verdict.decision, LlmDecision::Agree);
        assert!((verdict.confidence - 0.9).abs() < 1e-12);
        assert!(verdict.warning.is_none());
    }

    #[test]
    fn test_trend_only_sell() {
        let verdict =
            RuleBasedValidator::default().evaluate(&request(TradeSignal::SellCall, TrendState::Downtrend, 55.0, -1.0));
        assert_eq!(verdict.decision, LlmDecision::Agree);
        assert!((verdict.confidence - 0.75).abs() < 1e-12);
        assert!(verdict.reasoning.starts_with("Reasonable"));
    }

    #[test]
    fn test_unconfirmed_signal_disagrees() {
        let verdict = RuleBasedValidator::default().evaluate(&request(TradeSignal::BuyCall, TrendState::Downtrend, 40.0, -2.0));
        assert_eq!(verdict.decision, LlmDecision::Disagree);
        assert_eq!(verdict.confidence, 0.6);
        assert!(verdict.warning.is_some());
    }

    #[test]
    fn test_validator_is_deterministic() {
        let validator = RuleBasedValidator::default();
        let req = request(TradeSignal::BuyCall, TrendState::WeakUptrend, 51.0, 0.5);
        assert_eq!(validator.evaluate(&req), validator.evaluate(&req));
    }

    #[test]
    fn test_signal_wire_names() {
        assert_eq!(serde_json::to_string(&TradeSignal::BuyCall).unwrap(), "\"BUY CALL\"");
        let parsed: TradeSignal = serde_json::from_str("\"SELL\"").unwrap();
        assert_eq!(parsed, TradeSignal::SellCall);
        let decision: LlmDecision = serde_json::from_str("\"AGREE\"").unwrap();
        assert_eq!(decision, LlmDecision::Agree);
    }
}
