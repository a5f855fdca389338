use analysis_core::{
    validate_candles, AnalysisError, Candle, CandleSource, OptionChainSnapshot, OptionChainSource, TradingMode,
};
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use options_analysis::{analyze_option_chain, ExternalLevels, OptionChainReport};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use technical_analysis::{
    analyze_technicals, FibonacciLevels, IndicatorSnapshot, MomentumSummary, OpeningRange, PatternSummary,
    SupportResistance, TechnicalReport, TrendSummary,
};
use tracing::{debug, info, warn};

use crate::collaborators::{
    LlmDecision, LlmValidation, LlmValidator, MlPrediction, MlPredictor, TradeSignal, ValidationRequest,
};
use crate::config::{EngineConfig, FusionConfig};
use crate::market_context::{analyze_sectors, classify_fii_dii, FiiDiiSentiment, MarketContext, PreMarketSentiment, SectorAnalysis};
use crate::psychology::{check_psychology, PsychologyCheck, TradeReadiness};
use crate::risk::{evaluate_risk, RiskAssessment, RiskConfig};

/// Outcome after the LLM gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinalDecision {
    #[serde(rename = "BUY CALL")]
    BuyCall,
    #[serde(rename = "SELL CALL")]
    SellCall,
    #[serde(rename = "HOLD")]
    Hold,
    #[serde(rename = "SKIP")]
    Skip,
}

impl FinalDecision {
    pub fn is_trade(&self) -> bool {
        matches!(self, FinalDecision::BuyCall | FinalDecision::SellCall)
    }
}

impl From<TradeSignal> for FinalDecision {
    fn from(signal: TradeSignal) -> Self {
        match signal {
            TradeSignal::BuyCall => FinalDecision::BuyCall,
            TradeSignal::SellCall => FinalDecision::SellCall,
            TradeSignal::Hold => FinalDecision::Hold,
        }
    }
}

/// Where the directional signal came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    Model,
    TechnicalFallback,
}

/// Weighted vote of the technical analyzers, used when no ML prediction is available
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnicalVote {
    pub signal: TradeSignal,
    pub confidence: f64,
    pub net_score: f64,
    pub bullish_points: f64,
    pub bearish_points: f64,
    pub components: BTreeMap<String, f64>,
}

const MAX_VOTE_POINTS: f64 = 6.5;

pub fn technical_vote(report: &TechnicalReport, option_chain: Option<&OptionChainReport>, config: &FusionConfig) -> TechnicalVote {
    let mut components = BTreeMap::new();

    if !report.trend.insufficient_data {
        let score = report.trend.consolidated_trend.to_score() as f64;
        components.insert("trend".to_string(), (score / 1.5).clamp(-2.0, 2.0));
    }
    if !report.patterns.insufficient_data {
        components.insert("patterns".to_string(), report.patterns.pattern_bias.to_score() as f64 / 2.0);
    }
    if !report.momentum.insufficient_data {
        components.insert("momentum".to_string(), report.momentum.momentum.to_score() as f64 / 2.0);
    }
    if let Some(hist) = report.indicators.macd_hist {
        components.insert("macd".to_string(), if hist > 0.0 { 0.5 } else if hist < 0.0 { -0.5 } else { 0.0 });
    }
    if let Some(rsi) = report.indicators.rsi {
        components.insert("rsi".to_string(), if rsi > 55.0 { 0.5 } else if rsi < 45.0 { -0.5 } else { 0.0 });
    }
    if let Some(above) = report.indicators.price_above_vwap {
        components.insert("vwap".to_string(), if above { 0.5 } else { -0.5 });
    }
    if let Some(chain) = option_chain.filter(|c| !c.insufficient_data) {
        components.insert("options".to_string(), ((chain.sentiment.score - 50.0) / 50.0).clamp(-1.0, 1.0));
    }

    let bullish_points: f64 = components.values().filter(|v| **v > 0.0).sum();
    let bearish_points: f64 = -components.values().filter(|v| **v < 0.0).sum::<f64>();
    let net_score = bullish_points - bearish_points;
    let signal = if net_score >= config.vote_threshold {
        TradeSignal::BuyCall
    } else if net_score <= -config.vote_threshold {
        TradeSignal::SellCall
    } else {
        TradeSignal::Hold
    };

    TechnicalVote {
        signal,
        confidence: 0.5 + 0.4 * (net_score.abs() / MAX_VOTE_POINTS).min(1.0),
        net_score,
        bullish_points,
        bearish_points,
        components,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeLevels {
    pub entry: Option<f64>,
    pub stop_loss: Option<f64>,
    pub target: Option<f64>,
    pub rrr: Option<f64>,
}

/// Entry at the last close, ATR stop, nearest opposing level as target when it is
/// far enough away, otherwise a fixed reward multiple.
pub fn trade_levels(
    signal: TradeSignal,
    last_close: Option<f64>,
    atr: f64,
    zones: &SupportResistance,
    mode: TradingMode,
    risk: &RiskConfig,
    fusion: &FusionConfig,
) -> TradeLevels {
    let entry = match last_close.filter(|c| c.is_finite()) {
        Some(e) => e,
        None => return TradeLevels::default(),
    };
    let distance = risk.stop_distance(atr, mode);
    if signal == TradeSignal::Hold || !distance.is_finite() || distance <= 0.0 {
        return TradeLevels {
            entry: Some(entry),
            ..TradeLevels::default()
        };
    }

    let min_reward = fusion.min_target_risk_multiple * distance;
    let (stop_loss, target) = if signal.is_bullish() {
        let target = zones
            .nearest_resistance
            .filter(|r| r - entry >= min_reward)
            .unwrap_or(entry + fusion.fallback_rrr * distance);
        (entry - distance, target)
    } else {
        let target = zones
            .nearest_support
            .filter(|s| entry - s >= min_reward)
            .unwrap_or(entry - fusion.fallback_rrr * distance);
        (entry + distance, target)
    };

    TradeLevels {
        entry: Some(entry),
        stop_loss: Some(stop_loss),
        target: Some(target),
        rrr: Some((target - entry).abs() / distance),
    }
}

/// Weighted mean of the available confidences; `fallback` when none is available.
pub fn fused_confidence(ml: Option<f64>, llm: Option<f64>, fallback: f64, config: &FusionConfig) -> f64 {
    let (sum, weight) = [(ml, config.ml_weight), (llm, config.llm_weight)]
        .into_iter()
        .filter_map(|(value, weight)| value.filter(|v| v.is_finite()).map(|v| (v, weight)))
        .fold((0.0, 0.0), |(s, w), (v, weight)| (s + v * weight, w + weight));
    let confidence = if weight > 0.0 { sum / weight } else { fallback };
    confidence.clamp(0.0, 1.0)
}

/// The ML signal survives only an LLM AGREE at or above the agreement threshold.
pub fn final_decision(signal: TradeSignal, llm: Option<&LlmValidation>, config: &FusionConfig) -> FinalDecision {
    match llm {
        Some(v) if v.decision == LlmDecision::Agree && v.confidence >= config.agreement_threshold => signal.into(),
        Some(_) => FinalDecision::Skip,
        None if config.require_llm_agreement => FinalDecision::Skip,
        None => signal.into(),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompositeSignal {
    pub index: String,
    pub mode: TradingMode,
    pub generated_at: DateTime<Utc>,
    pub signal: TradeSignal,
    pub signal_source: SignalSource,
    /// Fused ML/LLM confidence, 0-1
    pub confidence: f64,
    pub entry: Option<f64>,
    pub target: Option<f64>,
    pub stop_loss: Option<f64>,
    pub rrr: Option<f64>,
    pub trend: TrendSummary,
    pub indicator_snapshot: IndicatorSnapshot,
    pub pattern_analysis: PatternSummary,
    pub market_open: OpeningRange,
    pub zones: SupportResistance,
    pub fib: FibonacciLevels,
    pub momentum: MomentumSummary,
    pub option_chain: Option<OptionChainReport>,
    pub fii_dii: FiiDiiSentiment,
    pub sectors: SectorAnalysis,
    pub risk: RiskAssessment,
    pub psychology: PsychologyCheck,
    pub pre_market: Option<PreMarketSentiment>,
    pub technical_vote: TechnicalVote,
    pub ml_prediction: Option<MlPrediction>,
    pub llm_validation: Option<LlmValidation>,
    pub final_decision: FinalDecision,
    pub auto_execute_eligible: bool,
    pub warnings: Vec<String>,
}

pub struct SignalEngine {
    config: EngineConfig,
    ml_predictor: Option<Arc<dyn MlPredictor>>,
    llm_validator: Option<Arc<dyn LlmValidator>>,
}

impl SignalEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            ml_predictor: None,
            llm_validator: None,
        }
    }

    pub fn with_ml_predictor(mut self, predictor: Arc<dyn MlPredictor>) -> Self {
        self.ml_predictor = Some(predictor);
        self
    }

    pub fn with_llm_validator(mut self, validator: Arc<dyn LlmValidator>) -> Self {
        self.llm_validator = Some(validator);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    async fn predict(&self, candles: &[Candle]) -> Option<MlPrediction> {
        let predictor = self.ml_predictor.as_ref()?;
        match predictor.predict(candles).await {
            Ok(prediction) if prediction.confidence.is_finite() => Some(prediction),
            Ok(prediction) => {
                warn!("ML predictor returned non-finite confidence {:?}", prediction.confidence);
                None
            }
            Err(e) => {
                warn!("ML predictor unavailable, using technical vote: {}", e);
                None
            }
        }
    }

    async fn validate(&self, request: &ValidationRequest) -> Option<LlmValidation> {
        let validator = self.llm_validator.as_ref()?;
        match validator.validate(request).await {
            Ok(verdict) if verdict.confidence.is_finite() => Some(verdict),
            Ok(_) => {
                warn!("LLM validator returned non-finite confidence");
                None
            }
            Err(e) => {
                warn!("LLM validator unavailable: {}", e);
                None
            }
        }
    }

    /// Run every analyzer over one snapshot and fuse them into a single decision.
    ///
    /// Only malformed input is an error; short history and missing collaborators
    /// degrade the result instead.
    pub async fn build_final_signal(
        &self,
        candles: &[Candle],
        option_chain: Option<&OptionChainSnapshot>,
        index: &str,
        mode: TradingMode,
        context: &MarketContext,
    ) -> Result<CompositeSignal, AnalysisError> {
        validate_candles(candles)?;
        if let Some(chain) = option_chain {
            chain.validate()?;
        }
        info!("Building {} signal for {} from {} candles", mode, index, candles.len());

        let owned = candles.to_vec();
        let technical_config = self.config.technical.clone();
        let technical_task = tokio::task::spawn_blocking(move || analyze_technicals(&owned, mode, &technical_config));
        let (technical, prediction) = tokio::join!(technical_task, self.predict(candles));
        let technical = technical.map_err(|e| AnalysisError::CalculationError(format!("technical analysis task failed: {}", e)))?;

        let option_report = option_chain.map(|chain| {
            let external = ExternalLevels {
                supports: technical.support_resistance.support.clone(),
                resistances: technical.support_resistance.resistance.clone(),
            };
            analyze_option_chain(chain, &external, &self.config.options)
        });

        let fusion = &self.config.fusion;
        let risk = evaluate_risk(technical.indicators.atr, index, mode, &self.config.risk);
        let psychology = check_psychology(context.evaluated_at, &self.config.psychology);
        let fii_dii = classify_fii_dii(context.fii_dii.as_ref());
        let sectors = analyze_sectors(index, &context.sectors);
        let vote = technical_vote(&technical, option_report.as_ref(), fusion);

        let (signal, signal_source) = match &prediction {
            Some(p) => (p.ml_signal, SignalSource::Model),
            None => (vote.signal, SignalSource::TechnicalFallback),
        };

        let last_close = candles.last().map(|c| c.close);
        let levels = trade_levels(
            signal,
            last_close,
            risk.volatility.atr,
            &technical.support_resistance,
            mode,
            &self.config.risk,
            fusion,
        );

        let request = ValidationRequest {
            index: index.to_string(),
            mode,
            signal,
            ml_confidence: prediction.map(|p| p.confidence),
            trend: technical.trend.consolidated_trend,
            rsi: technical.indicators.rsi,
            macd: technical.indicators.macd,
            entry: levels.entry,
            stop_loss: levels.stop_loss,
            target: levels.target,
            rrr: levels.rrr,
            option_sentiment: option_report
                .as_ref()
                .filter(|r| !r.insufficient_data)
                .map(|r| r.sentiment.score),
            pattern_bias: technical.patterns.pattern_bias.as_str().to_string(),
        };
        let validation = self.validate(&request).await;

        let confidence = fused_confidence(
            prediction.map(|p| p.confidence),
            validation.as_ref().map(|v| v.confidence),
            vote.confidence,
            fusion,
        );
        let decision = final_decision(signal, validation.as_ref(), fusion);
        let auto_execute_eligible = decision.is_trade()
            && confidence >= fusion.auto_execute_min_confidence
            && levels.rrr.map_or(false, |r| r >= fusion.auto_execute_min_rrr);

        let mut warnings = Vec::new();
        if prediction.is_none() {
            warnings.push("ML prediction unavailable; technical vote used as signal".to_string());
        }
        if validation.is_none() {
            warnings.push("LLM validation unavailable".to_string());
        }
        if option_report.as_ref().map_or(true, |r| r.insufficient_data) {
            warnings.push("Option chain analysis unavailable".to_string());
        }
        if technical.trend.insufficient_data || technical.patterns.insufficient_data {
            warnings.push("Insufficient candle history for full technical analysis".to_string());
        }
        if psychology.trade_readiness == TradeReadiness::Caution {
            warnings.push(psychology.day.guidance.clone());
        }

        debug!(
            index,
            signal = %signal,
            confidence,
            decision = ?decision,
            "Signal fused"
        );

        let TechnicalReport {
            indicators,
            patterns,
            trend,
            support_resistance,
            fibonacci,
            momentum,
            opening_range,
            ..
        } = technical;

        Ok(CompositeSignal {
            index: index.to_string(),
            mode,
            generated_at: context.evaluated_at,
            signal,
            signal_source,
            confidence,
            entry: levels.entry,
            target: levels.target,
            stop_loss: levels.stop_loss,
            rrr: levels.rrr,
            trend,
            indicator_snapshot: indicators,
            pattern_analysis: patterns,
            market_open: opening_range,
            zones: support_resistance,
            fib: fibonacci,
            momentum,
            option_chain: option_report,
            fii_dii,
            sectors,
            risk,
            psychology,
            pre_market: context.pre_market.clone(),
            technical_vote: vote,
            ml_prediction: prediction,
            llm_validation: validation,
            final_decision: decision,
            auto_execute_eligible,
            warnings,
        })
    }

    async fn build_from_sources(
        &self,
        candle_source: &dyn CandleSource,
        chain_source: Option<&dyn OptionChainSource>,
        index: &str,
        mode: TradingMode,
        context: &MarketContext,
    ) -> Result<CompositeSignal, AnalysisError> {
        let candles = candle_source.get_candles(index, mode).await?;
        let chain = match chain_source {
            Some(source) => match source.get_chain(index, None).await {
                Ok(chain) => Some(chain),
                Err(e) => {
                    warn!("Option chain unavailable for {}: {}", index, e);
                    None
                }
            },
            None => None,
        };
        self.build_final_signal(&candles, chain.as_ref(), index, mode, context).await
    }

    /// Build signals for several (index, mode) pairs concurrently, preserving request order.
    pub async fn build_for_indices(
        &self,
        candle_source: &dyn CandleSource,
        chain_source: Option<&dyn OptionChainSource>,
        requests: &[(String, TradingMode)],
        context: &MarketContext,
    ) -> Vec<(String, TradingMode, Result<CompositeSignal, AnalysisError>)> {
        let tasks = requests.iter().map(|(index, mode)| async move {
            let result = self
                .build_from_sources(candle_source, chain_source, index, *mode, context)
                .await;
            if let Err(e) = &result {
                warn!("Signal build failed for {} ({}): {}", index, mode, e);
            }
            (index.clone(), *mode, result)
        });
        join_all(tasks).await
    }
}
