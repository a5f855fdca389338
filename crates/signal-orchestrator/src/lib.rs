pub mod cache;
pub mod collaborators;
pub mod config;
pub mod market_context;
pub mod psychology;
pub mod risk;
pub mod signal;

pub use cache::{TtlCandleCache, DEFAULT_CANDLE_TTL_SECS};
pub use collaborators::{
    LlmDecision, LlmValidation, LlmValidator, MlPrediction, MlPredictor, RuleBasedValidator, RuleValidatorConfig,
    TradeSignal, ValidationRequest,
};
pub use config::{EngineConfig, FusionConfig};
pub use market_context::{
    analyze_sectors, classify_fii_dii, FiiDiiFlows, FiiDiiSentiment, FlowSentiment, FlowValues, MarketContext,
    PreMarketSentiment, SectorAnalysis, SectorPerformance, SectorRotation, SectorTrend,
};
pub use psychology::{check_psychology, DayContext, PsychologyCheck, PsychologyConfig, SessionPhase, TradeReadiness};
pub use risk::{evaluate_risk, AtrSource, ModeValues, RiskAssessment, RiskConfig, RiskLevel};
pub use signal::{
    final_decision, fused_confidence, technical_vote, trade_levels, CompositeSignal, FinalDecision, SignalEngine,
    SignalSource, TechnicalVote, TradeLevels,
};
