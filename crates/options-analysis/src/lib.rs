pub mod analyzer;
pub mod grid;
pub mod pricing;

pub use analyzer::{
    analyze_option_chain, max_pain_strike, pcr_sentiment, ExternalLevels, GammaExposure, ImpliedRange, IvSkew,
    MarketSentiment, MaxPain, OptionChainConfig, OptionChainReport, PutCallRatio, SentimentWeights,
};
pub use grid::{build_grid, GridAction, GridConfig, GridLevel, LevelCandidate};
pub use pricing::{black_scholes_price, greeks, implied_volatility, Greeks, IvSolverConfig, OptionKind};
