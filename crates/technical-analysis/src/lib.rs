pub mod chart_patterns;
pub mod indicator_set;
pub mod indicators;
pub mod levels;
pub mod momentum;
pub mod opening_range;
pub mod patterns;
pub mod report;
pub mod trend;

#[cfg(test)]
mod indicators_tests;

pub use chart_patterns::{detect_chart_patterns, ChartPattern, ChartPatternConfig, ChartPatternKind, PatternDirection};
pub use indicator_set::{calculate_all, IndicatorConfig, IndicatorSet, IndicatorSnapshot, MarketRegime};
pub use indicators::*;
pub use levels::{fibonacci_levels, support_resistance, FibonacciLevels, LevelConfig, SupportResistance};
pub use momentum::{analyze_momentum, MomentumConfig, MomentumSummary};
pub use opening_range::{analyze_opening_range, OpeningRange, OpeningRangeConfig};
pub use patterns::{detect_patterns, CandlestickPattern, PatternConfig, PatternResult, PatternSummary, PatternZone};
pub use report::{analyze_technicals, TechnicalConfig, TechnicalReport};
pub use trend::{detect_trend, MarketStructure, TrendConfig, TrendSummary};
