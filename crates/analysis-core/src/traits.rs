use async_trait::async_trait;
use crate::{AnalysisError, Candle, OptionChainSnapshot, TradingMode};

/// Supplies ordered OHLCV candles for an index and trading mode
#[async_trait]
pub trait CandleSource: Send + Sync {
    async fn get_candles(&self, index: &str, mode: TradingMode) -> Result<Vec<Candle>, AnalysisError>;
}

/// Supplies an option chain snapshot (rows plus spot price)
#[async_trait]
pub trait OptionChainSource: Send + Sync {
    async fn get_chain(&self, symbol: &str, expiry: Option<&str>) -> Result<OptionChainSnapshot, AnalysisError>;
}
