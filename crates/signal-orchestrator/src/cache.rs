use analysis_core::{AnalysisError, Candle, CandleSource, TradingMode};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;

struct CacheEntry {
    candles: Arc<Vec<Candle>>,
    cached_at: DateTime<Utc>,
}

/// Candle source wrapper that reuses fetched series for `ttl`.
///
/// Keys are (upper-cased index, mode). Failed fetches are never cached.
pub struct TtlCandleCache<S> {
    inner: S,
    ttl: Duration,
    entries: DashMap<(String, TradingMode), CacheEntry>,
}

pub const DEFAULT_CANDLE_TTL_SECS: i64 = 300;

impl<S: CandleSource> TtlCandleCache<S> {
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: DashMap::new(),
        }
    }

    pub fn with_default_ttl(inner: S) -> Self {
        Self::new(inner, Duration::seconds(DEFAULT_CANDLE_TTL_SECS))
    }

    pub fn invalidate(&self, index: &str, mode: TradingMode) {
        self.entries.remove(&(index.to_ascii_uppercase(), mode));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn fresh(&self, key: &(String, TradingMode)) -> Option<Arc<Vec<Candle>>> {
        let entry = self.entries.get(key)?;
        if Utc::now() - entry.cached_at < self.ttl {
            Some(Arc::clone(&entry.candles))
        } else {
            None
        }
    }
}

#[async_trait]
impl<S: CandleSource> CandleSource for TtlCandleCache<S> {
    async fn get_candles(&self, index: &str, mode: TradingMode) -> Result<Vec<Candle>, AnalysisError> {
        let key = (index.to_ascii_uppercase(), mode);
        if let Some(candles) = self.fresh(&key) {
            tracing::debug!(index, %mode, "candle cache hit");
            return Ok(candles.as_ref().clone());
        }

        let candles = self.inner.get_candles(index, mode).await?;
        self.entries.insert(
            key,
            CacheEntry {
                candles: Arc::new(candles.clone()),
                cached_at: Utc::now(),
            },
        );
        Ok(candles)
    }
}
