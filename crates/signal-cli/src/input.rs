//! JSON file inputs: candle series, option chains and market context.

use analysis_core::{AnalysisError, Candle, CandleSource, OptionChainSnapshot, OptionChainSource, TradingMode};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

/// Directory of `{INDEX}_{mode}.json` candle files and `{INDEX}_chain.json` snapshots
pub struct JsonDirSource {
    dir: PathBuf,
}

impl JsonDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn candle_path(&self, index: &str, mode: TradingMode) -> PathBuf {
        self.dir
            .join(format!("{}_{}.json", index.to_ascii_uppercase(), mode.as_str()))
    }

    fn chain_path(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{}_chain.json", symbol.to_ascii_uppercase()))
    }

    async fn load<T: DeserializeOwned>(path: &Path) -> Result<T, AnalysisError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| AnalysisError::UpstreamUnavailable(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&raw).map_err(|e| AnalysisError::InvalidData(format!("{}: {}", path.display(), e)))
    }
}

#[async_trait]
impl CandleSource for JsonDirSource {
    async fn get_candles(&self, index: &str, mode: TradingMode) -> Result<Vec<Candle>, AnalysisError> {
        Self::load(&self.candle_path(index, mode)).await
    }
}

#[async_trait]
impl OptionChainSource for JsonDirSource {
    async fn get_chain(&self, symbol: &str, expiry: Option<&str>) -> Result<OptionChainSnapshot, AnalysisError> {
        let mut chain: OptionChainSnapshot = Self::load(&self.chain_path(symbol)).await?;
        if let Some(expiry) = expiry {
            chain.rows.retain(|row| row.expiry_date == expiry);
        }
        Ok(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("signal-cli-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_reads_candles_by_index_and_mode() {
        let dir = scratch_dir("candles");
        let candles = vec![
            Candle::new(0, 100.0, 101.0, 99.0, 100.5, 10.0),
            Candle::new(300, 100.5, 102.0, 100.0, 101.5, 12.0),
        ];
        std::fs::write(dir.join("NIFTY_swing.json"), serde_json::to_string(&candles).unwrap()).unwrap();

        let source = JsonDirSource::new(&dir);
        let loaded = source.get_candles("nifty", TradingMode::Swing).await.unwrap();
        assert_eq!(loaded, candles);

        let missing = source.get_candles("NIFTY", TradingMode::Scalp).await.unwrap_err();
        assert!(matches!(missing, AnalysisError::UpstreamUnavailable(_)));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_malformed_file_is_invalid_data() {
        let dir = scratch_dir("malformed");
        std::fs::write(dir.join("BANKNIFTY_chain.json"), "{\"symbol\": 1}").unwrap();
        let err = JsonDirSource::new(&dir).get_chain("BANKNIFTY", None).await.unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidData(_)));
        std::fs::remove_dir_all(&dir).ok();
    }
}
