use analysis_core::{AnalysisError, Candle};
use async_trait::async_trait;
use serde::Serialize;
use signal_orchestrator::{MlPrediction, MlPredictor};
use std::time::Duration;

use crate::error::{MLError, MLResult};

/// Fewest candles the model service accepts
pub const MIN_PREDICTION_CANDLES: usize = 5;

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    candles: &'a [Candle],
}

/// HTTP client for the candle classifier service
#[derive(Clone)]
pub struct SignalPredictorClient {
    client: reqwest::Client,
    base_url: String,
}

impl SignalPredictorClient {
    pub fn new(base_url: String, timeout: Duration) -> MLResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Classify the latest candle into BUY CALL / SELL CALL / HOLD
    pub async fn predict_signal(&self, candles: &[Candle]) -> MLResult<MlPrediction> {
        if candles.len() < MIN_PREDICTION_CANDLES {
            return Err(MLError::InsufficientHistory {
                needed: MIN_PREDICTION_CANDLES,
                got: candles.len(),
            });
        }

        let response = self
            .client
            .post(format!("{}/predict", self.base_url))
            .json(&PredictRequest { candles })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            if status == reqwest::StatusCode::SERVICE_UNAVAILABLE {
                return Err(MLError::ModelNotLoaded);
            }
            return Err(MLError::ServiceUnavailable(format!("Status: {}", status)));
        }

        let body = response.text().await?;
        parse_prediction(&body)
    }

    pub async fn health(&self) -> MLResult<bool> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;

        Ok(response.status().is_success())
    }
}

pub(crate) fn parse_prediction(body: &str) -> MLResult<MlPrediction> {
    let prediction: MlPrediction = serde_json::from_str(body)?;
    if !(0.0..=1.0).contains(&prediction.confidence) {
        return Err(MLError::InvalidResponse(format!(
            "confidence {} outside [0, 1]",
            prediction.confidence
        )));
    }
    Ok(prediction)
}

#[async_trait]
impl MlPredictor for SignalPredictorClient {
    async fn predict(&self, candles: &[Candle]) -> Result<MlPrediction, AnalysisError> {
        let prediction = self.predict_signal(candles).await?;
        tracing::debug!("ML predictor returned {} ({:.2})", prediction.ml_signal, prediction.confidence);
        Ok(prediction)
    }
}
