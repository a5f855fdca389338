use analysis_core::AnalysisError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MLError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Model not loaded")]
    ModelNotLoaded,

    #[error("Not enough candles for a prediction: need {needed}, got {got}")]
    InsufficientHistory { needed: usize, got: usize },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type MLResult<T> = Result<T, MLError>;

impl From<MLError> for AnalysisError {
    fn from(err: MLError) -> Self {
        match err {
            MLError::InsufficientHistory { needed, got } => AnalysisError::InsufficientData(format!(
                "ML predictor needs {} candles, got {}",
                needed, got
            )),
            MLError::InvalidResponse(msg) => AnalysisError::InvalidData(msg),
            other => AnalysisError::UpstreamUnavailable(other.to_string()),
        }
    }
}
