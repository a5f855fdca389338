use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Config error: {0}")]
    ConfigError(String),
}

impl AnalysisError {
    /// Collaborator failures that the fusion step degrades around instead of failing.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AnalysisError::InsufficientData(_) | AnalysisError::UpstreamUnavailable(_)
        )
    }
}
