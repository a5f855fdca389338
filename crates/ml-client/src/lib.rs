pub mod error;
pub mod predictor;
pub mod validator;

pub use error::{MLError, MLResult};
pub use predictor::{SignalPredictorClient, MIN_PREDICTION_CANDLES};
pub use validator::LlmValidatorClient;

use std::time::Duration;

/// Endpoints of the external model services; unset URLs disable that collaborator
#[derive(Debug, Clone)]
pub struct MLConfig {
    pub predictor_url: Option<String>,
    pub validator_url: Option<String>,
    pub timeout: Duration,
}

impl Default for MLConfig {
    fn default() -> Self {
        Self {
            predictor_url: None,
            validator_url: None,
            timeout: Duration::from_secs(10),
        }
    }
}

impl MLConfig {
    /// Reads ML_PREDICTOR_URL, LLM_VALIDATOR_URL and ML_TIMEOUT_SECS
    pub fn from_env() -> Self {
        let url = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        let timeout = std::env::var("ML_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(10));

        Self {
            predictor_url: url("ML_PREDICTOR_URL"),
            validator_url: url("LLM_VALIDATOR_URL"),
            timeout,
        }
    }

    pub fn predictor(&self) -> MLResult<Option<SignalPredictorClient>> {
        self.predictor_url
            .clone()
            .map(|url| SignalPredictorClient::new(url, self.timeout))
            .transpose()
    }

    pub fn validator(&self) -> MLResult<Option<LlmValidatorClient>> {
        self.validator_url
            .clone()
            .map(|url| LlmValidatorClient::new(url, self.timeout))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_has_no_collaborators() {
        let config = MLConfig::default();
        assert!(config.predictor().unwrap().is_none());
        assert!(config.validator().unwrap().is_none());
    }

    #[test]
    fn test_configured_urls_build_clients() {
        let config = MLConfig {
            predictor_url: Some("http://localhost:8003".to_string()),
            validator_url: Some("http://localhost:8005".to_string()),
            timeout: Duration::from_secs(2),
        };
        assert!(config.predictor().unwrap().is_some());
        assert!(config.validator().unwrap().is_some());
    }
}
