use analysis_core::AnalysisError;
use async_trait::async_trait;
use signal_orchestrator::{LlmValidation, LlmValidator, ValidationRequest};
use std::time::Duration;

use crate::error::{MLError, MLResult};

/// HTTP client for the LLM sanity-check service
#[derive(Clone)]
pub struct LlmValidatorClient {
    client: reqwest::Client,
    base_url: String,
}

impl LlmValidatorClient {
    pub fn new(base_url: String, timeout: Duration) -> MLResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn validate_signal(&self, request: &ValidationRequest) -> MLResult<LlmValidation> {
        let response = self
            .client
            .post(format!("{}/validate", self.base_url))
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(MLError::ServiceUnavailable(format!(
                "Status: {}",
                response.status()
            )));
        }

        let body = response.text().await?;
        parse_validation(&body)
    }
}

fn parse_validation(body: &str) -> MLResult<LlmValidation> {
    let validation: LlmValidation = serde_json::from_str(body)?;
    if !(0.0..=1.0).contains(&validation.confidence) {
        return Err(MLError::InvalidResponse(format!(
            "confidence {} outside [0, 1]",
            validation.confidence
        )));
    }
    Ok(validation)
}

#[async_trait]
impl LlmValidator for LlmValidatorClient {
    async fn validate(&self, request: &ValidationRequest) -> Result<LlmValidation, AnalysisError> {
        let validation = self.validate_signal(request).await?;
        tracing::debug!("LLM validator: {:?} ({:.2})", validation.decision, validation.confidence);
        Ok(validation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signal_orchestrator::LlmDecision;

    #[test]
    fn test_parse_validation() {
        let body = r#"{"decision": "DISAGREE", "confidence": 0.58, "reasoning": "RSI divergence"}"#;
        let validation = parse_validation(body).unwrap();
        assert_eq!(validation.decision, LlmDecision::Disagree);
        assert!(validation.warning.is_none());
    }

    #[test]
    fn test_malformed_body_is_serialization_error() {
        let err = parse_validation(r#"{"decision": "MAYBE"}"#).unwrap_err();
        assert!(matches!(err, MLError::Serialization(_)));
    }
}
