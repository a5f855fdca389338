use anyhow::{Context, Result};
use options_analysis::OptionChainConfig;
use serde::{Deserialize, Serialize};
use std::env;
use technical_analysis::TechnicalConfig;

use crate::psychology::PsychologyConfig;
use crate::risk::RiskConfig;

/// Policy constants for combining the ML prediction and the LLM check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionConfig {
    pub ml_weight: f64,
    pub llm_weight: f64,
    /// Minimum LLM confidence for an AGREE to pass the ML signal through
    pub agreement_threshold: f64,
    /// When false, a missing LLM verdict passes the ML signal through instead of SKIP
    pub require_llm_agreement: bool,
    pub auto_execute_min_confidence: f64,
    pub auto_execute_min_rrr: f64,
    /// Reward multiple used when no support/resistance target is far enough away
    pub fallback_rrr: f64,
    /// A level target must sit at least this many risk units from entry
    pub min_target_risk_multiple: f64,
    /// Net technical vote needed to call BUY/SELL when the ML predictor is absent
    pub vote_threshold: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            ml_weight: 0.6,
            llm_weight: 0.4,
            agreement_threshold: 0.75,
            require_llm_agreement: true,
            auto_execute_min_confidence: 0.85,
            auto_execute_min_rrr: 1.2,
            fallback_rrr: 1.5,
            min_target_risk_multiple: 1.0,
            vote_threshold: 2.0,
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {}: {}", key, raw)),
        Err(_) => Ok(default),
    }
}

impl FusionConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            ml_weight: env_or("FUSION_ML_WEIGHT", defaults.ml_weight)?,
            llm_weight: env_or("FUSION_LLM_WEIGHT", defaults.llm_weight)?,
            agreement_threshold: env_or("FUSION_AGREEMENT_THRESHOLD", defaults.agreement_threshold)?,
            require_llm_agreement: env_or("FUSION_REQUIRE_LLM", defaults.require_llm_agreement)?,
            auto_execute_min_confidence: env_or("AUTO_EXECUTE_MIN_CONFIDENCE", defaults.auto_execute_min_confidence)?,
            auto_execute_min_rrr: env_or("AUTO_EXECUTE_MIN_RRR", defaults.auto_execute_min_rrr)?,
            fallback_rrr: env_or("FUSION_FALLBACK_RRR", defaults.fallback_rrr)?,
            min_target_risk_multiple: env_or("FUSION_MIN_TARGET_RISK_MULTIPLE", defaults.min_target_risk_multiple)?,
            vote_threshold: env_or("FUSION_VOTE_THRESHOLD", defaults.vote_threshold)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.ml_weight < 0.0 || self.llm_weight < 0.0 || self.ml_weight + self.llm_weight <= 0.0 {
            anyhow::bail!(
                "fusion weights must be non-negative with a positive sum (ml={}, llm={})",
                self.ml_weight,
                self.llm_weight
            );
        }
        if !(0.0..=1.0).contains(&self.agreement_threshold) {
            anyhow::bail!("agreement threshold must be within [0, 1], got {}", self.agreement_threshold);
        }
        if self.fallback_rrr <= 0.0 {
            anyhow::bail!("fallback RRR must be positive, got {}", self.fallback_rrr);
        }
        Ok(())
    }
}

/// Everything the signal engine needs, grouped by analyzer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    pub technical: TechnicalConfig,
    pub options: OptionChainConfig,
    pub fusion: FusionConfig,
    pub risk: RiskConfig,
    pub psychology: PsychologyConfig,
}

impl EngineConfig {
    /// Defaults everywhere except the fusion policy, which honours env overrides.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            fusion: FusionConfig::from_env()?,
            ..Self::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = FusionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ml_weight, 0.6);
        assert_eq!(config.llm_weight, 0.4);
        assert_eq!(config.agreement_threshold, 0.75);
    }

    #[test]
    fn test_rejects_zero_weights() {
        let config = FusionConfig {
            ml_weight: 0.0,
            llm_weight: 0.0,
            ..FusionConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_override_parse_error() {
        // Unique key so parallel tests do not race on it
        env::set_var("FUSION_TEST_ONLY_WEIGHT", "not-a-number");
        assert!(env_or("FUSION_TEST_ONLY_WEIGHT", 0.5_f64).is_err());
        env::remove_var("FUSION_TEST_ONLY_WEIGHT");
        assert_eq!(env_or("FUSION_TEST_ONLY_WEIGHT", 0.5_f64).unwrap(), 0.5);
    }
}
