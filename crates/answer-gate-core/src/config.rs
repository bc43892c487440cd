//! Scoring and fallback tuning parameters, decoupled from application config.
//!
//! Both structs are plain values handed to the assessor, detector, and
//! orchestrator constructors. Constructors validate them once, so an
//! out-of-range weight or threshold can never reach call time.

use serde::Deserialize;
use thiserror::Error;

/// Invalid scoring or retrieval parameter.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be in [0.0, 1.0], got {value}")]
    OutOfRange { name: &'static str, value: f64 },
    #[error("at least one positive quality weight must be non-zero")]
    AllWeightsZero,
    #[error("{name} must be >= 1")]
    ZeroCount { name: &'static str },
    #[error("fallback_k ({fallback_k}) must be >= k ({k})")]
    FallbackSmallerThanDefault { k: usize, fallback_k: usize },
}

/// Weights and thresholds for answer scoring.
///
/// `overall = cw·completeness + sw·specificity + rw·relevance + fw·confidence
///            − hallucination_penalty·hallucination_risk`, clamped to `[0, 1]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub completeness_weight: f64,
    pub specificity_weight: f64,
    pub relevance_weight: f64,
    pub confidence_weight: f64,
    pub hallucination_penalty: f64,
    /// `needs_fallback` is true when the overall score is strictly below this.
    pub fallback_threshold: f64,
    /// `is_hallucination_likely` is true when the detector risk is strictly above this.
    pub hallucination_threshold: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            completeness_weight: 0.3,
            specificity_weight: 0.25,
            relevance_weight: 0.25,
            confidence_weight: 0.2,
            hallucination_penalty: 0.5,
            fallback_threshold: 0.6,
            hallucination_threshold: 0.5,
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("scoring.completeness_weight", self.completeness_weight),
            ("scoring.specificity_weight", self.specificity_weight),
            ("scoring.relevance_weight", self.relevance_weight),
            ("scoring.confidence_weight", self.confidence_weight),
            ("scoring.hallucination_penalty", self.hallucination_penalty),
            ("scoring.fallback_threshold", self.fallback_threshold),
            ("scoring.hallucination_threshold", self.hallucination_threshold),
        ];
        for (name, value) in fields {
            // NaN fails the range check too
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfRange { name, value });
            }
        }

        let positive = self.completeness_weight
            + self.specificity_weight
            + self.relevance_weight
            + self.confidence_weight;
        if positive <= 0.0 {
            return Err(ConfigError::AllWeightsZero);
        }

        Ok(())
    }
}

/// Retrieval sizes and cut-offs used by the gate and its fallback strategies.
///
/// When deserialized without `fallback_k`, it is derived as `2 × k`.
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "RawFallbackParams")]
pub struct FallbackParams {
    /// Passages fetched for the primary answer.
    pub k: usize,
    /// Passages fetched by `increase_context`.
    pub fallback_k: usize,
    /// `strict_matching` keeps passages whose distance is strictly below this.
    pub strict_distance: f64,
    /// Passages fetched per rewrite by `query_expansion`.
    pub expansion_k: usize,
    /// Passages fetched per rewrite by `multi_strategy`.
    pub multi_expanded_k: usize,
}

impl Default for FallbackParams {
    fn default() -> Self {
        Self {
            k: 4,
            fallback_k: 8,
            strict_distance: 0.5,
            expansion_k: 3,
            multi_expanded_k: 2,
        }
    }
}

/// On-disk form of [`FallbackParams`]; every key is optional.
#[derive(Deserialize)]
struct RawFallbackParams {
    k: Option<usize>,
    fallback_k: Option<usize>,
    strict_distance: Option<f64>,
    expansion_k: Option<usize>,
    multi_expanded_k: Option<usize>,
}

impl From<RawFallbackParams> for FallbackParams {
    fn from(raw: RawFallbackParams) -> Self {
        let defaults = FallbackParams::default();
        let k = raw.k.unwrap_or(defaults.k);
        Self {
            k,
            fallback_k: raw.fallback_k.unwrap_or_else(|| k.saturating_mul(2)),
            strict_distance: raw.strict_distance.unwrap_or(defaults.strict_distance),
            expansion_k: raw.expansion_k.unwrap_or(defaults.expansion_k),
            multi_expanded_k: raw.multi_expanded_k.unwrap_or(defaults.multi_expanded_k),
        }
    }
}

impl FallbackParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("retrieval.k", self.k),
            ("retrieval.fallback_k", self.fallback_k),
            ("retrieval.expansion_k", self.expansion_k),
            ("retrieval.multi_expanded_k", self.multi_expanded_k),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroCount { name });
            }
        }
        if self.fallback_k < self.k {
            return Err(ConfigError::FallbackSmallerThanDefault {
                k: self.k,
                fallback_k: self.fallback_k,
            });
        }
        if !(0.0..=1.0).contains(&self.strict_distance) {
            return Err(ConfigError::OutOfRange {
                name: "retrieval.strict_distance",
                value: self.strict_distance,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(ScoringConfig::default().validate().is_ok());
        assert!(FallbackParams::default().validate().is_ok());
    }

    #[test]
    fn test_weight_out_of_range() {
        let cfg = ScoringConfig {
            relevance_weight: 1.5,
            ..Default::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::OutOfRange {
                name: "scoring.relevance_weight",
                value: 1.5
            })
        );
    }

    #[test]
    fn test_nan_rejected() {
        let cfg = ScoringConfig {
            fallback_threshold: f64::NAN,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_all_zero_weights() {
        let cfg = ScoringConfig {
            completeness_weight: 0.0,
            specificity_weight: 0.0,
            relevance_weight: 0.0,
            confidence_weight: 0.0,
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::AllWeightsZero));
    }

    #[test]
    fn test_fallback_k_must_cover_k() {
        let params = FallbackParams {
            k: 6,
            fallback_k: 4,
            ..Default::default()
        };
        assert!(matches!(
            params.validate(),
            Err(ConfigError::FallbackSmallerThanDefault { .. })
        ));
    }

    #[test]
    fn test_fallback_k_follows_k() {
        let params: FallbackParams = serde_json::from_str(r#"{"k": 10}"#).unwrap();
        assert_eq!(params.fallback_k, 20);
        assert!(params.validate().is_ok());

        let params: FallbackParams = serde_json::from_str(r#"{"k": 3, "fallback_k": 5}"#).unwrap();
        assert_eq!(params.fallback_k, 5);

        let params: FallbackParams = serde_json::from_str("{}").unwrap();
        assert_eq!(params.k, 4);
        assert_eq!(params.fallback_k, 8);
        assert_eq!(params.expansion_k, 3);
    }

    #[test]
    fn test_zero_count() {
        let params = FallbackParams {
            expansion_k: 0,
            ..Default::default()
        };
        assert_eq!(
            params.validate(),
            Err(ConfigError::ZeroCount {
                name: "retrieval.expansion_k"
            })
        );
    }
}
