//! Engine tuning: event weights, collection caps, scoring coefficients.
//!
//! `EngineConfig::default()` reproduces the built-in constants exactly.
//! Every section deserializes with per-field defaults so a partial
//! override file only needs to name the values it changes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::*;

/// Affinity weight added per positive event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventWeights {
    pub view: f64,
    pub like: f64,
    pub collect: f64,
}

impl Default for EventWeights {
    fn default() -> Self {
        Self {
            view: VIEW_WEIGHT,
            like: LIKE_WEIGHT,
            collect: COLLECT_WEIGHT,
        }
    }
}

/// Size limits for the capped profile collections.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Caps {
    pub affinity: usize,
    pub view_history: usize,
    pub search_keywords: usize,
}

impl Default for Caps {
    fn default() -> Self {
        Self {
            affinity: AFFINITY_CAP,
            view_history: VIEW_HISTORY_CAP,
            search_keywords: SEARCH_KEYWORDS_CAP,
        }
    }
}

/// Coefficients of the candidate score.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub affinity_multiplier: f64,
    pub unseen_bonus: f64,
    pub view_divisor: f64,
    pub view_cap: f64,
    pub like_divisor: f64,
    pub like_cap: f64,
    pub collect_divisor: f64,
    pub collect_cap: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            affinity_multiplier: AFFINITY_MULTIPLIER,
            unseen_bonus: UNSEEN_BONUS,
            view_divisor: VIEW_COUNT_DIVISOR,
            view_cap: VIEW_COUNT_CAP,
            like_divisor: LIKE_COUNT_DIVISOR,
            like_cap: LIKE_COUNT_CAP,
            collect_divisor: COLLECT_COUNT_DIVISOR,
            collect_cap: COLLECT_COUNT_CAP,
        }
    }
}

impl ScoringWeights {
    /// Upper bound of the three popularity terms combined.
    pub fn max_popularity(&self) -> f64 {
        self.view_cap + self.like_cap + self.collect_cap
    }
}

/// How many entries the recommendation helpers return.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendLimits {
    pub categories: usize,
    pub keywords: usize,
    pub page_size: usize,
}

impl Default for RecommendLimits {
    fn default() -> Self {
        Self {
            categories: RECOMMENDED_CATEGORIES,
            keywords: RECOMMENDED_KEYWORDS,
            page_size: PAGE_SIZE,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub weights: EventWeights,
    pub caps: Caps,
    pub scoring: ScoringWeights,
    pub recommend: RecommendLimits,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A divisor must be positive and finite.
    InvalidDivisor { field: &'static str, value: f64 },
    /// Weights, caps and bonuses must be non-negative and finite.
    InvalidWeight { field: &'static str, value: f64 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidDivisor { field, value } => {
                write!(f, "{field} must be a positive finite number, got {value}")
            }
            ConfigError::InvalidWeight { field, value } => {
                write!(f, "{field} must be a non-negative finite number, got {value}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl EngineConfig {
    /// Reject values that would make scores negative, infinite or NaN.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.scoring;
        for (field, value) in [
            ("scoring.view_divisor", s.view_divisor),
            ("scoring.like_divisor", s.like_divisor),
            ("scoring.collect_divisor", s.collect_divisor),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::InvalidDivisor { field, value });
            }
        }

        let w = &self.weights;
        for (field, value) in [
            ("weights.view", w.view),
            ("weights.like", w.like),
            ("weights.collect", w.collect),
            ("scoring.affinity_multiplier", s.affinity_multiplier),
            ("scoring.unseen_bonus", s.unseen_bonus),
            ("scoring.view_cap", s.view_cap),
            ("scoring.like_cap", s.like_cap),
            ("scoring.collect_cap", s.collect_cap),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::InvalidWeight { field, value });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_constants() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.caps.affinity, 5);
        assert_eq!(cfg.caps.view_history, 50);
        assert_eq!(cfg.caps.search_keywords, 20);
        assert_eq!(cfg.weights.like, 2.0);
        assert_eq!(cfg.scoring.max_popularity(), 18.0);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let cfg: EngineConfig =
            serde_json::from_str(r#"{"weights": {"collect": 4.0}}"#).unwrap();
        assert_eq!(cfg.weights.collect, 4.0);
        assert_eq!(cfg.weights.view, 1.0);
        assert_eq!(cfg.caps, Caps::default());
    }

    #[test]
    fn test_zero_divisor_rejected() {
        let mut cfg = EngineConfig::default();
        cfg.scoring.like_divisor = 0.0;
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::InvalidDivisor {
                field: "scoring.like_divisor",
                value: 0.0
            })
        );
    }

    #[test]
    fn test_negative_weight_rejected() {
        let mut cfg = EngineConfig::default();
        cfg.weights.view = -1.0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("weights.view"));
    }

    #[test]
    fn test_nan_rejected() {
        let mut cfg = EngineConfig::default();
        cfg.scoring.unseen_bonus = f64::NAN;
        assert!(cfg.validate().is_err());
    }
}
