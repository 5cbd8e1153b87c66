use std::path::Path;

use clearbook_categorize::{
    KeywordClassifier, KeywordRule, LearnedRuleMatcher, DEFAULT_FUZZY_THRESHOLD,
    DEFAULT_MATCH_THRESHOLD, DEFAULT_MIN_PATTERN_LEN,
};
use clearbook_core::Money;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tunables for matching and reconciliation, read from TOML.
///
/// ```toml
/// fuzzy_pattern_threshold = 0.6
/// learned_match_threshold = 0.5
/// min_pattern_len = 2
/// balance_tolerance = "0.01"
///
/// [[keyword_table]]
/// category = "software"
/// keywords = ["adobe", "github"]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_fuzzy_pattern_threshold")]
    pub fuzzy_pattern_threshold: f32,
    #[serde(default = "default_learned_match_threshold")]
    pub learned_match_threshold: f32,
    #[serde(default = "default_min_pattern_len")]
    pub min_pattern_len: usize,
    #[serde(default = "default_balance_tolerance")]
    pub balance_tolerance: Decimal,
    /// Replaces the built-in keyword table when present. Order is precedence.
    #[serde(default)]
    pub keyword_table: Option<Vec<KeywordRule>>,
}

fn default_fuzzy_pattern_threshold() -> f32 {
    DEFAULT_FUZZY_THRESHOLD
}

fn default_learned_match_threshold() -> f32 {
    DEFAULT_MATCH_THRESHOLD
}

fn default_min_pattern_len() -> usize {
    DEFAULT_MIN_PATTERN_LEN
}

fn default_balance_tolerance() -> Decimal {
    Decimal::new(1, 2)
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fuzzy_pattern_threshold: default_fuzzy_pattern_threshold(),
            learned_match_threshold: default_learned_match_threshold(),
            min_pattern_len: default_min_pattern_len(),
            balance_tolerance: default_balance_tolerance(),
            keyword_table: None,
        }
    }
}

impl EngineConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("fuzzy_pattern_threshold", self.fuzzy_pattern_threshold),
            ("learned_match_threshold", self.learned_match_threshold),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be in (0, 1], got {value}"
                )));
            }
        }
        if self.min_pattern_len == 0 {
            return Err(ConfigError::Invalid(
                "min_pattern_len must be at least 1".to_string(),
            ));
        }
        if self.balance_tolerance.is_sign_negative() {
            return Err(ConfigError::Invalid(format!(
                "balance_tolerance must not be negative, got {}",
                self.balance_tolerance
            )));
        }
        Ok(())
    }

    pub fn matcher(&self) -> LearnedRuleMatcher {
        LearnedRuleMatcher::new(
            self.fuzzy_pattern_threshold,
            self.learned_match_threshold,
            self.min_pattern_len,
        )
    }

    pub fn classifier(&self) -> KeywordClassifier {
        match &self.keyword_table {
            Some(rules) => KeywordClassifier::new(rules.clone()),
            None => KeywordClassifier::default(),
        }
    }

    pub fn balance_tolerance(&self) -> Money {
        Money::from_decimal(self.balance_tolerance)
    }
}
