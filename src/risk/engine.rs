//! Bands a phishing probability into a coarse risk level.

use crate::config::RiskConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_probability(probability: f64, config: &RiskConfig) -> Self {
        if probability >= config.high_threshold {
            RiskLevel::High
        } else if probability >= config.medium_threshold {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RiskEngine {
    config: RiskConfig,
}

impl RiskEngine {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn assess(&self, probability: f64) -> RiskLevel {
        RiskLevel::from_probability(probability, &self.config)
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bands() {
        let engine = RiskEngine::default();
        assert_eq!(engine.assess(0.0), RiskLevel::Low);
        assert_eq!(engine.assess(0.499), RiskLevel::Low);
        assert_eq!(engine.assess(0.5), RiskLevel::Medium);
        assert_eq!(engine.assess(0.8), RiskLevel::High);
        assert_eq!(engine.assess(1.0), RiskLevel::High);
    }

    #[test]
    fn custom_thresholds() {
        let engine = RiskEngine::new(RiskConfig {
            high_threshold: 0.95,
            medium_threshold: 0.2,
        });
        assert_eq!(engine.assess(0.9), RiskLevel::Medium);
        assert_eq!(engine.assess(0.1), RiskLevel::Low);
    }
}
