//! Scoring: ensemble traversal, probability, and the URL-level detector.

mod detector;
mod engine;

pub use detector::Detector;
pub use engine::{predict, score, sigmoid, Score};

use crate::explain::FALLBACK_REASON;
use crate::features::Imitation;
use crate::risk::RiskLevel;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

pub const TRUSTED_DOMAIN_REASON: &str = "trusted domain";

/// Verdict for one URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub is_phishing: bool,
    /// Phishing probability in [0, 1].
    pub probability: f64,
    /// Aggregated leaf value before the link function.
    pub raw_score: f64,
    pub reasons: Vec<String>,
    /// `round((1 - probability) * 100)`.
    pub safety_score: u8,
    pub level: RiskLevel,
}

impl Prediction {
    pub(crate) fn new(score: Score, reasons: Vec<String>, level: RiskLevel) -> Self {
        Self {
            is_phishing: score.probability > 0.5,
            probability: score.probability,
            raw_score: score.raw,
            reasons,
            safety_score: safety_score(score.probability),
            level,
        }
    }

    /// Verdict for a URL that could not be scored. It is never reported as safe.
    pub fn unclassifiable(err: &impl Display) -> Self {
        Self {
            is_phishing: true,
            probability: 0.5,
            raw_score: 0.0,
            reasons: vec![format!("URL could not be analyzed: {err}")],
            safety_score: 50,
            level: RiskLevel::Medium,
        }
    }

    /// Flag a look-alike host. The model probability is kept; the imitation
    /// reason goes first and replaces a lone fallback reason.
    pub(crate) fn imitating(mut self, imitation: &Imitation) -> Self {
        if self.reasons.len() == 1 && self.reasons[0] == FALLBACK_REASON {
            self.reasons.clear();
        }
        self.reasons
            .insert(0, format!("domain imitates {}", imitation.domain));
        self.is_phishing = true;
        self.level = RiskLevel::High;
        self
    }

    /// Allowlisted host; the ensemble is not consulted.
    pub(crate) fn trusted() -> Self {
        Self {
            is_phishing: false,
            probability: 0.0,
            raw_score: 0.0,
            reasons: vec![TRUSTED_DOMAIN_REASON.to_string()],
            safety_score: 100,
            level: RiskLevel::Low,
        }
    }
}

fn safety_score(probability: f64) -> u8 {
    ((1.0 - probability) * 100.0).round().clamp(0.0, 100.0) as u8
}
