//! Human-readable reasons for a prediction.
//!
//! This is a heuristic gloss over the feature vector: a fixed table of
//! threshold rules, evaluated in priority order. It does not attribute the
//! ensemble's score to features and can disagree with what the trees used.

use crate::config::ExplainConfig;
use crate::features::FeatureVector;

/// Emitted when no rule fires.
pub const FALLBACK_REASON: &str = "combination of URL features matches phishing patterns";

#[derive(Debug, Clone, Copy)]
enum Test {
    /// Boolean feature equals 1.
    Set,
    /// Boolean feature equals 0.
    Unset,
    Above(Limit),
}

#[derive(Debug, Clone, Copy)]
enum Limit {
    UrlLength,
    SubdomainLevel,
    SpecialChars,
    DomainHyphens,
}

impl Limit {
    fn value(self, config: &ExplainConfig) -> f64 {
        match self {
            Limit::UrlLength => config.max_url_length,
            Limit::SubdomainLevel => config.max_subdomain_level,
            Limit::SpecialChars => config.max_special_chars,
            Limit::DomainHyphens => config.max_domain_hyphens,
        }
    }
}

struct Rule {
    feature: &'static str,
    test: Test,
    reason: &'static str,
}

const RULES: &[Rule] = &[
    Rule { feature: "has_ip", test: Test::Set, reason: "IP literal present" },
    Rule { feature: "has_at_symbol", test: Test::Set, reason: "'@' symbol present" },
    Rule {
        feature: "url_length",
        test: Test::Above(Limit::UrlLength),
        // rendered with the configured limit
        reason: "URL length exceeds {} characters",
    },
    Rule { feature: "has_suspicious_words", test: Test::Set, reason: "suspicious keywords present" },
    Rule { feature: "has_cyrillic", test: Test::Set, reason: "Cyrillic script present" },
    Rule {
        feature: "subdomain_level",
        test: Test::Above(Limit::SubdomainLevel),
        reason: "excessive subdomains",
    },
    Rule { feature: "has_redirect_param", test: Test::Set, reason: "redirect parameter present" },
    Rule {
        feature: "special_char_count",
        test: Test::Above(Limit::SpecialChars),
        reason: "excessive special characters",
    },
    Rule {
        feature: "domain_hyphen_count",
        test: Test::Above(Limit::DomainHyphens),
        reason: "excessive hyphens in domain",
    },
    Rule { feature: "is_https", test: Test::Unset, reason: "connection is not HTTPS" },
];

#[derive(Debug, Clone, Default)]
pub struct Explainer {
    config: ExplainConfig,
}

impl Explainer {
    pub fn new(config: ExplainConfig) -> Self {
        Self { config }
    }

    /// Reasons in rule priority order; never empty.
    pub fn explain(&self, vector: &FeatureVector) -> Vec<String> {
        let mut reasons: Vec<String> = RULES
            .iter()
            .filter(|rule| {
                let v = vector.value_or_zero(rule.feature);
                match rule.test {
                    Test::Set => v == 1.0,
                    Test::Unset => v == 0.0,
                    Test::Above(limit) => v > limit.value(&self.config),
                }
            })
            .map(|rule| match rule.test {
                Test::Above(limit @ Limit::UrlLength) => rule
                    .reason
                    .replace("{}", &limit.value(&self.config).to_string()),
                _ => rule.reason.to_string(),
            })
            .collect();
        if reasons.is_empty() {
            reasons.push(FALLBACK_REASON.to_string());
        }
        reasons
    }
}

/// Explain with the default limits.
pub fn explain(vector: &FeatureVector) -> Vec<String> {
    Explainer::default().explain(vector)
}
