//! Ordered feature schema shared by the artifact producer and consumer.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Names of the URL features, in the positional order split nodes index into.
pub const CANONICAL_FEATURES: [&str; 22] = [
    "url_length",
    "domain_dot_count",
    "domain_length",
    "has_ip",
    "has_at_symbol",
    "subdomain_count",
    "path_length",
    "query_param_count",
    "has_cyrillic",
    "is_https",
    "has_tilde",
    "has_underscore",
    "special_char_count",
    "domain_digit_count",
    "domain_digit_ratio",
    "has_redirect_param",
    "tld_length",
    "has_suspicious_words",
    "subdomain_level",
    "has_port",
    "domain_hyphen_count",
    "domain_hyphen_ratio",
];

/// Features that would need network access. They are frozen to these values
/// so that artifacts trained with them still evaluate offline.
pub const NETWORK_CONSTANTS: [(&str, f64); 9] = [
    ("redirect_count", 0.0),
    ("favicon_domain_match", 0.0),
    ("domain_age", 0.0),
    ("domain_is_registered", 1.0),
    ("external_favicon", 0.0),
    ("links_pointing_to_page", 0.0),
    ("statistical_report", 0.0),
    ("foreign_request_ratio", 0.0),
    ("google_index", 0.0),
];

/// Whether the extractor produces a value for `name`.
pub fn is_known_feature(name: &str) -> bool {
    CANONICAL_FEATURES.contains(&name) || NETWORK_CONSTANTS.iter().any(|(n, _)| *n == name)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("duplicate feature name in schema: {0}")]
pub struct DuplicateFeature(pub String);

/// Ordered, duplicate-free list of feature names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct FeatureSchema {
    names: Vec<String>,
}

impl FeatureSchema {
    pub fn new<I, S>(names: I) -> Result<Self, DuplicateFeature>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let mut seen = HashSet::with_capacity(names.len());
        for name in &names {
            if !seen.insert(name.as_str()) {
                return Err(DuplicateFeature(name.clone()));
            }
        }
        Ok(Self { names })
    }

    /// The schema the URL extractor fills.
    pub fn canonical() -> Self {
        Self {
            names: CANONICAL_FEATURES.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Names the extractor never produces; they always evaluate as 0.
    pub fn unknown_features(&self) -> Vec<&str> {
        self.names
            .iter()
            .map(String::as_str)
            .filter(|n| !is_known_feature(n))
            .collect()
    }
}

impl TryFrom<Vec<String>> for FeatureSchema {
    type Error = DuplicateFeature;

    fn try_from(names: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(names)
    }
}

impl From<FeatureSchema> for Vec<String> {
    fn from(schema: FeatureSchema) -> Self {
        schema.names
    }
}
