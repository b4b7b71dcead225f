//! Canonical URL feature extraction and the schema it fills.

mod brand;
mod lexical;
mod schema;

pub use self::schema::{
    is_known_feature, DuplicateFeature, FeatureSchema, CANONICAL_FEATURES, NETWORK_CONSTANTS,
};
pub use self::brand::{BrandChecker, Imitation};
pub use self::lexical::{extract, hostname, UrlFeatures};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// URL could not be parsed, even with a default scheme prefixed.
/// Callers must treat the URL as suspicious, never as a low-risk profile.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot extract features from {url:?}: {reason}")]
pub struct ExtractionFailure {
    pub url: String,
    pub reason: String,
}

/// Feature name → value. Built once per URL and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector {
    values: BTreeMap<String, f64>,
}

impl FeatureVector {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    /// Value for `name`; absent features read as 0.
    pub fn value_or_zero(&self, name: &str) -> f64 {
        self.get(name).unwrap_or(0.0)
    }

    /// Dense values in schema order, absent entries filled with 0.
    pub fn to_dense(&self, schema: &FeatureSchema) -> Vec<f64> {
        schema.names().iter().map(|n| self.value_or_zero(n)).collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for FeatureVector {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}
