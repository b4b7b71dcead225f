//! phishtree: portable tree-ensemble phishing URL detector.
//!
//! Modular structure:
//! - [`features`]: lexical URL feature extraction and the canonical schema
//! - [`model`]: arena trees, native dump normalization, artifact format
//! - [`inference`]: ensemble scoring and the URL-level [`Detector`]
//! - [`explain`]: rule-based reasons attached to each prediction
//! - [`risk`]: probability to risk level banding
//! - [`logging`]: tracing setup and ndjson scan records

pub mod config;
pub mod error;
pub mod explain;
pub mod features;
pub mod inference;
pub mod logging;
pub mod model;
pub mod risk;

pub use config::DetectorConfig;
pub use error::DetectorError;
pub use explain::Explainer;
pub use features::{extract, FeatureSchema, FeatureVector};
pub use inference::{predict, Detector, Prediction};
pub use logging::StructuredLogger;
pub use model::{Ensemble, ExportModel};
pub use risk::{RiskEngine, RiskLevel};
