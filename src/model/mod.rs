//! Tree ensembles: arena trees, native dump normalization, artifact format.

pub mod artifact;
pub mod tree;
pub mod xgboost;

pub use artifact::{
    deserialize, deserialize_with, fingerprint, load_artifact, load_with_fallback, save_artifact,
    serialize, ArtifactError, LoadOptions, FORMAT_VERSION,
};
pub use tree::{EncodeTree, Node, NodeId, NodeShape, Tree, TreeBuilder, TreeError, TreeNode};
pub use xgboost::{DumpNode, DumpTree, FeatureRef, XgbDump};

use crate::features::FeatureSchema;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How leaf values aggregate into a probability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    /// Leaves are raw margins: sum, add `base_score`, apply the logistic.
    #[default]
    BinaryLogistic,
    /// Leaves are probabilities (random-forest style): average.
    ProbabilityAverage,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnsembleMeta {
    pub objective: Objective,
    pub base_score: f64,
    pub created_at: Option<DateTime<Utc>>,
    /// Free-form origin tag, e.g. the exporting library.
    pub source: Option<String>,
}

/// Validated, immutable ensemble with the schema its splits index into.
#[derive(Debug, Clone, PartialEq)]
pub struct Ensemble {
    trees: Vec<Tree>,
    schema: FeatureSchema,
    meta: EnsembleMeta,
}

impl Ensemble {
    /// Rejects any split whose feature index falls outside the schema.
    pub fn new(
        trees: Vec<Tree>,
        schema: FeatureSchema,
        meta: EnsembleMeta,
    ) -> Result<Self, ArtifactError> {
        for (tree_idx, tree) in trees.iter().enumerate() {
            for (node, n) in tree.nodes().iter().enumerate() {
                if let Node::Split { feature_index, .. } = *n {
                    if feature_index as usize >= schema.len() {
                        return Err(ArtifactError::SchemaMismatch {
                            tree: tree_idx,
                            node,
                            feature_index,
                            schema_len: schema.len(),
                        });
                    }
                }
            }
        }
        Ok(Self {
            trees,
            schema,
            meta,
        })
    }

    /// No trees: every prediction is maximally uncertain.
    pub fn empty(schema: FeatureSchema) -> Self {
        Self {
            trees: Vec::new(),
            schema,
            meta: EnsembleMeta::default(),
        }
    }

    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn meta(&self) -> &EnsembleMeta {
        &self.meta
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }
}

/// Upstream producers (trainers, library dumps) hand their fitted model
/// over through this trait.
pub trait ExportModel {
    fn export(&self) -> Result<Ensemble, ArtifactError>;
}
