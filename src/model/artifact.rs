//! Artifact document: the ensemble and its feature schema in one JSON file.
//!
//! Written form: `{format_version, objective, base_score, num_features,
//! num_trees, created_at?, source?, feature_names, trees}` where each tree is
//! `{"nodes": [...]}`, its pre-order arena of `{"type": "leaf" | "split", ...}`
//! nodes with index children. Arenas keep the document depth constant however
//! deep the trees are.
//!
//! On read only `feature_names` and `trees` are required, and a tree may also
//! be a nested `{"type": ...}` node (version 1 documents) or a native dump
//! tree.

use super::tree::{EncodeTree, Node, Tree, TreeError, TreeNode};
use super::xgboost::{DumpNode, DumpTree};
use super::{Ensemble, EnsembleMeta, Objective};
use crate::features::{DuplicateFeature, FeatureSchema};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

pub const FORMAT_VERSION: u32 = 2;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to read artifact {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed artifact: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("artifact format version {found} is not supported (max {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },
    #[error("tree {tree} node {node} splits on feature {feature_index} but the schema has {schema_len} features")]
    SchemaMismatch {
        tree: usize,
        node: usize,
        feature_index: u32,
        schema_len: usize,
    },
    #[error("artifact declares {declared} features but lists {actual}")]
    FeatureCountMismatch { declared: usize, actual: usize },
    #[error("artifact declares {declared} trees but contains {actual}")]
    TreeCountMismatch { declared: usize, actual: usize },
    #[error(transparent)]
    DuplicateFeature(#[from] DuplicateFeature),
    #[error("schema feature {0:?} is not produced by the extractor")]
    UnknownFeature(String),
    #[error("tree {tree}: {source}")]
    InvalidTree { tree: usize, source: TreeError },
    #[error("failed to write artifact {path}: {source}")]
    Persist {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Consumer-side acceptance policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Highest `format_version` accepted.
    pub max_format_version: u32,
    /// Reject schemas naming features the extractor never produces.
    pub strict_schema: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            max_format_version: FORMAT_VERSION,
            strict_schema: false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ArenaTree {
    nodes: Vec<Node>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WireTree {
    Arena(ArenaTree),
    Nested(TreeNode),
    Dump(DumpTree),
}

impl WireTree {
    fn encode(&self, schema: &FeatureSchema) -> Result<Tree, TreeError> {
        match self {
            WireTree::Arena(arena) => Tree::from_arena(&arena.nodes),
            WireTree::Nested(node) => node.encode(schema),
            WireTree::Dump(dump) => dump.encode(schema),
        }
    }
}

// Picks the form from its marker key so a malformed tree reports its own
// field error.
impl<'de> Deserialize<'de> for WireTree {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        enum Form {
            Arena,
            Nested,
            DumpNested,
            DumpFlat,
        }
        let value = Value::deserialize(deserializer)?;
        let form = match &value {
            Value::Array(_) => Form::DumpFlat,
            Value::Object(map) if map.contains_key("nodes") => Form::Arena,
            Value::Object(map) if map.contains_key("type") => Form::Nested,
            Value::Object(map) if map.contains_key("nodeid") => Form::DumpNested,
            _ => {
                return Err(D::Error::custom(
                    "tree must be a node arena, a typed node or a dump node",
                ))
            }
        };
        let decoded = match form {
            Form::Arena => serde_json::from_value(value).map(WireTree::Arena),
            Form::Nested => serde_json::from_value(value).map(WireTree::Nested),
            Form::DumpNested => serde_json::from_value::<DumpNode>(value)
                .map(|root| WireTree::Dump(DumpTree::Nested(root))),
            Form::DumpFlat => serde_json::from_value::<Vec<DumpNode>>(value)
                .map(|nodes| WireTree::Dump(DumpTree::Flat(nodes))),
        };
        decoded.map_err(D::Error::custom)
    }
}

fn legacy_version() -> u32 {
    1
}

#[derive(Debug, Serialize, Deserialize)]
struct ArtifactDocument {
    #[serde(default = "legacy_version")]
    format_version: u32,
    #[serde(default)]
    objective: Objective,
    #[serde(default)]
    base_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    num_features: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    num_trees: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source: Option<String>,
    feature_names: Vec<String>,
    trees: Vec<WireTree>,
}

/// Encode an ensemble as an artifact document.
pub fn serialize(ensemble: &Ensemble) -> Result<Vec<u8>, ArtifactError> {
    let meta = ensemble.meta();
    let doc = ArtifactDocument {
        format_version: FORMAT_VERSION,
        objective: meta.objective,
        base_score: meta.base_score,
        num_features: Some(ensemble.schema().len()),
        num_trees: Some(ensemble.num_trees()),
        created_at: meta.created_at,
        source: meta.source.clone(),
        feature_names: ensemble.schema().names().to_vec(),
        trees: ensemble
            .trees()
            .iter()
            .map(|t| {
                WireTree::Arena(ArenaTree {
                    nodes: t.nodes().to_vec(),
                })
            })
            .collect(),
    };
    Ok(serde_json::to_vec(&doc)?)
}

pub fn deserialize(bytes: &[u8]) -> Result<Ensemble, ArtifactError> {
    deserialize_with(bytes, &LoadOptions::default())
}

/// Decode and validate an artifact document under `opts`.
pub fn deserialize_with(bytes: &[u8], opts: &LoadOptions) -> Result<Ensemble, ArtifactError> {
    let doc: ArtifactDocument = serde_json::from_slice(bytes)?;
    if doc.format_version > opts.max_format_version {
        return Err(ArtifactError::UnsupportedVersion {
            found: doc.format_version,
            supported: opts.max_format_version,
        });
    }

    let schema = FeatureSchema::new(doc.feature_names)?;
    if let Some(declared) = doc.num_features {
        if declared != schema.len() {
            return Err(ArtifactError::FeatureCountMismatch {
                declared,
                actual: schema.len(),
            });
        }
    }
    for name in schema.unknown_features() {
        if opts.strict_schema {
            return Err(ArtifactError::UnknownFeature(name.to_string()));
        }
        warn!(feature = name, "schema feature is never extracted; it will read as 0");
    }

    let trees = doc
        .trees
        .iter()
        .enumerate()
        .map(|(tree, wire)| {
            wire.encode(&schema)
                .map_err(|source| ArtifactError::InvalidTree { tree, source })
        })
        .collect::<Result<Vec<_>, _>>()?;
    if let Some(declared) = doc.num_trees {
        if declared != trees.len() {
            return Err(ArtifactError::TreeCountMismatch {
                declared,
                actual: trees.len(),
            });
        }
    }

    let meta = EnsembleMeta {
        objective: doc.objective,
        base_score: doc.base_score,
        created_at: doc.created_at,
        source: doc.source,
    };
    Ensemble::new(trees, schema, meta)
}

/// SHA-256 of the artifact bytes, base64.
pub fn fingerprint(bytes: &[u8]) -> String {
    BASE64.encode(Sha256::digest(bytes))
}

/// Read the whole file, release it, then decode.
pub fn load_artifact(path: &Path, opts: &LoadOptions) -> Result<Ensemble, ArtifactError> {
    let bytes = std::fs::read(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let ensemble = deserialize_with(&bytes, opts)?;
    info!(
        path = %path.display(),
        trees = ensemble.num_trees(),
        features = ensemble.schema().len(),
        fingerprint = %fingerprint(&bytes),
        "artifact loaded"
    );
    Ok(ensemble)
}

/// Try `primary`, then `fallback`. Never invents a model.
pub fn load_with_fallback(
    primary: &Path,
    fallback: Option<&Path>,
    opts: &LoadOptions,
) -> Result<Ensemble, ArtifactError> {
    match load_artifact(primary, opts) {
        Ok(e) => Ok(e),
        Err(err) => {
            let Some(fallback) = fallback else {
                return Err(err);
            };
            warn!(
                path = %primary.display(),
                fallback = %fallback.display(),
                error = %err,
                "artifact rejected; trying fallback"
            );
            load_artifact(fallback, opts)
        }
    }
}

/// All-or-nothing write: temp file beside `path`, fsync, rename over.
pub fn save_artifact(ensemble: &Ensemble, path: &Path) -> Result<(), ArtifactError> {
    let bytes = serialize(ensemble)?;
    let persist_err = |source| ArtifactError::Persist {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut temp = tempfile::Builder::new()
        .prefix(".artifact")
        .tempfile_in(dir)
        .map_err(persist_err)?;
    temp.write_all(&bytes).map_err(persist_err)?;
    temp.as_file().sync_all().map_err(persist_err)?;
    temp.persist(path).map_err(|e| persist_err(e.error))?;
    info!(path = %path.display(), trees = ensemble.num_trees(), "artifact saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEGACY: &str = r#"{
        "feature_names": ["has_ip", "is_https"],
        "trees": [
            {"type": "split", "threshold": 0.5, "feature_index": 0,
             "left": {"type": "leaf", "value": -3.0},
             "right": {"type": "leaf", "value": 3.0}},
            {"nodeid": 0, "split": "f1", "split_condition": 0.5, "yes": 1, "no": 2,
             "children": [{"nodeid": 1, "leaf": 0.25}, {"nodeid": 2, "leaf": -0.25}]}
        ]
    }"#;

    #[test]
    fn legacy_document_with_mixed_tree_forms() {
        let e = deserialize(LEGACY.as_bytes()).unwrap();
        assert_eq!(e.num_trees(), 2);
        assert_eq!(e.meta().objective, Objective::BinaryLogistic);
        assert_eq!(e.meta().base_score, 0.0);
        assert_eq!(e.trees()[1].len(), 3);
    }

    #[test]
    fn round_trip_preserves_full_precision() {
        let e = deserialize(LEGACY.as_bytes()).unwrap();
        let bytes = serialize(&e).unwrap();
        let back = deserialize(&bytes).unwrap();
        assert_eq!(back, e);

        let awkward = 0.1 + 0.2;
        let text = format!(
            r#"{{"feature_names":["a"],"trees":[{{"type":"split","threshold":{awkward:?},"feature_index":0,
               "left":{{"type":"leaf","value":1e-300}},"right":{{"type":"leaf","value":-7.0}}}}]}}"#
        );
        let e = deserialize(text.as_bytes()).unwrap();
        let back = deserialize(&serialize(&e).unwrap()).unwrap();
        assert_eq!(back, e);
        match back.trees()[0].nodes()[0] {
            crate::model::Node::Split { threshold, .. } => assert_eq!(threshold, awkward),
            _ => panic!("root should be a split"),
        }
    }

    #[test]
    fn declared_counts_are_checked() {
        let bad_features = r#"{"num_features": 3, "feature_names": ["a"], "trees": []}"#;
        assert!(matches!(
            deserialize(bad_features.as_bytes()),
            Err(ArtifactError::FeatureCountMismatch { declared: 3, actual: 1 })
        ));
        let bad_trees = r#"{"num_trees": 1, "feature_names": ["a"], "trees": []}"#;
        assert!(matches!(
            deserialize(bad_trees.as_bytes()),
            Err(ArtifactError::TreeCountMismatch { declared: 1, actual: 0 })
        ));
    }

    #[test]
    fn version_and_schema_policy() {
        let future = r#"{"format_version": 9, "feature_names": [], "trees": []}"#;
        assert!(matches!(
            deserialize(future.as_bytes()),
            Err(ArtifactError::UnsupportedVersion { found: 9, supported: FORMAT_VERSION })
        ));

        let unknown = r#"{"feature_names": ["has_ip", "page_rank"], "trees": []}"#;
        assert!(deserialize(unknown.as_bytes()).is_ok());
        let strict = LoadOptions {
            strict_schema: true,
            ..LoadOptions::default()
        };
        assert!(matches!(
            deserialize_with(unknown.as_bytes(), &strict),
            Err(ArtifactError::UnknownFeature(name)) if name == "page_rank"
        ));

        let dup = r#"{"feature_names": ["a", "a"], "trees": []}"#;
        assert!(matches!(
            deserialize(dup.as_bytes()),
            Err(ArtifactError::DuplicateFeature(_))
        ));
    }

    /// Right-leaning chain `depth` splits deep, built as a raw arena.
    fn chain(depth: u32) -> Ensemble {
        let mut arena = Vec::with_capacity(2 * depth as usize + 1);
        for i in 0..depth {
            arena.push(Node::Split {
                feature_index: i % 2,
                threshold: f64::from(i) + 0.5,
                left: 2 * i + 1,
                right: 2 * i + 2,
            });
            arena.push(Node::Leaf { value: f64::from(i) });
        }
        arena.push(Node::Leaf { value: -1.0 });
        let tree = Tree::from_arena(&arena).unwrap();
        let schema = FeatureSchema::new(["has_ip", "is_https"]).unwrap();
        Ensemble::new(vec![tree], schema, EnsembleMeta::default()).unwrap()
    }

    #[test]
    fn deep_trees_round_trip() {
        for depth in [1_000, 100_000] {
            let e = chain(depth);
            let back = deserialize(&serialize(&e).unwrap()).unwrap();
            assert_eq!(back, e, "depth {depth}");
            assert_eq!(back.trees()[0].depth(), depth as usize);
        }
    }

    #[test]
    fn written_trees_are_flat_arenas() {
        let e = deserialize(LEGACY.as_bytes()).unwrap();
        let doc: Value = serde_json::from_slice(&serialize(&e).unwrap()).unwrap();
        assert_eq!(doc["format_version"], FORMAT_VERSION);
        let first = &doc["trees"][0]["nodes"];
        assert_eq!(first.as_array().map(Vec::len), Some(3));
        assert_eq!(first[0]["type"], "split");
        assert_eq!(first[0]["left"], 1);
        assert_eq!(first[2]["value"], 3.0);
    }

    #[test]
    fn malformed_tree_reports_its_own_field() {
        let missing_left = r#"{"feature_names": ["a"], "trees": [
            {"type": "split", "threshold": 0.5, "feature_index": 0,
             "right": {"type": "leaf", "value": 1.0}}]}"#;
        let err = deserialize(missing_left.as_bytes()).unwrap_err();
        assert!(matches!(err, ArtifactError::Parse(_)));
        assert!(err.to_string().contains("`left`"), "{err}");

        let bad_threshold = r#"{"feature_names": ["a"], "trees": [{"nodes": [
            {"type": "split", "threshold": "high", "feature_index": 0, "left": 1, "right": 2},
            {"type": "leaf", "value": 0.0}, {"type": "leaf", "value": 1.0}]}]}"#;
        let err = deserialize(bad_threshold.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("invalid type"), "{err}");
        assert!(!err.to_string().contains("untagged"), "{err}");

        let unknown_form = r#"{"feature_names": ["a"], "trees": [42]}"#;
        let err = deserialize(unknown_form.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("node arena"), "{err}");
    }

    #[test]
    fn arena_structure_is_validated() {
        let dangling = r#"{"feature_names": ["a"], "trees": [{"nodes": [
            {"type": "split", "threshold": 0.5, "feature_index": 0, "left": 1, "right": 7},
            {"type": "leaf", "value": 0.0}]}]}"#;
        assert!(matches!(
            deserialize(dangling.as_bytes()),
            Err(ArtifactError::InvalidTree {
                tree: 0,
                source: TreeError::ChildOutOfBounds { child: 7, .. }
            })
        ));
    }

    #[test]
    fn fingerprint_is_stable() {
        assert_eq!(fingerprint(b"abc"), fingerprint(b"abc"));
        assert_ne!(fingerprint(b"abc"), fingerprint(b"abd"));
        assert_eq!(fingerprint(b"").len(), 44);
    }
}
