//! Normalization of gradient-boosting native JSON dumps.
//!
//! A dump tree is a set of nodes keyed by `nodeid`. Splits point at their
//! children with `yes` (taken when `value <= split_condition`) and `no`.
//! Nodes arrive either nested through `children` or as one flat array.
//! The `missing` pointer is accepted and ignored: absent features read as 0
//! and follow the ordinary comparison.

use super::tree::{EncodeTree, NodeId, NodeShape, Tree, TreeBuilder, TreeError};
use super::{ArtifactError, Ensemble, EnsembleMeta, ExportModel};
use crate::features::FeatureSchema;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Split feature as written by the dump: an index, `"f<index>"`, or a name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureRef {
    Index(u32),
    Name(String),
}

impl FeatureRef {
    fn resolve(&self, schema: &FeatureSchema) -> Result<u32, TreeError> {
        match self {
            FeatureRef::Index(i) => Ok(*i),
            FeatureRef::Name(name) => {
                if let Some(i) = schema.index_of(name) {
                    return Ok(i as u32);
                }
                name.strip_prefix('f')
                    .and_then(|rest| rest.parse::<u32>().ok())
                    .ok_or_else(|| TreeError::UnknownFeature(name.clone()))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DumpNode {
    pub nodeid: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,
    #[serde(default, alias = "split_feature", skip_serializing_if = "Option::is_none")]
    pub split: Option<FeatureRef>,
    #[serde(default, alias = "threshold", skip_serializing_if = "Option::is_none")]
    pub split_condition: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yes: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leaf: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<DumpNode>,
}

/// One dumped tree: the nested root node, or the flat node array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DumpTree {
    Nested(DumpNode),
    Flat(Vec<DumpNode>),
}

impl DumpTree {
    /// Index all nodes by id, returning the root id.
    fn index(&self) -> Result<(NodeId, HashMap<NodeId, &DumpNode>), TreeError> {
        let mut by_id = HashMap::new();
        let mut pending: Vec<&DumpNode> = match self {
            DumpTree::Nested(root) => vec![root],
            DumpTree::Flat(nodes) => nodes.iter().collect(),
        };
        let root = match self {
            DumpTree::Nested(root) => root.nodeid,
            DumpTree::Flat(nodes) => {
                let first = nodes.first().ok_or(TreeError::EmptyTree)?;
                if nodes.iter().any(|n| n.nodeid == 0) {
                    0
                } else {
                    first.nodeid
                }
            }
        };
        while let Some(node) = pending.pop() {
            if by_id.insert(node.nodeid, node).is_some() {
                return Err(TreeError::DuplicateNodeId { node: node.nodeid });
            }
            pending.extend(node.children.iter());
        }
        Ok((root, by_id))
    }
}

impl EncodeTree for DumpTree {
    fn encode(&self, schema: &FeatureSchema) -> Result<Tree, TreeError> {
        let (root, by_id) = self.index()?;
        let mut visited: HashSet<NodeId> = HashSet::with_capacity(by_id.len());

        let tree = TreeBuilder::build(root, |id| {
            if !visited.insert(id) {
                return Err(TreeError::DuplicateVisit { node: id });
            }
            let node = by_id
                .get(&id)
                .ok_or(TreeError::DanglingReference { node: id })?;
            if let Some(value) = node.leaf {
                return Ok(NodeShape::Leaf(value));
            }
            let malformed = |reason| TreeError::MalformedNode { node: id, reason };
            let feature = node.split.as_ref().ok_or_else(|| malformed("split without feature"))?;
            Ok(NodeShape::Split {
                feature_index: feature.resolve(schema)?,
                threshold: node
                    .split_condition
                    .ok_or_else(|| malformed("split without condition"))?,
                left: node.yes.ok_or_else(|| malformed("split without `yes` child"))?,
                right: node.no.ok_or_else(|| malformed("split without `no` child"))?,
            })
        })?;

        if visited.len() != by_id.len() {
            let mut orphans: Vec<NodeId> = by_id.keys().filter(|id| !visited.contains(id)).copied().collect();
            orphans.sort_unstable();
            return Err(TreeError::UnreachableNode { node: orphans[0] });
        }
        Ok(tree)
    }
}

/// Trees dumped by a gradient-boosting library together with the feature
/// names the model was trained on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XgbDump {
    pub trees: Vec<DumpTree>,
    pub feature_names: Vec<String>,
    /// Raw-margin bias. Dumps do not carry it; 0 reproduces the plain sum.
    #[serde(default)]
    pub base_score: f64,
}

impl XgbDump {
    /// Build from per-tree JSON strings, as returned by a JSON tree dump.
    pub fn from_tree_strings<I, S>(
        trees: I,
        feature_names: Vec<String>,
    ) -> Result<Self, serde_json::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let trees = trees
            .into_iter()
            .map(|s| serde_json::from_str(s.as_ref()))
            .collect::<Result<Vec<DumpTree>, _>>()?;
        Ok(Self {
            trees,
            feature_names,
            base_score: 0.0,
        })
    }
}

impl ExportModel for XgbDump {
    fn export(&self) -> Result<Ensemble, ArtifactError> {
        let schema = FeatureSchema::new(self.feature_names.iter().cloned())?;
        let trees = self
            .trees
            .iter()
            .enumerate()
            .map(|(tree, t)| {
                t.encode(&schema)
                    .map_err(|source| ArtifactError::InvalidTree { tree, source })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let meta = EnsembleMeta {
            base_score: self.base_score,
            source: Some("xgboost-dump".to_string()),
            ..EnsembleMeta::default()
        };
        Ensemble::new(trees, schema, meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tree::{Node, TreeNode};

    const NESTED: &str = r#"{
        "nodeid": 0, "depth": 0, "split": "f3", "split_condition": 0.5,
        "yes": 1, "no": 2, "missing": 2,
        "children": [
            {"nodeid": 1, "leaf": -0.157978237},
            {"nodeid": 2, "depth": 1, "split": "is_https", "split_condition": 0.5,
             "yes": 3, "no": 4, "missing": 4,
             "children": [{"nodeid": 3, "leaf": 0.0817046613}, {"nodeid": 4, "leaf": 0.02}]}
        ]
    }"#;

    #[test]
    fn nested_dump_matches_nested_tree() {
        let schema = FeatureSchema::canonical();
        let dump: DumpTree = serde_json::from_str(NESTED).unwrap();
        let tree = dump.encode(&schema).unwrap();

        let expected = TreeNode::Split {
            threshold: 0.5,
            feature_index: 3,
            left: Box::new(TreeNode::Leaf { value: -0.157978237 }),
            right: Box::new(TreeNode::Split {
                threshold: 0.5,
                feature_index: 9,
                left: Box::new(TreeNode::Leaf { value: 0.0817046613 }),
                right: Box::new(TreeNode::Leaf { value: 0.02 }),
            }),
        };
        assert_eq!(tree, expected.encode(&schema).unwrap());
    }

    #[test]
    fn flat_dump_in_any_order() {
        let flat = r#"[
            {"nodeid": 2, "leaf": 1.25},
            {"nodeid": 0, "split_feature": 7, "threshold": 2.0, "yes": 1, "no": 2},
            {"nodeid": 1, "leaf": -1.25}
        ]"#;
        let dump: DumpTree = serde_json::from_str(flat).unwrap();
        let tree = dump.encode(&FeatureSchema::canonical()).unwrap();
        assert_eq!(
            tree.nodes(),
            &[
                Node::Split { feature_index: 7, threshold: 2.0, left: 1, right: 2 },
                Node::Leaf { value: -1.25 },
                Node::Leaf { value: 1.25 },
            ]
        );
    }

    #[test]
    fn structural_faults() {
        let schema = FeatureSchema::canonical();
        let dangling: DumpTree = serde_json::from_str(
            r#"[{"nodeid": 0, "split": "f1", "split_condition": 1.0, "yes": 1, "no": 9},
                {"nodeid": 1, "leaf": 0.0}]"#,
        )
        .unwrap();
        assert_eq!(
            dangling.encode(&schema),
            Err(TreeError::DanglingReference { node: 9 })
        );

        let unknown: DumpTree = serde_json::from_str(
            r#"[{"nodeid": 0, "split": "favicon", "split_condition": 1.0, "yes": 1, "no": 2},
                {"nodeid": 1, "leaf": 0.0}, {"nodeid": 2, "leaf": 0.0}]"#,
        )
        .unwrap();
        assert_eq!(
            unknown.encode(&schema),
            Err(TreeError::UnknownFeature("favicon".into()))
        );

        let orphan: DumpTree =
            serde_json::from_str(r#"[{"nodeid": 0, "leaf": 0.0}, {"nodeid": 5, "leaf": 1.0}]"#)
                .unwrap();
        assert_eq!(
            orphan.encode(&schema),
            Err(TreeError::UnreachableNode { node: 5 })
        );

        let empty: DumpTree = serde_json::from_str("[]").unwrap();
        assert_eq!(empty.encode(&schema), Err(TreeError::EmptyTree));
    }

    #[test]
    fn export_builds_ensemble() {
        let names: Vec<String> = crate::features::CANONICAL_FEATURES
            .iter()
            .map(|s| s.to_string())
            .collect();
        let dump = XgbDump::from_tree_strings([NESTED, NESTED], names).unwrap();
        let ensemble = dump.export().unwrap();
        assert_eq!(ensemble.num_trees(), 2);
        assert_eq!(ensemble.meta().source.as_deref(), Some("xgboost-dump"));
    }
}
