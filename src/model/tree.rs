//! Arena decision trees.
//!
//! A [`Tree`] stores its nodes in a flat array with index child references.
//! Every constructor lays the nodes out in pre-order (node, left subtree,
//! right subtree) with the root at index 0, so two trees compare equal
//! exactly when they have the same shape and the same numbers.
//!
//! Trees are built without recursion: [`TreeBuilder`] walks any source
//! representation with an explicit stack, which keeps deep or unbalanced
//! trees off the call stack.

use crate::features::FeatureSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type NodeId = u32;

/// A split or a leaf. `value <= threshold` routes left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    Split {
        feature_index: u32,
        threshold: f64,
        left: NodeId,
        right: NodeId,
    },
    Leaf {
        value: f64,
    },
}

impl Node {
    #[inline]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }
}

/// Structural faults found while encoding a tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("tree has no nodes")]
    EmptyTree,
    #[error("node {node} references child {child} but tree has {n_nodes} nodes")]
    ChildOutOfBounds {
        node: usize,
        child: NodeId,
        n_nodes: usize,
    },
    #[error("node {node} is referenced by a missing node id")]
    DanglingReference { node: NodeId },
    #[error("node id {node} appears more than once")]
    DuplicateNodeId { node: NodeId },
    #[error("node {node} is reached more than once (shared subtree or cycle)")]
    DuplicateVisit { node: NodeId },
    #[error("node {node} is not reachable from the root")]
    UnreachableNode { node: NodeId },
    #[error("node {node} is malformed: {reason}")]
    MalformedNode { node: NodeId, reason: &'static str },
    #[error("split feature {0:?} is not in the schema")]
    UnknownFeature(String),
    #[error("tree exceeds {} nodes", NodeId::MAX)]
    TooManyNodes,
}

/// One node of a source tree, with children still in source terms.
pub enum NodeShape<K> {
    Leaf(f64),
    Split {
        feature_index: u32,
        threshold: f64,
        left: K,
        right: K,
    },
}

#[derive(Clone, Copy)]
enum Side {
    Left,
    Right,
}

/// Builds canonical pre-order arenas from any source representation.
pub struct TreeBuilder;

impl TreeBuilder {
    /// Walk the source from `root`. `visit` describes one source node; it is
    /// called exactly once per reachable node, left subtree before right.
    pub fn build<K, F>(root: K, mut visit: F) -> Result<Tree, TreeError>
    where
        F: FnMut(K) -> Result<NodeShape<K>, TreeError>,
    {
        let mut nodes: Vec<Node> = Vec::new();
        let mut stack: Vec<(K, Option<(usize, Side)>)> = vec![(root, None)];

        while let Some((key, parent)) = stack.pop() {
            let idx = nodes.len();
            let id = NodeId::try_from(idx).map_err(|_| TreeError::TooManyNodes)?;
            if let Some((p, side)) = parent {
                if let Node::Split { left, right, .. } = &mut nodes[p] {
                    match side {
                        Side::Left => *left = id,
                        Side::Right => *right = id,
                    }
                }
            }
            match visit(key)? {
                NodeShape::Leaf(value) => nodes.push(Node::Leaf { value }),
                NodeShape::Split {
                    feature_index,
                    threshold,
                    left,
                    right,
                } => {
                    nodes.push(Node::Split {
                        feature_index,
                        threshold,
                        left: 0,
                        right: 0,
                    });
                    stack.push((right, Some((idx, Side::Right))));
                    stack.push((left, Some((idx, Side::Left))));
                }
            }
        }

        Ok(Tree {
            nodes: nodes.into_boxed_slice(),
        })
    }
}

/// Immutable decision tree in pre-order arena layout.
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    nodes: Box<[Node]>,
}

impl Tree {
    /// Validate an arena from an upstream producer (root at index 0) and
    /// re-lay it out canonically.
    pub fn from_arena(nodes: &[Node]) -> Result<Self, TreeError> {
        if nodes.is_empty() {
            return Err(TreeError::EmptyTree);
        }
        let n_nodes = nodes.len();
        for (node, n) in nodes.iter().enumerate() {
            if let Node::Split { left, right, .. } = *n {
                for child in [left, right] {
                    if child as usize >= n_nodes {
                        return Err(TreeError::ChildOutOfBounds {
                            node,
                            child,
                            n_nodes,
                        });
                    }
                }
            }
        }

        let mut visited = vec![false; n_nodes];
        let tree = TreeBuilder::build(0 as NodeId, |id| {
            let slot = &mut visited[id as usize];
            if *slot {
                return Err(TreeError::DuplicateVisit { node: id });
            }
            *slot = true;
            Ok(match nodes[id as usize] {
                Node::Leaf { value } => NodeShape::Leaf(value),
                Node::Split {
                    feature_index,
                    threshold,
                    left,
                    right,
                } => NodeShape::Split {
                    feature_index,
                    threshold,
                    left,
                    right,
                },
            })
        })?;

        if let Some(node) = visited.iter().position(|v| !v) {
            return Err(TreeError::UnreachableNode {
                node: node as NodeId,
            });
        }
        Ok(tree)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn num_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Largest feature index referenced by any split.
    pub fn max_feature_index(&self) -> Option<u32> {
        self.nodes
            .iter()
            .filter_map(|n| match n {
                Node::Split { feature_index, .. } => Some(*feature_index),
                Node::Leaf { .. } => None,
            })
            .max()
    }

    /// Longest root-to-leaf path, in edges.
    pub fn depth(&self) -> usize {
        let mut depths = vec![0usize; self.nodes.len()];
        let mut max = 0;
        // pre-order: a parent always precedes its children
        for (idx, node) in self.nodes.iter().enumerate() {
            if let Node::Split { left, right, .. } = *node {
                let d = depths[idx] + 1;
                depths[left as usize] = d;
                depths[right as usize] = d;
                max = max.max(d);
            }
        }
        max
    }

    /// Walk from the root to a leaf. Features beyond `features.len()` read as 0.
    #[inline]
    pub fn evaluate(&self, features: &[f64]) -> f64 {
        let mut idx = 0usize;
        loop {
            match self.nodes[idx] {
                Node::Leaf { value } => return value,
                Node::Split {
                    feature_index,
                    threshold,
                    left,
                    right,
                } => {
                    let value = features.get(feature_index as usize).copied().unwrap_or(0.0);
                    let next = if value <= threshold { left } else { right };
                    idx = next as usize;
                }
            }
        }
    }
}

/// Nested tree node, accepted in artifacts written by earlier versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        threshold: f64,
        feature_index: u32,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

/// Conversion of a fitted tree into the canonical arena.
pub trait EncodeTree {
    /// `schema` resolves feature names for sources that split on names.
    fn encode(&self, schema: &FeatureSchema) -> Result<Tree, TreeError>;
}

impl EncodeTree for TreeNode {
    fn encode(&self, _schema: &FeatureSchema) -> Result<Tree, TreeError> {
        TreeBuilder::build(self, |node| {
            Ok(match node {
                TreeNode::Leaf { value } => NodeShape::Leaf(*value),
                TreeNode::Split {
                    threshold,
                    feature_index,
                    left,
                    right,
                } => NodeShape::Split {
                    feature_index: *feature_index,
                    threshold: *threshold,
                    left: left.as_ref(),
                    right: right.as_ref(),
                },
            })
        })
    }
}

impl EncodeTree for Tree {
    fn encode(&self, _schema: &FeatureSchema) -> Result<Tree, TreeError> {
        Tree::from_arena(&self.nodes)
    }
}
