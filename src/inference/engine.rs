//! Ensemble traversal and the link from raw margin to probability.

use super::Prediction;
use crate::config::RiskConfig;
use crate::explain::explain;
use crate::features::FeatureVector;
use crate::model::{Ensemble, Objective};
use crate::risk::RiskLevel;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    pub raw: f64,
    pub probability: f64,
}

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Walk every tree over the dense vector and aggregate per the objective.
/// An ensemble without trees scores raw 0, probability 0.5.
pub fn score(ensemble: &Ensemble, vector: &FeatureVector) -> Score {
    if ensemble.is_empty() {
        return Score {
            raw: 0.0,
            probability: 0.5,
        };
    }
    let dense = vector.to_dense(ensemble.schema());
    let sum: f64 = ensemble.trees().iter().map(|t| t.evaluate(&dense)).sum();
    let meta = ensemble.meta();
    match meta.objective {
        Objective::BinaryLogistic => {
            let raw = sum + meta.base_score;
            Score {
                raw,
                probability: sigmoid(raw),
            }
        }
        Objective::ProbabilityAverage => {
            let raw = sum / ensemble.num_trees() as f64;
            Score {
                raw,
                probability: raw.clamp(0.0, 1.0),
            }
        }
    }
}

/// Score with default explanation limits and risk bands.
pub fn predict(ensemble: &Ensemble, vector: &FeatureVector) -> Prediction {
    let s = score(ensemble, vector);
    let level = RiskLevel::from_probability(s.probability, &RiskConfig::default());
    Prediction::new(s, explain(vector), level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureSchema;
    use crate::model::{EncodeTree, EnsembleMeta, TreeNode};

    fn stump(feature_index: u32, threshold: f64, left: f64, right: f64) -> TreeNode {
        TreeNode::Split {
            threshold,
            feature_index,
            left: Box::new(TreeNode::Leaf { value: left }),
            right: Box::new(TreeNode::Leaf { value: right }),
        }
    }

    fn ensemble(trees: &[TreeNode], meta: EnsembleMeta) -> Ensemble {
        let schema = FeatureSchema::new(["x", "y"]).unwrap();
        let trees = trees.iter().map(|t| t.encode(&schema).unwrap()).collect();
        Ensemble::new(trees, schema, meta).unwrap()
    }

    #[test]
    fn sum_plus_base_score() {
        let e = ensemble(
            &[stump(0, 1.0, -1.0, 2.0), stump(1, 1.0, 0.5, -0.5)],
            EnsembleMeta {
                base_score: 0.25,
                ..EnsembleMeta::default()
            },
        );
        let v: FeatureVector = [("x", 3.0), ("y", 0.0)].into_iter().collect();
        let s = score(&e, &v);
        assert_eq!(s.raw, 2.75);
        assert!((s.probability - sigmoid(2.75)).abs() < 1e-15);
    }

    #[test]
    fn missing_feature_equals_explicit_zero() {
        let e = ensemble(&[stump(1, -0.5, 1.0, -1.0)], EnsembleMeta::default());
        let absent: FeatureVector = [("x", 9.0)].into_iter().collect();
        let zero: FeatureVector = [("x", 9.0), ("y", 0.0)].into_iter().collect();
        assert_eq!(score(&e, &absent), score(&e, &zero));
        assert_eq!(score(&e, &absent).raw, -1.0);
    }

    #[test]
    fn empty_ensemble_is_uncertain() {
        let e = Ensemble::empty(FeatureSchema::canonical());
        let p = predict(&e, &FeatureVector::default());
        assert_eq!(p.raw_score, 0.0);
        assert_eq!(p.probability, 0.5);
        assert!(!p.is_phishing);
        assert_eq!(p.safety_score, 50);
    }

    #[test]
    fn probability_average_objective() {
        let e = ensemble(
            &[stump(0, 1.0, 0.2, 1.0), stump(0, 1.0, 0.4, 0.5)],
            EnsembleMeta {
                objective: Objective::ProbabilityAverage,
                ..EnsembleMeta::default()
            },
        );
        let hi: FeatureVector = [("x", 2.0)].into_iter().collect();
        let p = predict(&e, &hi);
        assert_eq!(p.probability, 0.75);
        assert!(p.is_phishing);
        assert_eq!(p.level, RiskLevel::Medium);
        assert_eq!(p.safety_score, 25);
    }

    #[test]
    fn sigmoid_is_stable_at_extremes() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert_eq!(sigmoid(1000.0), 1.0);
        assert_eq!(sigmoid(-1000.0), 0.0);
    }
}
