use anyhow::{Context, bail, ensure};
use serde::{Deserialize, Serialize};

use super::params::BoostingParams;

/// A node of a regression tree. Children are indices into [`Tree::nodes`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Node {
    /// Rows with `value <= threshold` go left; NaN goes right.
    Split {
        feature: usize,
        threshold: f32,
        left: usize,
        right: usize,
    },
    Leaf { value: f64 },
}

/// A regression tree rooted at `nodes[0]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    pub fn predict(&self, row: &[f32]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn num_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    /// Every split reads an existing feature and points forward to
    /// existing nodes, so [`Tree::predict`] always reaches a leaf.
    pub fn validate(&self, num_features: usize) -> anyhow::Result<()> {
        ensure!(!self.nodes.is_empty(), "tree has no nodes");
        for (idx, node) in self.nodes.iter().enumerate() {
            if let Node::Split {
                feature,
                left,
                right,
                ..
            } = node
            {
                ensure!(
                    *feature < num_features,
                    "node {idx} splits on feature {feature} of {num_features}"
                );
                for child in [*left, *right] {
                    if child <= idx || child >= self.nodes.len() {
                        bail!(
                            "node {idx} points to node {child} of {}",
                            self.nodes.len()
                        );
                    }
                }
            }
        }
        Ok(())
    }

    fn split_features(&self) -> impl Iterator<Item = usize> + '_ {
        self.nodes.iter().filter_map(|n| match n {
            Node::Split { feature, .. } => Some(*feature),
            Node::Leaf { .. } => None,
        })
    }
}

/// One boosting round: a tree per class, scaled by a shared weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Round {
    pub weight: f64,
    pub trees: Vec<Tree>,
}

/// Multiclass softmax boosted-tree classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostedClassifier {
    pub num_classes: usize,
    pub num_features: usize,
    pub params: BoostingParams,
    pub rounds: Vec<Round>,
}

impl BoostedClassifier {
    /// Structural check for models read from disk.
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.num_classes > 0, "model has no classes");
        for (r, round) in self.rounds.iter().enumerate() {
            ensure!(
                round.trees.len() == self.num_classes,
                "round {r} has {} trees for {} classes",
                round.trees.len(),
                self.num_classes
            );
            for (class, tree) in round.trees.iter().enumerate() {
                tree.validate(self.num_features)
                    .with_context(|| format!("round {r} class {class}"))?;
            }
        }
        Ok(())
    }

    /// Summed class scores before softmax.
    pub fn raw_scores(&self, row: &[f32]) -> Vec<f64> {
        let mut scores = vec![0.0; self.num_classes];
        for round in &self.rounds {
            for (score, tree) in scores.iter_mut().zip(&round.trees) {
                *score += round.weight * tree.predict(row);
            }
        }
        scores
    }

    pub fn predict_proba(&self, row: &[f32]) -> Vec<f64> {
        softmax(&self.raw_scores(row))
    }

    /// Most likely class; the lowest index wins ties.
    pub fn predict(&self, row: &[f32]) -> usize {
        argmax(&self.raw_scores(row))
    }

    pub fn predict_batch(&self, rows: &[Vec<f32>]) -> Vec<usize> {
        rows.iter().map(|row| self.predict(row)).collect()
    }

    pub fn num_rounds(&self) -> usize {
        self.rounds.len()
    }

    /// Number of splits using each feature, summed over all trees.
    pub fn feature_importance(&self) -> Vec<usize> {
        let mut counts = vec![0; self.num_features];
        for tree in self.rounds.iter().flat_map(|r| &r.trees) {
            for f in tree.split_features() {
                counts[f] += 1;
            }
        }
        counts
    }
}

pub fn softmax(scores: &[f64]) -> Vec<f64> {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

pub(crate) fn argmax(scores: &[f64]) -> usize {
    let mut best = 0;
    for (i, &s) in scores.iter().enumerate().skip(1) {
        if s > scores[best] {
            best = i;
        }
    }
    best
}
