//! Softmax gradient boosting with leaf-wise histogram trees.

use anyhow::Context;
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::binning::BinMapper;
use super::model::{BoostedClassifier, Node, Round, Tree, softmax};
use super::params::{BoostingParams, BoostingType};

/// Smallest hessian sum a leaf may have.
const MIN_SUM_HESSIAN: f64 = 1e-3;
const MIN_HESSIAN: f64 = 1e-16;

/// Train a multiclass classifier on row-major `features`.
///
/// `labels[i]` is the class index of `features[i]` and must be below
/// `num_classes`. Deterministic for a fixed `params.seed`.
pub fn train(
    features: &[Vec<f32>],
    labels: &[usize],
    num_classes: usize,
    params: &BoostingParams,
) -> anyhow::Result<BoostedClassifier> {
    params.validate().context("invalid boosting parameters")?;
    anyhow::ensure!(!features.is_empty(), "no training rows");
    anyhow::ensure!(
        features.len() == labels.len(),
        "{} rows but {} labels",
        features.len(),
        labels.len()
    );
    anyhow::ensure!(num_classes >= 2, "need at least 2 classes, got {num_classes}");
    let num_features = features[0].len();
    anyhow::ensure!(num_features > 0, "rows have no features");
    if let Some(i) = features.iter().position(|r| r.len() != num_features) {
        anyhow::bail!(
            "row {i} has {} features, expected {num_features}",
            features[i].len()
        );
    }
    if let Some(&bad) = labels.iter().find(|&&l| l >= num_classes) {
        anyhow::bail!("label {bad} out of range for {num_classes} classes");
    }

    let n = features.len();
    let mapper = BinMapper::fit(features, num_features, params.max_bin);
    let bins = mapper.transform(features);
    let mut rng = StdRng::seed_from_u64(params.seed);

    let grower = TreeGrower {
        params,
        mapper: &mapper,
        bins: &bins,
    };

    // scores[i * K + k]
    let mut scores = vec![0.0f64; n * num_classes];
    let mut rounds: Vec<Round> = Vec::with_capacity(params.num_round);
    // DART keeps each round's unweighted per-row outputs so dropped rounds
    // can be subtracted and rescaled without re-walking their trees.
    let mut outputs: Vec<Vec<f64>> = Vec::new();
    let dart = params.boosting_type == BoostingType::Dart;

    let mut bag: Vec<usize> = (0..n).collect();
    let bag_size = ((n as f64 * params.bagging_fraction).ceil() as usize).clamp(1, n);
    let feature_count =
        ((num_features as f64 * params.feature_fraction).ceil() as usize).clamp(1, num_features);

    let mut grad = vec![0.0f64; n * num_classes];
    let mut hess = vec![0.0f64; n * num_classes];

    for iter in 0..params.num_round {
        if params.bagging_freq > 0 && bag_size < n && iter % params.bagging_freq == 0 {
            bag = sample(&mut rng, n, bag_size).into_vec();
            bag.sort_unstable();
        }

        let dropped: Vec<usize> = if dart && !rounds.is_empty() {
            select_dropped(&mut rng, rounds.len(), params)
        } else {
            Vec::new()
        };

        let mut working = scores.clone();
        for &j in &dropped {
            let w = rounds[j].weight;
            for (s, o) in working.iter_mut().zip(&outputs[j]) {
                *s -= w * o;
            }
        }

        for &i in &bag {
            let row = &working[i * num_classes..(i + 1) * num_classes];
            let p = softmax(row);
            for k in 0..num_classes {
                let y = if labels[i] == k { 1.0 } else { 0.0 };
                grad[i * num_classes + k] = p[k] - y;
                hess[i * num_classes + k] = (p[k] * (1.0 - p[k])).max(MIN_HESSIAN);
            }
        }

        let k_dropped = dropped.len() as f64;
        let weight = if dart {
            params.learning_rate / (k_dropped + 1.0)
        } else {
            params.learning_rate
        };

        let mut trees = Vec::with_capacity(num_classes);
        let mut round_out = vec![0.0f64; n * num_classes];
        for class in 0..num_classes {
            let mut feats: Vec<usize> = if feature_count < num_features {
                sample(&mut rng, num_features, feature_count).into_vec()
            } else {
                (0..num_features).collect()
            };
            feats.sort_unstable();

            let tree = grower.grow(&bag, &feats, class, num_classes, &grad, &hess);
            for (i, row) in features.iter().enumerate() {
                round_out[i * num_classes + class] = tree.predict(row);
            }
            trees.push(tree);
        }

        for (s, o) in scores.iter_mut().zip(&round_out) {
            *s += weight * o;
        }
        if !dropped.is_empty() {
            let factor = k_dropped / (k_dropped + 1.0);
            for &j in &dropped {
                let old = rounds[j].weight;
                let new = old * factor;
                for (s, o) in scores.iter_mut().zip(&outputs[j]) {
                    *s += (new - old) * o;
                }
                rounds[j].weight = new;
            }
        }

        if dart {
            outputs.push(round_out);
        }
        rounds.push(Round { weight, trees });
    }

    debug!(
        rounds = rounds.len(),
        rows = n,
        features = num_features,
        classes = num_classes,
        boosting = %params.boosting_type,
        "trained boosted classifier"
    );

    Ok(BoostedClassifier {
        num_classes,
        num_features,
        params: params.clone(),
        rounds,
    })
}

/// Rounds muted for this DART iteration.
fn select_dropped(rng: &mut StdRng, num_rounds: usize, params: &BoostingParams) -> Vec<usize> {
    if rng.random::<f64>() < params.skip_drop {
        return Vec::new();
    }
    (0..num_rounds)
        .filter(|_| rng.random::<f64>() < params.drop_rate)
        .collect()
}

struct TreeGrower<'a> {
    params: &'a BoostingParams,
    mapper: &'a BinMapper,
    /// Column-major bins.
    bins: &'a [Vec<u8>],
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    bin: u8,
    gain: f64,
}

struct LeafState {
    node: usize,
    rows: Vec<usize>,
    depth: usize,
    sum_grad: f64,
    sum_hess: f64,
    best: Option<SplitCandidate>,
}

#[derive(Clone, Copy, Default)]
struct Bucket {
    grad: f64,
    hess: f64,
    count: usize,
}

impl TreeGrower<'_> {
    fn grow(
        &self,
        rows: &[usize],
        features: &[usize],
        class: usize,
        num_classes: usize,
        grad: &[f64],
        hess: &[f64],
    ) -> Tree {
        let g = |i: usize| grad[i * num_classes + class];
        let h = |i: usize| hess[i * num_classes + class];

        let mut nodes = vec![Node::Leaf { value: 0.0 }];
        let mut root = LeafState {
            node: 0,
            rows: rows.to_vec(),
            depth: 0,
            sum_grad: rows.iter().map(|&i| g(i)).sum(),
            sum_hess: rows.iter().map(|&i| h(i)).sum(),
            best: None,
        };
        root.best = self.best_split(&root, features, &g, &h);
        let mut leaves = vec![root];

        while leaves.len() < self.params.num_leaves {
            // Highest gain first.
            let mut pick: Option<(usize, f64)> = None;
            for (idx, leaf) in leaves.iter().enumerate() {
                if let Some(c) = leaf.best
                    && pick.is_none_or(|(_, gain)| c.gain > gain)
                {
                    pick = Some((idx, c.gain));
                }
            }
            let Some((idx, _)) = pick else { break };

            let leaf = leaves.swap_remove(idx);
            let Some(split) = leaf.best else { break };
            let column = &self.bins[split.feature];
            let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = leaf
                .rows
                .iter()
                .partition(|&&i| column[i] <= split.bin);

            let left_node = nodes.len();
            let right_node = left_node + 1;
            nodes[leaf.node] = Node::Split {
                feature: split.feature,
                threshold: self.mapper.threshold(split.feature, split.bin),
                left: left_node,
                right: right_node,
            };
            nodes.push(Node::Leaf { value: 0.0 });
            nodes.push(Node::Leaf { value: 0.0 });

            for (node, rows) in [(left_node, left_rows), (right_node, right_rows)] {
                let mut child = LeafState {
                    node,
                    depth: leaf.depth + 1,
                    sum_grad: rows.iter().map(|&i| g(i)).sum(),
                    sum_hess: rows.iter().map(|&i| h(i)).sum(),
                    rows,
                    best: None,
                };
                child.best = self.best_split(&child, features, &g, &h);
                leaves.push(child);
            }
        }

        for leaf in &leaves {
            nodes[leaf.node] = Node::Leaf {
                value: self.leaf_output(leaf.sum_grad, leaf.sum_hess),
            };
        }
        Tree { nodes }
    }

    fn best_split(
        &self,
        leaf: &LeafState,
        features: &[usize],
        g: &impl Fn(usize) -> f64,
        h: &impl Fn(usize) -> f64,
    ) -> Option<SplitCandidate> {
        let p = self.params;
        let min_child = p.min_child_samples.max(1);
        if leaf.rows.len() < 2 * min_child {
            return None;
        }
        if p.max_depth > 0 && leaf.depth >= p.max_depth {
            return None;
        }

        let parent_gain = self.leaf_gain(leaf.sum_grad, leaf.sum_hess);
        let total = leaf.rows.len();
        let mut best: Option<SplitCandidate> = None;
        let mut hist: Vec<Bucket> = Vec::new();

        for &f in features {
            let num_bins = self.mapper.num_bins(f);
            if num_bins < 2 {
                continue;
            }
            hist.clear();
            hist.resize(num_bins, Bucket::default());
            let column = &self.bins[f];
            for &i in &leaf.rows {
                let b = &mut hist[column[i] as usize];
                b.grad += g(i);
                b.hess += h(i);
                b.count += 1;
            }

            let mut left = Bucket::default();
            for (bin, bucket) in hist[..num_bins - 1].iter().enumerate() {
                left.grad += bucket.grad;
                left.hess += bucket.hess;
                left.count += bucket.count;

                let right_count = total - left.count;
                if left.count < min_child {
                    continue;
                }
                if right_count < min_child {
                    break;
                }
                let right_grad = leaf.sum_grad - left.grad;
                let right_hess = leaf.sum_hess - left.hess;
                if left.hess < MIN_SUM_HESSIAN || right_hess < MIN_SUM_HESSIAN {
                    continue;
                }

                let gain = self.leaf_gain(left.grad, left.hess)
                    + self.leaf_gain(right_grad, right_hess)
                    - parent_gain;
                if gain <= p.min_split_gain || gain <= 0.0 {
                    continue;
                }
                if best.is_none_or(|b| gain > b.gain) {
                    best = Some(SplitCandidate {
                        feature: f,
                        bin: bin as u8,
                        gain,
                    });
                }
            }
        }
        best
    }

    fn leaf_gain(&self, grad: f64, hess: f64) -> f64 {
        let g = threshold_l1(grad, self.params.lambda_l1);
        g * g / (hess + self.params.lambda_l2)
    }

    fn leaf_output(&self, grad: f64, hess: f64) -> f64 {
        let denom = hess + self.params.lambda_l2;
        if denom <= 0.0 {
            return 0.0;
        }
        -threshold_l1(grad, self.params.lambda_l1) / denom
    }
}

fn threshold_l1(g: f64, l1: f64) -> f64 {
    let reduced = (g.abs() - l1).max(0.0);
    reduced.copysign(g)
}
