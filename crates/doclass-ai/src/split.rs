//! Seeded train/validation split.

use std::collections::BTreeMap;

use doclass_core::{LabelMapping, LabeledExample};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// Feature rows with their class indices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partition {
    pub features: Vec<Vec<f32>>,
    pub labels: Vec<usize>,
}

impl Partition {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    fn push(&mut self, example: &LabeledExample, class: usize) {
        self.features.push(example.embedding.clone());
        self.labels.push(class);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitConfig {
    /// Fraction of examples held out, in (0, 1).
    pub test_fraction: f64,
    pub seed: u64,
    /// Hold out the same fraction of every class.
    pub stratify: bool,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 42,
            stratify: true,
        }
    }
}

/// Split `examples` into (train, test) partitions.
///
/// Both partitions keep dataset order. With `stratify`, each class
/// contributes `round(n_class * test_fraction)` examples to the test side
/// but always keeps at least one in training.
pub fn train_test_split(
    examples: &[LabeledExample],
    labels: &LabelMapping,
    config: &SplitConfig,
) -> anyhow::Result<(Partition, Partition)> {
    anyhow::ensure!(
        config.test_fraction > 0.0 && config.test_fraction < 1.0,
        "test fraction must be in (0, 1), got {}",
        config.test_fraction
    );

    let mut classes = Vec::with_capacity(examples.len());
    for ex in examples {
        let class = labels
            .index_of(&ex.label)
            .ok_or_else(|| anyhow::anyhow!("label {:?} missing from label mapping", ex.label))?;
        classes.push(class);
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut test_idx: Vec<usize> = Vec::new();

    if config.stratify {
        let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (i, &c) in classes.iter().enumerate() {
            groups.entry(c).or_default().push(i);
        }
        for mut group in groups.into_values() {
            group.shuffle(&mut rng);
            let n_test = ((group.len() as f64 * config.test_fraction).round() as usize)
                .min(group.len().saturating_sub(1));
            test_idx.extend_from_slice(&group[..n_test]);
        }
    } else {
        let mut all: Vec<usize> = (0..examples.len()).collect();
        all.shuffle(&mut rng);
        let n_test = ((all.len() as f64 * config.test_fraction).ceil() as usize)
            .min(all.len().saturating_sub(1));
        test_idx.extend_from_slice(&all[..n_test]);
    }

    let mut is_test = vec![false; examples.len()];
    for i in test_idx {
        is_test[i] = true;
    }

    let mut train = Partition::default();
    let mut test = Partition::default();
    for (i, ex) in examples.iter().enumerate() {
        if is_test[i] {
            test.push(ex, classes[i]);
        } else {
            train.push(ex, classes[i]);
        }
    }
    Ok((train, test))
}
