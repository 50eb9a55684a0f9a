//! Training workflow: split → search → retrain best → evaluate.

use anyhow::Context;
use tracing::info;

use crate::artifact::{ModelArtifact, ModelMetadata};
use crate::dataset::Dataset;
use crate::gbdt;
use crate::search::{SearchConfig, SearchSpace, Study, accuracy, run_search};
use crate::split::{SplitConfig, train_test_split};

#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub split: SplitConfig,
    pub search: SearchConfig,
    pub space: SearchSpace,
    /// Number of held-out true/predicted pairs kept for inspection.
    pub report_examples: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            split: SplitConfig::default(),
            search: SearchConfig::default(),
            space: SearchSpace::default(),
            report_examples: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictionPair {
    pub true_label: String,
    pub predicted_label: String,
}

/// Everything a training run produces.
#[derive(Debug)]
pub struct TrainingOutcome {
    pub artifact: ModelArtifact,
    pub study: Study,
    pub holdout_accuracy: f64,
    pub train_size: usize,
    pub holdout_size: usize,
    /// First held-out examples, in dataset order.
    pub predictions: Vec<PredictionPair>,
    /// `(feature, split count)`, most used first.
    pub feature_importance: Vec<(usize, usize)>,
}

/// Run the search on `dataset` and retrain the winning configuration.
pub fn train_and_select(dataset: &Dataset, config: &TrainConfig) -> anyhow::Result<TrainingOutcome> {
    let num_classes = dataset.labels.len();
    anyhow::ensure!(
        num_classes >= 2,
        "need at least 2 labels to train a classifier, found {num_classes}"
    );

    let (train, holdout) = train_test_split(&dataset.examples, &dataset.labels, &config.split)
        .context("failed to split dataset")?;
    anyhow::ensure!(
        !train.is_empty() && !holdout.is_empty(),
        "dataset of {} examples is too small to split",
        dataset.len()
    );
    info!(
        train = train.len(),
        holdout = holdout.len(),
        classes = num_classes,
        dim = dataset.dim(),
        "split dataset"
    );

    let study = run_search(&train, &holdout, num_classes, &config.space, &config.search)?;
    let best = study
        .best()
        .context("search finished without any trial")?
        .clone();
    info!(
        trial = best.number,
        accuracy = best.validation_accuracy,
        "best trial"
    );

    let params = config.search.trial_params(best.number, &best.params)?;
    let model = gbdt::train(&train.features, &train.labels, num_classes, &params)
        .context("failed to retrain best configuration")?;

    let predicted = model.predict_batch(&holdout.features);
    let holdout_accuracy = accuracy(&predicted, &holdout.labels);
    info!(accuracy = holdout_accuracy, "held-out accuracy of final model");

    let label = |i: usize| dataset.labels.label_of(i).unwrap_or("?").to_string();
    let predictions = holdout
        .labels
        .iter()
        .zip(&predicted)
        .take(config.report_examples)
        .map(|(&t, &p)| PredictionPair {
            true_label: label(t),
            predicted_label: label(p),
        })
        .collect();

    let mut feature_importance: Vec<(usize, usize)> =
        model.feature_importance().into_iter().enumerate().collect();
    feature_importance.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let metadata = ModelMetadata {
        best_trial: Some(best.number),
        search_params: best.params.clone(),
        validation_accuracy: Some(best.validation_accuracy),
        holdout_accuracy: Some(holdout_accuracy),
        ..ModelMetadata::now()
    };
    let artifact = ModelArtifact::new(model, dataset.labels.clone(), metadata)?;

    Ok(TrainingOutcome {
        artifact,
        study,
        holdout_accuracy,
        train_size: train.len(),
        holdout_size: holdout.len(),
        predictions,
        feature_importance,
    })
}
