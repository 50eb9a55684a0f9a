use std::path::Path;

use anyhow::Context;
use doclass_ai::{
    Dataset, SearchConfig, SplitConfig, TrainConfig, TrainingOutcome, train_and_select,
};
use tracing::info;

pub fn train_config(
    trials: usize,
    seed: u64,
    test_fraction: f64,
    stratify: bool,
    report_examples: usize,
) -> TrainConfig {
    TrainConfig {
        split: SplitConfig {
            test_fraction,
            seed,
            stratify,
        },
        search: SearchConfig {
            n_trials: trials,
            seed,
            ..Default::default()
        },
        report_examples,
        ..Default::default()
    }
}

pub fn load_dataset(path: &Path) -> anyhow::Result<Dataset> {
    let dataset = doclass_ai::dataset::load(path)
        .with_context(|| format!("reading dataset {} (run `doclass embed` first)", path.display()))?;
    info!(
        path = %path.display(),
        examples = dataset.len(),
        labels = dataset.labels.len(),
        "loaded dataset"
    );
    Ok(dataset)
}

/// Search, retrain and write the artifact into `artifact_dir`.
pub fn run_train(
    dataset: &Dataset,
    artifact_dir: &Path,
    config: &TrainConfig,
) -> anyhow::Result<TrainingOutcome> {
    let outcome = train_and_select(dataset, config)?;
    outcome
        .artifact
        .save(artifact_dir)
        .with_context(|| format!("writing artifact to {}", artifact_dir.display()))?;
    Ok(outcome)
}
