//! Hyperparameter search over a declarative search space.
//!
//! The space is a table of name → sampling rule. Each trial samples every
//! rule, applies the values onto the base [`BoostingParams`] by name, trains
//! on the training partition and scores accuracy on the validation
//! partition. The best trial is replaced only on a strictly higher score.

use std::collections::BTreeMap;
use std::fmt;

use anyhow::Context;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::gbdt::{self, BoostingParams};
use crate::split::Partition;

/// A sampled hyperparameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Choice(String),
}

impl ParamValue {
    pub fn as_float(&self, name: &str) -> anyhow::Result<f64> {
        match self {
            Self::Float(v) => Ok(*v),
            Self::Int(v) => Ok(*v as f64),
            Self::Choice(c) => anyhow::bail!("{name} expects a number, got {c:?}"),
        }
    }

    pub fn as_count(&self, name: &str) -> anyhow::Result<usize> {
        match self {
            Self::Int(v) => usize::try_from(*v)
                .with_context(|| format!("{name} must be non-negative, got {v}")),
            other => anyhow::bail!("{name} expects an integer, got {other}"),
        }
    }

    pub fn as_choice(&self, name: &str) -> anyhow::Result<&str> {
        match self {
            Self::Choice(c) => Ok(c),
            other => anyhow::bail!("{name} expects a choice, got {other}"),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v:.6}"),
            Self::Choice(c) => f.write_str(c),
        }
    }
}

/// One configuration: hyperparameter name → value.
pub type ParamSet = BTreeMap<String, ParamValue>;

/// How a single hyperparameter is drawn.
#[derive(Debug, Clone, PartialEq)]
pub enum SamplingRule {
    Categorical(Vec<String>),
    /// Inclusive integer range.
    IntRange { low: i64, high: i64 },
    Uniform { low: f64, high: f64 },
    /// Uniform in log space; both bounds must be positive.
    LogUniform { low: f64, high: f64 },
}

impl SamplingRule {
    pub fn categorical(choices: &[&str]) -> Self {
        Self::Categorical(choices.iter().map(|c| c.to_string()).collect())
    }

    pub fn sample(&self, rng: &mut impl Rng) -> ParamValue {
        match self {
            Self::Categorical(choices) => {
                ParamValue::Choice(choices[rng.random_range(0..choices.len())].clone())
            }
            Self::IntRange { low, high } => ParamValue::Int(rng.random_range(*low..=*high)),
            Self::Uniform { low, high } => ParamValue::Float(low + (high - low) * rng.random::<f64>()),
            Self::LogUniform { low, high } => {
                let (ln_low, ln_high) = (low.ln(), high.ln());
                ParamValue::Float((ln_low + (ln_high - ln_low) * rng.random::<f64>()).exp())
            }
        }
    }

    fn validate(&self, name: &str) -> anyhow::Result<()> {
        let ok = match self {
            Self::Categorical(choices) => !choices.is_empty(),
            Self::IntRange { low, high } => low <= high,
            Self::Uniform { low, high } => low <= high,
            Self::LogUniform { low, high } => *low > 0.0 && low <= high,
        };
        anyhow::ensure!(ok, "{name}: empty or invalid range {self:?}");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub rule: SamplingRule,
}

/// Ordered table of hyperparameters to sample.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSpace {
    pub params: Vec<ParamSpec>,
}

impl SearchSpace {
    pub fn new() -> Self {
        Self { params: Vec::new() }
    }

    /// Add or replace the rule for `name`.
    pub fn with(mut self, name: &str, rule: SamplingRule) -> Self {
        match self.params.iter_mut().find(|p| p.name == name) {
            Some(spec) => spec.rule = rule,
            None => self.params.push(ParamSpec {
                name: name.to_string(),
                rule,
            }),
        }
        self
    }

    /// Draw one configuration; rules are sampled in table order.
    pub fn sample(&self, rng: &mut impl Rng) -> ParamSet {
        self.params
            .iter()
            .map(|p| (p.name.clone(), p.rule.sample(&mut *rng)))
            .collect()
    }

    /// Check every rule, and that every name is a known boosting parameter.
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut probe = BoostingParams::default();
        let mut rng = StdRng::seed_from_u64(0);
        for spec in &self.params {
            spec.rule.validate(&spec.name)?;
            probe.apply(&spec.name, &spec.rule.sample(&mut rng))?;
        }
        Ok(())
    }
}

impl Default for SearchSpace {
    fn default() -> Self {
        use SamplingRule::*;
        Self::new()
            .with("boosting_type", SamplingRule::categorical(&["gbdt", "dart"]))
            .with("num_leaves", IntRange { low: 10, high: 200 })
            .with("learning_rate", LogUniform { low: 1e-3, high: 0.1 })
            .with("feature_fraction", Uniform { low: 0.1, high: 1.0 })
            .with("bagging_fraction", Uniform { low: 0.1, high: 1.0 })
            .with("bagging_freq", IntRange { low: 1, high: 7 })
            .with("min_child_samples", IntRange { low: 5, high: 100 })
            .with("lambda_l1", LogUniform { low: 1e-8, high: 10.0 })
            .with("lambda_l2", LogUniform { low: 1e-8, high: 10.0 })
            .with("min_split_gain", LogUniform { low: 1e-8, high: 1.0 })
            .with("max_depth", IntRange { low: 3, high: 12 })
            .with("num_round", IntRange { low: 50, high: 300 })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    pub number: usize,
    pub params: ParamSet,
    pub validation_accuracy: f64,
}

/// Recorded trials and the index of the best one.
#[derive(Debug, Clone, Default)]
pub struct Study {
    trials: Vec<TrialResult>,
    best: Option<usize>,
}

impl Study {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finished trial. It becomes the best only if its accuracy is
    /// strictly higher than the current best.
    pub fn record(&mut self, trial: TrialResult) {
        let replace = match self.best {
            None => true,
            Some(i) => trial.validation_accuracy > self.trials[i].validation_accuracy,
        };
        self.trials.push(trial);
        if replace {
            self.best = Some(self.trials.len() - 1);
        }
    }

    pub fn best(&self) -> Option<&TrialResult> {
        self.best.map(|i| &self.trials[i])
    }

    pub fn trials(&self) -> &[TrialResult] {
        &self.trials
    }

    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub n_trials: usize,
    /// Seeds configuration sampling; trial `n` trains with `seed + n`.
    pub seed: u64,
    /// Parameters not covered by the search space.
    pub base: BoostingParams,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            n_trials: 100,
            seed: 42,
            base: BoostingParams::default(),
        }
    }
}

impl SearchConfig {
    /// Full training parameters for trial `number` with sampled values `set`.
    pub fn trial_params(&self, number: usize, set: &ParamSet) -> anyhow::Result<BoostingParams> {
        let mut params = self.base.with_overrides(set)?;
        params.seed = self.seed.wrapping_add(number as u64);
        Ok(params)
    }
}

/// Fraction of positions where `predicted` equals `actual`.
///
/// Zero when there is nothing to compare.
pub fn accuracy<T: PartialEq>(predicted: &[T], actual: &[T]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    let matches = predicted
        .iter()
        .zip(actual)
        .filter(|(p, a)| p == a)
        .count();
    matches as f64 / actual.len() as f64
}

/// Run `config.n_trials` trials and return the study.
pub fn run_search(
    train: &Partition,
    valid: &Partition,
    num_classes: usize,
    space: &SearchSpace,
    config: &SearchConfig,
) -> anyhow::Result<Study> {
    space.validate().context("invalid search space")?;
    anyhow::ensure!(config.n_trials > 0, "at least one trial is required");

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut study = Study::new();

    for number in 0..config.n_trials {
        let set = space.sample(&mut rng);
        let params = config.trial_params(number, &set)?;
        let model = gbdt::train(&train.features, &train.labels, num_classes, &params)
            .with_context(|| format!("trial {number} failed"))?;
        let predicted = model.predict_batch(&valid.features);
        let validation_accuracy = accuracy(&predicted, &valid.labels);

        study.record(TrialResult {
            number,
            params: set,
            validation_accuracy,
        });
        let best = study.best().map_or(0.0, |b| b.validation_accuracy);
        info!(
            trial = number,
            accuracy = validation_accuracy,
            best,
            boosting = %params.boosting_type,
            rounds = params.num_round,
            "trial finished"
        );
    }

    Ok(study)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trial(number: usize, acc: f64) -> TrialResult {
        TrialResult {
            number,
            params: ParamSet::new(),
            validation_accuracy: acc,
        }
    }

    fn partition(per_class: usize, offset: f32) -> Partition {
        let mut p = Partition::default();
        for i in 0..per_class {
            let j = offset + i as f32 * 0.01;
            p.features.push(vec![j, 1.0 + j, 0.0]);
            p.labels.push(0);
            p.features.push(vec![1.0 + j, j, 0.0]);
            p.labels.push(1);
        }
        p
    }

    fn quick_space() -> SearchSpace {
        SearchSpace::default()
            .with("num_round", SamplingRule::IntRange { low: 3, high: 8 })
            .with("num_leaves", SamplingRule::IntRange { low: 2, high: 6 })
            .with("min_child_samples", SamplingRule::IntRange { low: 1, high: 3 })
    }

    #[test]
    fn accuracy_counts_exact_matches() {
        let acc = accuracy(&["a", "b", "a"], &["a", "b", "b"]);
        assert!((acc - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(accuracy::<usize>(&[], &[]), 0.0);
        assert_eq!(accuracy(&[1, 2], &[1, 2]), 1.0);
    }

    #[test]
    fn study_keeps_highest() {
        let mut s = Study::new();
        s.record(trial(0, 0.5));
        s.record(trial(1, 0.8));
        s.record(trial(2, 0.6));
        assert_eq!(s.best().unwrap().number, 1);
        assert_eq!(s.len(), 3);
    }

    #[test]
    fn tie_keeps_earlier_trial() {
        let mut s = Study::new();
        s.record(trial(0, 0.7));
        s.record(trial(1, 0.9));
        s.record(trial(2, 0.9));
        assert_eq!(s.best().unwrap().number, 1);
    }

    #[test]
    fn default_space_matches_table() {
        let space = SearchSpace::default();
        assert_eq!(space.params.len(), 12);
        space.validate().unwrap();

        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..50 {
            let set = space.sample(&mut rng);
            let lr = set["learning_rate"].as_float("learning_rate").unwrap();
            assert!((1e-3..=0.1).contains(&lr));
            let depth = set["max_depth"].as_count("max_depth").unwrap();
            assert!((3..=12).contains(&depth));
            let kind = set["boosting_type"].as_choice("boosting_type").unwrap();
            assert!(kind == "gbdt" || kind == "dart");
            BoostingParams::default().with_overrides(&set).unwrap().validate().unwrap();
        }
    }

    #[test]
    fn sampling_is_seeded() {
        let space = SearchSpace::default();
        let a = space.sample(&mut StdRng::seed_from_u64(9));
        let b = space.sample(&mut StdRng::seed_from_u64(9));
        assert_eq!(a, b);
    }

    #[test]
    fn unknown_parameter_fails_validation() {
        let space = SearchSpace::new().with("n_estimators", SamplingRule::IntRange { low: 1, high: 2 });
        assert!(space.validate().is_err());
    }

    #[test]
    fn best_trial_dominates_all() {
        let train = partition(10, 0.0);
        let valid = partition(4, 0.005);
        let config = SearchConfig {
            n_trials: 6,
            ..Default::default()
        };
        let study = run_search(&train, &valid, 2, &quick_space(), &config).unwrap();

        assert_eq!(study.len(), 6);
        let best = study.best().unwrap();
        for t in study.trials() {
            assert!(best.validation_accuracy >= t.validation_accuracy);
        }
        let numbers: Vec<usize> = study.trials().iter().map(|t| t.number).collect();
        assert_eq!(numbers, (0..6).collect::<Vec<_>>());
    }

    #[test]
    fn trial_params_seeded_per_trial() {
        let config = SearchConfig::default();
        let p = config.trial_params(3, &ParamSet::new()).unwrap();
        assert_eq!(p.seed, 45);
    }
}
