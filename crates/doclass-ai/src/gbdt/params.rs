use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::search::{ParamSet, ParamValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoostingType {
    /// Plain gradient boosting.
    #[default]
    Gbdt,
    /// Dropout boosting: earlier rounds are randomly muted while fitting a new one.
    Dart,
}

impl BoostingType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gbdt => "gbdt",
            Self::Dart => "dart",
        }
    }
}

impl fmt::Display for BoostingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BoostingType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gbdt" => Ok(Self::Gbdt),
            "dart" => Ok(Self::Dart),
            other => anyhow::bail!("unknown boosting type {other:?} (expected gbdt or dart)"),
        }
    }
}

/// Training parameters of the boosted-tree classifier.
///
/// Names follow the LightGBM parameter names the search space uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostingParams {
    pub boosting_type: BoostingType,
    pub num_round: usize,
    pub num_leaves: usize,
    /// Maximum tree depth; 0 means unlimited.
    pub max_depth: usize,
    pub learning_rate: f64,
    pub feature_fraction: f64,
    pub bagging_fraction: f64,
    /// Resample the bag every `bagging_freq` rounds; 0 disables bagging.
    pub bagging_freq: usize,
    pub min_child_samples: usize,
    pub lambda_l1: f64,
    pub lambda_l2: f64,
    pub min_split_gain: f64,
    pub drop_rate: f64,
    pub skip_drop: f64,
    pub max_bin: usize,
    pub seed: u64,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            boosting_type: BoostingType::Gbdt,
            num_round: 100,
            num_leaves: 31,
            max_depth: 0,
            learning_rate: 0.1,
            feature_fraction: 1.0,
            bagging_fraction: 1.0,
            bagging_freq: 0,
            min_child_samples: 20,
            lambda_l1: 0.0,
            lambda_l2: 0.0,
            min_split_gain: 0.0,
            drop_rate: 0.1,
            skip_drop: 0.5,
            max_bin: 63,
            seed: 0,
        }
    }
}

impl BoostingParams {
    /// Check ranges before training.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.num_round > 0, "num_round must be positive");
        anyhow::ensure!(self.num_leaves >= 2, "num_leaves must be at least 2");
        anyhow::ensure!(
            self.learning_rate > 0.0 && self.learning_rate.is_finite(),
            "learning_rate must be positive, got {}",
            self.learning_rate
        );
        for (name, v) in [
            ("feature_fraction", self.feature_fraction),
            ("bagging_fraction", self.bagging_fraction),
        ] {
            anyhow::ensure!(v > 0.0 && v <= 1.0, "{name} must be in (0, 1], got {v}");
        }
        for (name, v) in [("drop_rate", self.drop_rate), ("skip_drop", self.skip_drop)] {
            anyhow::ensure!((0.0..=1.0).contains(&v), "{name} must be in [0, 1], got {v}");
        }
        for (name, v) in [
            ("lambda_l1", self.lambda_l1),
            ("lambda_l2", self.lambda_l2),
            ("min_split_gain", self.min_split_gain),
        ] {
            anyhow::ensure!(v >= 0.0, "{name} must be non-negative, got {v}");
        }
        anyhow::ensure!(
            (2..=256).contains(&self.max_bin),
            "max_bin must be in [2, 256], got {}",
            self.max_bin
        );
        Ok(())
    }

    /// Set one parameter by name.
    pub fn apply(&mut self, name: &str, value: &ParamValue) -> anyhow::Result<()> {
        match name {
            "boosting_type" => self.boosting_type = value.as_choice(name)?.parse()?,
            "num_round" => self.num_round = value.as_count(name)?,
            "num_leaves" => self.num_leaves = value.as_count(name)?,
            "max_depth" => self.max_depth = value.as_count(name)?,
            "bagging_freq" => self.bagging_freq = value.as_count(name)?,
            "min_child_samples" => self.min_child_samples = value.as_count(name)?,
            "max_bin" => self.max_bin = value.as_count(name)?,
            "learning_rate" => self.learning_rate = value.as_float(name)?,
            "feature_fraction" => self.feature_fraction = value.as_float(name)?,
            "bagging_fraction" => self.bagging_fraction = value.as_float(name)?,
            "lambda_l1" => self.lambda_l1 = value.as_float(name)?,
            "lambda_l2" => self.lambda_l2 = value.as_float(name)?,
            "min_split_gain" => self.min_split_gain = value.as_float(name)?,
            "drop_rate" => self.drop_rate = value.as_float(name)?,
            "skip_drop" => self.skip_drop = value.as_float(name)?,
            other => anyhow::bail!("unknown hyperparameter {other:?}"),
        }
        Ok(())
    }

    /// Copy of `self` with every entry of `set` applied.
    pub fn with_overrides(&self, set: &ParamSet) -> anyhow::Result<Self> {
        let mut params = self.clone();
        for (name, value) in set {
            params.apply(name, value)?;
        }
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        BoostingParams::default().validate().unwrap();
    }

    #[test]
    fn overrides_by_name() {
        let mut set = ParamSet::new();
        set.insert("boosting_type".into(), ParamValue::Choice("dart".into()));
        set.insert("num_leaves".into(), ParamValue::Int(42));
        set.insert("learning_rate".into(), ParamValue::Float(0.05));

        let p = BoostingParams::default().with_overrides(&set).unwrap();
        assert_eq!(p.boosting_type, BoostingType::Dart);
        assert_eq!(p.num_leaves, 42);
        assert_eq!(p.learning_rate, 0.05);
        assert_eq!(p.num_round, 100);
    }

    #[test]
    fn unknown_name_rejected() {
        let mut p = BoostingParams::default();
        let err = p.apply("num_trees", &ParamValue::Int(5)).unwrap_err();
        assert!(err.to_string().contains("num_trees"));
    }

    #[test]
    fn wrong_kind_rejected() {
        let mut p = BoostingParams::default();
        assert!(p.apply("num_leaves", &ParamValue::Choice("many".into())).is_err());
        assert!(p.apply("boosting_type", &ParamValue::Int(1)).is_err());
        assert!(p.apply("num_leaves", &ParamValue::Int(-3)).is_err());
    }

    #[test]
    fn out_of_range_fails_validation() {
        let p = BoostingParams {
            feature_fraction: 0.0,
            ..Default::default()
        };
        assert!(p.validate().is_err());

        let p = BoostingParams {
            num_leaves: 1,
            ..Default::default()
        };
        assert!(p.validate().is_err());
    }

    #[test]
    fn boosting_type_serde() {
        assert_eq!(serde_json::to_string(&BoostingType::Dart).unwrap(), r#""dart""#);
        assert_eq!("gbdt".parse::<BoostingType>().unwrap(), BoostingType::Gbdt);
        assert!("goss".parse::<BoostingType>().is_err());
    }
}
