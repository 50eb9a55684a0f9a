//! The persisted model artifact: trained classifier plus label mapping.
//!
//! Two files in one directory. The model file holds the trees and some
//! training metadata; the label file holds the index → label list. Once
//! loaded the artifact is never mutated.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use doclass_core::LabelMapping;
use doclass_store::StoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::gbdt::BoostedClassifier;
use crate::search::ParamSet;

pub const MODEL_FILE: &str = "document_classification_model.json";
pub const LABELS_FILE: &str = "label_mappings.json";

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact file not found: {0}")]
    Missing(PathBuf),
    #[error("artifact file {path}: {source}")]
    Store { path: PathBuf, source: StoreError },
    #[error("corrupt model: {0}")]
    Corrupt(String),
    #[error("model has {model} classes but the label mapping has {labels}")]
    ClassCountMismatch { model: usize, labels: usize },
    #[error("embedding has {actual} dimensions, model expects {expected}")]
    InputDimension { expected: usize, actual: usize },
    #[error("class index {0} has no label")]
    UnknownClass(usize),
}

/// How the model was selected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub trained_at: DateTime<Utc>,
    /// Search trial whose configuration was retrained.
    pub best_trial: Option<usize>,
    /// Sampled hyperparameters of that trial.
    pub search_params: ParamSet,
    pub validation_accuracy: Option<f64>,
    pub holdout_accuracy: Option<f64>,
}

impl ModelMetadata {
    pub fn now() -> Self {
        Self {
            trained_at: Utc::now(),
            best_trial: None,
            search_params: ParamSet::new(),
            validation_accuracy: None,
            holdout_accuracy: None,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct ModelFile {
    metadata: ModelMetadata,
    model: BoostedClassifier,
}

#[derive(Debug, Clone)]
pub struct ModelArtifact {
    model: BoostedClassifier,
    labels: LabelMapping,
    metadata: ModelMetadata,
}

impl ModelArtifact {
    pub fn new(
        model: BoostedClassifier,
        labels: LabelMapping,
        metadata: ModelMetadata,
    ) -> Result<Self, ArtifactError> {
        if model.num_classes != labels.len() {
            return Err(ArtifactError::ClassCountMismatch {
                model: model.num_classes,
                labels: labels.len(),
            });
        }
        model
            .validate()
            .map_err(|e| ArtifactError::Corrupt(format!("{e:#}")))?;
        Ok(Self {
            model,
            labels,
            metadata,
        })
    }

    /// Write both files into `dir`, creating it if needed.
    pub fn save(&self, dir: &Path) -> Result<(), ArtifactError> {
        let model_path = dir.join(MODEL_FILE);
        let labels_path = dir.join(LABELS_FILE);

        let file = ModelFile {
            metadata: self.metadata.clone(),
            model: self.model.clone(),
        };
        doclass_store::write_json(&model_path, &file).map_err(|source| ArtifactError::Store {
            path: model_path.clone(),
            source,
        })?;
        doclass_store::write_json(&labels_path, &self.labels).map_err(|source| {
            ArtifactError::Store {
                path: labels_path.clone(),
                source,
            }
        })?;

        info!(dir = %dir.display(), classes = self.labels.len(), "saved model artifact");
        Ok(())
    }

    /// Read both files from `dir`.
    pub fn load(dir: &Path) -> Result<Self, ArtifactError> {
        let model_path = dir.join(MODEL_FILE);
        let labels_path = dir.join(LABELS_FILE);
        for path in [&model_path, &labels_path] {
            if !path.is_file() {
                return Err(ArtifactError::Missing(path.clone()));
            }
        }

        let file: ModelFile =
            doclass_store::read_json(&model_path).map_err(|source| ArtifactError::Store {
                path: model_path.clone(),
                source,
            })?;
        let labels: LabelMapping =
            doclass_store::read_json(&labels_path).map_err(|source| ArtifactError::Store {
                path: labels_path.clone(),
                source,
            })?;

        let artifact = Self::new(file.model, labels, file.metadata)?;
        info!(
            dir = %dir.display(),
            classes = artifact.labels.len(),
            dim = artifact.dim(),
            rounds = artifact.model.num_rounds(),
            "loaded model artifact"
        );
        Ok(artifact)
    }

    /// Class index for one embedding.
    pub fn predict_index(&self, embedding: &[f32]) -> Result<usize, ArtifactError> {
        if embedding.len() != self.dim() {
            return Err(ArtifactError::InputDimension {
                expected: self.dim(),
                actual: embedding.len(),
            });
        }
        Ok(self.model.predict(embedding))
    }

    pub fn predict_label(&self, embedding: &[f32]) -> Result<&str, ArtifactError> {
        let index = self.predict_index(embedding)?;
        self.labels
            .label_of(index)
            .ok_or(ArtifactError::UnknownClass(index))
    }

    pub fn model(&self) -> &BoostedClassifier {
        &self.model
    }

    pub fn labels(&self) -> &LabelMapping {
        &self.labels
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    /// Embedding dimension the model was trained on.
    pub fn dim(&self) -> usize {
        self.model.num_features
    }
}
