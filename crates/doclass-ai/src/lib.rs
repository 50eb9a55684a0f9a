//! AI layer: embedding providers, dataset building, boosted-tree training,
//! hyperparameter search, and the persisted model artifact.

pub mod artifact;
pub mod dataset;
pub mod gbdt;
mod hashing;
mod http;
mod provider;
pub mod search;
pub mod split;
pub mod trainer;

#[cfg(feature = "onnx")]
mod embedder;
#[cfg(feature = "onnx")]
pub use embedder::OnnxEmbedder;

pub use artifact::{ArtifactError, LABELS_FILE, MODEL_FILE, ModelArtifact, ModelMetadata};
pub use dataset::{Dataset, DatasetBuilder, DatasetError, load_or_build};
pub use gbdt::{BoostedClassifier, BoostingParams, BoostingType};
pub use hashing::{DEFAULT_HASH_DIM, HashEmbedder};
pub use http::{DEFAULT_MAX_CHUNK_CHARS, DEFAULT_MODEL_ID, HttpEmbedder};
pub use provider::{EmbedError, EmbeddingProvider, average_embeddings, chunk_text, normalize};
pub use search::{
    ParamSet, ParamValue, SamplingRule, SearchConfig, SearchSpace, Study, TrialResult, accuracy,
    run_search,
};
pub use split::{Partition, SplitConfig, train_test_split};
pub use trainer::{PredictionPair, TrainConfig, TrainingOutcome, train_and_select};
