//! Embedding stage: provider selection and the labeled-tree → dataset pipeline.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::{Args, ValueEnum};
use doclass_ai::{Dataset, DatasetBuilder, EmbeddingProvider, HashEmbedder, HttpEmbedder};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProviderKind {
    /// Managed embedding endpoint over HTTP
    Http,
    /// Offline feature hashing
    Hashing,
    /// Local sentence-transformers model (requires the `onnx` feature)
    Onnx,
}

#[derive(Args, Debug, Clone)]
pub struct ProviderArgs {
    /// Embedding provider
    #[arg(long, value_enum, env = "DOCLASS_PROVIDER", default_value = "http")]
    pub provider: ProviderKind,

    /// Embedding endpoint URL; `{model}` is replaced by the model id
    #[arg(long, env = "DOCLASS_EMBEDDING_ENDPOINT")]
    pub endpoint: Option<String>,

    /// API key for the embedding endpoint
    #[arg(long, env = "DOCLASS_EMBEDDING_API_KEY", hide_env_values = true)]
    pub embedding_api_key: Option<String>,

    /// Embedding model id sent to the endpoint
    #[arg(long, default_value = doclass_ai::DEFAULT_MODEL_ID)]
    pub model_id: String,

    /// Largest chunk sent per request, in characters
    #[arg(long, default_value_t = doclass_ai::DEFAULT_MAX_CHUNK_CHARS)]
    pub max_chunk_chars: usize,

    /// Vector length of the hashing provider
    #[arg(long, env = "DOCLASS_HASH_DIM", default_value_t = doclass_ai::DEFAULT_HASH_DIM)]
    pub dim: usize,

    /// Directory with model.onnx and tokenizer.json
    #[arg(long, env = "DOCLASS_ONNX_MODEL_DIR", default_value = "models/all-MiniLM-L6-v2")]
    pub model_dir: PathBuf,
}

impl ProviderArgs {
    pub fn build(&self) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
        match self.provider {
            ProviderKind::Http => {
                let endpoint = self.endpoint.as_deref().context(
                    "the http provider needs --endpoint or DOCLASS_EMBEDDING_ENDPOINT",
                )?;
                let mut embedder = HttpEmbedder::new(endpoint)
                    .with_model_id(&self.model_id)
                    .with_max_chunk_chars(self.max_chunk_chars);
                if let Some(key) = &self.embedding_api_key {
                    embedder = embedder.with_api_key(key);
                }
                Ok(Arc::new(embedder))
            }
            ProviderKind::Hashing => Ok(Arc::new(HashEmbedder::new(self.dim))),
            ProviderKind::Onnx => self.build_onnx(),
        }
    }

    #[cfg(feature = "onnx")]
    fn build_onnx(&self) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
        let embedder = doclass_ai::OnnxEmbedder::load(&self.model_dir)
            .with_context(|| format!("loading ONNX model from {}", self.model_dir.display()))?;
        Ok(Arc::new(embedder))
    }

    #[cfg(not(feature = "onnx"))]
    fn build_onnx(&self) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
        anyhow::bail!(
            "the onnx provider is not compiled in (model dir {}); rebuild with --features onnx",
            self.model_dir.display()
        )
    }
}

/// Which label directories to leave out of the dataset.
#[derive(Args, Debug, Clone, Default)]
pub struct ExclusionArgs {
    /// Labels to leave out (default: other)
    #[arg(long = "exclude", value_name = "LABEL")]
    pub exclude: Vec<String>,

    /// Keep every label, including the default exclusions
    #[arg(long, conflicts_with = "exclude")]
    pub include_all: bool,
}

impl ExclusionArgs {
    pub fn labels(&self) -> Vec<String> {
        if self.include_all {
            Vec::new()
        } else if self.exclude.is_empty() {
            doclass_ai::dataset::DEFAULT_EXCLUDED_LABELS
                .iter()
                .map(|s| s.to_string())
                .collect()
        } else {
            self.exclude.clone()
        }
    }
}

pub struct DatasetStats {
    pub examples: usize,
    pub dim: usize,
    pub class_counts: Vec<(String, usize)>,
    pub elapsed_secs: f64,
}

impl DatasetStats {
    fn of(dataset: &Dataset, start: Instant) -> Self {
        Self {
            examples: dataset.len(),
            dim: dataset.dim(),
            class_counts: dataset
                .class_counts()
                .into_iter()
                .map(|(label, n)| (label.to_string(), n))
                .collect(),
            elapsed_secs: start.elapsed().as_secs_f64(),
        }
    }
}

/// Embed `docs` into the dataset file at `dataset_path`.
pub async fn run_embed(
    provider: &dyn EmbeddingProvider,
    docs: &Path,
    dataset_path: &Path,
    exclude: &[String],
    force: bool,
) -> anyhow::Result<DatasetStats> {
    let start = Instant::now();
    let builder = DatasetBuilder::new(provider).exclude_labels(exclude.iter().cloned());
    let dataset = doclass_ai::load_or_build(dataset_path, Some(docs), &builder, force)
        .await
        .with_context(|| format!("building dataset from {}", docs.display()))?;
    Ok(DatasetStats::of(&dataset, start))
}

/// Read the dataset file, embedding `docs` first if it does not exist yet.
pub async fn load_or_embed(
    provider: &dyn EmbeddingProvider,
    docs: &Path,
    dataset_path: &Path,
    exclude: &[String],
) -> anyhow::Result<Dataset> {
    let builder = DatasetBuilder::new(provider).exclude_labels(exclude.iter().cloned());
    doclass_ai::load_or_build(dataset_path, Some(docs), &builder, false)
        .await
        .with_context(|| format!("loading or building {}", dataset_path.display()))
}
