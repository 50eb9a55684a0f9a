//! Dataset builder: labeled directory tree → embedded examples.
//!
//! Layout is `root/{label}/**/*.txt`; each document is labeled with the name
//! of its immediate parent directory. Documents are embedded one at a time
//! and the build stops at the first failure, naming the offending file.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use doclass_core::{CoreError, LabelMapping, LabeledExample, embedding_dim};
use doclass_store::StoreError;
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::provider::{EmbedError, EmbeddingProvider};

pub const DEFAULT_DATASET_FILE: &str = "embedding_labels.parquet";

/// Labels left out of training unless overridden.
pub const DEFAULT_EXCLUDED_LABELS: &[&str] = &["other"];

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("dataset directory not found: {0}")]
    MissingRoot(PathBuf),
    #[error("no .txt documents found under {0}")]
    NoDocuments(PathBuf),
    #[error("failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        source: walkdir::Error,
    },
    #[error("failed to read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("document {0} is empty")]
    EmptyDocument(PathBuf),
    #[error("embedding failed for {path}: {source}")]
    Embedding { path: PathBuf, source: EmbedError },
    #[error(transparent)]
    Inconsistent(#[from] CoreError),
    #[error("dataset file {path}: {source}")]
    Store { path: PathBuf, source: StoreError },
    #[error("dataset file {0} does not exist and no document directory was given")]
    NothingToLoad(PathBuf),
}

/// A document found on disk, not yet embedded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub path: PathBuf,
    pub label: String,
}

/// Embedded examples plus the label mapping derived from them.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub examples: Vec<LabeledExample>,
    pub labels: LabelMapping,
    dim: usize,
}

impl Dataset {
    /// Validate vector lengths and derive the label mapping.
    pub fn new(examples: Vec<LabeledExample>) -> Result<Self, CoreError> {
        let dim = embedding_dim(&examples)?.unwrap_or(0);
        let labels = LabelMapping::from_labels(examples.iter().map(|e| e.label.as_str()));
        Ok(Self {
            examples,
            labels,
            dim,
        })
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    /// Embedding dimension shared by every example (0 when empty).
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of examples per label, in label order.
    pub fn class_counts(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for ex in &self.examples {
            *counts.entry(ex.label.as_str()).or_insert(0) += 1;
        }
        counts
    }
}

/// Walks a labeled directory tree and embeds every document.
pub struct DatasetBuilder<'a> {
    provider: &'a dyn EmbeddingProvider,
    excluded: HashSet<String>,
}

impl<'a> DatasetBuilder<'a> {
    pub fn new(provider: &'a dyn EmbeddingProvider) -> Self {
        Self {
            provider,
            excluded: HashSet::new(),
        }
    }

    /// Skip documents whose label is in `labels`.
    pub fn exclude_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded.extend(labels.into_iter().map(Into::into));
        self
    }

    /// List `.txt` documents beneath the label directories of `root`.
    ///
    /// Sorted by path. Files directly inside `root` have no label directory
    /// and are skipped.
    pub fn collect_documents(&self, root: &Path) -> Result<Vec<Document>, DatasetError> {
        if !root.is_dir() {
            return Err(DatasetError::MissingRoot(root.to_path_buf()));
        }

        let mut docs = Vec::new();
        for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|source| DatasetError::Walk {
                path: root.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            if !entry.file_type().is_file() || path.extension().is_none_or(|ext| ext != "txt") {
                continue;
            }
            if entry.depth() == 1 {
                warn!(path = %path.display(), "skipping document outside any label directory");
                continue;
            }

            let Some(label) = path
                .parent()
                .and_then(Path::file_name)
                .map(|n| n.to_string_lossy().into_owned())
            else {
                continue;
            };
            if self.excluded.contains(&label) {
                debug!(path = %path.display(), label, "skipping excluded label");
                continue;
            }

            docs.push(Document {
                path: path.to_path_buf(),
                label,
            });
        }

        if docs.is_empty() {
            return Err(DatasetError::NoDocuments(root.to_path_buf()));
        }
        Ok(docs)
    }

    /// Read and embed every document under `root`.
    pub async fn build(&self, root: &Path) -> Result<Dataset, DatasetError> {
        let docs = self.collect_documents(root)?;
        let total = docs.len();
        info!(
            documents = total,
            root = %root.display(),
            model = self.provider.model_name(),
            "embedding documents"
        );

        let mut examples = Vec::with_capacity(total);
        for (i, doc) in docs.into_iter().enumerate() {
            let text =
                std::fs::read_to_string(&doc.path).map_err(|source| DatasetError::Unreadable {
                    path: doc.path.clone(),
                    source,
                })?;
            let text = text.trim();
            if text.is_empty() {
                return Err(DatasetError::EmptyDocument(doc.path));
            }

            let embedding =
                self.provider
                    .embed(text)
                    .await
                    .map_err(|source| DatasetError::Embedding {
                        path: doc.path.clone(),
                        source,
                    })?;
            debug!(path = %doc.path.display(), n = i + 1, total, "embedded");

            examples.push(LabeledExample::new(
                doc.path.to_string_lossy(),
                doc.label,
                embedding,
            ));
        }

        let dataset = Dataset::new(examples)?;
        info!(
            examples = dataset.len(),
            labels = dataset.labels.len(),
            dim = dataset.dim(),
            "built dataset"
        );
        Ok(dataset)
    }
}

/// Read the dataset file at `path`, or build it from `docs_root` and write it.
///
/// An existing file is reused unless `force` is set.
pub async fn load_or_build(
    path: &Path,
    docs_root: Option<&Path>,
    builder: &DatasetBuilder<'_>,
    force: bool,
) -> Result<Dataset, DatasetError> {
    if path.exists() && !force {
        let examples =
            doclass_store::read_dataset(path).map_err(|source| DatasetError::Store {
                path: path.to_path_buf(),
                source,
            })?;
        return Ok(Dataset::new(examples)?);
    }

    let root = docs_root.ok_or_else(|| DatasetError::NothingToLoad(path.to_path_buf()))?;
    let dataset = builder.build(root).await?;
    doclass_store::write_dataset(path, &dataset.examples).map_err(|source| {
        DatasetError::Store {
            path: path.to_path_buf(),
            source,
        }
    })?;
    Ok(dataset)
}

/// Read a previously written dataset file.
pub fn load(path: &Path) -> Result<Dataset, DatasetError> {
    let examples = doclass_store::read_dataset(path).map_err(|source| DatasetError::Store {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Dataset::new(examples)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HashEmbedder;
    use async_trait::async_trait;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, text: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    fn corpus() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write(root, "business/001.txt", "Lufthansa flies back to profit");
        write(root, "business/002.txt", "Shares rose after strong earnings");
        write(root, "sport/001.txt", "The striker scored a late winner");
        write(root, "sport/2004/002.txt", "Cup final goes to penalties");
        write(root, "tech/001.txt", "SpaceX launches Falcon 9 rocket");
        write(root, "tech/notes.md", "not a document");
        tmp
    }

    /// Fails on any document containing "penalties".
    struct Picky;

    #[async_trait]
    impl EmbeddingProvider for Picky {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
            if text.contains("penalties") {
                return Err(EmbedError::Provider {
                    status: 429,
                    body: "throttled".into(),
                });
            }
            Ok(vec![1.0, 0.0])
        }

        fn model_name(&self) -> &str {
            "picky"
        }
    }

    /// Returns vectors whose length depends on the text.
    struct Ragged;

    #[async_trait]
    impl EmbeddingProvider for Ragged {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
            Ok(vec![0.5; text.len() % 3 + 1])
        }

        fn model_name(&self) -> &str {
            "ragged"
        }
    }

    #[tokio::test]
    async fn one_example_per_txt_file() {
        let tmp = corpus();
        let embedder = HashEmbedder::new(32);
        let dataset = DatasetBuilder::new(&embedder)
            .build(tmp.path())
            .await
            .unwrap();

        assert_eq!(dataset.len(), 5);
        assert_eq!(dataset.dim(), 32);
        for ex in &dataset.examples {
            let parent = Path::new(&ex.source)
                .parent()
                .and_then(Path::file_name)
                .unwrap()
                .to_string_lossy()
                .into_owned();
            assert_eq!(ex.label, parent, "label of {}", ex.source);
        }
    }

    #[tokio::test]
    async fn nested_document_labeled_by_parent() {
        let tmp = corpus();
        let embedder = HashEmbedder::new(16);
        let dataset = DatasetBuilder::new(&embedder)
            .build(tmp.path())
            .await
            .unwrap();

        let nested = dataset
            .examples
            .iter()
            .find(|e| e.source.ends_with("002.txt") && e.source.contains("2004"))
            .unwrap();
        assert_eq!(nested.label, "2004");
    }

    #[test]
    fn excluded_labels_and_root_files_skipped() {
        let tmp = corpus();
        write(tmp.path(), "other/001.txt", "misc");
        write(tmp.path(), "README.txt", "top-level file");

        let embedder = HashEmbedder::new(16);
        let docs = DatasetBuilder::new(&embedder)
            .exclude_labels(DEFAULT_EXCLUDED_LABELS.iter().copied())
            .collect_documents(tmp.path())
            .unwrap();

        assert_eq!(docs.len(), 5);
        assert!(docs.iter().all(|d| d.label != "other"));
        assert!(docs.iter().all(|d| !d.path.ends_with("README.txt")));
    }

    #[test]
    fn documents_sorted_by_path() {
        let tmp = corpus();
        let embedder = HashEmbedder::new(16);
        let docs = DatasetBuilder::new(&embedder)
            .collect_documents(tmp.path())
            .unwrap();
        let paths: Vec<_> = docs.iter().map(|d| d.path.clone()).collect();
        let mut sorted = paths.clone();
        sorted.sort();
        assert_eq!(paths, sorted);
    }

    #[tokio::test]
    async fn embedding_failure_names_the_file() {
        let tmp = corpus();
        let err = DatasetBuilder::new(&Picky)
            .build(tmp.path())
            .await
            .unwrap_err();
        match err {
            DatasetError::Embedding { path, .. } => assert!(path.ends_with("002.txt")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn ragged_vectors_rejected() {
        let tmp = corpus();
        let err = DatasetBuilder::new(&Ragged)
            .build(tmp.path())
            .await
            .unwrap_err();
        assert!(matches!(err, DatasetError::Inconsistent(_)));
    }

    #[tokio::test]
    async fn empty_document_rejected() {
        let tmp = corpus();
        write(tmp.path(), "sport/blank.txt", "   \n");
        let embedder = HashEmbedder::new(16);
        let err = DatasetBuilder::new(&embedder)
            .build(tmp.path())
            .await
            .unwrap_err();
        assert!(matches!(err, DatasetError::EmptyDocument(_)));
    }

    #[test]
    fn missing_root() {
        let embedder = HashEmbedder::new(16);
        let err = DatasetBuilder::new(&embedder)
            .collect_documents(Path::new("/definitely/not/here"))
            .unwrap_err();
        assert!(matches!(err, DatasetError::MissingRoot(_)));
    }

    #[test]
    fn root_without_documents() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "sport/readme.md", "no txt here");
        let embedder = HashEmbedder::new(16);
        let err = DatasetBuilder::new(&embedder)
            .collect_documents(tmp.path())
            .unwrap_err();
        assert!(matches!(err, DatasetError::NoDocuments(_)));
    }

    #[tokio::test]
    async fn load_or_build_reuses_existing_file() {
        let tmp = corpus();
        let file = tmp.path().join("out").join(DEFAULT_DATASET_FILE);
        let embedder = HashEmbedder::new(8);
        let builder = DatasetBuilder::new(&embedder);

        let built = load_or_build(&file, Some(&tmp.path().join("business")), &builder, false)
            .await;
        // `business` has no label subdirectories, only root-level files.
        assert!(matches!(built, Err(DatasetError::NoDocuments(_))));

        let built = load_or_build(&file, Some(tmp.path()), &builder, false)
            .await
            .unwrap();
        assert!(file.exists());

        // Second call must not touch the documents.
        let loaded = load_or_build(&file, None, &builder, false).await.unwrap();
        assert_eq!(loaded.examples, built.examples);
        assert_eq!(loaded.labels, built.labels);
    }

    #[tokio::test]
    async fn load_or_build_needs_a_source() {
        let tmp = TempDir::new().unwrap();
        let embedder = HashEmbedder::new(8);
        let err = load_or_build(
            &tmp.path().join(DEFAULT_DATASET_FILE),
            None,
            &DatasetBuilder::new(&embedder),
            false,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DatasetError::NothingToLoad(_)));
    }

    #[test]
    fn class_counts() {
        let dataset = Dataset::new(vec![
            LabeledExample::new("a", "sport", vec![1.0]),
            LabeledExample::new("b", "sport", vec![2.0]),
            LabeledExample::new("c", "tech", vec![3.0]),
        ])
        .unwrap();
        let counts = dataset.class_counts();
        assert_eq!(counts["sport"], 2);
        assert_eq!(counts["tech"], 1);
        assert_eq!(dataset.labels.len(), 2);
    }
}
