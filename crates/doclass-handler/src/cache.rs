//! Load-once model artifact cache.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use doclass_ai::{ArtifactError, ModelArtifact};
use tokio::sync::OnceCell;
use tracing::debug;

static SHARED: OnceCell<Arc<ModelArtifact>> = OnceCell::const_new();

/// Process-wide artifact, loaded from `dir` on first use.
///
/// The first successful load wins: later calls return the same artifact
/// whatever `dir` they pass. A failed load leaves the cell empty so the next
/// call retries.
pub async fn shared_artifact(dir: &Path) -> Result<Arc<ModelArtifact>, ArtifactError> {
    SHARED
        .get_or_try_init(|| load(dir.to_path_buf()))
        .await
        .cloned()
}

/// An artifact directory loaded lazily, at most once per cache.
#[derive(Debug)]
pub struct ArtifactCache {
    dir: PathBuf,
    cell: OnceCell<Arc<ModelArtifact>>,
}

impl ArtifactCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cell: OnceCell::new(),
        }
    }

    pub async fn get(&self) -> Result<Arc<ModelArtifact>, ArtifactError> {
        self.cell
            .get_or_try_init(|| load(self.dir.clone()))
            .await
            .cloned()
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }
}

async fn load(dir: PathBuf) -> Result<Arc<ModelArtifact>, ArtifactError> {
    debug!(dir = %dir.display(), "loading model artifact");
    ModelArtifact::load(&dir).map(Arc::new)
}
