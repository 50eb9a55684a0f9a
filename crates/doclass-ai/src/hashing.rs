//! Offline feature-hashing embedder.
//!
//! Lower-cased alphanumeric tokens are hashed (FNV-1a) into `dim` signed
//! buckets and the result is L2-normalised. Deterministic across runs and
//! platforms; no model files, no network.

use async_trait::async_trait;

use crate::provider::{EmbedError, EmbeddingProvider, normalize};

pub const DEFAULT_HASH_DIM: usize = 256;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dim: usize,
    name: String,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        let dim = dim.max(1);
        Self {
            dim,
            name: format!("feature-hash-{dim}"),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Embed synchronously.
    pub fn embed_text(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut v = vec![0.0f32; self.dim];
        let mut tokens = 0usize;

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let hash = fnv1a(token.to_lowercase().as_bytes());
            let bucket = (hash % self.dim as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            v[bucket] += sign;
            tokens += 1;
        }

        if tokens == 0 {
            return Err(EmbedError::EmptyInput);
        }
        normalize(&mut v);
        Ok(v)
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_HASH_DIM)
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, &b| {
        (hash ^ u64::from(b)).wrapping_mul(FNV_PRIME)
    })
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        self.embed_text(text)
    }

    fn model_name(&self) -> &str {
        &self.name
    }
}
