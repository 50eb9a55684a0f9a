//! The embedding provider boundary: text in, fixed-length vector out.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("cannot embed empty text")]
    EmptyInput,
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("embedding provider returned {status}: {body}")]
    Provider { status: u16, body: String },
    #[error("malformed embedding response: {0}")]
    Malformed(String),
    #[error("embedding has {actual} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("embedding model error: {0}")]
    Model(String),
}

/// Turns a document into a fixed-length vector.
///
/// Implementations hold no per-call state; retries, if any, are their own
/// concern.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;

    /// Identifier of the underlying model.
    fn model_name(&self) -> &str;
}

/// Split `text` into consecutive pieces of at most `max_chars` characters.
///
/// Splits on `char` boundaries, never inside a code point. A `max_chars` of
/// zero disables chunking.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<&str> {
    if text.is_empty() {
        return Vec::new();
    }
    if max_chars == 0 {
        return vec![text];
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    let mut count = 0;
    for (idx, _) in text.char_indices() {
        if count == max_chars {
            chunks.push(&text[start..idx]);
            start = idx;
            count = 0;
        }
        count += 1;
    }
    chunks.push(&text[start..]);
    chunks
}

/// Element-wise mean of equally sized vectors.
pub fn average_embeddings(embeddings: &[Vec<f32>]) -> Result<Vec<f32>, EmbedError> {
    let first = embeddings
        .first()
        .ok_or_else(|| EmbedError::Malformed("no embeddings to average".into()))?;
    let dim = first.len();

    let mut mean = vec![0.0f32; dim];
    for emb in embeddings {
        if emb.len() != dim {
            return Err(EmbedError::DimensionMismatch {
                expected: dim,
                actual: emb.len(),
            });
        }
        for (acc, &v) in mean.iter_mut().zip(emb) {
            *acc += v;
        }
    }
    let n = embeddings.len() as f32;
    for v in &mut mean {
        *v /= n;
    }
    Ok(mean)
}

/// L2-normalize a vector in place.
pub fn normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
