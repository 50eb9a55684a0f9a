//! Local sentence-transformers embeddings through ONNX Runtime.
//!
//! Mean-pooled all-MiniLM-L6-v2 (384 dimensions), the offline alternative to
//! the HTTP provider. The model directory must contain `model.onnx` and
//! `tokenizer.json`.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use ort::session::Session;
use ort::value::{Tensor, ValueType};
use tokenizers::{Tokenizer, TruncationParams};
use tracing::{debug, info};

use crate::provider::{EmbedError, EmbeddingProvider, normalize};

pub const DEFAULT_MODEL_NAME: &str = "all-MiniLM-L6-v2";

/// Tokens kept per document; MiniLM was trained on 256-token windows.
const MAX_TOKENS: usize = 256;

/// One document per inference call. Longer documents are truncated to
/// [`MAX_TOKENS`].
pub struct OnnxEmbedder {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    dim: usize,
    name: String,
}

impl OnnxEmbedder {
    pub fn load(model_dir: &Path) -> anyhow::Result<Self> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");
        for path in [&model_path, &tokenizer_path] {
            anyhow::ensure!(path.is_file(), "{} not found", path.display());
        }

        let session = Session::builder()?.commit_from_file(&model_path)?;
        let dim = session
            .outputs()
            .first()
            .and_then(|o| output_dim(o.dtype()))
            .unwrap_or(384);

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("load tokenizer: {e}"))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_TOKENS,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("set truncation: {e}"))?;

        let name = model_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_MODEL_NAME.to_string());

        info!(dim, model = %model_path.display(), "loaded ONNX embedding model");
        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            dim,
            name,
        })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    fn run(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow::anyhow!("tokenize: {e}"))?;
        let mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| m as i64)
            .collect();
        let ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let types: Vec<i64> = encoding.get_type_ids().iter().map(|&t| t as i64).collect();
        let shape = [1_i64, ids.len() as i64];

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow::anyhow!("session lock poisoned"))?;
        let outputs = session.run(ort::inputs![
            "input_ids" => Tensor::from_array((shape, ids.into_boxed_slice()))?,
            "attention_mask" => Tensor::from_array((shape, mask.clone().into_boxed_slice()))?,
            "token_type_ids" => Tensor::from_array((shape, types.into_boxed_slice()))?,
        ])?;

        // [1, tokens, dim]
        let (out_shape, data) = outputs[0].try_extract_tensor::<f32>()?;
        anyhow::ensure!(
            out_shape.len() == 3 && out_shape[2] as usize == self.dim,
            "unexpected output shape {out_shape:?}"
        );
        let tokens = (out_shape[1] as usize).min(mask.len());

        let mut pooled = mean_pool(data, &mask[..tokens], self.dim);
        normalize(&mut pooled);
        debug!(tokens, "embedded document");
        Ok(pooled)
    }
}

/// Average the token vectors whose mask is set.
fn mean_pool(token_vectors: &[f32], mask: &[i64], dim: usize) -> Vec<f32> {
    let mut pooled = vec![0.0f32; dim];
    let mut count = 0.0f32;
    for (token, _) in mask.iter().enumerate().filter(|(_, m)| **m > 0) {
        let row = &token_vectors[token * dim..(token + 1) * dim];
        for (p, v) in pooled.iter_mut().zip(row) {
            *p += v;
        }
        count += 1.0;
    }
    if count > 0.0 {
        pooled.iter_mut().for_each(|p| *p /= count);
    }
    pooled
}

fn output_dim(output: &ValueType) -> Option<usize> {
    match output {
        ValueType::Tensor { shape, .. } => shape.last().and_then(|&d| (d > 0).then_some(d as usize)),
        _ => None,
    }
}

#[async_trait]
impl EmbeddingProvider for OnnxEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        if text.trim().is_empty() {
            return Err(EmbedError::EmptyInput);
        }
        self.run(text).map_err(|e| EmbedError::Model(format!("{e:#}")))
    }

    fn model_name(&self) -> &str {
        &self.name
    }
}
