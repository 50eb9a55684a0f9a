//! HTTP embedding provider for a managed text-embedding endpoint.
//!
//! Speaks the Titan text-embedding shape: `{"inputText": "..."}` in,
//! `{"embedding": [...]}` out. Long documents are split into character
//! chunks, each chunk is embedded, and the vectors are averaged.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::provider::{EmbedError, EmbeddingProvider, average_embeddings, chunk_text};

/// Largest chunk sent in a single request, in characters.
pub const DEFAULT_MAX_CHUNK_CHARS: usize = 8000;
pub const DEFAULT_MODEL_ID: &str = "amazon.titan-embed-text-v2:0";

/// Embedding provider backed by an HTTP endpoint.
pub struct HttpEmbedder {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model_id: String,
    max_chunk_chars: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest<'a> {
    input_text: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

impl HttpEmbedder {
    /// Create a provider posting to `endpoint`.
    ///
    /// A `{model}` placeholder in the endpoint is replaced by the model id,
    /// e.g. `https://host/model/{model}/invoke`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: None,
            model_id: DEFAULT_MODEL_ID.to_string(),
            max_chunk_chars: DEFAULT_MAX_CHUNK_CHARS,
        }
    }

    /// Send `key` as the `x-api-key` header.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    pub fn with_max_chunk_chars(mut self, max_chunk_chars: usize) -> Self {
        self.max_chunk_chars = max_chunk_chars;
        self
    }

    /// Endpoint URL with the model id substituted.
    pub fn url(&self) -> String {
        self.endpoint.replace("{model}", &self.model_id)
    }

    async fn embed_chunk(&self, url: &str, chunk: &str) -> Result<Vec<f32>, EmbedError> {
        let mut request = self
            .client
            .post(url)
            .json(&EmbedRequest { input_text: chunk });
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(EmbedError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let text = resp.text().await?;
        parse_response(&text)
    }
}

fn parse_response(body: &str) -> Result<Vec<f32>, EmbedError> {
    let parsed: EmbedResponse =
        serde_json::from_str(body).map_err(|e| EmbedError::Malformed(e.to_string()))?;
    if parsed.embedding.is_empty() {
        return Err(EmbedError::Malformed("empty embedding vector".into()));
    }
    Ok(parsed.embedding)
}

#[async_trait]
impl EmbeddingProvider for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let chunks = chunk_text(text, self.max_chunk_chars);
        if chunks.is_empty() {
            return Err(EmbedError::EmptyInput);
        }

        let url = self.url();
        let mut embeddings = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            embeddings.push(self.embed_chunk(&url, chunk).await?);
        }
        debug!(chunks = chunks.len(), chars = text.chars().count(), "embedded document");

        average_embeddings(&embeddings)
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}
