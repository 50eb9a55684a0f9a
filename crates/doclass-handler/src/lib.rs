//! Inference handler: gateway event in, classification response out.
//!
//! The artifact is loaded once and shared. Bad input becomes a 400, provider
//! and artifact failures become a 500; the handler itself never panics.

mod cache;

use std::path::Path;
use std::sync::Arc;

use doclass_ai::{ArtifactError, EmbedError, EmbeddingProvider, ModelArtifact};
use doclass_core::{ClassifyRequest, ClassifyResponse, GatewayEvent, GatewayResponse};
use thiserror::Error;
use tracing::{info, warn};

pub use cache::{ArtifactCache, shared_artifact};

pub const MISSING_TEXT: &str = "Missing 'document_text' in request body";

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbedError),
    #[error("model artifact: {0}")]
    Artifact(#[from] ArtifactError),
}

impl HandlerError {
    /// HTTP status code reported to the gateway.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidRequest(_) => 400,
            Self::Artifact(ArtifactError::InputDimension { .. }) => 400,
            Self::Embedding(EmbedError::EmptyInput) => 400,
            Self::Embedding(_) | Self::Artifact(_) => 500,
        }
    }

    fn into_response(self) -> GatewayResponse {
        let status = self.status_code();
        if status >= 500 {
            warn!(status, error = %self, "classification failed");
        }
        GatewayResponse::error(status, self.to_string())
    }
}

/// Classifies documents against one loaded artifact.
#[derive(Clone)]
pub struct Handler {
    artifact: Arc<ModelArtifact>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl Handler {
    pub fn new(artifact: Arc<ModelArtifact>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { artifact, embedder }
    }

    /// Handler over the process-wide artifact loaded from `dir`.
    pub async fn from_artifact_dir(
        dir: &Path,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self, HandlerError> {
        let artifact = shared_artifact(dir).await?;
        Ok(Self::new(artifact, embedder))
    }

    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }

    /// Handle one gateway event.
    pub async fn handle(&self, event: &GatewayEvent) -> GatewayResponse {
        match self.classify_event(event).await {
            Ok(response) => GatewayResponse::ok(&response),
            Err(e) => e.into_response(),
        }
    }

    /// Handle a raw event document, e.g. a saved test event.
    pub async fn handle_json(&self, raw_event: &str) -> GatewayResponse {
        match serde_json::from_str::<GatewayEvent>(raw_event) {
            Ok(event) => self.handle(&event).await,
            Err(e) => HandlerError::InvalidRequest(format!("Invalid event: {e}")).into_response(),
        }
    }

    pub async fn classify_event(
        &self,
        event: &GatewayEvent,
    ) -> Result<ClassifyResponse, HandlerError> {
        let body = event
            .body
            .as_deref()
            .ok_or_else(|| HandlerError::InvalidRequest("Missing request body".into()))?;
        let request: ClassifyRequest = serde_json::from_str(body)
            .map_err(|e| HandlerError::InvalidRequest(format!("Invalid JSON body: {e}")))?;
        self.classify(&request).await
    }

    /// Embed (if needed) and classify a single request.
    ///
    /// Non-blank `document_text` wins over `embedding` when both are sent.
    pub async fn classify(&self, request: &ClassifyRequest) -> Result<ClassifyResponse, HandlerError> {
        let text = request
            .document_text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());

        let embedding = match (text, &request.embedding) {
            (Some(text), _) => {
                let embedding = self.embedder.embed(text).await?;
                let expected = self.artifact.dim();
                if embedding.len() != expected {
                    return Err(EmbedError::DimensionMismatch {
                        expected,
                        actual: embedding.len(),
                    }
                    .into());
                }
                embedding
            }
            (None, Some(embedding)) => embedding.clone(),
            (None, None) if request.document_text.is_some() => {
                return Err(HandlerError::InvalidRequest(
                    "'document_text' must not be empty".into(),
                ));
            }
            (None, None) => return Err(HandlerError::InvalidRequest(MISSING_TEXT.into())),
        };

        let label = self.artifact.predict_label(&embedding)?;
        info!(label, dim = embedding.len(), "classified document");
        Ok(ClassifyResponse::new(label))
    }
}

/// Function-style entry point: handle `event` against the process-wide
/// artifact in `artifact_dir`, loading it on first use.
pub async fn handle_event(
    artifact_dir: &Path,
    embedder: Arc<dyn EmbeddingProvider>,
    event: &GatewayEvent,
) -> GatewayResponse {
    match Handler::from_artifact_dir(artifact_dir, embedder).await {
        Ok(handler) => handler.handle(event).await,
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use doclass_ai::gbdt::{self, BoostingParams};
    use doclass_ai::{HashEmbedder, ModelMetadata};
    use doclass_core::LabelMapping;
    use tempfile::TempDir;

    const SPORT: &[&str] = &[
        "the striker scored a late goal in the cup final",
        "the keeper saved a penalty and the team won the match",
        "the coach praised the players after the league win",
        "fans cheered as the club lifted the trophy",
    ];
    const BUSINESS: &[&str] = &[
        "shares rose after the company reported record profit",
        "the bank raised interest rates to curb inflation",
        "quarterly earnings beat market forecasts",
        "investors sold stocks as the market fell",
    ];

    fn embedder() -> Arc<HashEmbedder> {
        Arc::new(HashEmbedder::new(64))
    }

    fn artifact() -> Arc<ModelArtifact> {
        let e = embedder();
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for (class, texts) in [BUSINESS, SPORT].into_iter().enumerate() {
            for t in texts {
                rows.push(e.embed_text(t).unwrap());
                labels.push(class);
            }
        }
        let params = BoostingParams {
            num_round: 10,
            num_leaves: 4,
            min_child_samples: 1,
            learning_rate: 0.3,
            ..Default::default()
        };
        let model = gbdt::train(&rows, &labels, 2, &params).unwrap();
        let mapping = LabelMapping::from_labels(["business", "sport"]);
        Arc::new(ModelArtifact::new(model, mapping, ModelMetadata::now()).unwrap())
    }

    fn handler() -> Handler {
        Handler::new(artifact(), embedder())
    }

    fn event(body: &str) -> GatewayEvent {
        GatewayEvent {
            body: Some(body.to_string()),
        }
    }

    struct Unavailable;

    #[async_trait]
    impl EmbeddingProvider for Unavailable {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbedError> {
            Err(EmbedError::Provider {
                status: 503,
                body: "service unavailable".into(),
            })
        }

        fn model_name(&self) -> &str {
            "unavailable"
        }
    }

    /// Returns a vector of the wrong length for every model.
    struct Misconfigured;

    #[async_trait]
    impl EmbeddingProvider for Misconfigured {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbedError> {
            Ok(vec![0.5; 7])
        }

        fn model_name(&self) -> &str {
            "misconfigured"
        }
    }

    #[tokio::test]
    async fn valid_text_returns_label() {
        let h = handler();
        let resp = h
            .handle(&GatewayEvent::from_request(&ClassifyRequest::text(
                "the striker scored in the final",
            )))
            .await;

        assert_eq!(resp.status_code, 200);
        let body = resp.classification().expect("success body");
        assert_eq!(body.message, "Classification successful");
        assert!(h.artifact().labels().contains(&body.label));
    }

    #[tokio::test]
    async fn repeated_calls_agree() {
        let h = handler();
        let ev = event(r#"{"document_text": "profit and shares in the market"}"#);
        let first = h.handle(&ev).await;
        for _ in 0..5 {
            assert_eq!(h.handle(&ev).await, first);
        }
    }

    #[tokio::test]
    async fn text_and_embedding_give_same_label() {
        let h = handler();
        let text = "investors watched the bank profit";
        let vector = embedder().embed_text(text).unwrap();

        let by_text = h.classify(&ClassifyRequest::text(text)).await.unwrap();
        let by_vec = h.classify(&ClassifyRequest::embedding(vector)).await.unwrap();
        assert_eq!(by_text, by_vec);
    }

    #[tokio::test]
    async fn missing_text_is_client_error() {
        let resp = handler().handle(&event("{}")).await;
        assert_eq!(resp.status_code, 400);
        assert_eq!(resp.error_body().unwrap().error, MISSING_TEXT);
    }

    #[tokio::test]
    async fn blank_text_is_client_error() {
        let resp = handler().handle(&event(r#"{"document_text": "   "}"#)).await;
        assert_eq!(resp.status_code, 400);
    }

    #[tokio::test]
    async fn bad_bodies_are_client_errors() {
        let h = handler();
        for ev in [
            GatewayEvent { body: None },
            event("not json"),
            event(r#"{"document_text": 42}"#),
        ] {
            let resp = h.handle(&ev).await;
            assert_eq!(resp.status_code, 400, "body {:?}", ev.body);
            assert!(resp.error_body().is_ok());
        }

        assert_eq!(h.handle_json("{{{").await.status_code, 400);
    }

    #[tokio::test]
    async fn wrong_embedding_length_is_client_error() {
        let resp = handler()
            .handle(&GatewayEvent::from_request(&ClassifyRequest::embedding(vec![0.1; 3])))
            .await;
        assert_eq!(resp.status_code, 400);
    }

    #[tokio::test]
    async fn provider_failure_is_server_error() {
        let h = Handler::new(artifact(), Arc::new(Unavailable));
        let resp = h.handle(&event(r#"{"document_text": "anything"}"#)).await;
        assert_eq!(resp.status_code, 500);
        assert!(resp.error_body().unwrap().error.contains("503"));
    }

    #[tokio::test]
    async fn provider_vector_of_wrong_length_is_server_error() {
        let h = Handler::new(artifact(), Arc::new(Misconfigured));
        let err = h.classify(&ClassifyRequest::text("hi")).await.unwrap_err();
        assert!(matches!(
            err,
            HandlerError::Embedding(EmbedError::DimensionMismatch {
                expected: 64,
                actual: 7
            })
        ));

        let resp = h.handle(&event(r#"{"document_text": "hi"}"#)).await;
        assert_eq!(resp.status_code, 500);
    }

    #[tokio::test]
    async fn saved_event_document() {
        let raw = r#"{"body": "{\"document_text\": \"the club won the league\"}", "httpMethod": "POST"}"#;
        let resp = handler().handle_json(raw).await;
        assert_eq!(resp.status_code, 200);
    }

    #[tokio::test]
    async fn cache_loads_once() {
        let tmp = TempDir::new().unwrap();
        artifact().save(tmp.path()).unwrap();

        let cache = ArtifactCache::new(tmp.path());
        assert!(!cache.is_loaded());
        let a = cache.get().await.unwrap();
        let b = cache.get().await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(cache.is_loaded());
    }

    #[tokio::test]
    async fn cache_retries_after_failure() {
        let tmp = TempDir::new().unwrap();
        let cache = ArtifactCache::new(tmp.path());
        assert!(matches!(cache.get().await, Err(ArtifactError::Missing(_))));
        assert!(!cache.is_loaded());

        artifact().save(tmp.path()).unwrap();
        assert!(cache.get().await.is_ok());
    }

    #[tokio::test]
    async fn process_wide_entry_point() {
        // The only test touching the process-wide cell.
        let empty = TempDir::new().unwrap();
        let ev = event(r#"{"document_text": "goal"}"#);
        let resp = handle_event(empty.path(), embedder(), &ev).await;
        assert_eq!(resp.status_code, 500);

        let tmp = TempDir::new().unwrap();
        artifact().save(tmp.path()).unwrap();
        let resp = handle_event(tmp.path(), embedder(), &ev).await;
        assert_eq!(resp.status_code, 200);

        let a = shared_artifact(tmp.path()).await.unwrap();
        let b = shared_artifact(empty.path()).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b), "first successful load wins");
    }
}
