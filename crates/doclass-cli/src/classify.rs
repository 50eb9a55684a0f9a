//! Local handler runs and remote gateway invocation.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use doclass_ai::EmbeddingProvider;
use doclass_client::GatewayClient;
use doclass_core::{ClassifyRequest, ClassifyResponse, GatewayEvent, GatewayResponse};

/// Document text from `--text` or `--file`.
pub fn read_document(text: Option<&str>, file: Option<&Path>) -> anyhow::Result<String> {
    match (text, file) {
        (Some(text), _) => Ok(text.to_string()),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("reading document {}", path.display())),
        (None, None) => anyhow::bail!("provide --text, --file or --event"),
    }
}

/// Wrap `document` in a gateway event and run it through the handler.
pub async fn classify_local(
    artifact_dir: &Path,
    provider: Arc<dyn EmbeddingProvider>,
    document: &str,
) -> anyhow::Result<GatewayResponse> {
    let event = GatewayEvent::from_request(&ClassifyRequest::text(document));
    Ok(doclass_handler::handle_event(artifact_dir, provider, &event).await)
}

/// Run a saved gateway event file through the handler.
pub async fn replay_event(
    artifact_dir: &Path,
    provider: Arc<dyn EmbeddingProvider>,
    event_path: &Path,
) -> anyhow::Result<GatewayResponse> {
    let raw = std::fs::read_to_string(event_path)
        .with_context(|| format!("reading event {}", event_path.display()))?;
    let handler = doclass_handler::Handler::from_artifact_dir(artifact_dir, provider).await;
    Ok(match handler {
        Ok(handler) => handler.handle_json(&raw).await,
        Err(e) => GatewayResponse::error(e.status_code(), e.to_string()),
    })
}

/// POST `document` to a deployed endpoint.
pub async fn invoke(
    url: &str,
    api_key: Option<&str>,
    document: &str,
) -> anyhow::Result<ClassifyResponse> {
    let mut client = GatewayClient::new(url);
    if let Some(key) = api_key {
        client = client.with_api_key(key);
    }
    client
        .classify(document)
        .await
        .with_context(|| format!("invoking {url}"))
}
