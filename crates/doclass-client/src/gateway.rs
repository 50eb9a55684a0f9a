//! HTTP client for a deployed classification endpoint behind an API gateway.

use doclass_core::{ClassifyRequest, ClassifyResponse, ErrorBody, GatewayResponse};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("gateway returned {status}: {message}")]
    Server { status: u16, message: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Posts documents to a gateway URL and decodes the classification.
pub struct GatewayClient {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl GatewayClient {
    /// `url` is the full invoke URL of the classification route.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into().trim_end_matches('/').to_string(),
            api_key: None,
        }
    }

    /// Send `key` as the `x-api-key` header.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Classify one document.
    pub async fn classify(&self, document_text: &str) -> Result<ClassifyResponse, GatewayError> {
        self.send(&ClassifyRequest::text(document_text)).await
    }

    pub async fn send(&self, request: &ClassifyRequest) -> Result<ClassifyResponse, GatewayError> {
        info!(url = %self.url, "invoking classification endpoint");
        let mut req = self.client.post(&self.url).json(request);
        if let Some(key) = &self.api_key {
            req = req.header("x-api-key", key);
        }

        let resp = req.send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        let result = decode_response(status, &body)?;
        info!(label = %result.label, "classification received");
        Ok(result)
    }
}

/// Decode a gateway reply.
///
/// Proxy integrations return the function's body directly with its status;
/// others return the whole `{"statusCode", "body"}` envelope with a 200.
pub fn decode_response(status: u16, body: &str) -> Result<ClassifyResponse, GatewayError> {
    if !(200..300).contains(&status) {
        return Err(server_error(status, body));
    }

    let value: serde_json::Value = serde_json::from_str(body)?;
    if value.get("statusCode").is_some() {
        let envelope: GatewayResponse = serde_json::from_value(value)?;
        if !envelope.is_success() {
            return Err(server_error(envelope.status_code, &envelope.body));
        }
        return Ok(envelope.classification()?);
    }
    Ok(serde_json::from_value(value)?)
}

fn server_error(status: u16, body: &str) -> GatewayError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|e| e.error)
        .unwrap_or_else(|_| body.to_string());
    GatewayError::Server { status, message }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proxied_body() {
        let r = decode_response(
            200,
            r#"{"message": "Classification successful", "label": "tech"}"#,
        )
        .unwrap();
        assert_eq!(r.label, "tech");
        assert_eq!(r.message, "Classification successful");
    }

    #[test]
    fn envelope_body() {
        let inner = GatewayResponse::ok(&ClassifyResponse::new("sport"));
        let raw = serde_json::to_string(&inner).unwrap();
        let r = decode_response(200, &raw).unwrap();
        assert_eq!(r.label, "sport");
    }

    #[test]
    fn envelope_with_error_status() {
        let inner = GatewayResponse::error(400, "Missing 'document_text' in request body");
        let raw = serde_json::to_string(&inner).unwrap();
        match decode_response(200, &raw).unwrap_err() {
            GatewayError::Server { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Missing 'document_text' in request body");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn http_error_with_error_body() {
        let err = decode_response(500, r#"{"error": "embedding failed"}"#).unwrap_err();
        assert!(matches!(
            err,
            GatewayError::Server { status: 500, ref message } if message == "embedding failed"
        ));
    }

    #[test]
    fn http_error_with_plain_body() {
        let err = decode_response(403, r#"{"message":"Forbidden"}"#).unwrap_err();
        assert!(matches!(err, GatewayError::Server { status: 403, .. }));
        assert!(err.to_string().contains("Forbidden"));
    }

    #[test]
    fn garbage_body() {
        assert!(matches!(
            decode_response(200, "<html>").unwrap_err(),
            GatewayError::Json(_)
        ));
    }

    #[test]
    fn client_trims_trailing_slash() {
        let client = GatewayClient::new("https://abc.execute-api.eu-west-1.amazonaws.com/prod/classify/")
            .with_api_key("secret");
        assert_eq!(
            client.url(),
            "https://abc.execute-api.eu-west-1.amazonaws.com/prod/classify"
        );
        assert_eq!(client.api_key.as_deref(), Some("secret"));
    }
}
