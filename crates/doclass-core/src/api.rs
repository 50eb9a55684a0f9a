//! Request/response shapes exchanged with the HTTP gateway.
//!
//! The gateway hands the function an event whose `body` is a JSON string and
//! expects `{"statusCode": ..., "body": "<json string>"}` back.

use serde::{Deserialize, Serialize};

/// Message returned alongside a successful prediction.
pub const SUCCESS_MESSAGE: &str = "Classification successful";

/// Classification request carried in the event body.
///
/// `document_text` is the canonical field. A pre-computed `embedding` may be
/// sent instead when the caller already holds the vector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassifyRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl ClassifyRequest {
    pub fn text(document_text: impl Into<String>) -> Self {
        Self {
            document_text: Some(document_text.into()),
            embedding: None,
        }
    }

    pub fn embedding(embedding: Vec<f32>) -> Self {
        Self {
            document_text: None,
            embedding: Some(embedding),
        }
    }
}

/// Successful classification body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifyResponse {
    pub message: String,
    pub label: String,
}

impl ClassifyResponse {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            message: SUCCESS_MESSAGE.to_string(),
            label: label.into(),
        }
    }
}

/// Error body returned with any non-200 status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Incoming gateway event. Only the body is read.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayEvent {
    #[serde(default)]
    pub body: Option<String>,
}

impl GatewayEvent {
    /// Wrap a request as a gateway event with a JSON-string body.
    pub fn from_request(request: &ClassifyRequest) -> Self {
        Self {
            body: Some(serde_json::json!(request).to_string()),
        }
    }
}

/// Response handed back to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    /// JSON-encoded [`ClassifyResponse`] or [`ErrorBody`].
    pub body: String,
}

impl GatewayResponse {
    pub fn ok(response: &ClassifyResponse) -> Self {
        Self {
            status_code: 200,
            body: serde_json::json!(response).to_string(),
        }
    }

    pub fn error(status_code: u16, message: impl Into<String>) -> Self {
        let body = ErrorBody {
            error: message.into(),
        };
        Self {
            status_code,
            body: serde_json::json!(body).to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }

    /// Decode the body as a successful classification.
    pub fn classification(&self) -> Result<ClassifyResponse, serde_json::Error> {
        serde_json::from_str(&self.body)
    }

    /// Decode the body as an error message.
    pub fn error_body(&self) -> Result<ErrorBody, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_omits_absent_fields() {
        let json = serde_json::to_string(&ClassifyRequest::text("Lufthansa flies back to profit"))
            .unwrap();
        assert_eq!(json, r#"{"document_text":"Lufthansa flies back to profit"}"#);
    }

    #[test]
    fn request_without_text_parses() {
        let req: ClassifyRequest = serde_json::from_str(r#"{"document": "wrong field"}"#).unwrap();
        assert!(req.document_text.is_none());
        assert!(req.embedding.is_none());
    }

    #[test]
    fn ok_response_wire_shape() {
        let resp = GatewayResponse::ok(&ClassifyResponse::new("business"));
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["statusCode"], 200);

        let body: serde_json::Value = serde_json::from_str(json["body"].as_str().unwrap()).unwrap();
        assert_eq!(body["label"], "business");
        assert_eq!(body["message"], SUCCESS_MESSAGE);
    }

    #[test]
    fn error_response_wire_shape() {
        let resp = GatewayResponse::error(400, "Missing 'document_text' in request body");
        assert!(!resp.is_success());
        assert_eq!(
            resp.error_body().unwrap().error,
            "Missing 'document_text' in request body"
        );
    }

    #[test]
    fn event_wraps_request_as_string_body() {
        let event = GatewayEvent::from_request(&ClassifyRequest::text("hello"));
        let inner: ClassifyRequest = serde_json::from_str(event.body.as_deref().unwrap()).unwrap();
        assert_eq!(inner.document_text.as_deref(), Some("hello"));
    }

    #[test]
    fn event_without_body() {
        let event: GatewayEvent = serde_json::from_str("{}").unwrap();
        assert!(event.body.is_none());
    }
}
