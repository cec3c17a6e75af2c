//! GeminiClient - direct REST client for the `generateContent` endpoint.
//!
//! Maps every provider outcome onto [`ChatError`]: transport failures,
//! non-200 statuses, provider `error` objects, and 200 responses without a
//! usable text part are all distinct kinds. Nothing is retried.

use asa_core::config::{DEFAULT_ENDPOINT, DEFAULT_MODEL, Settings};
use asa_core::conversation::WireTurn;
use asa_core::error::ChatError;
use asa_core::provider::{GenerationRequest, GenerativeBackend};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

/// Client for a Gemini-compatible `generateContent` API.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    endpoint: String,
    model: String,
}

impl GeminiClient {
    /// Creates a client for the public endpoint and default model.
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Creates a client using the endpoint and model from settings.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new()
            .with_endpoint(&settings.endpoint)
            .with_model(&settings.model)
    }

    /// Overrides the base URL (everything before `/{model}:generateContent`).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_http_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    fn url(&self) -> String {
        format!("{}/{}:generateContent", self.endpoint, self.model)
    }

    async fn send_request(
        &self,
        api_key: &str,
        body: &GenerateContentRequest,
        request: &GenerationRequest,
    ) -> Result<String, ChatError> {
        let response = self
            .client
            .post(self.url())
            .query(&[("key", api_key)])
            .timeout(request.timeout)
            .json(body)
            .send()
            .await
            .map_err(|err| {
                let err = err.without_url();
                tracing::warn!(timeout = err.is_timeout(), "[Gemini] Request error: {}", err);
                ChatError::transport(err.to_string())
            })?;

        let status = response.status();
        let body_text = response.text().await.map_err(|err| {
            let err = err.without_url();
            tracing::warn!("[Gemini] Failed to read response body: {}", err);
            ChatError::transport(err.to_string())
        })?;

        if status != StatusCode::OK {
            let detail = parse_error_message(&body_text).unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "[Gemini] HTTP status {}: {}", status, detail);
            return Err(ChatError::HttpError {
                status: status.as_u16(),
            });
        }

        extract_text_response(&body_text)
    }
}

impl Default for GeminiClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerativeBackend for GeminiClient {
    async fn generate(&self, api_key: &str, request: &GenerationRequest) -> Result<String, ChatError> {
        let body = GenerateContentRequest::from_request(request);
        self.send_request(api_key, &body, request).await
    }
}

#[derive(Serialize, Debug)]
pub(crate) struct GenerateContentRequest {
    contents: Vec<WireTurn>,
    system_instruction: SystemInstruction,
}

impl GenerateContentRequest {
    fn from_request(request: &GenerationRequest) -> Self {
        Self {
            contents: request.contents.iter().cloned().map(WireTurn::from).collect(),
            system_instruction: SystemInstruction {
                parts: vec![TextPart {
                    text: request.system_instruction.clone(),
                }],
            },
        }
    }
}

#[derive(Serialize, Debug)]
struct SystemInstruction {
    parts: Vec<TextPart>,
}

#[derive(Serialize, Debug)]
struct TextPart {
    text: String,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<ContentResponse>,
}

#[derive(Deserialize)]
struct ContentResponse {
    #[serde(default)]
    parts: Vec<PartResponse>,
}

#[derive(Deserialize)]
struct PartResponse {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

impl ErrorBody {
    fn describe(self) -> String {
        self.message
            .or(self.status)
            .unwrap_or_else(|| "unknown provider error".to_string())
    }
}

/// Pulls `candidates[0].content.parts[0].text` out of a 200 body.
fn extract_text_response(body: &str) -> Result<String, ChatError> {
    let parsed: GenerateContentResponse = serde_json::from_str(body).map_err(|err| {
        tracing::warn!("[Gemini] Failed to parse response: {}", err);
        ChatError::EmptyResponse
    })?;

    if let Some(error) = parsed.error {
        let message = error.describe();
        tracing::warn!("[Gemini] API error: {}", message);
        return Err(ChatError::provider(message));
    }

    parsed
        .candidates
        .and_then(|candidates| candidates.into_iter().next())
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts.into_iter().next())
        .and_then(|part| part.text)
        .filter(|text| !text.is_empty())
        .ok_or_else(|| {
            tracing::warn!("[Gemini] Empty response");
            ChatError::EmptyResponse
        })
}

fn parse_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorWrapper>(body)
        .ok()
        .map(|wrapper| wrapper.error.describe())
}

#[cfg(test)]
mod tests {
    use super::*;
    use asa_core::conversation::ConversationTurn;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn test_request_body_shape() {
        let request = GenerationRequest {
            contents: vec![
                ConversationTurn::user("Hi"),
                ConversationTurn::model("Hello!"),
                ConversationTurn::user("Do you ship internationally?"),
            ],
            system_instruction: "Be helpful".to_string(),
            timeout: Duration::from_secs(20),
        };

        let body = serde_json::to_value(GenerateContentRequest::from_request(&request)).unwrap();
        assert_eq!(
            body,
            json!({
                "contents": [
                    {"role": "user", "parts": [{"text": "Hi"}]},
                    {"role": "model", "parts": [{"text": "Hello!"}]},
                    {"role": "user", "parts": [{"text": "Do you ship internationally?"}]}
                ],
                "system_instruction": {"parts": [{"text": "Be helpful"}]}
            })
        );
    }

    #[test]
    fn test_extract_first_candidate_text() {
        let body = json!({
            "candidates": [
                {"content": {"parts": [{"text": "first"}, {"text": "ignored"}]}},
                {"content": {"parts": [{"text": "second"}]}}
            ]
        })
        .to_string();
        assert_eq!(extract_text_response(&body), Ok("first".to_string()));
    }

    #[test]
    fn test_extract_error_object() {
        let body = json!({"error": {"code": 400, "message": "API key not valid"}}).to_string();
        assert_eq!(
            extract_text_response(&body),
            Err(ChatError::provider("API key not valid"))
        );
    }

    #[test]
    fn test_extract_missing_text() {
        for body in [
            json!({}).to_string(),
            json!({"candidates": []}).to_string(),
            json!({"candidates": [{"finishReason": "SAFETY"}]}).to_string(),
            json!({"candidates": [{"content": {"parts": [{"text": ""}]}}]}).to_string(),
            "not json at all".to_string(),
        ] {
            assert_eq!(extract_text_response(&body), Err(ChatError::EmptyResponse));
        }
    }

    #[test]
    fn test_url_includes_model() {
        let client = GeminiClient::new()
            .with_endpoint("http://localhost:9000/v1beta/models/")
            .with_model("gemini-test");
        assert_eq!(
            client.url(),
            "http://localhost:9000/v1beta/models/gemini-test:generateContent"
        );
    }
}
