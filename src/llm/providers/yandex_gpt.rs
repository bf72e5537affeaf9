//! Yandex GPT completion provider (`foundationModels/v1/completion`).
//!
//! One user message in, the first alternative's text out. All Yandex wire
//! types are private to this module — callers never see them. The provider
//! is stateless: conversation history is never sent upstream.

use std::time::Duration;

use reqwest::Client;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace, warn};

use crate::llm::ProviderError;

/// Sampling temperature sent with every request.
pub const TEMPERATURE: f64 = 0.6;
/// Upper bound on generated tokens.
pub const MAX_TOKENS: u32 = 2000;
/// Whole-request timeout; expiry surfaces as [`ProviderError::Transport`].
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const PROBE_MESSAGE: &str = "Привет";

// ── Public provider ───────────────────────────────────────────────────────────

/// Adapter for the Yandex Foundation Models completion endpoint.
///
/// Constructed once at startup, then cheaply cloned because
/// `reqwest::Client` is an `Arc` internally.
#[derive(Debug, Clone)]
pub struct YandexGptProvider {
    client: Client,
    api_base_url: String,
    api_key: String,
    folder_id: String,
    model: String,
}

impl YandexGptProvider {
    /// Build a provider. `api_key` is sent as `Authorization: Api-Key <key>`.
    pub fn new(
        api_base_url: String,
        api_key: String,
        folder_id: String,
        model: String,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, api_base_url, api_key, folder_id, model })
    }

    /// `gpt://<folder>/<model>`
    pub fn model_uri(&self) -> String {
        format!("gpt://{}/{}", self.folder_id, self.model)
    }

    fn build_request<'a>(&self, message: &'a str) -> CompletionRequest<'a> {
        CompletionRequest {
            model_uri: self.model_uri(),
            completion_options: CompletionOptions {
                stream: false,
                temperature: TEMPERATURE,
                max_tokens: MAX_TOKENS,
            },
            messages: vec![RequestMessage { role: "user", text: message }],
        }
    }

    /// Send `message` as a single user turn and return the generated text
    /// verbatim.
    pub async fn generate(&self, message: &str, user_id: i64) -> Result<String, ProviderError> {
        let payload = self.build_request(message);

        debug!(
            user_id,
            model_uri = %payload.model_uri,
            content_len = message.len(),
            "sending completion request"
        );
        if tracing::enabled!(tracing::Level::TRACE) {
            let json = serde_json::to_string_pretty(&payload)
                .unwrap_or_else(|e| format!("<serialization failed: {e}>"));
            trace!(payload = %json, "full completion request payload");
        }

        let response = self
            .client
            .post(&self.api_base_url)
            .header(AUTHORIZATION, format!("Api-Key {}", self.api_key))
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                error!(
                    url = %self.api_base_url,
                    error = %e,
                    is_timeout = e.is_timeout(),
                    "completion request failed (transport)"
                );
                ProviderError::Transport(e.to_string())
            })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Transport(format!("failed to read response body: {e}")))?;

        trace!(status, body = %body, "completion response");
        parse_completion(status, &body)
    }

    /// Send a fixed greeting and report whether a usable reply came back.
    pub async fn is_available(&self) -> bool {
        match self.generate(PROBE_MESSAGE, 0).await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "yandex gpt probe failed");
                false
            }
        }
    }
}

/// Map an HTTP status and raw body to the first alternative's text.
fn parse_completion(status: u16, body: &str) -> Result<String, ProviderError> {
    if !(200..300).contains(&status) {
        error!(status, "completion request returned HTTP error");
        return Err(ProviderError::Upstream { status, body: body.to_string() });
    }

    let parsed: CompletionResponse = serde_json::from_str(body).map_err(|e| {
        error!(error = %e, "failed to deserialize completion response");
        ProviderError::Decode(e.to_string())
    })?;

    debug!(
        alternatives = parsed.result.alternatives.len(),
        model_version = %parsed.result.model_version,
        total_tokens = %parsed.result.usage.total_tokens,
        "received completion response"
    );

    let first = parsed
        .result
        .alternatives
        .into_iter()
        .next()
        .ok_or(ProviderError::EmptyResponse)?;

    if first.message.text.is_empty() {
        return Err(ProviderError::EmptyResponse);
    }
    Ok(first.message.text)
}

// ── Private wire types ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompletionRequest<'a> {
    model_uri: String,
    completion_options: CompletionOptions,
    messages: Vec<RequestMessage<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompletionOptions {
    stream: bool,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct RequestMessage<'a> {
    role: &'static str,
    text: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    result: CompletionResult,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompletionResult {
    #[serde(default)]
    alternatives: Vec<Alternative>,
    #[serde(default)]
    usage: Usage,
    #[serde(default)]
    model_version: String,
}

#[derive(Debug, Deserialize)]
struct Alternative {
    message: AlternativeMessage,
    #[serde(default)]
    #[allow(dead_code)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct AlternativeMessage {
    #[serde(default)]
    #[allow(dead_code)]
    role: String,
    #[serde(default)]
    text: String,
}

// Token counts arrive as decimal strings.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Usage {
    #[serde(default)]
    #[allow(dead_code)]
    input_text_tokens: String,
    #[serde(default)]
    #[allow(dead_code)]
    completion_tokens: String,
    #[serde(default)]
    total_tokens: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO_BODY: &str = r#"{
        "result": {
            "alternatives": [
                {"message": {"role": "assistant", "text": "hello"}, "status": "ALTERNATIVE_STATUS_FINAL"}
            ],
            "usage": {"inputTextTokens": "9", "completionTokens": "1", "totalTokens": "10"},
            "modelVersion": "23.10.2024"
        }
    }"#;

    fn provider() -> YandexGptProvider {
        YandexGptProvider::new(
            "http://127.0.0.1:1/completion".into(),
            "secret".into(),
            "b1gfolder".into(),
            "yandexgpt-lite".into(),
        )
        .unwrap()
    }

    #[test]
    fn request_body_matches_wire_contract() {
        let p = provider();
        let json = serde_json::to_value(p.build_request("какая погода?")).unwrap();
        assert_eq!(json["modelUri"], "gpt://b1gfolder/yandexgpt-lite");
        assert_eq!(json["completionOptions"]["stream"], false);
        assert_eq!(json["completionOptions"]["temperature"], 0.6);
        assert_eq!(json["completionOptions"]["maxTokens"], 2000);
        assert_eq!(json["messages"].as_array().unwrap().len(), 1);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["text"], "какая погода?");
    }

    #[test]
    fn success_returns_first_alternative_verbatim() {
        assert_eq!(parse_completion(200, HELLO_BODY).unwrap(), "hello");
    }

    #[test]
    fn text_is_not_trimmed() {
        let body = r#"{"result":{"alternatives":[{"message":{"role":"assistant","text":"  hi\n"}}]}}"#;
        assert_eq!(parse_completion(200, body).unwrap(), "  hi\n");
    }

    #[test]
    fn zero_alternatives_is_empty_response() {
        let body = r#"{"result":{"alternatives":[],"usage":{},"modelVersion":"x"}}"#;
        assert!(matches!(parse_completion(200, body), Err(ProviderError::EmptyResponse)));
    }

    #[test]
    fn missing_result_is_empty_response() {
        assert!(matches!(parse_completion(200, "{}"), Err(ProviderError::EmptyResponse)));
    }

    #[test]
    fn empty_text_is_empty_response() {
        let body = r#"{"result":{"alternatives":[{"message":{"role":"assistant","text":""}}]}}"#;
        assert!(matches!(parse_completion(200, body), Err(ProviderError::EmptyResponse)));
    }

    #[test]
    fn non_success_status_is_upstream_error() {
        match parse_completion(500, "internal failure") {
            Err(ProviderError::Upstream { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "internal failure");
            }
            other => panic!("expected upstream error, got {other:?}"),
        }
    }

    #[test]
    fn malformed_body_is_decode_error() {
        assert!(matches!(parse_completion(200, "<html>"), Err(ProviderError::Decode(_))));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_transport_error() {
        let p = provider();
        assert!(matches!(p.generate("hi", 1).await, Err(ProviderError::Transport(_))));
        assert!(!p.is_available().await);
    }
}
