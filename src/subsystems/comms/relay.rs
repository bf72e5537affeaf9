//! `/chat` wire types and the client that forwards messages to an external
//! chat API speaking them.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::AppError;

const RELAY_TIMEOUT: Duration = Duration::from_secs(30);

/// `POST /chat` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub user_id: i64,
}

/// `POST /chat` response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChatResponse {
    pub fn success(answer: impl Into<String>) -> Self {
        Self { answer: answer.into(), status: "success".into(), error: None }
    }

    pub fn failure(answer: impl Into<String>, error: impl Into<String>) -> Self {
        Self { answer: answer.into(), status: "error".into(), error: Some(error.into()) }
    }
}

/// Client for a remote instance of the `/chat` API.
#[derive(Debug, Clone)]
pub struct RelayClient {
    client: Client,
    chat_url: String,
}

impl RelayClient {
    pub fn new(base_url: &str) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(RELAY_TIMEOUT)
            .build()
            .map_err(|e| AppError::Comms(format!("failed to build relay client: {e}")))?;
        let chat_url = format!("{}/chat", base_url.trim_end_matches('/'));
        Ok(Self { client, chat_url })
    }

    pub fn chat_url(&self) -> &str {
        &self.chat_url
    }

    /// Forward one message and return the remote answer.
    pub async fn send(&self, message: &str, user_id: i64) -> Result<String, AppError> {
        let body = ChatRequest { message: message.to_string(), user_id };
        debug!(url = %self.chat_url, user_id, "relaying message");

        let response = self
            .client
            .post(&self.chat_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(url = %self.chat_url, error = %e, "relay request failed");
                AppError::Comms(format!("relay request failed: {e}"))
            })?;

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::Comms(format!("malformed relay response: {e}")))?;

        Ok(parsed.answer)
    }
}
