//! Axum handlers for the HTTP channel.

use std::time::Duration;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use serde_json::json;
use tracing::warn;

use super::AxumState;
use crate::subsystems::agents::APOLOGY;
use crate::subsystems::comms::relay::{ChatRequest, ChatResponse};

/// Upper bound on one `/chat` round-trip; the remote model alone may take 30 s.
const CHAT_TIMEOUT: Duration = Duration::from_secs(60);

const ROOT_INDEX_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <title>Chat Agent API</title>
</head>
<body>
  <h1>🤖 Chat Agent API</h1>
  <p>HTTP interface to the chat agent.</p>

  <h2>Endpoints</h2>
  <ul>
    <li><strong>POST /chat</strong> — send a message to the agent</li>
    <li><strong>GET /health</strong> — service health</li>
  </ul>

  <h2>Request to /chat</h2>
  <pre>
{
    "message": "Привет!",
    "user_id": 12345
}
  </pre>

  <h2>Response</h2>
  <pre>
{
    "answer": "Интересный вопрос! Можете уточнить, что именно вас интересует?",
    "status": "success"
}
  </pre>
</body>
</html>
"#;

/// Build a JSON error response body.
fn json_error(code: &str, msg: impl std::fmt::Display) -> Json<serde_json::Value> {
    Json(json!({ "error": code, "message": format!("{msg}") }))
}

/// GET /
pub(super) async fn root() -> Html<&'static str> {
    Html(ROOT_INDEX_HTML)
}

/// GET /health
pub(super) async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "service": "chat-agent-api" }))
}

/// POST /chat
pub(super) async fn chat(
    State(state): State<AxumState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match body {
        Ok(req) => req,
        Err(rejection) => {
            warn!(channel_id = %state.channel_id, "rejected /chat body: {rejection}");
            return (StatusCode::BAD_REQUEST, json_error("bad_request", rejection.body_text()))
                .into_response();
        }
    };

    match tokio::time::timeout(
        CHAT_TIMEOUT,
        state.comms.send_message(&state.channel_id, req.user_id, &req.message),
    )
    .await
    {
        Ok(Ok(answer)) => (StatusCode::OK, Json(ChatResponse::success(answer))).into_response(),
        Ok(Err(e)) => {
            warn!(channel_id = %state.channel_id, user_id = req.user_id, "message send failed: {e}");
            (StatusCode::OK, Json(ChatResponse::failure(APOLOGY, e.to_string()))).into_response()
        }
        Err(_) => (
            StatusCode::GATEWAY_TIMEOUT,
            json_error("timeout", "chat request timed out"),
        )
            .into_response(),
    }
}
