//! Drives the HTTP channel router in-process with `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use axum::Router;
use serde_json::{Value, json};
use tower::ServiceExt;

use chat_agent::subsystems::agents::tools::{GENERAL_REPLIES, WEATHER_REPLY};
use chat_agent::subsystems::agents::{APOLOGY, Agent};
use chat_agent::subsystems::comms::axum_channel::build_router;
use chat_agent::subsystems::comms::relay::RelayClient;
use chat_agent::subsystems::comms::{Backend, CommsState};
use chat_agent::subsystems::memory::{ConversationStore, InMemoryConversationStore};

fn local_router() -> (Router, Arc<InMemoryConversationStore>) {
    let store = Arc::new(InMemoryConversationStore::default());
    let agent = Arc::new(Agent::new(store.clone(), None));
    (build_router("http-test", Arc::new(CommsState::local(agent))), store)
}

fn post_chat(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.into())
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let (router, _) = local_router();
    let response = router
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({ "status": "ok", "service": "chat-agent-api" }));
}

#[tokio::test]
async fn root_serves_html() {
    let (router, _) = local_router();
    let response = router
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/html"));
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(String::from_utf8_lossy(&bytes).contains("POST /chat"));
}

#[tokio::test]
async fn chat_answers_weather_and_records_history() {
    let (router, store) = local_router();
    let response = router
        .oneshot(post_chat(r#"{"message":"какая погода?","user_id":12345}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({ "answer": WEATHER_REPLY, "status": "success" }));

    let history = store.history(12345).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].response, WEATHER_REPLY);
}

#[tokio::test]
async fn chat_general_message_uses_canned_reply() {
    let (router, _) = local_router();
    let response = router
        .oneshot(post_chat(r#"{"message":"2+2","user_id":1}"#))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["answer"], GENERAL_REPLIES[3]);
}

#[tokio::test]
async fn malformed_body_is_bad_request() {
    let (router, _) = local_router();
    let response = router.oneshot(post_chat("{not json")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "bad_request");
}

#[tokio::test]
async fn missing_user_id_is_rejected() {
    let (router, _) = local_router();
    let response = router.oneshot(post_chat(r#"{"message":"hi"}"#)).await.unwrap();
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn get_chat_is_method_not_allowed() {
    let (router, _) = local_router();
    let response = router
        .oneshot(Request::get("/chat").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn unreachable_relay_reports_error_status() {
    let relay = RelayClient::new("http://127.0.0.1:1").unwrap();
    let router = build_router("http-test", Arc::new(CommsState::new(Backend::Relay(relay))));
    let response = router
        .oneshot(post_chat(r#"{"message":"hello","user_id":7}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "error");
    assert_eq!(body["answer"], APOLOGY);
    assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()));
}
