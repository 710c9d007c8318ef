//! HTTP contract tests against the router.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use bytes::Bytes;
use http_body_util::BodyExt;
use mira_core::{CompletionRequest, CompletionResult, StreamChunk};
use mira_server::{
    AppState, CANNED_REPLY, ContentSynthesizer, EVAL_REPORT, Responder, ServiceConfig, Synthesis,
    create_router,
};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tower::ServiceExt;

/// Fails every request by panicking.
#[derive(Debug)]
struct PanickingSynthesizer;

impl ContentSynthesizer for PanickingSynthesizer {
    fn synthesize(&self, _request: &CompletionRequest) -> Synthesis {
        panic!("synthesizer failed");
    }
}

fn app_with(env: &[(&str, &str)]) -> Router {
    let env: HashMap<String, String> = env
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let config = ServiceConfig::from_sources(None, env).unwrap();
    create_router(AppState::new(config))
}

fn app() -> Router {
    app_with(&[])
}

fn completion(body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/v1/chat/completions")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn chat(stream: bool) -> Value {
    json!({
        "model": "openai/gpt-4o-mini",
        "messages": [{"role": "user", "content": "hi"}],
        "stream": stream
    })
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

async fn error_message(response: axum::response::Response) -> String {
    let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    body["error"].as_str().unwrap().to_string()
}

fn data_payloads(body: &[u8]) -> Vec<String> {
    std::str::from_utf8(body)
        .unwrap()
        .split_terminator("\n\n")
        .map(|frame| frame.strip_prefix("data: ").unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_health() {
    let app = app_with(&[("VERSION", "1.2.3")]);
    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body, json!({"status": "ok", "version": "1.2.3"}));
}

#[tokio::test]
async fn test_list_models() {
    let response = app()
        .oneshot(Request::get("/v1/models").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["object"], "list");
    let ids: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_str().unwrap())
        .collect();
    assert_eq!(
        ids,
        vec![
            "openai/gpt-4o-mini",
            "openai/gpt-4o",
            "openrouter/anthropic/claude-3-haiku",
            "anthropic/claude-3-sonnet"
        ]
    );
    assert!(body["data"].as_array().unwrap().iter().all(|m| m["object"] == "model"));
}

#[tokio::test]
async fn test_verify_and_eval() {
    let response = app()
        .oneshot(
            Request::post("/v1/verify")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"messages":[]}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["result"], "yes");
    assert!(body["content"].as_str().unwrap().contains("correct"));

    let response = app()
        .oneshot(Request::post("/v1/eval").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
    assert_eq!(body_bytes(response).await, EVAL_REPORT.as_bytes());
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let response = app()
        .oneshot(
            Request::post("/v1/chat/completions")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(error_message(response).await.starts_with("Invalid request: "));
}

#[tokio::test]
async fn test_empty_messages_is_bad_request() {
    let response = app()
        .oneshot(completion(&json!({"model": "m", "messages": []})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        error_message(response).await,
        "At least one message is required"
    );
}

#[tokio::test]
async fn test_missing_user_message_is_bad_request() {
    let body = json!({
        "model": "m",
        "messages": [
            {"role": "system", "content": "rules"},
            {"role": "assistant", "content": "hello"}
        ]
    });
    let response = app().oneshot(completion(&body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        error_message(response).await,
        "At least one user message is required"
    );
}

#[tokio::test(start_paused = true)]
async fn test_buffered_completion() {
    let response = app().oneshot(completion(&chat(false))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/json"
    );
    let result: CompletionResult = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(result.content(), Some(CANNED_REPLY));
    assert_eq!(*result.usage.total_tokens(), 40);
}

#[tokio::test(start_paused = true)]
async fn test_missing_content_type_is_accepted() {
    let request = Request::post("/v1/chat/completions")
        .body(Body::from(chat(false).to_string()))
        .unwrap();
    let response = app().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test(start_paused = true)]
async fn test_streamed_completion() {
    let response = app().oneshot(completion(&chat(true))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::CONTENT_TYPE], "text/event-stream");
    assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
    assert_eq!(headers[header::CONNECTION], "keep-alive");

    let payloads = data_payloads(&body_bytes(response).await);
    assert_eq!(payloads.len(), 10);
    assert_eq!(payloads.last().map(String::as_str), Some("[DONE]"));

    let chunks: Vec<StreamChunk> = payloads[..9]
        .iter()
        .map(|p| serde_json::from_str(p).unwrap())
        .collect();
    let text: String = chunks.iter().filter_map(|c| c.content()).collect();
    assert_eq!(text, CANNED_REPLY);
    assert!(chunks.iter().all(|c| c.id == chunks[0].id));
}

#[tokio::test(start_paused = true)]
async fn test_timeout_before_commit() {
    let env = [
        ("MIRA_REQUEST_TIMEOUT_SECS", "1"),
        ("MIRA_PROCESSING_DELAY_MS", "2000"),
    ];

    for stream in [false, true] {
        let response = app_with(&env).oneshot(completion(&chat(stream))).await.unwrap();

        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(error_message(response).await, "Request timeout");
    }
}

#[tokio::test(start_paused = true)]
async fn test_timeout_after_commit_ends_stream() {
    let app = app_with(&[
        ("MIRA_REQUEST_TIMEOUT_SECS", "1"),
        ("MIRA_PROCESSING_DELAY_MS", "980"),
    ]);
    let response = app.oneshot(completion(&chat(true))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let payloads = data_payloads(&body_bytes(response).await);
    assert_eq!(payloads.len(), 1);
    let role: StreamChunk = serde_json::from_str(&payloads[0]).unwrap();
    assert_eq!(role.choices[0].delta.role, Some(mira_core::Role::Assistant));
}

#[tokio::test]
async fn test_cors_preflight() {
    let request = Request::builder()
        .method("OPTIONS")
        .uri("/v1/chat/completions")
        .header(header::ORIGIN, "https://console.example")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .body(Body::empty())
        .unwrap();
    let response = app().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(headers[header::ACCESS_CONTROL_MAX_AGE], "300");
    let methods = headers[header::ACCESS_CONTROL_ALLOW_METHODS].to_str().unwrap();
    assert!(methods.contains("POST") && methods.contains("DELETE"));
}

#[tokio::test]
async fn test_unknown_route() {
    let response = app()
        .oneshot(Request::get("/v1/unknown").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_covers_slow_body() {
    let app = app_with(&[
        ("MIRA_REQUEST_TIMEOUT_SECS", "1"),
        ("MIRA_PROCESSING_DELAY_MS", "500"),
    ]);
    let payload = chat(false).to_string();
    let slow_body = futures::stream::once(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok::<_, std::io::Error>(Bytes::from(payload))
    });
    let request = Request::post("/v1/chat/completions")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from_stream(slow_body))
        .unwrap();

    let started = Instant::now();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(error_message(response).await, "Request timeout");
}

#[tokio::test(start_paused = true)]
async fn test_handler_panic_is_internal_error() {
    let config = ServiceConfig::from_sources(None, HashMap::new()).unwrap();
    let responder = Responder::with_synthesizer(config.responder(), Arc::new(PanickingSynthesizer));
    let app = create_router(AppState::with_responder(config, responder));

    for stream in [false, true] {
        let response = app.clone().oneshot(completion(&chat(stream))).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body, json!({"error": "Internal server error"}));
    }
}
