//! Client round-trips against a live server.

use axum::{Router, routing::post};
use futures::StreamExt;
use mira_core::{CompletionRequest, CompletionRequestBuilder, Message, ResponseEnvelope, Role};
use mira_server::{
    AppState, CANNED_REPLY, ClientConfig, MiraClient, ServerErrorKind, ServiceConfig, StreamEvent,
    serve,
};
use std::collections::HashMap;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

struct TestServer {
    base_url: String,
    shutdown: Option<oneshot::Sender<()>>,
    join: JoinHandle<Result<(), mira_server::ServerError>>,
}

impl TestServer {
    async fn start() -> Self {
        let env: HashMap<String, String> = [
            ("MIRA_PROCESSING_DELAY_MS", "0"),
            ("MIRA_CHUNK_DELAY_MS", "1"),
            ("VERSION", "9.9.9"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let config = ServiceConfig::from_sources(None, env).unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let (tx, rx) = oneshot::channel::<()>();
        let join = tokio::spawn(serve(
            listener,
            AppState::new(config),
            async move {
                let _ = rx.await;
            },
            Duration::from_secs(5),
        ));

        Self {
            base_url,
            shutdown: Some(tx),
            join,
        }
    }

    fn client(&self) -> MiraClient {
        MiraClient::new(ClientConfig::new(&self.base_url))
    }

    async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.join.await.unwrap().unwrap();
    }
}

fn request() -> CompletionRequest {
    CompletionRequestBuilder::default()
        .model("openai/gpt-4o-mini")
        .messages(vec![Message::user("hi")])
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_health_and_models() {
    let server = TestServer::start().await;
    let client = server.client();

    let health = client.health_check().await.unwrap();
    assert_eq!(health.status, "ok");
    assert_eq!(health.version, "9.9.9");

    let models = client.list_models().await.unwrap();
    assert_eq!(models.data.len(), 4);
    assert_eq!(models.data[0].id, "openai/gpt-4o-mini");

    server.stop().await;
}

#[tokio::test]
async fn test_buffered_round_trip() {
    let server = TestServer::start().await;

    let mut streaming = request();
    streaming.stream = true;
    let result = server.client().chat_completion(streaming).await.unwrap();

    assert_eq!(result.content(), Some(CANNED_REPLY));
    assert_eq!(result.choices[0].message.role, Role::Assistant);

    server.stop().await;
}

#[tokio::test]
async fn test_stream_round_trip() {
    let server = TestServer::start().await;

    let stream = server.client().chat_completion_stream(request()).await.unwrap();
    let chunks: Vec<_> = stream.collect().await;

    assert!(chunks.iter().all(Result::is_ok));
    let chunks: Vec<_> = chunks.into_iter().map(Result::unwrap).collect();
    assert_eq!(chunks.len(), 9);
    assert_eq!(chunks[0].role(), Some(Role::Assistant));
    let text: String = chunks.iter().filter_map(|c| c.content()).collect();
    assert_eq!(text, CANNED_REPLY);

    server.stop().await;
}

#[tokio::test]
async fn test_rejection_carries_server_message() {
    let server = TestServer::start().await;

    let mut invalid = request();
    invalid.messages = vec![Message::system("no user here")];
    let err = server.client().chat_completion(invalid).await.unwrap_err();

    match err.kind() {
        ServerErrorKind::Api(message) => {
            assert!(message.starts_with("400"));
            assert!(message.contains("At least one user message is required"));
        }
        other => panic!("expected an API error, got {:?}", other),
    }

    server.stop().await;
}

#[tokio::test]
async fn test_unreachable_server() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = MiraClient::new(ClientConfig::new(format!("http://{}", addr)));
    let err = client.health_check().await.unwrap_err();
    assert!(matches!(err.kind(), ServerErrorKind::Http(_)));
}

#[tokio::test]
async fn test_stream_without_sentinel_is_truncated() {
    let envelope = ResponseEnvelope::new("chatcmpl-7", 1_700_000_000, "openai/gpt-4o-mini");
    let body = [
        StreamEvent::Chunk(envelope.role_chunk(Role::Assistant)),
        StreamEvent::Chunk(envelope.content_chunk("Hel")),
    ]
    .iter()
    .map(|event| event.encode().unwrap())
    .fold(Vec::new(), |mut body, frame| {
        body.extend_from_slice(&frame);
        body
    });

    let app = Router::new().route(
        "/v1/chat/completions",
        post(move || {
            let body = body.clone();
            async move { ([("content-type", "text/event-stream")], body) }
        }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let server = tokio::spawn(async move { axum::serve(listener, app).await });

    let client = MiraClient::new(ClientConfig::new(base_url));
    let items: Vec<_> = client
        .chat_completion_stream(request())
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(items.len(), 3);
    assert_eq!(items[1].as_ref().unwrap().content(), Some("Hel"));
    assert_eq!(
        items[2].as_ref().unwrap_err().kind(),
        &ServerErrorKind::Truncated
    );

    server.abort();
}
