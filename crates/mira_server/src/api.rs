//! HTTP routes of the completion service.

use crate::config::ServiceConfig;
use crate::delivery::spawn_delivery;
use crate::middleware::{request_span, throttle as throttle_requests};
use crate::responder::{EventStream, Reply, Responder};
use crate::scope::RequestScope;
use crate::wire::EVENT_STREAM;
use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::{HeaderName, HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use bytes::Bytes;
use mira_core::{CompletionRequest, ErrorBody, HealthStatus, ModelList, VerifyResult};
use mira_error::{ServerError, ServerErrorKind};
use std::any::Any;
use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    CompressionLevel,
    catch_panic::CatchPanicLayer,
    compression::CompressionLayer,
    cors::{Any as AnyOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{Span, error, field, info, instrument, warn};

/// Canned CSV returned by `/v1/eval`.
pub const EVAL_REPORT: &str = "prompt,openai/gpt-4\nExample prompt,9.5\nAnother example,8.7\n";

/// Explanation returned by `/v1/verify`.
pub const VERIFY_CONTENT: &str =
    "The statement appears to be correct based on the available information.";

/// Shared state of all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    responder: Responder,
    config: Arc<ServiceConfig>,
}

impl AppState {
    /// State with a responder built from `config`.
    pub fn new(config: ServiceConfig) -> Self {
        let responder = Responder::new(config.responder());
        Self::with_responder(config, responder)
    }

    /// State with a custom responder.
    pub fn with_responder(config: ServiceConfig, responder: Responder) -> Self {
        Self {
            responder,
            config: Arc::new(config),
        }
    }

    /// Service configuration.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Responder shared by all requests.
    pub fn responder(&self) -> &Responder {
        &self.responder
    }
}

/// Error returned by a handler, rendered as `{"error": ...}`.
#[derive(Debug)]
pub struct ApiError(ServerError);

impl From<ServerError> for ApiError {
    fn from(error: ServerError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.kind().status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let message = if status.is_server_error() {
            error!(error = %self.0, "Request failed before the response was committed");
            ServerErrorKind::Internal.to_string()
        } else {
            self.0.public_message()
        };

        (status, Json(ErrorBody::new(message))).into_response()
    }
}

/// Gzip level applied to compressible responses.
const COMPRESSION_LEVEL: i32 = 5;

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Build the router.
///
/// Layers, outermost first: panic recovery, request id assignment, request
/// tracing, request id propagation, CORS, gzip compression (event streams
/// excluded), the route timeout and admission control.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ACCEPT,
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-csrf-token"),
        ])
        .expose_headers([header::LINK])
        .max_age(Duration::from_secs(300));

    let throttle = state.config.throttle();
    let route_timeout = state.config.route_timeout();
    let compression = CompressionLayer::new().quality(CompressionLevel::Precise(COMPRESSION_LEVEL));

    Router::new()
        .route("/health", get(health_check))
        .route("/v1/models", get(list_models))
        .route("/v1/chat/completions", post(chat_completions))
        .route("/v1/verify", post(verify))
        .route("/v1/eval", post(evaluate))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(CatchPanicLayer::custom(panic_response))
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http().make_span_with(request_span))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(cors)
                .layer(compression)
                .layer(TimeoutLayer::new(route_timeout))
                .layer(axum::middleware::from_fn_with_state(throttle, throttle_requests)),
        )
}

/// Serve `state` on `listener` until `shutdown` resolves.
///
/// After the shutdown signal, in-flight requests get `grace` to finish;
/// whatever is still running then is aborted.
pub async fn serve<F>(
    listener: TcpListener,
    state: AppState,
    shutdown: F,
    grace: Duration,
) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Completion service listening");
    }

    let (signalled_tx, signalled_rx) = tokio::sync::oneshot::channel::<()>();
    let app = create_router(state).into_make_service_with_connect_info::<SocketAddr>();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown.await;
        let _ = signalled_tx.send(());
    });
    let mut task = tokio::spawn(server.into_future());

    tokio::select! {
        biased;
        result = &mut task => return join_result(result),
        _ = signalled_rx => info!(
            grace_secs = grace.as_secs(),
            "Shutting down, draining in-flight requests"
        ),
    }

    match tokio::time::timeout(grace, &mut task).await {
        Ok(result) => join_result(result),
        Err(_) => {
            warn!("Grace period elapsed, aborting remaining requests");
            task.abort();
            Ok(())
        }
    }
}

fn join_result(
    result: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), ServerError> {
    match result {
        Ok(Ok(())) => {
            info!("Server stopped");
            Ok(())
        }
        Ok(Err(e)) => Err(ServerError::new(ServerErrorKind::Transport(format!(
            "Server failed: {}",
            e
        )))),
        Err(e) => {
            error!(error = %e, "Server task failed");
            Err(ServerError::new(ServerErrorKind::Internal))
        }
    }
}

#[instrument(skip_all)]
async fn health_check(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(HealthStatus::ok(state.config.version()))
}

#[instrument(skip_all)]
async fn list_models(State(state): State<AppState>) -> Json<ModelList> {
    Json(ModelList::from_ids(state.config.models().iter().cloned()))
}

#[instrument(skip_all)]
async fn verify() -> Json<VerifyResult> {
    Json(VerifyResult {
        result: "yes".to_string(),
        content: VERIFY_CONTENT.to_string(),
    })
}

#[instrument(skip_all)]
async fn evaluate() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain")], EVAL_REPORT)
}

/// `POST /v1/chat/completions`.
///
/// The request deadline starts when the handler is entered, so reading the
/// body counts against it. The body is parsed regardless of its declared
/// content type.
#[instrument(skip_all, fields(model = field::Empty, stream = field::Empty))]
async fn chat_completions(
    State(state): State<AppState>,
    body: Body,
) -> Result<Response, ApiError> {
    let scope = RequestScope::with_timeout(state.config.request_timeout());
    let body = read_body(body, &scope).await?;

    let request: CompletionRequest = serde_json::from_slice(&body).map_err(|e| {
        warn!(error = %e, "Rejecting malformed request body");
        ServerError::new(ServerErrorKind::InvalidRequest(format!(
            "Invalid request: {}",
            e
        )))
    })?;

    let span = Span::current();
    span.record("model", request.model.as_str());
    span.record("stream", request.stream);

    request
        .validate()
        .inspect_err(|e| warn!(error = %e.kind(), "Rejecting invalid request"))?;

    match state.responder.respond(&request, scope).await? {
        Reply::Buffered(body) => {
            Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
        }
        Reply::Streaming(events) => Ok(stream_response(events)),
    }
}

/// Read the whole request body, giving up when `scope` ends first.
async fn read_body(body: Body, scope: &RequestScope) -> Result<Bytes, ServerError> {
    tokio::select! {
        biased;
        _ = scope.cancelled() => {
            warn!("Request deadline passed while reading the body");
            Err(ServerError::new(ServerErrorKind::Timeout))
        }
        bytes = axum::body::to_bytes(body, MAX_BODY_BYTES) => bytes.map_err(|e| {
            warn!(error = %e, "Failed to read request body");
            ServerError::new(ServerErrorKind::InvalidRequest(format!(
                "Invalid request: {}",
                e
            )))
        }),
    }
}

/// Commit SSE headers and deliver `events` from a background task.
fn stream_response(events: EventStream) -> Response {
    let (body, _delivery) = spawn_delivery(events);

    let mut response = Body::from_stream(body).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(EVENT_STREAM));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    response
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(panic = detail, "Handler panicked");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody::new(ServerErrorKind::Internal.to_string())),
    )
        .into_response()
}
