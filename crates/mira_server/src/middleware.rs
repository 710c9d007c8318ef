//! Request middleware: tracing spans, client addresses and admission control.

use crate::api::ApiError;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use mira_error::{ServerError, ServerErrorKind};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{Span, info_span, warn};

/// Header carrying the request id, set when the client sends none.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Rejection when neither a slot nor a backlog place is free.
pub const CAPACITY_EXCEEDED: &str = "Server capacity exceeded.";

/// Rejection when a backlogged request waited too long for a slot.
pub const BACKLOG_TIMEOUT: &str = "Timed out while waiting for a pending request to complete.";

/// Admission control for the router.
///
/// At most `limit` requests are handled at once. Up to `backlog` more wait
/// for a free slot, each for at most `backlog_timeout`. Anything beyond that
/// is answered with 429 straight away.
#[derive(Debug, Clone)]
pub struct Throttle {
    slots: Arc<Semaphore>,
    admissions: Arc<Semaphore>,
    backlog_timeout: Duration,
}

impl Throttle {
    /// Create a throttle. A `limit` of zero is treated as one.
    pub fn new(limit: usize, backlog: usize, backlog_timeout: Duration) -> Self {
        let limit = limit.max(1);
        Self {
            slots: Arc::new(Semaphore::new(limit)),
            admissions: Arc::new(Semaphore::new(limit + backlog)),
            backlog_timeout,
        }
    }
}

/// Admit the request through `throttle` or reject it with 429.
///
/// The slot is held until the handler has produced its response; a streamed
/// body keeps flowing after the slot is returned.
pub async fn throttle(
    State(throttle): State<Throttle>,
    request: Request,
    next: Next,
) -> Response {
    let Ok(_admission) = throttle.admissions.clone().try_acquire_owned() else {
        warn!("Rejecting request, server at capacity");
        return overloaded(CAPACITY_EXCEEDED);
    };

    let slot = tokio::time::timeout(
        throttle.backlog_timeout,
        throttle.slots.clone().acquire_owned(),
    )
    .await;

    match slot {
        Ok(Ok(_slot)) => next.run(request).await,
        Ok(Err(_)) => {
            ApiError::from(ServerError::new(ServerErrorKind::Internal)).into_response()
        }
        Err(_) => {
            warn!(
                waited_ms = throttle.backlog_timeout.as_millis() as u64,
                "Backlogged request timed out"
            );
            overloaded(BACKLOG_TIMEOUT)
        }
    }
}

fn overloaded(message: &str) -> Response {
    ApiError::from(ServerError::new(ServerErrorKind::Overloaded(
        message.to_string(),
    )))
    .into_response()
}

/// Address of the client that sent the request.
///
/// Proxy headers win over the socket peer, checked in the order
/// `True-Client-IP`, `X-Real-IP`, then the first `X-Forwarded-For` entry.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<IpAddr> {
    ["true-client-ip", "x-real-ip"]
        .iter()
        .find_map(|name| headers.get(*name)?.to_str().ok()?.trim().parse().ok())
        .or_else(|| {
            headers
                .get("x-forwarded-for")?
                .to_str()
                .ok()?
                .split(',')
                .next()?
                .trim()
                .parse()
                .ok()
        })
        .or_else(|| peer.map(|addr| addr.ip()))
}

/// Tracing span of one HTTP request, tagged with its id and client address.
pub fn request_span(request: &Request) -> Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("-");
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    let client = client_ip(request.headers(), peer)
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "-".to_string());

    info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        request_id,
        client = %client,
    )
}
