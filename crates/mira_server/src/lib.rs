//! Streaming chat completion service for Mira.
//!
//! A request posted to `/v1/chat/completions` is validated, given a deadline
//! and handed to the [`Responder`], which answers either with one buffered
//! JSON document or with a Server-Sent-Events stream flushed chunk by chunk.
//!
//! # Pieces
//!
//! - [`RequestScope`]: per-request cancellation token plus deadline
//! - [`Responder`]: produces the buffered body or the event generator
//! - [`deliver`]: writes generated events to a [`ChunkSink`]
//! - [`Throttle`]: admission control in front of the handlers
//! - [`create_router`] / [`serve`]: the axum HTTP surface
//! - [`MiraClient`]: consumes the service, including its event stream
//!
//! # Example
//!
//! ```rust,no_run
//! use mira_server::{AppState, ServiceConfig, serve};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServiceConfig::load()?;
//!     let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
//!     let grace = config.shutdown_grace();
//!     serve(listener, AppState::new(config), async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     }, grace)
//!     .await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod api;
mod client;
mod config;
mod delivery;
mod middleware;
mod observability;
mod responder;
mod scope;
mod synth;
mod wire;

pub use api::{
    ApiError, AppState, EVAL_REPORT, MAX_BODY_BYTES, VERIFY_CONTENT, create_router, serve,
};
pub use client::{ChunkStream, ClientConfig, MiraClient};
pub use config::{
    DEFAULT_CONFIG_FILE, DEFAULT_ENV_FILE, DEFAULT_MODELS, ServiceConfig, load_env_file,
};
pub use delivery::{
    ChannelSink, ChunkSink, DeliveryOutcome, FrameStream, deliver, spawn_delivery,
};
pub use middleware::{
    BACKLOG_TIMEOUT, CAPACITY_EXCEEDED, REQUEST_ID_HEADER, Throttle, client_ip, request_span,
    throttle,
};
pub use mira_error::{ServerError, ServerErrorKind};
pub use observability::{ObservabilityConfig, init_observability};
pub use responder::{
    DEFAULT_RESPONSE_MODEL, EventStream, Reply, Responder, ResponderConfig,
    ResponderConfigBuilder, partition,
};
pub use scope::RequestScope;
pub use synth::{CANNED_REPLY, CannedSynthesizer, ContentSynthesizer, Synthesis};
pub use wire::{DONE_SENTINEL, EVENT_STREAM, EventDecoder, StreamEvent, data_frame};
