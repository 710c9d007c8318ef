//! Chat completion wire types for the Mira completion service.
//!
//! These types follow the OpenAI chat completion format closely enough that
//! off-the-shelf clients can talk to the service:
//!
//! - [`CompletionRequest`] is what callers post to `/v1/chat/completions`
//! - [`CompletionResult`] is the buffered (non-streaming) answer
//! - [`StreamChunk`] is one `data:` event of the streaming answer
//!
//! All chunks and results of one response are minted from a single
//! [`ResponseEnvelope`], which fixes the response id, creation time and model.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod chunk;
mod envelope;
mod message;
mod request;
mod response;
mod role;
mod service;
mod tool;
mod usage;

pub use chunk::{CHUNK_OBJECT, ChunkChoice, Delta, StreamChunk};
pub use envelope::ResponseEnvelope;
pub use message::Message;
pub use request::{CompletionRequest, CompletionRequestBuilder, CompletionRequestBuilderError};
pub use response::{COMPLETION_OBJECT, CompletionChoice, CompletionResult, FinishReason};
pub use role::Role;
pub use service::{ErrorBody, HealthStatus, ModelCard, ModelList, VerifyResult};
pub use tool::{FunctionDeclaration, ModelProvider, Tool, ToolCall};
pub use usage::Usage;
