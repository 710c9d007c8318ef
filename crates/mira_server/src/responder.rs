//! The completion responder: buffered JSON or an incrementally flushed
//! event stream, under the request's deadline.

use crate::scope::RequestScope;
use crate::synth::{CannedSynthesizer, ContentSynthesizer};
use crate::wire::StreamEvent;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use mira_core::{CompletionRequest, FinishReason, Message, ResponseEnvelope, Role};
use mira_error::{ServerError, ServerErrorKind};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Ordered events of one streamed response.
pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// Model name reported when none is configured.
pub const DEFAULT_RESPONSE_MODEL: &str = "openai/gpt-4o-mini";

/// Pacing and presentation knobs of the responder.
#[derive(Debug, Clone, PartialEq, Eq, derive_getters::Getters, derive_builder::Builder)]
#[builder(setter(into))]
pub struct ResponderConfig {
    /// Model name reported in every result and chunk
    #[builder(default = "DEFAULT_RESPONSE_MODEL.to_string()")]
    model: String,
    /// Characters per content chunk
    #[builder(default = "5")]
    chunk_size: usize,
    /// Pause between two emitted chunks
    #[builder(default = "Duration::from_millis(50)")]
    chunk_delay: Duration,
    /// Simulated processing time before any response is produced
    #[builder(default = "Duration::from_secs(1)")]
    processing_delay: Duration,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_RESPONSE_MODEL.to_string(),
            chunk_size: 5,
            chunk_delay: Duration::from_millis(50),
            processing_delay: Duration::from_secs(1),
        }
    }
}

impl ResponderConfig {
    pub(crate) fn from_parts(
        model: String,
        chunk_size: usize,
        chunk_delay: Duration,
        processing_delay: Duration,
    ) -> Self {
        Self {
            model,
            chunk_size,
            chunk_delay,
            processing_delay,
        }
    }
}

/// Outcome of [`Responder::respond`] once the response is safe to commit.
pub enum Reply {
    /// Complete JSON document
    Buffered(Bytes),
    /// Event stream whose first event has already been produced
    Streaming(EventStream),
}

impl std::fmt::Debug for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buffered(body) => f.debug_tuple("Buffered").field(&body.len()).finish(),
            Self::Streaming(_) => f.write_str("Streaming(..)"),
        }
    }
}

/// Turns validated requests into buffered or streamed completions.
///
/// Holds only immutable configuration, so one instance serves any number of
/// concurrent requests.
#[derive(Debug, Clone)]
pub struct Responder {
    config: ResponderConfig,
    synthesizer: Arc<dyn ContentSynthesizer>,
}

impl Default for Responder {
    fn default() -> Self {
        Self::new(ResponderConfig::default())
    }
}

impl Responder {
    /// Responder answering with the canned reply.
    pub fn new(config: ResponderConfig) -> Self {
        Self::with_synthesizer(config, Arc::new(CannedSynthesizer::default()))
    }

    /// Responder answering with content from `synthesizer`.
    pub fn with_synthesizer(
        config: ResponderConfig,
        synthesizer: Arc<dyn ContentSynthesizer>,
    ) -> Self {
        Self {
            config,
            synthesizer,
        }
    }

    /// Responder configuration.
    pub fn config(&self) -> &ResponderConfig {
        &self.config
    }

    /// Answer a validated request.
    ///
    /// Waits out the processing delay, then produces either a buffered JSON
    /// body or an event stream, depending on `request.stream`. For streams the
    /// first event is pulled before returning, so an `Err` here always means
    /// nothing has been committed to the client yet.
    ///
    /// # Errors
    ///
    /// [`ServerErrorKind::Timeout`] if the scope is cancelled before the
    /// response can be committed; [`ServerErrorKind::Serialization`] if the
    /// buffered result cannot be encoded.
    #[instrument(skip_all, fields(model = %request.model, stream = request.stream))]
    pub async fn respond(
        &self,
        request: &CompletionRequest,
        scope: RequestScope,
    ) -> Result<Reply, ServerError> {
        scope
            .sleep(self.config.processing_delay)
            .await
            .inspect_err(|_| warn!("Request cancelled during processing delay"))?;

        let synthesis = self.synthesizer.synthesize(request);
        let envelope = ResponseEnvelope::now(&self.config.model);

        if request.stream {
            let mut events = self.events(envelope, synthesis.content, scope);
            match events.next().await {
                Some(first) => Ok(Reply::Streaming(Box::pin(
                    futures::stream::once(futures::future::ready(first)).chain(events),
                ))),
                None => {
                    warn!("Request cancelled before the stream opened");
                    Err(ServerError::new(ServerErrorKind::Timeout))
                }
            }
        } else {
            let result = envelope.completion(
                Message::assistant(synthesis.content),
                FinishReason::Stop,
                synthesis.usage,
            );

            scope
                .ensure_live()
                .inspect_err(|_| warn!("Request cancelled before serialization"))?;

            let body = serde_json::to_vec(&result).map_err(|e| {
                ServerError::new(ServerErrorKind::Serialization(format!(
                    "Failed to encode completion: {}",
                    e
                )))
            })?;
            debug!(bytes = body.len(), "Buffered completion ready");
            Ok(Reply::Buffered(Bytes::from(body)))
        }
    }

    /// Event generator of a streamed response.
    ///
    /// Yields the role chunk, one chunk per content fragment, the terminal
    /// chunk and the `[DONE]` sentinel, pausing `chunk_delay` between chunks.
    /// Cancellation is checked before every chunk and races every pause; once
    /// observed, the stream ends without further events and without the
    /// sentinel. The scope lives as long as the stream.
    pub fn events(
        &self,
        envelope: ResponseEnvelope,
        content: String,
        scope: RequestScope,
    ) -> EventStream {
        let pieces = partition(&content, self.config.chunk_size);
        let delay = self.config.chunk_delay;

        Box::pin(async_stream::stream! {
            if scope.is_cancelled() {
                debug!("Scope cancelled before the role chunk");
                return;
            }
            yield StreamEvent::Chunk(envelope.role_chunk(Role::Assistant));

            for (index, piece) in pieces.into_iter().enumerate() {
                if scope.sleep(delay).await.is_err() || scope.is_cancelled() {
                    warn!(chunk = index, "Request cancelled during streaming");
                    return;
                }
                yield StreamEvent::Chunk(envelope.content_chunk(piece));
            }

            if scope.sleep(delay).await.is_err() || scope.is_cancelled() {
                warn!("Request cancelled before final chunk");
                return;
            }
            yield StreamEvent::Chunk(envelope.finish_chunk(FinishReason::Stop));
            yield StreamEvent::Done;
        })
    }
}

/// Split `text` into consecutive pieces of at most `size` characters.
///
/// Splits on character boundaries, never inside a code point. A `size` of
/// zero is treated as one.
pub fn partition(text: &str, size: usize) -> Vec<String> {
    let size = size.max(1);
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(size)
        .map(|piece| piece.iter().collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_reference_text() {
        assert_eq!(
            partition("Hello! How can I assist you today?", 5),
            vec!["Hello", "! How", " can ", "I ass", "ist y", "ou to", "day?"]
        );
    }

    #[test]
    fn test_partition_keeps_code_points_whole() {
        assert_eq!(partition("héllo wörld", 4), vec!["héll", "o wö", "rld"]);
    }

    #[test]
    fn test_partition_edge_sizes() {
        assert!(partition("", 5).is_empty());
        assert_eq!(partition("abc", 0), vec!["a", "b", "c"]);
        assert_eq!(partition("abc", 10), vec!["abc"]);
    }
}
