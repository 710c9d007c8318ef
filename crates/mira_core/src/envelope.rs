//! Shared identity of every payload belonging to one response.

use crate::{
    ChunkChoice, CompletionChoice, CompletionResult, Delta, FinishReason, Message, Role,
    StreamChunk, Usage, CHUNK_OBJECT, COMPLETION_OBJECT,
};
use chrono::Utc;

/// Id, creation time and model of one response.
///
/// Every chunk minted from the same envelope carries the same `id` and the
/// same `created` timestamp.
///
/// # Examples
///
/// ```
/// use mira_core::{FinishReason, ResponseEnvelope, Role};
///
/// let envelope = ResponseEnvelope::new("chatcmpl-1", 1_700_000_000, "openai/gpt-4o-mini");
/// let first = envelope.role_chunk(Role::Assistant);
/// let last = envelope.finish_chunk(FinishReason::Stop);
///
/// assert_eq!(first.id, last.id);
/// assert_eq!(first.created, last.created);
/// assert_eq!(first.role(), Some(Role::Assistant));
/// assert_eq!(last.finish_reason(), Some(FinishReason::Stop));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_getters::Getters)]
pub struct ResponseEnvelope {
    /// Response identifier
    id: String,
    /// Unix timestamp shared by all payloads
    created: i64,
    /// Model name reported to the caller
    model: String,
    /// Fingerprint attached to buffered results
    system_fingerprint: Option<String>,
}

impl ResponseEnvelope {
    /// Create an envelope with explicit identity.
    pub fn new(id: impl Into<String>, created: i64, model: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created,
            model: model.into(),
            system_fingerprint: None,
        }
    }

    /// Create an envelope stamped with the current time.
    ///
    /// The id is `chatcmpl-<unix seconds>-<nanosecond suffix>` and the
    /// fingerprint `fp_<hex>`.
    pub fn now(model: impl Into<String>) -> Self {
        let now = Utc::now();
        let created = now.timestamp();
        let nanos = now.timestamp_subsec_nanos();
        Self {
            id: format!("chatcmpl-{}-{:08x}", created, nanos),
            created,
            model: model.into(),
            system_fingerprint: Some(format!("fp_{:x}", nanos % 100_000_000)),
        }
    }

    /// Attach a fingerprint.
    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.system_fingerprint = Some(fingerprint.into());
        self
    }

    fn chunk(&self, delta: Delta, finish_reason: Option<FinishReason>) -> StreamChunk {
        StreamChunk {
            id: self.id.clone(),
            object: CHUNK_OBJECT.to_string(),
            created: self.created,
            model: self.model.clone(),
            system_fingerprint: None,
            choices: vec![ChunkChoice {
                index: 0,
                delta,
                finish_reason,
            }],
        }
    }

    /// Opening chunk carrying only the role marker.
    pub fn role_chunk(&self, role: Role) -> StreamChunk {
        self.chunk(
            Delta {
                role: Some(role),
                content: None,
            },
            None,
        )
    }

    /// Chunk carrying one content fragment.
    pub fn content_chunk(&self, content: impl Into<String>) -> StreamChunk {
        self.chunk(
            Delta {
                role: None,
                content: Some(content.into()),
            },
            None,
        )
    }

    /// Terminal chunk with an empty delta and a finish reason.
    pub fn finish_chunk(&self, reason: FinishReason) -> StreamChunk {
        self.chunk(Delta::default(), Some(reason))
    }

    /// Buffered result holding one complete message.
    pub fn completion(
        &self,
        message: Message,
        finish_reason: FinishReason,
        usage: Usage,
    ) -> CompletionResult {
        CompletionResult {
            id: self.id.clone(),
            object: COMPLETION_OBJECT.to_string(),
            created: self.created,
            model: self.model.clone(),
            system_fingerprint: self.system_fingerprint.clone(),
            choices: vec![CompletionChoice {
                index: 0,
                message,
                finish_reason,
                logprobs: None,
                tool_calls: Vec::new(),
            }],
            usage,
        }
    }
}
