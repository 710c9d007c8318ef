//! Streaming completion chunks.

use crate::{FinishReason, Role};
use serde::{Deserialize, Serialize};

/// `object` value of a streaming chunk.
pub const CHUNK_OBJECT: &str = "chat.completion.chunk";

/// Streaming chat completion chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Unique identifier, shared by every chunk of a response
    pub id: String,
    /// Object type (always "chat.completion.chunk")
    pub object: String,
    /// Unix timestamp
    pub created: i64,
    /// Model used
    pub model: String,
    /// Backend configuration fingerprint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_fingerprint: Option<String>,
    /// Delta choices
    pub choices: Vec<ChunkChoice>,
}

impl StreamChunk {
    /// Role marker of the first choice.
    pub fn role(&self) -> Option<Role> {
        self.choices.first().and_then(|c| c.delta.role)
    }

    /// Content fragment of the first choice.
    pub fn content(&self) -> Option<&str> {
        self.choices.first().and_then(|c| c.delta.content.as_deref())
    }

    /// Finish reason of the first choice.
    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.choices.first().and_then(|c| c.finish_reason)
    }
}

/// A choice in a streaming chunk
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkChoice {
    /// Index of this choice
    pub index: u32,
    /// Delta content
    pub delta: Delta,
    /// Finish reason (only on the terminal chunk)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

/// Newly produced fragment of a streamed message.
///
/// Both fields are omitted when absent, so the terminal delta encodes as `{}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Delta {
    /// Role (only in first chunk)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// Incremental content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl Delta {
    /// Whether the delta carries neither role nor content.
    pub fn is_empty(&self) -> bool {
        self.role.is_none() && self.content.is_none()
    }
}
