//! Buffered (non-streaming) completion result.

use crate::{Message, ToolCall, Usage};
use serde::{Deserialize, Serialize};

/// `object` value of a buffered completion.
pub const COMPLETION_OBJECT: &str = "chat.completion";

/// Why generation finished.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of the message
    Stop,
    /// Token limit reached
    Length,
    /// The model asked for tool calls
    ToolCalls,
}

/// OpenAI-compatible chat completion result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResult {
    /// Unique identifier for the completion
    pub id: String,
    /// Object type (always "chat.completion")
    pub object: String,
    /// Unix timestamp of when the completion was created
    pub created: i64,
    /// Model used for completion
    pub model: String,
    /// Backend configuration fingerprint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_fingerprint: Option<String>,
    /// Generated completions
    pub choices: Vec<CompletionChoice>,
    /// Token usage statistics
    pub usage: Usage,
}

impl CompletionResult {
    /// Content of the first choice, if there is one.
    pub fn content(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }
}

/// A completion choice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionChoice {
    /// Index of this choice
    pub index: u32,
    /// The generated message
    pub message: Message,
    /// Reason why generation finished
    pub finish_reason: FinishReason,
    /// Log probabilities (never produced, always `null`)
    #[serde(default)]
    pub logprobs: Option<String>,
    /// Tool calls requested by the model
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}
