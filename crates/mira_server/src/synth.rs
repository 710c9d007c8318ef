//! Content synthesis: the seam where real inference would plug in.

use mira_core::{CompletionRequest, Usage};

/// Reply returned for every request by [`CannedSynthesizer`].
pub const CANNED_REPLY: &str = "Hello! How can I assist you today?";

/// Generated assistant text and its token accounting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Synthesis {
    /// Full assistant message
    pub content: String,
    /// Token usage of the exchange
    pub usage: Usage,
}

/// Produces the assistant message for a request.
pub trait ContentSynthesizer: Send + Sync + std::fmt::Debug {
    /// Produce the complete reply to `request`.
    fn synthesize(&self, request: &CompletionRequest) -> Synthesis;
}

/// Answers every request with the same text and placeholder usage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CannedSynthesizer {
    content: String,
    usage: Usage,
}

impl CannedSynthesizer {
    /// Canned reply with custom text.
    pub fn new(content: impl Into<String>, usage: Usage) -> Self {
        Self {
            content: content.into(),
            usage,
        }
    }
}

impl Default for CannedSynthesizer {
    fn default() -> Self {
        Self::new(CANNED_REPLY, Usage::new(30, 10))
    }
}

impl ContentSynthesizer for CannedSynthesizer {
    fn synthesize(&self, _request: &CompletionRequest) -> Synthesis {
        Synthesis {
            content: self.content.clone(),
            usage: self.usage,
        }
    }
}
