//! Token usage accounting.

use serde::{Deserialize, Serialize};

/// Token usage statistics for one completion.
///
/// Built through [`Usage::new`], which derives the total from its parts.
///
/// # Examples
///
/// ```
/// use mira_core::Usage;
///
/// let usage = Usage::new(30, 10);
/// assert_eq!(*usage.total_tokens(), 40);
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    derive_getters::Getters,
)]
pub struct Usage {
    /// Tokens in the prompt
    prompt_tokens: u32,
    /// Tokens in the completion
    completion_tokens: u32,
    /// Total tokens used
    total_tokens: u32,
}

impl Usage {
    /// Create a usage record whose total is the sum of its parts.
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }

    /// Whether the total matches prompt plus completion.
    ///
    /// Always true for values built with [`Usage::new`]; decoded values come
    /// from elsewhere and may not be.
    pub fn is_consistent(&self) -> bool {
        self.prompt_tokens.checked_add(self.completion_tokens) == Some(self.total_tokens)
    }
}
