//! Chat completion request and its validation.

use crate::{Message, ModelProvider, Role, Tool};
use mira_error::{ServerError, ServerErrorKind};
use serde::{Deserialize, Serialize};

/// OpenAI-compatible chat completion request.
///
/// Missing fields deserialize to their empty values so that structural
/// problems surface through [`CompletionRequest::validate`] with a
/// readable message instead of a decoder error.
///
/// # Examples
///
/// ```
/// use mira_core::{CompletionRequestBuilder, Message};
///
/// let request = CompletionRequestBuilder::default()
///     .model("openai/gpt-4o-mini")
///     .messages(vec![Message::user("hi")])
///     .stream(true)
///     .build()
///     .unwrap();
///
/// assert!(request.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_builder::Builder)]
#[builder(setter(into))]
pub struct CompletionRequest {
    /// Model identifier
    #[serde(default)]
    #[builder(default)]
    pub model: String,
    /// Upstream provider hint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub model_provider: Option<ModelProvider>,
    /// Conversation messages, oldest first
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Answer as an event stream instead of one JSON document
    #[serde(default)]
    #[builder(default)]
    pub stream: bool,
    /// Tools the model may call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[builder(default)]
    pub tools: Vec<Tool>,
    /// Tool selection hint ("auto", "none" or a function selector object)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub tool_choice: Option<serde_json::Value>,
}

impl CompletionRequest {
    /// Check the structural invariants a responder relies on.
    ///
    /// # Errors
    ///
    /// Returns [`ServerErrorKind::InvalidRequest`] when the conversation is
    /// empty, has no user message, or declares a nameless tool.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.messages.is_empty() {
            return Err(ServerError::new(ServerErrorKind::InvalidRequest(
                "At least one message is required".to_string(),
            )));
        }

        if !self.messages.iter().any(|m| m.role == Role::User) {
            return Err(ServerError::new(ServerErrorKind::InvalidRequest(
                "At least one user message is required".to_string(),
            )));
        }

        if let Some(position) = self
            .tools
            .iter()
            .position(|tool| tool.function.name.trim().is_empty())
        {
            return Err(ServerError::new(ServerErrorKind::InvalidRequest(format!(
                "Tool {} has no function name",
                position
            ))));
        }

        Ok(())
    }

    /// The most recent user message, if any.
    pub fn last_user_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::User)
    }
}
