//! Role types for conversation participants.

use serde::{Deserialize, Serialize};

/// Author of a chat message.
///
/// Serialized in lowercase, as on the wire.
///
/// # Examples
///
/// ```
/// use mira_core::Role;
///
/// let role: Role = serde_json::from_str("\"user\"").unwrap();
/// assert_eq!(role, Role::User);
/// assert_eq!(Role::Assistant.to_string(), "assistant");
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    /// Instructions that frame the conversation
    System,
    /// Messages from the human
    User,
    /// Messages from the model
    Assistant,
    /// Results returned by a tool invocation
    Tool,
}
