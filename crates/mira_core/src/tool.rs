//! Tool and provider declarations carried through requests untouched.

use serde::{Deserialize, Serialize};

/// A function the model may call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    /// Function name
    pub name: String,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// JSON schema of the parameters
    #[serde(default)]
    pub parameters: serde_json::Value,
}

/// A tool declared by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    /// Tool type (`function` is the only type in use)
    #[serde(rename = "type")]
    pub kind: String,
    /// The callable function
    pub function: FunctionDeclaration,
}

impl Tool {
    /// Declare a function tool.
    pub fn function(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind: "function".to_string(),
            function: FunctionDeclaration {
                name: name.into(),
                description: description.into(),
                parameters: serde_json::Value::Null,
            },
        }
    }
}

/// A function call made by the model in a completion choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call identifier
    pub id: String,
    /// Tool type
    #[serde(rename = "type")]
    pub kind: String,
    /// The function being called
    pub function: FunctionDeclaration,
    /// Position of the call in the choice
    #[serde(default)]
    pub index: u32,
}

/// Upstream provider hint forwarded by the router.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelProvider {
    /// Provider base URL
    pub base_url: String,
    /// Provider API key
    pub api_key: String,
    /// Provider name
    pub provider_name: String,
}
