//! Bodies of the auxiliary service endpoints.

use serde::{Deserialize, Serialize};

/// `GET /health` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Always "ok" while the service answers
    pub status: String,
    /// Deployed service version
    pub version: String,
}

impl HealthStatus {
    /// Healthy status for the given version.
    pub fn ok(version: impl Into<String>) -> Self {
        Self {
            status: "ok".to_string(),
            version: version.into(),
        }
    }
}

/// `GET /v1/models` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelList {
    /// Always "list"
    pub object: String,
    /// Available models
    pub data: Vec<ModelCard>,
}

impl ModelList {
    /// List the given model ids.
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            object: "list".to_string(),
            data: ids
                .into_iter()
                .map(|id| ModelCard {
                    id: id.into(),
                    object: "model".to_string(),
                })
                .collect(),
        }
    }
}

/// One entry of [`ModelList`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelCard {
    /// Model identifier
    pub id: String,
    /// Always "model"
    pub object: String,
}

/// `POST /v1/verify` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResult {
    /// Verdict ("yes" or "no")
    pub result: String,
    /// Explanation of the verdict
    pub content: String,
}

/// Body of every error response: `{"error": "<message>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable error message
    pub error: String,
}

impl ErrorBody {
    /// Wrap a message.
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
