//! Error types for the completion service.

/// Error kinds for completion service operations.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, derive_more::Display)]
pub enum ServerErrorKind {
    /// The request failed validation and never reached the responder
    #[display("{}", _0)]
    InvalidRequest(String),

    /// Admission was refused because too many requests are in flight
    #[display("{}", _0)]
    Overloaded(String),

    /// The request deadline passed before any body byte was committed
    #[display("Request timeout")]
    Timeout,

    /// Writing to the response transport failed
    #[display("Transport error: {}", _0)]
    Transport(String),

    /// A response value could not be encoded
    #[display("Serialization error: {}", _0)]
    Serialization(String),

    /// Unexpected fault while building a response
    #[display("Internal server error")]
    Internal,

    /// HTTP request failed: {0}
    #[display("HTTP request failed: {}", _0)]
    Http(String),

    /// API error: {0}
    #[display("API error: {}", _0)]
    Api(String),

    /// Failed to deserialize response: {0}
    #[display("Failed to deserialize response: {}", _0)]
    Deserialization(String),

    /// Stream error: {0}
    #[display("Stream error: {}", _0)]
    Stream(String),

    /// The event stream closed before the `[DONE]` sentinel
    #[display("Stream ended without the [DONE] sentinel")]
    Truncated,

    /// Configuration error: {0}
    #[display("Configuration error: {}", _0)]
    Configuration(String),
}

impl ServerErrorKind {
    /// HTTP status code a handler answers with for this kind.
    ///
    /// Kinds that only occur on the client side map to 502.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidRequest(_) => 400,
            Self::Timeout => 408,
            Self::Overloaded(_) => 429,
            Self::Transport(_) | Self::Serialization(_) | Self::Internal => 500,
            Self::Configuration(_) => 500,
            Self::Http(_)
            | Self::Api(_)
            | Self::Deserialization(_)
            | Self::Stream(_)
            | Self::Truncated => 502,
        }
    }
}

/// Error wrapper with location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Server Error: {} at line {} in {}", kind, line, file)]
pub struct ServerError {
    /// The error kind
    pub kind: ServerErrorKind,
    /// Line number where error occurred
    pub line: u32,
    /// File where error occurred
    pub file: &'static str,
}

impl ServerError {
    /// Create a new ServerError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: ServerErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &ServerErrorKind {
        &self.kind
    }

    /// Message suitable for an `{"error": ...}` response body.
    ///
    /// Omits the source location, which stays in logs.
    pub fn public_message(&self) -> String {
        self.kind.to_string()
    }
}
