//! Top-level error wrapper types.

use crate::{ConfigError, ServerError};

/// Every error the Mira crates can surface to a caller.
///
/// # Examples
///
/// ```
/// use mira_error::{MiraError, ServerError, ServerErrorKind};
///
/// let err: MiraError = ServerError::new(ServerErrorKind::Timeout).into();
/// assert!(format!("{}", err).contains("Request timeout"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum MiraErrorKind {
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
    /// Completion service error
    #[from(ServerError)]
    Server(ServerError),
}

/// Mira error with kind discrimination.
///
/// # Examples
///
/// ```
/// use mira_error::{ConfigError, MiraResult};
///
/// fn might_fail() -> MiraResult<()> {
///     Err(ConfigError::new("Missing field"))?
/// }
///
/// assert!(might_fail().is_err());
/// ```
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Mira Error: {}", _0)]
pub struct MiraError(Box<MiraErrorKind>);

impl MiraError {
    /// Create a new error from a kind.
    pub fn new(kind: MiraErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &MiraErrorKind {
        &self.0
    }
}

// Generic From implementation for any type that converts to MiraErrorKind
impl<T> From<T> for MiraError
where
    T: Into<MiraErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for Mira operations.
pub type MiraResult<T> = std::result::Result<T, MiraError>;
